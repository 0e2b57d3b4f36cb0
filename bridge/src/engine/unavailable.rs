//! Availability shim.
//!
//! Selected when no engine is compiled in (or when forced by config). It
//! keeps the call surface identical across builds: every load fails with
//! [`BridgeError::EngineUnavailable`], so no model or data handle can ever
//! exist, and the C ABI reports `EngineFailure` from every entry point.

use std::path::Path;
use std::sync::Arc;

use super::{Engine, EngineKind, NativeModel};
use crate::error::{BridgeError, Result};

/// Version string reported by the shim.
pub const UNAVAILABLE_VERSION: &str = "unavailable";

#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEngine;

impl Engine for UnavailableEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Unavailable
    }

    fn version(&self) -> String {
        UNAVAILABLE_VERSION.to_string()
    }

    fn available(&self) -> bool {
        false
    }

    fn load(&self, _path: &Path, _diagnostic_capacity: usize) -> Result<Arc<dyn NativeModel>> {
        Err(BridgeError::EngineUnavailable)
    }
}
