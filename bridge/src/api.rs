//! Public API for the bridge.
//!
//! [`Bridge`] is the single entry point: it holds the engine backend chosen
//! once at startup and loads models through it. [`Scene`] pairs one model with
//! one data buffer for callers (the Godot extension, the demo) that never need
//! more than that.
//!
//! ## Engine selection
//!
//! | Preference    | Compiled in            | Not compiled in        |
//! |---------------|------------------------|------------------------|
//! | `Auto`        | MuJoCo                 | unavailable shim       |
//! | `Mujoco`      | MuJoCo                 | unavailable shim + warn|
//! | `Reference`   | reference chain engine | unavailable shim + warn|
//! | `Unavailable` | unavailable shim       | unavailable shim       |

use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;

use crate::config::{BridgeConfig, EnginePreference, MIN_LOAD_ERROR_CAPACITY};
use crate::engine::{Dimensions, Engine, EngineKind, StateVector, UnavailableEngine};
use crate::error::{BridgeError, Result};
use crate::handle::{Data, Model};
use crate::snapshot::StateSnapshot;

/// The runtime-selected engine plus the configuration it was built from.
pub struct Bridge {
    engine: Arc<dyn Engine>,
    config: BridgeConfig,
    version: CString,
}

impl Bridge {
    /// Select a backend according to `config.engine`.
    pub fn new(config: BridgeConfig) -> Self {
        let engine = select_engine(config.engine);
        tracing::info!(
            preference = ?config.engine,
            engine = ?engine.kind(),
            "Engine selected"
        );
        Self::with_engine(engine, config)
    }

    /// Use an explicit backend, ignoring `config.engine`.
    pub fn with_engine(engine: Arc<dyn Engine>, config: BridgeConfig) -> Self {
        let version = CString::new(engine.version()).unwrap_or_default();
        Self {
            engine,
            config,
            version,
        }
    }

    /// Bridge configured from `GMJ_ENGINE` / `GMJ_LOG`.
    pub fn from_env() -> Self {
        Self::new(BridgeConfig::from_env())
    }

    /// Bridge whose every operation fails with `EngineUnavailable`.
    pub fn unavailable() -> Self {
        Self::with_engine(
            Arc::new(UnavailableEngine),
            BridgeConfig::with_engine(EnginePreference::Unavailable),
        )
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.engine.kind()
    }

    pub fn is_available(&self) -> bool {
        self.engine.available()
    }

    /// `Err(EngineUnavailable)` when the shim is active.
    pub fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(BridgeError::EngineUnavailable)
        }
    }

    /// Engine version string, `"unavailable"` for the shim.
    pub fn version(&self) -> &str {
        self.version.to_str().unwrap_or_default()
    }

    /// Version as a NUL-terminated string that lives as long as the bridge.
    pub fn version_cstr(&self) -> &CStr {
        &self.version
    }

    /// Compile the model descriptor at `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Model> {
        let path = path.as_ref();
        self.ensure_available()?;
        let capacity = self.config.load_error_capacity.max(MIN_LOAD_ERROR_CAPACITY);
        match self.engine.load(path, capacity) {
            Ok(native) => Ok(Model::new(native, self.engine.kind(), path)),
            Err(err) => {
                tracing::warn!("Failed to load {}: {}", path.display(), err);
                Err(err)
            }
        }
    }

    /// Allocate a state buffer for `model`.
    pub fn create_data(&self, model: &Model) -> Result<Data> {
        self.ensure_available()?;
        Data::new(model)
    }

    /// Load a model and create its data buffer in one call.
    pub fn open_scene(&self, path: impl AsRef<Path>) -> Result<Scene> {
        let model = self.load(path)?;
        let data = self.create_data(&model)?;
        Ok(Scene { model, data })
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

fn select_engine(preference: EnginePreference) -> Arc<dyn Engine> {
    match preference {
        EnginePreference::Auto | EnginePreference::Mujoco => mujoco_engine(preference),
        EnginePreference::Reference => reference_engine(),
        EnginePreference::Unavailable => Arc::new(UnavailableEngine),
    }
}

#[cfg(feature = "mujoco")]
fn mujoco_engine(_preference: EnginePreference) -> Arc<dyn Engine> {
    Arc::new(crate::engine::MujocoEngine)
}

#[cfg(not(feature = "mujoco"))]
fn mujoco_engine(preference: EnginePreference) -> Arc<dyn Engine> {
    if preference == EnginePreference::Mujoco {
        tracing::warn!("MuJoCo requested but not compiled in (feature \"mujoco\")");
    }
    Arc::new(UnavailableEngine)
}

#[cfg(any(test, feature = "reference"))]
fn reference_engine() -> Arc<dyn Engine> {
    Arc::new(crate::engine::ReferenceEngine)
}

#[cfg(not(any(test, feature = "reference")))]
fn reference_engine() -> Arc<dyn Engine> {
    tracing::warn!("Reference engine requested but not compiled in (feature \"reference\")");
    Arc::new(UnavailableEngine)
}

// ============================================================================
// SCENE
// ============================================================================

/// One model and one data buffer, dropped together.
#[derive(Debug)]
pub struct Scene {
    model: Model,
    data: Data,
}

impl Scene {
    /// Always true for a constructed scene; kept for script-side parity.
    pub fn is_ready(&self) -> bool {
        true
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Data {
        &mut self.data
    }

    pub fn dimensions(&self) -> Dimensions {
        self.model.dimensions()
    }

    pub fn body_id(&self, name: &str) -> Result<usize> {
        self.model.body_id(name)
    }

    pub fn step(&mut self, steps: u32) -> Result<()> {
        self.data.step(steps)
    }

    pub fn reset(&mut self) {
        self.data.reset();
    }

    pub fn forward(&mut self) {
        self.data.forward();
    }

    pub fn set_ctrl_slice(&mut self, start: usize, values: &[f64]) -> Result<()> {
        self.data.set_slice(StateVector::Ctrl, start, values)
    }

    pub fn get_qpos_slice(&self, start: usize, count: usize) -> Result<Vec<f64>> {
        self.data.get_slice(StateVector::Qpos, start, count)
    }

    pub fn body_world_position(&self, body: usize) -> Result<[f64; 3]> {
        self.data.body_world_position(body)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.data.snapshot(&self.model)
    }
}
