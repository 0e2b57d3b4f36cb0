//! Godot MuJoCo - Bridge Core
//!
//! A safety boundary around the MuJoCo physics engine for embedding in a game
//! engine. It owns handle lifecycles, bounds-checks every indexed and sliced
//! access to simulation state, resolves names through the engine's own tables
//! and degrades to a uniform failure when no engine is compiled in.
//!
//! Two surfaces share one implementation:
//!
//! - the safe Rust API ([`Bridge`], [`Model`], [`Data`], [`Scene`]), where
//!   every operation returns [`Result`]
//! - the flat C ABI in [`ffi`] (`gmj_*`), which maps results to [`ErrorCode`]
//!   and a per-thread last-error message
//!
//! No physics lives here; the engine backend (see [`engine`]) does all of it.

pub mod accessor;
pub mod api;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod logging;
pub mod names;
pub mod snapshot;
pub mod stepping;
pub mod validate;

pub use api::{Bridge, Scene};
pub use config::{BridgeConfig, EnginePreference};
pub use engine::{Dimensions, Engine, EngineKind, ObjectKind, StateVector};
pub use error::{BridgeError, ErrorCode, Result, UNAVAILABLE_MESSAGE};
pub use handle::{Data, Model, ModelId};
pub use snapshot::{BodySnapshot, StateSnapshot};
pub use stepping::step_batch;
