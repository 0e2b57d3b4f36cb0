//! Engine strategy.
//!
//! The bridge never touches engine state directly; it talks to one of these
//! backends through three traits:
//!
//! - [`Engine`]: selected once at startup, loads model descriptors
//! - [`NativeModel`]: immutable compiled model, owns the name tables
//! - [`NativeData`]: mutable state buffer sized by its model
//!
//! ## Backends
//!
//! - `mujoco` (feature `mujoco`): the MuJoCo C library
//! - `reference` (feature `reference`): deterministic point-mass chains
//!   described in JSON, used to exercise the boundary without MuJoCo
//! - `unavailable`: the availability shim, every operation fails
//!
//! ## Bounds
//!
//! Backends trust the indices they are given. The validation layer
//! ([`crate::validate`]) checks every index and slice before dispatch.
//! Backends still index through Rust slices, so a validation bug panics
//! rather than reading foreign memory.

use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[cfg(feature = "mujoco")]
pub mod mujoco;
#[cfg(any(test, feature = "reference"))]
pub mod reference;
pub mod unavailable;

#[cfg(feature = "mujoco")]
pub use mujoco::MujocoEngine;
#[cfg(any(test, feature = "reference"))]
pub use reference::ReferenceEngine;
pub use unavailable::UnavailableEngine;

/// Which backend produced a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Mujoco,
    Reference,
    Unavailable,
}

/// Named object categories with engine-owned name tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Body,
    Joint,
    Actuator,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 3] = [ObjectKind::Body, ObjectKind::Joint, ObjectKind::Actuator];

    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Body => "body",
            ObjectKind::Joint => "joint",
            ObjectKind::Actuator => "actuator",
        }
    }
}

/// The three indexed state vectors of a data handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateVector {
    /// Generalized positions, length `nq`.
    Qpos,
    /// Generalized velocities, length `nv`.
    Qvel,
    /// Actuator controls, length `nu`.
    Ctrl,
}

impl StateVector {
    pub const ALL: [StateVector; 3] = [StateVector::Qpos, StateVector::Qvel, StateVector::Ctrl];

    /// Name used in scalar-index error messages.
    pub fn index_label(self) -> &'static str {
        match self {
            StateVector::Qpos => "qpos_index",
            StateVector::Qvel => "qvel_index",
            StateVector::Ctrl => "actuator_index",
        }
    }
}

/// Sizes derived from a compiled model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Position coordinates.
    pub nq: usize,
    /// Velocity coordinates.
    pub nv: usize,
    /// Actuators.
    pub nu: usize,
    /// Bodies, including the world body.
    pub nbody: usize,
    /// Joints.
    pub njnt: usize,
}

impl Dimensions {
    #[inline]
    pub fn vector_len(&self, vector: StateVector) -> usize {
        match vector {
            StateVector::Qpos => self.nq,
            StateVector::Qvel => self.nv,
            StateVector::Ctrl => self.nu,
        }
    }

    #[inline]
    pub fn object_count(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Body => self.nbody,
            ObjectKind::Joint => self.njnt,
            ObjectKind::Actuator => self.nu,
        }
    }
}

/// Scalar width of an engine's state arrays. Values always cross the
/// boundary as `f64`.
pub trait Scalar: Copy {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Scalar for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Scalar for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// Copy engine scalars into `out`, widening to `f64`.
#[inline]
pub(crate) fn widen_into<T: Scalar>(src: &[T], out: &mut [f64]) {
    for (dst, value) in out.iter_mut().zip(src) {
        *dst = value.to_f64();
    }
}

/// Copy `values` into engine scalars, narrowing from `f64`.
#[inline]
pub(crate) fn narrow_into<T: Scalar>(values: &[f64], dst: &mut [T]) {
    for (slot, value) in dst.iter_mut().zip(values) {
        *slot = T::from_f64(*value);
    }
}

/// A physics engine capable of compiling model descriptors.
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Human-readable engine version, `"unavailable"` for the shim.
    fn version(&self) -> String;

    /// Whether this engine can do anything at all.
    fn available(&self) -> bool {
        true
    }

    /// Compile the descriptor at `path`. `diagnostic_capacity` bounds the
    /// loader's error message buffer.
    fn load(&self, path: &Path, diagnostic_capacity: usize) -> Result<Arc<dyn NativeModel>>;
}

/// An immutable compiled model. Shared read-only across threads.
pub trait NativeModel: Send + Sync {
    fn dimensions(&self) -> Dimensions;

    /// Engine name-table lookup.
    fn name_to_index(&self, kind: ObjectKind, name: &CStr) -> Option<usize>;

    /// Engine name-table lookup. `None` for unnamed objects. `index` is
    /// already known to be below the category count.
    fn index_to_name(&self, kind: ObjectKind, index: usize) -> Option<&CStr>;

    /// Allocate a state buffer for this model, reset to the initial
    /// configuration. The buffer keeps the model alive.
    fn make_data(self: Arc<Self>) -> Result<Box<dyn NativeData>>;
}

/// A mutable state buffer. Never mutated from two threads at once.
pub trait NativeData: Send {
    /// Restore the model's initial configuration.
    fn reset(&mut self);

    /// One integration step.
    fn step(&mut self);

    /// Recompute derived quantities without advancing time.
    fn forward(&mut self);

    /// Copy `out.len()` values of `vector` starting at `start`.
    fn read(&self, vector: StateVector, start: usize, out: &mut [f64]);

    /// Overwrite `values.len()` values of `vector` starting at `start`.
    fn write(&mut self, vector: StateVector, start: usize, values: &[f64]);

    /// World position of `body` as of the last forward pass.
    fn body_position(&self, body: usize) -> [f64; 3];
}
