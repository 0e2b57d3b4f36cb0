//! Model and data handles.
//!
//! Both are move-only owners of an engine resource. Dropping the handle
//! releases the resource exactly once; across the C ABI the handle lives in a
//! `Box` and `gmj_*_free` reclaims it.
//!
//! A [`Data`] keeps its model's engine resource alive, so a data handle can
//! never observe a released model even if the model handle is freed first.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::{Dimensions, EngineKind, NativeData, NativeModel};
use crate::error::Result;

/// Process-unique identity of a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u64);

impl ModelId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ModelId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

// ============================================================================
// MODEL
// ============================================================================

/// Immutable compiled model.
///
/// Safe to share across threads for size and name queries.
pub struct Model {
    id: ModelId,
    engine: EngineKind,
    dims: Dimensions,
    source: PathBuf,
    native: Arc<dyn NativeModel>,
}

impl Model {
    pub(crate) fn new(native: Arc<dyn NativeModel>, engine: EngineKind, source: &Path) -> Self {
        let model = Self {
            id: ModelId::next(),
            engine,
            dims: native.dimensions(),
            source: source.to_path_buf(),
            native,
        };
        tracing::debug!(
            model = model.id.0,
            nq = model.dims.nq,
            nv = model.dims.nv,
            nu = model.dims.nu,
            nbody = model.dims.nbody,
            "Model loaded from {}",
            model.source.display()
        );
        model
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Path the model was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Number of position coordinates.
    pub fn nq(&self) -> usize {
        self.dims.nq
    }

    /// Number of velocity coordinates.
    pub fn nv(&self) -> usize {
        self.dims.nv
    }

    /// Number of actuators.
    pub fn nu(&self) -> usize {
        self.dims.nu
    }

    /// Number of bodies, including the world body.
    pub fn nbody(&self) -> usize {
        self.dims.nbody
    }

    /// Number of joints.
    pub fn njnt(&self) -> usize {
        self.dims.njnt
    }

    pub(crate) fn native(&self) -> &dyn NativeModel {
        self.native.as_ref()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("engine", &self.engine)
            .field("dims", &self.dims)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        tracing::debug!(model = self.id.0, "Model released");
    }
}

// ============================================================================
// DATA
// ============================================================================

/// Mutable simulation state sized by one [`Model`].
///
/// Not `Sync`: a data handle must never be mutated from two threads at once.
pub struct Data {
    model_id: ModelId,
    dims: Dimensions,
    steps: u64,
    native: Box<dyn NativeData>,
}

impl Data {
    /// Allocate a state buffer for `model`, reset to its initial
    /// configuration.
    pub fn new(model: &Model) -> Result<Self> {
        let native = Arc::clone(&model.native).make_data()?;
        tracing::debug!(model = model.id.0, "Data created");
        Ok(Self {
            model_id: model.id,
            dims: model.dims,
            steps: 0,
            native,
        })
    }

    /// Identity of the model this buffer was created from.
    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Integration steps taken since creation or the last reset.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub(crate) fn native(&self) -> &dyn NativeData {
        self.native.as_ref()
    }

    pub(crate) fn native_mut(&mut self) -> &mut dyn NativeData {
        self.native.as_mut()
    }

    pub(crate) fn set_step_count(&mut self, steps: u64) {
        self.steps = steps;
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("model_id", &self.model_id)
            .field("dims", &self.dims)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl Drop for Data {
    fn drop(&mut self) {
        tracing::debug!(model = self.model_id.0, "Data released");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::reference::{ReferenceEngine, SAMPLE_CHAIN};

    /// The sample chain as a handle: nq=2, nv=2, nu=1, nbody=3.
    pub(crate) fn sample_model() -> Model {
        let native = ReferenceEngine::compile_str(SAMPLE_CHAIN).unwrap();
        Model::new(native, EngineKind::Reference, Path::new("sample_chain.json"))
    }

    #[test]
    fn test_model_dimensions() {
        let model = sample_model();
        assert_eq!(model.nq(), 2);
        assert_eq!(model.nv(), 2);
        assert_eq!(model.nu(), 1);
        assert_eq!(model.nbody(), 3);
        assert_eq!(model.njnt(), 2);
        assert_eq!(model.engine(), EngineKind::Reference);
        assert_eq!(model.source(), Path::new("sample_chain.json"));
    }

    #[test]
    fn test_model_ids_are_unique() {
        let a = sample_model();
        let b = sample_model();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_data_remembers_its_model() {
        let model = sample_model();
        let data = Data::new(&model).unwrap();
        assert_eq!(data.model_id(), model.id());
        assert_eq!(data.dimensions(), model.dimensions());
        assert_eq!(data.step_count(), 0);
    }

    #[test]
    fn test_data_outlives_model_handle() {
        let model = sample_model();
        let mut data = Data::new(&model).unwrap();
        drop(model);

        // The engine model is still held by the data buffer
        data.native_mut().step();
        let mut out = [0.0; 2];
        data.native().read(crate::engine::StateVector::Qpos, 0, &mut out);
        assert!(out.iter().all(|v| v.is_finite()));
    }
}
