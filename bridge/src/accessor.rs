//! Accessor surface over the three state vectors.
//!
//! Every operation validates first and only then touches engine state, so a
//! rejected call leaves both the state and any output untouched. Values are
//! `f64` regardless of the engine's scalar width.
//!
//! Body world positions come from the last forward pass (`step` or
//! `forward`). Reading them after writing `qpos` directly returns stale
//! values until [`Data::forward`] runs; this is not tracked.

use crate::engine::StateVector;
use crate::error::Result;
use crate::handle::Data;
use crate::validate;

impl Data {
    /// One element of `vector`.
    pub fn get(&self, vector: StateVector, index: usize) -> Result<f64> {
        let i = self.check_index(vector, validate::signed(index))?;
        let mut out = [0.0];
        self.native().read(vector, i, &mut out);
        Ok(out[0])
    }

    /// Overwrite one element of `vector`.
    pub fn set(&mut self, vector: StateVector, index: usize, value: f64) -> Result<()> {
        let i = self.check_index(vector, validate::signed(index))?;
        self.native_mut().write(vector, i, &[value]);
        Ok(())
    }

    /// Fill `out` with `out.len()` elements of `vector` starting at `start`.
    pub fn read_slice(&self, vector: StateVector, start: usize, out: &mut [f64]) -> Result<()> {
        let range = self.check_slice(vector, validate::signed(start), validate::signed(out.len()))?;
        self.native().read(vector, range.start, out);
        Ok(())
    }

    /// `count` elements of `vector` starting at `start`.
    pub fn get_slice(&self, vector: StateVector, start: usize, count: usize) -> Result<Vec<f64>> {
        let range = self.check_slice(vector, validate::signed(start), validate::signed(count))?;
        let mut out = vec![0.0; range.len()];
        self.native().read(vector, range.start, &mut out);
        Ok(out)
    }

    /// Overwrite `values.len()` elements of `vector` starting at `start`.
    pub fn set_slice(&mut self, vector: StateVector, start: usize, values: &[f64]) -> Result<()> {
        let range = self.check_slice(vector, validate::signed(start), validate::signed(values.len()))?;
        self.native_mut().write(vector, range.start, values);
        Ok(())
    }

    /// Whole vector.
    pub fn vector(&self, vector: StateVector) -> Vec<f64> {
        let mut out = vec![0.0; self.dimensions().vector_len(vector)];
        self.native().read(vector, 0, &mut out);
        out
    }

    /// World position `[x, y, z]` of `body` from the last forward pass.
    pub fn body_world_position(&self, body: usize) -> Result<[f64; 3]> {
        let body = validate::index(validate::signed(body), self.dimensions().nbody, "body_index")?;
        Ok(self.native().body_position(body))
    }

    // Convenience wrappers mirroring the C names

    pub fn qpos(&self, index: usize) -> Result<f64> {
        self.get(StateVector::Qpos, index)
    }

    pub fn set_qpos(&mut self, index: usize, value: f64) -> Result<()> {
        self.set(StateVector::Qpos, index, value)
    }

    pub fn qvel(&self, index: usize) -> Result<f64> {
        self.get(StateVector::Qvel, index)
    }

    pub fn set_qvel(&mut self, index: usize, value: f64) -> Result<()> {
        self.set(StateVector::Qvel, index, value)
    }

    pub fn ctrl(&self, index: usize) -> Result<f64> {
        self.get(StateVector::Ctrl, index)
    }

    pub fn set_ctrl(&mut self, index: usize, value: f64) -> Result<()> {
        self.set(StateVector::Ctrl, index, value)
    }

    // Signed entry points used by the C ABI

    pub(crate) fn check_index(&self, vector: StateVector, index: i64) -> Result<usize> {
        validate::index(index, self.dimensions().vector_len(vector), vector.index_label())
    }

    pub(crate) fn check_slice(
        &self,
        vector: StateVector,
        start: i64,
        count: i64,
    ) -> Result<std::ops::Range<usize>> {
        validate::slice(start, count, self.dimensions().vector_len(vector))
    }
}
