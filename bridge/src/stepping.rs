//! Reset, step and forward.
//!
//! All of these run to completion on the caller's thread; `step(n)` blocks
//! for the whole batch and is not transactional. If the engine's integrator
//! fails mid-batch, the state is whatever the engine left.
//!
//! ## Batch stepping
//!
//! [`step_batch`] advances many data handles of the same model. With the
//! `parallel` feature the handles are spread across rayon's pool; each
//! handle is still advanced by exactly one thread.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{BridgeError, Result};
use crate::handle::{Data, Model};
use crate::validate;

impl Data {
    /// Restore the model's initial configuration.
    pub fn reset(&mut self) {
        self.native_mut().reset();
        self.set_step_count(0);
    }

    /// Advance `steps` integration steps. `steps` must be at least 1.
    pub fn step(&mut self, steps: u32) -> Result<()> {
        if steps < 1 {
            return Err(BridgeError::invalid("steps must be >= 1"));
        }
        let native = self.native_mut();
        for _ in 0..steps {
            native.step();
        }
        let total = self.step_count().saturating_add(u64::from(steps));
        self.set_step_count(total);
        tracing::trace!(model = self.model_id().get(), steps, total, "Stepped");
        Ok(())
    }

    /// Recompute derived quantities (body positions) from the current state
    /// without advancing time.
    pub fn forward(&mut self) {
        self.native_mut().forward();
    }
}

/// Step every handle in `datas` by `steps`. All handles must belong to
/// `model`; ownership is checked for every handle before any is stepped.
pub fn step_batch(model: &Model, datas: &mut [Data], steps: u32) -> Result<()> {
    for (i, data) in datas.iter().enumerate() {
        validate::ownership(model, data)
            .map_err(|e| BridgeError::invalid(format!("handle {i}: {e}")))?;
    }
    if steps < 1 {
        return Err(BridgeError::invalid("steps must be >= 1"));
    }

    #[cfg(feature = "parallel")]
    {
        datas.par_iter_mut().try_for_each(|data| data.step(steps))
    }

    #[cfg(not(feature = "parallel"))]
    {
        datas.iter_mut().try_for_each(|data| data.step(steps))
    }
}
