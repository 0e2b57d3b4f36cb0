//! Serializable state snapshots.
//!
//! A `StateSnapshot` is a plain copy of one data buffer's state vectors and
//! body positions, suitable for sending to a script as JSON or for restoring
//! a buffer later with [`Data::restore`].

use serde::{Deserialize, Serialize};

use crate::engine::{EngineKind, ObjectKind, StateVector};
use crate::error::{BridgeError, Result};
use crate::handle::{Data, Model};
use crate::validate;

/// Position of one body from the last forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub index: usize,
    /// `None` for unnamed bodies.
    pub name: Option<String>,
    pub position: [f64; 3],
}

/// Complete state of one data buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub engine: EngineKind,
    /// Integration steps since creation or the last reset.
    pub step_count: u64,
    pub qpos: Vec<f64>,
    pub qvel: Vec<f64>,
    pub ctrl: Vec<f64>,
    pub bodies: Vec<BodySnapshot>,
}

impl StateSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BridgeError::invalid(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BridgeError::invalid(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BridgeError::invalid(format!("snapshot: {e}")))
    }
}

impl Data {
    /// Copy the current state. Body positions are as of the last forward
    /// pass.
    pub fn snapshot(&self, model: &Model) -> StateSnapshot {
        let bodies = (0..self.dimensions().nbody)
            .map(|index| BodySnapshot {
                index,
                name: model
                    .index_to_name(ObjectKind::Body, index)
                    .ok()
                    .flatten()
                    .map(str::to_owned),
                position: self.native().body_position(index),
            })
            .collect();

        StateSnapshot {
            engine: model.engine(),
            step_count: self.step_count(),
            qpos: self.vector(StateVector::Qpos),
            qvel: self.vector(StateVector::Qvel),
            ctrl: self.vector(StateVector::Ctrl),
            bodies,
        }
    }

    /// Write the snapshot's state vectors back and recompute body positions.
    /// Every vector length must match this buffer's model.
    pub fn restore(&mut self, model: &Model, snapshot: &StateSnapshot) -> Result<()> {
        validate::ownership(model, self)?;
        let dims = self.dimensions();
        for (vector, values) in [
            (StateVector::Qpos, &snapshot.qpos),
            (StateVector::Qvel, &snapshot.qvel),
            (StateVector::Ctrl, &snapshot.ctrl),
        ] {
            if values.len() != dims.vector_len(vector) {
                return Err(BridgeError::invalid(format!(
                    "snapshot {vector:?} has {} values, model expects {}",
                    values.len(),
                    dims.vector_len(vector)
                )));
            }
        }

        self.set_slice(StateVector::Qpos, 0, &snapshot.qpos)?;
        self.set_slice(StateVector::Qvel, 0, &snapshot.qvel)?;
        self.set_slice(StateVector::Ctrl, 0, &snapshot.ctrl)?;
        self.set_step_count(snapshot.step_count);
        self.forward();
        Ok(())
    }
}
