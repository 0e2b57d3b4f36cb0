//! Reference engine: deterministic point-mass chains.
//!
//! A small stand-in for MuJoCo used to exercise the boundary in tests,
//! benchmarks and demos on machines without the native library. Models are
//! JSON descriptors:
//!
//! ```json
//! {
//!   "timestep": 0.01,
//!   "gravity": [0.0, 0.0, -9.81],
//!   "bodies": [
//!     { "name": "cart", "parent": "world", "offset": [0, 0, 1], "mass": 1.0,
//!       "joint": { "name": "slide_x", "axis": [1, 0, 0], "damping": 0.1 } }
//!   ],
//!   "actuators": [ { "name": "push", "joint": "slide_x", "gear": 1.0 } ]
//! }
//! ```
//!
//! ## Model
//!
//! - Body 0 is the implicit `world` body at the origin.
//! - Every other body hangs from an earlier body (`parent`) at a fixed
//!   `offset`, optionally through one slide joint along `axis`.
//! - Each joint contributes one position and one velocity coordinate, so
//!   `nq == nv == njnt`.
//! - Each actuator applies `gear * ctrl` as a force along its joint.
//!
//! ## Dynamics
//!
//! Joints are independent point masses. `step` runs the forward pass on the
//! current positions (like MuJoCo, body positions after a step lag the
//! integrated state by one step) and then integrates with semi-implicit
//! Euler:
//!
//! ```text
//! f    = m * dot(gravity, axis) - damping * qvel + sum(gear * ctrl)
//! qvel += h * f / m
//! qpos += h * qvel
//! ```

use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Dimensions, Engine, EngineKind, NativeData, NativeModel, ObjectKind, StateVector};
use crate::channel;
use crate::error::{BridgeError, Result};

/// Name of the implicit root body.
pub const WORLD_BODY: &str = "world";

/// Version reported by the reference engine.
pub const REFERENCE_VERSION: &str = "reference-1.0";

/// Two slide joints on two bodies, one actuator on the first joint:
/// `nq = nv = 2`, `nu = 1`, `nbody = 3`.
pub const SAMPLE_CHAIN: &str = r#"{
  "timestep": 0.01,
  "gravity": [0.0, 0.0, -9.81],
  "bodies": [
    {
      "name": "cart",
      "parent": "world",
      "offset": [0.0, 0.0, 1.0],
      "mass": 2.0,
      "joint": { "name": "slide_x", "axis": [1.0, 0.0, 0.0], "damping": 0.5 }
    },
    {
      "name": "bob",
      "parent": "cart",
      "offset": [0.0, 0.0, -0.5],
      "mass": 0.5,
      "joint": { "name": "slide_z", "axis": [0.0, 0.0, 1.0], "damping": 0.1, "initial": 0.25 }
    }
  ],
  "actuators": [
    { "name": "push", "joint": "slide_x", "gear": 10.0 }
  ]
}"#;

// ============================================================================
// DESCRIPTOR
// ============================================================================

fn default_timestep() -> f64 {
    0.002
}

fn default_gravity() -> [f64; 3] {
    [0.0, 0.0, -9.81]
}

fn default_parent() -> String {
    WORLD_BODY.to_string()
}

fn unit() -> f64 {
    1.0
}

/// On-disk model descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    #[serde(default = "default_timestep")]
    pub timestep: f64,
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],
    #[serde(default)]
    pub bodies: Vec<BodyDescriptor>,
    #[serde(default)]
    pub actuators: Vec<ActuatorDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_parent")]
    pub parent: String,
    #[serde(default)]
    pub offset: [f64; 3],
    #[serde(default = "unit")]
    pub mass: f64,
    #[serde(default)]
    pub joint: Option<JointDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescriptor {
    #[serde(default)]
    pub name: String,
    pub axis: [f64; 3],
    #[serde(default)]
    pub damping: f64,
    #[serde(default)]
    pub initial: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorDescriptor {
    #[serde(default)]
    pub name: String,
    pub joint: String,
    #[serde(default = "unit")]
    pub gear: f64,
}

// ============================================================================
// COMPILED MODEL
// ============================================================================

#[derive(Debug, Clone)]
struct CompiledBody {
    parent: usize,
    offset: [f64; 3],
    joint: Option<usize>,
}

#[derive(Debug, Clone)]
struct CompiledJoint {
    axis: [f64; 3],
    mass: f64,
    damping: f64,
    initial: f64,
}

#[derive(Debug, Clone)]
struct CompiledActuator {
    joint: usize,
    gear: f64,
}

/// Name table for one object category. Empty names are unnamed objects.
#[derive(Debug, Default)]
struct NameTable {
    names: Vec<Option<CString>>,
}

impl NameTable {
    fn push(&mut self, kind: ObjectKind, name: &str) -> Result<()> {
        if name.is_empty() {
            self.names.push(None);
            return Ok(());
        }
        let name = CString::new(name)
            .map_err(|_| BridgeError::LoadFailure(format!("{} name contains NUL", kind.label())))?;
        if self.names.iter().flatten().any(|existing| existing == &name) {
            return Err(BridgeError::LoadFailure(format!(
                "repeated {} name '{}'",
                kind.label(),
                name.to_string_lossy()
            )));
        }
        self.names.push(Some(name));
        Ok(())
    }

    fn find(&self, name: &CStr) -> Option<usize> {
        self.names
            .iter()
            .position(|entry| entry.as_deref() == Some(name))
    }

    fn get(&self, index: usize) -> Option<&CStr> {
        self.names.get(index).and_then(|entry| entry.as_deref())
    }
}

/// Compiled reference model.
#[derive(Debug)]
pub struct ReferenceModel {
    dims: Dimensions,
    timestep: f64,
    gravity: [f64; 3],
    bodies: Vec<CompiledBody>,
    joints: Vec<CompiledJoint>,
    actuators: Vec<CompiledActuator>,
    body_names: NameTable,
    joint_names: NameTable,
    actuator_names: NameTable,
}

impl ReferenceModel {
    /// Validate and compile a descriptor.
    pub fn compile(descriptor: &ModelDescriptor) -> Result<Self> {
        if !(descriptor.timestep.is_finite() && descriptor.timestep > 0.0) {
            return Err(BridgeError::LoadFailure("timestep must be positive".to_string()));
        }

        let mut body_names = NameTable::default();
        let mut joint_names = NameTable::default();
        let mut actuator_names = NameTable::default();

        body_names.push(ObjectKind::Body, WORLD_BODY)?;
        let mut bodies = vec![CompiledBody { parent: 0, offset: [0.0; 3], joint: None }];
        let mut joints = Vec::new();

        for (i, body) in descriptor.bodies.iter().enumerate() {
            let parent_name = CString::new(body.parent.as_str())
                .map_err(|_| BridgeError::LoadFailure("parent name contains NUL".to_string()))?;
            // Parents must precede children, so the lookup only sees earlier bodies
            let parent = body_names.find(&parent_name).ok_or_else(|| {
                BridgeError::LoadFailure(format!(
                    "body {} ('{}'): unknown parent '{}'",
                    i + 1,
                    body.name,
                    body.parent
                ))
            })?;
            if !(body.mass.is_finite() && body.mass > 0.0) {
                return Err(BridgeError::LoadFailure(format!(
                    "body '{}': mass must be positive",
                    body.name
                )));
            }
            body_names.push(ObjectKind::Body, &body.name)?;

            let joint = match &body.joint {
                Some(joint) => {
                    let axis = normalized(joint.axis).ok_or_else(|| {
                        BridgeError::LoadFailure(format!("joint '{}': zero axis", joint.name))
                    })?;
                    joint_names.push(ObjectKind::Joint, &joint.name)?;
                    joints.push(CompiledJoint {
                        axis,
                        mass: body.mass,
                        damping: joint.damping,
                        initial: joint.initial,
                    });
                    Some(joints.len() - 1)
                }
                None => None,
            };

            bodies.push(CompiledBody { parent, offset: body.offset, joint });
        }

        let mut actuators = Vec::with_capacity(descriptor.actuators.len());
        for actuator in &descriptor.actuators {
            let target = CString::new(actuator.joint.as_str())
                .map_err(|_| BridgeError::LoadFailure("joint name contains NUL".to_string()))?;
            let joint = joint_names.find(&target).ok_or_else(|| {
                BridgeError::LoadFailure(format!(
                    "actuator '{}': unknown joint '{}'",
                    actuator.name, actuator.joint
                ))
            })?;
            actuator_names.push(ObjectKind::Actuator, &actuator.name)?;
            actuators.push(CompiledActuator { joint, gear: actuator.gear });
        }

        let dims = Dimensions {
            nq: joints.len(),
            nv: joints.len(),
            nu: actuators.len(),
            nbody: bodies.len(),
            njnt: joints.len(),
        };

        Ok(Self {
            dims,
            timestep: descriptor.timestep,
            gravity: descriptor.gravity,
            bodies,
            joints,
            actuators,
            body_names,
            joint_names,
            actuator_names,
        })
    }

    fn names(&self, kind: ObjectKind) -> &NameTable {
        match kind {
            ObjectKind::Body => &self.body_names,
            ObjectKind::Joint => &self.joint_names,
            ObjectKind::Actuator => &self.actuator_names,
        }
    }
}

fn normalized(v: [f64; 3]) -> Option<[f64; 3]> {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if !len.is_finite() || len < 1e-12 {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}

impl NativeModel for ReferenceModel {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }

    fn name_to_index(&self, kind: ObjectKind, name: &CStr) -> Option<usize> {
        self.names(kind).find(name)
    }

    fn index_to_name(&self, kind: ObjectKind, index: usize) -> Option<&CStr> {
        self.names(kind).get(index)
    }

    fn make_data(self: Arc<Self>) -> Result<Box<dyn NativeData>> {
        let mut data = ReferenceData {
            qpos: vec![0.0; self.dims.nq],
            qvel: vec![0.0; self.dims.nv],
            ctrl: vec![0.0; self.dims.nu],
            xpos: vec![0.0; self.dims.nbody * 3],
            model: self,
        };
        data.reset();
        Ok(Box::new(data))
    }
}

// ============================================================================
// STATE
// ============================================================================

/// State buffer for a [`ReferenceModel`].
#[derive(Debug)]
pub struct ReferenceData {
    model: Arc<ReferenceModel>,
    qpos: Vec<f64>,
    qvel: Vec<f64>,
    ctrl: Vec<f64>,
    xpos: Vec<f64>,
}

impl ReferenceData {
    fn vector(&self, vector: StateVector) -> &[f64] {
        match vector {
            StateVector::Qpos => &self.qpos,
            StateVector::Qvel => &self.qvel,
            StateVector::Ctrl => &self.ctrl,
        }
    }

    fn vector_mut(&mut self, vector: StateVector) -> &mut [f64] {
        match vector {
            StateVector::Qpos => &mut self.qpos,
            StateVector::Qvel => &mut self.qvel,
            StateVector::Ctrl => &mut self.ctrl,
        }
    }
}

impl NativeData for ReferenceData {
    fn reset(&mut self) {
        for (q, joint) in self.qpos.iter_mut().zip(&self.model.joints) {
            *q = joint.initial;
        }
        self.qvel.fill(0.0);
        self.ctrl.fill(0.0);
        self.xpos.fill(0.0);
    }

    fn step(&mut self) {
        self.forward();

        let model = Arc::clone(&self.model);
        let h = model.timestep;

        let mut force: Vec<f64> = model
            .joints
            .iter()
            .zip(&self.qvel)
            .map(|(joint, &v)| {
                let g = model.gravity;
                let along = g[0] * joint.axis[0] + g[1] * joint.axis[1] + g[2] * joint.axis[2];
                joint.mass * along - joint.damping * v
            })
            .collect();

        for (actuator, &u) in model.actuators.iter().zip(&self.ctrl) {
            force[actuator.joint] += actuator.gear * u;
        }

        for (j, joint) in model.joints.iter().enumerate() {
            self.qvel[j] += h * force[j] / joint.mass;
            self.qpos[j] += h * self.qvel[j];
        }
    }

    fn forward(&mut self) {
        let model = &self.model;
        self.xpos[0..3].fill(0.0);
        for (b, body) in model.bodies.iter().enumerate().skip(1) {
            let base = body.parent * 3;
            let mut p = [
                self.xpos[base] + body.offset[0],
                self.xpos[base + 1] + body.offset[1],
                self.xpos[base + 2] + body.offset[2],
            ];
            if let Some(j) = body.joint {
                let axis = model.joints[j].axis;
                let q = self.qpos[j];
                p[0] += axis[0] * q;
                p[1] += axis[1] * q;
                p[2] += axis[2] * q;
            }
            self.xpos[b * 3..b * 3 + 3].copy_from_slice(&p);
        }
    }

    fn read(&self, vector: StateVector, start: usize, out: &mut [f64]) {
        let src = self.vector(vector);
        out.copy_from_slice(&src[start..start + out.len()]);
    }

    fn write(&mut self, vector: StateVector, start: usize, values: &[f64]) {
        let dst = self.vector_mut(vector);
        dst[start..start + values.len()].copy_from_slice(values);
    }

    fn body_position(&self, body: usize) -> [f64; 3] {
        let p = &self.xpos[body * 3..body * 3 + 3];
        [p[0], p[1], p[2]]
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Loads [`ModelDescriptor`] JSON files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceEngine;

impl ReferenceEngine {
    /// Compile a descriptor given as a JSON string.
    pub fn compile_str(json: &str) -> Result<Arc<ReferenceModel>> {
        let descriptor: ModelDescriptor = serde_json::from_str(json)
            .map_err(|e| BridgeError::LoadFailure(format!("descriptor: {e}")))?;
        ReferenceModel::compile(&descriptor).map(Arc::new)
    }
}

impl Engine for ReferenceEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Reference
    }

    fn version(&self) -> String {
        REFERENCE_VERSION.to_string()
    }

    fn load(&self, path: &Path, diagnostic_capacity: usize) -> Result<Arc<dyn NativeModel>> {
        let limit = diagnostic_capacity.saturating_sub(1);
        let clipped = |err: BridgeError| match err {
            BridgeError::LoadFailure(message) => {
                let message = channel::truncate(&message, limit);
                BridgeError::LoadFailure(if message.is_empty() {
                    format!("failed to load '{}'", path.display())
                } else {
                    message.to_string()
                })
            }
            other => other,
        };

        let json = std::fs::read_to_string(path).map_err(|e| {
            clipped(BridgeError::LoadFailure(format!(
                "could not read '{}': {}",
                path.display(),
                e
            )))
        })?;
        let model = Self::compile_str(&json).map_err(clipped)?;
        Ok(model)
    }
}
