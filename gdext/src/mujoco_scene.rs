//! MujocoScene - Godot class wrapping one model and its data buffer.
//!
//! Mirrors the bridge's [`Scene`] with Godot-friendly types. Methods that can
//! fail return the bridge's integer result code (0 = OK, see `ErrorCode`) and
//! keep the message for `get_last_error()`. Getters return a sentinel (`-1`,
//! an empty array, `Vector3.ZERO`) on failure.
//!
//! Usage in GDScript:
//! ```gdscript
//! var scene = MujocoScene.new()
//! if not scene.load("res://models/humanoid.xml"):
//!     push_error(scene.get_last_error())
//! var torso = scene.body_id("torso")
//! scene.set_ctrl_slice(0, PackedFloat64Array([0.5, -0.5]))
//! scene.step(4)
//! var pos = scene.body_world_position(torso)
//! ```

use godot::classes::ProjectSettings;
use godot::prelude::*;
use godot_mujoco_bridge::{Bridge, BridgeError, ErrorCode, Scene};

/// One loaded model plus its simulation state.
#[derive(GodotClass)]
#[class(base=RefCounted)]
pub struct MujocoScene {
    base: Base<RefCounted>,
    bridge: Bridge,
    scene: Option<Scene>,
    last_error: String,
}

#[godot_api]
impl IRefCounted for MujocoScene {
    fn init(base: Base<RefCounted>) -> Self {
        Self {
            base,
            bridge: Bridge::from_env(),
            scene: None,
            last_error: String::new(),
        }
    }
}

impl MujocoScene {
    /// Record the outcome and return the value on success.
    fn track<T>(&mut self, result: Result<T, BridgeError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error.clear();
                Some(value)
            }
            Err(err) => {
                self.last_error = err.to_string();
                None
            }
        }
    }

    fn track_code(&mut self, result: Result<(), BridgeError>) -> i32 {
        let code = ErrorCode::from(&result);
        self.track(result);
        code as i32
    }

    fn scene(&self) -> Result<&Scene, BridgeError> {
        self.scene
            .as_ref()
            .ok_or_else(|| BridgeError::invalid("no model loaded"))
    }

    fn scene_mut(&mut self) -> Result<&mut Scene, BridgeError> {
        self.scene
            .as_mut()
            .ok_or_else(|| BridgeError::invalid("no model loaded"))
    }

    fn dimension(&self, size: fn(&Scene) -> usize) -> i32 {
        self.scene
            .as_ref()
            .map(|scene| i32::try_from(size(scene)).unwrap_or(i32::MAX))
            .unwrap_or(-1)
    }
}

fn non_negative(value: i32, message: &str) -> Result<usize, BridgeError> {
    usize::try_from(value).map_err(|_| BridgeError::invalid(message))
}

#[godot_api]
impl MujocoScene {
    /// Load a model descriptor (`res://` and `user://` paths are resolved).
    /// Replaces any previously loaded model.
    #[func]
    fn load(&mut self, path: GString) -> bool {
        self.scene = None;
        let absolute = ProjectSettings::singleton().globalize_path(&path).to_string();
        let result = self.bridge.open_scene(&absolute);
        match self.track(result) {
            Some(scene) => {
                let dims = scene.dimensions();
                godot_print!(
                    "[MujocoScene] Loaded {} (nq={}, nv={}, nu={}, nbody={})",
                    absolute,
                    dims.nq,
                    dims.nv,
                    dims.nu,
                    dims.nbody
                );
                self.scene = Some(scene);
                true
            }
            None => {
                godot_error!("[MujocoScene] Failed to load {}: {}", absolute, self.last_error);
                false
            }
        }
    }

    /// Release the model and its state.
    #[func]
    fn close(&mut self) {
        self.scene = None;
        self.last_error.clear();
    }

    #[func]
    fn is_ready(&self) -> bool {
        self.scene.as_ref().is_some_and(Scene::is_ready)
    }

    #[func]
    fn get_nq(&self) -> i32 {
        self.dimension(|s| s.dimensions().nq)
    }

    #[func]
    fn get_nv(&self) -> i32 {
        self.dimension(|s| s.dimensions().nv)
    }

    #[func]
    fn get_nu(&self) -> i32 {
        self.dimension(|s| s.dimensions().nu)
    }

    #[func]
    fn get_nbody(&self) -> i32 {
        self.dimension(|s| s.dimensions().nbody)
    }

    #[func]
    fn get_njnt(&self) -> i32 {
        self.dimension(|s| s.dimensions().njnt)
    }

    /// Index of the named body, or -1.
    #[func]
    fn body_id(&mut self, name: GString) -> i32 {
        let result = self
            .scene()
            .and_then(|scene| scene.body_id(&name.to_string()));
        self.track(result)
            .map(|id| i32::try_from(id).unwrap_or(-1))
            .unwrap_or(-1)
    }

    /// Advance `steps` integration steps (at least one).
    #[func]
    fn step(&mut self, steps: i32) -> i32 {
        let steps = u32::try_from(steps.max(1)).unwrap_or(1);
        let result = self.scene_mut().and_then(|scene| scene.step(steps));
        self.track_code(result)
    }

    #[func]
    fn reset(&mut self) -> i32 {
        let result = self.scene_mut().map(Scene::reset);
        self.track_code(result)
    }

    /// Recompute body positions after writing state directly.
    #[func]
    fn forward(&mut self) -> i32 {
        let result = self.scene_mut().map(Scene::forward);
        self.track_code(result)
    }

    #[func]
    fn set_ctrl_slice(&mut self, start: i32, values: PackedFloat64Array) -> i32 {
        let result = non_negative(start, "slice start/count must be non-negative").and_then(|start| {
            self.scene_mut()
                .and_then(|scene| scene.set_ctrl_slice(start, values.as_slice()))
        });
        self.track_code(result)
    }

    /// `count` positions from `start`; empty on failure.
    #[func]
    fn get_qpos_slice(&mut self, start: i32, count: i32) -> PackedFloat64Array {
        let message = "slice start/count must be non-negative";
        let result = non_negative(start, message)
            .and_then(|start| Ok((start, non_negative(count, message)?)))
            .and_then(|(start, count)| self.scene()?.get_qpos_slice(start, count));
        self.track(result)
            .map(|values| PackedFloat64Array::from(values.as_slice()))
            .unwrap_or_default()
    }

    /// World position of `body` from the last step or forward pass;
    /// `Vector3.ZERO` on failure.
    #[func]
    fn body_world_position(&mut self, body: i32) -> Vector3 {
        let result = usize::try_from(body)
            .map_err(|_| BridgeError::out_of_range("body_index out of range"))
            .and_then(|body| self.scene()?.body_world_position(body));
        self.track(result)
            .map(|[x, y, z]| Vector3::new(x as f32, y as f32, z as f32))
            .unwrap_or(Vector3::ZERO)
    }

    /// Full state as JSON (`{}` when nothing is loaded).
    #[func]
    fn get_state_json(&mut self) -> GString {
        let result = self.scene().and_then(|scene| scene.snapshot().to_json());
        match self.track(result) {
            Some(json) => GString::from(json.as_str()),
            None => GString::from("{}"),
        }
    }

    /// Message of the last failed call on this object; empty after success.
    #[func]
    fn get_last_error(&self) -> GString {
        GString::from(self.last_error.as_str())
    }

    #[func]
    fn get_version(&self) -> GString {
        GString::from(self.bridge.version())
    }

    #[func]
    fn is_engine_available(&self) -> bool {
        self.bridge.is_available()
    }
}
