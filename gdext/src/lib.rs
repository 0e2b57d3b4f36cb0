//! Godot MuJoCo - GDExtension bindings
//!
//! Exposes the bridge to Godot 4 as the `MujocoScene` class. The engine
//! backend is chosen from `GMJ_ENGINE` when each scene object is created.

use godot::prelude::*;

mod mujoco_scene;

/// GDExtension entry point.
struct GodotMujocoExtension;

#[gdextension]
unsafe impl ExtensionLibrary for GodotMujocoExtension {}
