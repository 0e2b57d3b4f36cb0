//! Drive the sample chain through the safe API and print its state.
//!
//! Run with: cargo run --example pendulum_demo [descriptor.json]
//!
//! Without an argument the built-in sample chain is used. Set `GMJ_LOG=debug`
//! to see handle lifecycle events.

use std::path::PathBuf;

use godot_mujoco_bridge::engine::reference::SAMPLE_CHAIN;
use godot_mujoco_bridge::{logging, Bridge, BridgeConfig, EnginePreference, Scene};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(None);

    println!("=== Godot MuJoCo - Bridge Demo ===\n");

    let bridge = Bridge::new(BridgeConfig::with_engine(EnginePreference::Reference));
    println!("Engine: {:?} (version {})", bridge.engine_kind(), bridge.version());

    let dir = tempfile::tempdir()?;
    let path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let path = dir.path().join("sample_chain.json");
            std::fs::write(&path, SAMPLE_CHAIN)?;
            path
        }
    };

    let mut scene = bridge.open_scene(&path)?;
    let dims = scene.dimensions();
    println!(
        "Loaded {}: nq={} nv={} nu={} nbody={} njnt={}\n",
        path.display(),
        dims.nq,
        dims.nv,
        dims.nu,
        dims.nbody,
        dims.njnt
    );

    for body in 0..dims.nbody {
        let name = scene.model().body_name(body)?.unwrap_or("<unnamed>");
        println!("  body {body}: {name}");
    }

    // Push along the first actuator, then release
    if dims.nu > 0 {
        scene.set_ctrl_slice(0, &[1.0])?;
    }
    println!("\nRunning 200 steps (ctrl[0] = 1.0 for the first 100)...\n");
    for tick in 0..200 {
        if tick == 100 && dims.nu > 0 {
            scene.set_ctrl_slice(0, &[0.0])?;
        }
        scene.step(1)?;

        if (tick + 1) % 25 == 0 {
            scene.forward();
            print_state(&scene)?;
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    scene.forward();
    println!("{}", scene.snapshot().to_json_pretty()?);

    // Out-of-range access is reported, not performed
    if let Err(err) = scene.get_qpos_slice(dims.nq, 1) {
        println!("\nqpos[{}..{}]: {} ({:?})", dims.nq, dims.nq + 1, err, err.code());
    }

    Ok(())
}

fn print_state(scene: &Scene) -> Result<(), Box<dyn std::error::Error>> {
    let qpos = scene.get_qpos_slice(0, scene.dimensions().nq)?;
    print!("  step {:>3}: qpos=[", scene.data().step_count());
    for (i, q) in qpos.iter().enumerate() {
        if i > 0 {
            print!(", ");
        }
        print!("{q:+.3}");
    }
    print!("]");
    if scene.dimensions().nbody > 1 {
        let [x, y, z] = scene.body_world_position(1)?;
        print!("  body1=({x:.3}, {y:.3}, {z:.3})");
    }
    println!();
    Ok(())
}
