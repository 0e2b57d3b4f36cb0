//! Build script for the MuJoCo backend.
//!
//! Without the `mujoco` feature nothing is compiled or linked and the crate
//! falls back to the availability shim at runtime.
//!
//! With `mujoco`, a tiny C accessor shim is compiled against the MuJoCo
//! headers so the Rust side never depends on the layout of `mjModel` or
//! `mjData`. Point `MUJOCO_DIR` at a MuJoCo install root (the directory
//! holding `include/` and `lib/`).

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "mujoco")]
    mujoco::compile_shim();
}

#[cfg(feature = "mujoco")]
mod mujoco {
    use std::env;
    use std::path::PathBuf;

    pub fn compile_shim() {
        println!("cargo:rerun-if-env-changed=MUJOCO_DIR");
        println!("cargo:rerun-if-changed=native/gmj_shim.c");

        let mut build = cc::Build::new();
        build.file("native/gmj_shim.c").warnings(true);

        if let Some(root) = env::var_os("MUJOCO_DIR").map(PathBuf::from) {
            build.include(root.join("include"));
            println!(
                "cargo:rustc-link-search=native={}",
                root.join("lib").display()
            );
        }

        if env::var_os("CARGO_FEATURE_MUJOCO_SINGLE").is_some() {
            build.define("mjUSESINGLE", None);
        }

        build.compile("gmj_shim");
        println!("cargo:rustc-link-lib=dylib=mujoco");
    }
}
