//! Process start-up through the C ABI: logging first, then an embedder
//! installing its own bridge with a minimal diagnostic capacity.
//!
//! Kept in one test so nothing else touches the process-wide bridge first.

use std::ffi::{c_char, CStr, CString};

use godot_mujoco_bridge::ffi::*;
use godot_mujoco_bridge::{Bridge, BridgeConfig, EnginePreference, ErrorCode};

fn last_error() -> String {
    unsafe { CStr::from_ptr(gmj_last_mujoco_error()) }
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_logging_then_install_then_failed_load_reports_message() {
    gmj_init_logging();

    let mut config = BridgeConfig::with_engine(EnginePreference::Reference);
    config.load_error_capacity = 1;
    assert!(
        install(Bridge::new(config)).is_ok(),
        "Initialising logging must not build the bridge"
    );

    let dir = tempfile::tempdir().unwrap();
    let path = CString::new(dir.path().join("missing.json").to_str().unwrap()).unwrap();
    let mut buffer = [0 as c_char; 64];
    let model = unsafe { gmj_model_load_xml(path.as_ptr(), buffer.as_mut_ptr(), buffer.len()) };

    assert!(model.is_null());
    assert!(!last_error().is_empty(), "Failed load left the error channel empty");
    let reported = unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_string_lossy();
    assert!(!reported.is_empty(), "Failed load left the caller buffer empty");

    // The channel stays populated for the next failing call too
    let code = unsafe { gmj_step(std::ptr::null(), std::ptr::null_mut(), 1) };
    assert_eq!(code, ErrorCode::InvalidArgument);
    assert!(!last_error().is_empty());
}
