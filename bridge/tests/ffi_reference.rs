//! End-to-end tests of the C ABI against the reference engine.
//!
//! The C ABI uses one process-wide bridge, so every test installs the same
//! reference bridge before its first `gmj_*` call.

use std::ffi::{c_char, CStr, CString};
use std::path::Path;
use std::ptr;

use godot_mujoco_bridge::engine::reference::{REFERENCE_VERSION, SAMPLE_CHAIN};
use godot_mujoco_bridge::ffi::*;
use godot_mujoco_bridge::{Bridge, BridgeConfig, Data, EnginePreference, ErrorCode, Model};

fn setup() {
    let _ = install(Bridge::new(BridgeConfig::with_engine(EnginePreference::Reference)));
}

fn last_error() -> String {
    unsafe { CStr::from_ptr(gmj_last_mujoco_error()) }
        .to_string_lossy()
        .into_owned()
}

/// Model and data loaded from the sample chain, freed on drop.
struct Handles {
    model: *mut Model,
    data: *mut Data,
    _dir: tempfile::TempDir,
}

impl Handles {
    fn load() -> Self {
        setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        std::fs::write(&path, SAMPLE_CHAIN).unwrap();

        let model = load_model(&path);
        assert!(!model.is_null(), "Load failed: {}", last_error());
        let data = unsafe { gmj_data_create(model) };
        assert!(!data.is_null(), "Data creation failed: {}", last_error());
        Self { model, data, _dir: dir }
    }
}

impl Drop for Handles {
    fn drop(&mut self) {
        unsafe {
            gmj_data_free(self.data);
            gmj_model_free(self.model);
        }
    }
}

fn load_model(path: &Path) -> *mut Model {
    let c_path = CString::new(path.to_str().unwrap()).unwrap();
    unsafe { gmj_model_load_xml(c_path.as_ptr(), ptr::null_mut(), 0) }
}

#[test]
fn test_version_reports_reference_engine() {
    setup();
    let version = unsafe { CStr::from_ptr(gmj_mujoco_version()) };
    assert_eq!(version.to_str().unwrap(), REFERENCE_VERSION);
}

#[test]
fn test_dimensions() {
    let h = Handles::load();
    unsafe {
        assert_eq!(gmj_nq(h.model), 2);
        assert_eq!(gmj_nv(h.model), 2);
        assert_eq!(gmj_nu(h.model), 1);
        assert_eq!(gmj_nbody(h.model), 3);
        assert_eq!(gmj_njnt(h.model), 2);
        assert_eq!(gmj_nq(ptr::null()), -1, "Null model yields the sentinel");
    }
    assert_eq!(last_error(), "model is null");
}

#[test]
fn test_control_step_forward_scenario() {
    let h = Handles::load();
    unsafe {
        assert_eq!(gmj_set_ctrl(h.model, h.data, 0, 1.0), ErrorCode::Ok);
        assert_eq!(gmj_step(h.model, h.data, 10), ErrorCode::Ok);
        assert_eq!(gmj_forward(h.model, h.data), ErrorCode::Ok);

        let mut xyz = [f64::NAN; 3];
        assert_eq!(gmj_body_world_position(h.model, h.data, 1, xyz.as_mut_ptr()), ErrorCode::Ok);
        assert!(xyz.iter().all(|v| v.is_finite()), "Body position must be finite: {xyz:?}");

        let mut ctrl = 0.0;
        assert_eq!(gmj_get_ctrl(h.model, h.data, 0, &mut ctrl), ErrorCode::Ok);
        assert_eq!(ctrl, 1.0, "Control survives stepping");
    }
    assert!(last_error().is_empty());
}

#[test]
fn test_out_of_range_scalar_leaves_output() {
    let h = Handles::load();
    let mut value = 42.0;
    let code = unsafe { gmj_get_qpos(h.model, h.data, 5, &mut value) };
    assert_eq!(code, ErrorCode::IndexOutOfRange);
    assert_eq!(value, 42.0, "Output must be unmodified on failure");
    assert_eq!(last_error(), "qpos_index out of range");

    let code = unsafe { gmj_set_qvel(h.model, h.data, -1, 1.0) };
    assert_eq!(code, ErrorCode::IndexOutOfRange);
    let code = unsafe { gmj_get_ctrl(h.model, h.data, 0, ptr::null_mut()) };
    assert_eq!(code, ErrorCode::InvalidArgument);
    assert_eq!(last_error(), "out_value is null");
}

#[test]
fn test_slices() {
    let h = Handles::load();
    unsafe {
        let values = [0.3, -0.7];
        assert_eq!(gmj_set_qpos_slice(h.model, h.data, 0, 2, values.as_ptr()), ErrorCode::Ok);
        let mut out = [0.0; 2];
        assert_eq!(gmj_get_qpos_slice(h.model, h.data, 0, 2, out.as_mut_ptr()), ErrorCode::Ok);
        assert_eq!(out, values);

        let mut tail = [0.0; 1];
        assert_eq!(gmj_get_qpos_slice(h.model, h.data, 1, 1, tail.as_mut_ptr()), ErrorCode::Ok);
        assert_eq!(tail, [-0.7]);

        assert_eq!(
            gmj_get_qvel_slice(h.model, h.data, 0, -1, out.as_mut_ptr()),
            ErrorCode::InvalidArgument
        );
        assert_eq!(last_error(), "slice start/count must be non-negative");
        assert_eq!(
            gmj_get_qvel_slice(h.model, h.data, 1, 2, out.as_mut_ptr()),
            ErrorCode::IndexOutOfRange
        );
        assert_eq!(last_error(), "slice out of range");

        assert_eq!(
            gmj_set_ctrl_slice(h.model, h.data, 1, 0, ptr::null()),
            ErrorCode::Ok,
            "Empty slice at the end accepts a null pointer"
        );
        assert_eq!(
            gmj_set_ctrl_slice(h.model, h.data, 0, 1, ptr::null()),
            ErrorCode::InvalidArgument
        );
        assert_eq!(last_error(), "values is null");
    }
}

#[test]
fn test_slice_roundtrip_through_c() {
    let h = Handles::load();
    unsafe {
        let seed = [1.5, 2.5];
        gmj_set_qvel_slice(h.model, h.data, 0, 2, seed.as_ptr());
        for start in 0..=2 {
            for count in 0..=(2 - start) {
                let mut buf = [0.0; 2];
                let n = count as usize;
                assert_eq!(
                    gmj_get_qvel_slice(h.model, h.data, start, count, buf.as_mut_ptr()),
                    ErrorCode::Ok
                );
                assert_eq!(gmj_set_qvel_slice(h.model, h.data, start, count, buf.as_ptr()), ErrorCode::Ok);
                let mut again = [0.0; 2];
                gmj_get_qvel_slice(h.model, h.data, start, count, again.as_mut_ptr());
                assert_eq!(again[..n], buf[..n], "start={start} count={count}");
            }
        }
    }
}

#[test]
fn test_step_count_validation() {
    let h = Handles::load();
    unsafe {
        assert_eq!(gmj_step(h.model, h.data, 0), ErrorCode::InvalidArgument);
        assert_eq!(last_error(), "steps must be >= 1");
        assert_eq!(gmj_step(h.model, h.data, -4), ErrorCode::InvalidArgument);
        assert_eq!(gmj_step(ptr::null(), h.data, 1), ErrorCode::InvalidArgument);
        assert_eq!(last_error(), "invalid model or data pointer");
    }
}

#[test]
fn test_single_steps_match_batched_step() {
    let a = Handles::load();
    let b = Handles::load();
    unsafe {
        gmj_set_ctrl(a.model, a.data, 0, -0.4);
        gmj_set_ctrl(b.model, b.data, 0, -0.4);
        for _ in 0..30 {
            assert_eq!(gmj_step(a.model, a.data, 1), ErrorCode::Ok);
        }
        assert_eq!(gmj_step(b.model, b.data, 30), ErrorCode::Ok);

        let (mut qa, mut qb) = ([0.0; 2], [0.0; 2]);
        gmj_get_qpos_slice(a.model, a.data, 0, 2, qa.as_mut_ptr());
        gmj_get_qpos_slice(b.model, b.data, 0, 2, qb.as_mut_ptr());
        for (x, y) in qa.iter().zip(qb) {
            assert!((x - y).abs() < 1e-12, "{x} != {y}");
        }
    }
}

#[test]
fn test_reset_restores_initial_configuration() {
    let h = Handles::load();
    unsafe {
        gmj_set_ctrl(h.model, h.data, 0, 1.0);
        gmj_step(h.model, h.data, 5);
        assert_eq!(gmj_reset_data(h.model, h.data), ErrorCode::Ok);

        let mut q = [9.0; 2];
        gmj_get_qpos_slice(h.model, h.data, 0, 2, q.as_mut_ptr());
        assert_eq!(q, [0.0, 0.25]);
        let mut u = 9.0;
        gmj_get_ctrl(h.model, h.data, 0, &mut u);
        assert_eq!(u, 0.0);
    }
}

#[test]
fn test_name_roundtrip() {
    let h = Handles::load();
    type IdFn = unsafe extern "C" fn(*const Model, *const c_char) -> i32;
    type NameFn = unsafe extern "C" fn(*const Model, i32) -> *const c_char;
    let families: [(IdFn, NameFn, i32); 3] = [
        (gmj_body_id, gmj_body_name, 3),
        (gmj_joint_id, gmj_joint_name, 2),
        (gmj_actuator_id, gmj_actuator_name, 1),
    ];

    for (to_id, to_name, count) in families {
        for index in 0..count {
            unsafe {
                let name = to_name(h.model, index);
                assert!(!name.is_null(), "Index {index} has a name");
                let owned = CStr::from_ptr(name).to_owned();
                assert_eq!(to_id(h.model, owned.as_ptr()), index, "{owned:?} did not round-trip");
            }
        }
        unsafe {
            assert!(to_name(h.model, count).is_null());
            assert!(last_error().ends_with("_id out of range"));
        }
    }
}

#[test]
fn test_unknown_and_null_names() {
    let h = Handles::load();
    let pole = CString::new("pole").unwrap();
    unsafe {
        assert_eq!(gmj_body_id(h.model, pole.as_ptr()), -1);
        assert_eq!(last_error(), "body_name not found");
        assert_eq!(gmj_actuator_id(h.model, ptr::null()), -1);
        assert_eq!(last_error(), "invalid model pointer or actuator_name");
        assert!(gmj_joint_name(ptr::null(), 0).is_null());
        assert_eq!(last_error(), "invalid model pointer");
    }
}

#[test]
fn test_null_frees_are_noops() {
    setup();
    unsafe {
        gmj_model_free(ptr::null_mut());
        gmj_data_free(ptr::null_mut());
    }
    assert!(last_error().is_empty());
}

#[test]
fn test_error_channel_tracks_latest_call() {
    let h = Handles::load();
    let mut value = 0.0;
    unsafe {
        assert_ne!(gmj_get_qpos(h.model, h.data, 99, &mut value), ErrorCode::Ok);
        assert!(!last_error().is_empty(), "Failure leaves a message");
        assert_eq!(gmj_get_qpos(h.model, h.data, 0, &mut value), ErrorCode::Ok);
        assert!(last_error().is_empty(), "Success clears the message");
    }
}

#[test]
fn test_error_channel_is_per_thread() {
    setup();
    unsafe { gmj_nv(ptr::null()) };
    assert_eq!(last_error(), "model is null");

    let worker = std::thread::spawn(|| {
        let fresh = last_error();
        let mut value = 0.0;
        let code = unsafe { gmj_get_qpos(ptr::null(), ptr::null(), 0, &mut value) };
        (fresh, code, last_error())
    })
    .join()
    .unwrap();

    assert_eq!(worker.0, "", "A new thread starts clean");
    assert_eq!(worker.1, ErrorCode::InvalidArgument);
    assert_eq!(worker.2, "invalid model or data pointer");
    assert_eq!(last_error(), "model is null", "Worker failure must not leak across threads");
}

#[test]
fn test_load_failure_fills_buffer() {
    setup();
    let dir = tempfile::tempdir().unwrap();
    let missing = CString::new(dir.path().join("missing.json").to_str().unwrap()).unwrap();
    let mut buffer = [0 as c_char; 256];

    let model = unsafe { gmj_model_load_xml(missing.as_ptr(), buffer.as_mut_ptr(), buffer.len()) };
    assert!(model.is_null());
    let reported = unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_string_lossy().into_owned();
    assert!(reported.starts_with("could not read"), "Unexpected diagnostic: {reported}");
    assert_eq!(reported, last_error(), "Buffer and channel carry the same message");

    let model = unsafe { gmj_model_load_xml(ptr::null(), buffer.as_mut_ptr(), buffer.len()) };
    assert!(model.is_null());
    let reported = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    assert_eq!(reported.to_str().unwrap(), "xml_path is null");
}

#[test]
fn test_small_error_buffer_is_truncated() {
    setup();
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"{ "timestep": -1.0 }"#).unwrap();

    let c_path = CString::new(bad.to_str().unwrap()).unwrap();
    let mut buffer = [1 as c_char; 9];
    let model = unsafe { gmj_model_load_xml(c_path.as_ptr(), buffer.as_mut_ptr(), buffer.len()) };
    assert!(model.is_null());

    let reported = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    assert_eq!(reported.to_str().unwrap(), "timestep");
    assert_eq!(last_error(), "timestep must be positive");
}

#[test]
fn test_data_from_other_model_is_rejected() {
    let a = Handles::load();
    let b = Handles::load();
    let mut value = 0.0;
    unsafe {
        assert_eq!(gmj_get_qpos(a.model, b.data, 0, &mut value), ErrorCode::InvalidArgument);
        assert_eq!(last_error(), "data was not created from this model");
        assert_eq!(gmj_step(b.model, a.data, 1), ErrorCode::InvalidArgument);
    }
}

#[test]
fn test_data_create_requires_model() {
    setup();
    let data = unsafe { gmj_data_create(ptr::null()) };
    assert!(data.is_null());
    assert_eq!(last_error(), "model is null");
}
