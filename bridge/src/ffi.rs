//! Flat C ABI (`gmj_*`).
//!
//! # Stable FFI Contract
//!
//! Handles are opaque pointers: `gmj_model_load_xml` and `gmj_data_create`
//! return a boxed [`Model`] / [`Data`], and the matching `*_free` reclaims it.
//! Freeing null is a no-op; freeing the same non-null pointer twice is
//! undefined.
//!
//! Every fallible entry point returns an [`ErrorCode`] (or a sentinel: null
//! handle, `-1`, null name) and refreshes the calling thread's error channel:
//! cleared on success, overwritten on failure. Read it with
//! `gmj_last_mujoco_error` before the next call on the same thread.
//!
//! ## Order of checks
//!
//! 1. Engine availability. With the shim active every entry point fails with
//!    `EngineFailure` and the message `"MuJoCo unavailable in this build"`,
//!    whatever the arguments.
//! 2. Handles: non-null, and the data handle belongs to the model.
//! 3. Indices and slices (`InvalidArgument` for negative, `IndexOutOfRange`
//!    for out-of-bounds).
//! 4. Caller buffers. A zero-count slice accepts a null pointer.
//!
//! Outputs are written only on success.
//!
//! # Usage from C#
//!
//! ```text
//! [DllImport("godot_mujoco_bridge")] static extern IntPtr gmj_model_load_xml(string path, byte[] err, UIntPtr cap);
//! [DllImport("godot_mujoco_bridge")] static extern int gmj_get_qpos_slice(IntPtr m, IntPtr d, int start, int count, double[] out);
//! ```
//!
//! # Panics
//!
//! Panics raised inside an entry point are caught and reported as
//! `EngineFailure`; unwinding never crosses the boundary. Engine-level fatal
//! errors that abort the process are outside this layer's control.

use std::any::Any;
use std::ffi::{c_char, c_int, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::OnceLock;

use crate::api::Bridge;
use crate::channel;
use crate::config::BridgeConfig;
use crate::engine::{ObjectKind, StateVector};
use crate::error::{BridgeError, ErrorCode, Result};
use crate::handle::{Data, Model};
use crate::logging;
use crate::validate;

static BRIDGE: OnceLock<Bridge> = OnceLock::new();

/// Install the process-wide bridge used by the C ABI. Fails (returning the
/// bridge) if one is already installed, including one built lazily by an
/// earlier call.
pub fn install(bridge: Bridge) -> std::result::Result<(), Bridge> {
    BRIDGE.set(bridge)
}

/// The process-wide bridge, built from the environment on first use.
pub fn bridge() -> &'static Bridge {
    BRIDGE.get_or_init(Bridge::from_env)
}

// ============================================================================
// PLUMBING
// ============================================================================

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in bridge call".to_string()
    }
}

/// Availability check, panic guard and error-channel update around `op`.
fn run_with<T>(bridge: &Bridge, op: impl FnOnce(&Bridge) -> Result<T>) -> Result<T> {
    let outcome = bridge.ensure_available().and_then(|()| {
        panic::catch_unwind(AssertUnwindSafe(|| op(bridge)))
            .unwrap_or_else(|payload| Err(BridgeError::Engine(panic_message(payload))))
    });
    channel::record(&outcome);
    outcome
}

fn run<T>(op: impl FnOnce(&Bridge) -> Result<T>) -> Result<T> {
    run_with(bridge(), op)
}

fn code(outcome: Result<()>) -> ErrorCode {
    ErrorCode::from(&outcome)
}

fn to_c_int(value: usize) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

unsafe fn dimension(model: *const Model, size: fn(&Model) -> usize) -> c_int {
    run(|_| {
        // SAFETY: caller contract.
        let model = unsafe { validate::model_ptr(model, "model is null") }?;
        Ok(to_c_int(size(model)))
    })
    .unwrap_or(-1)
}

unsafe fn name_to_index(model: *const Model, kind: ObjectKind, name: *const c_char) -> c_int {
    run(|_| {
        let message = format!("invalid model pointer or {}_name", kind.label());
        if name.is_null() {
            return Err(BridgeError::invalid(message));
        }
        // SAFETY: caller contract; `name` is a non-null NUL-terminated string.
        let (model, name) = unsafe { (validate::model_ptr(model, &message)?, CStr::from_ptr(name)) };
        model.name_to_index_c(kind, name).map(to_c_int)
    })
    .unwrap_or(-1)
}

unsafe fn index_to_name(model: *const Model, kind: ObjectKind, index: c_int) -> *const c_char {
    run(|_| {
        // SAFETY: caller contract.
        let model = unsafe { validate::model_ptr(model, "invalid model pointer") }?;
        let name = model.index_to_name_c(kind, i64::from(index))?;
        Ok(name.map_or(ptr::null(), CStr::as_ptr))
    })
    .unwrap_or(ptr::null())
}

unsafe fn get_scalar(
    model: *const Model,
    data: *const Data,
    vector: StateVector,
    index: c_int,
    out_value: *mut f64,
) -> ErrorCode {
    code(run(|_| {
        // SAFETY: caller contract.
        let (_, data) = unsafe { validate::pair(model, data) }?;
        let index = data.check_index(vector, i64::from(index))?;
        // SAFETY: caller contract.
        let out = unsafe { validate::out_ref(out_value, "out_value") }?;
        *out = data.get(vector, index)?;
        Ok(())
    }))
}

unsafe fn set_scalar(
    model: *const Model,
    data: *mut Data,
    vector: StateVector,
    index: c_int,
    value: f64,
) -> ErrorCode {
    code(run(|_| {
        // SAFETY: caller contract.
        let (_, data) = unsafe { validate::pair_mut(model, data) }?;
        let index = data.check_index(vector, i64::from(index))?;
        data.set(vector, index, value)
    }))
}

unsafe fn get_slice(
    model: *const Model,
    data: *const Data,
    vector: StateVector,
    start: c_int,
    count: c_int,
    out_values: *mut f64,
) -> ErrorCode {
    code(run(|_| {
        // SAFETY: caller contract.
        let (_, data) = unsafe { validate::pair(model, data) }?;
        let range = data.check_slice(vector, i64::from(start), i64::from(count))?;
        // SAFETY: caller guarantees `count` writable doubles.
        let out = unsafe { validate::out_slice(out_values, range.len(), "out_values") }?;
        data.read_slice(vector, range.start, out)
    }))
}

unsafe fn set_slice(
    model: *const Model,
    data: *mut Data,
    vector: StateVector,
    start: c_int,
    count: c_int,
    values: *const f64,
) -> ErrorCode {
    code(run(|_| {
        // SAFETY: caller contract.
        let (_, data) = unsafe { validate::pair_mut(model, data) }?;
        let range = data.check_slice(vector, i64::from(start), i64::from(count))?;
        // SAFETY: caller guarantees `count` readable doubles.
        let values = unsafe { validate::in_slice(values, range.len(), "values") }?;
        data.set_slice(vector, range.start, values)
    }))
}

// ============================================================================
// VERSION & LOGGING
// ============================================================================

/// Engine version string (`"unavailable"` for the shim). Valid for the
/// process lifetime. Does not touch the error channel.
#[no_mangle]
pub extern "C" fn gmj_mujoco_version() -> *const c_char {
    bridge().version_cstr().as_ptr()
}

/// Install a stderr tracing subscriber. Returns 1 if installed, 0 if one
/// already existed. Does not touch the error channel or build the bridge, so
/// engine selection is still logged and [`install`] still succeeds afterwards.
#[no_mangle]
pub extern "C" fn gmj_init_logging() -> c_int {
    let config = BridgeConfig::from_env();
    c_int::from(logging::init(config.log_filter.as_deref()))
}

/// Current thread's last error message; empty after a successful call.
#[no_mangle]
pub extern "C" fn gmj_last_mujoco_error() -> *const c_char {
    channel::as_ptr()
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Load a model. On failure returns null and copies the diagnostic into
/// `error_buffer` (if non-null) as well as the error channel.
///
/// # Safety
///
/// `xml_path` must be null or a NUL-terminated string. `error_buffer` must be
/// null or valid for `error_buffer_size` bytes.
#[no_mangle]
pub unsafe extern "C" fn gmj_model_load_xml(
    xml_path: *const c_char,
    error_buffer: *mut c_char,
    error_buffer_size: usize,
) -> *mut Model {
    let outcome = run(|bridge| {
        if xml_path.is_null() {
            return Err(BridgeError::invalid("xml_path is null"));
        }
        // SAFETY: non-null, caller guarantees NUL termination.
        let path = unsafe { CStr::from_ptr(xml_path) }
            .to_str()
            .map_err(|_| BridgeError::invalid("xml_path is not valid UTF-8"))?;
        bridge.load(path).map(Box::new)
    });

    match outcome {
        Ok(model) => Box::into_raw(model),
        Err(err) => {
            // SAFETY: caller contract.
            unsafe { channel::copy_to_c_buffer(&err.to_string(), error_buffer, error_buffer_size) };
            ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `model` must be null or a pointer from `gmj_model_load_xml` not yet freed.
#[no_mangle]
pub unsafe extern "C" fn gmj_model_free(model: *mut Model) {
    let _ = run(|_| {
        if !model.is_null() {
            // SAFETY: caller contract; ownership returns to Rust exactly once.
            drop(unsafe { Box::from_raw(model) });
        }
        Ok(())
    });
}

/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_data_create(model: *const Model) -> *mut Data {
    run(|bridge| {
        // SAFETY: caller contract.
        let model = unsafe { validate::model_ptr(model, "model is null") }?;
        bridge.create_data(model).map(Box::new)
    })
    .map_or(ptr::null_mut(), Box::into_raw)
}

/// # Safety
///
/// `data` must be null or a pointer from `gmj_data_create` not yet freed.
#[no_mangle]
pub unsafe extern "C" fn gmj_data_free(data: *mut Data) {
    let _ = run(|_| {
        if !data.is_null() {
            // SAFETY: caller contract; ownership returns to Rust exactly once.
            drop(unsafe { Box::from_raw(data) });
        }
        Ok(())
    });
}

// ============================================================================
// STEPPING
// ============================================================================

/// # Safety
///
/// Both pointers must be null or live handles; `data` not in use elsewhere.
#[no_mangle]
pub unsafe extern "C" fn gmj_reset_data(model: *const Model, data: *mut Data) -> ErrorCode {
    code(run(|_| {
        // SAFETY: caller contract.
        let (_, data) = unsafe { validate::pair_mut(model, data) }?;
        data.reset();
        Ok(())
    }))
}

/// Advance `steps >= 1` integration steps.
///
/// # Safety
///
/// Both pointers must be null or live handles; `data` not in use elsewhere.
#[no_mangle]
pub unsafe extern "C" fn gmj_step(model: *const Model, data: *mut Data, steps: c_int) -> ErrorCode {
    code(run(|_| {
        // SAFETY: caller contract.
        let (_, data) = unsafe { validate::pair_mut(model, data) }?;
        let steps = u32::try_from(steps).map_err(|_| BridgeError::invalid("steps must be >= 1"))?;
        data.step(steps)
    }))
}

/// # Safety
///
/// Both pointers must be null or live handles; `data` not in use elsewhere.
#[no_mangle]
pub unsafe extern "C" fn gmj_forward(model: *const Model, data: *mut Data) -> ErrorCode {
    code(run(|_| {
        // SAFETY: caller contract.
        let (_, data) = unsafe { validate::pair_mut(model, data) }?;
        data.forward();
        Ok(())
    }))
}

// ============================================================================
// DIMENSIONS (-1 on failure)
// ============================================================================

/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_nq(model: *const Model) -> c_int {
    unsafe { dimension(model, Model::nq) }
}

/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_nv(model: *const Model) -> c_int {
    unsafe { dimension(model, Model::nv) }
}

/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_nu(model: *const Model) -> c_int {
    unsafe { dimension(model, Model::nu) }
}

/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_nbody(model: *const Model) -> c_int {
    unsafe { dimension(model, Model::nbody) }
}

/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_njnt(model: *const Model) -> c_int {
    unsafe { dimension(model, Model::njnt) }
}

// ============================================================================
// NAMES
// ============================================================================

/// Index of the named body, `-1` if absent.
///
/// # Safety
///
/// `model` must be null or a live handle; `name` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn gmj_body_id(model: *const Model, name: *const c_char) -> c_int {
    unsafe { name_to_index(model, ObjectKind::Body, name) }
}

/// # Safety
///
/// `model` must be null or a live handle; `name` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn gmj_joint_id(model: *const Model, name: *const c_char) -> c_int {
    unsafe { name_to_index(model, ObjectKind::Joint, name) }
}

/// # Safety
///
/// `model` must be null or a live handle; `name` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn gmj_actuator_id(model: *const Model, name: *const c_char) -> c_int {
    unsafe { name_to_index(model, ObjectKind::Actuator, name) }
}

/// Name of body `id`. Null when out of range (error set) or unnamed (no
/// error). The string lives as long as the model.
///
/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_body_name(model: *const Model, id: c_int) -> *const c_char {
    unsafe { index_to_name(model, ObjectKind::Body, id) }
}

/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_joint_name(model: *const Model, id: c_int) -> *const c_char {
    unsafe { index_to_name(model, ObjectKind::Joint, id) }
}

/// # Safety
///
/// `model` must be null or a live model handle.
#[no_mangle]
pub unsafe extern "C" fn gmj_actuator_name(model: *const Model, id: c_int) -> *const c_char {
    unsafe { index_to_name(model, ObjectKind::Actuator, id) }
}

// ============================================================================
// SCALAR STATE
// ============================================================================

/// # Safety
///
/// Handles null or live; `out_value` null or writable.
#[no_mangle]
pub unsafe extern "C" fn gmj_get_qpos(
    model: *const Model,
    data: *const Data,
    qpos_index: c_int,
    out_value: *mut f64,
) -> ErrorCode {
    unsafe { get_scalar(model, data, StateVector::Qpos, qpos_index, out_value) }
}

/// # Safety
///
/// Handles null or live; `data` not in use elsewhere.
#[no_mangle]
pub unsafe extern "C" fn gmj_set_qpos(
    model: *const Model,
    data: *mut Data,
    qpos_index: c_int,
    value: f64,
) -> ErrorCode {
    unsafe { set_scalar(model, data, StateVector::Qpos, qpos_index, value) }
}

/// # Safety
///
/// Handles null or live; `out_value` null or writable.
#[no_mangle]
pub unsafe extern "C" fn gmj_get_qvel(
    model: *const Model,
    data: *const Data,
    qvel_index: c_int,
    out_value: *mut f64,
) -> ErrorCode {
    unsafe { get_scalar(model, data, StateVector::Qvel, qvel_index, out_value) }
}

/// # Safety
///
/// Handles null or live; `data` not in use elsewhere.
#[no_mangle]
pub unsafe extern "C" fn gmj_set_qvel(
    model: *const Model,
    data: *mut Data,
    qvel_index: c_int,
    value: f64,
) -> ErrorCode {
    unsafe { set_scalar(model, data, StateVector::Qvel, qvel_index, value) }
}

/// # Safety
///
/// Handles null or live; `out_value` null or writable.
#[no_mangle]
pub unsafe extern "C" fn gmj_get_ctrl(
    model: *const Model,
    data: *const Data,
    actuator_index: c_int,
    out_value: *mut f64,
) -> ErrorCode {
    unsafe { get_scalar(model, data, StateVector::Ctrl, actuator_index, out_value) }
}

/// # Safety
///
/// Handles null or live; `data` not in use elsewhere.
#[no_mangle]
pub unsafe extern "C" fn gmj_set_ctrl(
    model: *const Model,
    data: *mut Data,
    actuator_index: c_int,
    value: f64,
) -> ErrorCode {
    unsafe { set_scalar(model, data, StateVector::Ctrl, actuator_index, value) }
}

// ============================================================================
// SLICED STATE
// ============================================================================

/// # Safety
///
/// Handles null or live; `out_values` null or writable for `count` doubles.
#[no_mangle]
pub unsafe extern "C" fn gmj_get_qpos_slice(
    model: *const Model,
    data: *const Data,
    start_index: c_int,
    count: c_int,
    out_values: *mut f64,
) -> ErrorCode {
    unsafe { get_slice(model, data, StateVector::Qpos, start_index, count, out_values) }
}

/// # Safety
///
/// Handles null or live; `values` null or readable for `count` doubles.
#[no_mangle]
pub unsafe extern "C" fn gmj_set_qpos_slice(
    model: *const Model,
    data: *mut Data,
    start_index: c_int,
    count: c_int,
    values: *const f64,
) -> ErrorCode {
    unsafe { set_slice(model, data, StateVector::Qpos, start_index, count, values) }
}

/// # Safety
///
/// Handles null or live; `out_values` null or writable for `count` doubles.
#[no_mangle]
pub unsafe extern "C" fn gmj_get_qvel_slice(
    model: *const Model,
    data: *const Data,
    start_index: c_int,
    count: c_int,
    out_values: *mut f64,
) -> ErrorCode {
    unsafe { get_slice(model, data, StateVector::Qvel, start_index, count, out_values) }
}

/// # Safety
///
/// Handles null or live; `values` null or readable for `count` doubles.
#[no_mangle]
pub unsafe extern "C" fn gmj_set_qvel_slice(
    model: *const Model,
    data: *mut Data,
    start_index: c_int,
    count: c_int,
    values: *const f64,
) -> ErrorCode {
    unsafe { set_slice(model, data, StateVector::Qvel, start_index, count, values) }
}

/// # Safety
///
/// Handles null or live; `out_values` null or writable for `count` doubles.
#[no_mangle]
pub unsafe extern "C" fn gmj_get_ctrl_slice(
    model: *const Model,
    data: *const Data,
    start_index: c_int,
    count: c_int,
    out_values: *mut f64,
) -> ErrorCode {
    unsafe { get_slice(model, data, StateVector::Ctrl, start_index, count, out_values) }
}

/// # Safety
///
/// Handles null or live; `values` null or readable for `count` doubles.
#[no_mangle]
pub unsafe extern "C" fn gmj_set_ctrl_slice(
    model: *const Model,
    data: *mut Data,
    start_index: c_int,
    count: c_int,
    values: *const f64,
) -> ErrorCode {
    unsafe { set_slice(model, data, StateVector::Ctrl, start_index, count, values) }
}

/// World position of `body_index` as of the last `gmj_step` / `gmj_forward`,
/// written to `out_xyz_3[0..3]`.
///
/// # Safety
///
/// Handles null or live; `out_xyz_3` null or writable for 3 doubles.
#[no_mangle]
pub unsafe extern "C" fn gmj_body_world_position(
    model: *const Model,
    data: *const Data,
    body_index: c_int,
    out_xyz_3: *mut f64,
) -> ErrorCode {
    code(run(|_| {
        // SAFETY: caller contract.
        let (_, data) = unsafe { validate::pair(model, data) }?;
        let xyz = data.body_world_position(usize::try_from(body_index).map_err(|_| {
            BridgeError::out_of_range("body_index out of range")
        })?)?;
        // SAFETY: caller guarantees 3 writable doubles.
        let out = unsafe { validate::out_slice(out_xyz_3, 3, "out_xyz_3") }?;
        out.copy_from_slice(&xyz);
        Ok(())
    }))
}
