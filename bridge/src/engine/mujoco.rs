//! MuJoCo backend.
//!
//! Links `libmujoco` directly for loading, stepping and name lookup, and
//! goes through the accessor shim compiled by `build.rs` for struct fields,
//! so nothing here depends on the layout of `mjModel` / `mjData`.
//!
//! ## Limitations
//!
//! - MuJoCo reports fatal errors through `mju_error`, whose default handler
//!   terminates the process. The bridge does not install a handler; a
//!   diverging integration mid-way through `gmj_step(n)` is outside its
//!   control.
//! - Stepping is not transactional: `step(n)` that fails internally leaves
//!   whatever state MuJoCo left behind.

use std::ffi::{c_char, c_int, CStr, CString};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use super::{
    narrow_into, widen_into, Dimensions, Engine, EngineKind, NativeData, NativeModel, ObjectKind,
    StateVector,
};
use crate::channel;
use crate::error::{BridgeError, Result};

/// Scalar type of MuJoCo's state arrays (`mjtNum`).
#[cfg(not(feature = "mujoco-single"))]
pub type MjtNum = f64;
#[cfg(feature = "mujoco-single")]
pub type MjtNum = f32;

mod sys {
    use super::MjtNum;
    use std::ffi::{c_char, c_int, c_void};

    #[repr(C)]
    pub struct MjModel {
        _private: [u8; 0],
    }

    #[repr(C)]
    pub struct MjData {
        _private: [u8; 0],
    }

    pub const VECTOR_QPOS: c_int = 0;
    pub const VECTOR_QVEL: c_int = 1;
    pub const VECTOR_CTRL: c_int = 2;
    pub const VECTOR_XPOS: c_int = 3;

    extern "C" {
        pub fn mj_version() -> c_int;
        pub fn mj_loadXML(
            filename: *const c_char,
            vfs: *const c_void,
            error: *mut c_char,
            error_sz: c_int,
        ) -> *mut MjModel;
        pub fn mj_deleteModel(m: *mut MjModel);
        pub fn mj_makeData(m: *const MjModel) -> *mut MjData;
        pub fn mj_deleteData(d: *mut MjData);
        pub fn mj_resetData(m: *const MjModel, d: *mut MjData);
        pub fn mj_step(m: *const MjModel, d: *mut MjData);
        pub fn mj_forward(m: *const MjModel, d: *mut MjData);
        pub fn mj_name2id(m: *const MjModel, kind: c_int, name: *const c_char) -> c_int;
        pub fn mj_id2name(m: *const MjModel, kind: c_int, id: c_int) -> *const c_char;

        // native/gmj_shim.c
        pub fn gmj_shim_scalar_size() -> c_int;
        pub fn gmj_shim_object_type(kind: c_int) -> c_int;
        pub fn gmj_shim_sizes(m: *const MjModel, out: *mut c_int);
        pub fn gmj_shim_vector(d: *mut MjData, which: c_int) -> *mut MjtNum;
    }
}

fn object_type(kind: ObjectKind) -> c_int {
    let shim_kind = match kind {
        ObjectKind::Body => 0,
        ObjectKind::Joint => 1,
        ObjectKind::Actuator => 2,
    };
    // SAFETY: pure function over an enum tag.
    unsafe { sys::gmj_shim_object_type(shim_kind) }
}

fn to_usize(value: c_int) -> usize {
    usize::try_from(value).unwrap_or(0)
}

// ============================================================================
// MODEL
// ============================================================================

/// Owning wrapper around `mjModel*`.
pub struct MujocoModel {
    raw: NonNull<sys::MjModel>,
    dims: Dimensions,
}

// SAFETY: an mjModel is never mutated after mj_loadXML returns; MuJoCo
// documents concurrent read access as safe.
unsafe impl Send for MujocoModel {}
unsafe impl Sync for MujocoModel {}

impl Drop for MujocoModel {
    fn drop(&mut self) {
        // SAFETY: `raw` came from mj_loadXML and is released exactly once here.
        unsafe { sys::mj_deleteModel(self.raw.as_ptr()) };
    }
}

impl MujocoModel {
    fn as_ptr(&self) -> *const sys::MjModel {
        self.raw.as_ptr()
    }
}

impl NativeModel for MujocoModel {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }

    fn name_to_index(&self, kind: ObjectKind, name: &CStr) -> Option<usize> {
        // SAFETY: live model, NUL-terminated name.
        let id = unsafe { sys::mj_name2id(self.as_ptr(), object_type(kind), name.as_ptr()) };
        usize::try_from(id).ok()
    }

    fn index_to_name(&self, kind: ObjectKind, index: usize) -> Option<&CStr> {
        let id = c_int::try_from(index).ok()?;
        // SAFETY: index validated against the category count by the caller.
        let name = unsafe { sys::mj_id2name(self.as_ptr(), object_type(kind), id) };
        if name.is_null() {
            return None;
        }
        // SAFETY: MuJoCo names live in the model's name buffer, which lives
        // as long as `self`.
        Some(unsafe { CStr::from_ptr(name) })
    }

    fn make_data(self: Arc<Self>) -> Result<Box<dyn NativeData>> {
        // SAFETY: live model.
        let raw = unsafe { sys::mj_makeData(self.as_ptr()) };
        let raw = NonNull::new(raw)
            .ok_or_else(|| BridgeError::Allocation("failed to allocate mjData".to_string()))?;
        Ok(Box::new(MujocoData { model: self, raw }))
    }
}

// ============================================================================
// DATA
// ============================================================================

/// Owning wrapper around `mjData*`. Holds its model alive.
pub struct MujocoData {
    model: Arc<MujocoModel>,
    raw: NonNull<sys::MjData>,
}

// SAFETY: an mjData is only touched through `&mut self` for writes, and the
// bridge never shares a data handle between threads without exclusion.
unsafe impl Send for MujocoData {}

impl Drop for MujocoData {
    fn drop(&mut self) {
        // SAFETY: `raw` came from mj_makeData and is released exactly once here.
        unsafe { sys::mj_deleteData(self.raw.as_ptr()) };
    }
}

impl MujocoData {
    fn array(&self, which: c_int, len: usize) -> &[MjtNum] {
        if len == 0 {
            return &[];
        }
        // SAFETY: the shim returns the mjData array for `which`, which MuJoCo
        // sizes from the same model the dimensions came from.
        unsafe {
            let ptr = sys::gmj_shim_vector(self.raw.as_ptr(), which);
            std::slice::from_raw_parts(ptr, len)
        }
    }

    fn array_mut(&mut self, which: c_int, len: usize) -> &mut [MjtNum] {
        if len == 0 {
            return &mut [];
        }
        // SAFETY: as in `array`, with exclusive access through `&mut self`.
        unsafe {
            let ptr = sys::gmj_shim_vector(self.raw.as_ptr(), which);
            std::slice::from_raw_parts_mut(ptr, len)
        }
    }

    fn vector_tag(&self, vector: StateVector) -> (c_int, usize) {
        let dims = self.model.dims;
        match vector {
            StateVector::Qpos => (sys::VECTOR_QPOS, dims.nq),
            StateVector::Qvel => (sys::VECTOR_QVEL, dims.nv),
            StateVector::Ctrl => (sys::VECTOR_CTRL, dims.nu),
        }
    }
}

impl NativeData for MujocoData {
    fn reset(&mut self) {
        // SAFETY: data was made from this model.
        unsafe { sys::mj_resetData(self.model.as_ptr(), self.raw.as_ptr()) };
    }

    fn step(&mut self) {
        // SAFETY: data was made from this model.
        unsafe { sys::mj_step(self.model.as_ptr(), self.raw.as_ptr()) };
    }

    fn forward(&mut self) {
        // SAFETY: data was made from this model.
        unsafe { sys::mj_forward(self.model.as_ptr(), self.raw.as_ptr()) };
    }

    fn read(&self, vector: StateVector, start: usize, out: &mut [f64]) {
        let (which, len) = self.vector_tag(vector);
        let src = self.array(which, len);
        widen_into(&src[start..start + out.len()], out);
    }

    fn write(&mut self, vector: StateVector, start: usize, values: &[f64]) {
        let (which, len) = self.vector_tag(vector);
        let dst = self.array_mut(which, len);
        narrow_into(values, &mut dst[start..start + values.len()]);
    }

    fn body_position(&self, body: usize) -> [f64; 3] {
        let xpos = self.array(sys::VECTOR_XPOS, self.model.dims.nbody * 3);
        let mut out = [0.0; 3];
        widen_into(&xpos[body * 3..body * 3 + 3], &mut out);
        out
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Loads MJCF / URDF through `mj_loadXML`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MujocoEngine;

impl Engine for MujocoEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Mujoco
    }

    fn version(&self) -> String {
        // SAFETY: no preconditions.
        let ver = unsafe { sys::mj_version() };
        format!("{}.{}.{}", ver / 100, (ver / 10) % 10, ver % 10)
    }

    fn load(&self, path: &Path, diagnostic_capacity: usize) -> Result<Arc<dyn NativeModel>> {
        // SAFETY: no preconditions.
        let scalar_size = unsafe { sys::gmj_shim_scalar_size() };
        if to_usize(scalar_size) != std::mem::size_of::<MjtNum>() {
            return Err(BridgeError::Engine(format!(
                "mjtNum is {} bytes but the bridge was built for {}",
                scalar_size,
                std::mem::size_of::<MjtNum>()
            )));
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| BridgeError::invalid("xml_path is not valid UTF-8"))?;
        let c_path =
            CString::new(path_str).map_err(|_| BridgeError::invalid("xml_path contains NUL"))?;

        let capacity = diagnostic_capacity.clamp(1, c_int::MAX as usize);
        let mut diagnostic = vec![0 as c_char; capacity];

        // SAFETY: path is NUL-terminated, the diagnostic buffer holds
        // `capacity` bytes and MuJoCo terminates what it writes.
        let raw = unsafe {
            sys::mj_loadXML(
                c_path.as_ptr(),
                std::ptr::null(),
                diagnostic.as_mut_ptr(),
                capacity as c_int,
            )
        };

        let Some(raw) = NonNull::new(raw) else {
            // Guarantee termination even if the loader filled the buffer
            if let Some(last) = diagnostic.last_mut() {
                *last = 0;
            }
            // SAFETY: terminated above.
            let message = unsafe { CStr::from_ptr(diagnostic.as_ptr()) }.to_string_lossy();
            let message = if message.is_empty() {
                format!("failed to load '{}'", path.display())
            } else {
                channel::truncate(&message, capacity - 1).to_string()
            };
            return Err(BridgeError::LoadFailure(message));
        };

        let mut sizes = [0 as c_int; 5];
        // SAFETY: live model, `sizes` holds the five ints the shim writes.
        unsafe { sys::gmj_shim_sizes(raw.as_ptr(), sizes.as_mut_ptr()) };
        let dims = Dimensions {
            nq: to_usize(sizes[0]),
            nv: to_usize(sizes[1]),
            nu: to_usize(sizes[2]),
            nbody: to_usize(sizes[3]),
            njnt: to_usize(sizes[4]),
        };

        Ok(Arc::new(MujocoModel { raw, dims }))
    }
}
