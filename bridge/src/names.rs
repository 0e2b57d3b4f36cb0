//! Name resolution for bodies, joints and actuators.
//!
//! Lookups go straight to the engine's own name tables; the bridge keeps no
//! index of its own.

use std::ffi::{CStr, CString};

use crate::engine::ObjectKind;
use crate::error::{BridgeError, Result};
use crate::handle::Model;
use crate::validate;

impl Model {
    /// Index of the object called `name`.
    pub fn name_to_index(&self, kind: ObjectKind, name: &str) -> Result<usize> {
        let c_name = CString::new(name)
            .map_err(|_| BridgeError::invalid(format!("{}_name contains NUL", kind.label())))?;
        self.name_to_index_c(kind, &c_name)
    }

    pub(crate) fn name_to_index_c(&self, kind: ObjectKind, name: &CStr) -> Result<usize> {
        self.native()
            .name_to_index(kind, name)
            .filter(|&index| index < self.dimensions().object_count(kind))
            .ok_or_else(|| BridgeError::invalid(format!("{}_name not found", kind.label())))
    }

    /// Name of object `index`; `Ok(None)` for unnamed objects.
    pub fn index_to_name(&self, kind: ObjectKind, index: usize) -> Result<Option<&str>> {
        match self.index_to_name_c(kind, validate::signed(index))? {
            Some(name) => name
                .to_str()
                .map(Some)
                .map_err(|_| BridgeError::invalid(format!("{}_name is not UTF-8", kind.label()))),
            None => Ok(None),
        }
    }

    pub(crate) fn index_to_name_c(&self, kind: ObjectKind, index: i64) -> Result<Option<&CStr>> {
        let what = format!("{}_id", kind.label());
        let index = validate::index(index, self.dimensions().object_count(kind), &what)?;
        Ok(self.native().index_to_name(kind, index))
    }

    pub fn body_id(&self, name: &str) -> Result<usize> {
        self.name_to_index(ObjectKind::Body, name)
    }

    pub fn joint_id(&self, name: &str) -> Result<usize> {
        self.name_to_index(ObjectKind::Joint, name)
    }

    pub fn actuator_id(&self, name: &str) -> Result<usize> {
        self.name_to_index(ObjectKind::Actuator, name)
    }

    pub fn body_name(&self, index: usize) -> Result<Option<&str>> {
        self.index_to_name(ObjectKind::Body, index)
    }

    pub fn joint_name(&self, index: usize) -> Result<Option<&str>> {
        self.index_to_name(ObjectKind::Joint, index)
    }

    pub fn actuator_name(&self, index: usize) -> Result<Option<&str>> {
        self.index_to_name(ObjectKind::Actuator, index)
    }
}
