//! Validation layer.
//!
//! Runs before every state access. Three kinds of checks:
//!
//! - **Handles**: C pointers must be non-null, and a data handle must have
//!   been created from the model it is passed with.
//! - **Slices** `(start, count, length)`: malformed requests (negative start
//!   or count) are `InvalidArgument` and are checked first; well-formed but
//!   out-of-bounds requests are `IndexOutOfRange`.
//! - **Scalar indices**: must lie in `[0, dimension)`, else `IndexOutOfRange`.
//!
//! Indices are taken as `i64` so the signed C arguments and the unsigned
//! Rust ones share one implementation.

use std::ops::Range;

use crate::error::{BridgeError, Result};
use crate::handle::{Data, Model};

/// Convert an unsigned Rust index to the signed domain used here.
#[inline]
pub fn signed(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Validate `(start, count)` against a vector of `length` elements and
/// return the element range.
pub fn slice(start: i64, count: i64, length: usize) -> Result<Range<usize>> {
    if count < 0 || start < 0 {
        return Err(BridgeError::invalid("slice start/count must be non-negative"));
    }
    let length = signed(length);
    if start > length || count > length - start {
        return Err(BridgeError::out_of_range("slice out of range"));
    }
    // Both fit in usize: 0 <= start <= start + count <= length
    let start = start as usize;
    Ok(start..start + count as usize)
}

/// Validate a scalar index against `dimension`. `what` names the index in
/// the error message (e.g. `qpos_index`).
pub fn index(index: i64, dimension: usize, what: &str) -> Result<usize> {
    if index < 0 || index >= signed(dimension) {
        return Err(BridgeError::out_of_range(format!("{what} out of range")));
    }
    Ok(index as usize)
}

/// A data handle must only be used with the model it was created from.
pub fn ownership(model: &Model, data: &Data) -> Result<()> {
    if data.model_id() != model.id() {
        return Err(BridgeError::invalid("data was not created from this model"));
    }
    Ok(())
}

// ============================================================================
// RAW POINTERS (C ABI)
// ============================================================================

/// # Safety
///
/// `model` must be null or a live pointer returned by `gmj_model_load_xml`.
pub unsafe fn model_ptr<'a>(model: *const Model, message: &str) -> Result<&'a Model> {
    // SAFETY: caller contract.
    unsafe { model.as_ref() }.ok_or_else(|| BridgeError::invalid(message))
}

/// Resolve a (model, data) pair for reading.
///
/// # Safety
///
/// Both pointers must be null or live handles from this library.
pub unsafe fn pair<'a>(model: *const Model, data: *const Data) -> Result<(&'a Model, &'a Data)> {
    // SAFETY: caller contract.
    let (model, data) = match unsafe { (model.as_ref(), data.as_ref()) } {
        (Some(model), Some(data)) => (model, data),
        _ => return Err(BridgeError::invalid("invalid model or data pointer")),
    };
    ownership(model, data)?;
    Ok((model, data))
}

/// Resolve a (model, data) pair for mutation.
///
/// # Safety
///
/// Both pointers must be null or live handles from this library, and no
/// other thread may be using `data`.
pub unsafe fn pair_mut<'a>(
    model: *const Model,
    data: *mut Data,
) -> Result<(&'a Model, &'a mut Data)> {
    // SAFETY: caller contract.
    let (model, data) = match unsafe { (model.as_ref(), data.as_mut()) } {
        (Some(model), Some(data)) => (model, data),
        _ => return Err(BridgeError::invalid("invalid model or data pointer")),
    };
    ownership(model, data)?;
    Ok((model, data))
}

/// Non-null output location.
///
/// # Safety
///
/// `ptr` must be null or valid for writes of one `T`.
pub unsafe fn out_ref<'a, T>(ptr: *mut T, what: &str) -> Result<&'a mut T> {
    // SAFETY: caller contract.
    unsafe { ptr.as_mut() }.ok_or_else(|| BridgeError::invalid(format!("{what} is null")))
}

/// Caller-owned output array of `len` doubles. Null is accepted when
/// `len == 0`.
///
/// # Safety
///
/// `ptr` must be null or valid for writes of `len` doubles.
pub unsafe fn out_slice<'a>(ptr: *mut f64, len: usize, what: &str) -> Result<&'a mut [f64]> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(BridgeError::invalid(format!("{what} is null")));
    }
    // SAFETY: non-null, caller guarantees `len` writable elements.
    Ok(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
}

/// Caller-owned input array of `len` doubles. Null is accepted when
/// `len == 0`.
///
/// # Safety
///
/// `ptr` must be null or valid for reads of `len` doubles.
pub unsafe fn in_slice<'a>(ptr: *const f64, len: usize, what: &str) -> Result<&'a [f64]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(BridgeError::invalid(format!("{what} is null")));
    }
    // SAFETY: non-null, caller guarantees `len` readable elements.
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn code(result: Result<Range<usize>>) -> ErrorCode {
        ErrorCode::from(&result)
    }

    #[test]
    fn test_slice_valid_ranges() {
        assert_eq!(slice(0, 0, 0).unwrap(), 0..0);
        assert_eq!(slice(0, 3, 3).unwrap(), 0..3);
        assert_eq!(slice(1, 2, 3).unwrap(), 1..3);
        assert_eq!(slice(3, 0, 3).unwrap(), 3..3, "Empty slice at the end is allowed");
    }

    #[test]
    fn test_slice_negative_is_invalid_argument() {
        for (start, count) in [(-1, 0), (0, -1), (-5, -5), (-1, 10), (100, -1)] {
            assert_eq!(
                code(slice(start, count, 4)),
                ErrorCode::InvalidArgument,
                "({start}, {count}) should be malformed"
            );
        }
    }

    #[test]
    fn test_slice_out_of_bounds() {
        for (start, count) in [(5, 0), (4, 1), (0, 5), (2, 3), (i64::MAX, 1), (1, i64::MAX)] {
            assert_eq!(
                code(slice(start, count, 4)),
                ErrorCode::IndexOutOfRange,
                "({start}, {count}) should be out of range"
            );
        }
    }

    #[test]
    fn test_slice_exhaustive_small() {
        // Every (start, count) pair against every small length
        for length in 0..6usize {
            for start in -2..8i64 {
                for count in -2..8i64 {
                    let result = code(slice(start, count, length));
                    let expected = if start < 0 || count < 0 {
                        ErrorCode::InvalidArgument
                    } else if start + count > length as i64 {
                        ErrorCode::IndexOutOfRange
                    } else {
                        ErrorCode::Ok
                    };
                    assert_eq!(result, expected, "start={start} count={count} len={length}");
                }
            }
        }
    }

    #[test]
    fn test_scalar_index() {
        assert_eq!(index(0, 2, "qpos_index").unwrap(), 0);
        assert_eq!(index(1, 2, "qpos_index").unwrap(), 1);

        let err = index(2, 2, "qpos_index").unwrap_err();
        assert_eq!(err, BridgeError::out_of_range("qpos_index out of range"));
        assert_eq!(index(-1, 2, "qpos_index").unwrap_err().code(), ErrorCode::IndexOutOfRange);
        assert!(index(0, 0, "actuator_index").is_err(), "Empty vector has no valid index");
    }

    #[test]
    fn test_raw_slices() {
        let out = unsafe { out_slice(std::ptr::null_mut(), 0, "out_values") }.unwrap();
        assert!(out.is_empty());
        let err = unsafe { out_slice(std::ptr::null_mut(), 2, "out_values") }.unwrap_err();
        assert_eq!(err, BridgeError::invalid("out_values is null"));

        let values = [1.0, 2.0];
        let input = unsafe { in_slice(values.as_ptr(), 2, "values") }.unwrap();
        assert_eq!(input, &[1.0, 2.0]);
        assert!(unsafe { in_slice(std::ptr::null(), 1, "values") }.is_err());
    }

    #[test]
    fn test_null_handles() {
        let err = unsafe { pair(std::ptr::null(), std::ptr::null()) }.unwrap_err();
        assert_eq!(err, BridgeError::invalid("invalid model or data pointer"));
        let err = unsafe { model_ptr(std::ptr::null(), "model is null") }.unwrap_err();
        assert_eq!(err, BridgeError::invalid("model is null"));
    }
}
