//! Error taxonomy and the stable result codes of the C ABI.
//!
//! The safe Rust API returns [`BridgeError`] directly. The flat C surface
//! collapses it into an [`ErrorCode`] and writes the message into the
//! per-thread error channel (see [`crate::channel`]).

use thiserror::Error;

/// Message reported by every operation when no engine is compiled in.
pub const UNAVAILABLE_MESSAGE: &str = "MuJoCo unavailable in this build";

/// Every way a bridge operation can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Absent pointers, malformed slice parameters, unresolved names.
    #[error("{0}")]
    InvalidArgument(String),

    /// The engine rejected the model descriptor.
    #[error("{0}")]
    LoadFailure(String),

    /// The engine could not allocate a model or state buffer.
    #[error("{0}")]
    Allocation(String),

    /// A well-formed index or slice that lies outside the vector.
    #[error("{0}")]
    IndexOutOfRange(String),

    /// The build carries no engine; the availability shim is active.
    #[error("MuJoCo unavailable in this build")]
    EngineUnavailable,

    /// The engine failed in a way the boundary caught (e.g. a panic).
    #[error("engine failure: {0}")]
    Engine(String),

    /// A configuration source could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::IndexOutOfRange(message.into())
    }

    /// Result code reported across the C ABI for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) | Self::Config(_) => ErrorCode::InvalidArgument,
            Self::LoadFailure(_) => ErrorCode::LoadFailure,
            Self::Allocation(_) => ErrorCode::Allocation,
            Self::IndexOutOfRange(_) => ErrorCode::IndexOutOfRange,
            Self::EngineUnavailable | Self::Engine(_) => ErrorCode::EngineFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

// ============================================================================
// RESULT CODES - STABLE FFI CONTRACT
// ============================================================================

/// Discriminated result of every fallible C entry point.
///
/// **This is part of the stable FFI contract. Do not renumber.**
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok = 0,
    InvalidArgument = 1,
    LoadFailure = 2,
    Allocation = 3,
    IndexOutOfRange = 4,
    EngineFailure = 5,
}

impl ErrorCode {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }
}

impl<T> From<&Result<T>> for ErrorCode {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => ErrorCode::Ok,
            Err(err) => err.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_discriminants_are_stable() {
        assert_eq!(ErrorCode::Ok as i32, 0);
        assert_eq!(ErrorCode::InvalidArgument as i32, 1);
        assert_eq!(ErrorCode::LoadFailure as i32, 2);
        assert_eq!(ErrorCode::Allocation as i32, 3);
        assert_eq!(ErrorCode::IndexOutOfRange as i32, 4);
        assert_eq!(ErrorCode::EngineFailure as i32, 5);
    }

    #[test]
    fn test_error_maps_to_code() {
        assert_eq!(BridgeError::invalid("x").code(), ErrorCode::InvalidArgument);
        assert_eq!(BridgeError::Config("x".into()).code(), ErrorCode::InvalidArgument);
        assert_eq!(BridgeError::LoadFailure("x".into()).code(), ErrorCode::LoadFailure);
        assert_eq!(BridgeError::Allocation("x".into()).code(), ErrorCode::Allocation);
        assert_eq!(BridgeError::out_of_range("x").code(), ErrorCode::IndexOutOfRange);
        assert_eq!(BridgeError::EngineUnavailable.code(), ErrorCode::EngineFailure);
        assert_eq!(BridgeError::Engine("x".into()).code(), ErrorCode::EngineFailure);
    }

    #[test]
    fn test_unavailable_message_matches_display() {
        assert_eq!(BridgeError::EngineUnavailable.to_string(), UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn test_code_from_result() {
        let ok: Result<u8> = Ok(1);
        let err: Result<u8> = Err(BridgeError::out_of_range("slice out of range"));
        assert!(ErrorCode::from(&ok).is_ok());
        assert_eq!(ErrorCode::from(&err), ErrorCode::IndexOutOfRange);
    }
}
