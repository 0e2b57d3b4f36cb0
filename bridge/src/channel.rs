//! Per-thread last-error channel for the C ABI.
//!
//! One fixed-capacity, NUL-terminated message per thread. Every C entry point
//! either clears it (success) or overwrites it (failure); there is no
//! history, so a caller must read it before issuing its next call on the same
//! thread. Threads never observe each other's messages.
//!
//! The pointer returned by [`as_ptr`] stays valid for the lifetime of the
//! calling thread; its contents change on the next bridge call from that
//! thread.

use std::cell::RefCell;
use std::ffi::c_char;

use crate::error::Result;

/// Buffer size in bytes, including the terminating NUL.
pub const ERROR_CAPACITY: usize = 1024;

thread_local! {
    static LAST_ERROR: RefCell<[u8; ERROR_CAPACITY]> = const { RefCell::new([0; ERROR_CAPACITY]) };
}

/// Longest prefix of `message` that fits in `max_bytes` without splitting a
/// UTF-8 sequence. Stops at an interior NUL.
pub fn truncate(message: &str, max_bytes: usize) -> &str {
    let message = message.split('\0').next().unwrap_or_default();
    if message.len() <= max_bytes {
        return message;
    }
    let mut end = max_bytes;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

/// Overwrite the current thread's message.
pub fn set(message: &str) {
    let message = truncate(message, ERROR_CAPACITY - 1);
    LAST_ERROR.with(|slot| {
        let mut buffer = slot.borrow_mut();
        buffer[..message.len()].copy_from_slice(message.as_bytes());
        buffer[message.len()] = 0;
    });
}

/// Empty the current thread's message.
pub fn clear() {
    LAST_ERROR.with(|slot| slot.borrow_mut()[0] = 0);
}

/// Clear on success, overwrite with the error's message on failure.
pub fn record<T>(outcome: &Result<T>) {
    match outcome {
        Ok(_) => clear(),
        Err(err) => set(&err.to_string()),
    }
}

/// Copy of the current thread's message.
pub fn message() -> String {
    LAST_ERROR.with(|slot| {
        let buffer = slot.borrow();
        let len = buffer.iter().position(|&b| b == 0).unwrap_or(ERROR_CAPACITY);
        String::from_utf8_lossy(&buffer[..len]).into_owned()
    })
}

/// Raw pointer to the current thread's NUL-terminated message.
pub fn as_ptr() -> *const c_char {
    LAST_ERROR.with(|slot| slot.as_ptr().cast::<c_char>().cast_const())
}

/// Copy `message` into a caller-owned C buffer, truncating and terminating.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes.
pub unsafe fn copy_to_c_buffer(message: &str, buffer: *mut c_char, capacity: usize) {
    if buffer.is_null() || capacity == 0 {
        return;
    }
    let message = truncate(message, capacity - 1);
    // SAFETY: caller guarantees `capacity` writable bytes; we write at most
    // `capacity - 1` message bytes plus the terminator.
    unsafe {
        std::ptr::copy_nonoverlapping(message.as_ptr().cast::<c_char>(), buffer, message.len());
        *buffer.add(message.len()) = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::ffi::CStr;

    #[test]
    fn test_set_and_clear() {
        set("slice out of range");
        assert_eq!(message(), "slice out of range");
        clear();
        assert_eq!(message(), "");
    }

    #[test]
    fn test_pointer_reflects_message() {
        set("model is null");
        let text = unsafe { CStr::from_ptr(as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "model is null");
    }

    #[test]
    fn test_long_message_is_truncated() {
        let long = "x".repeat(ERROR_CAPACITY * 2);
        set(&long);
        assert_eq!(message().len(), ERROR_CAPACITY - 1, "Message should fill the buffer minus NUL");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // 'é' is two bytes; cutting at 3 must not split the second one
        assert_eq!(truncate("éé", 3), "é");
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("ab\0cd", 10), "ab");
    }

    #[test]
    fn test_record_clears_on_success() {
        set("stale");
        record::<()>(&Ok(()));
        assert!(message().is_empty());

        record::<()>(&Err(BridgeError::invalid("steps must be >= 1")));
        assert_eq!(message(), "steps must be >= 1");
    }

    #[test]
    fn test_threads_are_isolated() {
        set("main thread error");
        let other = std::thread::spawn(|| {
            let before = message();
            set("worker error");
            (before, message())
        })
        .join()
        .unwrap();

        assert_eq!(other.0, "", "New thread starts with an empty message");
        assert_eq!(other.1, "worker error");
        assert_eq!(message(), "main thread error", "Worker must not clobber main thread");
    }

    #[test]
    fn test_copy_to_c_buffer() {
        let mut buffer = [1 as c_char; 8];
        unsafe { copy_to_c_buffer("xml_path is null", buffer.as_mut_ptr(), buffer.len()) };
        let text = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "xml_pat");

        // Null buffer is ignored
        unsafe { copy_to_c_buffer("ignored", std::ptr::null_mut(), 16) };
    }
}
