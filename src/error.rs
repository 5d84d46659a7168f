//! Error types and the JNI failure boundary
//!
//! Every bridge operation returns [`Result`]. At the JNI boundary the error
//! (or a Rust panic) is logged and turned into the entry point's fallback
//! value, so nothing ever unwinds into the JVM.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("null handle")]
    NullHandle,

    #[error("unknown handle {0}")]
    UnknownHandle(u64),

    #[error("handle {0} was already released")]
    ReleasedHandle(u64),

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("unsupported pixel format code {0}")]
    UnsupportedFormat(i32),

    #[error("{what} too small: need {required} bytes, got {actual}")]
    BufferTooSmall {
        what: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("invalid {what} stride {stride}, row needs at least {min} bytes")]
    InvalidStride {
        what: &'static str,
        stride: i64,
        min: usize,
    },

    #[error("dimension mismatch: buffer is {expected_width}x{expected_height}, caller passed {width}x{height}")]
    DimensionMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("failed to allocate {0} bytes")]
    Allocation(usize),

    #[error("image buffer is empty")]
    EmptyBuffer,

    #[error("vision backend unavailable: {0}")]
    BackendUnavailable(&'static str),

    #[error("vision backend error: {0}")]
    Backend(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JNI error: {0}")]
    Jni(#[from] jni::errors::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Run `f` at the JNI boundary.
///
/// Errors and panics are logged against `op` and replaced by `fallback`.
pub fn guard<T, F>(op: &str, fallback: T, f: F) -> T
where
    F: FnOnce() -> Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            log::error!("{} failed: {}", op, e);
            fallback
        }
        Err(payload) => {
            log::error!("{} panicked: {}", op, panic_message(payload.as_ref()));
            fallback
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_passes_value_through() {
        assert_eq!(guard("ok", 0, || Ok(7)), 7);
    }

    #[test]
    fn test_guard_maps_error_to_fallback() {
        let value = guard("err", -1, || Err(BridgeError::NullHandle));
        assert_eq!(value, -1);
    }

    #[test]
    fn test_guard_catches_panic() {
        let value: i64 = guard("boom", 0, || panic!("bad frame"));
        assert_eq!(value, 0);
    }

    #[test]
    fn test_error_messages() {
        let e = BridgeError::BufferTooSmall {
            what: "output buffer",
            required: 64,
            actual: 63,
        };
        assert_eq!(e.to_string(), "output buffer too small: need 64 bytes, got 63");
        assert_eq!(BridgeError::ReleasedHandle(3).to_string(), "handle 3 was already released");
    }
}
