//! Handle registry - Opaque handles for native image buffers
//!
//! The app only ever sees a `jlong`. Handles come from a monotonically
//! increasing counter and are never reused, so once a buffer is released
//! any later use of its handle is reported as [`BridgeError::ReleasedHandle`]
//! instead of touching freed memory. Handle `0` is the null sentinel.

use rustc_hash::FxHashMap;

use crate::error::{BridgeError, Result};
use crate::image_engine::ImageBuffer;

/// Null handle as seen from Java
pub const NULL_HANDLE: u64 = 0;

pub struct HandleRegistry {
    next: u64,
    buffers: FxHashMap<u64, ImageBuffer>,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            next: 1,
            buffers: FxHashMap::default(),
        }
    }

    /// Take ownership of `buffer` and issue a fresh handle for it.
    pub fn insert(&mut self, buffer: ImageBuffer) -> u64 {
        let handle = self.next;
        self.next += 1;
        self.buffers.insert(handle, buffer);
        handle
    }

    fn missing(&self, handle: u64) -> BridgeError {
        if handle == NULL_HANDLE {
            BridgeError::NullHandle
        } else if handle < self.next {
            BridgeError::ReleasedHandle(handle)
        } else {
            BridgeError::UnknownHandle(handle)
        }
    }

    pub fn get(&self, handle: u64) -> Result<&ImageBuffer> {
        match self.buffers.get(&handle) {
            Some(buffer) => Ok(buffer),
            None => Err(self.missing(handle)),
        }
    }

    pub fn get_mut(&mut self, handle: u64) -> Result<&mut ImageBuffer> {
        let missing = self.missing(handle);
        self.buffers.get_mut(&handle).ok_or(missing)
    }

    /// Drop the buffer behind `handle`.
    ///
    /// The null handle is accepted and ignored.
    pub fn release(&mut self, handle: u64) -> Result<()> {
        if handle == NULL_HANDLE {
            return Ok(());
        }
        match self.buffers.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(self.missing(handle)),
        }
    }

    /// Live buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
