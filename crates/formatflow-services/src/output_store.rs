//! In-memory registry of converted bytes.
//!
//! The store is the only owner of output bytes. Everything else refers to an
//! output through its [`OutputHandle`]; once released, a handle never resolves
//! again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use formatflow_core::OutputHandle;

use crate::error::OutputStoreError;

#[derive(Clone, Default)]
pub struct OutputStore {
    entries: Arc<Mutex<HashMap<OutputHandle, Bytes>>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<OutputHandle, Bytes>> {
        // Entries stay consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, data: Bytes) -> OutputHandle {
        let handle = OutputHandle::new();
        let size = data.len();
        self.entries().insert(handle, data);
        tracing::debug!(output = %handle, size, "Output registered");
        handle
    }

    pub fn fetch(&self, handle: OutputHandle) -> Result<Bytes, OutputStoreError> {
        self.entries()
            .get(&handle)
            .cloned()
            .ok_or(OutputStoreError::NotFound(handle))
    }

    /// Release `handle`. Returns false if it was already released or unknown.
    pub fn release(&self, handle: OutputHandle) -> bool {
        let released = self.entries().remove(&handle).is_some();
        if released {
            tracing::debug!(output = %handle, "Output released");
        }
        released
    }

    /// Release every handle and return how many there were.
    pub fn release_all(&self) -> usize {
        let mut entries = self.entries();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn contains(&self, handle: OutputHandle) -> bool {
        self.entries().contains_key(&handle)
    }
}
