//! Requests admitted by `pre_handle` and not yet handed to the queue.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, PoisonError};

use crate::request::SpeakRequest;

/// Pre-handled requests keyed by message id.
///
/// Lives outside the executor so duplicate and unknown keys are rejected
/// synchronously, before anything is queued.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: Mutex<HashMap<String, SpeakRequest>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `request`. Hands it back if the key is taken.
    pub fn insert(&self, request: SpeakRequest) -> Result<(), SpeakRequest> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(request.message_id().to_owned()) {
            Entry::Occupied(_) => Err(request),
            Entry::Vacant(slot) => {
                slot.insert(request);
                Ok(())
            }
        }
    }

    #[cfg(test)]
    pub fn contains(&self, message_id: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(message_id)
    }

    pub fn take(&self, message_id: &str) -> Option<SpeakRequest> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(message_id)
    }

    pub fn drain(&self) -> Vec<SpeakRequest> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, request)| request)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
