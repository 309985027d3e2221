//! Speak playback queue.
//!
//! Pure FIFO state with no I/O and no locking; the controller owns it on the
//! executor thread and performs the side effects.
//!
//! # Position semantics
//!
//! - The head is the request that is playing, or the next one to play.
//! - Everything behind the head is waiting.

use std::collections::VecDeque;

use crate::request::SpeakRequest;

/// FIFO of admitted requests awaiting or undergoing playback.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    pending: VecDeque<SpeakRequest>,
}

impl PlaybackQueue {
    pub const fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Append `request`. Returns `true` if it became the head.
    pub fn push(&mut self, request: SpeakRequest) -> bool {
        self.pending.push_back(request);
        self.pending.len() == 1
    }

    pub fn head(&self) -> Option<&SpeakRequest> {
        self.pending.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut SpeakRequest> {
        self.pending.front_mut()
    }

    pub fn pop_head(&mut self) -> Option<SpeakRequest> {
        self.pending.pop_front()
    }

    #[cfg(test)]
    pub fn contains(&self, message_id: &str) -> bool {
        self.pending.iter().any(|r| r.message_id() == message_id)
    }

    /// Whether `message_id` is the head.
    pub fn is_head(&self, message_id: &str) -> bool {
        self.head().is_some_and(|r| r.message_id() == message_id)
    }

    /// Remove a waiting entry. The head is never removed here: it is
    /// stopped instead and popped when the engine confirms.
    pub fn remove_waiting(&mut self, message_id: &str) -> Option<SpeakRequest> {
        let index = self
            .pending
            .iter()
            .skip(1)
            .position(|r| r.message_id() == message_id)?;
        self.pending.remove(index + 1)
    }

    /// Take every entry, head first.
    pub fn drain(&mut self) -> Vec<SpeakRequest> {
        self.pending.drain(..).collect()
    }

    /// Message ids in playback order.
    pub fn message_ids(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|r| r.message_id().to_owned())
            .collect()
    }
}
