//! Message sequencer
//!
//! Assistant text and tool output can complete before the user speech they
//! logically follow has finished transcribing, so arrival time cannot order
//! the conversation. Ordering comes from the sequence number assigned at
//! creation: an entry can delay everything after it, but never overtake
//! anything before it.

use super::types::{AudioData, Message, Role, TranscriptStatus};
use crate::events::{CoreEvent, EventSink};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

struct SequencerState {
    /// Entries not yet promoted, in sequence order.
    pending: VecDeque<Message>,
    /// Strictly ordered, gap-free finalized history.
    finalized: Vec<Message>,
    next_sequence: u64,
}

impl SequencerState {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            finalized: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Promote consecutive resolved entries from the head of the pending
    /// queue, stopping at the first still-pending gap.
    fn promote(&mut self, events: &EventSink) {
        while let Some(front) = self.pending.front() {
            if !front.transcript.is_resolved() {
                break;
            }
            let message = self.pending.pop_front().unwrap();
            events.emit(CoreEvent::MessageFinalized {
                id: message.id,
                sequence: message.sequence,
            });
            self.finalized.push(message);
        }
    }
}

/// Ordering engine for the conversation history.
///
/// Operations serialize behind one lock; finalization order is always
/// creation order regardless of how `update_transcript` calls interleave.
#[derive(Clone)]
pub struct MessageSequencer {
    state: Arc<Mutex<SequencerState>>,
    events: EventSink,
}

impl MessageSequencer {
    pub fn new(events: EventSink) -> Self {
        Self {
            state: Arc::new(Mutex::new(SequencerState::new())),
            events,
        }
    }

    /// Create an entry and atomically assign the next sequence number.
    ///
    /// Entries whose transcript is already resolved become finalization
    /// candidates immediately; the rest are held pending.
    pub fn enqueue(
        &self,
        role: Role,
        text: impl Into<String>,
        audio: Option<AudioData>,
        transcript: TranscriptStatus,
    ) -> Uuid {
        let mut state = self.state.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let message = Message::new(sequence, role, text, audio, transcript);
        let id = message.id;
        debug!(sequence, ?role, "enqueued message");
        state.pending.push_back(message);
        state.promote(&self.events);
        id
    }

    /// Set an entry's text and mark its transcript completed.
    ///
    /// Silent no-op if the id is unknown or the entry already finalized.
    pub fn update_transcript(&self, id: Uuid, text: impl Into<String>) {
        let mut state = self.state.lock();
        match state.pending.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.text = text.into();
                message.transcript = TranscriptStatus::Completed;
            }
            None => {
                debug!(%id, "transcript update for unknown or finalized message, ignoring");
                return;
            }
        }
        state.promote(&self.events);
    }

    /// Append a streaming delta to a pending entry's text without
    /// resolving it. Silent no-op on an unknown or finalized id.
    pub fn append_text(&self, id: Uuid, delta: &str) {
        let mut state = self.state.lock();
        if let Some(message) = state.pending.iter_mut().find(|m| m.id == id) {
            message.text.push_str(delta);
        }
    }

    /// All finalized entries to date, in sequence order.
    pub fn ordered_messages(&self) -> Vec<Message> {
        let mut state = self.state.lock();
        state.promote(&self.events);
        state.finalized.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn completed_count(&self) -> usize {
        self.state.lock().finalized.len()
    }

    /// Discard all state and restart sequence numbering at 0. Idempotent.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.finalized.clear();
        state.next_sequence = 0;
        debug!("sequencer cleared");
    }
}
