//! Outbound observation events
//!
//! Every component's only outward signal is a fire-and-forget `emit` to one
//! downstream consumer. Events observe; they never instruct. Anything that
//! must happen (stopping playback, clearing a buffer) is a direct call to a
//! held collaborator reference, never a listener on this stream.

use crate::audio::levels::AudioLevels;
use crate::turn::Speaker;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::trace;
use uuid::Uuid;

/// Default event-channel capacity.
pub const EVENT_CAPACITY: usize = 256;

/// Everything the core reports to its single external observer.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// The authoritative speaker changed.
    TurnChanged { speaker: Speaker },

    /// A speaker's turn concluded.
    TurnEnded { speaker: Speaker },

    /// User speech genuinely interrupted assistant playback.
    AssistantInterrupted,

    /// A message was promoted from pending to the finalized history.
    MessageFinalized { id: Uuid, sequence: u64 },

    /// Fresh level/band snapshot for a captured block.
    LevelsUpdated(AudioLevels),
}

/// Fire-and-forget sender half of the observation stream.
///
/// `emit` never blocks and never fails: a full or disconnected channel
/// drops the event. No component branches on whether anything is listening.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<CoreEvent>,
}

impl EventSink {
    /// Create a sink and its single subscriber receiver.
    pub fn channel(capacity: usize) -> (Self, Receiver<CoreEvent>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    /// A sink with no subscriber; every emit is dropped.
    pub fn null() -> Self {
        let (tx, _rx) = bounded(1);
        Self { tx }
    }

    pub fn emit(&self, event: CoreEvent) {
        if self.tx.try_send(event).is_err() {
            trace!("event dropped: no listener or channel full");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_receive() {
        let (sink, rx) = EventSink::channel(4);
        sink.emit(CoreEvent::AssistantInterrupted);
        assert_eq!(rx.recv().unwrap(), CoreEvent::AssistantInterrupted);
    }

    #[test]
    fn test_emit_on_full_channel_drops_silently() {
        let (sink, rx) = EventSink::channel(1);
        sink.emit(CoreEvent::AssistantInterrupted);
        sink.emit(CoreEvent::TurnEnded {
            speaker: Speaker::User,
        });
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_null_sink_never_panics() {
        let sink = EventSink::null();
        for _ in 0..100 {
            sink.emit(CoreEvent::AssistantInterrupted);
        }
    }
}
