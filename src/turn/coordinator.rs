//! Turn coordinator
//!
//! Derives the single authoritative speaker state from independently
//! arriving signals: external speech boundaries, the system's own playback
//! lifecycle, and the echo gate's verdict on concurrently captured audio.
//!
//! Interruption is a direct, synchronous call on the held playback
//! reference. The event sink only observes; nothing internal listens to it.

use crate::audio::gate::EchoGate;
use crate::audio::levels::{self, AudioLevels, BandRanges};
use crate::config::CoreConfig;
use crate::events::{CoreEvent, EventSink};
use crate::turn::detection::TurnDetectionConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// The authoritative "who may speak now" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    None,
    User,
    Assistant,
}

/// Playback collaborator contract.
///
/// `interrupt` must stop assistant audio immediately; the coordinator calls
/// it synchronously during barge-in, before any observation event goes out.
pub trait PlaybackControl: Send + Sync {
    fn interrupt(&self);
}

struct CoordinatorState {
    speaker: Speaker,
    gate: EchoGate,
    /// Levels for the most recently captured block.
    last_levels: AudioLevels,
    /// Most recent captured block, retained only while the assistant is
    /// speaking so a speech-started signal can be checked against it.
    last_capture: Vec<f32>,
}

/// Single-owner turn state machine.
///
/// Signals are processed strictly in arrival order; concurrent callers
/// serialize behind one lock.
pub struct TurnCoordinator {
    detection: TurnDetectionConfig,
    sample_rate: u32,
    bands: BandRanges,
    state: Mutex<CoordinatorState>,
    playback: Arc<dyn PlaybackControl>,
    events: EventSink,
}

impl TurnCoordinator {
    pub fn new(config: &CoreConfig, playback: Arc<dyn PlaybackControl>, events: EventSink) -> Self {
        Self {
            detection: config.turn.validated(),
            sample_rate: config.sample_rate,
            bands: config.bands,
            state: Mutex::new(CoordinatorState {
                speaker: Speaker::None,
                gate: EchoGate::new(config.gate, config.canceller),
                last_levels: AudioLevels::ZERO,
                last_capture: Vec::new(),
            }),
            playback,
            events,
        }
    }

    pub fn speaker(&self) -> Speaker {
        self.state.lock().speaker
    }

    pub fn detection(&self) -> &TurnDetectionConfig {
        &self.detection
    }

    /// Analyze one captured sample block.
    ///
    /// Retains the snapshot (and, during assistant playback, the block
    /// itself) for the echo verdict consulted by `speech_started`.
    pub fn process_capture(&self, block: &[f32]) -> AudioLevels {
        let snapshot = levels::analyze_with_bands(block, self.sample_rate, &self.bands);
        let mut state = self.state.lock();
        state.last_levels = snapshot;
        if state.speaker == Speaker::Assistant {
            state.last_capture.clear();
            state.last_capture.extend_from_slice(block);
        }
        drop(state);
        self.events.emit(CoreEvent::LevelsUpdated(snapshot));
        snapshot
    }

    /// Feed one rendered playback block into the echo reference.
    pub fn process_playback(&self, block: &[f32]) {
        self.state.lock().gate.add_reference(block);
    }

    /// External speech-started signal.
    pub fn speech_started(&self) {
        if !self.detection.honors_speech_signals() {
            debug!("speech started ignored: turn detection disabled");
            return;
        }
        let mut state = self.state.lock();
        match state.speaker {
            Speaker::None => {
                state.speaker = Speaker::User;
                drop(state);
                debug!("user speaking");
                self.events.emit(CoreEvent::TurnChanged {
                    speaker: Speaker::User,
                });
            }
            Speaker::Assistant => {
                let is_echo = state.gate.is_echo(&state.last_capture, &state.last_levels);
                if is_echo {
                    debug!("speech started classified as echo, ignoring");
                    return;
                }
                if !self.detection.allows_interruption() {
                    return;
                }
                state.speaker = Speaker::User;
                drop(state);
                info!("barge-in: user interrupted assistant");
                // Direct synchronous call first; observers find out after.
                self.playback.interrupt();
                self.events.emit(CoreEvent::AssistantInterrupted);
                self.events.emit(CoreEvent::TurnChanged {
                    speaker: Speaker::User,
                });
            }
            Speaker::User => {}
        }
    }

    /// External speech-stopped signal.
    ///
    /// Returns whether the caller should trigger response creation. Only
    /// automatic mode ends the turn here; manual mode waits for `end_turn`.
    pub fn speech_stopped(&self) -> bool {
        if !self.detection.auto_ends_turn() {
            debug!("speech stopped ignored in {:?} mode", self.detection.mode);
            return false;
        }
        let mut state = self.state.lock();
        if state.speaker != Speaker::User {
            return false;
        }
        state.speaker = Speaker::None;
        drop(state);
        debug!("user turn ended");
        self.events.emit(CoreEvent::TurnEnded {
            speaker: Speaker::User,
        });
        self.events.emit(CoreEvent::TurnChanged {
            speaker: Speaker::None,
        });
        self.detection.create_response
    }

    /// Explicit caller-issued end of the user's turn.
    ///
    /// The only path out of `UserSpeaking` in manual mode; honored in every
    /// mode.
    pub fn end_turn(&self) {
        let mut state = self.state.lock();
        if state.speaker != Speaker::User {
            return;
        }
        state.speaker = Speaker::None;
        drop(state);
        debug!("user turn ended explicitly");
        self.events.emit(CoreEvent::TurnEnded {
            speaker: Speaker::User,
        });
        self.events.emit(CoreEvent::TurnChanged {
            speaker: Speaker::None,
        });
    }

    /// Assistant playback began. Not gated by detection: this is the
    /// system's own output.
    pub fn assistant_started(&self) {
        let mut state = self.state.lock();
        state.gate.activate();
        if state.speaker == Speaker::Assistant {
            return;
        }
        state.speaker = Speaker::Assistant;
        drop(state);
        debug!("assistant speaking");
        self.events.emit(CoreEvent::TurnChanged {
            speaker: Speaker::Assistant,
        });
    }

    /// Assistant playback finished naturally.
    pub fn assistant_stopped(&self) {
        let mut state = self.state.lock();
        state.gate.deactivate();
        state.last_capture.clear();
        if state.speaker != Speaker::Assistant {
            return;
        }
        state.speaker = Speaker::None;
        drop(state);
        debug!("assistant turn ended");
        self.events.emit(CoreEvent::TurnEnded {
            speaker: Speaker::Assistant,
        });
        self.events.emit(CoreEvent::TurnChanged {
            speaker: Speaker::None,
        });
    }

    /// Coordinated session teardown: speaker back to `None`, canceller
    /// deactivated, retained capture dropped. One step, so no stale
    /// reference audio or speaker state survives a reconnect. Idempotent.
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        state.gate.deactivate();
        state.last_capture.clear();
        state.last_capture.shrink_to_fit();
        state.last_levels = AudioLevels::ZERO;
        let changed = state.speaker != Speaker::None;
        state.speaker = Speaker::None;
        drop(state);
        info!("session teardown: turn state reset");
        if changed {
            self.events.emit(CoreEvent::TurnChanged {
                speaker: Speaker::None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::gate::{EchoGateConfig, EchoProtectionMode};
    use crate::turn::detection::TurnDetectionMode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingPlayback {
        interrupts: AtomicUsize,
    }

    impl RecordingPlayback {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                interrupts: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.interrupts.load(Ordering::SeqCst)
        }
    }

    impl PlaybackControl for RecordingPlayback {
        fn interrupt(&self) {
            self.interrupts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn coordinator_with(
        config: CoreConfig,
    ) -> (TurnCoordinator, Arc<RecordingPlayback>, crossbeam_channel::Receiver<CoreEvent>) {
        let playback = RecordingPlayback::new();
        let (sink, rx) = EventSink::channel(64);
        let coordinator = TurnCoordinator::new(&config, playback.clone(), sink);
        (coordinator, playback, rx)
    }

    fn correlation_only() -> CoreConfig {
        CoreConfig {
            gate: EchoGateConfig {
                mode: EchoProtectionMode::Correlation,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn noise(seed: u64, len: usize) -> Vec<f32> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 32) as f32 / (1u64 << 31) as f32) - 1.0
            })
            .collect()
    }

    #[test]
    fn test_speech_from_idle_starts_user_turn() {
        let (coordinator, _, rx) = coordinator_with(CoreConfig::default());
        assert_eq!(coordinator.speaker(), Speaker::None);
        coordinator.speech_started();
        assert_eq!(coordinator.speaker(), Speaker::User);
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::TurnChanged {
                speaker: Speaker::User
            }
        );
    }

    #[test]
    fn test_genuine_speech_interrupts_assistant() {
        let (coordinator, playback, rx) = coordinator_with(correlation_only());
        coordinator.assistant_started();
        coordinator.process_playback(&noise(7, 4096));
        // Captured audio unrelated to playback: genuine speech.
        coordinator.process_capture(&noise(42, 2048));
        coordinator.speech_started();

        assert_eq!(coordinator.speaker(), Speaker::User);
        assert_eq!(playback.count(), 1);
        let events: Vec<CoreEvent> = rx.try_iter().collect();
        assert!(events.contains(&CoreEvent::AssistantInterrupted));
    }

    #[test]
    fn test_echo_does_not_interrupt_assistant() {
        let (coordinator, playback, rx) = coordinator_with(correlation_only());
        let playback_audio = noise(7, 2048);
        coordinator.assistant_started();
        coordinator.process_playback(&playback_audio);
        // Microphone hears exactly what the speaker played.
        coordinator.process_capture(&playback_audio);
        let _ = rx.try_iter().count();

        coordinator.speech_started();

        assert_eq!(coordinator.speaker(), Speaker::Assistant);
        assert_eq!(playback.count(), 0);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_automatic_stop_ends_turn_and_requests_response() {
        let (coordinator, _, _rx) = coordinator_with(CoreConfig::default());
        coordinator.speech_started();
        assert!(coordinator.speech_stopped());
        assert_eq!(coordinator.speaker(), Speaker::None);
    }

    #[test]
    fn test_manual_mode_requires_explicit_end_turn() {
        let config = CoreConfig {
            turn: TurnDetectionConfig {
                mode: TurnDetectionMode::Manual,
                create_response: true,
            },
            ..Default::default()
        };
        let (coordinator, _, _rx) = coordinator_with(config);
        coordinator.speech_started();
        assert!(!coordinator.speech_stopped());
        assert_eq!(coordinator.speaker(), Speaker::User);

        coordinator.end_turn();
        assert_eq!(coordinator.speaker(), Speaker::None);
    }

    #[test]
    fn test_disabled_mode_ignores_speech_signals() {
        let config = CoreConfig {
            turn: TurnDetectionConfig {
                mode: TurnDetectionMode::Disabled,
                create_response: false,
            },
            ..Default::default()
        };
        let (coordinator, playback, _rx) = coordinator_with(config);
        coordinator.speech_started();
        assert_eq!(coordinator.speaker(), Speaker::None);

        coordinator.assistant_started();
        coordinator.process_capture(&noise(3, 2048));
        coordinator.speech_started();
        assert_eq!(coordinator.speaker(), Speaker::Assistant);
        assert_eq!(playback.count(), 0);
    }

    #[test]
    fn test_assistant_toggle_is_not_gated() {
        let (coordinator, _, _rx) = coordinator_with(CoreConfig::default());
        coordinator.assistant_started();
        assert_eq!(coordinator.speaker(), Speaker::Assistant);
        coordinator.assistant_stopped();
        assert_eq!(coordinator.speaker(), Speaker::None);
    }

    #[test]
    fn test_capture_levels_are_emitted() {
        let (coordinator, _, rx) = coordinator_with(CoreConfig::default());
        let snapshot = coordinator.process_capture(&vec![0.5; 1024]);
        assert!(snapshot.level > 0.0);
        assert!(matches!(
            rx.try_recv().unwrap(),
            CoreEvent::LevelsUpdated(_)
        ));
    }

    #[test]
    fn test_disconnect_resets_everything_in_one_step() {
        let (coordinator, _, _rx) = coordinator_with(CoreConfig::default());
        coordinator.assistant_started();
        coordinator.process_playback(&noise(7, 2048));
        coordinator.disconnect();

        assert_eq!(coordinator.speaker(), Speaker::None);
        let state = coordinator.state.lock();
        assert!(!state.gate.canceller().is_active());
        assert_eq!(state.gate.canceller().reference_len(), 0);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (coordinator, _, _rx) = coordinator_with(CoreConfig::default());
        coordinator.disconnect();
        coordinator.disconnect();
        assert_eq!(coordinator.speaker(), Speaker::None);
    }
}
