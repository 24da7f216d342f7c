//! Turn-detection configuration
//!
//! The speech-boundary detector itself is an external collaborator; what
//! lives here is the validated configuration the coordinator consults and
//! the transport forwards in its session setup.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How aggressively automatic detection ends the user's turn, trading
/// response latency for false-interruption resistance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eagerness {
    Low,
    Medium,
    High,
}

/// Fixed-threshold automatic detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdVad {
    /// RMS level (analyzer [0,1] range) above which capture counts as speech.
    pub rms_threshold: f32,
    /// Silence that must elapse before the turn is considered over.
    pub silence_duration_ms: u32,
    /// Audio retained from before speech onset.
    pub prefix_padding_ms: u32,
}

impl Default for ThresholdVad {
    fn default() -> Self {
        Self {
            rms_threshold: 0.3,
            silence_duration_ms: 500,
            prefix_padding_ms: 300,
        }
    }
}

impl ThresholdVad {
    pub fn validated(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.rms_threshold) {
            warn!("rms_threshold {} outside [0,1], clamping", self.rms_threshold);
            self.rms_threshold = self.rms_threshold.clamp(0.0, 1.0);
        }
        self
    }
}

/// Style of automatic turn detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AutomaticStyle {
    Threshold(ThresholdVad),
    Eagerness(Eagerness),
}

/// Who drives turn transitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TurnDetectionMode {
    /// Speech-boundary signals drive transitions.
    Automatic(AutomaticStyle),
    /// Speech-stop signals are ignored; only an explicit end-turn command
    /// closes the user's turn.
    Manual,
    /// All speech-boundary signals are ignored; the caller owns every
    /// transition.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnDetectionConfig {
    pub mode: TurnDetectionMode,
    /// Whether ending a user turn in automatic mode should trigger
    /// response creation.
    pub create_response: bool,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        Self {
            mode: TurnDetectionMode::Automatic(AutomaticStyle::Threshold(ThresholdVad::default())),
            create_response: true,
        }
    }
}

impl TurnDetectionConfig {
    pub fn validated(mut self) -> Self {
        if let TurnDetectionMode::Automatic(AutomaticStyle::Threshold(vad)) = self.mode {
            self.mode = TurnDetectionMode::Automatic(AutomaticStyle::Threshold(vad.validated()));
        }
        self
    }

    /// Whether barge-in may interrupt assistant playback in this mode.
    pub fn allows_interruption(&self) -> bool {
        !matches!(self.mode, TurnDetectionMode::Disabled)
    }

    /// Whether any speech-boundary signal is honored at all.
    pub fn honors_speech_signals(&self) -> bool {
        !matches!(self.mode, TurnDetectionMode::Disabled)
    }

    /// Whether a speech-stop signal ends the user's turn by itself.
    pub fn auto_ends_turn(&self) -> bool {
        matches!(self.mode, TurnDetectionMode::Automatic(_))
    }
}
