//! Core configuration aggregate
//!
//! Immutable value objects, validated by clamping at construction. A bad
//! value is corrected and logged, never rejected; constructors do not fail.

use crate::audio::echo::EchoCancellerConfig;
use crate::audio::gate::EchoGateConfig;
use crate::audio::levels::BandRanges;
use crate::events::EVENT_CAPACITY;
use crate::turn::detection::TurnDetectionConfig;

/// Configuration for the whole coordination core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreConfig {
    /// Sample rate of captured and played audio blocks.
    pub sample_rate: u32,

    /// Turn-detection mode and response-creation policy.
    pub turn: TurnDetectionConfig,

    /// Echo-protection mode and its RMS threshold.
    pub gate: EchoGateConfig,

    /// Echo-canceller correlation tuning.
    pub canceller: EchoCancellerConfig,

    /// Analyzer frequency-band boundaries.
    pub bands: BandRanges,

    /// Observation-event channel capacity.
    pub event_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            turn: TurnDetectionConfig::default(),
            gate: EchoGateConfig::default(),
            canceller: EchoCancellerConfig::default(),
            bands: BandRanges::default(),
            event_capacity: EVENT_CAPACITY,
        }
    }
}

impl CoreConfig {
    /// Set the audio sample rate, mirrored into the canceller config.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self.canceller.sample_rate = sample_rate;
        self
    }

    pub fn with_turn(mut self, turn: TurnDetectionConfig) -> Self {
        self.turn = turn;
        self
    }

    pub fn with_gate(mut self, gate: EchoGateConfig) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_canceller(mut self, canceller: EchoCancellerConfig) -> Self {
        self.canceller = canceller;
        self
    }
}
