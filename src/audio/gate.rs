//! Echo-protection gate
//!
//! Combines the level analyzer and the echo canceller into one per-block
//! verdict for the turn coordinator. Which signals participate is a
//! deployment choice: hybrid suits loudspeaker routing where acoustic
//! coupling is strong, `Off` suits earpiece/headphone routing where it is
//! negligible.

use crate::audio::echo::{EchoCanceller, EchoCancellerConfig};
use crate::audio::levels::AudioLevels;
use tracing::warn;

/// How captured audio is screened during assistant playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoProtectionMode {
    /// Never classify capture as echo.
    Off,
    /// Analyzer RMS alone: capture quieter than the gate threshold is echo.
    Threshold,
    /// Waveform correlation against recent playback alone.
    Correlation,
    /// Echo if either the threshold or the correlation signal says so.
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoGateConfig {
    pub mode: EchoProtectionMode,
    /// Level floor for the threshold signal, in the analyzer's [0,1] range.
    pub rms_echo_threshold: f32,
}

impl Default for EchoGateConfig {
    fn default() -> Self {
        Self {
            mode: EchoProtectionMode::Hybrid,
            rms_echo_threshold: 0.15,
        }
    }
}

impl EchoGateConfig {
    pub fn validated(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.rms_echo_threshold) {
            warn!(
                "rms_echo_threshold {} outside [0,1], clamping",
                self.rms_echo_threshold
            );
            self.rms_echo_threshold = self.rms_echo_threshold.clamp(0.0, 1.0);
        }
        self
    }
}

/// Per-block echo screen owned by the turn coordinator.
pub struct EchoGate {
    config: EchoGateConfig,
    canceller: EchoCanceller,
}

impl EchoGate {
    pub fn new(config: EchoGateConfig, canceller_config: EchoCancellerConfig) -> Self {
        Self {
            config: config.validated(),
            canceller: EchoCanceller::new(canceller_config),
        }
    }

    pub fn mode(&self) -> EchoProtectionMode {
        self.config.mode
    }

    pub fn canceller(&self) -> &EchoCanceller {
        &self.canceller
    }

    /// Begin tracking assistant playback. Called when playback starts.
    pub fn activate(&mut self) {
        self.canceller.activate();
    }

    /// Stop tracking and drop all reference audio. Idempotent.
    pub fn deactivate(&mut self) {
        self.canceller.deactivate();
    }

    /// Feed rendered assistant audio into the correlation reference.
    pub fn add_reference(&mut self, samples: &[f32]) {
        self.canceller.add_reference(samples);
    }

    /// Verdict for one captured block and its level snapshot.
    pub fn is_echo(&self, captured: &[f32], levels: &AudioLevels) -> bool {
        let below_threshold = || levels.level < self.config.rms_echo_threshold;
        match self.config.mode {
            EchoProtectionMode::Off => false,
            EchoProtectionMode::Threshold => below_threshold(),
            EchoProtectionMode::Correlation => self.canceller.is_echo(captured),
            EchoProtectionMode::Hybrid => below_threshold() || self.canceller.is_echo(captured),
        }
    }
}
