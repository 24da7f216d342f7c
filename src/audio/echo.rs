//! Echo cancellation by waveform correlation
//!
//! Distinguishes genuine user speech from the system hearing its own
//! playback. Amplitude gating fails in both directions (loud echo passes,
//! quiet speech is blocked); normalized cross-correlation compares waveform
//! shape instead, so it is invariant to how loud the echo path is. The
//! acoustic path delay is small and roughly constant, which keeps the delay
//! search bounded.

use std::collections::VecDeque;
use tracing::{debug, warn};

/// Correlation below this block length is statistically meaningless.
pub const MIN_CAPTURE_LEN_FLOOR: usize = 256;

/// Smallest usable rolling-reference window.
pub const MIN_REFERENCE_DURATION_MS: u32 = 100;

/// `max_delay_ms` must exceed `min_delay_ms` by at least this much.
pub const DELAY_SPAN_FLOOR_MS: u32 = 50;

/// Echo-canceller tuning. Validated by clamping, never by rejection.
///
/// The correlation threshold default (0.65) is an empirically tuned value;
/// keep it overridable per deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoCancellerConfig {
    /// Maximum-correlation score at or above which capture is echo.
    pub correlation_threshold: f32,
    /// Start of the acoustic-delay search window.
    pub min_delay_ms: u32,
    /// End (inclusive) of the acoustic-delay search window.
    pub max_delay_ms: u32,
    /// Rolling window of recently played audio kept for comparison.
    pub max_reference_duration_ms: u32,
    /// Captured blocks shorter than this always classify as not-echo.
    pub min_capture_len: usize,
    /// Sample rate of both reference and captured audio.
    pub sample_rate: u32,
}

impl Default for EchoCancellerConfig {
    fn default() -> Self {
        Self {
            correlation_threshold: 0.65,
            min_delay_ms: 0,
            max_delay_ms: 200,
            max_reference_duration_ms: 500,
            min_capture_len: MIN_CAPTURE_LEN_FLOOR,
            sample_rate: 24000,
        }
    }
}

impl EchoCancellerConfig {
    /// Clamp every field into its usable range, logging corrections.
    ///
    /// Construction never fails: a misconfigured canceller is corrected,
    /// not rejected.
    pub fn validated(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            warn!(
                "correlation_threshold {} outside [0,1], clamping",
                self.correlation_threshold
            );
            self.correlation_threshold = self.correlation_threshold.clamp(0.0, 1.0);
        }
        if self.min_capture_len < MIN_CAPTURE_LEN_FLOOR {
            warn!(
                "min_capture_len {} below floor {}, raising",
                self.min_capture_len, MIN_CAPTURE_LEN_FLOOR
            );
            self.min_capture_len = MIN_CAPTURE_LEN_FLOOR;
        }
        if self.max_reference_duration_ms < MIN_REFERENCE_DURATION_MS {
            warn!(
                "max_reference_duration_ms {} below floor {}, raising",
                self.max_reference_duration_ms, MIN_REFERENCE_DURATION_MS
            );
            self.max_reference_duration_ms = MIN_REFERENCE_DURATION_MS;
        }
        if self.max_delay_ms < self.min_delay_ms + DELAY_SPAN_FLOOR_MS {
            let corrected = self.min_delay_ms + DELAY_SPAN_FLOOR_MS;
            warn!(
                "max_delay_ms {} too close to min_delay_ms {}, raising to {}",
                self.max_delay_ms, self.min_delay_ms, corrected
            );
            self.max_delay_ms = corrected;
        }
        if self.sample_rate == 0 {
            warn!("sample_rate 0 is unusable, defaulting to 24000");
            self.sample_rate = 24000;
        }
        self
    }

    fn max_reference_samples(&self) -> usize {
        (self.sample_rate as u64 * self.max_reference_duration_ms as u64 / 1000) as usize
    }
}

/// Echo canceller holding the rolling playback-reference buffer.
///
/// Active exactly while assistant audio is playing. Deactivation discards
/// the reference buffer unconditionally; no stale playback audio survives.
pub struct EchoCanceller {
    config: EchoCancellerConfig,
    active: bool,
    reference: VecDeque<f32>,
}

impl EchoCanceller {
    pub fn new(config: EchoCancellerConfig) -> Self {
        Self {
            config: config.validated(),
            active: false,
            reference: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &EchoCancellerConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reference_len(&self) -> usize {
        self.reference.len()
    }

    /// Begin collecting playback reference audio.
    pub fn activate(&mut self) {
        if !self.active {
            debug!("echo canceller activated");
        }
        self.active = true;
    }

    /// Stop collecting and discard the reference buffer. Idempotent.
    pub fn deactivate(&mut self) {
        if self.active {
            debug!("echo canceller deactivated, reference discarded");
        }
        self.active = false;
        self.reference.clear();
    }

    /// Append rendered playback samples to the reference buffer.
    ///
    /// Ignored while inactive. The buffer is trimmed from the front so its
    /// duration never exceeds `max_reference_duration_ms`.
    pub fn add_reference(&mut self, samples: &[f32]) {
        if !self.active || samples.is_empty() {
            return;
        }
        self.reference.extend(samples.iter().copied());
        let max = self.config.max_reference_samples();
        while self.reference.len() > max {
            self.reference.pop_front();
        }
    }

    /// Classify a captured block as echo of recent playback.
    ///
    /// `false` whenever inactive, the reference is empty, or the block is
    /// below the minimum reliable length, regardless of content.
    pub fn is_echo(&self, captured: &[f32]) -> bool {
        if !self.active || self.reference.is_empty() || captured.len() < self.config.min_capture_len
        {
            return false;
        }
        self.max_correlation(captured) >= self.config.correlation_threshold
    }

    /// Maximum normalized cross-correlation against the reference, in [0,1].
    ///
    /// Exposed for diagnostics; `is_echo` thresholds this same value.
    pub fn correlation_score(&self, captured: &[f32]) -> f32 {
        if !self.active || self.reference.is_empty() || captured.len() < self.config.min_capture_len
        {
            return 0.0;
        }
        self.max_correlation(captured)
    }

    /// Search every millisecond delay offset in the configured window and
    /// take the best correlation coefficient found.
    fn max_correlation(&self, captured: &[f32]) -> f32 {
        let reference: Vec<f32> = self.reference.iter().copied().collect();
        let samples_per_ms = self.config.sample_rate as usize / 1000;
        let mut best = 0.0f32;

        for delay_ms in self.config.min_delay_ms..=self.config.max_delay_ms {
            let delay = delay_ms as usize * samples_per_ms.max(1);
            let needed = delay + captured.len();
            if needed > reference.len() {
                continue;
            }
            let start = reference.len() - needed;
            let segment = &reference[start..start + captured.len()];
            let coefficient = normalized_correlation(captured, segment);
            if coefficient > best {
                best = coefficient;
            }
        }

        best.clamp(0.0, 1.0)
    }
}

/// Normalized cross-correlation coefficient between two equal-length
/// signals. Zero when either signal has no energy.
fn normalized_correlation(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0f64;
    let mut energy_a = 0.0f64;
    let mut energy_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        energy_a += x as f64 * x as f64;
        energy_b += y as f64 * y as f64;
    }
    let denominator = (energy_a * energy_b).sqrt();
    if denominator <= f64::EPSILON {
        return 0.0;
    }
    (dot / denominator) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random waveform, distinct per seed.
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

    fn active_canceller_with_reference(reference: &[f32]) -> EchoCanceller {
        let mut canceller = EchoCanceller::new(EchoCancellerConfig::default());
        canceller.activate();
        canceller.add_reference(reference);
        canceller
    }

    #[test]
    fn test_inactive_is_never_echo() {
        let mut canceller = EchoCanceller::new(EchoCancellerConfig::default());
        let waveform = noise(1, 2048);
        canceller.add_reference(&waveform);
        assert_eq!(canceller.reference_len(), 0);
        assert!(!canceller.is_echo(&waveform));
    }

    #[test]
    fn test_empty_reference_is_never_echo() {
        let mut canceller = EchoCanceller::new(EchoCancellerConfig::default());
        canceller.activate();
        assert!(!canceller.is_echo(&noise(1, 2048)));
    }

    #[test]
    fn test_short_capture_is_never_echo() {
        let waveform = noise(1, 2048);
        let canceller = active_canceller_with_reference(&waveform);
        assert!(!canceller.is_echo(&waveform[..255]));
    }

    #[test]
    fn test_exact_playback_is_echo() {
        let waveform = noise(7, 2048);
        let canceller = active_canceller_with_reference(&waveform);
        assert!(canceller.is_echo(&waveform));
        assert!(canceller.correlation_score(&waveform) > 0.99);
    }

    #[test]
    fn test_scaled_playback_is_echo() {
        let waveform = noise(7, 2048);
        let canceller = active_canceller_with_reference(&waveform);
        let quiet: Vec<f32> = waveform.iter().map(|&s| s * 0.05).collect();
        let loud: Vec<f32> = waveform.iter().map(|&s| s * 3.0).collect();
        assert!(canceller.is_echo(&quiet));
        assert!(canceller.is_echo(&loud));
    }

    #[test]
    fn test_independent_noise_is_not_echo() {
        let canceller = active_canceller_with_reference(&noise(7, 2048));
        assert!(!canceller.is_echo(&noise(99, 2048)));
    }

    #[test]
    fn test_delayed_playback_is_echo() {
        // Capture equals reference audio from ~80ms ago.
        let config = EchoCancellerConfig::default();
        let samples_per_ms = config.sample_rate as usize / 1000;
        let mut canceller = EchoCanceller::new(config);
        canceller.activate();

        let earlier = noise(7, 2048);
        let later = noise(8, 80 * samples_per_ms);
        canceller.add_reference(&earlier);
        canceller.add_reference(&later);

        assert!(canceller.is_echo(&earlier));
    }

    #[test]
    fn test_deactivate_discards_reference_and_is_idempotent() {
        let mut canceller = active_canceller_with_reference(&noise(7, 2048));
        assert!(canceller.reference_len() > 0);
        canceller.deactivate();
        assert!(!canceller.is_active());
        assert_eq!(canceller.reference_len(), 0);
        canceller.deactivate();
        assert_eq!(canceller.reference_len(), 0);
    }

    #[test]
    fn test_reference_duration_is_bounded() {
        let config = EchoCancellerConfig {
            max_reference_duration_ms: 100,
            ..Default::default()
        };
        let max_samples = config.sample_rate as usize / 10;
        let mut canceller = EchoCanceller::new(config);
        canceller.activate();
        canceller.add_reference(&noise(1, max_samples * 3));
        assert_eq!(canceller.reference_len(), max_samples);
    }

    #[test]
    fn test_config_corrections_are_clamping_not_rejection() {
        let config = EchoCancellerConfig {
            correlation_threshold: 7.5,
            min_capture_len: 4,
            max_reference_duration_ms: 1,
            min_delay_ms: 40,
            max_delay_ms: 40,
            sample_rate: 0,
        }
        .validated();

        assert_eq!(config.correlation_threshold, 1.0);
        assert_eq!(config.min_capture_len, MIN_CAPTURE_LEN_FLOOR);
        assert_eq!(config.max_reference_duration_ms, MIN_REFERENCE_DURATION_MS);
        assert_eq!(config.max_delay_ms, 40 + DELAY_SPAN_FLOOR_MS);
        assert_eq!(config.sample_rate, 24000);
    }
}
