//! Audio level and frequency-band analysis
//!
//! Pure functions over a sample block. Consumers keep the previous snapshot
//! and apply smoothing themselves; nothing here is stateful.

use rustfft::{num_complex::Complex, FftPlanner};

/// Gain applied to raw RMS before clamping, so typical speech levels
/// occupy a useful portion of the [0,1] meter range.
pub const RMS_HEADROOM: f32 = 4.0;

/// Gain applied to mean per-bin band magnitude before clamping.
pub const BAND_GAIN: f32 = 8.0;

/// Blocks shorter than this return the zero snapshot.
pub const MIN_ANALYSIS_LEN: usize = 64;

/// Loudness and band-energy snapshot for one analyzed block.
///
/// All fields are normalized to [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioLevels {
    pub level: f32,
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl AudioLevels {
    pub const ZERO: AudioLevels = AudioLevels {
        level: 0.0,
        low: 0.0,
        mid: 0.0,
        high: 0.0,
    };

    /// Exponential smoothing against a previously retained snapshot.
    ///
    /// Factor 0 keeps `previous`, factor 1 keeps `self`, 0.5 is the
    /// per-band arithmetic midpoint.
    pub fn smoothed(&self, previous: &AudioLevels, factor: f32) -> AudioLevels {
        let f = factor.clamp(0.0, 1.0);
        let mix = |prev: f32, new: f32| prev + (new - prev) * f;
        AudioLevels {
            level: mix(previous.level, self.level),
            low: mix(previous.low, self.low),
            mid: mix(previous.mid, self.mid),
            high: mix(previous.high, self.high),
        }
    }
}

/// Frequency-band boundaries in Hz.
///
/// The cutoffs are empirically tuned defaults, overridable per deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRanges {
    pub low: (f32, f32),
    pub mid: (f32, f32),
    pub high: (f32, f32),
}

impl Default for BandRanges {
    fn default() -> Self {
        Self {
            low: (20.0, 250.0),
            mid: (250.0, 4000.0),
            high: (4000.0, 20000.0),
        }
    }
}

/// Compute the loudness and band-energy snapshot for one sample block.
pub fn analyze(samples: &[f32], sample_rate: u32) -> AudioLevels {
    analyze_with_bands(samples, sample_rate, &BandRanges::default())
}

/// `analyze` with caller-supplied band boundaries.
pub fn analyze_with_bands(samples: &[f32], sample_rate: u32, bands: &BandRanges) -> AudioLevels {
    if samples.len() < MIN_ANALYSIS_LEN || sample_rate == 0 {
        return AudioLevels::ZERO;
    }

    let level = rms_level(samples);

    let spectrum = magnitude_spectrum(samples);
    let bin_width = sample_rate as f32 / samples.len() as f32;
    let nyquist_bin = samples.len() / 2;

    let low = band_energy(&spectrum, bands.low, bin_width, nyquist_bin);
    let mid = band_energy(&spectrum, bands.mid, bin_width, nyquist_bin);
    let high = band_energy(&spectrum, bands.high, bin_width, nyquist_bin);

    // Never report misleading spectral data: if any band collapsed at this
    // sample rate, zero all three while keeping the level valid.
    match (low, mid, high) {
        (Some(low), Some(mid), Some(high)) => AudioLevels {
            level,
            low,
            mid,
            high,
        },
        _ => AudioLevels {
            level,
            ..AudioLevels::ZERO
        },
    }
}

/// RMS amplitude scaled by the headroom gain and clamped to [0,1].
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    let rms = (sum_squares / samples.len() as f32).sqrt();
    (rms * RMS_HEADROOM).clamp(0.0, 1.0)
}

/// Convert 16-bit signed PCM to normalized f32.
///
/// Divides by 32768.0 so i16::MIN maps to exactly -1.0 and no sample
/// leaves [-1,1].
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Hann-windowed magnitude spectrum, normalized per bin to [0,1] for a
/// full-scale sine.
fn magnitude_spectrum(samples: &[f32]) -> Vec<f32> {
    let n = samples.len();
    let mut buf: Vec<Complex<f32>> = samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5
                * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos());
            Complex::new(s * w, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buf);

    // 2/n undoes FFT scaling, 2x more compensates the Hann window's mean.
    let scale = 4.0 / n as f32;
    buf.iter().take(n / 2 + 1).map(|c| c.norm() * scale).collect()
}

/// Mean normalized magnitude over the band's bins, scaled and clamped.
///
/// Returns `None` when bin resolution collapses the band (start bin at or
/// past the end bin) or the band lies beyond Nyquist.
fn band_energy(
    spectrum: &[f32],
    (lo_hz, hi_hz): (f32, f32),
    bin_width: f32,
    nyquist_bin: usize,
) -> Option<f32> {
    if bin_width <= 0.0 || hi_hz <= lo_hz {
        return None;
    }
    let start = (lo_hz / bin_width).ceil() as usize;
    let end = ((hi_hz / bin_width).floor() as usize).min(nyquist_bin);
    if start >= end {
        return None;
    }
    let count = (end - start) as f32;
    let sum: f32 = spectrum[start..end.min(spectrum.len())].iter().sum();
    Some((sum / count * BAND_GAIN).clamp(0.0, 1.0))
}
