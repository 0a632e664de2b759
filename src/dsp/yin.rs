//! YIN fundamental-frequency estimation.
//!
//! Works on one frame of time-domain samples at a time: compute the
//! difference function against a lagged copy of the signal, normalize it,
//! and the first deep dip below the threshold marks the pitch period.
//! The difference function is evaluated directly (O(N^2) per frame), which
//! is plenty fast at a 4096-sample frame and keeps the code obvious.

/// Tuning knobs for the estimator. Defaults match the trainer's fixed
/// internal parameters; tests and future callers can vary them.
#[derive(Debug, Clone)]
pub struct YinConfig {
    /// Normalized-difference threshold that a dip must cross to count as
    /// a period. Lower = stricter.
    pub threshold: f32,
    /// Refine the period estimate with a parabolic fit over the dip.
    pub interpolate: bool,
    /// Single-pole low-pass cutoff applied in place before analysis.
    /// 0 disables it; a low cutoff biases estimates for mid/high notes.
    pub lowpass_hz: f32,
    /// Adjust the threshold by signal level, clamped to [0.05, 0.2].
    pub adaptive_threshold: bool,
    /// Median-filter the last N accepted frequencies. 1 disables smoothing
    /// and clears the history.
    pub smoothing_window: usize,
}

impl Default for YinConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            interpolate: true,
            lowpass_hz: 0.0,
            adaptive_threshold: false,
            smoothing_window: 1,
        }
    }
}

/// One frame's estimate. `frequency_hz == 0` means no pitch was found;
/// that is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    pub frequency_hz: f32,
    /// Confidence in [0, 1] that the detected periodicity is a real pitch.
    pub clarity: f32,
}

impl PitchEstimate {
    pub const NONE: Self = Self {
        frequency_hz: 0.0,
        clarity: 0.0,
    };

    pub fn is_detected(&self) -> bool {
        self.frequency_hz > 0.0
    }
}

/// Rolling history for median smoothing. The estimator never owns one:
/// each tracking session keeps its own, so independent sessions cannot
/// contaminate each other's medians.
#[derive(Debug, Default)]
pub struct SmoothingHistory {
    recent: Vec<f32>,
}

impl SmoothingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }

    /// Push an accepted frequency and return the median of the last
    /// `window` entries.
    fn push_and_median(&mut self, frequency_hz: f32, window: usize) -> f32 {
        self.recent.push(frequency_hz);
        if self.recent.len() > window {
            let excess = self.recent.len() - window;
            self.recent.drain(..excess);
        }
        let mut sorted = self.recent.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        sorted[sorted.len() / 2]
    }
}

/// Estimate the fundamental frequency of one frame.
///
/// The frame is mutated in place when the low-pass pre-filter is enabled.
/// Always returns a value: silence, noise, and degenerate frames come back
/// as `PitchEstimate::NONE`.
pub fn estimate(
    frame: &mut [f32],
    sample_rate: u32,
    cfg: &YinConfig,
    history: &mut SmoothingHistory,
) -> PitchEstimate {
    let n = frame.len();
    let half = n / 2;
    if half < 2 {
        return PitchEstimate::NONE;
    }

    if cfg.lowpass_hz > 0.0 {
        lowpass_in_place(frame, sample_rate, cfg.lowpass_hz);
    }

    let energy: f32 = frame.iter().map(|&s| s * s).sum();
    let rms = (energy / n as f32).sqrt();
    if rms <= 0.0 {
        // A flat frame has no periodicity to measure.
        return PitchEstimate::NONE;
    }

    let threshold = if cfg.adaptive_threshold {
        (cfg.threshold + (0.05 - rms)).clamp(0.05, 0.2)
    } else {
        cfg.threshold
    };

    // Difference function: d(t) = sum over the first half of the frame of
    // the squared gap between the signal and its t-lagged copy.
    let mut diff = vec![0.0_f32; half];
    for (t, slot) in diff.iter_mut().enumerate().skip(1) {
        let mut sum = 0.0_f32;
        for i in 0..half {
            let d = frame[i] - frame[i + t];
            sum += d * d;
        }
        *slot = sum;
    }

    // Cumulative mean normalization, with d'(0) = 1 by definition.
    // Track the first lag that dips below the threshold as we go.
    diff[0] = 1.0;
    let mut running_sum = 0.0_f32;
    let mut tau: Option<usize> = None;
    for t in 1..half {
        running_sum += diff[t];
        diff[t] *= t as f32 / running_sum.max(1e-12);
        if tau.is_none() && diff[t] < threshold {
            tau = Some(t);
        }
    }

    let Some(mut tau) = tau else {
        return PitchEstimate::NONE;
    };

    // The threshold crossing can land on the shoulder of the dip; walking
    // down to the local minimum removes most of the cents bias and jitter.
    while tau + 1 < half && diff[tau + 1] < diff[tau] {
        tau += 1;
    }
    let clarity = 1.0 - diff[tau];

    let mut refined_tau = tau as f32;
    if cfg.interpolate && tau > 1 && tau < half - 1 {
        let y0 = diff[tau - 1];
        let y1 = diff[tau];
        let y2 = diff[tau + 1];
        let a = (y2 + y0 - 2.0 * y1) / 2.0;
        let b = (y2 - y0) / 2.0;
        // Zero curvature means the three points are collinear and the
        // parabolic fit is degenerate; keep the integer lag.
        if a != 0.0 {
            refined_tau = tau as f32 - b / (2.0 * a);
        }
    }

    let mut frequency_hz = sample_rate as f32 / refined_tau;

    if cfg.smoothing_window > 1 {
        frequency_hz = history.push_and_median(frequency_hz, cfg.smoothing_window);
    } else {
        history.clear();
    }

    PitchEstimate {
        frequency_hz,
        clarity,
    }
}

/// Single-pole low-pass, applied in place.
fn lowpass_in_place(frame: &mut [f32], sample_rate: u32, cutoff_hz: f32) {
    let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f32;
    let alpha = dt / (rc + dt);
    for i in 1..frame.len() {
        frame[i] = frame[i - 1] + alpha * (frame[i] - frame[i - 1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;
    const FRAME_LEN: usize = 4096;

    fn sine_frame(freq_hz: f32, amplitude: f32) -> Vec<f32> {
        (0..FRAME_LEN)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                amplitude * (2.0 * PI * freq_hz * t).sin()
            })
            .collect()
    }

    fn estimate_defaults(frame: &mut [f32]) -> PitchEstimate {
        let mut history = SmoothingHistory::new();
        estimate(frame, SAMPLE_RATE, &YinConfig::default(), &mut history)
    }

    #[test]
    fn detects_pure_sines_within_half_percent() {
        for target in [110.0_f32, 220.0, 440.0, 880.0] {
            let mut frame = sine_frame(target, 0.8);
            let result = estimate_defaults(&mut frame);
            assert!(result.is_detected(), "no pitch at {target} Hz");
            let rel = (result.frequency_hz - target).abs() / target;
            assert!(
                rel < 0.005,
                "{target} Hz estimated as {} Hz",
                result.frequency_hz
            );
            assert!(
                result.clarity > 0.9,
                "clarity {} too low at {target} Hz",
                result.clarity
            );
        }
    }

    #[test]
    fn zero_buffer_reports_no_pitch() {
        let mut frame = vec![0.0_f32; FRAME_LEN];
        let result = estimate_defaults(&mut frame);
        assert_eq!(result, PitchEstimate::NONE);
    }

    #[test]
    fn empty_and_tiny_buffers_report_no_pitch() {
        let mut history = SmoothingHistory::new();
        let cfg = YinConfig::default();
        assert_eq!(
            estimate(&mut [], SAMPLE_RATE, &cfg, &mut history),
            PitchEstimate::NONE
        );
        let mut two = [0.1, -0.1];
        assert_eq!(
            estimate(&mut two, SAMPLE_RATE, &cfg, &mut history),
            PitchEstimate::NONE
        );
    }

    #[test]
    fn white_noise_reports_no_pitch() {
        // Deterministic pseudo-noise; aperiodic, so the normalized
        // difference never dips below the default threshold.
        let mut state = 0x2545_f491_u32;
        let mut frame: Vec<f32> = (0..FRAME_LEN)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state as f32 / u32::MAX as f32) - 0.5
            })
            .collect();
        let result = estimate_defaults(&mut frame);
        assert!(!result.is_detected(), "noise detected as {result:?}");
    }

    #[test]
    fn interpolation_tightens_the_estimate() {
        // 437 Hz does not divide the sample rate evenly, so the integer
        // lag alone lands off-pitch.
        let mut with = sine_frame(437.0, 0.8);
        let mut without = sine_frame(437.0, 0.8);
        let mut history = SmoothingHistory::new();

        let cfg_interp = YinConfig::default();
        let cfg_raw = YinConfig {
            interpolate: false,
            ..YinConfig::default()
        };

        let refined = estimate(&mut with, SAMPLE_RATE, &cfg_interp, &mut history);
        history.clear();
        let coarse = estimate(&mut without, SAMPLE_RATE, &cfg_raw, &mut history);

        let err_refined = (refined.frequency_hz - 437.0).abs();
        let err_coarse = (coarse.frequency_hz - 437.0).abs();
        assert!(
            err_refined <= err_coarse + 0.05,
            "interpolated {err_refined} worse than raw {err_coarse}"
        );
    }

    #[test]
    fn adaptive_threshold_stays_clamped() {
        // A loud frame drives the adaptive threshold to the low clamp;
        // detection should still work on a clean sine.
        let mut frame = sine_frame(440.0, 1.0);
        let mut history = SmoothingHistory::new();
        let cfg = YinConfig {
            adaptive_threshold: true,
            ..YinConfig::default()
        };
        let result = estimate(&mut frame, SAMPLE_RATE, &cfg, &mut history);
        assert!(result.is_detected());
        assert!((result.frequency_hz - 440.0).abs() / 440.0 < 0.005);
    }

    #[test]
    fn median_smoothing_rides_out_an_outlier() {
        let mut history = SmoothingHistory::new();
        let cfg = YinConfig {
            smoothing_window: 3,
            ..YinConfig::default()
        };

        let mut a = sine_frame(440.0, 0.8);
        let mut b = sine_frame(440.0, 0.8);
        // One frame at the octave, as an octave-error stand-in.
        let mut outlier = sine_frame(880.0, 0.8);

        estimate(&mut a, SAMPLE_RATE, &cfg, &mut history);
        estimate(&mut b, SAMPLE_RATE, &cfg, &mut history);
        let smoothed = estimate(&mut outlier, SAMPLE_RATE, &cfg, &mut history);

        assert!(
            (smoothed.frequency_hz - 440.0).abs() / 440.0 < 0.005,
            "median did not absorb the outlier: {} Hz",
            smoothed.frequency_hz
        );
    }

    #[test]
    fn disabling_smoothing_clears_the_history() {
        let mut history = SmoothingHistory::new();
        let smoothing = YinConfig {
            smoothing_window: 5,
            ..YinConfig::default()
        };
        let mut frame = sine_frame(440.0, 0.8);
        estimate(&mut frame, SAMPLE_RATE, &smoothing, &mut history);
        assert!(!history.recent.is_empty());

        let mut frame = sine_frame(440.0, 0.8);
        estimate(&mut frame, SAMPLE_RATE, &YinConfig::default(), &mut history);
        assert!(history.recent.is_empty());
    }

    #[test]
    fn smoothing_leaves_clarity_alone() {
        let mut history = SmoothingHistory::new();
        let cfg = YinConfig {
            smoothing_window: 4,
            ..YinConfig::default()
        };
        let mut a = sine_frame(440.0, 0.8);
        let first = estimate(&mut a, SAMPLE_RATE, &cfg, &mut history);
        let mut b = sine_frame(440.0, 0.8);
        estimate(&mut b, SAMPLE_RATE, &cfg, &mut history);
        let mut c = sine_frame(880.0, 0.8);
        let third = estimate(&mut c, SAMPLE_RATE, &cfg, &mut history);
        // Clarity comes from this frame's dip even when the reported
        // frequency is the running median.
        assert!(first.clarity > 0.9);
        assert!(third.clarity > 0.9);
        assert!((third.frequency_hz - 440.0).abs() < 440.0 * 0.005);
    }

    #[test]
    fn lowpass_attenuates_high_frequencies() {
        let mut frame = sine_frame(8000.0, 0.8);
        let before = frame.iter().map(|s| s * s).sum::<f32>();
        lowpass_in_place(&mut frame, SAMPLE_RATE, 300.0);
        let after = frame.iter().map(|s| s * s).sum::<f32>();
        assert!(after < before * 0.1, "8 kHz not attenuated: {after} vs {before}");
    }
}
