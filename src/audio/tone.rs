use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

use crate::engine::session::TonePlayer;

/// Render sample rate for synthesized tones; rodio resamples for the
/// device if needed.
const SYNTH_RATE: u32 = 44100;

/// Amplitude rolloff exponent per partial (1/n^2.6 keeps it warm but
/// clearly pitched).
const PARTIAL_ROLLOFF: f32 = 2.6;

/// Upper bound on additive partials; partials past Nyquist are dropped.
const MAX_PARTIALS: usize = 14;

/// Overall output level.
const MASTER_GAIN: f32 = 0.18;

const ATTACK_SECS: f32 = 0.01;
const DECAY_SECS: f32 = 0.05;
const SUSTAIN_LEVEL: f32 = 0.75;
const RELEASE_SECS: f32 = 0.04;

/// Ramp length when a tone is cut short. A fade, not a click.
const FADE_OUT_SECS: f32 = 0.012;

/// Tone playback for reference notes. Keeps the output device open for
/// the lifetime of the struct and tracks in-flight tones so they can be
/// faded out when replaced or when the session stops.
pub struct ToneSynth {
    // RAII guard: dropping it closes the output device.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    active: Vec<ActiveTone>,
}

struct ActiveTone {
    sink: Sink,
    fade: Arc<AtomicBool>,
}

impl ToneSynth {
    pub fn new() -> Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().context("Failed to open audio output device")?;
        Ok(Self {
            _stream: stream,
            handle,
            active: Vec::new(),
        })
    }

    fn begin_fade(tone: &ActiveTone) {
        tone.fade.store(true, Ordering::Relaxed);
    }

    /// Drop bookkeeping for tones that already finished on their own.
    fn reap_finished(&mut self) {
        self.active.retain(|tone| !tone.sink.empty());
    }
}

impl TonePlayer for ToneSynth {
    fn play(&mut self, frequency_hz: f64, duration_ms: u64, stop_existing: bool) {
        self.reap_finished();
        if stop_existing {
            for tone in &self.active {
                Self::begin_fade(tone);
            }
        }

        let sink = match Sink::try_new(&self.handle) {
            Ok(sink) => sink,
            Err(err) => {
                // A lost output path degrades to a silent trainer rather
                // than killing the session mid-tick.
                eprintln!("Tone playback error: {err}");
                return;
            }
        };

        let fade = Arc::new(AtomicBool::new(false));
        let source = AdditiveTone::new(frequency_hz as f32, duration_ms, Arc::clone(&fade));
        sink.append(source);
        self.active.push(ActiveTone { sink, fade });
    }

    fn fade_out_all(&mut self) {
        for tone in &self.active {
            Self::begin_fade(tone);
        }
    }
}

/// A fixed-duration additive tone: the first `MAX_PARTIALS` harmonics
/// under Nyquist with 1/n^rolloff amplitudes, shaped by an
/// attack/decay/sustain/release envelope, with an externally triggered
/// fast fade-out.
pub struct AdditiveTone {
    partials: Vec<(f32, f32)>, // (frequency, normalized amplitude)
    total_samples: usize,
    pos: usize,
    duration_secs: f32,
    fade: Arc<AtomicBool>,
    fade_started_at: Option<usize>,
}

impl AdditiveTone {
    pub fn new(frequency_hz: f32, duration_ms: u64, fade: Arc<AtomicBool>) -> Self {
        let duration_secs = (duration_ms as f32 / 1000.0).max(0.05);
        let nyquist = SYNTH_RATE as f32 / 2.0;

        let mut partials = Vec::new();
        let mut amplitude_sum = 0.0_f32;
        for n in 1..=MAX_PARTIALS {
            let freq = frequency_hz * n as f32;
            if freq >= nyquist {
                break;
            }
            let amplitude = 1.0 / (n as f32).powf(PARTIAL_ROLLOFF);
            partials.push((freq, amplitude));
            amplitude_sum += amplitude;
        }
        let norm = if amplitude_sum > 0.0 {
            1.0 / amplitude_sum
        } else {
            1.0
        };
        for partial in &mut partials {
            partial.1 *= norm;
        }

        Self {
            partials,
            total_samples: (duration_secs * SYNTH_RATE as f32) as usize,
            pos: 0,
            duration_secs,
            fade,
            fade_started_at: None,
        }
    }

    fn envelope(&self, t: f32) -> f32 {
        let release_start = (ATTACK_SECS + DECAY_SECS).max(self.duration_secs - RELEASE_SECS);
        if t < ATTACK_SECS {
            t / ATTACK_SECS
        } else if t < ATTACK_SECS + DECAY_SECS {
            let progress = (t - ATTACK_SECS) / DECAY_SECS;
            1.0 + (SUSTAIN_LEVEL - 1.0) * progress
        } else if t < release_start {
            SUSTAIN_LEVEL
        } else {
            let remaining = (self.duration_secs - t) / (self.duration_secs - release_start);
            SUSTAIN_LEVEL * remaining.clamp(0.0, 1.0)
        }
    }
}

impl Iterator for AdditiveTone {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.total_samples {
            return None;
        }

        // An external fade request ramps the remaining samples to zero
        // over a few milliseconds, then ends the source early.
        let fade_gain = if self.fade.load(Ordering::Relaxed) {
            let started = *self.fade_started_at.get_or_insert(self.pos);
            let fade_len = (FADE_OUT_SECS * SYNTH_RATE as f32) as usize;
            let elapsed = self.pos - started;
            if elapsed >= fade_len {
                self.pos = self.total_samples;
                return None;
            }
            1.0 - elapsed as f32 / fade_len as f32
        } else {
            1.0
        };

        let t = self.pos as f32 / SYNTH_RATE as f32;
        let envelope = self.envelope(t);
        let mut sample = 0.0_f32;
        for &(freq, amplitude) in &self.partials {
            sample += amplitude * (2.0 * std::f32::consts::PI * freq * t).sin();
        }

        self.pos += 1;
        Some(MASTER_GAIN * envelope * fade_gain * sample)
    }
}

impl Source for AdditiveTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SYNTH_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(self.duration_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(frequency_hz: f32, duration_ms: u64) -> Vec<f32> {
        let fade = Arc::new(AtomicBool::new(false));
        AdditiveTone::new(frequency_hz, duration_ms, fade).collect()
    }

    #[test]
    fn tone_has_the_expected_length() {
        let samples = render(440.0, 500);
        assert_eq!(samples.len(), (0.5 * SYNTH_RATE as f32) as usize);
    }

    #[test]
    fn very_short_requests_are_stretched_to_a_minimum() {
        let samples = render(440.0, 1);
        assert_eq!(samples.len(), (0.05 * SYNTH_RATE as f32) as usize);
    }

    #[test]
    fn tone_starts_and_ends_near_silence() {
        let samples = render(440.0, 300);
        assert!(samples[0].abs() < 0.01);
        assert!(samples[samples.len() - 1].abs() < 0.01);
        // But the body has signal.
        let peak = samples.iter().fold(0.0_f32, |m, &s| m.max(s.abs()));
        assert!(peak > 0.05, "tone body is silent: peak {peak}");
    }

    #[test]
    fn output_stays_within_full_scale() {
        for freq in [110.0, 440.0, 1760.0] {
            let samples = render(freq, 200);
            for &s in &samples {
                assert!(s.abs() <= 1.0, "sample {s} clips at {freq} Hz");
            }
        }
    }

    #[test]
    fn high_fundamentals_drop_partials_above_nyquist() {
        // At 5 kHz only the first four partials fit under 22.05 kHz.
        let fade = Arc::new(AtomicBool::new(false));
        let tone = AdditiveTone::new(5000.0, 100, fade);
        assert_eq!(tone.partials.len(), 4);
    }

    #[test]
    fn fade_request_ends_the_tone_early_and_smoothly() {
        let fade = Arc::new(AtomicBool::new(false));
        let mut tone = AdditiveTone::new(440.0, 1000, Arc::clone(&fade));

        // Play into the sustain region, then request the fade.
        let mut played = Vec::new();
        for _ in 0..10_000 {
            played.push(tone.next().unwrap());
        }
        fade.store(true, Ordering::Relaxed);
        let tail: Vec<f32> = (&mut tone).collect();

        let fade_len = (FADE_OUT_SECS * SYNTH_RATE as f32) as usize;
        assert!(tail.len() <= fade_len, "fade tail too long: {}", tail.len());
        // The ramp must shrink towards silence rather than cut.
        let late_peak = tail[tail.len() / 2..]
            .iter()
            .fold(0.0_f32, |m, &s| m.max(s.abs()));
        let early_peak = tail[..tail.len() / 2]
            .iter()
            .fold(0.0_f32, |m, &s| m.max(s.abs()));
        assert!(late_peak <= early_peak + 1e-3);
    }

    #[test]
    fn pitch_of_the_rendered_tone_matches_the_request() {
        use crate::dsp::yin::{self, SmoothingHistory, YinConfig};

        let mut samples = render(330.0, 400);
        // Analyze the sustain region to dodge the attack transient.
        let mut frame: Vec<f32> = samples.drain(4000..8096).collect();
        let mut history = SmoothingHistory::new();
        let estimate = yin::estimate(&mut frame, SYNTH_RATE, &YinConfig::default(), &mut history);
        assert!(estimate.is_detected());
        assert!(
            (estimate.frequency_hz - 330.0).abs() / 330.0 < 0.01,
            "synth played {} Hz instead of 330",
            estimate.frequency_hz
        );
    }
}
