//! Per-tick reconciliation of the live pitch against the current goal.
//!
//! The hit decision runs on the raw instantaneous deviation; the smoothed
//! value exists purely for the tuner readout. Time is passed in by the
//! caller as milliseconds since session start, so tests can drive a fake
//! clock.

use crate::dsp::yin::PitchEstimate;
use crate::engine::{Mode, Shift, Target, TrainerConfig};
use crate::theory;

/// Signal power gate: frames quieter than this are ignored.
pub const MIN_LOUDNESS_DBFS: f32 = -73.0;

/// Clarity gate: estimates below this confidence are ignored.
pub const MIN_CLARITY: f32 = 0.46;

/// How long the deviation must stay inside tolerance before a hit counts.
pub const HIT_HOLD_MS: f64 = 100.0;

/// How long the tuner keeps its last reading after input disappears.
pub const TUNER_HOLD_MS: f64 = 500.0;

/// Low-pass factor for the tuner needle.
const TUNER_SMOOTH_ALPHA: f64 = 0.18;

/// The frequency the performer is actually compared against: the target
/// frequency with the configured shift applied.
///
/// The scale-degree variant walks the target note through the active
/// degree set; it only applies to integer-note targets (sanitization
/// restricts it to tonal mode), anything else passes through unshifted.
pub fn goal_frequency(target: &Target, cfg: &TrainerConfig) -> f64 {
    if !(target.frequency_hz > 0.0) {
        return 0.0;
    }
    match cfg.shift {
        Shift::Semitones(semitones) => {
            target.frequency_hz * 2.0_f64.powf(semitones as f64 / 12.0)
        }
        Shift::Degrees(steps) => match target.note {
            Some(note) => {
                let shifted =
                    theory::step_by_degrees(note, steps, cfg.root_pc, &cfg.degree_set());
                theory::note_to_freq(shifted, cfg.a4_hz)
            }
            None => target.frequency_hz,
        },
    }
}

/// Read-only snapshot of one tick, for display and debugging.
#[derive(Debug, Clone, Copy)]
pub struct Telemetry {
    pub frequency_hz: f64,
    pub goal_hz: f64,
    /// Raw deviation from the goal; `None` when there was no usable input.
    pub deviation_cents: Option<f64>,
    /// Smoothed deviation for the tuner needle; `None` means "no signal"
    /// (nothing usable for longer than the tuner hold window).
    pub tuner_cents: Option<f64>,
    pub clarity: f32,
    pub loudness_db: f32,
    pub loud_enough: bool,
    pub clear_enough: bool,
    pub has_input: bool,
    pub locked: bool,
    pub mode: Mode,
}

/// Result of one tick: whether a hit fired, plus the telemetry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct TickDecision {
    pub hit: bool,
    pub telemetry: Telemetry,
}

/// Mutable match state. Reset at session start; only `tick` writes it.
#[derive(Debug, Default)]
pub struct MatchState {
    /// Set on a confirmed hit; cleared only when a new target is installed.
    pub locked: bool,
    in_tolerance_since_ms: Option<f64>,
    last_input_ms: Option<f64>,
    smoothed_cents: f64,
}

impl MatchState {
    /// Fresh state, as installed at session start.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new target was installed: unlock and forget the dwell timer.
    /// The tuner smoothing carries over: the needle should not jump to
    /// zero just because the goal moved.
    pub fn install_target(&mut self) {
        self.locked = false;
        self.in_tolerance_since_ms = None;
    }

    /// Decide one tick. Total: every input combination produces a value,
    /// including zero tolerance and a missing pitch.
    pub fn tick(
        &mut self,
        estimate: PitchEstimate,
        loudness_db: f32,
        target: &Target,
        cfg: &TrainerConfig,
        now_ms: f64,
    ) -> TickDecision {
        let goal_hz = goal_frequency(target, cfg);
        let loud_enough = loudness_db >= MIN_LOUDNESS_DBFS;
        let clear_enough = estimate.clarity >= MIN_CLARITY;
        let has_input = !self.locked
            && goal_hz > 0.0
            && loud_enough
            && clear_enough
            && estimate.is_detected();

        let mut hit = false;
        let mut deviation_cents = None;

        if has_input {
            self.last_input_ms = Some(now_ms);

            let deviation = theory::cents_between(estimate.frequency_hz as f64, goal_hz);
            deviation_cents = Some(deviation);
            self.smoothed_cents =
                (1.0 - TUNER_SMOOTH_ALPHA) * self.smoothed_cents + TUNER_SMOOTH_ALPHA * deviation;

            if deviation.abs() < cfg.tolerance_cents {
                let since = *self.in_tolerance_since_ms.get_or_insert(now_ms);
                if now_ms - since >= HIT_HOLD_MS {
                    self.locked = true;
                    self.in_tolerance_since_ms = None;
                    hit = true;
                }
            } else {
                // No partial credit: leaving tolerance forgets the dwell.
                self.in_tolerance_since_ms = None;
            }
        } else {
            self.in_tolerance_since_ms = None;
        }

        let tuner_cents = match self.last_input_ms {
            Some(last) if now_ms - last <= TUNER_HOLD_MS => Some(self.smoothed_cents),
            _ => None,
        };

        TickDecision {
            hit,
            telemetry: Telemetry {
                frequency_hz: estimate.frequency_hz as f64,
                goal_hz,
                deviation_cents,
                tuner_cents,
                clarity: estimate.clarity,
                loudness_db,
                loud_enough,
                clear_enough,
                has_input,
                locked: self.locked,
                mode: cfg.mode,
            },
        }
    }
}
