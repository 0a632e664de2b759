//! The training engine: target scheduling, per-tick match decisions, and
//! the cooperative session loop that ties them to capture and playback.

pub mod matching;
pub mod scheduler;
pub mod session;

use std::fmt;
use std::str::FromStr;

use crate::theory;

/// How the scheduler picks the next target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Any jump whose magnitude lies between the min/max bounds.
    MinMax,
    /// Free frequencies a bounded number of cents away from the last one.
    Continuous,
    /// Jump magnitudes drawn from explicit up/down interval lists.
    Lists,
    /// Notes restricted to scale degrees of a configured root.
    Tonal,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::MinMax => "minmax",
            Mode::Continuous => "continuous",
            Mode::Lists => "lists",
            Mode::Tonal => "tonal",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minmax" => Ok(Mode::MinMax),
            "continuous" => Ok(Mode::Continuous),
            "lists" => Ok(Mode::Lists),
            "tonal" => Ok(Mode::Tonal),
            other => Err(format!(
                "unknown mode '{other}' (expected minmax, continuous, lists, or tonal)"
            )),
        }
    }
}

/// Transform applied to the target before comparing the live pitch to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// Goal = target frequency shifted by this many semitones.
    Semitones(i32),
    /// Goal = target note walked this many scale-degree steps through the
    /// active degree set. Only meaningful in tonal mode; sanitization turns
    /// it into `Semitones(0)` elsewhere.
    Degrees(i32),
}

impl Default for Shift {
    fn default() -> Self {
        Shift::Semitones(0)
    }
}

/// One note the performer is asked to reproduce.
///
/// Integer-note targets keep the equal-tempered invariant
/// `f = a4 * 2^((note - 69) / 12)`. Continuous-mode targets carry a free
/// frequency, with `note` a rounded in-range approximation for display.
/// Targets are replaced wholesale after every confirmed hit, never edited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub note: Option<i32>,
    pub frequency_hz: f64,
}

impl Target {
    pub fn from_note(note: i32, a4_hz: f64) -> Self {
        Self {
            note: Some(note),
            frequency_hz: theory::note_to_freq(note, a4_hz),
        }
    }
}

/// Everything the scheduler and match engine read each tick. Callers pass
/// a fresh (sanitized) value into every call; the engine caches nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub low_note: i32,
    pub high_note: i32,
    pub mode: Mode,
    /// Smallest jump magnitude; `None` collapses to 0.
    pub jump_min: Option<i32>,
    /// Largest jump magnitude; `None` collapses to the range cap.
    pub jump_max: Option<i32>,
    /// Jump magnitudes allowed upward in lists mode.
    pub up_intervals: Vec<i32>,
    /// Jump magnitudes allowed downward in lists mode (unused when
    /// `symmetric` reuses the up list).
    pub down_intervals: Vec<i32>,
    pub symmetric: bool,
    /// Tonal root pitch class, 0..12.
    pub root_pc: i32,
    /// Scale degrees (pitch classes relative to the root) that are valid
    /// tonal targets. Empty behaves as {root}.
    pub degrees: Vec<i32>,
    pub cents_min: i32,
    pub cents_max: i32,
    pub tolerance_cents: f64,
    pub a4_hz: f64,
    pub shift: Shift,
    /// Display-only transpose for transposing instruments (Bb trumpet = -2).
    /// Never enters concert-pitch math.
    pub transpose: i32,
    /// Reference tone length per repetition.
    pub sound_ms: u64,
    /// Silence between repetitions.
    pub gap_ms: u64,
    /// Replay the confirmed tone before advancing to the next target.
    pub replay: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            low_note: 45,  // A2
            high_note: 67, // G4
            mode: Mode::MinMax,
            jump_min: Some(1),
            jump_max: Some(12),
            up_intervals: (0..=11).collect(),
            down_intervals: (0..=11).collect(),
            symmetric: true,
            root_pc: 0,
            degrees: vec![0, 2, 4, 5, 7, 9, 11],
            cents_min: 20,
            cents_max: 1200,
            tolerance_cents: 25.0,
            a4_hz: 440.0,
            shift: Shift::default(),
            transpose: 0,
            sound_ms: 1000,
            gap_ms: 2000,
            replay: false,
        }
    }
}

impl TrainerConfig {
    /// Clamp every field to its documented domain. Bad values become the
    /// nearest valid one (or the default), never an error.
    pub fn sanitized(&self) -> TrainerConfig {
        let mut low = self.low_note.clamp(theory::MIN_NOTE, theory::MAX_NOTE);
        let mut high = self.high_note.clamp(theory::MIN_NOTE, theory::MAX_NOTE);
        if low > high {
            std::mem::swap(&mut low, &mut high);
        }

        let clamp_jump = |bound: Option<i32>| bound.map(|j| j.clamp(0, theory::JUMP_CAP));

        let cents_min = self.cents_min.clamp(0, 1200);
        let cents_max = self.cents_max.clamp(0, 1200).max(cents_min);

        let a4_hz = if self.a4_hz.is_finite() {
            self.a4_hz.clamp(50.0, 2000.0)
        } else {
            440.0
        };

        let tolerance_cents = if self.tolerance_cents.is_finite() {
            self.tolerance_cents.clamp(1.0, 200.0)
        } else {
            25.0
        };

        let shift = match self.shift {
            Shift::Degrees(_) if self.mode != Mode::Tonal => Shift::Semitones(0),
            other => other,
        };

        TrainerConfig {
            low_note: low,
            high_note: high,
            mode: self.mode,
            jump_min: clamp_jump(self.jump_min),
            jump_max: clamp_jump(self.jump_max),
            up_intervals: sanitize_intervals(&self.up_intervals),
            down_intervals: sanitize_intervals(&self.down_intervals),
            symmetric: self.symmetric,
            root_pc: theory::pitch_class(self.root_pc),
            degrees: sanitize_degrees(&self.degrees),
            cents_min,
            cents_max,
            tolerance_cents,
            a4_hz,
            shift,
            transpose: self.transpose,
            sound_ms: self.sound_ms,
            gap_ms: self.gap_ms,
            replay: self.replay,
        }
    }

    /// Largest jump the current range allows.
    pub fn jump_cap(&self) -> i32 {
        theory::JUMP_CAP.min((self.high_note - self.low_note).max(0))
    }

    /// Frequency bounds of the note range at the configured A4.
    pub fn freq_bounds(&self) -> (f64, f64) {
        (
            theory::note_to_freq(self.low_note, self.a4_hz),
            theory::note_to_freq(self.high_note, self.a4_hz),
        )
    }

    /// Active degree set, falling back to {root} when empty.
    pub fn degree_set(&self) -> Vec<i32> {
        if self.degrees.is_empty() {
            vec![0]
        } else {
            self.degrees.clone()
        }
    }
}

/// Keep non-negative magnitudes, deduplicated, order preserved.
fn sanitize_intervals(raw: &[i32]) -> Vec<i32> {
    let mut seen = Vec::new();
    for &n in raw {
        if n >= 0 && !seen.contains(&n) {
            seen.push(n);
        }
    }
    seen
}

/// Keep pitch classes 0..12, deduplicated, order preserved.
fn sanitize_degrees(raw: &[i32]) -> Vec<i32> {
    let mut seen = Vec::new();
    for &n in raw {
        if (0..12).contains(&n) && !seen.contains(&n) {
            seen.push(n);
        }
    }
    seen
}
