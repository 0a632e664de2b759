use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{Mode, Shift, TrainerConfig};
use crate::paths;
use crate::theory;

/// Application configuration, loaded from config.toml.
///
/// serde's `default` attribute means a missing field takes the value from
/// the Default implementation instead of failing the parse, so the config
/// file is optional and may be partial.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub trainer: TrainerSettings,
}

/// User-facing trainer settings. Notes and the tonal root are written as
/// names ("A2", "F#") or bare MIDI numbers; a jump bound of -1 means
/// "no bound". Anything unparseable falls back to the default when the
/// settings are turned into an engine configuration; config mistakes
/// adjust themselves, they never abort a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    pub mode: String,
    pub low_note: String,
    pub high_note: String,
    pub jump_min: i32,
    pub jump_max: i32,
    pub up_intervals: Vec<i32>,
    pub down_intervals: Vec<i32>,
    pub symmetric: bool,
    pub root: String,
    pub degrees: Vec<i32>,
    pub cents_min: i32,
    pub cents_max: i32,
    pub tolerance_cents: f64,
    pub a4_hz: f64,
    pub shift_semitones: i32,
    /// Scale-degree steps for the alternate shift; active only when
    /// `use_degree_shift` is set and the mode is tonal.
    pub degree_shift: i32,
    pub use_degree_shift: bool,
    pub transpose: i32,
    pub sound_ms: u64,
    pub gap_ms: u64,
    pub replay: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trainer: TrainerSettings::default(),
        }
    }
}

impl Default for TrainerSettings {
    fn default() -> Self {
        let engine = TrainerConfig::default();
        Self {
            mode: engine.mode.as_str().into(),
            low_note: theory::note_name(engine.low_note),
            high_note: theory::note_name(engine.high_note),
            jump_min: engine.jump_min.unwrap_or(-1),
            jump_max: engine.jump_max.unwrap_or(-1),
            up_intervals: engine.up_intervals.clone(),
            down_intervals: engine.down_intervals.clone(),
            symmetric: engine.symmetric,
            root: "C".into(),
            degrees: engine.degrees.clone(),
            cents_min: engine.cents_min,
            cents_max: engine.cents_max,
            tolerance_cents: engine.tolerance_cents,
            a4_hz: engine.a4_hz,
            shift_semitones: 0,
            degree_shift: 1,
            use_degree_shift: false,
            transpose: engine.transpose,
            sound_ms: engine.sound_ms,
            gap_ms: engine.gap_ms,
            replay: engine.replay,
        }
    }
}

impl TrainerSettings {
    /// Bridge to the engine configuration: parse the string-typed fields,
    /// substitute defaults for anything malformed, and sanitize.
    pub fn to_trainer_config(&self) -> TrainerConfig {
        let defaults = TrainerConfig::default();

        let mode = self.mode.parse::<Mode>().unwrap_or(defaults.mode);

        let shift = if self.use_degree_shift && mode == Mode::Tonal {
            Shift::Degrees(self.degree_shift)
        } else {
            Shift::Semitones(self.shift_semitones)
        };

        let jump_bound = |raw: i32| if raw < 0 { None } else { Some(raw) };

        TrainerConfig {
            low_note: theory::parse_note(&self.low_note).unwrap_or(defaults.low_note),
            high_note: theory::parse_note(&self.high_note).unwrap_or(defaults.high_note),
            mode,
            jump_min: jump_bound(self.jump_min),
            jump_max: jump_bound(self.jump_max),
            up_intervals: self.up_intervals.clone(),
            down_intervals: self.down_intervals.clone(),
            symmetric: self.symmetric,
            root_pc: theory::parse_pitch_class(&self.root).unwrap_or(defaults.root_pc),
            degrees: self.degrees.clone(),
            cents_min: self.cents_min,
            cents_max: self.cents_max,
            tolerance_cents: self.tolerance_cents,
            a4_hz: self.a4_hz,
            shift,
            transpose: self.transpose,
            sound_ms: self.sound_ms,
            gap_ms: self.gap_ms,
            replay: self.replay,
        }
        .sanitized()
    }
}

/// Load the application config from the XDG config path; absent file
/// means defaults.
pub fn load_config() -> Result<AppConfig> {
    load_from(&paths::config_file())
}

fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
