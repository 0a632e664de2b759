use clap::{Args, Parser, Subcommand};

use crate::config::TrainerSettings;

#[derive(Parser)]
#[command(name = "pitchgym")]
#[command(about = "Ear training in the terminal: match the tone it plays")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start a training session
    Train(TrainArgs),

    /// Play a single reference tone and exit
    Tone {
        /// Note name ("A4", "Bb2") or MIDI number
        note: String,

        /// Tone length in milliseconds
        #[arg(long, default_value_t = 1000)]
        ms: u64,
    },

    /// List available audio input devices
    Devices,

    /// Quick 2-second mic level check
    MicCheck,

    /// Show the effective configuration and where it is loaded from
    Config,
}

/// Command-line overrides layered over config.toml for one session.
#[derive(Args)]
pub struct TrainArgs {
    /// Training mode: minmax, continuous, lists, or tonal
    #[arg(long)]
    pub mode: Option<String>,

    /// Low end of the range (note name or MIDI number)
    #[arg(long)]
    pub low: Option<String>,

    /// High end of the range (note name or MIDI number)
    #[arg(long)]
    pub high: Option<String>,

    /// Hit tolerance in cents (1-200)
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// A4 reference frequency in Hz
    #[arg(long)]
    pub a4: Option<f64>,

    /// Smallest jump in semitones, or "none" for no lower bound
    #[arg(long)]
    pub jump_min: Option<String>,

    /// Largest jump in semitones, or "none" for no upper bound
    #[arg(long)]
    pub jump_max: Option<String>,

    /// Interval list for lists mode (comma-separated semitone magnitudes)
    #[arg(long, value_delimiter = ',')]
    pub intervals: Option<Vec<i32>>,

    /// Separate downward interval list (implies asymmetric lists)
    #[arg(long, value_delimiter = ',')]
    pub down_intervals: Option<Vec<i32>>,

    /// Tonal root pitch class (C, F#, Bb, ...)
    #[arg(long)]
    pub root: Option<String>,

    /// Tonal degrees relative to the root (comma-separated, 0-11)
    #[arg(long, value_delimiter = ',')]
    pub degrees: Option<Vec<i32>>,

    /// Smallest continuous-mode step in cents
    #[arg(long)]
    pub cents_min: Option<i32>,

    /// Largest continuous-mode step in cents
    #[arg(long)]
    pub cents_max: Option<i32>,

    /// Goal shift in semitones (sing this far from the played tone)
    #[arg(long)]
    pub shift: Option<i32>,

    /// Goal shift in scale-degree steps (tonal mode)
    #[arg(long)]
    pub degree_shift: Option<i32>,

    /// Display transpose for transposing instruments (Bb trumpet = -2)
    #[arg(long)]
    pub transpose: Option<i32>,

    /// Replay the confirmed tone before advancing
    #[arg(long)]
    pub replay: bool,
}

impl TrainArgs {
    /// Layer these flags over the persisted settings. "none" or a
    /// negative jump bound means unbounded; unparseable bounds are left
    /// as configured.
    pub fn apply(&self, settings: &mut TrainerSettings) {
        let parse_bound = |raw: &str| -> Option<i32> {
            if raw.eq_ignore_ascii_case("none") {
                Some(-1)
            } else {
                raw.parse::<i32>().ok()
            }
        };

        if let Some(mode) = &self.mode {
            settings.mode = mode.clone();
        }
        if let Some(low) = &self.low {
            settings.low_note = low.clone();
        }
        if let Some(high) = &self.high {
            settings.high_note = high.clone();
        }
        if let Some(tolerance) = self.tolerance {
            settings.tolerance_cents = tolerance;
        }
        if let Some(a4) = self.a4 {
            settings.a4_hz = a4;
        }
        if let Some(bound) = self.jump_min.as_deref().and_then(parse_bound) {
            settings.jump_min = bound;
        }
        if let Some(bound) = self.jump_max.as_deref().and_then(parse_bound) {
            settings.jump_max = bound;
        }
        if let Some(intervals) = &self.intervals {
            settings.up_intervals = intervals.clone();
        }
        if let Some(down) = &self.down_intervals {
            settings.down_intervals = down.clone();
            settings.symmetric = false;
        }
        if let Some(root) = &self.root {
            settings.root = root.clone();
        }
        if let Some(degrees) = &self.degrees {
            settings.degrees = degrees.clone();
        }
        if let Some(cents_min) = self.cents_min {
            settings.cents_min = cents_min;
        }
        if let Some(cents_max) = self.cents_max {
            settings.cents_max = cents_max;
        }
        if let Some(shift) = self.shift {
            settings.shift_semitones = shift;
            settings.use_degree_shift = false;
        }
        if let Some(steps) = self.degree_shift {
            settings.degree_shift = steps;
            settings.use_degree_shift = true;
        }
        if let Some(transpose) = self.transpose {
            settings.transpose = transpose;
        }
        if self.replay {
            settings.replay = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Mode;

    fn bare_args() -> TrainArgs {
        TrainArgs {
            mode: None,
            low: None,
            high: None,
            tolerance: None,
            a4: None,
            jump_min: None,
            jump_max: None,
            intervals: None,
            down_intervals: None,
            root: None,
            degrees: None,
            cents_min: None,
            cents_max: None,
            shift: None,
            degree_shift: None,
            transpose: None,
            replay: false,
        }
    }

    #[test]
    fn no_flags_leave_settings_untouched() {
        let mut settings = TrainerSettings::default();
        let before = settings.clone();
        bare_args().apply(&mut settings);
        assert_eq!(settings.mode, before.mode);
        assert_eq!(settings.tolerance_cents, before.tolerance_cents);
        assert_eq!(settings.replay, before.replay);
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = TrainerSettings::default();
        let args = TrainArgs {
            mode: Some("tonal".into()),
            low: Some("C3".into()),
            tolerance: Some(10.0),
            jump_max: Some("none".into()),
            replay: true,
            ..bare_args()
        };
        args.apply(&mut settings);

        let cfg = settings.to_trainer_config();
        assert_eq!(cfg.mode, Mode::Tonal);
        assert_eq!(cfg.low_note, 48);
        assert_eq!(cfg.tolerance_cents, 10.0);
        assert_eq!(cfg.jump_max, None);
        assert!(cfg.replay);
    }

    #[test]
    fn down_intervals_switch_off_symmetry() {
        let mut settings = TrainerSettings::default();
        let args = TrainArgs {
            down_intervals: Some(vec![1, 2]),
            ..bare_args()
        };
        args.apply(&mut settings);
        assert!(!settings.symmetric);
        assert_eq!(settings.down_intervals, vec![1, 2]);
    }

    #[test]
    fn degree_shift_flag_selects_the_degree_transform() {
        let mut settings = TrainerSettings::default();
        let args = TrainArgs {
            mode: Some("tonal".into()),
            degree_shift: Some(2),
            ..bare_args()
        };
        args.apply(&mut settings);
        assert!(settings.use_degree_shift);
        assert_eq!(settings.degree_shift, 2);
    }

    #[test]
    fn garbage_jump_bound_is_ignored() {
        let mut settings = TrainerSettings::default();
        let args = TrainArgs {
            jump_min: Some("banana".into()),
            ..bare_args()
        };
        args.apply(&mut settings);
        assert_eq!(settings.jump_min, TrainerSettings::default().jump_min);
    }
}
