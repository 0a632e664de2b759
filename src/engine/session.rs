//! The cooperative tick loop that ties capture, estimation, matching, and
//! playback together.
//!
//! One tick = pull a frame, estimate, decide, maybe advance the target and
//! request playback. The two deferred actions (periodic repeat of the
//! target tone, replay-then-advance after a hit) carry a generation token
//! captured when they are scheduled; by the time one comes due the session
//! may have stopped or the target may have changed, and a stale token
//! makes the firing a no-op.

use rand::Rng;

use crate::dsp::yin::{self, PitchEstimate, SmoothingHistory, YinConfig};
use crate::engine::matching::MatchState;
use crate::engine::{matching, scheduler, Mode, Target, TrainerConfig};
use crate::theory;
use crate::util;

/// Samples per analysis frame.
pub const FRAME_LEN: usize = 4096;

/// Confirmed-tone replay length after a hit (replay mode only).
pub const REPLAY_TONE_MS: u64 = 450;

/// Pause between the replay and the next target.
pub const REPLAY_GAP_MS: u64 = 120;

/// Pull-style supplier of one mono frame per tick.
pub trait FrameSource {
    fn sample_rate(&self) -> u32;

    /// Fill `frame` with the most recent samples, zero-padding the front
    /// when fewer have been captured so far.
    fn fill_latest(&mut self, frame: &mut [f32]);
}

/// Fire-and-forget tone renderer. Timbre and envelope are its concern.
pub trait TonePlayer {
    fn play(&mut self, frequency_hz: f64, duration_ms: u64, stop_existing: bool);

    /// Ramp all in-flight tones to silence instead of cutting them.
    fn fade_out_all(&mut self);
}

/// A scheduled one-shot. Fires only while its generation is current.
#[derive(Debug, Clone, Copy)]
struct Deferred {
    generation: u64,
    due_ms: f64,
}

/// What one tick produced, for the front-end.
#[derive(Debug, Clone, Copy)]
pub struct TickOutcome {
    pub telemetry: matching::Telemetry,
    /// The target that was just confirmed, when this tick completed a hit
    /// or an earlier hit's replay window elapsed.
    pub solved: Option<Target>,
}

/// One training session. Owns the capture and playback collaborators and
/// all mutable engine state; the configuration is passed fresh into every
/// call and never cached across ticks.
pub struct Session<S: FrameSource, P: TonePlayer> {
    frames: S,
    tones: P,
    frame: Vec<f32>,
    yin_cfg: YinConfig,
    history: SmoothingHistory,
    target: Option<Target>,
    match_state: MatchState,
    generation: u64,
    repeat: Option<Deferred>,
    advance: Option<Deferred>,
    stopped: bool,
}

impl<S: FrameSource, P: TonePlayer> Session<S, P> {
    /// Start a session: install the first target and sound it.
    pub fn start(frames: S, tones: P, cfg: &TrainerConfig, now_ms: f64, rng: &mut impl Rng) -> Self {
        let mut session = Self {
            frames,
            tones,
            frame: vec![0.0; FRAME_LEN],
            yin_cfg: YinConfig::default(),
            history: SmoothingHistory::new(),
            target: None,
            match_state: MatchState::new(),
            generation: 0,
            repeat: None,
            advance: None,
            stopped: false,
        };
        session.install_target(cfg, now_ms, rng);
        session
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Run one tick. Returns `None` once the session has been stopped.
    pub fn tick(
        &mut self,
        cfg: &TrainerConfig,
        now_ms: f64,
        rng: &mut impl Rng,
    ) -> Option<TickOutcome> {
        if self.stopped {
            return None;
        }

        // Replay window elapsed: advance to the next target. The token
        // guards against firing for a target that is no longer current.
        if let Some(pending) = self.advance {
            if now_ms >= pending.due_ms {
                self.advance = None;
                if pending.generation == self.generation {
                    self.install_target(cfg, now_ms, rng);
                }
            }
        }

        // Periodic repeat of the reference tone while the note is unsolved.
        if let Some(pending) = self.repeat {
            if now_ms >= pending.due_ms {
                self.repeat = None;
                if pending.generation == self.generation {
                    if !self.match_state.locked {
                        if let Some(target) = self.target.filter(|t| t.frequency_hz > 0.0) {
                            self.tones.play(target.frequency_hz, cfg.sound_ms, true);
                        }
                    }
                    self.schedule_repeat(cfg, now_ms);
                }
            }
        }

        let target = self.target?;

        self.frames.fill_latest(&mut self.frame);
        let loudness_db = util::rms_db(&self.frame);
        let estimate = self.estimate_frame();

        let decision = self
            .match_state
            .tick(estimate, loudness_db, &target, cfg, now_ms);

        if decision.hit {
            if cfg.replay {
                // Sound the confirmed tone, then advance once the replay
                // window (tone plus gap) has passed.
                self.tones.play(target.frequency_hz, REPLAY_TONE_MS, true);
                self.advance = Some(Deferred {
                    generation: self.generation,
                    due_ms: now_ms + (REPLAY_TONE_MS + REPLAY_GAP_MS) as f64,
                });
            } else {
                self.install_target(cfg, now_ms, rng);
            }
        }

        Some(TickOutcome {
            telemetry: decision.telemetry,
            solved: decision.hit.then_some(target),
        })
    }

    /// Stop the session: invalidate every pending deferred action and fade
    /// out in-flight tones. Capture resources are released on drop.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.generation += 1;
        self.repeat = None;
        self.advance = None;
        self.tones.fade_out_all();
    }

    /// Sound a random in-range root note (tonal mode only), layered on top
    /// of whatever is already playing.
    pub fn play_tonic(&mut self, cfg: &TrainerConfig, rng: &mut impl Rng) {
        if cfg.mode != Mode::Tonal {
            return;
        }
        let roots: Vec<i32> = (cfg.low_note..=cfg.high_note)
            .filter(|&n| theory::pitch_class(n) == cfg.root_pc)
            .collect();
        if roots.is_empty() {
            return;
        }
        let note = roots[rng.gen_range(0..roots.len())];
        self.tones
            .play(theory::note_to_freq(note, cfg.a4_hz), cfg.sound_ms, false);
    }

    /// Replace the target wholesale, unlock, sound the new tone, and
    /// restart the repeat cycle under a fresh generation.
    fn install_target(&mut self, cfg: &TrainerConfig, now_ms: f64, rng: &mut impl Rng) {
        self.generation += 1;
        let next = scheduler::next_target(self.target.as_ref(), cfg, rng);
        self.target = Some(next);
        self.match_state.install_target();
        self.advance = None;

        if next.frequency_hz > 0.0 {
            self.tones.play(next.frequency_hz, cfg.sound_ms, true);
        }
        self.schedule_repeat(cfg, now_ms);
    }

    fn schedule_repeat(&mut self, cfg: &TrainerConfig, now_ms: f64) {
        self.repeat = Some(Deferred {
            generation: self.generation,
            due_ms: now_ms + (cfg.sound_ms + cfg.gap_ms) as f64,
        });
    }

    fn estimate_frame(&mut self) -> PitchEstimate {
        yin::estimate(
            &mut self.frame,
            self.frames.sample_rate(),
            &self.yin_cfg,
            &mut self.history,
        )
    }
}
