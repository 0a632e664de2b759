//! Target selection across the four training modes.
//!
//! `next_target` is a pure function of the previous target, the current
//! configuration, and an injected random source: feeding it the same
//! inputs and the same RNG sequence reproduces the same candidate checks,
//! which is what makes the fallback paths testable.

use rand::Rng;

use crate::engine::{Mode, Target, TrainerConfig};
use crate::theory;

/// How many cents-step candidates continuous mode tries before giving up
/// and drawing a fresh random note.
const CONTINUOUS_ATTEMPTS: usize = 24;

/// Pick the next target. `previous` is `None` at session start.
///
/// Degenerate configurations (empty legal-jump sets, empty candidate sets,
/// zero-span ranges) always resolve to a uniformly random in-range choice,
/// never a failure.
pub fn next_target(
    previous: Option<&Target>,
    cfg: &TrainerConfig,
    rng: &mut impl Rng,
) -> Target {
    match cfg.mode {
        Mode::Continuous => next_continuous(previous, cfg, rng),
        Mode::Tonal => next_tonal(previous, cfg, rng),
        Mode::MinMax | Mode::Lists => next_jumping(previous, cfg, rng),
    }
}

/// Legal signed offsets in minmax mode: every magnitude between the
/// effective bounds whose landing note stays in range. A missing lower
/// bound collapses to 0, a missing upper bound to the range cap. Zero is
/// legal only when the bounds bracket it and the current note is in range.
pub fn legal_jumps_minmax(current: i32, cfg: &TrainerConfig) -> Vec<i32> {
    let cap = cfg.jump_cap();
    let min_eff = cfg.jump_min.unwrap_or(0);
    let max_eff = cfg.jump_max.unwrap_or(cap);
    let lo_bound = min_eff.min(max_eff);
    let hi_bound = min_eff.max(max_eff);

    let mut legal = Vec::new();
    for j in lo_bound..=hi_bound {
        if j == 0 {
            if (cfg.low_note..=cfg.high_note).contains(&current) {
                legal.push(0);
            }
        } else {
            if current + j <= cfg.high_note {
                legal.push(j);
            }
            if current - j >= cfg.low_note {
                legal.push(-j);
            }
        }
    }
    legal
}

/// Legal signed offsets in lists mode: magnitudes come from the declared
/// up/down sets (the symmetric flag reuses "up" for "down"), each capped
/// to the available span. Zero is legal only when explicitly listed.
pub fn legal_jumps_lists(current: i32, cfg: &TrainerConfig) -> Vec<i32> {
    let cap = cfg.jump_cap();
    let up: Vec<i32> = cfg.up_intervals.iter().map(|&j| j.min(cap)).collect();
    let down: Vec<i32> = if cfg.symmetric {
        up.clone()
    } else {
        cfg.down_intervals.iter().map(|&j| j.min(cap)).collect()
    };

    let mut legal = Vec::new();
    if up.contains(&0) || down.contains(&0) {
        legal.push(0);
    }
    for &j in &up {
        if j > 0 && current + j <= cfg.high_note && !legal.contains(&j) {
            legal.push(j);
        }
    }
    for &j in &down {
        if j > 0 && current - j >= cfg.low_note && !legal.contains(&-j) {
            legal.push(-j);
        }
    }
    legal
}

/// In-range notes whose pitch class relative to the root is in the active
/// degree set.
pub fn tonal_candidates(cfg: &TrainerConfig) -> Vec<i32> {
    let degrees = cfg.degree_set();
    (cfg.low_note..=cfg.high_note)
        .filter(|&n| degrees.contains(&theory::pitch_class(n - cfg.root_pc)))
        .collect()
}

fn random_note(cfg: &TrainerConfig, rng: &mut impl Rng) -> i32 {
    rng.gen_range(cfg.low_note..=cfg.high_note)
}

fn pick<T: Copy>(choices: &[T], rng: &mut impl Rng) -> T {
    choices[rng.gen_range(0..choices.len())]
}

/// minmax / lists: sample a legal offset from the previous note, or a
/// uniformly random note when the legal set is empty or only holds the
/// degenerate zero offset.
fn next_jumping(
    previous: Option<&Target>,
    cfg: &TrainerConfig,
    rng: &mut impl Rng,
) -> Target {
    let Some(prev_note) = previous.and_then(|t| t.note) else {
        return Target::from_note(random_note(cfg, rng), cfg.a4_hz);
    };

    let legal = match cfg.mode {
        Mode::Lists => legal_jumps_lists(prev_note, cfg),
        _ => legal_jumps_minmax(prev_note, cfg),
    };

    if legal.is_empty() || legal == [0] {
        return Target::from_note(random_note(cfg, rng), cfg.a4_hz);
    }

    Target::from_note(prev_note + pick(&legal, rng), cfg.a4_hz)
}

/// tonal: the next note must sit in the candidate set and be reachable by
/// a minmax-legal jump; when no candidate is reachable the jump constraint
/// is dropped and a random candidate is used instead.
fn next_tonal(previous: Option<&Target>, cfg: &TrainerConfig, rng: &mut impl Rng) -> Target {
    let candidates = tonal_candidates(cfg);
    if candidates.is_empty() {
        return Target::from_note(random_note(cfg, rng), cfg.a4_hz);
    }

    let Some(prev_note) = previous.and_then(|t| t.note) else {
        return Target::from_note(pick(&candidates, rng), cfg.a4_hz);
    };

    let reachable: Vec<i32> = legal_jumps_minmax(prev_note, cfg)
        .into_iter()
        .map(|j| prev_note + j)
        .filter(|n| candidates.contains(n))
        .collect();

    let note = if reachable.is_empty() {
        pick(&candidates, rng)
    } else {
        pick(&reachable, rng)
    };
    Target::from_note(note, cfg.a4_hz)
}

/// continuous: step a random number of cents from the previous frequency,
/// trying the drawn direction and then its reverse against the range's
/// frequency bounds; after 24 failed attempts fall back to a fresh random
/// note (which may land closer than `cents_min`; accepted behavior).
fn next_continuous(
    previous: Option<&Target>,
    cfg: &TrainerConfig,
    rng: &mut impl Rng,
) -> Target {
    let prev_freq = previous.map(|t| t.frequency_hz).unwrap_or(0.0);
    if !(prev_freq > 0.0) {
        return Target::from_note(random_note(cfg, rng), cfg.a4_hz);
    }

    let (freq_lo, freq_hi) = cfg.freq_bounds();
    let cents_min = cfg.cents_min as f64;
    let cents_max = cfg.cents_max as f64;

    for _ in 0..CONTINUOUS_ATTEMPTS {
        let cents = cents_min + rng.gen::<f64>() * (cents_max - cents_min);
        let direction = if rng.gen::<f64>() < 0.5 { -1.0 } else { 1.0 };

        for dir in [direction, -direction] {
            let candidate = prev_freq * 2.0_f64.powf(dir * cents / 1200.0);
            if (freq_lo..=freq_hi).contains(&candidate) {
                return continuous_target(candidate, cfg);
            }
        }
    }

    Target::from_note(random_note(cfg, rng), cfg.a4_hz)
}

/// Wrap a free frequency with its rounded, clamped display note.
fn continuous_target(frequency_hz: f64, cfg: &TrainerConfig) -> Target {
    let approx = theory::freq_to_note_float(frequency_hz, cfg.a4_hz).round() as i32;
    Target {
        note: Some(approx.clamp(cfg.low_note, cfg.high_note)),
        frequency_hz,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn cfg_with(mode: Mode) -> TrainerConfig {
        TrainerConfig {
            mode,
            ..TrainerConfig::default()
        }
        .sanitized()
    }

    fn run_chain(cfg: &TrainerConfig, seed: u64, steps: usize) -> Vec<Target> {
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut out: Vec<Target> = Vec::new();
        for _ in 0..steps {
            let next = next_target(out.last(), cfg, &mut rng);
            out.push(next);
        }
        out
    }

    #[test]
    fn all_modes_stay_in_range() {
        for mode in [Mode::MinMax, Mode::Lists, Mode::Tonal] {
            let cfg = cfg_with(mode);
            for seed in 0..10 {
                for target in run_chain(&cfg, seed, 200) {
                    let note = target.note.expect("integer-note mode");
                    assert!(
                        (cfg.low_note..=cfg.high_note).contains(&note),
                        "{mode}: note {note} out of range"
                    );
                }
            }
        }
    }

    #[test]
    fn continuous_stays_in_frequency_bounds() {
        let cfg = cfg_with(Mode::Continuous);
        let (freq_lo, freq_hi) = cfg.freq_bounds();
        for seed in 0..10 {
            for target in run_chain(&cfg, seed, 200) {
                assert!(
                    target.frequency_hz >= freq_lo - 1e-9
                        && target.frequency_hz <= freq_hi + 1e-9,
                    "frequency {} outside [{freq_lo}, {freq_hi}]",
                    target.frequency_hz
                );
                let note = target.note.expect("display note");
                assert!((cfg.low_note..=cfg.high_note).contains(&note));
            }
        }
    }

    #[test]
    fn minmax_offsets_come_from_the_legal_set() {
        let cfg = TrainerConfig {
            mode: Mode::MinMax,
            low_note: 60,
            high_note: 72,
            jump_min: Some(1),
            jump_max: Some(2),
            ..TrainerConfig::default()
        }
        .sanitized();

        // Span 12 with jumps of 1-2: the legal set is never empty, so no
        // fallback draws happen and every offset must be legal.
        let chain = run_chain(&cfg, 3, 300);
        for pair in chain.windows(2) {
            let offset = pair[1].note.unwrap() - pair[0].note.unwrap();
            let legal = legal_jumps_minmax(pair[0].note.unwrap(), &cfg);
            assert!(
                legal.contains(&offset),
                "offset {offset} not in legal set {legal:?}"
            );
            assert!((1..=2).contains(&offset.abs()));
        }
    }

    #[test]
    fn minmax_unbounded_collapses_to_zero_and_cap() {
        let cfg = TrainerConfig {
            mode: Mode::MinMax,
            low_note: 60,
            high_note: 65,
            jump_min: None,
            jump_max: None,
            ..TrainerConfig::default()
        }
        .sanitized();
        let legal = legal_jumps_minmax(62, &cfg);
        // Bounds collapse to [0, span]; from 62 that is 0, +-1, +-2, +3, -2...
        assert!(legal.contains(&0));
        assert!(legal.contains(&3));
        assert!(legal.contains(&-2));
        assert!(!legal.contains(&4), "jump past the span cap: {legal:?}");
    }

    #[test]
    fn minmax_zero_needs_current_in_range() {
        let cfg = TrainerConfig {
            mode: Mode::MinMax,
            low_note: 60,
            high_note: 65,
            jump_min: Some(0),
            jump_max: Some(2),
            ..TrainerConfig::default()
        }
        .sanitized();
        assert!(legal_jumps_minmax(62, &cfg).contains(&0));
        assert!(!legal_jumps_minmax(59, &cfg).contains(&0));
    }

    #[test]
    fn minmax_degenerate_zero_only_falls_back_to_random() {
        let cfg = TrainerConfig {
            mode: Mode::MinMax,
            low_note: 60,
            high_note: 72,
            jump_min: Some(0),
            jump_max: Some(0),
            ..TrainerConfig::default()
        }
        .sanitized();
        // Only the zero offset is ever legal, so every pick is a fallback;
        // all we require is staying in range.
        for target in run_chain(&cfg, 11, 100) {
            assert!((60..=72).contains(&target.note.unwrap()));
        }
    }

    #[test]
    fn zero_span_range_always_yields_the_single_note() {
        for mode in [Mode::MinMax, Mode::Lists, Mode::Tonal, Mode::Continuous] {
            let cfg = TrainerConfig {
                mode,
                low_note: 60,
                high_note: 60,
                ..TrainerConfig::default()
            }
            .sanitized();
            for target in run_chain(&cfg, 5, 20) {
                assert_eq!(target.note, Some(60), "{mode}");
            }
        }
    }

    #[test]
    fn lists_offsets_come_from_the_declared_sets() {
        let cfg = TrainerConfig {
            mode: Mode::Lists,
            low_note: 48,
            high_note: 84,
            up_intervals: vec![3, 4],
            down_intervals: vec![1],
            symmetric: false,
            ..TrainerConfig::default()
        }
        .sanitized();

        let chain = run_chain(&cfg, 17, 300);
        for pair in chain.windows(2) {
            let offset = pair[1].note.unwrap() - pair[0].note.unwrap();
            let legal = legal_jumps_lists(pair[0].note.unwrap(), &cfg);
            if legal.is_empty() || legal == [0] {
                continue; // fallback draw
            }
            assert!(
                legal.contains(&offset),
                "offset {offset} not in {legal:?}"
            );
            assert!(offset == 3 || offset == 4 || offset == -1);
        }
    }

    #[test]
    fn lists_zero_only_when_listed() {
        let mut cfg = TrainerConfig {
            mode: Mode::Lists,
            up_intervals: vec![2, 5],
            symmetric: true,
            ..TrainerConfig::default()
        }
        .sanitized();
        assert!(!legal_jumps_lists(60, &cfg).contains(&0));

        cfg.up_intervals = vec![0, 2];
        assert!(legal_jumps_lists(60, &cfg).contains(&0));
    }

    #[test]
    fn lists_symmetric_mirrors_the_up_set() {
        let cfg = TrainerConfig {
            mode: Mode::Lists,
            low_note: 48,
            high_note: 84,
            up_intervals: vec![7],
            down_intervals: vec![1, 2, 3],
            symmetric: true,
            ..TrainerConfig::default()
        }
        .sanitized();
        let legal = legal_jumps_lists(60, &cfg);
        assert_eq!(legal, vec![7, -7]);
    }

    #[test]
    fn lists_magnitudes_capped_to_span() {
        let cfg = TrainerConfig {
            mode: Mode::Lists,
            low_note: 60,
            high_note: 64,
            up_intervals: vec![9],
            symmetric: true,
            ..TrainerConfig::default()
        }
        .sanitized();
        // Magnitude 9 caps to the span of 4.
        let legal = legal_jumps_lists(60, &cfg);
        assert_eq!(legal, vec![4]);
    }

    #[test]
    fn lists_empty_sets_fall_back_to_random_in_range() {
        let cfg = TrainerConfig {
            mode: Mode::Lists,
            up_intervals: vec![],
            down_intervals: vec![],
            symmetric: false,
            ..TrainerConfig::default()
        }
        .sanitized();
        for target in run_chain(&cfg, 23, 100) {
            assert!((cfg.low_note..=cfg.high_note).contains(&target.note.unwrap()));
        }
    }

    #[test]
    fn tonal_notes_land_on_configured_degrees() {
        let cfg = TrainerConfig {
            mode: Mode::Tonal,
            root_pc: 2, // D
            degrees: vec![0, 4, 7],
            ..TrainerConfig::default()
        }
        .sanitized();
        for seed in 0..5 {
            for target in run_chain(&cfg, seed, 200) {
                let rel = theory::pitch_class(target.note.unwrap() - 2);
                assert!(
                    [0, 4, 7].contains(&rel),
                    "degree {rel} not in the configured set"
                );
            }
        }
    }

    #[test]
    fn tonal_empty_degree_set_means_roots_only() {
        let cfg = TrainerConfig {
            mode: Mode::Tonal,
            root_pc: 9, // A
            degrees: vec![],
            ..TrainerConfig::default()
        }
        .sanitized();
        for target in run_chain(&cfg, 31, 100) {
            assert_eq!(theory::pitch_class(target.note.unwrap()), 9);
        }
    }

    #[test]
    fn tonal_no_candidates_falls_back_to_any_note_in_range() {
        // Range covers pitch classes 0 and 1 only; degree 6 never appears.
        let cfg = TrainerConfig {
            mode: Mode::Tonal,
            low_note: 60,
            high_note: 61,
            root_pc: 0,
            degrees: vec![6],
            ..TrainerConfig::default()
        }
        .sanitized();
        assert!(tonal_candidates(&cfg).is_empty());
        for target in run_chain(&cfg, 41, 50) {
            assert!((60..=61).contains(&target.note.unwrap()));
        }
    }

    #[test]
    fn continuous_steps_within_cents_bounds() {
        let cfg = TrainerConfig {
            mode: Mode::Continuous,
            low_note: 48,
            high_note: 84,
            cents_min: 50,
            cents_max: 400,
            ..TrainerConfig::default()
        }
        .sanitized();

        // A 3-octave range with steps of at most 400 cents: some candidate
        // always fits, so every step obeys the bounds.
        let chain = run_chain(&cfg, 7, 200);
        for pair in chain.windows(2) {
            let cents = theory::cents_between(pair[1].frequency_hz, pair[0].frequency_hz);
            assert!(
                (50.0 - 1e-6..=400.0 + 1e-6).contains(&cents.abs()),
                "step of {cents} cents outside [50, 400]"
            );
        }
    }

    #[test]
    fn continuous_exhausted_attempts_fall_back_to_a_note() {
        // Steps of exactly one octave can never fit inside a 2-semitone
        // range, so all 24 attempts fail and a random note is drawn.
        let cfg = TrainerConfig {
            mode: Mode::Continuous,
            low_note: 60,
            high_note: 62,
            cents_min: 1200,
            cents_max: 1200,
            ..TrainerConfig::default()
        }
        .sanitized();

        let mut rng = Pcg32::seed_from_u64(9);
        let first = next_target(None, &cfg, &mut rng);
        let second = next_target(Some(&first), &cfg, &mut rng);
        let note = second.note.unwrap();
        assert!((60..=62).contains(&note));
        assert_eq!(second.frequency_hz, theory::note_to_freq(note, cfg.a4_hz));
    }

    #[test]
    fn same_seed_reproduces_the_same_sequence() {
        for mode in [Mode::MinMax, Mode::Lists, Mode::Tonal, Mode::Continuous] {
            let cfg = cfg_with(mode);
            let a = run_chain(&cfg, 99, 100);
            let b = run_chain(&cfg, 99, 100);
            assert_eq!(a, b, "{mode} sequence not reproducible");
        }
    }

    #[test]
    fn jump_magnitude_never_exceeds_the_cap() {
        let cfg = TrainerConfig {
            mode: Mode::MinMax,
            low_note: 36,
            high_note: 96,
            jump_min: Some(1),
            jump_max: None,
            ..TrainerConfig::default()
        }
        .sanitized();
        let chain = run_chain(&cfg, 13, 400);
        for pair in chain.windows(2) {
            let offset = (pair[1].note.unwrap() - pair[0].note.unwrap()).abs();
            assert!(offset <= 36, "jump of {offset} semitones over the cap");
        }
    }
}
