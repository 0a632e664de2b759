use rand::Rng;

/// Lowest selectable note (C2). Targets never leave [MIN_NOTE, MAX_NOTE].
pub const MIN_NOTE: i32 = 36;

/// Highest selectable note (C7).
pub const MAX_NOTE: i32 = 96;

/// Largest jump the scheduler will ever take, regardless of range span.
pub const JUMP_CAP: i32 = 36;

/// MIDI note number of the A4 reference.
pub const A4_NOTE: i32 = 69;

/// Sharp-only spellings used for range labels and config parsing.
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Interval labels relative to a tonal root, one per pitch class.
const INTERVAL_LABELS: [&str; 12] = [
    "1", "b2", "2", "b3", "3", "4", "T", "5", "b6", "6", "b7", "7",
];

/// Enharmonic spellings per pitch class, including the uncommon ones
/// (Cb, Fb, E#, B#) so solved notes read like real notation practice.
const ENHARMONIC_NAMES: [&[&str]; 12] = [
    &["C", "B#"],
    &["C#", "Db"],
    &["D"],
    &["D#", "Eb"],
    &["E", "Fb"],
    &["F", "E#"],
    &["F#", "Gb"],
    &["G"],
    &["G#", "Ab"],
    &["A"],
    &["A#", "Bb"],
    &["B", "Cb"],
];

/// Pitch class of a note (octave-independent, always in 0..12).
pub fn pitch_class(note: i32) -> i32 {
    note.rem_euclid(12)
}

/// Equal-tempered frequency of an integer note at the given A4 reference.
pub fn note_to_freq(note: i32, a4_hz: f64) -> f64 {
    a4_hz * 2.0_f64.powf((note - A4_NOTE) as f64 / 12.0)
}

/// Fractional note number for an arbitrary frequency.
pub fn freq_to_note_float(freq_hz: f64, a4_hz: f64) -> f64 {
    A4_NOTE as f64 + 12.0 * (freq_hz / a4_hz).log2()
}

/// Signed interval between two frequencies in cents (positive = sharp).
pub fn cents_between(freq_hz: f64, reference_hz: f64) -> f64 {
    1200.0 * (freq_hz / reference_hz).log2()
}

/// Plain note name with octave, e.g. "A4", "C#3".
pub fn note_name(note: i32) -> String {
    let pc = pitch_class(note) as usize;
    let octave = note.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pc], octave)
}

/// A random enharmonic spelling of a note, e.g. "C#4" or "Db4".
pub fn enharmonic_name(note: i32, rng: &mut impl Rng) -> String {
    let pc = pitch_class(note) as usize;
    let octave = note.div_euclid(12) - 1;
    let options = ENHARMONIC_NAMES[pc];
    let spelling = options[rng.gen_range(0..options.len())];
    format!("{spelling}{octave}")
}

/// Interval label of a note relative to a tonal root pitch class
/// (e.g. root C, note E -> "3"). Transpose cancels here: root and target
/// shift by the same amount, so labels are computed on concert pitch.
pub fn interval_label(note: i32, root_pc: i32) -> &'static str {
    INTERVAL_LABELS[pitch_class(note - root_pc) as usize]
}

/// Display note for a transposing instrument: what the player reads is the
/// concert note minus the transpose (Bb trumpet = -2). Display only:
/// concert-pitch math never goes through this.
pub fn display_note(concert_note: i32, transpose: i32) -> i32 {
    concert_note - transpose
}

/// Walk a note chromatically by whole scale-degree steps: each step lands on
/// the next note (up or down) whose pitch class relative to `root_pc` is in
/// `degrees`. An empty degree set behaves as {root}.
pub fn step_by_degrees(note: i32, steps: i32, root_pc: i32, degrees: &[i32]) -> i32 {
    if steps == 0 {
        return note;
    }
    let in_set = |n: i32| {
        let rel = pitch_class(n - root_pc);
        if degrees.is_empty() {
            rel == 0
        } else {
            degrees.contains(&rel)
        }
    };
    let dir = if steps > 0 { 1 } else { -1 };
    let mut current = note;
    for _ in 0..steps.abs() {
        loop {
            current += dir;
            if in_set(current) {
                break;
            }
        }
    }
    current
}

/// Parse a note given as a name ("A4", "Bb2", "C#3") or a bare MIDI number.
pub fn parse_note(s: &str) -> Option<i32> {
    let s = s.trim();
    if let Ok(n) = s.parse::<i32>() {
        return Some(n);
    }
    let (pc_part, octave_part) = s.split_at(s.find(|c: char| c == '-' || c.is_ascii_digit())?);
    let pc = parse_pitch_class(pc_part)?;
    let octave: i32 = octave_part.parse().ok()?;
    Some((octave + 1) * 12 + pc)
}

/// Parse a pitch-class name ("C", "F#", "Bb") to 0..12.
pub fn parse_pitch_class(s: &str) -> Option<i32> {
    let mut chars = s.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let mut pc = base;
    for accidental in chars {
        match accidental {
            '#' => pc += 1,
            'b' => pc -= 1,
            _ => return None,
        }
    }
    Some(pitch_class(pc))
}
