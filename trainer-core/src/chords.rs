//! # Chord Table Module
//!
//! The static chord vocabulary for chord-training mode: major and minor
//! triads in all 12 keys plus the common dominant, major and minor
//! sevenths. Membership is octave-ignoring — a chord is a set of pitch
//! classes, and any voicing of a chord tone counts.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::notes::NoteName;

/// A named chord and its required pitch classes (3-4 tones).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    /// Display name, e.g. "Am7".
    pub name: &'static str,
    /// Pitch-class set, root first.
    pub tones: Vec<NoteName>,
}

impl Chord {
    /// Octave-invariant membership test.
    pub fn contains(&self, note: NoteName) -> bool {
        self.tones.contains(&note)
    }

    /// Splits the name into root and suffix ("Am7" -> ("A", "m7")).
    pub fn root_and_suffix(&self) -> (&'static str, &'static str) {
        let split = if self.name.len() > 1 && self.name.as_bytes()[1] == b'#' {
            2
        } else {
            1
        };
        self.name.split_at(split)
    }
}

/// Chord formulas as (name, tone spellings). Flat spellings follow the
/// source material and are normalised when the table is built.
const FORMULAS: &[(&str, &[&str])] = &[
    // Major triads
    ("C", &["C", "E", "G"]),
    ("G", &["G", "B", "D"]),
    ("D", &["D", "F#", "A"]),
    ("A", &["A", "C#", "E"]),
    ("E", &["E", "G#", "B"]),
    ("B", &["B", "D#", "F#"]),
    ("F#", &["F#", "A#", "C#"]),
    ("C#", &["C#", "F", "G#"]),
    ("F", &["F", "A", "C"]),
    ("B♭", &["A#", "D", "F"]),
    ("E♭", &["D#", "G", "A#"]),
    ("A♭", &["G#", "C", "D#"]),
    // Minor triads
    ("Am", &["A", "C", "E"]),
    ("Em", &["E", "G", "B"]),
    ("Bm", &["B", "D", "F#"]),
    ("F#m", &["F#", "A", "C#"]),
    ("C#m", &["C#", "E", "G#"]),
    ("G#m", &["G#", "B", "D#"]),
    ("D#m", &["D#", "F#", "A#"]),
    ("A#m", &["A#", "C#", "F"]),
    ("Dm", &["D", "F", "A"]),
    ("Gm", &["G", "A#", "D"]),
    ("Cm", &["C", "D#", "G"]),
    ("Fm", &["F", "G#", "C"]),
    // Dominant sevenths
    ("C7", &["C", "E", "G", "A#"]),
    ("G7", &["G", "B", "D", "F"]),
    ("D7", &["D", "F#", "A", "C"]),
    ("A7", &["A", "C#", "E", "G"]),
    ("E7", &["E", "G#", "B", "D"]),
    ("B7", &["B", "D#", "F#", "A"]),
    // Major sevenths
    ("CM7", &["C", "E", "G", "B"]),
    ("GM7", &["G", "B", "D", "F#"]),
    ("DM7", &["D", "F#", "A", "C#"]),
    ("AM7", &["A", "C#", "E", "G#"]),
    ("EM7", &["E", "G#", "B", "D#"]),
    ("FM7", &["F", "A", "C", "E"]),
    // Minor sevenths
    ("Am7", &["A", "C", "E", "G"]),
    ("Em7", &["E", "G", "B", "D"]),
    ("Bm7", &["B", "D", "F#", "A"]),
    ("F#m7", &["F#", "A", "C#", "E"]),
    ("C#m7", &["C#", "E", "G#", "B"]),
    ("Dm7", &["D", "F", "A", "C"]),
];

/// The full chord vocabulary, built once at startup.
pub static CHORDS: Lazy<Vec<Chord>> = Lazy::new(|| {
    FORMULAS
        .iter()
        .map(|&(name, tones)| Chord {
            name,
            tones: tones
                .iter()
                .map(|t| t.parse().expect("chord table spelling"))
                .collect(),
        })
        .collect()
});

/// Index for name lookups into [`CHORDS`].
static CHORD_MAP: Lazy<BTreeMap<&'static str, usize>> = Lazy::new(|| {
    CHORDS
        .iter()
        .enumerate()
        .map(|(i, chord)| (chord.name, i))
        .collect()
});

/// Looks a chord up by its display name.
pub fn find_chord(name: &str) -> Option<&'static Chord> {
    CHORD_MAP.get(name).map(|&i| &CHORDS[i])
}
