//! # Pitch Class Module
//!
//! Maps frequencies to the 12 equal-tempered pitch classes relative to
//! A4 = 440 Hz. Octave information is deliberately discarded: the trainer
//! only cares whether the player produced *a* C, not which C.

use std::fmt;
use std::str::FromStr;

/// The twelve chromatic pitch classes, starting at C.
///
/// The discriminant equals the MIDI note number modulo 12, so
/// `NoteName::from_frequency` is a straight `midi % 12` lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NoteName {
    C = 0,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

/// Chromatic table indexed by `midi % 12`.
const CHROMATIC: [NoteName; 12] = [
    NoteName::C,
    NoteName::Cs,
    NoteName::D,
    NoteName::Ds,
    NoteName::E,
    NoteName::F,
    NoteName::Fs,
    NoteName::G,
    NoteName::Gs,
    NoteName::A,
    NoteName::As,
    NoteName::B,
];

/// The seven natural notes, used as the target pool in single-note mode.
pub const NATURALS: [NoteName; 7] = [
    NoteName::C,
    NoteName::D,
    NoteName::E,
    NoteName::F,
    NoteName::G,
    NoteName::A,
    NoteName::B,
];

impl NoteName {
    /// Maps a frequency in Hz to the nearest equal-tempered pitch class.
    ///
    /// Uses the standard MIDI mapping `69 + 12 * log2(freq / 440)` rounded
    /// to the nearest semitone, then reduced modulo 12. Returns `None` for
    /// non-positive or non-finite input.
    pub fn from_frequency(freq: f32) -> Option<NoteName> {
        if !freq.is_finite() || freq <= 0.0 {
            return None;
        }
        let midi = 69.0 + 12.0 * (freq / 440.0).log2();
        let index = (midi.round() as i64).rem_euclid(12);
        Some(CHROMATIC[index as usize])
    }

    /// Chromatic index of this pitch class (C = 0 .. B = 11).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Pitch class for a chromatic index; indices wrap modulo 12.
    pub fn from_index(index: usize) -> NoteName {
        CHROMATIC[index % 12]
    }

    /// Display name using sharps ("C", "C#", ..., "B").
    pub fn as_str(self) -> &'static str {
        const NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        NAMES[self.index()]
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteName {
    type Err = String;

    /// Parses a pitch-class symbol. Accepts sharps ("F#") and the flat
    /// spellings that appear in chord tables ("Bb", "B♭"), normalised to
    /// their sharp equivalents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let note = match s {
            "C" => NoteName::C,
            "C#" | "Db" | "D♭" => NoteName::Cs,
            "D" => NoteName::D,
            "D#" | "Eb" | "E♭" => NoteName::Ds,
            "E" => NoteName::E,
            "F" => NoteName::F,
            "F#" | "Gb" | "G♭" => NoteName::Fs,
            "G" => NoteName::G,
            "G#" | "Ab" | "A♭" => NoteName::Gs,
            "A" => NoteName::A,
            "A#" | "Bb" | "B♭" => NoteName::As,
            "B" => NoteName::B,
            other => return Err(format!("unknown pitch class: {other}")),
        };
        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_frequencies_map_to_expected_classes() {
        assert_eq!(NoteName::from_frequency(440.0), Some(NoteName::A));
        assert_eq!(NoteName::from_frequency(261.63), Some(NoteName::C));
        assert_eq!(NoteName::from_frequency(196.0), Some(NoteName::G));
        assert_eq!(NoteName::from_frequency(246.94), Some(NoteName::B));
    }

    #[test]
    fn mapping_is_octave_invariant() {
        // 440 * 2^k must be "A" for every octave in the audible range.
        for k in -4..=4 {
            let freq = 440.0 * 2.0_f32.powi(k);
            assert_eq!(NoteName::from_frequency(freq), Some(NoteName::A));
        }
    }

    #[test]
    fn degenerate_frequencies_are_rejected() {
        assert_eq!(NoteName::from_frequency(0.0), None);
        assert_eq!(NoteName::from_frequency(-220.0), None);
        assert_eq!(NoteName::from_frequency(f32::NAN), None);
        assert_eq!(NoteName::from_frequency(f32::INFINITY), None);
    }

    #[test]
    fn index_round_trips_through_the_chromatic_table() {
        for i in 0..12 {
            assert_eq!(NoteName::from_index(i).index(), i);
        }
        assert_eq!(NoteName::from_index(12), NoteName::C);
    }

    #[test]
    fn parses_sharp_and_flat_spellings() {
        assert_eq!("F#".parse::<NoteName>(), Ok(NoteName::Fs));
        assert_eq!("B♭".parse::<NoteName>(), Ok(NoteName::As));
        assert_eq!("Eb".parse::<NoteName>(), Ok(NoteName::Ds));
        assert!("H".parse::<NoteName>().is_err());
    }

    #[test]
    fn display_uses_sharp_names() {
        assert_eq!(NoteName::Cs.to_string(), "C#");
        assert_eq!(NoteName::B.to_string(), "B");
    }
}
