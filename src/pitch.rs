//! Pitch names and MIDI numbers.
//!
//! Score documents carry pitches as names like `A2` or `F#3`; string/fret
//! arithmetic works on MIDI numbers (middle C, C4, is 60).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A spelled pitch: step letter, chromatic alteration, octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    /// Note letter A–G.
    pub step: char,
    /// Chromatic alteration in semitones: -1 = flat, 1 = sharp.
    pub alter: i8,
    /// Octave number (middle C = C4).
    pub octave: i32,
}

impl Pitch {
    pub fn new(step: char, alter: i8, octave: i32) -> Self {
        Self { step, alter, octave }
    }

    /// MIDI note number of this pitch.
    pub fn to_midi(&self) -> i32 {
        let step_semitone = match self.step {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => 0,
        };
        (self.octave + 1) * 12 + step_semitone + self.alter as i32
    }
}

impl FromStr for Pitch {
    type Err = String;

    /// Parses names of the form `C4`, `F#3`, `Bb1`, `A-1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let step = chars
            .next()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| ('A'..='G').contains(c))
            .ok_or_else(|| format!("invalid pitch name '{s}'"))?;

        let rest: String = chars.collect();
        let (alter, octave_str) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest.as_str()),
        };

        let octave = octave_str
            .parse::<i32>()
            .map_err(|_| format!("invalid octave in pitch name '{s}'"))?;

        Ok(Pitch { step, alter, octave })
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accidental = match self.alter {
            1 => "#",
            -1 => "b",
            _ => "",
        };
        write!(f, "{}{}{}", self.step, accidental, self.octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn midi_values_match_standard_tuning() {
        // Standard guitar strings, highest to lowest.
        let expected = [("E4", 64), ("B3", 59), ("G3", 55), ("D3", 50), ("A2", 45), ("E2", 40)];
        for (name, midi) in expected {
            let p: Pitch = name.parse().unwrap();
            assert_eq!(p.to_midi(), midi, "pitch {name}");
        }
    }

    #[test]
    fn accidentals_shift_by_a_semitone() {
        let sharp: Pitch = "F#3".parse().unwrap();
        let flat: Pitch = "Gb3".parse().unwrap();
        assert_eq!(sharp.to_midi(), 54);
        assert_eq!(sharp.to_midi(), flat.to_midi());
    }

    #[test]
    fn display_round_trips() {
        for name in ["C4", "F#3", "Bb1", "A2"] {
            let p: Pitch = name.parse().unwrap();
            assert_eq!(p.to_string(), name);
        }
    }

    #[test]
    fn negative_octaves_parse() {
        let p: Pitch = "A-1".parse().unwrap();
        assert_eq!(p.to_midi(), 9);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!("H4".parse::<Pitch>().is_err());
        assert!("C".parse::<Pitch>().is_err());
        assert!("".parse::<Pitch>().is_err());
    }
}
