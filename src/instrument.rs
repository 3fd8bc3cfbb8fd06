//! Stringed-instrument model.
//!
//! An instrument is an ordered list of strings, each with an open pitch (as
//! a MIDI number) and a fret count. String index 0 is the highest-pitched
//! string. The instrument kind determines the default tuning and which
//! string counts are legal; custom tunings are built by clearing the strings
//! and adding them one by one.

use serde::{Deserialize, Serialize};

/// Default number of frets per string.
pub const DEFAULT_FRETS: usize = 19;

/// The stringed-instrument family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Guitar,
    Bass,
}

impl InstrumentKind {
    /// Parses the textual form used by the score document.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "guitar" => Some(Self::Guitar),
            "bass" => Some(Self::Bass),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Guitar => "guitar",
            Self::Bass => "bass",
        }
    }

    /// Legal string counts for this kind.
    pub fn allowed_string_counts(&self) -> &'static [usize] {
        match self {
            Self::Guitar => &[6, 7, 8],
            Self::Bass => &[4, 5, 6, 7],
        }
    }

    /// Default string count for this kind.
    pub fn default_string_count(&self) -> usize {
        match self {
            Self::Guitar => 6,
            Self::Bass => 4,
        }
    }
}

/// How the part carrying this instrument is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Standard notation only.
    Standard,
    /// Tablature only.
    Tab,
    /// Standard notation with tablature beneath.
    Both,
}

impl DisplayMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::Standard),
            "tab" => Some(Self::Tab),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Tab => "tab",
            Self::Both => "both",
        }
    }
}

/// One string: open pitch and available frets (0 = only the open string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentString {
    /// MIDI number of the open string.
    pub open_midi: i32,
    /// Number of frets available above the open pitch.
    pub frets: usize,
}

/// Order in which strings are scanned when reassigning a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Highest-pitched string first (index 0 upward). The default.
    HighestFirst,
    /// Lowest-pitched string first.
    LowestFirst,
}

/// A fretted instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringedInstrument {
    pub kind: InstrumentKind,
    pub display: DisplayMode,
    /// Fret count applied to strings created from the default tuning.
    pub frets: usize,
    /// Strings in order, index 0 highest-pitched.
    pub strings: Vec<InstrumentString>,
}

impl StringedInstrument {
    /// Creates an instrument with the default tuning for its kind. An
    /// illegal string count falls back to the kind's default.
    pub fn new(kind: InstrumentKind, string_count: usize, frets: usize, display: DisplayMode) -> Self {
        let count = if kind.allowed_string_counts().contains(&string_count) {
            string_count
        } else {
            kind.default_string_count()
        };
        let mut instrument = Self {
            kind,
            display,
            frets,
            strings: Vec::new(),
        };
        instrument.retune_default(count);
        instrument
    }

    /// Replaces the strings with the default tuning for the kind, highest
    /// string first.
    pub fn retune_default(&mut self, string_count: usize) {
        self.strings.clear();
        match self.kind {
            InstrumentKind::Guitar => {
                // E4 B3 G3 D3 A2 E2, extended downward with B1 and F#1.
                for open in [64, 59, 55, 50, 45, 40] {
                    self.add_string(open, self.frets);
                }
                if string_count > 6 {
                    self.add_string(35, self.frets);
                }
                if string_count > 7 {
                    self.add_string(30, self.frets);
                }
            }
            InstrumentKind::Bass => {
                // C3 above the standard G2 D2 A1 E1, extended with B0, F#0.
                if string_count > 5 {
                    self.add_string(48, self.frets);
                }
                for open in [43, 38, 33, 28] {
                    self.add_string(open, self.frets);
                }
                if string_count > 4 {
                    self.add_string(23, self.frets);
                }
                if string_count > 6 {
                    self.add_string(18, self.frets);
                }
            }
        }
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn add_string(&mut self, open_midi: i32, frets: usize) {
        self.strings.push(InstrumentString { open_midi, frets });
    }

    pub fn clear_strings(&mut self) {
        self.strings.clear();
    }

    /// Retunes one string. Out-of-range indexes are ignored.
    pub fn set_string_tuning(&mut self, index: usize, open_midi: i32) {
        if let Some(s) = self.strings.get_mut(index) {
            s.open_midi = open_midi;
        }
    }

    /// Changes the fret count of one string. Out-of-range indexes are ignored.
    pub fn set_string_frets(&mut self, index: usize, frets: usize) {
        if let Some(s) = self.strings.get_mut(index) {
            s.frets = frets;
        }
    }

    /// The fret at which the given MIDI pitch sounds on the given string, if
    /// the pitch is physically playable there.
    pub fn fret_for(&self, string: usize, midi: i32) -> Option<usize> {
        let s = self.strings.get(string)?;
        if midi >= s.open_midi && midi <= s.open_midi + s.frets as i32 {
            Some((midi - s.open_midi) as usize)
        } else {
            None
        }
    }

    /// All string indexes on which the given MIDI pitch is playable, in the
    /// requested scan order.
    pub fn strings_for(&self, midi: i32, order: ScanOrder) -> Vec<usize> {
        let mut available: Vec<usize> = (0..self.strings.len())
            .filter(|&i| self.fret_for(i, midi).is_some())
            .collect();
        if order == ScanOrder::LowestFirst {
            available.reverse();
        }
        available
    }
}

impl Default for StringedInstrument {
    fn default() -> Self {
        Self::new(InstrumentKind::Guitar, 6, DEFAULT_FRETS, DisplayMode::Standard)
    }
}
