//! Chord representation and resolution to MIDI notes

use serde::{Deserialize, Serialize};

/// Pitch class names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteName {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl NoteName {
    /// Semitone offset from C
    pub fn semitone(&self) -> u8 {
        match self {
            Self::C => 0,
            Self::CSharp => 1,
            Self::D => 2,
            Self::DSharp => 3,
            Self::E => 4,
            Self::F => 5,
            Self::FSharp => 6,
            Self::G => 7,
            Self::GSharp => 8,
            Self::A => 9,
            Self::ASharp => 10,
            Self::B => 11,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::C => "C",
            Self::CSharp => "C#",
            Self::D => "D",
            Self::DSharp => "D#",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::G => "G",
            Self::GSharp => "G#",
            Self::A => "A",
            Self::ASharp => "A#",
            Self::B => "B",
        }
    }
}

/// Chord quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Maj,
    Min,
    Dim,
    Sus2,
    Sus4,
    Maj7,
    Min7,
    Dom7,
}

impl ChordQuality {
    /// Get chord intervals from root
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Maj => &[0, 4, 7],
            Self::Min => &[0, 3, 7],
            Self::Dim => &[0, 3, 6],
            Self::Sus2 => &[0, 2, 7],
            Self::Sus4 => &[0, 5, 7],
            Self::Maj7 => &[0, 4, 7, 11],
            Self::Min7 => &[0, 3, 7, 10],
            Self::Dom7 => &[0, 4, 7, 10],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Maj => "Maj",
            Self::Min => "Min",
            Self::Dim => "Dim",
            Self::Sus2 => "Sus2",
            Self::Sus4 => "Sus4",
            Self::Maj7 => "Maj7",
            Self::Min7 => "Min7",
            Self::Dom7 => "Dom7",
        }
    }
}

/// One chord slot in the progression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub root: NoteName,
    pub quality: ChordQuality,
    /// Inversion 0-3 (clamped at resolve time)
    pub inversion: u8,
    pub octave: i8,
    pub velocity: u8,
}

impl Default for Chord {
    fn default() -> Self {
        Self {
            root: NoteName::C,
            quality: ChordQuality::Maj,
            inversion: 0,
            octave: 4,
            velocity: 100,
        }
    }
}

impl Chord {
    pub fn new(root: NoteName, quality: ChordQuality) -> Self {
        Self {
            root,
            quality,
            ..Default::default()
        }
    }

    /// Resolve to concrete MIDI notes.
    ///
    /// Base MIDI is `12 * (octave + 1) + semitone(root)`. Each inversion moves
    /// the lowest interval to the top, raised an octave.
    pub fn resolve(&self) -> Vec<u8> {
        let inv = self.inversion.min(3) as usize;
        let base = 12 * (self.octave as i16 + 1) + self.root.semitone() as i16;
        let mut intervals: Vec<i16> = self.intervals_iter().collect();
        for _ in 0..inv.min(intervals.len()) {
            let first = intervals.remove(0);
            intervals.push(first + 12);
        }
        intervals
            .into_iter()
            .map(|iv| (base + iv).clamp(0, 127) as u8)
            .collect()
    }

    fn intervals_iter(&self) -> impl Iterator<Item = i16> + '_ {
        self.quality.intervals().iter().map(|&iv| iv as i16)
    }
}
