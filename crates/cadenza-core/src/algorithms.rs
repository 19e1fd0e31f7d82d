//! Pattern-generation utilities (humanize, harmony, chord progressions)

use serde::{Deserialize, Serialize};

use crate::chord::{Chord, ChordQuality, NoteName};
use crate::track::{Track, TrackId};

// ============================================================================
// Deterministic randomness
// ============================================================================

/// Small LCG used for serializable, reproducible pattern randomness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRng {
    state: u64,
}

impl Default for PatternRng {
    fn default() -> Self {
        Self { state: 12345 }
    }
}

impl PatternRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        self.state
    }

    /// Uniform value in [0, 1)
    pub fn next_unit(&mut self) -> f32 {
        (self.next() >> 33) as f32 / (1u64 << 31) as f32
    }

    /// Uniform value in [-1, 1]
    pub fn next_bipolar(&mut self) -> f32 {
        ((self.next() >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

// ============================================================================
// Scales
// ============================================================================

/// Scale used for highlighting and harmony snapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleKind {
    Major,
    Minor,
    /// No scale; snapping is a no-op
    None,
}

impl ScaleKind {
    /// Scale intervals (semitones from root)
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::None => &[],
        }
    }

    pub fn contains(&self, midi: u8, root: NoteName) -> bool {
        let relative = (midi % 12 + 12 - root.semitone()) % 12;
        self.intervals().contains(&relative)
    }
}

/// Quantize a note to the nearest scale degree
pub fn snap_to_scale(midi: u8, root: NoteName, scale: ScaleKind) -> u8 {
    let intervals = scale.intervals();
    if intervals.is_empty() {
        return midi;
    }
    let root_semi = root.semitone();
    let relative = (midi % 12 + 12 - root_semi) % 12;

    let mut min_dist = 12u8;
    let mut nearest = 0u8;
    for &interval in intervals {
        let dist = if interval > relative {
            (interval - relative).min(relative + 12 - interval)
        } else {
            (relative - interval).min(interval + 12 - relative)
        };
        if dist < min_dist {
            min_dist = dist;
            nearest = interval;
        }
    }

    let octave = midi / 12;
    (octave * 12 + (root_semi + nearest) % 12).min(127)
}

// ============================================================================
// Velocity humanize
// ============================================================================

/// Jitter per-step velocity percentages by up to ±amount, clamped to 0-100
pub fn humanize_velocities(track: &mut Track, amount: u8, rng: &mut PatternRng) {
    for v in track.velocities.iter_mut() {
        let delta = (rng.next_bipolar() * amount as f32).round() as i16;
        *v = (*v as i16 + delta).clamp(0, 100) as u8;
    }
}

// ============================================================================
// Harmony tracks
// ============================================================================

/// Interval shapes for derived harmony tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmonyStyle {
    ThirdAbove,
    FifthAbove,
    Octave,
    Counter,
}

impl HarmonyStyle {
    pub fn interval(&self) -> i8 {
        match self {
            Self::ThirdAbove => 4,
            Self::FifthAbove => 7,
            Self::Octave => 12,
            Self::Counter => -2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ThirdAbove => "Thirds above",
            Self::FifthAbove => "Fifths above",
            Self::Octave => "Octave",
            Self::Counter => "Counter melody",
        }
    }
}

const HARMONY_COLOR: &str = "#a855f7";
const HARMONY_GAIN: f32 = 0.6;

/// Derive a harmony track from `source`, transposed by the style interval.
///
/// When a scale is given, transposed notes are snapped to it.
pub fn harmony_track(
    source: &Track,
    style: HarmonyStyle,
    id: TrackId,
    scale: Option<(NoteName, ScaleKind)>,
) -> Track {
    let interval = style.interval() as i16;
    let transpose = |midi: u8| -> u8 {
        let t = (midi as i16 + interval).clamp(0, 127) as u8;
        match scale {
            Some((root, kind)) => snap_to_scale(t, root, kind),
            None => t,
        }
    };

    let mut track = source.clone();
    track.id = id;
    track.name = format!("{} ({})", source.name, style.label());
    track.color = HARMONY_COLOR.to_string();
    track.gain = HARMONY_GAIN;
    track.midi = transpose(source.midi);
    for note in track.notes.iter_mut() {
        note.midi = transpose(note.midi);
        note.selected = false;
    }
    track
}

// ============================================================================
// Chord progression presets
// ============================================================================

/// Common chord progression presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressionKind {
    Pop,
    Jazz,
    Blues,
    Emotional,
}

impl ProgressionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pop => "I-V-vi-IV (Pop)",
            Self::Jazz => "ii-V-I (Jazz)",
            Self::Blues => "I-IV-V (Blues)",
            Self::Emotional => "vi-IV-I-V (Emotional)",
        }
    }

    fn degrees(&self) -> &'static [(NoteName, ChordQuality)] {
        use ChordQuality::*;
        use NoteName::*;
        match self {
            Self::Pop => &[(C, Maj), (G, Maj), (A, Min), (F, Maj)],
            Self::Jazz => &[(D, Min7), (G, Dom7), (C, Maj7)],
            Self::Blues => &[(C, Maj), (F, Maj), (G, Maj)],
            Self::Emotional => &[(A, Min), (F, Maj), (C, Maj), (G, Maj)],
        }
    }

    /// Expand to concrete chords at the given octave and velocity
    pub fn chords(&self, octave: i8, velocity: u8) -> Vec<Chord> {
        self.degrees()
            .iter()
            .map(|&(root, quality)| Chord {
                root,
                quality,
                inversion: 0,
                octave,
                velocity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_is_deterministic() {
        let mut a = PatternRng::new(7);
        let mut b = PatternRng::new(7);
        for _ in 0..16 {
            assert_eq!(a.next_unit(), b.next_unit());
        }
    }

    #[test]
    fn test_unit_range() {
        let mut rng = PatternRng::default();
        for _ in 0..256 {
            let v = rng.next_unit();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_snap_to_scale() {
        // C major: equidistant chromatics snap to the lower degree
        assert_eq!(snap_to_scale(61, NoteName::C, ScaleKind::Major), 60);
        assert_eq!(snap_to_scale(66, NoteName::C, ScaleKind::Major), 65);
        assert_eq!(snap_to_scale(64, NoteName::C, ScaleKind::Major), 64);
        // No scale: passthrough
        assert_eq!(snap_to_scale(61, NoteName::C, ScaleKind::None), 61);
    }

    #[test]
    fn test_humanize_stays_in_bounds() {
        let mut track = Track::new(TrackId(1), "T", 16);
        let mut rng = PatternRng::new(99);
        humanize_velocities(&mut track, 8, &mut rng);
        for (i, &v) in track.velocities.iter().enumerate() {
            assert!(v <= 100, "step {i} out of range: {v}");
            assert!((100 - 8..=100).contains(&v));
        }
    }

    #[test]
    fn test_humanize_deterministic_per_seed() {
        let mut a = Track::new(TrackId(1), "A", 16);
        let mut b = Track::new(TrackId(2), "B", 16);
        humanize_velocities(&mut a, 10, &mut PatternRng::new(42));
        humanize_velocities(&mut b, 10, &mut PatternRng::new(42));
        assert_eq!(a.velocities, b.velocities);
    }

    #[test]
    fn test_harmony_track_transposes() {
        let mut source = Track::new(TrackId(1), "Lead", 8);
        source.toggle_cell(0, 60, crate::track::PianoTool::Draw);
        source.toggle_cell(4, 62, crate::track::PianoTool::Draw);

        let h = harmony_track(&source, HarmonyStyle::ThirdAbove, TrackId(9), None);
        assert_eq!(h.id, TrackId(9));
        assert_eq!(h.name, "Lead (Thirds above)");
        assert_eq!(h.gain, 0.6);
        assert_eq!(h.notes[0].midi, 64);
        assert_eq!(h.notes[1].midi, 66);

        let snapped = harmony_track(
            &source,
            HarmonyStyle::Counter,
            TrackId(10),
            Some((NoteName::C, ScaleKind::Major)),
        );
        // 60 - 2 = 58 (A#), snapped into C major
        assert!(ScaleKind::Major.contains(snapped.notes[0].midi, NoteName::C));
    }

    #[test]
    fn test_progression_presets() {
        let pop = ProgressionKind::Pop.chords(4, 100);
        assert_eq!(pop.len(), 4);
        assert_eq!(pop[0].root, NoteName::C);
        assert_eq!(pop[2].quality, ChordQuality::Min);

        let jazz = ProgressionKind::Jazz.chords(3, 90);
        assert_eq!(jazz.len(), 3);
        assert_eq!(jazz[1].quality, ChordQuality::Dom7);
        assert!(jazz.iter().all(|c| c.octave == 3 && c.velocity == 90));
    }
}
