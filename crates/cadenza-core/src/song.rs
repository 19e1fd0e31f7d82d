//! Song: the serializable sequencer snapshot and its management operations

use serde::{Deserialize, Serialize};

use crate::algorithms::{ProgressionKind, ScaleKind};
use crate::chord::{Chord, NoteName};
use crate::error::{CadenzaError, Result};
use crate::track::{NoteEvent, RotationMode, SampleFilter, StepLevel, Track, TrackId};

pub const MIN_STEPS: usize = 4;
pub const MAX_STEPS: usize = 64;

const TRACK_COLORS: [&str; 6] = [
    "#3b82f6", "#22c55e", "#ef4444", "#f59e0b", "#a855f7", "#14b8a6",
];

/// Rhythmic resolution of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Subdivision {
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "1/8")]
    Eighth,
    #[default]
    #[serde(rename = "1/16")]
    Sixteenth,
    #[serde(rename = "1/32")]
    ThirtySecond,
}

impl Subdivision {
    /// Divisor applied to the quarter-note duration
    pub fn factor(&self) -> f64 {
        match self {
            Self::Quarter => 1.0,
            Self::Eighth => 2.0,
            Self::Sixteenth => 4.0,
            Self::ThirtySecond => 8.0,
        }
    }

    /// Swing shifts alternating steps only at 1/8 and 1/16
    pub fn swing_applies(&self) -> bool {
        matches!(self, Self::Eighth | Self::Sixteenth)
    }
}

/// Active editing/playback surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequencerMode {
    Grid,
    #[default]
    Piano,
    Wave,
    /// Chord progression + melody overlay on top of the base tracks
    Music,
}

/// Instrument lane playing the chord progression in Music mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChordLane {
    pub filter: SampleFilter,
    pub rotation: RotationMode,
    pub velocity: u8,
    pub octave: i8,
    pub gain: f32,
    pub pan: f32,
}

impl Default for ChordLane {
    fn default() -> Self {
        Self {
            filter: SampleFilter::default(),
            rotation: RotationMode::Cycle,
            velocity: 100,
            octave: 4,
            gain: 1.0,
            pan: 0.0,
        }
    }
}

/// Melody lane layered independently of the main tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MelodyTrack {
    pub filter: SampleFilter,
    pub rotation: RotationMode,
    pub velocity: u8,
    pub gain: f32,
    pub pan: f32,
    pub notes: Vec<NoteEvent>,
    pub velocities: Vec<u8>,
}

impl MelodyTrack {
    pub fn new(steps_count: usize) -> Self {
        Self {
            filter: SampleFilter::default(),
            rotation: RotationMode::Cycle,
            velocity: 100,
            gain: 1.0,
            pan: 0.0,
            notes: Vec::new(),
            velocities: vec![100; steps_count],
        }
    }
}

/// Chord/melody overlay state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicLayer {
    pub chord_lane: ChordLane,
    pub chords: Vec<Chord>,
    pub melody: MelodyTrack,
}

impl MusicLayer {
    pub fn new(steps_count: usize) -> Self {
        Self {
            chord_lane: ChordLane::default(),
            chords: vec![Chord::default(); steps_count],
            melody: MelodyTrack::new(steps_count),
        }
    }
}

/// The full sequencer snapshot: transport settings, tracks and the music layer.
///
/// Serializing and deserializing a `Song` must reproduce identical scheduling
/// behavior; `validate` checks the grid-length invariant after deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub bpm: f64,
    pub subdivision: Subdivision,
    /// Swing amount, 0.0 to 0.5
    pub swing: f32,
    pub steps_count: usize,
    pub mode: SequencerMode,
    pub scale_root: NoteName,
    pub scale_kind: ScaleKind,
    /// Clear rotation cursors whenever the step counter wraps to 0
    pub reset_rotation_on_bar: bool,
    pub tracks: Vec<Track>,
    pub music: MusicLayer,
    next_track_id: u64,
    #[serde(skip)]
    clipboard: Option<Vec<StepLevel>>,
}

impl Default for Song {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Song {
    /// New song with two empty tracks, mirroring a fresh session
    pub fn new(steps_count: usize) -> Self {
        let steps_count = steps_count.clamp(MIN_STEPS, MAX_STEPS);
        let mut song = Self {
            bpm: 120.0,
            subdivision: Subdivision::Sixteenth,
            swing: 0.0,
            steps_count,
            mode: SequencerMode::Piano,
            scale_root: NoteName::C,
            scale_kind: ScaleKind::Major,
            reset_rotation_on_bar: false,
            tracks: Vec::new(),
            music: MusicLayer::new(steps_count),
            next_track_id: 0,
            clipboard: None,
        };
        song.add_track();
        let second = song.add_track();
        if let Some(t) = song.track_mut(second) {
            t.midi = 62;
        }
        song
    }

    pub fn set_swing(&mut self, swing: f32) {
        self.swing = swing.clamp(0.0, 0.5);
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    fn alloc_track_id(&mut self) -> TrackId {
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        id
    }

    /// Append a new empty track and return its id
    pub fn add_track(&mut self) -> TrackId {
        let id = self.alloc_track_id();
        let n = self.tracks.len();
        let mut track = Track::new(id, format!("Track {}", n + 1), self.steps_count);
        track.color = TRACK_COLORS[n % TRACK_COLORS.len()].to_string();
        self.tracks.push(track);
        id
    }

    /// Insert a prepared track (e.g. a generated harmony), assigning a fresh id
    pub fn adopt_track(&mut self, mut track: Track) -> TrackId {
        let id = self.alloc_track_id();
        track.id = id;
        track.resize_grids(self.steps_count);
        self.tracks.push(track);
        id
    }

    /// Remove a track; the last remaining track cannot be removed
    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        if self.tracks.len() <= 1 {
            return None;
        }
        let pos = self.tracks.iter().position(|t| t.id == id)?;
        Some(self.tracks.remove(pos))
    }

    /// Duplicate a track, inserting the copy right after the original
    pub fn duplicate_track(&mut self, id: TrackId) -> Option<TrackId> {
        let pos = self.tracks.iter().position(|t| t.id == id)?;
        let new_id = self.alloc_track_id();
        let source = &self.tracks[pos];
        let mut copy = source.clone();
        copy.id = new_id;
        copy.name = format!("{} Copy", source.name);
        copy.color = TRACK_COLORS[self.tracks.len() % TRACK_COLORS.len()].to_string();
        self.tracks.insert(pos + 1, copy);
        Some(new_id)
    }

    /// Change the global step count, resizing every grid in one pass.
    ///
    /// Tracks, chords and the melody lane are truncated or padded together so
    /// the length invariant holds at every observable point.
    pub fn set_steps_count(&mut self, steps_count: usize) {
        let steps_count = steps_count.clamp(MIN_STEPS, MAX_STEPS);
        for track in self.tracks.iter_mut() {
            track.resize_grids(steps_count);
        }
        self.music.chords.resize(steps_count, Chord::default());
        self.music.melody.velocities.resize(steps_count, 100);
        self.steps_count = steps_count;
    }

    /// Copy a track's step grid to the clipboard
    pub fn copy_pattern(&mut self, id: TrackId) {
        self.clipboard = self.track(id).map(|t| t.pattern.clone());
    }

    /// Paste the clipboard into a track, truncating or padding to fit
    pub fn paste_pattern(&mut self, id: TrackId) {
        let Some(clip) = self.clipboard.clone() else {
            return;
        };
        let steps_count = self.steps_count;
        if let Some(track) = self.track_mut(id) {
            let mut pattern = clip;
            pattern.resize(steps_count, StepLevel::Off);
            track.pattern = pattern;
        }
    }

    /// Fill the chord progression by cycling a preset across all steps
    pub fn apply_progression(&mut self, kind: ProgressionKind) {
        let base = kind.chords(self.music.chord_lane.octave, self.music.chord_lane.velocity);
        for (i, slot) in self.music.chords.iter_mut().enumerate() {
            *slot = base[i % base.len()];
        }
    }

    /// Remove selected piano-roll notes across all tracks
    pub fn delete_selected_notes(&mut self) {
        for track in self.tracks.iter_mut() {
            track.delete_selected();
        }
    }

    /// Nudge selected piano-roll notes across all tracks
    pub fn nudge_selected(&mut self, delta: isize) {
        let steps_count = self.steps_count;
        for track in self.tracks.iter_mut() {
            track.nudge_selected(delta, steps_count);
        }
    }

    /// Check the grid-length invariant on every lane
    pub fn validate(&self) -> Result<()> {
        if !(MIN_STEPS..=MAX_STEPS).contains(&self.steps_count) {
            return Err(CadenzaError::StepsOutOfRange(self.steps_count));
        }
        for track in &self.tracks {
            for (label, len) in [("pattern", track.pattern.len()), ("velocities", track.velocities.len())] {
                if len != self.steps_count {
                    return Err(CadenzaError::GridMismatch {
                        name: format!("{} {}", track.name, label),
                        expected: self.steps_count,
                        found: len,
                    });
                }
            }
        }
        if self.music.chords.len() != self.steps_count {
            return Err(CadenzaError::GridMismatch {
                name: "chords".to_string(),
                expected: self.steps_count,
                found: self.music.chords.len(),
            });
        }
        if self.music.melody.velocities.len() != self.steps_count {
            return Err(CadenzaError::GridMismatch {
                name: "melody velocities".to_string(),
                expected: self.steps_count,
                found: self.music.melody.velocities.len(),
            });
        }
        Ok(())
    }
}
