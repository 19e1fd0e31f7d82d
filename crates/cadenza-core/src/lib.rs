//! cadenza-core: Domain types for the cadenza sequencer

pub mod algorithms;
mod chord;
mod error;
mod song;
mod track;

pub use algorithms::{
    harmony_track, humanize_velocities, snap_to_scale,
    HarmonyStyle, PatternRng, ProgressionKind, ScaleKind,
};
pub use chord::{Chord, ChordQuality, NoteName};
pub use error::{CadenzaError, Result};
pub use song::{
    ChordLane, MelodyTrack, MusicLayer, SequencerMode, Song, Subdivision, MAX_STEPS, MIN_STEPS,
};
pub use track::{
    FillKind, NoteEvent, PianoTool, QuantizeGrid, RotationMode, SampleFilter, ShiftDirection,
    StepLevel, Track, TrackId,
};
