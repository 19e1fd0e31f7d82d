//! Track representation and pattern editing operations

use serde::{Deserialize, Serialize};

use crate::algorithms::PatternRng;

/// Unique identifier for tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// Accent level of one step (rest plus three intensities)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepLevel {
    #[default]
    Off,
    Low,
    Mid,
    High,
}

impl StepLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Off,
            1 => Self::Low,
            2 => Self::Mid,
            _ => Self::High,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 1,
            Self::Mid => 2,
            Self::High => 3,
        }
    }

    /// 0(off)->1->2->3->0
    pub fn cycled(self) -> Self {
        match self {
            Self::Off => Self::Low,
            Self::Low => Self::Mid,
            Self::Mid => Self::High,
            Self::High => Self::Off,
        }
    }

    /// 1->2->3->1, never landing on a rest
    pub fn cycled_nonzero(self) -> Self {
        match self {
            Self::Off | Self::High => Self::Low,
            Self::Low => Self::Mid,
            Self::Mid => Self::High,
        }
    }

    /// Rests stay rests, accents mirror: 1->3, 2->2, 3->1
    pub fn inverted(self) -> Self {
        match self {
            Self::Off => Self::Off,
            Self::Low => Self::High,
            Self::Mid => Self::Mid,
            Self::High => Self::Low,
        }
    }

    /// Gain contribution of this level
    pub fn gain(&self) -> f32 {
        match self {
            Self::Off => 0.0,
            Self::Low => 0.6,
            Self::Mid => 0.85,
            Self::High => 1.0,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, Self::Off)
    }
}

/// Sample-selection filter applied when a track resolves a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFilter {
    /// Instrument category; empty means the track is unassigned
    pub category: String,
    pub articulation: Option<String>,
    pub mic: Option<String>,
}

impl SampleFilter {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            articulation: None,
            mic: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_empty()
    }

    /// Stable key for rotation cursors
    pub fn key(&self) -> String {
        format!(
            "cat:{}|art:{}|mic:{}",
            self.category,
            self.articulation.as_deref().unwrap_or("any"),
            self.mic.as_deref().unwrap_or("any")
        )
    }
}

/// Round-robin rotation mode for sample selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationMode {
    #[default]
    Cycle,
    Random,
    Off,
}

/// A piano-roll note event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub start: usize,
    /// Length in steps, at least 1
    pub length: usize,
    pub midi: u8,
    pub level: StepLevel,
    #[serde(default)]
    pub selected: bool,
}

impl NoteEvent {
    pub fn new(start: usize, midi: u8) -> Self {
        Self {
            start,
            length: 1,
            midi,
            level: StepLevel::Mid,
            selected: false,
        }
    }
}

/// Fill shapes for the step grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillKind {
    /// Accent level 3 every 4th step
    Fours,
    /// Level 2 every 2nd step
    Eighths,
    /// Level 2 every 3rd step
    Threes,
    /// Random level 1-3 per step with probability = track density
    Random,
}

/// Quantize grids (steps kept are multiples of the interval)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeGrid {
    Fours,
    Eighths,
    Threes,
}

impl QuantizeGrid {
    pub fn interval(&self) -> usize {
        match self {
            Self::Fours => 4,
            Self::Eighths => 2,
            Self::Threes => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    Left,
    Right,
}

/// Active edit tool for piano-roll cell interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PianoTool {
    #[default]
    Draw,
    PaintVelocity,
    Select,
    Length,
}

/// One sequencer track: step grid, piano-roll notes and mix settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub color: String,
    pub filter: SampleFilter,
    pub rotation: RotationMode,
    pub mute: bool,
    pub solo: bool,
    pub armed: bool,
    /// Output gain (0.0 to 1.0)
    pub gain: f32,
    /// Pan (-1.0 left, 0.0 center, 1.0 right)
    pub pan: f32,
    /// Base MIDI note for grid steps
    pub midi: u8,
    /// Base velocity (1-127)
    pub velocity: u8,
    /// Probability used by random fill (0.0 to 1.0)
    pub density: f32,
    /// Step grid, one level per step
    pub pattern: Vec<StepLevel>,
    /// Piano-roll notes; when non-empty they play instead of the grid
    pub notes: Vec<NoteEvent>,
    /// Per-step velocity percentages (0-100)
    pub velocities: Vec<u8>,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>, steps_count: usize) -> Self {
        Self {
            id,
            name: name.into(),
            color: String::new(),
            filter: SampleFilter::default(),
            rotation: RotationMode::Cycle,
            mute: false,
            solo: false,
            armed: false,
            gain: 0.9,
            pan: 0.0,
            midi: 60,
            velocity: 100,
            density: 0.3,
            pattern: vec![StepLevel::Off; steps_count],
            notes: Vec::new(),
            velocities: vec![100; steps_count],
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn set_density(&mut self, density: f32) {
        self.density = density.clamp(0.0, 1.0);
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        self.velocity = velocity.clamp(1, 127);
    }

    /// Advance the step's level through the 0->1->2->3->0 cycle
    pub fn toggle_step(&mut self, i: usize) {
        if let Some(level) = self.pattern.get_mut(i) {
            *level = level.cycled();
        }
    }

    /// Set the per-step velocity percentage, clamped to 0-100
    pub fn set_step_velocity(&mut self, i: usize, pct: u8) {
        if let Some(v) = self.velocities.get_mut(i) {
            *v = pct.min(100);
        }
    }

    pub fn clear(&mut self) {
        self.pattern.fill(StepLevel::Off);
    }

    pub fn fill(&mut self, kind: FillKind, rng: &mut PatternRng) {
        let steps = self.pattern.len();
        let mut pattern = vec![StepLevel::Off; steps];
        match kind {
            FillKind::Fours => {
                for (i, step) in pattern.iter_mut().enumerate() {
                    if i % 4 == 0 {
                        *step = StepLevel::High;
                    }
                }
            }
            FillKind::Eighths => {
                for (i, step) in pattern.iter_mut().enumerate() {
                    if i % 2 == 0 {
                        *step = StepLevel::Mid;
                    }
                }
            }
            FillKind::Threes => {
                for (i, step) in pattern.iter_mut().enumerate() {
                    if i % 3 == 0 {
                        *step = StepLevel::Mid;
                    }
                }
            }
            FillKind::Random => {
                for step in pattern.iter_mut() {
                    if rng.next_unit() < self.density {
                        *step = StepLevel::from_u8(1 + (rng.next_unit() * 3.0) as u8);
                    }
                }
            }
        }
        self.pattern = pattern;
    }

    /// Zero every step whose index is not on the grid; kept steps keep their level
    pub fn quantize(&mut self, grid: QuantizeGrid) {
        let interval = grid.interval();
        for (i, level) in self.pattern.iter_mut().enumerate() {
            if i % interval != 0 {
                *level = StepLevel::Off;
            }
        }
    }

    /// Rotate the grid by one step, wrapping the edge element
    pub fn shift(&mut self, dir: ShiftDirection) {
        if self.pattern.is_empty() {
            return;
        }
        match dir {
            ShiftDirection::Left => self.pattern.rotate_left(1),
            ShiftDirection::Right => self.pattern.rotate_right(1),
        }
    }

    pub fn invert(&mut self) {
        for level in self.pattern.iter_mut() {
            *level = level.inverted();
        }
    }

    /// Apply the active tool to the piano-roll cell at (step, midi)
    pub fn toggle_cell(&mut self, step: usize, midi: u8, tool: PianoTool) {
        let at = self
            .notes
            .iter()
            .position(|n| n.start == step && n.midi == midi);
        match tool {
            PianoTool::Draw => match at {
                Some(idx) => {
                    self.notes.remove(idx);
                }
                None => self.notes.push(NoteEvent::new(step, midi)),
            },
            PianoTool::PaintVelocity => match at {
                Some(idx) => {
                    let note = &mut self.notes[idx];
                    note.level = note.level.cycled_nonzero();
                }
                None => self.notes.push(NoteEvent {
                    level: StepLevel::Low,
                    ..NoteEvent::new(step, midi)
                }),
            },
            PianoTool::Select => {
                if let Some(idx) = at {
                    let note = &mut self.notes[idx];
                    note.selected = !note.selected;
                }
            }
            PianoTool::Length => match at {
                Some(idx) => {
                    let note = &mut self.notes[idx];
                    note.length = note.length.max(1);
                }
                None => {
                    // Extend an earlier note on this row to span the clicked step
                    let prev = self
                        .notes
                        .iter_mut()
                        .find(|n| n.midi == midi && n.start < step);
                    match prev {
                        Some(note) => note.length = (step - note.start + 1).max(1),
                        None => self.notes.push(NoteEvent::new(step, midi)),
                    }
                }
            },
        }
    }

    pub fn delete_selected(&mut self) {
        self.notes.retain(|n| !n.selected);
    }

    /// Move selected notes by `delta` steps, clamped to the grid
    pub fn nudge_selected(&mut self, delta: isize, steps_count: usize) {
        let max = steps_count.saturating_sub(1) as isize;
        for note in self.notes.iter_mut().filter(|n| n.selected) {
            note.start = (note.start as isize + delta).clamp(0, max) as usize;
        }
    }

    /// Truncate or zero-pad the step arrays to the given length
    pub(crate) fn resize_grids(&mut self, steps_count: usize) {
        self.pattern.resize(steps_count, StepLevel::Off);
        self.velocities.resize(steps_count, 100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Track {
        Track::new(TrackId(1), "Kick", 8)
    }

    #[test]
    fn test_toggle_step_four_cycle() {
        let mut t = track();
        for i in 0..8 {
            let before = t.pattern[i];
            for _ in 0..4 {
                t.toggle_step(i);
            }
            assert_eq!(t.pattern[i], before);
        }
    }

    #[test]
    fn test_toggle_step_sequence() {
        let mut t = track();
        t.toggle_step(0);
        assert_eq!(t.pattern[0], StepLevel::Low);
        t.toggle_step(0);
        assert_eq!(t.pattern[0], StepLevel::Mid);
        t.toggle_step(0);
        assert_eq!(t.pattern[0], StepLevel::High);
        t.toggle_step(0);
        assert_eq!(t.pattern[0], StepLevel::Off);
    }

    #[test]
    fn test_toggle_step_out_of_range_is_ignored() {
        let mut t = track();
        t.toggle_step(99);
        assert!(t.pattern.iter().all(|l| l.is_rest()));
    }

    #[test]
    fn test_fill_fours() {
        let mut t = track();
        t.fill(FillKind::Fours, &mut PatternRng::default());
        let levels: Vec<u8> = t.pattern.iter().map(|l| l.as_u8()).collect();
        assert_eq!(levels, vec![3, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_fill_threes() {
        let mut t = track();
        t.fill(FillKind::Threes, &mut PatternRng::default());
        let levels: Vec<u8> = t.pattern.iter().map(|l| l.as_u8()).collect();
        assert_eq!(levels, vec![2, 0, 0, 2, 0, 0, 2, 0]);
    }

    #[test]
    fn test_fill_random_respects_density() {
        let mut t = track();
        let mut rng = PatternRng::default();
        t.density = 0.0;
        t.fill(FillKind::Random, &mut rng);
        assert!(t.pattern.iter().all(|l| l.is_rest()));
        t.density = 1.0;
        t.fill(FillKind::Random, &mut rng);
        assert!(t.pattern.iter().all(|l| !l.is_rest()));
    }

    #[test]
    fn test_quantize_fours() {
        let mut t = track();
        t.pattern = [3, 1, 2, 3, 1, 2, 3, 1]
            .iter()
            .map(|&v| StepLevel::from_u8(v))
            .collect();
        t.quantize(QuantizeGrid::Fours);
        let levels: Vec<u8> = t.pattern.iter().map(|l| l.as_u8()).collect();
        assert_eq!(levels, vec![3, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_invert() {
        let mut t = Track::new(TrackId(1), "T", 4);
        t.pattern = [0, 1, 2, 3].iter().map(|&v| StepLevel::from_u8(v)).collect();
        t.invert();
        let levels: Vec<u8> = t.pattern.iter().map(|l| l.as_u8()).collect();
        assert_eq!(levels, vec![0, 3, 2, 1]);
    }

    #[test]
    fn test_shift_wraps() {
        let mut t = Track::new(TrackId(1), "T", 4);
        t.pattern = [3, 0, 0, 1].iter().map(|&v| StepLevel::from_u8(v)).collect();
        t.shift(ShiftDirection::Left);
        let levels: Vec<u8> = t.pattern.iter().map(|l| l.as_u8()).collect();
        assert_eq!(levels, vec![0, 0, 1, 3]);
        t.shift(ShiftDirection::Right);
        let levels: Vec<u8> = t.pattern.iter().map(|l| l.as_u8()).collect();
        assert_eq!(levels, vec![3, 0, 0, 1]);
    }

    #[test]
    fn test_step_velocity_clamped() {
        let mut t = track();
        t.set_step_velocity(2, 130);
        assert_eq!(t.velocities[2], 100);
        t.set_step_velocity(2, 55);
        assert_eq!(t.velocities[2], 55);
    }

    #[test]
    fn test_draw_tool_adds_and_removes() {
        let mut t = track();
        t.toggle_cell(3, 64, PianoTool::Draw);
        assert_eq!(t.notes.len(), 1);
        assert_eq!(t.notes[0].level, StepLevel::Mid);
        t.toggle_cell(3, 64, PianoTool::Draw);
        assert!(t.notes.is_empty());
    }

    #[test]
    fn test_velocity_paint_cycles() {
        let mut t = track();
        t.toggle_cell(0, 60, PianoTool::PaintVelocity);
        assert_eq!(t.notes[0].level, StepLevel::Low);
        t.toggle_cell(0, 60, PianoTool::PaintVelocity);
        assert_eq!(t.notes[0].level, StepLevel::Mid);
        t.toggle_cell(0, 60, PianoTool::PaintVelocity);
        assert_eq!(t.notes[0].level, StepLevel::High);
        t.toggle_cell(0, 60, PianoTool::PaintVelocity);
        assert_eq!(t.notes[0].level, StepLevel::Low);
    }

    #[test]
    fn test_length_tool_extends_preceding_note() {
        let mut t = track();
        t.toggle_cell(1, 60, PianoTool::Draw);
        t.toggle_cell(5, 60, PianoTool::Length);
        assert_eq!(t.notes.len(), 1);
        assert_eq!(t.notes[0].length, 5);
    }

    #[test]
    fn test_select_and_nudge() {
        let mut t = track();
        t.toggle_cell(0, 60, PianoTool::Draw);
        t.toggle_cell(7, 62, PianoTool::Draw);
        t.toggle_cell(0, 60, PianoTool::Select);
        t.nudge_selected(-2, 8);
        assert_eq!(t.notes[0].start, 0); // clamped at the left edge
        t.nudge_selected(3, 8);
        assert_eq!(t.notes[0].start, 3);
        assert_eq!(t.notes[1].start, 7); // unselected note untouched
        t.delete_selected();
        assert_eq!(t.notes.len(), 1);
    }
}
