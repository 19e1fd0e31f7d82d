//! Sustain and sostenuto pedals: deferral of note-off events

use std::collections::HashSet;

use crate::voice::VoiceKey;

/// Intercepts note-off events while a pedal is held.
///
/// Sustain defers every note-off until pedal-up; sostenuto defers only the
/// keys that were sounding when the pedal went down. `clear` (the stop-all
/// path) bypasses both.
#[derive(Debug, Default)]
pub struct SustainController {
    down: bool,
    sostenuto: bool,
    sustained: HashSet<VoiceKey>,
    captured: HashSet<VoiceKey>,
    parked: HashSet<VoiceKey>,
}

impl SustainController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_down(&self) -> bool {
        self.down
    }

    pub fn is_sostenuto(&self) -> bool {
        self.sostenuto
    }

    /// Returns true when the note-off must be deferred instead of applied
    pub fn defer(&mut self, key: VoiceKey) -> bool {
        if self.down {
            self.sustained.insert(key);
            return true;
        }
        if self.sostenuto && self.captured.contains(&key) {
            self.parked.insert(key);
            return true;
        }
        false
    }

    pub fn pedal_down(&mut self) {
        self.down = true;
    }

    /// Release the pedal; returns every deferred key to note-off now
    pub fn pedal_up(&mut self) -> Vec<VoiceKey> {
        self.down = false;
        self.sustained.drain().collect()
    }

    /// Capture the currently-sounding keys for sostenuto hold
    pub fn sostenuto_down(&mut self, sounding: impl IntoIterator<Item = VoiceKey>) {
        self.sostenuto = true;
        self.captured = sounding.into_iter().collect();
    }

    /// Release sostenuto; returns the captured keys whose note-off was parked
    pub fn sostenuto_up(&mut self) -> Vec<VoiceKey> {
        self.sostenuto = false;
        self.captured.clear();
        self.parked.drain().collect()
    }

    /// Drop all deferred state without releasing anything (stop-all path)
    pub fn clear(&mut self) {
        self.down = false;
        self.sostenuto = false;
        self.sustained.clear();
        self.captured.clear();
        self.parked.clear();
    }
}
