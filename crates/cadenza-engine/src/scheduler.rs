//! Transport scheduler: the clock-driven heart of the sequencer

use std::time::Duration;

use cadenza_core::{
    CadenzaError, RotationMode, SampleFilter, SequencerMode, Song, StepLevel, Track,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, trace, warn};

use crate::allocator::VoiceAllocator;
use crate::clock::{Clock, SystemClock};
use crate::output::{OutputGraph, TriggerParams};
use crate::sample_index::SampleIndex;
use crate::sustain::SustainController;
use crate::voice::{
    EnvelopeParams, Lane, VelocityCurve, Voice, VoiceKey, VoicePool, FAST_RELEASE_SECS,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport already running")]
    AlreadyRunning,
    #[error("Transport not running")]
    NotRunning,
    #[error(transparent)]
    InvalidSong(#[from] CadenzaError),
}

/// Transport state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

/// Read-only playback snapshot pushed to observers each tick
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NowPlaying {
    pub step: usize,
    pub running: bool,
    pub active_voices: usize,
}

/// A note resolved for dispatch within one tick
struct FireEvent {
    lane: Lane,
    filter: SampleFilter,
    rotation: RotationMode,
    midi: u8,
    velocity: u8,
    gain: f32,
    pan: f32,
    length: usize,
}

/// Owns the musical clock and orchestrates pattern reads, voice allocation,
/// envelopes and pedal state.
///
/// Everything within a tick executes synchronously; the only suspension point
/// is the inter-step delay. External calls (pedals, stop-all, edits through
/// `song_mut`) must happen strictly between ticks.
pub struct TransportScheduler {
    song: Song,
    state: TransportState,
    clock: Box<dyn Clock>,
    allocator: VoiceAllocator,
    pool: VoicePool,
    sustain: SustainController,
    env: EnvelopeParams,
    curve: VelocityCurve,
    /// Click sample filter; `None` disables the metronome
    click_filter: Option<SampleFilter>,
    current_step: usize,
    tick_count: u64,
    next_deadline: Option<Duration>,
    pending_offs: Vec<(u64, VoiceKey)>,
    now_tx: Option<Sender<NowPlaying>>,
}

impl TransportScheduler {
    pub fn new(song: Song) -> Result<Self, TransportError> {
        Self::with_clock(song, Box::new(SystemClock::new()))
    }

    /// Construct with an injected clock (virtual time in tests)
    pub fn with_clock(song: Song, clock: Box<dyn Clock>) -> Result<Self, TransportError> {
        song.validate()?;
        Ok(Self {
            song,
            state: TransportState::Stopped,
            clock,
            allocator: VoiceAllocator::new(),
            pool: VoicePool::new(),
            sustain: SustainController::new(),
            env: EnvelopeParams::default(),
            curve: VelocityCurve::default(),
            click_filter: None,
            current_step: 0,
            tick_count: 0,
            next_deadline: None,
            pending_offs: Vec::new(),
            now_tx: None,
        })
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Mutable song access for edits between ticks
    pub fn song_mut(&mut self) -> &mut Song {
        &mut self.song
    }

    pub fn set_envelope(&mut self, env: EnvelopeParams) {
        self.env = env;
    }

    pub fn set_velocity_curve(&mut self, curve: VelocityCurve) {
        self.curve = curve;
    }

    /// Enable the metronome by giving it a click sample filter
    pub fn set_metronome(&mut self, filter: Option<SampleFilter>) {
        self.click_filter = filter;
    }

    /// Seed the allocator's RNG (reproducible `Random` rotation)
    pub fn seed_rotation(&mut self, seed: u64) {
        self.allocator = VoiceAllocator::with_seed(seed);
    }

    /// Channel receiving one `NowPlaying` update per tick
    pub fn now_playing(&mut self) -> Receiver<NowPlaying> {
        let (tx, rx) = unbounded();
        self.now_tx = Some(tx);
        rx
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn active_voices(&self) -> usize {
        self.pool.len()
    }

    /// Absolute deadline of the next tick, if one is scheduled
    pub fn next_deadline(&self) -> Option<Duration> {
        self.next_deadline
    }

    /// Time remaining until the next tick is due
    pub fn time_until_next_tick(&self) -> Option<Duration> {
        self.next_deadline
            .map(|d| d.saturating_sub(self.clock.now()))
    }

    /// Stopped -> Running; the first tick is due immediately
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.state == TransportState::Running {
            return Err(TransportError::AlreadyRunning);
        }
        self.song.validate()?;
        self.state = TransportState::Running;
        self.current_step = 0;
        self.tick_count = 0;
        self.pending_offs.clear();
        self.next_deadline = Some(self.clock.now());
        info!("Transport started: {} bpm, {} steps", self.song.bpm, self.song.steps_count);
        Ok(())
    }

    /// Running -> Stopped.
    ///
    /// The pending tick is cancelled before voices are force-released, so no
    /// tick can fire once this returns.
    pub fn stop(&mut self, graph: &mut dyn OutputGraph) -> Result<(), TransportError> {
        if self.state == TransportState::Stopped {
            return Err(TransportError::NotRunning);
        }
        self.next_deadline = None;
        self.state = TransportState::Stopped;
        self.stop_all(graph);
        info!("Transport stopped");
        Ok(())
    }

    /// Fast-release every voice and drop all deferred pedal state.
    ///
    /// Bypasses sustain entirely; also the recovery path for a stuck pedal.
    pub fn stop_all(&mut self, graph: &mut dyn OutputGraph) {
        for voice in self.pool.drain() {
            graph.release(voice.handle, FAST_RELEASE_SECS);
        }
        self.sustain.clear();
        self.pending_offs.clear();
    }

    pub fn pedal_down(&mut self) {
        self.sustain.pedal_down();
    }

    /// Release the sustain pedal, applying every deferred note-off
    pub fn pedal_up(&mut self, graph: &mut dyn OutputGraph) {
        let now = self.clock.now();
        for key in self.sustain.pedal_up() {
            self.release_voice(&key, graph, now);
        }
    }

    /// Press the sostenuto pedal, capturing the currently-sounding keys
    pub fn sostenuto_down(&mut self) {
        self.sustain.sostenuto_down(self.pool.keys());
    }

    pub fn sostenuto_up(&mut self, graph: &mut dyn OutputGraph) {
        let now = self.clock.now();
        for key in self.sustain.sostenuto_up() {
            self.release_voice(&key, graph, now);
        }
    }

    /// Advance one step: apply due note-offs, fire this step's notes across
    /// all lanes, then schedule the next tick deadline.
    pub fn tick(
        &mut self,
        index: &dyn SampleIndex,
        graph: &mut dyn OutputGraph,
    ) -> Result<(), TransportError> {
        if self.state != TransportState::Running {
            return Err(TransportError::NotRunning);
        }
        let now = self.clock.now();
        let steps_count = self.song.steps_count;
        // tolerate a resize race: wrap rather than read out of range
        let step = self.current_step % steps_count;

        self.apply_due_note_offs(graph, now);
        for voice in self.pool.reap(now) {
            graph.stop(voice.handle);
        }

        let mut events = Vec::new();
        if let Some(click) = &self.click_filter {
            if step % 4 == 0 {
                events.push(FireEvent {
                    lane: Lane::Metronome,
                    filter: click.clone(),
                    rotation: RotationMode::Off,
                    midi: if step == 0 { 84 } else { 76 },
                    velocity: 80,
                    gain: 1.0,
                    pan: 0.0,
                    length: 1,
                });
            }
        }

        let any_solo = self.song.tracks.iter().any(|t| t.solo);
        for track in &self.song.tracks {
            if track.mute || (any_solo && !track.solo) {
                continue;
            }
            collect_track_events(track, step, &mut events);
        }

        match self.song.mode {
            SequencerMode::Music => self.collect_music_events(step, &mut events),
            SequencerMode::Grid | SequencerMode::Piano | SequencerMode::Wave => {}
        }

        trace!("Tick: step={} events={}", step, events.len());
        for event in events {
            self.fire(event, index, graph, now);
        }

        let delay = self.step_delay(step);
        // drift-corrected: next deadline builds on the previous one, not "now"
        self.next_deadline = Some(self.next_deadline.unwrap_or(now) + delay);
        self.tick_count += 1;

        let next = (step + 1) % steps_count;
        if next == 0 && self.song.reset_rotation_on_bar {
            self.allocator.reset_rotation();
        }
        self.current_step = next;

        if let Some(tx) = &self.now_tx {
            let _ = tx.send(NowPlaying {
                step,
                running: true,
                active_voices: self.pool.len(),
            });
        }
        Ok(())
    }

    /// Delay between this step and the next.
    ///
    /// `base = quarter / subdivision`; at 1/8 and 1/16, offbeat steps stretch
    /// by `1 + swing` and onbeat steps shrink by `1 - swing`.
    fn step_delay(&self, step: usize) -> Duration {
        let quarter_ms = 60_000.0 / self.song.bpm.max(1.0);
        let base = quarter_ms / self.song.subdivision.factor();
        let ms = if self.song.subdivision.swing_applies() {
            let swing = self.song.swing.clamp(0.0, 0.5) as f64;
            if step % 2 == 1 {
                base * (1.0 + swing)
            } else {
                base * (1.0 - swing)
            }
        } else {
            base
        };
        Duration::from_secs_f64(ms / 1000.0)
    }

    fn collect_music_events(&self, step: usize, events: &mut Vec<FireEvent>) {
        let music = &self.song.music;
        if !music.chord_lane.filter.is_empty() {
            if let Some(chord) = music.chords.get(step) {
                for midi in chord.resolve() {
                    events.push(FireEvent {
                        lane: Lane::Chords,
                        filter: music.chord_lane.filter.clone(),
                        rotation: music.chord_lane.rotation,
                        midi,
                        velocity: chord.velocity.clamp(1, 127),
                        gain: music.chord_lane.gain,
                        pan: music.chord_lane.pan,
                        length: 1,
                    });
                }
            }
        }
        let melody = &music.melody;
        if !melody.filter.is_empty() {
            for note in melody.notes.iter().filter(|n| n.start == step) {
                if note.level.is_rest() {
                    continue;
                }
                events.push(FireEvent {
                    lane: Lane::Melody,
                    filter: melody.filter.clone(),
                    rotation: melody.rotation,
                    midi: note.midi,
                    velocity: scaled_velocity(melody.velocity, note.level, &melody.velocities, step),
                    gain: melody.gain,
                    pan: melody.pan,
                    length: note.length.max(1),
                });
            }
        }
    }

    fn fire(
        &mut self,
        event: FireEvent,
        index: &dyn SampleIndex,
        graph: &mut dyn OutputGraph,
        now: Duration,
    ) {
        let Some(sample) =
            self.allocator
                .resolve(index, &event.filter, event.rotation, event.midi)
        else {
            if !event.filter.is_empty() {
                warn!("No sample matches {} for note {}, skipping", event.filter.key(), event.midi);
            }
            return;
        };

        let key: VoiceKey = (event.lane, event.midi);
        // retriggering an already-sounding key: fast-fade the old voice first
        if let Some(old) = self.pool.take(&key) {
            graph.release(old.handle, FAST_RELEASE_SECS);
        }

        let peak_base = self.curve.gain(event.velocity).clamp(0.05, 1.0);
        let peak = (peak_base * event.gain.clamp(0.0, 1.0)).clamp(0.0, 1.0);
        let params = TriggerParams {
            peak,
            pan: event.pan.clamp(-1.0, 1.0),
            envelope: self.env,
        };
        let handle = graph.trigger(&sample, event.midi, &params);
        self.pool.start(Voice::new(
            event.lane, event.midi, handle, sample.id, peak, self.env, now,
        ));
        self.pending_offs
            .push((self.tick_count + event.length as u64, key));
    }

    fn apply_due_note_offs(&mut self, graph: &mut dyn OutputGraph, now: Duration) {
        let due_tick = self.tick_count;
        let mut due = Vec::new();
        self.pending_offs.retain(|&(at, key)| {
            if at <= due_tick {
                due.push(key);
                false
            } else {
                true
            }
        });
        for key in due {
            if self.sustain.defer(key) {
                trace!("Note-off for {:?} deferred by pedal", key);
                continue;
            }
            self.release_voice(&key, graph, now);
        }
    }

    fn release_voice(&mut self, key: &VoiceKey, graph: &mut dyn OutputGraph, now: Duration) {
        if let Some(voice) = self.pool.get_mut(key) {
            voice.note_off(now);
            graph.release(voice.handle, self.env.release);
        }
    }
}

/// Resolve the notes a track fires on this step.
///
/// A track with piano-roll notes plays those; otherwise the step grid fires
/// its base note. Tracks are visited in list order and notes in insertion
/// order, which keeps rotation cursors deterministic.
fn collect_track_events(track: &Track, step: usize, events: &mut Vec<FireEvent>) {
    if track.filter.is_empty() {
        return;
    }
    if !track.notes.is_empty() {
        for note in track.notes.iter().filter(|n| n.start == step) {
            if note.level.is_rest() {
                continue;
            }
            events.push(FireEvent {
                lane: Lane::Track(track.id),
                filter: track.filter.clone(),
                rotation: track.rotation,
                midi: note.midi,
                velocity: scaled_velocity(track.velocity, note.level, &track.velocities, step),
                gain: track.gain,
                pan: track.pan,
                length: note.length.max(1),
            });
        }
    } else {
        let Some(&level) = track.pattern.get(step) else {
            return;
        };
        if level.is_rest() {
            return;
        }
        events.push(FireEvent {
            lane: Lane::Track(track.id),
            filter: track.filter.clone(),
            rotation: track.rotation,
            midi: track.midi,
            velocity: scaled_velocity(track.velocity, level, &track.velocities, step),
            gain: track.gain,
            pan: track.pan,
            length: 1,
        });
    }
}

/// Base velocity scaled by the step's accent level and velocity-lane percent
fn scaled_velocity(base: u8, level: StepLevel, velocities: &[u8], step: usize) -> u8 {
    let pct = velocities.get(step).copied().unwrap_or(100).clamp(1, 127) as f32;
    let vel = (base as f32 * level.gain() * (pct / 100.0)).round() as i32;
    vel.clamp(1, 127) as u8
}
