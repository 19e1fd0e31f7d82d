//! Per-note envelope voices and the pool that owns them

use std::collections::HashMap;
use std::time::Duration;

use cadenza_core::TrackId;
use serde::{Deserialize, Serialize};

use crate::output::VoiceHandle;

/// Ramp used when a voice is displaced or the transport stops
pub const FAST_RELEASE_SECS: f32 = 0.005;

/// ADSR envelope parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeParams {
    /// Attack time in seconds
    pub attack: f32,
    /// Decay time in seconds
    pub decay: f32,
    /// Sustain level (0.0 to 1.0)
    pub sustain: f32,
    /// Release time in seconds
    pub release: f32,
}

impl EnvelopeParams {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.clamp(0.001, 5.0),
            decay: decay.clamp(0.001, 5.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.clamp(0.001, 5.0),
        }
    }
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.3,
            sustain: 0.7,
            release: 0.5,
        }
    }
}

/// Mapping from MIDI velocity (1-127) to gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VelocityCurve {
    Linear,
    Soft,
    #[default]
    Hard,
    Log,
    Exp,
}

impl VelocityCurve {
    pub fn gain(&self, velocity: u8) -> f32 {
        let v = velocity.clamp(1, 127) as f32 / 127.0;
        match self {
            Self::Linear => v,
            Self::Soft => v.sqrt(),
            Self::Hard => v * v,
            Self::Log => (1.0 + v * 9.0).ln() / 11.0f32.ln(),
            Self::Exp => (v.exp() - 1.0) / (std::f32::consts::E - 1.0),
        }
    }
}

/// Which playback lane a voice belongs to; part of the note-off key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Track(TrackId),
    Chords,
    Melody,
    Metronome,
}

/// Voice identity for note-off correlation
pub type VoiceKey = (Lane, u8);

/// Envelope stage of a sounding voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStage {
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy)]
struct ReleaseState {
    at: Duration,
    from_gain: f32,
    seconds: f32,
}

/// One sounding note: identity, target sample and envelope state.
///
/// The stage machine is evaluated against the injected clock rather than
/// stepped per sample; the output graph does the actual gain ramping.
#[derive(Debug, Clone)]
pub struct Voice {
    pub lane: Lane,
    pub midi: u8,
    pub handle: VoiceHandle,
    pub sample_id: u64,
    /// Envelope peak (velocity curve times lane gain)
    pub peak: f32,
    params: EnvelopeParams,
    started_at: Duration,
    release: Option<ReleaseState>,
}

impl Voice {
    pub fn new(
        lane: Lane,
        midi: u8,
        handle: VoiceHandle,
        sample_id: u64,
        peak: f32,
        params: EnvelopeParams,
        now: Duration,
    ) -> Self {
        Self {
            lane,
            midi,
            handle,
            sample_id,
            peak,
            params,
            started_at: now,
            release: None,
        }
    }

    pub fn key(&self) -> VoiceKey {
        (self.lane, self.midi)
    }

    pub fn stage(&self, now: Duration) -> VoiceStage {
        if self.release.is_some() {
            return VoiceStage::Release;
        }
        let t = now.saturating_sub(self.started_at).as_secs_f32();
        if t < self.params.attack {
            VoiceStage::Attack
        } else if t < self.params.attack + self.params.decay {
            VoiceStage::Decay
        } else {
            VoiceStage::Sustain
        }
    }

    /// Envelope gain at `now`, mirroring what the graph's ramps produce
    pub fn gain_at(&self, now: Duration) -> f32 {
        if let Some(rel) = self.release {
            let t = now.saturating_sub(rel.at).as_secs_f32();
            if rel.seconds <= 0.0 {
                return 0.0;
            }
            return (rel.from_gain * (1.0 - t / rel.seconds)).max(0.0);
        }
        let t = now.saturating_sub(self.started_at).as_secs_f32();
        let sustain_gain = self.peak * self.params.sustain;
        if t < self.params.attack {
            self.peak * (t / self.params.attack)
        } else if t < self.params.attack + self.params.decay {
            let progress = (t - self.params.attack) / self.params.decay;
            self.peak - progress * (self.peak - sustain_gain)
        } else {
            sustain_gain
        }
    }

    /// Begin the release ramp from the current gain
    pub fn note_off(&mut self, now: Duration) {
        if self.release.is_none() {
            self.release = Some(ReleaseState {
                at: now,
                from_gain: self.gain_at(now),
                seconds: self.params.release,
            });
        }
    }

    /// Short fade used when the voice is displaced or force-stopped
    pub fn fast_release(&mut self, now: Duration) {
        self.release = Some(ReleaseState {
            at: now,
            from_gain: self.gain_at(now),
            seconds: FAST_RELEASE_SECS,
        });
    }

    pub fn is_releasing(&self) -> bool {
        self.release.is_some()
    }

    /// True once the release ramp has run its course
    pub fn is_finished(&self, now: Duration) -> bool {
        match self.release {
            Some(rel) => now.saturating_sub(rel.at).as_secs_f32() >= rel.seconds,
            None => false,
        }
    }
}

/// Owns every currently-sounding voice, keyed by `(lane, midi)`.
///
/// Mutated only inside the scheduler's tick and the explicit stop/pedal
/// calls; the UI sees read-only snapshots.
#[derive(Debug, Default)]
pub struct VoicePool {
    voices: HashMap<VoiceKey, Voice>,
}

impl VoicePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a voice, returning the displaced one for the same key (the
    /// caller fast-fades it to avoid overlapping envelopes)
    pub fn start(&mut self, voice: Voice) -> Option<Voice> {
        self.voices.insert(voice.key(), voice)
    }

    pub fn get_mut(&mut self, key: &VoiceKey) -> Option<&mut Voice> {
        self.voices.get_mut(key)
    }

    pub fn take(&mut self, key: &VoiceKey) -> Option<Voice> {
        self.voices.remove(key)
    }

    pub fn keys(&self) -> Vec<VoiceKey> {
        self.voices.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Remove and return voices whose release completed
    pub fn reap(&mut self, now: Duration) -> Vec<Voice> {
        let done: Vec<VoiceKey> = self
            .voices
            .iter()
            .filter(|(_, v)| v.is_finished(now))
            .map(|(k, _)| *k)
            .collect();
        done.into_iter()
            .filter_map(|k| self.voices.remove(&k))
            .collect()
    }

    /// Remove and return every voice (transport stop)
    pub fn drain(&mut self) -> Vec<Voice> {
        self.voices.drain().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn voice(now: Duration) -> Voice {
        Voice::new(
            Lane::Track(TrackId(1)),
            60,
            VoiceHandle(1),
            7,
            1.0,
            EnvelopeParams::new(0.01, 0.1, 0.5, 0.2),
            now,
        )
    }

    #[test]
    fn test_velocity_curves() {
        assert_eq!(VelocityCurve::Hard.gain(127), 1.0);
        assert!((VelocityCurve::Hard.gain(64) - 0.2539).abs() < 0.001);
        assert!((VelocityCurve::Soft.gain(64) - 0.7099).abs() < 0.001);
        assert!((VelocityCurve::Linear.gain(64) - 0.5039).abs() < 0.001);
        // out-of-range velocities clamp rather than error
        assert_eq!(VelocityCurve::Linear.gain(0), VelocityCurve::Linear.gain(1));
    }

    #[test]
    fn test_stage_progression() {
        let v = voice(Duration::ZERO);
        assert_eq!(v.stage(5 * MS), VoiceStage::Attack);
        assert_eq!(v.stage(50 * MS), VoiceStage::Decay);
        assert_eq!(v.stage(200 * MS), VoiceStage::Sustain);
    }

    #[test]
    fn test_gain_shape() {
        let v = voice(Duration::ZERO);
        // halfway through a 10ms attack
        assert!((v.gain_at(5 * MS) - 0.5).abs() < 0.01);
        // peak at attack end
        assert!((v.gain_at(10 * MS) - 1.0).abs() < 0.01);
        // settled on sustain
        assert!((v.gain_at(500 * MS) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_release_ramps_to_zero() {
        let mut v = voice(Duration::ZERO);
        v.note_off(500 * MS);
        assert_eq!(v.stage(500 * MS), VoiceStage::Release);
        assert!((v.gain_at(600 * MS) - 0.25).abs() < 0.01); // halfway through 200ms release
        assert!(!v.is_finished(600 * MS));
        assert_eq!(v.gain_at(700 * MS), 0.0);
        assert!(v.is_finished(700 * MS));
    }

    #[test]
    fn test_note_off_during_attack_releases_from_current_gain() {
        let mut v = voice(Duration::ZERO);
        v.note_off(5 * MS);
        let g = v.gain_at(5 * MS);
        assert!(g < 0.6);
        assert!(v.gain_at(6 * MS) < g);
    }

    #[test]
    fn test_pool_displaces_same_key() {
        let mut pool = VoicePool::new();
        assert!(pool.start(voice(Duration::ZERO)).is_none());
        let old = pool.start(voice(100 * MS)).unwrap();
        assert_eq!(old.key(), (Lane::Track(TrackId(1)), 60));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pool_reaps_finished() {
        let mut pool = VoicePool::new();
        let mut v = voice(Duration::ZERO);
        v.fast_release(100 * MS);
        pool.start(v);
        assert!(pool.reap(100 * MS).is_empty());
        let reaped = pool.reap(200 * MS);
        assert_eq!(reaped.len(), 1);
        assert!(pool.is_empty());
    }
}
