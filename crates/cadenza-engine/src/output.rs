//! Output graph seam: the audio backend the engine triggers voices on

use crate::sample_index::SampleRef;
use crate::voice::EnvelopeParams;

/// Opaque handle to a sounding voice in the output graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle(pub u64);

/// Everything the graph needs to shape a triggered voice
#[derive(Debug, Clone, Copy)]
pub struct TriggerParams {
    /// Envelope peak after the velocity curve and track gain
    pub peak: f32,
    pub pan: f32,
    pub envelope: EnvelopeParams,
}

/// Audio output surface.
///
/// Opaque to the engine: start/stop semantics plus gain ramping are all it
/// relies on. Rendering happens elsewhere.
pub trait OutputGraph {
    /// Start a voice playing `sample` at `midi`, returning its handle
    fn trigger(&mut self, sample: &SampleRef, midi: u8, params: &TriggerParams) -> VoiceHandle;
    /// Ramp the voice's gain to zero over `seconds`
    fn release(&mut self, handle: VoiceHandle, seconds: f32);
    /// Reclaim a voice whose release has completed
    fn stop(&mut self, handle: VoiceHandle);
}

/// No-op graph for headless use and tests
#[derive(Debug, Default)]
pub struct NullGraph {
    next: u64,
}

impl NullGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputGraph for NullGraph {
    fn trigger(&mut self, _sample: &SampleRef, _midi: u8, _params: &TriggerParams) -> VoiceHandle {
        let handle = VoiceHandle(self.next);
        self.next += 1;
        handle
    }

    fn release(&mut self, _handle: VoiceHandle, _seconds: f32) {}

    fn stop(&mut self, _handle: VoiceHandle) {}
}
