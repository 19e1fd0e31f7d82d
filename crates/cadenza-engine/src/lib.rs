//! cadenza-engine: Runtime for the cadenza sequencer
//!
//! Drives the musical clock, resolves firing notes to concrete samples and
//! owns the per-note envelope voices. Domain types live in `cadenza-core`;
//! audio rendering is behind the `OutputGraph` seam.

mod allocator;
mod clock;
pub mod driver;
mod output;
mod round_robin;
mod sample_index;
mod scheduler;
mod sustain;
mod voice;

pub use allocator::VoiceAllocator;
pub use clock::{Clock, SystemClock, VirtualClock};
pub use driver::Command;
pub use output::{NullGraph, OutputGraph, TriggerParams, VoiceHandle};
pub use round_robin::RotationCursors;
pub use sample_index::{MemorySampleIndex, SampleIndex, SampleRef};
pub use scheduler::{NowPlaying, TransportError, TransportScheduler, TransportState};
pub use sustain::SustainController;
pub use voice::{
    EnvelopeParams, Lane, VelocityCurve, Voice, VoiceKey, VoicePool, VoiceStage,
    FAST_RELEASE_SECS,
};
