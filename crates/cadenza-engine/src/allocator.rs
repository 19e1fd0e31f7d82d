//! Voice allocation: resolve a note event to a concrete sample

use cadenza_core::{RotationMode, SampleFilter};

use crate::round_robin::RotationCursors;
use crate::sample_index::{SampleIndex, SampleRef};

/// Picks a concrete sample for a firing note, honoring the track's rotation
/// mode. Owns the rotation cursors and the runtime RNG.
pub struct VoiceAllocator {
    cursors: RotationCursors,
    rng: fastrand::Rng,
}

impl Default for VoiceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceAllocator {
    pub fn new() -> Self {
        Self {
            cursors: RotationCursors::new(),
            rng: fastrand::Rng::new(),
        }
    }

    /// Seeded RNG for reproducible `Random` rotation in tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            cursors: RotationCursors::new(),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Resolve the filter to one sample, or `None` when nothing matches.
    ///
    /// `Cycle` walks the candidate list in registration order and advances the
    /// cursor; `Random` picks uniformly without touching the cursor; `Off`
    /// picks the candidate whose root is closest to `midi`, ties broken by the
    /// lowest root.
    pub fn resolve(
        &mut self,
        index: &dyn SampleIndex,
        filter: &SampleFilter,
        mode: RotationMode,
        midi: u8,
    ) -> Option<SampleRef> {
        if filter.is_empty() {
            return None;
        }
        let mut samples = index.lookup(filter);
        if samples.is_empty() {
            return None;
        }
        let picked = match mode {
            RotationMode::Cycle => self.cursors.advance(&filter.key(), samples.len()),
            RotationMode::Random => self.rng.usize(..samples.len()),
            RotationMode::Off => samples
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| ((s.root_midi as i16 - midi as i16).abs(), s.root_midi))
                .map(|(i, _)| i)?,
        };
        Some(samples.swap_remove(picked))
    }

    /// Clear all rotation cursors (e.g. at a bar boundary)
    pub fn reset_rotation(&mut self) {
        self.cursors.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_index::MemorySampleIndex;

    fn index() -> MemorySampleIndex {
        let mut idx = MemorySampleIndex::new();
        idx.register("Keys", None, None, SampleRef::new(0, "rr1", 60));
        idx.register("Keys", None, None, SampleRef::new(1, "rr2", 60));
        idx.register("Keys", None, None, SampleRef::new(2, "rr3", 60));
        idx
    }

    #[test]
    fn test_cycle_is_deterministic() {
        let idx = index();
        let mut alloc = VoiceAllocator::new();
        let filter = SampleFilter::new("Keys");
        // k-th call returns samples[(k-1) % n]
        for k in 1..=7u64 {
            let s = alloc.resolve(&idx, &filter, RotationMode::Cycle, 60).unwrap();
            assert_eq!(s.id, (k - 1) % 3);
        }
    }

    #[test]
    fn test_cycle_reset() {
        let idx = index();
        let mut alloc = VoiceAllocator::new();
        let filter = SampleFilter::new("Keys");
        alloc.resolve(&idx, &filter, RotationMode::Cycle, 60);
        alloc.resolve(&idx, &filter, RotationMode::Cycle, 60);
        alloc.reset_rotation();
        let s = alloc.resolve(&idx, &filter, RotationMode::Cycle, 60).unwrap();
        assert_eq!(s.id, 0);
    }

    #[test]
    fn test_random_stays_in_pool_and_keeps_cursor() {
        let idx = index();
        let mut alloc = VoiceAllocator::with_seed(7);
        let filter = SampleFilter::new("Keys");
        for _ in 0..16 {
            let s = alloc.resolve(&idx, &filter, RotationMode::Random, 60).unwrap();
            assert!(s.id < 3);
        }
        // cursor untouched by Random: first Cycle call still starts at 0
        let s = alloc.resolve(&idx, &filter, RotationMode::Cycle, 60).unwrap();
        assert_eq!(s.id, 0);
    }

    #[test]
    fn test_off_picks_nearest_root() {
        let mut idx = MemorySampleIndex::new();
        idx.register("Keys", None, None, SampleRef::new(0, "c3", 48));
        idx.register("Keys", None, None, SampleRef::new(1, "c4", 60));
        idx.register("Keys", None, None, SampleRef::new(2, "c5", 72));
        let mut alloc = VoiceAllocator::new();
        let filter = SampleFilter::new("Keys");

        let s = alloc.resolve(&idx, &filter, RotationMode::Off, 62).unwrap();
        assert_eq!(s.id, 1);
        // equidistant between 48 and 60: lowest root wins
        let s = alloc.resolve(&idx, &filter, RotationMode::Off, 54).unwrap();
        assert_eq!(s.id, 0);
    }

    #[test]
    fn test_empty_filter_and_miss_return_none() {
        let idx = index();
        let mut alloc = VoiceAllocator::new();
        assert!(alloc
            .resolve(&idx, &SampleFilter::default(), RotationMode::Cycle, 60)
            .is_none());
        assert!(alloc
            .resolve(&idx, &SampleFilter::new("Brass"), RotationMode::Cycle, 60)
            .is_none());
    }
}
