//! Sample catalog queried when a note resolves to a concrete sample

use cadenza_core::SampleFilter;
use tracing::debug;

/// Reference to one loaded sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRef {
    pub id: u64,
    pub name: String,
    /// MIDI note the sample was recorded at
    pub root_midi: u8,
}

impl SampleRef {
    pub fn new(id: u64, name: impl Into<String>, root_midi: u8) -> Self {
        Self {
            id,
            name: name.into(),
            root_midi,
        }
    }
}

/// Read-only catalog of available samples.
///
/// Owned by an external collaborator; the engine only queries it. An empty
/// result is not an error, the caller skips the note.
pub trait SampleIndex {
    /// All samples matching the filter, in registration order
    fn lookup(&self, filter: &SampleFilter) -> Vec<SampleRef>;
}

struct Entry {
    category: String,
    articulation: Option<String>,
    mic: Option<String>,
    sample: SampleRef,
}

/// In-memory `SampleIndex`.
///
/// Registration order is lookup order; rotation determinism depends on it.
#[derive(Default)]
pub struct MemorySampleIndex {
    entries: Vec<Entry>,
}

impl MemorySampleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        category: impl Into<String>,
        articulation: Option<&str>,
        mic: Option<&str>,
        sample: SampleRef,
    ) {
        let category = category.into();
        debug!("Registered sample '{}' in {} (root {})", sample.name, category, sample.root_midi);
        self.entries.push(Entry {
            category,
            articulation: articulation.map(str::to_string),
            mic: mic.map(str::to_string),
            sample,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SampleIndex for MemorySampleIndex {
    fn lookup(&self, filter: &SampleFilter) -> Vec<SampleRef> {
        self.entries
            .iter()
            .filter(|e| e.category == filter.category)
            .filter(|e| match &filter.articulation {
                Some(a) => e.articulation.as_deref() == Some(a),
                None => true,
            })
            .filter(|e| match &filter.mic {
                Some(m) => e.mic.as_deref() == Some(m),
                None => true,
            })
            .map(|e| e.sample.clone())
            .collect()
    }
}
