//! Per-filter-key rotation cursors for round-robin sample selection

use std::collections::HashMap;

/// Rotation cursors keyed by sample-filter key.
///
/// Cursors persist for the life of the session unless explicitly reset.
#[derive(Debug, Default)]
pub struct RotationCursors {
    cursors: HashMap<String, usize>,
}

impl RotationCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index to use for a pool of `len` candidates, then advance.
    ///
    /// The first call for a key yields 0; the k-th call yields `(k-1) % len`.
    pub fn advance(&mut self, key: &str, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let cursor = self.cursors.entry(key.to_string()).or_insert(0);
        let idx = *cursor % len;
        *cursor = idx + 1;
        idx
    }

    pub fn reset(&mut self) {
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_cycles() {
        let mut rr = RotationCursors::new();
        let got: Vec<usize> = (0..7).map(|_| rr.advance("k", 3)).collect();
        assert_eq!(got, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut rr = RotationCursors::new();
        assert_eq!(rr.advance("a", 4), 0);
        assert_eq!(rr.advance("b", 4), 0);
        assert_eq!(rr.advance("a", 4), 1);
        assert_eq!(rr.advance("b", 4), 1);
    }

    #[test]
    fn test_reset() {
        let mut rr = RotationCursors::new();
        rr.advance("k", 2);
        rr.advance("k", 2);
        rr.reset();
        assert_eq!(rr.advance("k", 2), 0);
    }

    #[test]
    fn test_shrinking_pool_stays_in_bounds() {
        let mut rr = RotationCursors::new();
        for _ in 0..5 {
            rr.advance("k", 5);
        }
        assert!(rr.advance("k", 2) < 2);
    }
}
