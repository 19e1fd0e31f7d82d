//! Error types for cadenza

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenzaError {
    #[error("Steps count {0} outside supported range 4..=64")]
    StepsOutOfRange(usize),
    #[error("Grid length mismatch for {name}: expected {expected}, found {found}")]
    GridMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, CadenzaError>;
