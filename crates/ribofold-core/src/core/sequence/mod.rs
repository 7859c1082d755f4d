//! Nucleotide alphabet, single sequences and gapped alignments.
//!
//! Every position is 1-based and every encoded array carries sentinels at
//! both ends, matching the indexing used by the energy model and the
//! dynamic-programming engines.

pub mod alignment;
pub mod alphabet;
#[allow(clippy::module_inception)]
pub mod sequence;

pub use alignment::{AlignedRow, Alignment};
pub use alphabet::{Base, BaseCode, PairType};
pub use sequence::Sequence;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SequenceError {
    #[error("Sequence is empty")]
    Empty,

    #[error("Invalid symbol '{symbol}' at position {position}")]
    InvalidSymbol { symbol: char, position: usize },

    #[error("Invalid symbol '{symbol}' in alignment row {row}, column {column}")]
    InvalidAlignmentSymbol {
        symbol: char,
        row: usize,
        column: usize,
    },

    #[error("Alignment contains no rows")]
    EmptyAlignment,

    #[error("Alignment row {row} has {found} columns, expected {expected}")]
    RaggedAlignment {
        row: usize,
        expected: usize,
        found: usize,
    },
}
