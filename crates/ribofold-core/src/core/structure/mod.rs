//! Secondary-structure representation: base pairs, partner tables and the
//! dot-bracket notation.

pub mod pair_table;

pub use pair_table::{BasePair, SecondaryStructure};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StructureError {
    #[error("Unbalanced closing bracket at position {position}")]
    UnbalancedClose { position: usize },

    #[error("Opening bracket at position {position} is never closed")]
    UnclosedOpen { position: usize },

    #[error("Invalid structure symbol '{symbol}' at position {position}")]
    InvalidSymbol { symbol: char, position: usize },

    #[error("Pair ({i}, {j}) is outside a structure of length {len}")]
    PairOutOfRange { i: usize, j: usize, len: usize },

    #[error("Pair ({i}, {j}) reuses an already paired position")]
    SharedPosition { i: usize, j: usize },

    #[error("Pairs {first} and {second} cross")]
    Crossing { first: BasePair, second: BasePair },

    #[error("Structure has length {found}, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Pair ({i}, {j}) encloses fewer unpaired bases than the minimum hairpin")]
    HairpinTooSmall { i: usize, j: usize },
}
