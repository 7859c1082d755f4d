//! # Constraints
//!
//! Hard and soft constraints on the structure space.
//!
//! - [`context`] defines the loop contexts a pair or unpaired base may
//!   belong to.
//! - [`hard`] stores which pairs may form in which context and which bases
//!   may stay unpaired, optionally narrowed by a user-supplied
//!   [`HardConstraint`]; every engine consults it before considering a
//!   decomposition.
//! - [`soft`] adds pseudo-energies to pairs and unpaired bases, either from
//!   a table or from a user-supplied [`SoftConstraint`].
//! - [`commands`] parses the pseudo dot-bracket constraint notation and
//!   constraint command files into [`Command`]s.

pub mod commands;
pub mod context;
pub mod hard;
pub mod soft;

pub use commands::{Command, PairDirection, parse_command_file, parse_structure_constraint};
pub use context::LoopContext;
pub use hard::{HardConstraint, HardConstraints, PositionState};
pub use soft::{MAX_PSEUDO_ENERGY, PseudoEnergies, SoftConstraint, SoftLayer};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConstraintError {
    #[error("Constraint conflict: {0}")]
    Conflict(String),

    #[error("Position {position} is outside the sequence of length {length}")]
    OutOfRange { position: usize, length: usize },

    #[error("Invalid pair ({i}, {j}): expected i < j")]
    InvalidPair { i: usize, j: usize },

    #[error("Constraint string has length {found}, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Unknown constraint symbol '{symbol}' at position {position}")]
    UnknownSymbol { symbol: char, position: usize },

    #[error("Unbalanced bracket at position {position}")]
    Unbalanced { position: usize },

    #[error("Command file line {line}: {message}")]
    Command { line: usize, message: String },

    #[error("Pseudo-energy of {energy} dcal/mol exceeds the limit of ±{limit} dcal/mol")]
    PseudoEnergyOutOfRange { energy: i32, limit: i32 },
}
