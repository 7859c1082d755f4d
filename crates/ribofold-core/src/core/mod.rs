//! # Core Module
//!
//! Stateless building blocks shared by every fold.
//!
//! - **Sequences** ([`sequence`]) - Nucleotide alphabet, pair types, single
//!   sequences and gapped alignments.
//! - **Structures** ([`structure`]) - Pseudoknot-free secondary structures
//!   with dot-bracket conversion.
//! - **Energetics** ([`energy`]) - Raw free energy parameters and the
//!   temperature-scaled loop energy model.
//! - **Constraints** ([`constraints`]) - Hard and soft constraints and their
//!   textual notations.

pub mod constraints;
pub mod energy;
pub mod sequence;
pub mod structure;
