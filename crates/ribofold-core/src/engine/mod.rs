//! # Engine Module
//!
//! The dynamic-programming machinery behind every fold.
//!
//! ## Overview
//!
//! A [`compound::FoldCompound`] binds a sequence or alignment to an energy
//! model and a constraint set and fills matrices on demand. All passes walk
//! the same decomposition [`grammar`]: a cell is split into candidates whose
//! local energies come from a [`scorer`], gated by hard constraints and
//! biased by soft ones. Minimisation, summation, outside propagation,
//! enumeration and sampling are folds over that candidate stream, so the
//! engines agree on the structure space by construction.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Fold options loaded from TOML or built in code
//! - **Matrices** ([`matrices`]) - Banded triangular arenas for MFE, partition function and probabilities
//! - **Scoring** ([`scorer`]) - Loop energies for single sequences and alignments
//! - **Results** ([`state`]) - Result types returned by the fold operations
//! - **Progress Monitoring** ([`progress`]) - Phase and fill progress callbacks
//! - **Error Handling** ([`error`]) - The error taxonomy of folding

pub mod compound;
pub mod config;
pub(crate) mod context;
pub mod error;
pub mod grammar;
pub mod matrices;
pub mod progress;
pub mod scorer;
pub mod state;
pub(crate) mod tasks;
