//! # ribofold
//!
//! A constrained dynamic-programming engine for RNA secondary structure
//! prediction: minimum free energy folding, partition function and base-pair
//! probabilities, suboptimal enumeration, stochastic sampling and consensus
//! folding of alignments.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Sequence`,
//!   `Alignment`, `SecondaryStructure`), the temperature-scaled
//!   `EnergyModel`, and the hard and soft constraint engines.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It owns the DP
//!   matrix arena, the loop scorers, the decomposition grammar every pass
//!   shares, and the `FoldCompound` that binds one sequence or alignment to
//!   a model and a constraint set.
//!
//! - **[`workflows`]: The Public API.** One-call pipelines that tie `engine`
//!   and `core` together with progress reporting, such as folding a single
//!   sequence or computing an alignment consensus.

pub mod core;
pub mod engine;
pub mod workflows;
