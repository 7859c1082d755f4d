//! # Workflows Module
//!
//! One-call pipelines over a [`FoldCompound`](crate::engine::compound::FoldCompound).
//!
//! - **Single-sequence folding** ([`fold`]) - Minimum free energy structure,
//!   ensemble free energy, pair probabilities and centroid.
//! - **Consensus folding** ([`alifold`]) - Consensus structure of an
//!   alignment with its energy split into free energy and covariation.

pub mod alifold;
pub mod fold;
