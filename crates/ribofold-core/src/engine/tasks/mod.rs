//! Computational passes over the decomposition grammar.
//!
//! Each task performs one pass of a fold: filling the minimum free energy
//! or partition function matrices, backtracking, the outside pass that
//! yields pair probabilities, suboptimal enumeration, stochastic sampling,
//! and loop-by-loop evaluation of a given structure. Tasks are stateless;
//! the fold compound owns their inputs and caches their outputs.

pub mod backtrack;
pub mod eval;
pub mod mfe;
pub mod partition;
pub mod probabilities;
pub mod stochastic;
pub mod subopt;

#[cfg(test)]
pub(crate) mod testing;
