use super::partition::candidate_weight;
use crate::core::structure::{BasePair, SecondaryStructure};
use crate::engine::error::FoldError;
use crate::engine::grammar::{Candidate, Cell, Grammar};
use crate::engine::matrices::PfMatrices;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use tracing::{error, instrument, trace};

/// Draws one structure from the Boltzmann ensemble described by `inside`.
///
/// Each cell is expanded by picking a decomposition with probability
/// proportional to its weight.
#[instrument(level = "trace", skip_all, name = "stochastic_task", fields(n = grammar.len()))]
pub fn run<R>(grammar: &Grammar, inside: &PfMatrices, rng: &mut R) -> Result<SecondaryStructure, FoldError>
where
    R: Rng + ?Sized,
{
    let n = grammar.len();
    let mut pairs = Vec::new();
    let mut stack = vec![Cell::exterior(n)];
    let mut options: Vec<(Candidate, f64)> = Vec::new();

    while let Some(cell) = stack.pop() {
        if cell.is_terminal() {
            continue;
        }
        if cell.is_pair() {
            pairs.push(BasePair { i: cell.i, j: cell.j });
        }

        options.clear();
        grammar.enumerate(cell, &mut |candidate| {
            let weight = candidate_weight(grammar, inside, cell, &candidate, |c| inside.value(c));
            if weight > 0.0 {
                options.push((candidate, weight));
            }
        });

        if options.iter().any(|(_, w)| !w.is_finite()) {
            error!(?cell, "Cell has a non-finite decomposition weight.");
            return Err(FoldError::Internal(format!(
                "non-finite weight in {:?} ({}, {})",
                cell.nt, cell.i, cell.j
            )));
        }
        let dist = WeightedIndex::new(options.iter().map(|(_, w)| *w)).map_err(|e| {
            error!(?cell, error = %e, "Cell has no weight to sample from.");
            FoldError::Internal(format!("cannot sample {:?} ({}, {}): {e}", cell.nt, cell.i, cell.j))
        })?;
        let chosen = options[dist.sample(rng)].0;
        trace!(?cell, decomposition = ?chosen.decomposition, "Sampled decomposition.");
        stack.extend(grammar.children(cell, &chosen).into_iter().flatten());
    }

    SecondaryStructure::from_pairs(n, pairs)
        .map_err(|e| FoldError::Internal(format!("sampled pairs are inconsistent: {e}")))
}
