use crate::core::energy::TURN;
use crate::core::structure::{SecondaryStructure, StructureError};
use crate::engine::error::FoldError;
use crate::engine::scorer::{LoopScorer, Scorer};
use tracing::{instrument, trace};

/// Energy of a structure split into its thermodynamic and covariation
/// parts, both in dcal/mol summed over all sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergySplit {
    pub free_energy: i32,
    pub covariance: i32,
}

impl EnergySplit {
    pub fn total(&self) -> i32 {
        self.free_energy + self.covariance
    }
}

/// Evaluates `structure` loop by loop with the same scorer the engines
/// use. Soft constraints are not applied.
#[instrument(skip_all, name = "eval_task", fields(pairs = structure.pair_count()))]
pub fn run(scorer: &Scorer, structure: &SecondaryStructure) -> Result<EnergySplit, FoldError> {
    if structure.len() != scorer.len() {
        return Err(StructureError::LengthMismatch {
            expected: scorer.len(),
            found: structure.len(),
        }
        .into());
    }

    let mut free_energy: i32 = structure
        .branches(None)
        .iter()
        .map(|p| scorer.ext_stem(p.i, p.j))
        .sum();
    let mut covariance = 0;

    for pair in structure.pairs() {
        let (i, j) = (pair.i, pair.j);
        if j - i - 1 < TURN {
            return Err(StructureError::HairpinTooSmall { i, j }.into());
        }
        covariance += scorer.pair_bonus(i, j);

        let inner = structure.branches(Some(pair));
        let energy = match inner.as_slice() {
            [] => scorer.hairpin(i, j),
            [single] => scorer.interior(i, j, single.i, single.j),
            branches => {
                let covered: usize = branches.iter().map(|b| b.j - b.i + 1).sum();
                let unpaired = (j - i - 1 - covered) as i32;
                scorer.ml_closing(i, j)
                    + branches.iter().map(|b| scorer.ml_stem(b.i, b.j)).sum::<i32>()
                    + scorer.ml_unpaired() * unpaired
            }
        };
        trace!(i, j, energy, "Loop energy.");
        free_energy += energy;
    }

    Ok(EnergySplit {
        free_energy,
        covariance,
    })
}
