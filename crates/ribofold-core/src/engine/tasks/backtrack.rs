use super::mfe::candidate_total;
use crate::core::energy::INF;
use crate::core::structure::{BasePair, SecondaryStructure};
use crate::engine::error::FoldError;
use crate::engine::grammar::{Cell, Grammar};
use crate::engine::matrices::MfeMatrices;
use tracing::{error, instrument};

/// Recovers one minimum free energy structure from filled matrices.
///
/// At every cell the first candidate (in grammar order) whose total equals
/// the stored optimum is followed, which makes the result deterministic.
#[instrument(skip_all, name = "mfe_backtrack_task", fields(mfe = matrices.mfe()))]
pub fn run(grammar: &Grammar, matrices: &MfeMatrices) -> Result<SecondaryStructure, FoldError> {
    let n = grammar.len();
    if matrices.mfe() >= INF {
        return Err(FoldError::ConstraintConflict(
            "no structure satisfies the hard constraints".to_string(),
        ));
    }

    let mut pairs = Vec::new();
    let mut stack = vec![Cell::exterior(n)];

    while let Some(cell) = stack.pop() {
        if cell.is_terminal() {
            continue;
        }
        if cell.is_pair() {
            pairs.push(BasePair { i: cell.i, j: cell.j });
        }

        let target = matrices.value(cell);
        let mut chosen = None;
        grammar.enumerate(cell, &mut |candidate| {
            if chosen.is_none()
                && candidate_total(grammar, cell, &candidate, |c| matrices.value(c)) == Some(target)
            {
                chosen = Some(candidate);
            }
        });

        let Some(candidate) = chosen else {
            error!(?cell, target, "No decomposition reproduces the stored optimum.");
            return Err(FoldError::Internal(format!(
                "backtracking failed at {:?} ({}, {})",
                cell.nt, cell.i, cell.j
            )));
        };
        stack.extend(grammar.children(cell, &candidate).into_iter().flatten());
    }

    SecondaryStructure::from_pairs(n, pairs)
        .map_err(|e| FoldError::Internal(format!("backtracked pairs are inconsistent: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tasks::eval;
    use crate::engine::tasks::mfe;
    use crate::engine::tasks::testing::Setup;

    #[test]
    fn recovers_hairpin_helix() {
        let setup = Setup::sequence("GGGAAACCC", false);
        let matrices = mfe::run(&setup.context());
        let structure = run(&setup.grammar(), &matrices).unwrap();
        assert_eq!(structure.to_dot_bracket(), "(((...)))");
    }

    #[test]
    fn open_chain_backtracks_to_no_pairs() {
        let setup = Setup::sequence("AAAAAAAAAA", false);
        let matrices = mfe::run(&setup.context());
        let structure = run(&setup.grammar(), &matrices).unwrap();
        assert_eq!(structure.pair_count(), 0);
    }

    #[test]
    fn backtracked_structure_evaluates_to_the_optimum() {
        for seq in ["GAGGAAACCAGGAAACCAUC", "GGGGAAAACCCCAUGGGAAACCCA", "ACGUACGUUCGAAAGCGAUC"] {
            for no_lp in [false, true] {
                let setup = Setup::sequence(seq, no_lp);
                let matrices = mfe::run(&setup.context());
                let structure = run(&setup.grammar(), &matrices).unwrap();
                let energy = eval::run(&setup.scorer, &structure).unwrap().total();
                assert_eq!(energy, matrices.mfe(), "{seq} no_lp={no_lp}");
            }
        }
    }

    #[test]
    fn infeasible_fill_is_reported_as_conflict() {
        let mut setup = Setup::sequence("GGGAAACCC", false);
        // Position 5 is an adenine with no uracil to pair with.
        setup.hc.force_paired(5).unwrap();
        let matrices = mfe::run(&setup.context());
        assert!(matches!(
            run(&setup.grammar(), &matrices),
            Err(FoldError::ConstraintConflict(_))
        ));
    }
}
