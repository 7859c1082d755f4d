use crate::core::energy::{TURN, boltzmann};
use crate::engine::context::FoldContext;
use crate::engine::error::FoldError;
use crate::engine::grammar::{Cell, Grammar, Nonterminal};
use crate::engine::matrices::{DpMatrix, PfMatrices, ProbabilityMatrix};
use crate::engine::progress::Progress;
use tracing::{debug, error, instrument};

/// Outside weights, scaled so that `outside * inside` of a cell has the
/// same scale as the ensemble total.
struct Outside {
    pair: DpMatrix<f64>,
    stem: Option<DpMatrix<f64>>,
    multi: DpMatrix<f64>,
    multi_one: DpMatrix<f64>,
    exterior: Vec<f64>,
}

impl Outside {
    fn new(n: usize, span: usize, no_lp: bool) -> Self {
        let matrix = || DpMatrix::new(n, span, 0.0, 0.0);
        let mut exterior = vec![0.0; n + 1];
        exterior[n] = 1.0;
        Self {
            pair: matrix(),
            stem: no_lp.then(matrix),
            multi: matrix(),
            multi_one: matrix(),
            exterior,
        }
    }

    fn get(&self, cell: Cell) -> f64 {
        match cell.nt {
            Nonterminal::Pair => self.pair.get(cell.i, cell.j),
            Nonterminal::Stem => self.stem.as_ref().unwrap_or(&self.pair).get(cell.i, cell.j),
            Nonterminal::Multi => self.multi.get(cell.i, cell.j),
            Nonterminal::MultiOne => self.multi_one.get(cell.i, cell.j),
            Nonterminal::Exterior => self.exterior.get(cell.j).copied().unwrap_or(0.0),
        }
    }

    fn add(&mut self, cell: Cell, weight: f64) {
        let (i, j) = (cell.i, cell.j);
        let matrix = match cell.nt {
            Nonterminal::Pair => &mut self.pair,
            Nonterminal::Stem => match self.stem.as_mut() {
                Some(stem) => stem,
                None => &mut self.pair,
            },
            Nonterminal::Multi => &mut self.multi,
            Nonterminal::MultiOne => &mut self.multi_one,
            Nonterminal::Exterior => {
                if let Some(slot) = self.exterior.get_mut(j) {
                    *slot += weight;
                }
                return;
            }
        };
        let current = matrix.get(i, j);
        matrix.set(i, j, current + weight);
    }
}

/// Pushes the outside weight of `cell` down to its children.
fn propagate(grammar: &Grammar, inside: &PfMatrices, outside: &mut Outside, cell: Cell) {
    let weight = outside.get(cell);
    if weight == 0.0 {
        return;
    }
    grammar.enumerate(cell, &mut |candidate| {
        let base = weight * boltzmann(candidate.energy, inside.kt) * inside.scale[candidate.consumed];
        if base == 0.0 {
            return;
        }
        match grammar.children(cell, &candidate) {
            [Some(a), Some(b)] => {
                outside.add(a, base * inside.value(b));
                outside.add(b, base * inside.value(a));
            }
            [Some(a), None] | [None, Some(a)] => outside.add(a, base),
            [None, None] => {}
        }
    });
}

/// Base-pair probabilities from a filled partition function.
#[instrument(skip_all, name = "probabilities_task", fields(n = context.grammar.len()))]
pub fn run(context: &FoldContext, inside: &PfMatrices) -> Result<ProbabilityMatrix, FoldError> {
    let grammar = &context.grammar;
    let n = grammar.len();
    let span = grammar.span();
    let no_lp = grammar.no_lp();
    context.reporter.report(Progress::PhaseStart {
        name: "Pair probabilities",
    });

    let mut outside = Outside::new(n, span, no_lp);
    for j in (1..=n).rev() {
        propagate(grammar, inside, &mut outside, Cell::exterior(j));
    }

    context.reporter.report(Progress::FillStart {
        diagonals: context.diagonals(),
    });
    for d in ((TURN + 1)..=span).rev() {
        for i in 1..=(n - d) {
            let j = i + d;
            propagate(grammar, inside, &mut outside, Cell::new(Nonterminal::Multi, i, j));
            propagate(grammar, inside, &mut outside, Cell::new(Nonterminal::MultiOne, i, j));
            if no_lp {
                propagate(grammar, inside, &mut outside, Cell::new(Nonterminal::Stem, i, j));
            }
            propagate(grammar, inside, &mut outside, Cell::new(Nonterminal::Pair, i, j));
        }
        context.reporter.report(Progress::DiagonalDone);
    }
    context.reporter.report(Progress::FillFinish);

    let total = inside.total();
    let mut probabilities = ProbabilityMatrix::new(n, span);
    for i in 1..=n {
        for j in (i + TURN + 1)..=(i + span).min(n) {
            let mut joint = outside.get(Cell::new(Nonterminal::Pair, i, j))
                * inside.value(Cell::new(Nonterminal::Pair, i, j));
            if no_lp {
                joint += outside.get(Cell::new(Nonterminal::Stem, i, j))
                    * inside.value(Cell::new(Nonterminal::Stem, i, j));
            }
            let p = joint / total;
            if !p.is_finite() {
                error!(i, j, joint, total, "Non-finite pair probability.");
                return Err(FoldError::NumericOverflow { attempts: 0 });
            }
            if p > 0.0 {
                probabilities.set(i, j, p.min(1.0));
            }
        }
    }

    debug!(
        pairs = probabilities.pairs_above(0.0).len(),
        "Pair probabilities computed."
    );
    context.reporter.report(Progress::PhaseFinish);
    Ok(probabilities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::LoopContext;
    use crate::core::structure::BasePair;
    use crate::engine::scorer::LoopScorer;
    use crate::engine::tasks::testing::{Setup, brute_force_ensemble};
    use crate::engine::tasks::{mfe, partition};

    fn probabilities(setup: &Setup) -> ProbabilityMatrix {
        let context = setup.context();
        let mfe = mfe::run(&context).mfe();
        let inside = partition::run(&context, mfe).unwrap();
        run(&context, &inside).unwrap()
    }

    #[test]
    fn matches_exhaustive_probabilities() {
        for seq in ["GGGAAACCC", "GAGGAAACCAGGAAACCAUC", "ACGUACGUUCGAAAGCGAUC"] {
            for no_lp in [false, true] {
                let setup = Setup::sequence(seq, no_lp);
                let (_, expected) = brute_force_ensemble(&setup);
                let probs = probabilities(&setup);
                let n = setup.scorer.len();
                for i in 1..=n {
                    for j in (i + 1)..=n {
                        let want = expected.get(&BasePair { i, j }).copied().unwrap_or(0.0);
                        let got = probs.get(i, j);
                        assert!((got - want).abs() < 1e-6, "{seq} no_lp={no_lp} ({i}, {j}): {got} vs {want}");
                    }
                }
            }
        }
    }

    #[test]
    fn each_base_pairs_at_most_once() {
        let setup = Setup::sequence("GGGGAAAACCCCAUGGGAAACCCA", false);
        let probs = probabilities(&setup);
        for i in 1..=setup.scorer.len() {
            assert!(probs.paired(i) <= 1.0 + 1e-9);
            assert!(probs.unpaired(i) >= 0.0);
        }
    }

    #[test]
    fn forced_unpaired_base_has_no_pairs() {
        let mut setup = Setup::sequence("GGGAAACCC", false);
        setup.hc.force_unpaired(1, LoopContext::NONE).unwrap();
        let probs = probabilities(&setup);
        for j in 2..=9 {
            assert_eq!(probs.get(1, j), 0.0);
        }
        assert!(probs.get(2, 8) > 0.0);
    }

    #[test]
    fn stacked_helix_outweighs_shifted_tetraloop_helix() {
        // (1,8)/(2,7) closes a GAAA tetraloop and takes most of the remaining weight.
        let setup = Setup::sequence("GGGAAACCC", false);
        let probs = probabilities(&setup);
        for (i, j) in [(1, 9), (2, 8), (3, 7)] {
            assert!(probs.get(i, j) > 0.5, "({i}, {j}): {}", probs.get(i, j));
        }
        assert!(probs.get(1, 8) > 0.3);
        assert!(probs.get(1, 9) > probs.get(1, 8));
        assert!(probs.get(2, 8) > probs.get(2, 7));
        assert!(probs.get(3, 7) > probs.get(2, 7));
        assert_eq!(probs.centroid().unwrap().to_dot_bracket(), "(((...)))");
    }
}
