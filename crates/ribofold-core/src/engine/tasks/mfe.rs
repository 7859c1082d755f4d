use crate::core::energy::{INF, TURN};
use crate::engine::context::FoldContext;
use crate::engine::grammar::{Candidate, Cell, Grammar, Nonterminal};
use crate::engine::matrices::MfeMatrices;
use crate::engine::progress::Progress;
use std::ops::RangeInclusive;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy)]
struct CellValues {
    cc: i32,
    c: i32,
    fm1: i32,
    fml: i32,
}

/// Energy of `candidate` including its children, or `None` if a child is
/// infeasible.
#[inline]
pub(crate) fn candidate_total<F>(grammar: &Grammar, parent: Cell, candidate: &Candidate, value: F) -> Option<i32>
where
    F: Fn(Cell) -> i32,
{
    let mut total = candidate.energy;
    for child in grammar.children(parent, candidate).into_iter().flatten() {
        let v = value(child);
        if v >= INF {
            return None;
        }
        total += v;
    }
    Some(total)
}

pub(crate) fn minimize<F>(grammar: &Grammar, cell: Cell, value: F) -> i32
where
    F: Fn(Cell) -> i32,
{
    best_candidate(grammar, cell, true, value)
}

fn best_candidate<F>(grammar: &Grammar, cell: Cell, splits: bool, value: F) -> i32
where
    F: Fn(Cell) -> i32,
{
    let mut best = INF;
    let mut visit = |candidate: Candidate| {
        if let Some(total) = candidate_total(grammar, cell, &candidate, &value) {
            best = best.min(total);
        }
    };
    if splits {
        grammar.enumerate(cell, &mut visit);
    } else {
        grammar.enumerate_local(cell, &mut visit);
    }
    best.min(INF)
}

/// Smallest `fml(lo, k - 1) + fm1(k, hi)` over the split points `k`.
#[inline]
fn best_split(matrices: &MfeMatrices, splits: RangeInclusive<usize>, lo: usize, hi: usize) -> i32 {
    let mut best = INF;
    for k in splits {
        let left = matrices.fml.get(lo, k - 1);
        if left >= INF {
            continue;
        }
        let right = matrices.fm1.get(k, hi);
        if right >= INF {
            continue;
        }
        best = best.min(left + right);
    }
    best
}

#[instrument(skip_all, name = "mfe_fill_task", fields(n = context.grammar.len()))]
pub fn run(context: &FoldContext) -> MfeMatrices {
    let grammar = &context.grammar;
    let n = grammar.len();
    let span = grammar.span();
    let mut matrices = MfeMatrices::new(n, span, grammar.no_lp());

    info!("Starting minimum free energy fill.");
    context.reporter.report(Progress::PhaseStart { name: "MFE fill" });
    context.reporter.report(Progress::FillStart {
        diagonals: context.diagonals(),
    });

    for d in (TURN + 1)..=span {
        let starts: Vec<usize> = (1..=n - d).collect();

        #[cfg(not(feature = "parallel"))]
        let iterator = starts.iter();

        #[cfg(feature = "parallel")]
        let iterator = starts.par_iter();

        let values: Vec<CellValues> = iterator
            .map(|&i| fill_cell(grammar, &matrices, i, i + d))
            .collect();

        for (i, v) in starts.into_iter().zip(values) {
            let j = i + d;
            matrices.cc.set(i, j, v.cc);
            if let Some(c) = matrices.c.as_mut() {
                c.set(i, j, v.c);
            }
            matrices.fm1.set(i, j, v.fm1);
            matrices.fml.set(i, j, v.fml);
        }
        context.reporter.report(Progress::DiagonalDone);
    }
    context.reporter.report(Progress::FillFinish);

    for j in 1..=n {
        let value = minimize(grammar, Cell::exterior(j), |cell| matrices.value(cell));
        matrices.f5[j] = value;
    }

    debug!(mfe = matrices.mfe(), "Exterior loop filled.");
    context.reporter.report(Progress::PhaseFinish);
    matrices
}

/// Evaluates every nonterminal of interval `(i, j)`. Reads of the interval
/// itself go to the values computed so far in this call. Multiloop splits
/// only read strictly shorter intervals and are minimised in place.
fn fill_cell(grammar: &Grammar, matrices: &MfeMatrices, i: usize, j: usize) -> CellValues {
    let no_lp = grammar.no_lp();
    let mut local = CellValues {
        cc: INF,
        c: INF,
        fm1: INF,
        fml: INF,
    };
    let lookup = |cell: Cell, local: &CellValues| -> i32 {
        if cell.i != i || cell.j != j {
            return matrices.value(cell);
        }
        match cell.nt {
            Nonterminal::Pair => local.cc,
            Nonterminal::Stem if no_lp => local.c,
            Nonterminal::Stem => local.cc,
            Nonterminal::MultiOne => local.fm1,
            Nonterminal::Multi => local.fml,
            Nonterminal::Exterior => matrices.value(cell),
        }
    };

    local.cc = best_candidate(grammar, Cell::new(Nonterminal::Pair, i, j), false, |c| lookup(c, &local));
    if let Some(closing) = grammar.multibranch_closing(i, j) {
        let inner = best_split(matrices, Grammar::multibranch_splits(i, j), i + 1, j - 1);
        if inner < INF {
            local.cc = local.cc.min(closing + inner);
        }
    }
    if no_lp {
        local.c = minimize(grammar, Cell::new(Nonterminal::Stem, i, j), |c| lookup(c, &local));
    }
    local.fm1 = minimize(grammar, Cell::new(Nonterminal::MultiOne, i, j), |c| lookup(c, &local));
    local.fml = best_candidate(grammar, Cell::new(Nonterminal::Multi, i, j), false, |c| lookup(c, &local));
    local.fml = local.fml.min(best_split(matrices, Grammar::branch_splits(i, j), i, j));
    local
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tasks::testing::{Setup, brute_force};

    #[test]
    fn hairpin_of_three_gc_pairs_has_expected_energy() {
        let setup = Setup::sequence("GGGAAACCC", false);
        let matrices = run(&setup.context());
        assert_eq!(matrices.mfe(), -120);
    }

    #[test]
    fn sequences_without_pairs_fold_open() {
        let setup = Setup::sequence("AAAAAAAA", false);
        assert_eq!(run(&setup.context()).mfe(), 0);
        let short = Setup::sequence("GC", false);
        assert_eq!(run(&short.context()).mfe(), 0);
    }

    #[test]
    fn fill_matches_exhaustive_minimum() {
        for seq in ["GGGAAACCC", "GAGGAAACCAGGAAACCAUC", "ACGUACGUUCGAAAGCGAUC"] {
            for no_lp in [false, true] {
                let setup = Setup::sequence(seq, no_lp);
                let expected = brute_force(&setup).into_iter().map(|(_, e)| e).min().unwrap();
                assert_eq!(run(&setup.context()).mfe(), expected, "{seq} no_lp={no_lp}");
            }
        }
    }

    #[test]
    fn split_fast_path_agrees_with_full_enumeration() {
        for seq in [
            "GGGAGGGAAACCCAGGGAAACCCACCC",
            "GCGCAGGGGAAACCCCAGCUUCGGCUGCGC",
            "GAGGAAACCAGGAAACCAUC",
        ] {
            for no_lp in [false, true] {
                let setup = Setup::sequence(seq, no_lp);
                let context = setup.context();
                let grammar = &context.grammar;
                let matrices = run(&context);
                let n = grammar.len();
                for i in 1..=n {
                    for j in (i + TURN + 1)..=n {
                        for nt in [Nonterminal::Pair, Nonterminal::Stem, Nonterminal::MultiOne, Nonterminal::Multi] {
                            let cell = Cell::new(nt, i, j);
                            let full = minimize(grammar, cell, |c| matrices.value(c));
                            assert_eq!(matrices.value(cell), full, "{seq} no_lp={no_lp} {cell:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn banded_fill_ignores_long_range_pairs() {
        let mut setup = Setup::sequence("GGGAAAAAAAAAAAACCC", false);
        setup.set_span(8);
        assert_eq!(run(&setup.context()).mfe(), 0);
    }
}
