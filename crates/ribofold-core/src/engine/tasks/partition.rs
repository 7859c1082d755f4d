use crate::core::energy::{TURN, boltzmann};
use crate::engine::context::FoldContext;
use crate::engine::error::FoldError;
use crate::engine::grammar::{Candidate, Cell, Grammar, Nonterminal};
use crate::engine::matrices::PfMatrices;
use crate::engine::progress::Progress;
use std::ops::RangeInclusive;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Rescaling attempts before the fill gives up.
pub const MAX_RESCALE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
struct CellWeights {
    qcc: f64,
    qc: f64,
    qm1: f64,
    qml: f64,
}

/// Scaled Boltzmann weight of `candidate` including its children.
#[inline]
pub(crate) fn candidate_weight<F>(
    grammar: &Grammar,
    matrices: &PfMatrices,
    parent: Cell,
    candidate: &Candidate,
    value: F,
) -> f64
where
    F: Fn(Cell) -> f64,
{
    let mut weight = boltzmann(candidate.energy, matrices.kt) * matrices.scale[candidate.consumed];
    for child in grammar.children(parent, candidate).into_iter().flatten() {
        if weight == 0.0 {
            break;
        }
        weight *= value(child);
    }
    weight
}

pub(crate) fn sum<F>(grammar: &Grammar, matrices: &PfMatrices, cell: Cell, value: F) -> f64
where
    F: Fn(Cell) -> f64,
{
    sum_candidates(grammar, matrices, cell, true, value)
}

fn sum_candidates<F>(grammar: &Grammar, matrices: &PfMatrices, cell: Cell, splits: bool, value: F) -> f64
where
    F: Fn(Cell) -> f64,
{
    let mut total = 0.0;
    let mut visit = |candidate: Candidate| {
        total += candidate_weight(grammar, matrices, cell, &candidate, &value);
    };
    if splits {
        grammar.enumerate(cell, &mut visit);
    } else {
        grammar.enumerate_local(cell, &mut visit);
    }
    total
}

/// Sum of `qml(lo, k - 1) * qm1(k, hi)` over the split points `k`.
#[inline]
fn split_sum(matrices: &PfMatrices, splits: RangeInclusive<usize>, lo: usize, hi: usize) -> f64 {
    let mut total = 0.0;
    for k in splits {
        let left = matrices.qml.get(lo, k - 1);
        if left == 0.0 {
            continue;
        }
        total += left * matrices.qm1.get(k, hi);
    }
    total
}

/// Per-nucleotide scaling factor estimated from the minimum free energy.
pub fn initial_scale(mfe: i32, kt: f64, n: usize, factor: f64) -> f64 {
    if n == 0 {
        return 1.0;
    }
    (-factor * mfe as f64 * 10.0 / (kt * n as f64)).exp()
}

/// Fills the partition function matrices, rescaling on overflow or
/// underflow of the ensemble total.
#[instrument(skip_all, name = "partition_task", fields(n = context.grammar.len(), mfe = mfe))]
pub fn run(context: &FoldContext, mfe: i32) -> Result<PfMatrices, FoldError> {
    let grammar = &context.grammar;
    let n = grammar.len();
    let kt = grammar.scorer().effective_kt();
    let mut pf_scale = initial_scale(mfe, kt, n, context.config.pf_scale_factor);
    let step = if n == 0 { 1.0 } else { (200.0 / n as f64).exp() };

    info!(pf_scale, "Starting partition function fill.");
    context.reporter.report(Progress::PhaseStart {
        name: "Partition function",
    });

    for attempt in 0..=MAX_RESCALE_ATTEMPTS {
        let mut matrices = fill(context, pf_scale, kt);
        let total = matrices.total();

        if !total.is_finite() {
            pf_scale *= step;
        } else if total <= f64::MIN_POSITIVE {
            pf_scale /= step;
        } else {
            fill_suffix(grammar, &mut matrices);
            debug!(ln_z = matrices.ln_z(), pf_scale, "Partition function filled.");
            context.reporter.report(Progress::PhaseFinish);
            return Ok(matrices);
        }

        if attempt < MAX_RESCALE_ATTEMPTS {
            warn!(
                attempt = attempt + 1,
                pf_scale, total, "Partition function out of range, rescaling."
            );
            context.reporter.report(Progress::Rescale {
                attempt: attempt + 1,
                factor: pf_scale,
            });
        }
    }

    Err(FoldError::NumericOverflow {
        attempts: MAX_RESCALE_ATTEMPTS,
    })
}

fn fill(context: &FoldContext, pf_scale: f64, kt: f64) -> PfMatrices {
    let grammar = &context.grammar;
    let n = grammar.len();
    let span = grammar.span();
    let mut matrices = PfMatrices::new(n, span, grammar.no_lp(), pf_scale, kt);

    context.reporter.report(Progress::FillStart {
        diagonals: context.diagonals(),
    });
    for d in (TURN + 1)..=span {
        let starts: Vec<usize> = (1..=n - d).collect();

        #[cfg(not(feature = "parallel"))]
        let iterator = starts.iter();

        #[cfg(feature = "parallel")]
        let iterator = starts.par_iter();

        let weights: Vec<CellWeights> = iterator
            .map(|&i| fill_cell(grammar, &matrices, i, i + d))
            .collect();

        for (i, w) in starts.into_iter().zip(weights) {
            let j = i + d;
            matrices.qcc.set(i, j, w.qcc);
            if let Some(qc) = matrices.qc.as_mut() {
                qc.set(i, j, w.qc);
            }
            matrices.qm1.set(i, j, w.qm1);
            matrices.qml.set(i, j, w.qml);
        }
        context.reporter.report(Progress::DiagonalDone);
    }
    context.reporter.report(Progress::FillFinish);

    for j in 1..=n {
        let q = sum(grammar, &matrices, Cell::exterior(j), |cell| matrices.value(cell));
        matrices.q5[j] = q;
    }
    matrices
}

fn fill_cell(grammar: &Grammar, matrices: &PfMatrices, i: usize, j: usize) -> CellWeights {
    let no_lp = grammar.no_lp();
    let mut local = CellWeights::default();
    let lookup = |cell: Cell, local: &CellWeights| -> f64 {
        if cell.i != i || cell.j != j {
            return matrices.value(cell);
        }
        match cell.nt {
            Nonterminal::Pair => local.qcc,
            Nonterminal::Stem if no_lp => local.qc,
            Nonterminal::Stem => local.qcc,
            Nonterminal::MultiOne => local.qm1,
            Nonterminal::Multi => local.qml,
            Nonterminal::Exterior => matrices.value(cell),
        }
    };

    local.qcc = sum_candidates(grammar, matrices, Cell::new(Nonterminal::Pair, i, j), false, |c| {
        lookup(c, &local)
    });
    if let Some(closing) = grammar.multibranch_closing(i, j) {
        let weight = boltzmann(closing, matrices.kt) * matrices.scale[2];
        if weight != 0.0 {
            local.qcc += weight * split_sum(matrices, Grammar::multibranch_splits(i, j), i + 1, j - 1);
        }
    }
    if no_lp {
        local.qc = sum(grammar, matrices, Cell::new(Nonterminal::Stem, i, j), |c| lookup(c, &local));
    }
    local.qm1 = sum(grammar, matrices, Cell::new(Nonterminal::MultiOne, i, j), |c| lookup(c, &local));
    local.qml = sum_candidates(grammar, matrices, Cell::new(Nonterminal::Multi, i, j), false, |c| {
        lookup(c, &local)
    });
    local.qml += split_sum(matrices, Grammar::branch_splits(i, j), i, j);
    local
}

/// Exterior suffix weights `q3[i]` over `i..=n`.
fn fill_suffix(grammar: &Grammar, matrices: &mut PfMatrices) {
    let n = grammar.len();
    let span = grammar.span();
    let stem = grammar.stem();
    let kt = matrices.kt;
    for i in (1..=n).rev() {
        let mut q = match grammar.exterior_unpaired(i) {
            Some(e) => matrices.q3[i + 1] * boltzmann(e, kt) * matrices.scale[1],
            None => 0.0,
        };
        for l in (i + TURN + 1)..=(i + span).min(n) {
            if let Some(e) = grammar.exterior_stem(i, l) {
                q += boltzmann(e, kt)
                    * matrices.value(Cell::new(stem, i, l))
                    * matrices.q3[l + 1];
            }
        }
        matrices.q3[i] = q;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::FoldContext;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::tasks::mfe;
    use crate::engine::tasks::testing::{Setup, brute_force_ensemble};
    use std::sync::Mutex;

    fn fold(setup: &Setup) -> PfMatrices {
        let context = setup.context();
        let mfe = mfe::run(&context).mfe();
        run(&context, mfe).unwrap()
    }

    #[test]
    fn open_chain_has_unit_partition_function() {
        let setup = Setup::sequence("AAAAAAAA", false);
        let matrices = fold(&setup);
        assert!(matrices.ln_z().abs() < 1e-9);
    }

    #[test]
    fn ensemble_dominates_the_ground_state() {
        let setup = Setup::sequence("GGGAAACCC", false);
        let matrices = fold(&setup);
        let kt = setup.scorer.effective_kt();
        assert!(matrices.ln_z() >= 120.0 * 10.0 / kt - 1e-9);
    }

    #[test]
    fn matches_exhaustive_sum() {
        for seq in ["GGGAAACCC", "GAGGAAACCAGGAAACCAUC", "ACGUACGUUCGAAAGCGAUC"] {
            for no_lp in [false, true] {
                let setup = Setup::sequence(seq, no_lp);
                let (expected, _) = brute_force_ensemble(&setup);
                let ln_z = fold(&setup).ln_z();
                assert!((ln_z - expected).abs() < 1e-6, "{seq} no_lp={no_lp}: {ln_z} vs {expected}");
            }
        }
    }

    #[test]
    fn prefix_and_suffix_totals_agree() {
        let setup = Setup::sequence("GAGGAAACCAGGAAACCAUC", false);
        let matrices = fold(&setup);
        let relative = (matrices.q3[1] - matrices.total()).abs() / matrices.total();
        assert!(relative < 1e-9);
    }

    #[test]
    fn scale_choice_does_not_change_ln_z() {
        let setup = Setup::sequence("GAGGAAACCAGGAAACCAUC", false);
        let kt = setup.scorer.effective_kt();
        let context = setup.context();
        let a = fill(&context, 1.0, kt);
        let b = fill(&context, 1.3, kt);
        assert!((a.ln_z() - b.ln_z()).abs() < 1e-9);
    }

    /// Runs the fill from a deliberately wrong ground-state energy and
    /// collects the rescale events it reports.
    fn run_with_estimate(setup: &Setup, mfe: i32) -> (Result<PfMatrices, FoldError>, Vec<usize>) {
        let attempts = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::Rescale { attempt, factor } = event {
                assert!(factor.is_finite() && factor > 0.0);
                attempts.lock().unwrap().push(attempt);
            }
        }));
        let context = FoldContext::new(setup.grammar(), &setup.config, &reporter);
        let result = run(&context, mfe);
        drop(context);
        drop(reporter);
        (result, attempts.into_inner().unwrap())
    }

    #[test]
    fn rescaling_recovers_from_overflow_and_underflow() {
        let setup = Setup::sequence("GAGGAAACCAGGAAACCAUC", false);
        let expected = fold(&setup).ln_z();

        // An estimate of +800 kcal/mol overflows the total, -800 underflows it.
        for estimate in [80_000, -80_000] {
            let (result, attempts) = run_with_estimate(&setup, estimate);
            let matrices = result.unwrap();
            assert_eq!(attempts, vec![1, 2, 3, 4], "estimate {estimate}");
            assert!((matrices.ln_z() - expected).abs() < 1e-6, "estimate {estimate}");
            let relative = (matrices.q3[1] - matrices.total()).abs() / matrices.total();
            assert!(relative < 1e-9);
        }
    }

    #[test]
    fn exhausted_rescaling_is_a_numeric_overflow() {
        let setup = Setup::sequence("GAGGAAACCAGGAAACCAUC", false);
        let (result, attempts) = run_with_estimate(&setup, 700_000);
        assert!(matches!(
            result,
            Err(FoldError::NumericOverflow {
                attempts: MAX_RESCALE_ATTEMPTS
            })
        ));
        assert_eq!(attempts, (1..=MAX_RESCALE_ATTEMPTS).collect::<Vec<_>>());
    }

    #[test]
    fn split_fast_path_agrees_with_full_enumeration() {
        for seq in ["GGGAGGGAAACCCAGGGAAACCCACCC", "GCGCAGGGGAAACCCCAGCUUCGGCUGCGC"] {
            for no_lp in [false, true] {
                let setup = Setup::sequence(seq, no_lp);
                let context = setup.context();
                let grammar = &context.grammar;
                let matrices = fold(&setup);
                let n = grammar.len();
                for i in 1..=n {
                    for j in (i + TURN + 1)..=n {
                        for nt in [Nonterminal::Pair, Nonterminal::Stem, Nonterminal::MultiOne, Nonterminal::Multi] {
                            let cell = Cell::new(nt, i, j);
                            let fast = matrices.value(cell);
                            let full = sum(grammar, &matrices, cell, |c| matrices.value(c));
                            let tolerance = 1e-12 * fast.abs().max(full.abs());
                            assert!((fast - full).abs() <= tolerance, "{seq} no_lp={no_lp} {cell:?}: {fast} vs {full}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn initial_scale_is_neutral_without_structure() {
        assert_eq!(initial_scale(0, 616.0, 10, 1.07), 1.0);
        assert!(initial_scale(-500, 616.0, 10, 1.07) > 1.0);
    }
}
