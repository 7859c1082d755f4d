use super::mfe::candidate_total;
use crate::core::energy::INF;
use crate::core::structure::{BasePair, SecondaryStructure};
use crate::engine::error::FoldError;
use crate::engine::grammar::{Cell, Grammar};
use crate::engine::matrices::MfeMatrices;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, instrument};

/// A partially expanded structure. `bound` is the energy of the expanded
/// loops plus the optimum of every pending cell, so it never exceeds the
/// energy of any completion.
#[derive(Debug, Clone)]
struct Partial {
    bound: i32,
    pending: Vec<Cell>,
    pairs: Vec<BasePair>,
}

impl PartialEq for Partial {
    fn eq(&self, other: &Self) -> bool {
        self.bound == other.bound
    }
}
impl Eq for Partial {}

impl PartialOrd for Partial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Partial {
    fn cmp(&self, other: &Self) -> Ordering {
        other.bound.cmp(&self.bound)
    }
}

/// Enumerates every structure within `delta` (dcal/mol) of the optimum,
/// ordered by energy and then by pair list.
///
/// With a `cap`, enumeration stops once `cap` structures are collected and
/// the next one would be strictly worse, so ties at the boundary are kept.
#[instrument(skip_all, name = "subopt_task", fields(mfe = matrices.mfe(), delta = delta))]
pub fn run(
    grammar: &Grammar,
    matrices: &MfeMatrices,
    delta: i32,
    cap: Option<usize>,
) -> Result<Vec<(SecondaryStructure, i32)>, FoldError> {
    let n = grammar.len();
    let mfe = matrices.mfe();
    if mfe >= INF {
        return Err(FoldError::ConstraintConflict(
            "no structure satisfies the hard constraints".to_string(),
        ));
    }
    let threshold = mfe.saturating_add(delta.max(0));

    let mut heap = BinaryHeap::new();
    heap.push(Partial {
        bound: mfe,
        pending: vec![Cell::exterior(n)],
        pairs: Vec::new(),
    });
    let mut seen = HashSet::new();
    let mut found: Vec<(Vec<BasePair>, i32)> = Vec::new();
    let mut expanded = 0usize;

    while let Some(mut partial) = heap.pop() {
        let next = loop {
            match partial.pending.pop() {
                Some(cell) if cell.is_terminal() => continue,
                other => break other,
            }
        };

        let Some(cell) = next else {
            if let Some(cap) = cap {
                if found.len() >= cap && found.last().is_some_and(|&(_, e)| partial.bound > e) {
                    break;
                }
            }
            partial.pairs.sort_unstable();
            if seen.insert(partial.pairs.clone()) {
                found.push((partial.pairs, partial.bound));
            }
            continue;
        };

        expanded += 1;
        if cell.is_pair() {
            partial.pairs.push(BasePair { i: cell.i, j: cell.j });
        }
        let base = partial.bound - matrices.value(cell);
        grammar.enumerate(cell, &mut |candidate| {
            let Some(total) = candidate_total(grammar, cell, &candidate, |c| matrices.value(c)) else {
                return;
            };
            let bound = base + total;
            if bound > threshold {
                return;
            }
            let mut pending = partial.pending.clone();
            pending.extend(grammar.children(cell, &candidate).into_iter().flatten());
            heap.push(Partial {
                bound,
                pending,
                pairs: partial.pairs.clone(),
            });
        });
    }

    debug!(structures = found.len(), expanded, "Suboptimal enumeration finished.");

    found.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    found
        .into_iter()
        .map(|(pairs, score)| {
            SecondaryStructure::from_pairs(n, pairs)
                .map(|s| (s, score))
                .map_err(|e| FoldError::Internal(format!("enumerated pairs are inconsistent: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tasks::mfe;
    use crate::engine::tasks::testing::{Setup, brute_force};

    fn subopt(setup: &Setup, delta: i32, cap: Option<usize>) -> Vec<(SecondaryStructure, i32)> {
        let matrices = mfe::run(&setup.context());
        run(&setup.grammar(), &matrices, delta, cap).unwrap()
    }

    #[test]
    fn zero_delta_returns_only_ground_states() {
        let setup = Setup::sequence("GGGAAACCC", false);
        let results = subopt(&setup, 0, None);
        assert!(!results.is_empty());
        assert!(results.iter().all(|(_, e)| *e == -120));
        assert!(results.iter().any(|(s, _)| s.to_dot_bracket() == "(((...)))"));
    }

    #[test]
    fn window_matches_exhaustive_enumeration() {
        for seq in ["GAGGAAACCAGGAAACCAUC", "ACGUACGUUCGAAAGCGAUC"] {
            for no_lp in [false, true] {
                let setup = Setup::sequence(seq, no_lp);
                let all = brute_force(&setup);
                let mfe = all.iter().map(|(_, e)| *e).min().unwrap();
                let delta = 300;
                let mut expected: Vec<i32> =
                    all.iter().map(|(_, e)| *e).filter(|&e| e <= mfe + delta).collect();
                expected.sort_unstable();

                let results = subopt(&setup, delta, None);
                let energies: Vec<i32> = results.iter().map(|(_, e)| *e).collect();
                assert_eq!(energies, expected, "{seq} no_lp={no_lp}");
            }
        }
    }

    #[test]
    fn results_are_sorted_and_distinct() {
        let setup = Setup::sequence("GGGGAAAACCCCAUGGGAAACCCA", false);
        let results = subopt(&setup, 200, None);
        for pair in results.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.1 < b.1 || (a.1 == b.1 && a.0.pairs() < b.0.pairs()));
        }
    }

    #[test]
    fn cap_keeps_boundary_ties() {
        let setup = Setup::sequence("GAGGAAACCAGGAAACCAUC", false);
        let full = subopt(&setup, 400, None);
        let capped = subopt(&setup, 400, Some(3));
        assert!(capped.len() >= 3.min(full.len()));
        let last = capped.last().unwrap().1;
        let expected = full.iter().filter(|(_, e)| *e <= last).count();
        assert_eq!(capped.len(), expected);
        assert_eq!(&full[..capped.len()], &capped[..]);
    }
}
