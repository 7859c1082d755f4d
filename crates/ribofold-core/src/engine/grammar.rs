//! The loop decomposition grammar shared by every engine.
//!
//! Each matrix class is a [`Nonterminal`]; a [`Cell`] is a nonterminal over
//! an interval. [`Grammar::enumerate`] lists the legal ways to decompose a
//! cell as [`Candidate`]s: a [`Decomposition`] tag, the energy of the loop
//! it closes (hard constraints already applied, soft bias and pair bonus
//! included) and the number of nucleotides it consumes without handing them
//! to a child cell. Minimisation, summation, outside propagation, sampling
//! and enumeration are all folds over the same candidate stream, so the
//! engines cannot disagree about the structure space.
//!
//! Candidates are emitted in tie-break priority order: hairpin, stack,
//! bulge and interior loops, multiloop, and unpaired bases last.

use super::scorer::{LoopScorer, Scorer};
use crate::core::constraints::{HardConstraints, LoopContext, SoftLayer};
use crate::core::energy::{INF, MAXLOOP, TURN};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Nonterminal {
    /// `(i, j)` paired.
    Pair,
    /// `(i, j)` paired as the outermost pair of a helix. Identical to
    /// [`Nonterminal::Pair`] unless lonely pairs are excluded.
    Stem,
    /// Multiloop segment holding at least one branch.
    Multi,
    /// Multiloop segment holding exactly one branch, which starts at `i`.
    MultiOne,
    /// Exterior loop over `1..=j`.
    Exterior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub nt: Nonterminal,
    pub i: usize,
    pub j: usize,
}

impl Cell {
    pub fn new(nt: Nonterminal, i: usize, j: usize) -> Self {
        Self { nt, i, j }
    }

    pub fn exterior(j: usize) -> Self {
        Self {
            nt: Nonterminal::Exterior,
            i: 1,
            j,
        }
    }

    /// Whether this cell fixes `(i, j)` as a base pair.
    pub fn is_pair(&self) -> bool {
        matches!(self.nt, Nonterminal::Pair | Nonterminal::Stem)
    }

    /// The empty exterior prefix.
    pub fn is_terminal(&self) -> bool {
        self.nt == Nonterminal::Exterior && self.j == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decomposition {
    /// `(i, j)` closes a hairpin.
    Hairpin,
    /// `(i, j)` stacks on `(i + 1, j - 1)`.
    Stack,
    /// `(i, j)` closes a bulge or interior loop with inner pair `(k, l)`.
    Interior { k: usize, l: usize },
    /// `(i, j)` closes a multiloop split into `i + 1..k - 1` and
    /// `k..j - 1`.
    Multibranch { k: usize },
    /// Outermost pair of a helix stacking on `(i + 1, j - 1)`.
    EntryStack,
    /// Branch `(i, l)` followed by unpaired `l + 1..=j`.
    BranchStem { l: usize },
    /// Unpaired `i..k - 1` followed by a single branch segment.
    BranchLeading { k: usize },
    /// Branches in `i..k - 1` followed by a single branch segment.
    BranchSplit { k: usize },
    /// `j` unpaired in the exterior loop.
    ExteriorUnpaired,
    /// Exterior helix `(k, j)`.
    ExteriorStem { k: usize },
}

impl Decomposition {
    /// Child cells of `parent` produced by this decomposition.
    pub fn children(self, parent: Cell, no_lp: bool) -> [Option<Cell>; 2] {
        use Nonterminal::*;
        let (i, j) = (parent.i, parent.j);
        let stem = if no_lp { Stem } else { Pair };
        match self {
            Decomposition::Hairpin => [None, None],
            Decomposition::Stack | Decomposition::EntryStack => {
                [Some(Cell::new(Pair, i + 1, j - 1)), None]
            }
            Decomposition::Interior { k, l } => [Some(Cell::new(stem, k, l)), None],
            Decomposition::Multibranch { k } => [
                Some(Cell::new(Multi, i + 1, k - 1)),
                Some(Cell::new(MultiOne, k, j - 1)),
            ],
            Decomposition::BranchStem { l } => [Some(Cell::new(stem, i, l)), None],
            Decomposition::BranchLeading { k } => [Some(Cell::new(MultiOne, k, j)), None],
            Decomposition::BranchSplit { k } => [
                Some(Cell::new(Multi, i, k - 1)),
                Some(Cell::new(MultiOne, k, j)),
            ],
            Decomposition::ExteriorUnpaired => [Some(Cell::exterior(j - 1)), None],
            Decomposition::ExteriorStem { k } => {
                [Some(Cell::exterior(k - 1)), Some(Cell::new(stem, k, j))]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub decomposition: Decomposition,
    /// Local loop energy in dcal/mol, excluding the children.
    pub energy: i32,
    /// Nucleotides covered by the parent but by none of the children.
    pub consumed: usize,
}

/// Decomposition rules of one fold, bound to its scorer and constraints.
#[derive(Clone, Copy)]
pub struct Grammar<'a> {
    scorer: &'a Scorer,
    hc: &'a HardConstraints,
    soft: &'a SoftLayer,
    no_lp: bool,
    n: usize,
    span: usize,
}

impl<'a> Grammar<'a> {
    pub fn new(scorer: &'a Scorer, hc: &'a HardConstraints, soft: &'a SoftLayer, no_lp: bool) -> Self {
        Self {
            scorer,
            hc,
            soft,
            no_lp,
            n: scorer.len(),
            span: hc.max_span(),
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn no_lp(&self) -> bool {
        self.no_lp
    }

    pub fn scorer(&self) -> &Scorer {
        self.scorer
    }

    pub fn children(&self, parent: Cell, candidate: &Candidate) -> [Option<Cell>; 2] {
        candidate.decomposition.children(parent, self.no_lp)
    }

    /// The nonterminal a branch `(i, j)` is read from.
    pub fn stem(&self) -> Nonterminal {
        if self.no_lp { Nonterminal::Stem } else { Nonterminal::Pair }
    }

    /// Calls `emit` for every legal decomposition of `cell`, in tie-break
    /// priority order.
    pub fn enumerate<F>(&self, cell: Cell, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        self.dispatch(cell, true, emit);
    }

    /// [`Grammar::enumerate`] without the [`Decomposition::Multibranch`] and
    /// [`Decomposition::BranchSplit`] candidates. Fills add those by reading
    /// the matrices over [`Grammar::multibranch_splits`] and
    /// [`Grammar::branch_splits`] directly.
    pub fn enumerate_local<F>(&self, cell: Cell, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        self.dispatch(cell, false, emit);
    }

    fn dispatch<F>(&self, cell: Cell, splits: bool, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        match cell.nt {
            Nonterminal::Pair => self.pair(cell.i, cell.j, splits, emit),
            Nonterminal::Stem if self.no_lp => self.entry_stack(cell.i, cell.j, emit),
            Nonterminal::Stem => self.pair(cell.i, cell.j, splits, emit),
            Nonterminal::MultiOne => self.multi_one(cell.i, cell.j, emit),
            Nonterminal::Multi => self.multi(cell.i, cell.j, splits, emit),
            Nonterminal::Exterior => self.exterior(cell.j, emit),
        }
    }

    /// Loop energy of `(i, j)` closing a multiloop, if it may.
    pub fn multibranch_closing(&self, i: usize, j: usize) -> Option<i32> {
        if j < i + 11 || !self.hc.allowed(i, j, LoopContext::MULTIBRANCH) {
            return None;
        }
        let energy = self.scorer.ml_closing(i, j) + self.pair_bias(i, j, LoopContext::MULTIBRANCH);
        (energy < INF).then_some(energy)
    }

    /// Split points `k` of a multiloop closed by `(i, j)`: branches in
    /// `i + 1..k - 1` and one branch segment in `k..j - 1`.
    pub fn multibranch_splits(i: usize, j: usize) -> RangeInclusive<usize> {
        (i + 6)..=j.saturating_sub(5)
    }

    /// Split points `k` of a multiloop segment `(i, j)` into branches in
    /// `i..k - 1` and one branch segment in `k..j`.
    pub fn branch_splits(i: usize, j: usize) -> RangeInclusive<usize> {
        (i + TURN + 2)..=j.saturating_sub(TURN + 1)
    }

    /// Collected form of [`Grammar::enumerate`].
    pub fn candidates(&self, cell: Cell) -> Vec<Candidate> {
        let mut out = Vec::new();
        self.enumerate(cell, &mut |c| out.push(c));
        out
    }

    #[inline]
    fn push<F>(emit: &mut F, decomposition: Decomposition, energy: i32, consumed: usize)
    where
        F: FnMut(Candidate),
    {
        if energy < INF {
            emit(Candidate {
                decomposition,
                energy,
                consumed,
            });
        }
    }

    #[inline]
    fn pair_bias(&self, i: usize, j: usize, ctx: LoopContext) -> i32 {
        self.scorer.pair_bonus(i, j) + self.soft.pair(i, j, ctx)
    }

    fn pair<F>(&self, i: usize, j: usize, splits: bool, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        if j <= i + TURN || !self.hc.allowed(i, j, LoopContext::ALL) {
            return;
        }
        let hc = self.hc;

        if hc.allowed(i, j, LoopContext::HAIRPIN)
            && hc.allowed_unpaired_range(i + 1, j - 1, LoopContext::HAIRPIN)
        {
            let energy = self.scorer.hairpin(i, j)
                + self.pair_bias(i, j, LoopContext::HAIRPIN)
                + self.soft.unpaired_range(i + 1, j - 1, LoopContext::HAIRPIN);
            Self::push(emit, Decomposition::Hairpin, energy, j - i + 1);
        }

        if hc.allowed(i, j, LoopContext::INTERIOR) {
            let bias = self.pair_bias(i, j, LoopContext::INTERIOR);
            if hc.allowed(i + 1, j - 1, LoopContext::INTERIOR_ENCLOSED) {
                let energy = self.scorer.interior(i, j, i + 1, j - 1) + bias;
                Self::push(emit, Decomposition::Stack, energy, 2);
            }
            self.interior_loops(i, j, bias, emit);
        }

        if splits {
            if let Some(energy) = self.multibranch_closing(i, j) {
                for k in Self::multibranch_splits(i, j) {
                    Self::push(emit, Decomposition::Multibranch { k }, energy, 2);
                }
            }
        }
    }

    fn interior_loops<F>(&self, i: usize, j: usize, bias: i32, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        let hc = self.hc;
        let k_max = (i + MAXLOOP + 1).min(j - TURN - 2);
        for k in (i + 1)..=k_max {
            let u1 = k - i - 1;
            if !hc.allowed_unpaired_range(i + 1, k - 1, LoopContext::INTERIOR) {
                break;
            }
            let l_min = (k + TURN + 1).max((j - 1).saturating_sub(MAXLOOP - u1));
            for l in (l_min..j).rev() {
                let u2 = j - l - 1;
                if u1 == 0 && u2 == 0 {
                    continue;
                }
                if !hc.allowed_unpaired_range(l + 1, j - 1, LoopContext::INTERIOR) {
                    break;
                }
                if !hc.allowed(k, l, LoopContext::INTERIOR_ENCLOSED) {
                    continue;
                }
                let energy = self.scorer.interior(i, j, k, l)
                    + bias
                    + self.soft.unpaired_range(i + 1, k - 1, LoopContext::INTERIOR)
                    + self.soft.unpaired_range(l + 1, j - 1, LoopContext::INTERIOR);
                Self::push(emit, Decomposition::Interior { k, l }, energy, u1 + u2 + 2);
            }
        }
    }

    fn entry_stack<F>(&self, i: usize, j: usize, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        if j <= i + TURN + 2
            || !self.hc.allowed(i, j, LoopContext::INTERIOR)
            || !self.hc.allowed(i + 1, j - 1, LoopContext::INTERIOR_ENCLOSED)
        {
            return;
        }
        let energy =
            self.scorer.interior(i, j, i + 1, j - 1) + self.pair_bias(i, j, LoopContext::INTERIOR);
        Self::push(emit, Decomposition::EntryStack, energy, 2);
    }

    fn multi_one<F>(&self, i: usize, j: usize, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        if j <= i + TURN {
            return;
        }
        let unit = self.scorer.ml_unpaired();
        let l_max = j.min(i + self.span);
        for l in ((i + TURN + 1)..=l_max).rev() {
            if !self.hc.allowed_unpaired_range(l + 1, j, LoopContext::MULTIBRANCH) {
                break;
            }
            if !self.hc.allowed(i, l, LoopContext::MULTIBRANCH_ENCLOSED) {
                continue;
            }
            let unpaired = j - l;
            let energy = self.scorer.ml_stem(i, l)
                + unit * unpaired as i32
                + self.soft.unpaired_range(l + 1, j, LoopContext::MULTIBRANCH);
            Self::push(emit, Decomposition::BranchStem { l }, energy, unpaired);
        }
    }

    fn multi<F>(&self, i: usize, j: usize, splits: bool, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        if j <= i + TURN {
            return;
        }
        let unit = self.scorer.ml_unpaired();
        for k in i..=(j - TURN - 1) {
            if !self.hc.allowed_unpaired_range(i, k - 1, LoopContext::MULTIBRANCH) {
                break;
            }
            let unpaired = k - i;
            let energy =
                unit * unpaired as i32 + self.soft.unpaired_range(i, k - 1, LoopContext::MULTIBRANCH);
            Self::push(emit, Decomposition::BranchLeading { k }, energy, unpaired);
        }
        if splits {
            for k in Self::branch_splits(i, j) {
                Self::push(emit, Decomposition::BranchSplit { k }, 0, 0);
            }
        }
    }

    fn exterior<F>(&self, j: usize, emit: &mut F)
    where
        F: FnMut(Candidate),
    {
        if j == 0 {
            return;
        }
        let k_min = j.saturating_sub(self.span).max(1);
        for k in k_min..j.saturating_sub(TURN) {
            if let Some(energy) = self.exterior_stem(k, j) {
                Self::push(emit, Decomposition::ExteriorStem { k }, energy, 0);
            }
        }
        if let Some(energy) = self.exterior_unpaired(j) {
            Self::push(emit, Decomposition::ExteriorUnpaired, energy, 1);
        }
    }

    /// Energy of helix `(k, j)` as an exterior branch, if allowed.
    pub fn exterior_stem(&self, k: usize, j: usize) -> Option<i32> {
        self.hc
            .allowed(k, j, LoopContext::EXTERIOR)
            .then(|| self.scorer.ext_stem(k, j))
            .filter(|&e| e < INF)
    }

    /// Soft bias of `j` staying unpaired in the exterior loop, if allowed.
    pub fn exterior_unpaired(&self, j: usize) -> Option<i32> {
        self.hc
            .allowed_unpaired(j, LoopContext::EXTERIOR)
            .then(|| self.soft.unpaired(j, LoopContext::EXTERIOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::energy::{EnergyModel, EnergyParams, ModelOptions};
    use crate::core::sequence::Sequence;
    use crate::engine::scorer::SequenceScorer;
    use std::sync::Arc;

    struct Fixture {
        scorer: Scorer,
        hc: HardConstraints,
        soft: SoftLayer,
    }

    fn fixture(seq: &str) -> Fixture {
        let model = EnergyModel::new(&EnergyParams::default(), &ModelOptions::default()).unwrap();
        let scorer = Scorer::Sequence(SequenceScorer::new(Sequence::parse(seq).unwrap(), Arc::new(model)));
        let hc = HardConstraints::new(scorer.len(), None, |i, j| scorer.can_pair(i, j));
        let soft = SoftLayer::empty(scorer.len());
        Fixture { scorer, hc, soft }
    }

    fn kinds(candidates: &[Candidate]) -> Vec<Decomposition> {
        candidates.iter().map(|c| c.decomposition).collect()
    }

    #[test]
    fn pair_candidates_follow_priority_order() {
        let f = fixture("GGGAAACCC");
        let g = Grammar::new(&f.scorer, &f.hc, &f.soft, false);
        let candidates = g.candidates(Cell::new(Nonterminal::Pair, 1, 9));
        let kinds = kinds(&candidates);
        assert_eq!(kinds[0], Decomposition::Hairpin);
        assert_eq!(kinds[1], Decomposition::Stack);
        assert!(kinds[2..].iter().all(|d| matches!(d, Decomposition::Interior { .. })));
        assert_eq!(candidates[0].consumed, 9);
        assert_eq!(candidates[1].consumed, 2);
    }

    #[test]
    fn unpairable_cells_have_no_candidates() {
        let f = fixture("GGGAAACCC");
        let g = Grammar::new(&f.scorer, &f.hc, &f.soft, false);
        assert!(g.candidates(Cell::new(Nonterminal::Pair, 1, 4)).is_empty());
        assert!(g.candidates(Cell::new(Nonterminal::Pair, 4, 9)).is_empty());
    }

    #[test]
    fn consumed_and_children_cover_the_parent_interval() {
        let f = fixture("GGGGAAACCCCAGGGAAACCCU");
        let g = Grammar::new(&f.scorer, &f.hc, &f.soft, false);
        let n = g.len();
        for nt in [Nonterminal::Pair, Nonterminal::Multi, Nonterminal::MultiOne] {
            for i in 1..=n {
                for j in i..=n {
                    let cell = Cell::new(nt, i, j);
                    for candidate in g.candidates(cell) {
                        let covered: usize = g
                            .children(cell, &candidate)
                            .into_iter()
                            .flatten()
                            .map(|c| c.j + 1 - c.i)
                            .sum();
                        assert_eq!(covered + candidate.consumed, j - i + 1, "{cell:?} {candidate:?}");
                    }
                }
            }
        }
        for j in 1..=n {
            let cell = Cell::exterior(j);
            for candidate in g.candidates(cell) {
                let covered: usize = g
                    .children(cell, &candidate)
                    .into_iter()
                    .flatten()
                    .map(|c| if c.nt == Nonterminal::Exterior { c.j } else { c.j + 1 - c.i })
                    .sum();
                assert_eq!(covered + candidate.consumed, j);
            }
        }
    }

    #[test]
    fn lonely_pair_exclusion_routes_branches_through_stems() {
        let f = fixture("GGGAAACCC");
        let g = Grammar::new(&f.scorer, &f.hc, &f.soft, true);
        let stem = g.candidates(Cell::new(Nonterminal::Stem, 1, 9));
        assert_eq!(kinds(&stem), vec![Decomposition::EntryStack]);

        let ext = g.candidates(Cell::exterior(9));
        let first = ext[0];
        let children = g.children(Cell::exterior(9), &first);
        assert_eq!(children[1].map(|c| c.nt), Some(Nonterminal::Stem));
    }

    #[test]
    fn local_enumeration_leaves_out_exactly_the_splits() {
        let f = fixture("GGGAGGGAAACCCAGGGAAACCCACCC");
        let g = Grammar::new(&f.scorer, &f.hc, &f.soft, false);
        let n = g.len();
        for nt in [Nonterminal::Pair, Nonterminal::Multi] {
            for i in 1..=n {
                for j in (i + TURN + 1)..=n {
                    let cell = Cell::new(nt, i, j);
                    let full = g.candidates(cell);
                    let mut local = Vec::new();
                    g.enumerate_local(cell, &mut |c| local.push(c));
                    let (splits, rest): (Vec<_>, Vec<_>) = full.into_iter().partition(|c| {
                        matches!(
                            c.decomposition,
                            Decomposition::Multibranch { .. } | Decomposition::BranchSplit { .. }
                        )
                    });
                    assert_eq!(rest, local, "{cell:?}");

                    let expected: Vec<usize> = match nt {
                        Nonterminal::Pair => g
                            .multibranch_closing(i, j)
                            .map(|_| Grammar::multibranch_splits(i, j).collect())
                            .unwrap_or_default(),
                        _ => Grammar::branch_splits(i, j).collect(),
                    };
                    let found: Vec<usize> = splits
                        .iter()
                        .map(|c| match c.decomposition {
                            Decomposition::Multibranch { k } | Decomposition::BranchSplit { k } => k,
                            _ => unreachable!(),
                        })
                        .collect();
                    assert_eq!(found, expected, "{cell:?}");
                }
            }
        }
    }

    #[test]
    fn forced_unpaired_base_blocks_enclosing_hairpin() {
        let mut f = fixture("GGGAAACCC");
        f.hc.force_unpaired(5, LoopContext::EXTERIOR).unwrap();
        let g = Grammar::new(&f.scorer, &f.hc, &f.soft, false);
        let kinds = kinds(&g.candidates(Cell::new(Nonterminal::Pair, 3, 7)));
        assert!(!kinds.contains(&Decomposition::Hairpin));
    }

    #[test]
    fn soft_bias_is_added_to_local_energy() {
        let f = fixture("GGGAAACCC");
        let plain = Grammar::new(&f.scorer, &f.hc, &f.soft, false)
            .candidates(Cell::new(Nonterminal::Pair, 3, 7))[0]
            .energy;

        let mut table = crate::core::constraints::PseudoEnergies::new();
        table.add_pair(3, 7, -50);
        table.add_unpaired(5, 20);
        let biased_layer = SoftLayer::new(9, &table, None, 1);
        let biased = Grammar::new(&f.scorer, &f.hc, &biased_layer, false)
            .candidates(Cell::new(Nonterminal::Pair, 3, 7))[0]
            .energy;
        assert_eq!(biased, plain - 50 + 20);
    }
}
