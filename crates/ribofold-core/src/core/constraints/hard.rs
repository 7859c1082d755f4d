use super::ConstraintError;
use super::commands::{Command, PairDirection};
use super::context::LoopContext;
use crate::core::energy::TURN;
use tracing::trace;

/// User-supplied veto over pairs and unpaired bases.
///
/// Consulted once per pair and loop context when installed with
/// [`HardConstraints::set_filter`]; a `false` answer removes the option
/// from every engine. Both methods default to allowing everything.
pub trait HardConstraint: Send + Sync {
    fn allowed(&self, _i: usize, _j: usize, _context: LoopContext) -> bool {
        true
    }

    fn allowed_unpaired(&self, _i: usize, _context: LoopContext) -> bool {
        true
    }
}

/// Constraint state of a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Free,
    /// Must pair, partner unknown.
    MustPair,
    /// Forced into a pair with the given partner.
    Paired(usize),
    /// Forced unpaired.
    Unpaired,
}

/// Per-pair and per-position hard constraints.
///
/// Pair contexts are stored for every `(i, j)` with `j - i` within the
/// maximum base-pair span. Unpaired stretches are answered in O(1) through
/// per-context run-length tables that are rebuilt after every update.
///
/// A [`HardConstraint`] filter is evaluated into masks that are intersected
/// with the command-driven contexts, so commands and the filter compose.
#[derive(Debug, Clone)]
pub struct HardConstraints {
    n: usize,
    span: usize,
    offsets: Vec<usize>,
    pair_ctx: Vec<LoopContext>,
    pair_filter: Vec<LoopContext>,
    compatible: Vec<bool>,
    unpaired: Vec<LoopContext>,
    unpaired_filter: Vec<LoopContext>,
    state: Vec<PositionState>,
    runs: [Vec<usize>; 4],
}

impl HardConstraints {
    /// Default constraints: every pair accepted by `can_pair` that encloses
    /// at least a minimal hairpin and lies within `max_span` is allowed in
    /// every context, and every base may stay unpaired.
    pub fn new<F>(n: usize, max_span: Option<usize>, can_pair: F) -> Self
    where
        F: Fn(usize, usize) -> bool,
    {
        let span = max_span.unwrap_or(n).min(n.saturating_sub(1));
        let mut offsets = vec![0; n + 2];
        for i in 1..=n {
            offsets[i + 1] = offsets[i] + (i + span).min(n) - i + 1;
        }
        let cells = offsets[n + 1];

        let mut hc = Self {
            n,
            span,
            offsets,
            pair_ctx: vec![LoopContext::NONE; cells],
            pair_filter: vec![LoopContext::ALL; cells],
            compatible: vec![false; cells],
            unpaired: vec![LoopContext::UNPAIRED_ALL; n + 2],
            unpaired_filter: vec![LoopContext::UNPAIRED_ALL; n + 2],
            state: vec![PositionState::Free; n + 2],
            runs: Default::default(),
        };
        hc.unpaired[0] = LoopContext::NONE;
        hc.unpaired[n + 1] = LoopContext::NONE;

        for i in 1..=n {
            for j in (i + TURN + 1)..=(i + span).min(n) {
                if can_pair(i, j) {
                    let idx = hc.offsets[i] + (j - i);
                    hc.compatible[idx] = true;
                    hc.pair_ctx[idx] = LoopContext::ALL;
                }
            }
        }
        hc.rebuild_runs();
        hc
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Largest `j - i` of any representable pair.
    pub fn max_span(&self) -> usize {
        self.span
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> Option<usize> {
        if i == 0 || j > self.n || i >= j || j - i > self.span {
            None
        } else {
            Some(self.offsets[i] + (j - i))
        }
    }

    /// Whether `(i, j)` may form in any of the contexts in `ctx`.
    #[inline]
    pub fn allowed(&self, i: usize, j: usize, ctx: LoopContext) -> bool {
        self.index(i, j)
            .is_some_and(|idx| (self.pair_ctx[idx] & self.pair_filter[idx]).intersects(ctx))
    }

    pub fn pair_contexts(&self, i: usize, j: usize) -> LoopContext {
        self.index(i, j)
            .map_or(LoopContext::NONE, |idx| self.pair_ctx[idx] & self.pair_filter[idx])
    }

    #[inline]
    pub fn allowed_unpaired(&self, i: usize, ctx: LoopContext) -> bool {
        self.unpaired_mask(i).intersects(ctx)
    }

    #[inline]
    fn unpaired_mask(&self, i: usize) -> LoopContext {
        match (self.unpaired.get(i), self.unpaired_filter.get(i)) {
            (Some(&mask), Some(&filter)) => mask & filter,
            _ => LoopContext::NONE,
        }
    }

    /// Installs `filter`, or removes the current one when `None`.
    ///
    /// Every pair within the span is evaluated once per loop context, so
    /// later commands (including [`allow_pair`](Self::allow_pair)) are still
    /// subject to the filter.
    pub fn set_filter(&mut self, constraint: Option<&dyn HardConstraint>) {
        self.pair_filter.fill(LoopContext::ALL);
        self.unpaired_filter.fill(LoopContext::UNPAIRED_ALL);
        if let Some(constraint) = constraint {
            for i in 1..=self.n {
                for j in (i + TURN + 1)..=(i + self.span).min(self.n) {
                    let idx = self.offsets[i] + (j - i);
                    self.pair_filter[idx] = LoopContext::PAIR_FLAGS
                        .iter()
                        .filter(|&&ctx| constraint.allowed(i, j, ctx))
                        .fold(LoopContext::NONE, |acc, &ctx| acc | ctx);
                }
                self.unpaired_filter[i] = LoopContext::UNPAIRED_SLOTS
                    .iter()
                    .filter(|&&ctx| constraint.allowed_unpaired(i, ctx))
                    .fold(LoopContext::NONE, |acc, &ctx| acc | ctx);
            }
            trace!("Installed user hard constraint");
        }
        self.rebuild_runs();
    }

    /// Whether every position in `i..=j` may stay unpaired in `ctx`. Empty
    /// ranges (`i > j`) are always allowed.
    #[inline]
    pub fn allowed_unpaired_range(&self, i: usize, j: usize, ctx: LoopContext) -> bool {
        if i > j {
            return true;
        }
        match ctx.unpaired_slot() {
            Some(slot) => self.runs[slot].get(i).is_some_and(|&run| run > j - i),
            None => (i..=j).all(|p| self.allowed_unpaired(p, ctx)),
        }
    }

    pub fn state(&self, i: usize) -> PositionState {
        self.state.get(i).copied().unwrap_or(PositionState::Free)
    }

    pub fn apply(&mut self, command: &Command) -> Result<(), ConstraintError> {
        trace!(?command, "Applying hard constraint");
        match *command {
            Command::ForcePair { i, j, context } => self.force_pair(i, j, context),
            Command::ForcePaired { i, direction } => match direction {
                PairDirection::Any => self.force_paired(i),
                PairDirection::Downstream => self.pairs_downstream(i),
                PairDirection::Upstream => self.pairs_upstream(i),
            },
            Command::ForceUnpaired { i, context } => self.force_unpaired(i, context),
            Command::ProhibitPair { i, j, context } => self.prohibit_pair(i, j, context),
            Command::ProhibitPairing { i } => self.prohibit_pairing(i),
            Command::AllowPair { i, j, context } => self.allow_pair(i, j, context),
            Command::PairBonus { .. } | Command::UnpairedBonus { .. } => Ok(()),
        }
    }

    fn check_position(&self, i: usize) -> Result<(), ConstraintError> {
        if i == 0 || i > self.n {
            Err(ConstraintError::OutOfRange {
                position: i,
                length: self.n,
            })
        } else {
            Ok(())
        }
    }

    fn check_pair(&self, i: usize, j: usize) -> Result<(), ConstraintError> {
        self.check_position(i)?;
        self.check_position(j)?;
        if i >= j {
            return Err(ConstraintError::InvalidPair { i, j });
        }
        Ok(())
    }

    /// Forces `(i, j)` to form, in one of the loop contexts in `ctx`.
    ///
    /// Removes every competing pair of `i` and `j`, every pair crossing
    /// `(i, j)`, and the option of leaving `i` or `j` unpaired.
    pub fn force_pair(&mut self, i: usize, j: usize, ctx: LoopContext) -> Result<(), ConstraintError> {
        self.check_pair(i, j)?;
        if j - i - 1 < TURN {
            return Err(ConstraintError::Conflict(format!(
                "forced pair ({i}, {j}) encloses fewer than {TURN} bases"
            )));
        }
        let idx = self.index(i, j).ok_or_else(|| {
            ConstraintError::Conflict(format!(
                "forced pair ({i}, {j}) exceeds the maximum base-pair span {}",
                self.span
            ))
        })?;
        if !self.compatible[idx] {
            return Err(ConstraintError::Conflict(format!(
                "forced pair ({i}, {j}) is not complementary"
            )));
        }
        for (p, other) in [(i, j), (j, i)] {
            match self.state[p] {
                PositionState::Paired(q) if q != other => {
                    return Err(ConstraintError::Conflict(format!(
                        "position {p} is already forced to pair with {q}"
                    )));
                }
                _ => {}
            }
        }
        for p in (i + 1)..j {
            match self.state[p] {
                PositionState::Paired(q) if q < i || q > j => {
                    return Err(ConstraintError::Conflict(format!(
                        "forced pair ({i}, {j}) crosses forced pair ({}, {})",
                        p.min(q),
                        p.max(q)
                    )));
                }
                _ => {}
            }
        }

        self.clear_pairs_where(|k, l| {
            (k, l) != (i, j)
                && (k == i
                    || k == j
                    || l == i
                    || l == j
                    || (k < i && i < l && l < j)
                    || (i < k && k < j && j < l))
        });
        self.pair_ctx[idx] = if ctx.is_empty() { LoopContext::ALL } else { ctx };
        self.unpaired[i] = LoopContext::NONE;
        self.unpaired[j] = LoopContext::NONE;
        self.state[i] = PositionState::Paired(j);
        self.state[j] = PositionState::Paired(i);
        self.rebuild_runs();
        Ok(())
    }

    /// Forces `i` unpaired. `ctx` lists the loops `i` may be part of.
    pub fn force_unpaired(&mut self, i: usize, ctx: LoopContext) -> Result<(), ConstraintError> {
        self.check_position(i)?;
        self.ensure_not_pairing(i, "forced unpaired")?;
        self.clear_pairs_where(|k, l| k == i || l == i);
        let mask = ctx.for_unpaired();
        self.unpaired[i] = if mask.is_empty() { LoopContext::UNPAIRED_ALL } else { mask };
        self.state[i] = PositionState::Unpaired;
        self.rebuild_runs();
        Ok(())
    }

    /// Removes the contexts in `ctx` from pair `(i, j)`.
    pub fn prohibit_pair(&mut self, i: usize, j: usize, ctx: LoopContext) -> Result<(), ConstraintError> {
        self.check_pair(i, j)?;
        let Some(idx) = self.index(i, j) else {
            return Ok(());
        };
        let remaining = self.pair_ctx[idx] & !ctx;
        if remaining.is_empty() && self.state[i] == PositionState::Paired(j) {
            return Err(ConstraintError::Conflict(format!(
                "cannot prohibit forced pair ({i}, {j})"
            )));
        }
        self.pair_ctx[idx] = remaining;
        Ok(())
    }

    /// Removes every pair of `i` while still allowing it to stay unpaired.
    pub fn prohibit_pairing(&mut self, i: usize) -> Result<(), ConstraintError> {
        self.check_position(i)?;
        self.ensure_not_pairing(i, "prohibited from pairing")?;
        self.clear_pairs_where(|k, l| k == i || l == i);
        Ok(())
    }

    /// Allows `(i, j)` in `ctx`, including non-canonical pairs.
    pub fn allow_pair(&mut self, i: usize, j: usize, ctx: LoopContext) -> Result<(), ConstraintError> {
        self.check_pair(i, j)?;
        if j - i - 1 < TURN {
            return Err(ConstraintError::Conflict(format!(
                "pair ({i}, {j}) encloses fewer than {TURN} bases"
            )));
        }
        let Some(idx) = self.index(i, j) else {
            return Err(ConstraintError::Conflict(format!(
                "pair ({i}, {j}) exceeds the maximum base-pair span {}",
                self.span
            )));
        };
        for (p, other) in [(i, j), (j, i)] {
            match self.state[p] {
                PositionState::Paired(q) if q != other => {
                    return Err(ConstraintError::Conflict(format!(
                        "position {p} is already forced to pair with {q}"
                    )));
                }
                PositionState::Unpaired => self.state[p] = PositionState::Free,
                _ => {}
            }
        }
        self.compatible[idx] = true;
        self.pair_ctx[idx] |= if ctx.is_empty() { LoopContext::ALL } else { ctx };
        Ok(())
    }

    /// Requires `i` to pair with some partner.
    pub fn force_paired(&mut self, i: usize) -> Result<(), ConstraintError> {
        self.check_position(i)?;
        if !matches!(self.state[i], PositionState::Paired(_)) {
            self.state[i] = PositionState::MustPair;
        }
        self.unpaired[i] = LoopContext::NONE;
        self.rebuild_runs();
        Ok(())
    }

    /// `i` must pair with a partner 3' of it.
    pub fn pairs_downstream(&mut self, i: usize) -> Result<(), ConstraintError> {
        self.check_position(i)?;
        match self.state[i] {
            PositionState::Paired(q) if q < i => {
                return Err(ConstraintError::Conflict(format!(
                    "position {i} is forced to pair upstream with {q}"
                )));
            }
            _ => {}
        }
        self.clear_pairs_where(|_, l| l == i);
        self.force_paired(i)
    }

    /// `i` must pair with a partner 5' of it.
    pub fn pairs_upstream(&mut self, i: usize) -> Result<(), ConstraintError> {
        self.check_position(i)?;
        match self.state[i] {
            PositionState::Paired(q) if q > i => {
                return Err(ConstraintError::Conflict(format!(
                    "position {i} is forced to pair downstream with {q}"
                )));
            }
            _ => {}
        }
        self.clear_pairs_where(|k, _| k == i);
        self.force_paired(i)
    }

    /// Every must-pair position needs at least one allowed partner, and
    /// forced pairs and unpaired bases must survive the installed filter.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        for p in 1..=self.n {
            match self.state[p] {
                PositionState::MustPair if !self.has_partner(p) => {
                    return Err(ConstraintError::Conflict(format!(
                        "position {p} must pair but no partner is allowed"
                    )));
                }
                PositionState::Paired(q) if p < q && self.pair_contexts(p, q).is_empty() => {
                    return Err(ConstraintError::Conflict(format!(
                        "forced pair ({p}, {q}) is rejected in every loop context"
                    )));
                }
                PositionState::Unpaired if self.unpaired_mask(p).is_empty() => {
                    return Err(ConstraintError::Conflict(format!(
                        "position {p} is forced unpaired but rejected in every loop context"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn has_partner(&self, p: usize) -> bool {
        let lo = p.saturating_sub(self.span).max(1);
        let hi = (p + self.span).min(self.n);
        (lo..p).any(|k| !self.pair_contexts(k, p).is_empty())
            || ((p + 1)..=hi).any(|l| !self.pair_contexts(p, l).is_empty())
    }

    fn ensure_not_pairing(&self, i: usize, what: &str) -> Result<(), ConstraintError> {
        match self.state[i] {
            PositionState::MustPair => Err(ConstraintError::Conflict(format!(
                "position {i} must pair and cannot be {what}"
            ))),
            PositionState::Paired(q) => Err(ConstraintError::Conflict(format!(
                "position {i} is forced to pair with {q} and cannot be {what}"
            ))),
            _ => Ok(()),
        }
    }

    fn clear_pairs_where<F>(&mut self, predicate: F)
    where
        F: Fn(usize, usize) -> bool,
    {
        for k in 1..=self.n {
            let row_end = (k + self.span).min(self.n);
            for l in (k + 1)..=row_end {
                if predicate(k, l) {
                    let idx = self.offsets[k] + (l - k);
                    self.pair_ctx[idx] = LoopContext::NONE;
                }
            }
        }
    }

    fn rebuild_runs(&mut self) {
        for (slot, ctx) in LoopContext::UNPAIRED_SLOTS.iter().enumerate() {
            let run = &mut self.runs[slot];
            run.clear();
            run.resize(self.n + 2, 0);
            for p in (1..=self.n).rev() {
                run[p] = if (self.unpaired[p] & self.unpaired_filter[p]).intersects(*ctx) {
                    run[p + 1] + 1
                } else {
                    0
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every pair is considered complementary.
    fn open(n: usize) -> HardConstraints {
        HardConstraints::new(n, None, |_, _| true)
    }

    #[test]
    fn defaults_respect_minimum_hairpin_and_span() {
        let hc = HardConstraints::new(20, Some(8), |_, _| true);
        assert!(!hc.allowed(1, 4, LoopContext::ALL));
        assert!(hc.allowed(1, 5, LoopContext::EXTERIOR));
        assert!(hc.allowed(1, 9, LoopContext::HAIRPIN));
        assert!(!hc.allowed(1, 10, LoopContext::ALL));
        assert!(hc.allowed_unpaired_range(1, 20, LoopContext::EXTERIOR));
    }

    #[test]
    fn defaults_follow_pairing_predicate() {
        let hc = HardConstraints::new(12, None, |i, j| (i + j) % 2 == 1);
        assert!(hc.allowed(1, 6, LoopContext::ALL));
        assert!(!hc.allowed(1, 7, LoopContext::ALL));
    }

    #[test]
    fn force_pair_removes_competitors_and_crossing_pairs() {
        let mut hc = open(20);
        hc.force_pair(5, 15, LoopContext::ALL).unwrap();

        assert!(hc.allowed(5, 15, LoopContext::EXTERIOR));
        assert!(!hc.allowed(5, 12, LoopContext::ALL));
        assert!(!hc.allowed(1, 15, LoopContext::ALL));
        assert!(!hc.allowed(2, 10, LoopContext::ALL));
        assert!(!hc.allowed(10, 19, LoopContext::ALL));
        assert!(hc.allowed(6, 14, LoopContext::ALL));
        assert!(hc.allowed(1, 20, LoopContext::ALL));
        assert!(!hc.allowed_unpaired(5, LoopContext::UNPAIRED_ALL));
        assert_eq!(hc.state(15), PositionState::Paired(5));
        assert!(!hc.allowed_unpaired_range(3, 7, LoopContext::EXTERIOR));
        assert!(hc.allowed_unpaired_range(6, 14, LoopContext::HAIRPIN));
    }

    #[test]
    fn force_pair_rejects_non_complementary_pair() {
        let mut hc = HardConstraints::new(12, None, |i, _| i != 2);
        let err = hc.force_pair(2, 10, LoopContext::ALL).unwrap_err();
        assert!(matches!(err, ConstraintError::Conflict(_)));
    }

    #[test]
    fn force_pair_rejects_too_short_pair_and_bad_positions() {
        let mut hc = open(10);
        assert!(matches!(
            hc.force_pair(1, 4, LoopContext::ALL),
            Err(ConstraintError::Conflict(_))
        ));
        assert!(matches!(
            hc.force_pair(1, 11, LoopContext::ALL),
            Err(ConstraintError::OutOfRange { position: 11, .. })
        ));
        assert!(matches!(
            hc.force_pair(8, 2, LoopContext::ALL),
            Err(ConstraintError::InvalidPair { i: 8, j: 2 })
        ));
    }

    #[test]
    fn conflicting_forced_pairs_are_rejected() {
        let mut hc = open(20);
        hc.force_pair(2, 10, LoopContext::ALL).unwrap();
        assert!(hc.force_pair(2, 12, LoopContext::ALL).is_err());
        assert!(hc.force_pair(5, 15, LoopContext::ALL).is_err());
        assert!(hc.force_unpaired(10, LoopContext::ALL).is_err());
        assert!(hc.prohibit_pair(2, 10, LoopContext::ALL).is_err());
    }

    #[test]
    fn forcing_unpaired_a_must_pair_position_conflicts() {
        let mut hc = open(12);
        hc.force_paired(3).unwrap();
        assert!(matches!(
            hc.force_unpaired(3, LoopContext::ALL),
            Err(ConstraintError::Conflict(_))
        ));
    }

    #[test]
    fn later_pair_overrides_earlier_unpaired() {
        let mut hc = open(12);
        hc.force_unpaired(2, LoopContext::ALL).unwrap();
        assert!(!hc.allowed(2, 9, LoopContext::ALL));
        hc.force_pair(2, 9, LoopContext::ALL).unwrap();
        assert!(hc.allowed(2, 9, LoopContext::ALL));
        assert_eq!(hc.state(2), PositionState::Paired(9));
    }

    #[test]
    fn prohibit_pair_removes_only_requested_contexts() {
        let mut hc = open(12);
        hc.prohibit_pair(1, 10, LoopContext::HAIRPIN).unwrap();
        assert!(!hc.allowed(1, 10, LoopContext::HAIRPIN));
        assert!(hc.allowed(1, 10, LoopContext::EXTERIOR));
    }

    #[test]
    fn allow_pair_enables_non_canonical_pairs() {
        let mut hc = HardConstraints::new(12, None, |_, _| false);
        assert!(!hc.allowed(2, 9, LoopContext::ALL));
        hc.allow_pair(2, 9, LoopContext::ALL).unwrap();
        assert!(hc.allowed(2, 9, LoopContext::ALL));
        hc.force_pair(2, 9, LoopContext::ALL).unwrap();
    }

    #[test]
    fn directional_constraints_remove_opposite_partners() {
        let mut hc = open(20);
        hc.pairs_downstream(10).unwrap();
        assert!(!hc.allowed(1, 10, LoopContext::ALL));
        assert!(hc.allowed(10, 18, LoopContext::ALL));
        assert_eq!(hc.state(10), PositionState::MustPair);

        hc.pairs_upstream(12).unwrap();
        assert!(!hc.allowed(12, 20, LoopContext::ALL));
        assert!(hc.allowed(2, 12, LoopContext::ALL));
    }

    #[test]
    fn validate_detects_must_pair_without_partner() {
        let mut hc = HardConstraints::new(10, None, |i, j| i != 5 && j != 5);
        hc.force_paired(5).unwrap();
        assert!(matches!(hc.validate(), Err(ConstraintError::Conflict(_))));

        let mut ok = open(10);
        ok.force_paired(5).unwrap();
        assert!(ok.validate().is_ok());
    }

    struct NoHairpinClosingAt(usize, usize);

    impl HardConstraint for NoHairpinClosingAt {
        fn allowed(&self, i: usize, j: usize, context: LoopContext) -> bool {
            (i, j) != (self.0, self.1) || context != LoopContext::HAIRPIN
        }
    }

    struct NeverUnpaired(usize);

    impl HardConstraint for NeverUnpaired {
        fn allowed_unpaired(&self, i: usize, _context: LoopContext) -> bool {
            i != self.0
        }
    }

    #[test]
    fn filter_removes_only_the_rejected_context() {
        let mut hc = open(12);
        hc.set_filter(Some(&NoHairpinClosingAt(2, 9)));
        assert!(!hc.allowed(2, 9, LoopContext::HAIRPIN));
        assert!(hc.allowed(2, 9, LoopContext::EXTERIOR));
        assert_eq!(hc.pair_contexts(2, 9), LoopContext::ALL & !LoopContext::HAIRPIN);
        assert!(hc.allowed(2, 10, LoopContext::HAIRPIN));

        hc.set_filter(None);
        assert!(hc.allowed(2, 9, LoopContext::HAIRPIN));
    }

    #[test]
    fn filter_composes_with_commands() {
        let mut hc = HardConstraints::new(12, None, |_, _| false);
        hc.set_filter(Some(&NoHairpinClosingAt(2, 9)));
        hc.allow_pair(2, 9, LoopContext::HAIRPIN | LoopContext::EXTERIOR).unwrap();
        assert!(!hc.allowed(2, 9, LoopContext::HAIRPIN));
        assert!(hc.allowed(2, 9, LoopContext::EXTERIOR));

        hc.prohibit_pair(2, 9, LoopContext::EXTERIOR).unwrap();
        assert!(!hc.allowed(2, 9, LoopContext::ALL));
    }

    #[test]
    fn filtered_unpaired_base_breaks_every_run() {
        let mut hc = open(10);
        hc.set_filter(Some(&NeverUnpaired(4)));
        assert!(!hc.allowed_unpaired(4, LoopContext::UNPAIRED_ALL));
        assert!(!hc.allowed_unpaired_range(1, 10, LoopContext::EXTERIOR));
        assert!(!hc.allowed_unpaired_range(3, 5, LoopContext::HAIRPIN));
        assert!(hc.allowed_unpaired_range(5, 10, LoopContext::MULTIBRANCH));
    }

    #[test]
    fn validate_rejects_forced_choices_the_filter_vetoes() {
        let mut hc = open(12);
        hc.force_pair(2, 9, LoopContext::HAIRPIN).unwrap();
        hc.set_filter(Some(&NoHairpinClosingAt(2, 9)));
        assert!(matches!(hc.validate(), Err(ConstraintError::Conflict(_))));

        let mut hc = open(12);
        hc.force_unpaired(4, LoopContext::ALL).unwrap();
        hc.set_filter(Some(&NeverUnpaired(4)));
        assert!(matches!(hc.validate(), Err(ConstraintError::Conflict(_))));
    }

    #[test]
    fn unpaired_context_restriction_is_honoured() {
        let mut hc = open(10);
        hc.force_unpaired(4, LoopContext::HAIRPIN).unwrap();
        assert!(hc.allowed_unpaired(4, LoopContext::HAIRPIN));
        assert!(!hc.allowed_unpaired(4, LoopContext::EXTERIOR));
        assert!(!hc.allowed_unpaired_range(1, 10, LoopContext::EXTERIOR));
        assert!(hc.allowed_unpaired_range(1, 10, LoopContext::HAIRPIN));
    }
}
