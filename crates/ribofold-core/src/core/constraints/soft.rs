use super::context::LoopContext;
use crate::core::energy::INF;
use std::collections::HashMap;
use std::sync::Arc;

/// Largest magnitude of a single pseudo-energy entry, in dcal/mol.
pub const MAX_PSEUDO_ENERGY: i32 = 10_000;

#[inline]
fn bounded(energy: i64) -> i32 {
    energy.clamp(-(MAX_PSEUDO_ENERGY as i64), MAX_PSEUDO_ENERGY as i64) as i32
}

/// User-supplied pseudo-energies (dcal/mol) added on top of the
/// thermodynamic model.
///
/// Both hooks default to zero, so an implementation only overrides what it
/// needs. Implementations are evaluated concurrently by the parallel fills.
/// Values are clamped to `±MAX_PSEUDO_ENERGY` per pair or position.
pub trait SoftConstraint: Send + Sync {
    fn pair(&self, _i: usize, _j: usize, _context: LoopContext) -> i32 {
        0
    }

    fn unpaired(&self, _i: usize, _context: LoopContext) -> i32 {
        0
    }
}

/// Context-independent table of pair and unpaired pseudo-energies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PseudoEnergies {
    pairs: HashMap<(usize, usize), i32>,
    unpaired: HashMap<usize, i32>,
}

impl PseudoEnergies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates `energy` on pair `(i, j)`, saturating at
    /// `±MAX_PSEUDO_ENERGY`.
    pub fn add_pair(&mut self, i: usize, j: usize, energy: i32) {
        let key = if i < j { (i, j) } else { (j, i) };
        let entry = self.pairs.entry(key).or_insert(0);
        *entry = bounded(*entry as i64 + energy as i64);
    }

    /// Accumulates `energy` on position `i` staying unpaired, saturating at
    /// `±MAX_PSEUDO_ENERGY`.
    pub fn add_unpaired(&mut self, i: usize, energy: i32) {
        let entry = self.unpaired.entry(i).or_insert(0);
        *entry = bounded(*entry as i64 + energy as i64);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.unpaired.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.unpaired.clear();
    }
}

impl SoftConstraint for PseudoEnergies {
    fn pair(&self, i: usize, j: usize, _context: LoopContext) -> i32 {
        self.pairs.get(&(i, j)).copied().unwrap_or(0)
    }

    fn unpaired(&self, i: usize, _context: LoopContext) -> i32 {
        self.unpaired.get(&i).copied().unwrap_or(0)
    }
}

/// Evaluation-ready view of all soft constraints of a fold.
///
/// Unpaired contributions are turned into per-context prefix sums so that
/// any unpaired stretch costs O(1); pair contributions are looked up on
/// demand. Every value is multiplied by `scale`, the number of sequences in
/// consensus folding.
#[derive(Clone)]
pub struct SoftLayer {
    table: PseudoEnergies,
    user: Option<Arc<dyn SoftConstraint>>,
    scale: i32,
    prefix: [Vec<i64>; 4],
    active: bool,
}

impl SoftLayer {
    pub fn new(
        n: usize,
        table: &PseudoEnergies,
        user: Option<Arc<dyn SoftConstraint>>,
        scale: i32,
    ) -> Self {
        let active = !table.is_empty() || user.is_some();
        let mut prefix: [Vec<i64>; 4] = Default::default();
        for (slot, ctx) in LoopContext::UNPAIRED_SLOTS.iter().enumerate() {
            let sums = &mut prefix[slot];
            sums.resize(n + 1, 0);
            if !active {
                continue;
            }
            for p in 1..=n {
                let user_bias = user.as_ref().map_or(0, |u| bounded(u.unpaired(p, *ctx) as i64));
                let bias = bounded(table.unpaired(p, *ctx) as i64 + user_bias as i64);
                sums[p] = sums[p - 1] + bias as i64 * scale as i64;
            }
        }
        Self {
            table: table.clone(),
            user,
            scale,
            prefix,
            active,
        }
    }

    /// A layer without any contribution.
    pub fn empty(n: usize) -> Self {
        Self::new(n, &PseudoEnergies::default(), None, 1)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn pair(&self, i: usize, j: usize, ctx: LoopContext) -> i32 {
        if !self.active {
            return 0;
        }
        let user_bias = self.user.as_ref().map_or(0, |u| bounded(u.pair(i, j, ctx) as i64));
        bounded(self.table.pair(i, j, ctx) as i64 + user_bias as i64) * self.scale
    }

    #[inline]
    pub fn unpaired(&self, i: usize, ctx: LoopContext) -> i32 {
        self.unpaired_range(i, i, ctx)
    }

    /// Sum over `i..=j`; zero for empty ranges.
    #[inline]
    pub fn unpaired_range(&self, i: usize, j: usize, ctx: LoopContext) -> i32 {
        if !self.active || i > j {
            return 0;
        }
        match ctx.unpaired_slot() {
            Some(slot) => {
                let sum = self.prefix[slot][j] - self.prefix[slot][i - 1];
                sum.clamp(-(INF as i64), INF as i64) as i32
            }
            None => 0,
        }
    }
}

impl std::fmt::Debug for SoftLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftLayer")
            .field("table", &self.table)
            .field("user", &self.user.is_some())
            .field("scale", &self.scale)
            .finish()
    }
}
