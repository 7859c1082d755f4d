//! Loop energies in column coordinates.
//!
//! A [`LoopScorer`] answers every energy question the decomposition grammar
//! asks, for a single sequence ([`SequenceScorer`]) or summed over the rows
//! of an alignment ([`AlignmentScorer`]). Energies are in dcal/mol; for
//! alignments they are totals over all sequences.

pub mod alignment;
pub mod sequence;

pub use alignment::AlignmentScorer;
pub use sequence::SequenceScorer;

use crate::core::energy::EnergyModel;
use crate::core::sequence::alphabet::{NON_STANDARD, PairType};

pub trait LoopScorer: Send + Sync {
    /// Number of columns.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn n_seq(&self) -> usize;

    /// Whether `(i, j)` may pair under the default pairing rules.
    fn can_pair(&self, i: usize, j: usize) -> bool;

    fn hairpin(&self, i: usize, j: usize) -> i32;

    /// Interior loop closed by `(i, j)` with inner pair `(k, l)`; a stack
    /// when both sides are empty.
    fn interior(&self, i: usize, j: usize, k: usize, l: usize) -> i32;

    /// Closing pair `(i, j)` of a multiloop, penalty included.
    fn ml_closing(&self, i: usize, j: usize) -> i32;

    /// Branch `(i, j)` inside a multiloop.
    fn ml_stem(&self, i: usize, j: usize) -> i32;

    /// Helix end `(i, j)` in the exterior loop.
    fn ext_stem(&self, i: usize, j: usize) -> i32;

    /// Cost of one unpaired column inside a multiloop.
    fn ml_unpaired(&self) -> i32;

    /// Pair-specific bonus added whenever `(i, j)` forms.
    fn pair_bonus(&self, _i: usize, _j: usize) -> i32 {
        0
    }
}

/// Scorer selected by the fold compound.
#[derive(Debug, Clone)]
pub enum Scorer {
    Sequence(SequenceScorer),
    Alignment(AlignmentScorer),
}

impl Scorer {
    pub fn model(&self) -> &EnergyModel {
        match self {
            Scorer::Sequence(s) => s.model(),
            Scorer::Alignment(s) => s.model(),
        }
    }

    /// Thermal energy in cal/mol scaled by the number of sequences, so that
    /// Boltzmann weights of summed alignment energies stay per-sequence.
    pub fn effective_kt(&self) -> f64 {
        self.model().kt() * self.n_seq() as f64
    }
}

impl LoopScorer for Scorer {
    fn len(&self) -> usize {
        match self {
            Scorer::Sequence(s) => s.len(),
            Scorer::Alignment(s) => s.len(),
        }
    }

    fn n_seq(&self) -> usize {
        match self {
            Scorer::Sequence(s) => s.n_seq(),
            Scorer::Alignment(s) => s.n_seq(),
        }
    }

    #[inline]
    fn can_pair(&self, i: usize, j: usize) -> bool {
        match self {
            Scorer::Sequence(s) => s.can_pair(i, j),
            Scorer::Alignment(s) => s.can_pair(i, j),
        }
    }

    #[inline]
    fn hairpin(&self, i: usize, j: usize) -> i32 {
        match self {
            Scorer::Sequence(s) => s.hairpin(i, j),
            Scorer::Alignment(s) => s.hairpin(i, j),
        }
    }

    #[inline]
    fn interior(&self, i: usize, j: usize, k: usize, l: usize) -> i32 {
        match self {
            Scorer::Sequence(s) => s.interior(i, j, k, l),
            Scorer::Alignment(s) => s.interior(i, j, k, l),
        }
    }

    #[inline]
    fn ml_closing(&self, i: usize, j: usize) -> i32 {
        match self {
            Scorer::Sequence(s) => s.ml_closing(i, j),
            Scorer::Alignment(s) => s.ml_closing(i, j),
        }
    }

    #[inline]
    fn ml_stem(&self, i: usize, j: usize) -> i32 {
        match self {
            Scorer::Sequence(s) => s.ml_stem(i, j),
            Scorer::Alignment(s) => s.ml_stem(i, j),
        }
    }

    #[inline]
    fn ext_stem(&self, i: usize, j: usize) -> i32 {
        match self {
            Scorer::Sequence(s) => s.ext_stem(i, j),
            Scorer::Alignment(s) => s.ext_stem(i, j),
        }
    }

    #[inline]
    fn ml_unpaired(&self) -> i32 {
        match self {
            Scorer::Sequence(s) => s.ml_unpaired(),
            Scorer::Alignment(s) => s.ml_unpaired(),
        }
    }

    #[inline]
    fn pair_bonus(&self, i: usize, j: usize) -> i32 {
        match self {
            Scorer::Sequence(s) => s.pair_bonus(i, j),
            Scorer::Alignment(s) => s.pair_bonus(i, j),
        }
    }
}

/// Non-complementary pairs that were explicitly allowed are scored as
/// non-standard.
#[inline]
pub(crate) fn energy_type(pair: PairType) -> PairType {
    if pair == 0 { NON_STANDARD } else { pair }
}
