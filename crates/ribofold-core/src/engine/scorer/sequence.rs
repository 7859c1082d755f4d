use super::{LoopScorer, energy_type};
use crate::core::energy::EnergyModel;
use crate::core::sequence::Sequence;
use crate::core::sequence::alphabet::PairType;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SequenceScorer {
    sequence: Sequence,
    model: Arc<EnergyModel>,
}

impl SequenceScorer {
    pub fn new(sequence: Sequence, model: Arc<EnergyModel>) -> Self {
        Self { sequence, model }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn model(&self) -> &EnergyModel {
        &self.model
    }

    #[inline]
    fn pair(&self, i: usize, j: usize) -> PairType {
        energy_type(self.model.pair_type(self.sequence.code(i), self.sequence.code(j)))
    }

    #[inline]
    fn neighbour(&self, p: usize) -> Option<u8> {
        (1..=self.sequence.len()).contains(&p).then(|| self.sequence.code(p))
    }
}

impl LoopScorer for SequenceScorer {
    fn len(&self) -> usize {
        self.sequence.len()
    }

    fn n_seq(&self) -> usize {
        1
    }

    fn can_pair(&self, i: usize, j: usize) -> bool {
        self.model.pair_type(self.sequence.code(i), self.sequence.code(j)) != 0
    }

    fn hairpin(&self, i: usize, j: usize) -> i32 {
        let size = j - i - 1;
        let loop_seq = matches!(size, 3 | 4 | 6).then(|| self.sequence.slice(i, j));
        self.model.hairpin(
            size,
            self.pair(i, j),
            self.sequence.code(i + 1),
            self.sequence.code(j - 1),
            loop_seq,
        )
    }

    fn interior(&self, i: usize, j: usize, k: usize, l: usize) -> i32 {
        let s = &self.sequence;
        self.model.interior(
            k - i - 1,
            j - l - 1,
            self.pair(i, j),
            self.pair(l, k),
            s.code(i + 1),
            s.code(j - 1),
            s.code(k - 1),
            s.code(l + 1),
        )
    }

    fn ml_closing(&self, i: usize, j: usize) -> i32 {
        let s = &self.sequence;
        self.model.ml_closing()
            + self
                .model
                .ml_stem(self.pair(j, i), Some(s.code(j - 1)), Some(s.code(i + 1)))
    }

    fn ml_stem(&self, i: usize, j: usize) -> i32 {
        self.model
            .ml_stem(self.pair(i, j), Some(self.sequence.code(i - 1)), Some(self.sequence.code(j + 1)))
    }

    fn ext_stem(&self, i: usize, j: usize) -> i32 {
        self.model
            .ext_stem(self.pair(i, j), self.neighbour(i - 1), self.neighbour(j + 1))
    }

    fn ml_unpaired(&self) -> i32 {
        self.model.ml_base()
    }
}
