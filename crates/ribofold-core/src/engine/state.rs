use crate::core::structure::{BasePair, SecondaryStructure};
use std::cmp::Ordering;

/// Converts a total score in dcal/mol to kcal/mol per sequence.
#[inline]
pub(crate) fn kcal_per_sequence(score: i32, n_seq: usize) -> f64 {
    score as f64 / (100.0 * n_seq.max(1) as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MfeResult {
    pub structure: SecondaryStructure,
    /// Free energy in kcal/mol, averaged per sequence for alignments.
    pub energy: f64,
    /// Integer objective of the fill in dcal/mol, soft bias and covariance
    /// included, summed over all sequences.
    pub score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionResult {
    /// Natural logarithm of the unscaled partition function.
    pub ln_z: f64,
    /// Ensemble free energy in kcal/mol per sequence.
    pub ensemble_energy: f64,
    /// Per-nucleotide scale factor the fill settled on.
    pub pf_scale: f64,
}

#[derive(Debug, Clone)]
pub struct SuboptStructure {
    pub structure: SecondaryStructure,
    pub energy: f64,
    pub score: i32,
}

impl PartialEq for SuboptStructure {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.structure == other.structure
    }
}
impl Eq for SuboptStructure {}

impl PartialOrd for SuboptStructure {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SuboptStructure {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| self.structure.pairs().cmp(&other.structure.pairs()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub structure: SecondaryStructure,
    /// Free energy of the sampled structure in kcal/mol per sequence.
    pub energy: f64,
}

/// Energy of a given structure, in kcal/mol per sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// `free_energy + covariance`.
    pub energy: f64,
    pub free_energy: f64,
    pub covariance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusPair {
    pub pair: BasePair,
    /// Covariation score in kcal/mol; positive values support the pair.
    pub covariation: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusResult {
    pub structure: SecondaryStructure,
    pub consensus_sequence: String,
    /// Pseudo free energy: `free_energy + covariance`.
    pub energy: f64,
    pub free_energy: f64,
    pub covariance: f64,
    pub pairs: Vec<ConsensusPair>,
}
