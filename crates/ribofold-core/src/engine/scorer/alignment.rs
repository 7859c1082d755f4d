use super::{LoopScorer, energy_type};
use crate::core::energy::{EnergyModel, INF, TURN};
use crate::core::sequence::alphabet::{NON_STANDARD, PairType};
use crate::core::sequence::{AlignedRow, Alignment};
use crate::engine::config::{CovarianceOptions, PairScoring};
use crate::engine::matrices::DpMatrix;
use std::sync::Arc;
use tracing::debug;

/// Pairs scoring below this covariation value are not allowed to form.
const MIN_PSCORE: f64 = -200.0;

/// Hamming distance between pair types CG GC GU UG AU UA.
#[rustfmt::skip]
const PAIR_DISTANCE: [[u32; 7]; 7] = [
    [0, 0, 0, 0, 0, 0, 0],
    [0, 0, 2, 2, 1, 2, 2],
    [0, 2, 0, 1, 2, 2, 2],
    [0, 2, 1, 0, 2, 1, 2],
    [0, 1, 2, 2, 0, 2, 1],
    [0, 2, 2, 1, 2, 0, 2],
    [0, 2, 2, 2, 1, 2, 0],
];

/// Sums loop energies over the rows of an alignment and scores pairs by
/// their covariation.
#[derive(Debug, Clone)]
pub struct AlignmentScorer {
    alignment: Alignment,
    model: Arc<EnergyModel>,
    pscore: DpMatrix<i32>,
}

impl AlignmentScorer {
    pub fn new(
        alignment: Alignment,
        model: Arc<EnergyModel>,
        covariance: &CovarianceOptions,
        max_span: Option<usize>,
    ) -> Self {
        let n = alignment.len();
        let span = max_span.unwrap_or(n).min(n.saturating_sub(1));
        let mut pscore = DpMatrix::new(n, span, INF, INF);
        let weights = pair_weights(&covariance.scoring);
        let mut allowed = 0usize;
        for i in 1..=n {
            for j in (i + TURN + 1)..=(i + span).min(n) {
                let score = covariation_score(&alignment, &model, covariance, &weights, i, j);
                if score < INF {
                    allowed += 1;
                }
                pscore.set(i, j, score);
            }
        }
        debug!(
            columns = n,
            sequences = alignment.n_seq(),
            allowed_pairs = allowed,
            "Computed covariation scores."
        );
        Self {
            alignment,
            model,
            pscore,
        }
    }

    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    pub fn model(&self) -> &EnergyModel {
        &self.model
    }

    /// Covariation score of columns `(i, j)` in dcal/mol, `None` when the
    /// pair is not allowed.
    pub fn covariation(&self, i: usize, j: usize) -> Option<i32> {
        let score = self.pscore.get(i, j);
        (score < INF).then_some(score)
    }

    #[inline]
    fn row_pair(&self, row: &AlignedRow, i: usize, j: usize) -> PairType {
        energy_type(self.model.pair_type(row.code(i), row.code(j)))
    }
}

/// Substitution weights indexed by pair type, zero for type 0.
fn pair_weights(scoring: &PairScoring) -> [[f64; 7]; 7] {
    let mut weights = [[0.0; 7]; 7];
    for k in 1..=6 {
        for l in 1..=6 {
            weights[k][l] = match scoring {
                PairScoring::Hamming => PAIR_DISTANCE[k][l] as f64,
                PairScoring::Matrix { scores } => scores[k - 1][l - 1],
            };
        }
    }
    weights
}

fn covariation_score(
    alignment: &Alignment,
    model: &EnergyModel,
    covariance: &CovarianceOptions,
    weights: &[[f64; 7]; 7],
    i: usize,
    j: usize,
) -> i32 {
    let n_seq = alignment.n_seq();
    let mut freq = [0u32; 8];
    for row in alignment.rows() {
        let pair = if row.is_gap(i) && row.is_gap(j) {
            NON_STANDARD
        } else {
            model.pair_type(row.code(i), row.code(j))
        };
        freq[pair] += 1;
    }
    if (freq[0] * 2 + freq[NON_STANDARD]) as usize > n_seq {
        return INF;
    }

    let mut distance = 0.0;
    for k in 1..=6 {
        for l in k..=6 {
            distance += (freq[k] * freq[l]) as f64 * weights[k][l];
        }
    }
    let pscore = covariance.cv_fact
        * ((100.0 * distance) / n_seq as f64
            - covariance.nc_fact * 100.0 * (freq[0] as f64 + 0.25 * freq[NON_STANDARD] as f64));
    if pscore < MIN_PSCORE {
        INF
    } else {
        pscore.round() as i32
    }
}

impl LoopScorer for AlignmentScorer {
    fn len(&self) -> usize {
        self.alignment.len()
    }

    fn n_seq(&self) -> usize {
        self.alignment.n_seq()
    }

    fn can_pair(&self, i: usize, j: usize) -> bool {
        self.pscore.get(i, j) < INF
    }

    fn hairpin(&self, i: usize, j: usize) -> i32 {
        self.alignment
            .rows()
            .iter()
            .map(|row| {
                let size = row.a2s(j - 1) - row.a2s(i);
                if size < TURN {
                    self.model.gapped_hairpin()
                } else {
                    self.model.hairpin(
                        size,
                        self.row_pair(row, i, j),
                        row.s3(i).unwrap_or(0),
                        row.s5(j).unwrap_or(0),
                        None,
                    )
                }
            })
            .sum()
    }

    fn interior(&self, i: usize, j: usize, k: usize, l: usize) -> i32 {
        self.alignment
            .rows()
            .iter()
            .map(|row| {
                self.model.interior(
                    row.a2s(k - 1) - row.a2s(i),
                    row.a2s(j - 1) - row.a2s(l),
                    self.row_pair(row, i, j),
                    self.row_pair(row, l, k),
                    row.s3(i).unwrap_or(0),
                    row.s5(j).unwrap_or(0),
                    row.s5(k).unwrap_or(0),
                    row.s3(l).unwrap_or(0),
                )
            })
            .sum()
    }

    fn ml_closing(&self, i: usize, j: usize) -> i32 {
        self.alignment
            .rows()
            .iter()
            .map(|row| {
                self.model.ml_closing()
                    + self
                        .model
                        .ml_stem(self.row_pair(row, j, i), row.s5(j), row.s3(i))
            })
            .sum()
    }

    fn ml_stem(&self, i: usize, j: usize) -> i32 {
        self.alignment
            .rows()
            .iter()
            .map(|row| self.model.ml_stem(self.row_pair(row, i, j), row.s5(i), row.s3(j)))
            .sum()
    }

    fn ext_stem(&self, i: usize, j: usize) -> i32 {
        self.alignment
            .rows()
            .iter()
            .map(|row| self.model.ext_stem(self.row_pair(row, i, j), row.s5(i), row.s3(j)))
            .sum()
    }

    fn ml_unpaired(&self) -> i32 {
        self.model.ml_base() * self.alignment.n_seq() as i32
    }

    fn pair_bonus(&self, i: usize, j: usize) -> i32 {
        let score = self.pscore.get(i, j);
        if score < INF { -score } else { 0 }
    }
}
