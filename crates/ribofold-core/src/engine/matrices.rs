use super::grammar::{Cell, Nonterminal};
use crate::core::energy::INF;
use crate::core::structure::{BasePair, SecondaryStructure, StructureError};

/// Upper-triangular matrix over 1-based `(i, j)`, `i <= j <= n`, restricted
/// to `j - i <= span`.
///
/// Reads outside the stored band return the sentinel.
#[derive(Debug, Clone)]
pub struct DpMatrix<T: Copy> {
    n: usize,
    span: usize,
    offsets: Vec<usize>,
    data: Vec<T>,
    sentinel: T,
}

impl<T: Copy> DpMatrix<T> {
    pub fn new(n: usize, span: usize, init: T, sentinel: T) -> Self {
        let mut offsets = vec![0; n + 2];
        for i in 1..=n {
            offsets[i + 1] = offsets[i] + (i + span).min(n) - i + 1;
        }
        let cells = offsets[n + 1];
        Self {
            n,
            span,
            offsets,
            data: vec![init; cells],
            sentinel,
        }
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> Option<usize> {
        if i == 0 || j > self.n || j < i || j - i > self.span {
            None
        } else {
            Some(self.offsets[i] + (j - i))
        }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.index(i, j).map_or(self.sentinel, |idx| self.data[idx])
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        if let Some(idx) = self.index(i, j) {
            self.data[idx] = value;
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
}

/// Filled minimum free energy matrices, in dcal/mol.
#[derive(Debug, Clone)]
pub struct MfeMatrices {
    /// `(i, j)` paired.
    pub cc: DpMatrix<i32>,
    /// `(i, j)` paired and stacked on `(i + 1, j - 1)`; only kept when
    /// lonely pairs are excluded.
    pub c: Option<DpMatrix<i32>>,
    /// Multiloop segment with at least one branch.
    pub fml: DpMatrix<i32>,
    /// Multiloop segment with exactly one branch starting at `i`.
    pub fm1: DpMatrix<i32>,
    /// Exterior prefix `1..=j`, indexed `0..=n`.
    pub f5: Vec<i32>,
}

impl MfeMatrices {
    pub fn new(n: usize, span: usize, no_lp: bool) -> Self {
        let matrix = || DpMatrix::new(n, span, INF, INF);
        Self {
            cc: matrix(),
            c: no_lp.then(matrix),
            fml: matrix(),
            fm1: matrix(),
            f5: vec![0; n + 1],
        }
    }

    #[inline]
    pub fn value(&self, cell: Cell) -> i32 {
        match cell.nt {
            Nonterminal::Pair => self.cc.get(cell.i, cell.j),
            Nonterminal::Stem => self.c.as_ref().unwrap_or(&self.cc).get(cell.i, cell.j),
            Nonterminal::Multi => self.fml.get(cell.i, cell.j),
            Nonterminal::MultiOne => self.fm1.get(cell.i, cell.j),
            Nonterminal::Exterior => self.f5.get(cell.j).copied().unwrap_or(INF),
        }
    }

    pub fn mfe(&self) -> i32 {
        self.f5.last().copied().unwrap_or(INF)
    }
}

/// Scaled partition functions.
///
/// Every interval value over `i..=j` is divided by `pf_scale^(j - i + 1)`;
/// `q5[j]` by `pf_scale^j` and `q3[i]` by `pf_scale^(n - i + 1)`.
#[derive(Debug, Clone)]
pub struct PfMatrices {
    pub qcc: DpMatrix<f64>,
    pub qc: Option<DpMatrix<f64>>,
    pub qml: DpMatrix<f64>,
    pub qm1: DpMatrix<f64>,
    /// Exterior prefix `1..=j`, indexed `0..=n`.
    pub q5: Vec<f64>,
    /// Exterior suffix `i..=n`, indexed `1..=n + 1`.
    pub q3: Vec<f64>,
    /// `scale[u] = pf_scale^-u`.
    pub scale: Vec<f64>,
    pub pf_scale: f64,
    /// Effective thermal energy in cal/mol (multiplied by the number of
    /// sequences for alignments).
    pub kt: f64,
}

impl PfMatrices {
    pub fn new(n: usize, span: usize, no_lp: bool, pf_scale: f64, kt: f64) -> Self {
        let matrix = || DpMatrix::new(n, span, 0.0, 0.0);
        let mut scale = vec![1.0; n + 2];
        for u in 1..scale.len() {
            scale[u] = scale[u - 1] / pf_scale;
        }
        let mut q3 = vec![0.0; n + 2];
        q3[n + 1] = 1.0;
        let mut q5 = vec![0.0; n + 1];
        q5[0] = 1.0;
        Self {
            qcc: matrix(),
            qc: no_lp.then(matrix),
            qml: matrix(),
            qm1: matrix(),
            q5,
            q3,
            scale,
            pf_scale,
            kt,
        }
    }

    #[inline]
    pub fn value(&self, cell: Cell) -> f64 {
        match cell.nt {
            Nonterminal::Pair => self.qcc.get(cell.i, cell.j),
            Nonterminal::Stem => self.qc.as_ref().unwrap_or(&self.qcc).get(cell.i, cell.j),
            Nonterminal::Multi => self.qml.get(cell.i, cell.j),
            Nonterminal::MultiOne => self.qm1.get(cell.i, cell.j),
            Nonterminal::Exterior => self.q5.get(cell.j).copied().unwrap_or(0.0),
        }
    }

    pub fn len(&self) -> usize {
        self.q5.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scaled partition function of the whole sequence.
    pub fn total(&self) -> f64 {
        self.q5.last().copied().unwrap_or(0.0)
    }

    /// Natural logarithm of the unscaled partition function.
    pub fn ln_z(&self) -> f64 {
        self.total().ln() + self.len() as f64 * self.pf_scale.ln()
    }
}

/// Equilibrium base-pair probabilities.
#[derive(Debug, Clone)]
pub struct ProbabilityMatrix {
    n: usize,
    probs: DpMatrix<f64>,
}

impl ProbabilityMatrix {
    pub(crate) fn new(n: usize, span: usize) -> Self {
        Self {
            n,
            probs: DpMatrix::new(n, span, 0.0, 0.0),
        }
    }

    pub(crate) fn set(&mut self, i: usize, j: usize, p: f64) {
        self.probs.set(i, j, p);
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Probability of pair `(i, j)`; argument order does not matter.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i < j { self.probs.get(i, j) } else { self.probs.get(j, i) }
    }

    /// Sparse export of every pair with probability at least `threshold`,
    /// ordered by pair.
    pub fn pairs_above(&self, threshold: f64) -> Vec<(BasePair, f64)> {
        let span = self.probs.span();
        (1..=self.n)
            .flat_map(|i| ((i + 1)..=(i + span).min(self.n)).map(move |j| (i, j)))
            .filter_map(|(i, j)| {
                let p = self.probs.get(i, j);
                (p > 0.0 && p >= threshold).then_some((BasePair { i, j }, p))
            })
            .collect()
    }

    /// Total probability that `i` is paired with anything.
    pub fn paired(&self, i: usize) -> f64 {
        let span = self.probs.span();
        let lo = i.saturating_sub(span).max(1);
        let hi = (i + span).min(self.n);
        (lo..i).map(|k| self.probs.get(k, i)).sum::<f64>()
            + ((i + 1)..=hi).map(|l| self.probs.get(i, l)).sum::<f64>()
    }

    pub fn unpaired(&self, i: usize) -> f64 {
        (1.0 - self.paired(i)).max(0.0)
    }

    /// Structure made of every pair with probability above one half.
    pub fn centroid(&self) -> Result<SecondaryStructure, StructureError> {
        let pairs = self
            .pairs_above(0.5)
            .into_iter()
            .filter(|&(_, p)| p > 0.5)
            .map(|(pair, _)| pair);
        SecondaryStructure::from_pairs(self.n, pairs)
    }
}
