use super::StructureError;
use std::fmt;

/// A base pair between the 1-based positions `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasePair {
    pub i: usize,
    pub j: usize,
}

impl BasePair {
    pub fn new(i: usize, j: usize) -> Self {
        if i < j { Self { i, j } } else { Self { i: j, j: i } }
    }
}

impl fmt::Display for BasePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

/// Pseudoknot-free secondary structure stored as a partner table.
///
/// `partners[i]` holds the partner of position `i` or `0` when unpaired;
/// index `0` is unused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecondaryStructure {
    partners: Vec<usize>,
}

impl SecondaryStructure {
    pub fn unpaired(len: usize) -> Self {
        Self {
            partners: vec![0; len + 1],
        }
    }

    pub fn from_dot_bracket(text: &str) -> Result<Self, StructureError> {
        let symbols: Vec<char> = text.trim().chars().collect();
        let mut structure = Self::unpaired(symbols.len());
        let mut open = Vec::new();

        for (idx, &symbol) in symbols.iter().enumerate() {
            let position = idx + 1;
            match symbol {
                '.' => {}
                '(' => open.push(position),
                ')' => {
                    let i = open
                        .pop()
                        .ok_or(StructureError::UnbalancedClose { position })?;
                    structure.partners[i] = position;
                    structure.partners[position] = i;
                }
                _ => return Err(StructureError::InvalidSymbol { symbol, position }),
            }
        }

        if let Some(&position) = open.last() {
            return Err(StructureError::UnclosedOpen { position });
        }
        Ok(structure)
    }

    /// Builds a structure from a pair list, rejecting shared positions and
    /// crossing pairs.
    pub fn from_pairs<I>(len: usize, pairs: I) -> Result<Self, StructureError>
    where
        I: IntoIterator<Item = BasePair>,
    {
        let mut structure = Self::unpaired(len);
        for pair in pairs {
            if pair.i == 0 || pair.j > len || pair.i >= pair.j {
                return Err(StructureError::PairOutOfRange {
                    i: pair.i,
                    j: pair.j,
                    len,
                });
            }
            if structure.partners[pair.i] != 0 || structure.partners[pair.j] != 0 {
                return Err(StructureError::SharedPosition {
                    i: pair.i,
                    j: pair.j,
                });
            }
            structure.partners[pair.i] = pair.j;
            structure.partners[pair.j] = pair.i;
        }

        if let Some((first, second)) = structure.first_crossing() {
            return Err(StructureError::Crossing { first, second });
        }
        Ok(structure)
    }

    pub fn len(&self) -> usize {
        self.partners.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn partner(&self, i: usize) -> Option<usize> {
        match self.partners.get(i) {
            Some(&p) if p != 0 => Some(p),
            _ => None,
        }
    }

    pub fn pairs(&self) -> Vec<BasePair> {
        (1..=self.len())
            .filter_map(|i| {
                let j = self.partners[i];
                (j > i).then_some(BasePair { i, j })
            })
            .collect()
    }

    pub fn pair_count(&self) -> usize {
        (1..=self.len()).filter(|&i| self.partners[i] > i).count()
    }

    pub fn to_dot_bracket(&self) -> String {
        (1..=self.len())
            .map(|i| match self.partners[i] {
                0 => '.',
                p if p > i => '(',
                _ => ')',
            })
            .collect()
    }

    /// Pairs directly enclosed by `(i, j)`, or by the exterior loop when
    /// `outer` is `None`.
    pub fn branches(&self, outer: Option<BasePair>) -> Vec<BasePair> {
        let (mut p, end) = match outer {
            Some(pair) => (pair.i + 1, pair.j),
            None => (1, self.len() + 1),
        };
        let mut inner = Vec::new();
        while p < end {
            match self.partners[p] {
                q if q > p => {
                    inner.push(BasePair { i: p, j: q });
                    p = q + 1;
                }
                _ => p += 1,
            }
        }
        inner
    }

    fn first_crossing(&self) -> Option<(BasePair, BasePair)> {
        let mut stack: Vec<BasePair> = Vec::new();
        for p in 1..=self.len() {
            let q = self.partners[p];
            if q == 0 {
                continue;
            }
            if q > p {
                stack.push(BasePair { i: p, j: q });
            } else {
                let top = stack.pop()?;
                if top.i != q {
                    return Some((top, BasePair { i: q, j: p }));
                }
            }
        }
        None
    }
}

impl fmt::Display for SecondaryStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dot_bracket())
    }
}
