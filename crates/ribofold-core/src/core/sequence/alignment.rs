use super::SequenceError;
use super::alphabet::{Base, BaseCode, is_gap_symbol};
use itertools::Itertools;

/// One gapped row of an alignment with its derived coordinate maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRow {
    encoded: Vec<BaseCode>,
    gaps: Vec<bool>,
    a2s: Vec<usize>,
    s5: Vec<Option<BaseCode>>,
    s3: Vec<Option<BaseCode>>,
}

impl AlignedRow {
    fn parse(raw: &str, row: usize) -> Result<Self, SequenceError> {
        let symbols: Vec<char> = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let n = symbols.len();

        let mut encoded = vec![0; n + 2];
        let mut gaps = vec![true; n + 2];
        for (idx, &symbol) in symbols.iter().enumerate() {
            if is_gap_symbol(symbol) {
                continue;
            }
            let base = Base::try_from(symbol).map_err(|_| SequenceError::InvalidAlignmentSymbol {
                symbol,
                row: row + 1,
                column: idx + 1,
            })?;
            encoded[idx + 1] = base.code();
            gaps[idx + 1] = false;
        }

        let mut a2s = vec![0; n + 2];
        for col in 1..=n {
            a2s[col] = a2s[col - 1] + usize::from(!gaps[col]);
        }
        a2s[n + 1] = a2s[n];

        let mut s5 = vec![None; n + 2];
        let mut last = None;
        for col in 1..=n + 1 {
            s5[col] = last;
            if col <= n && !gaps[col] {
                last = Some(encoded[col]);
            }
        }

        let mut s3 = vec![None; n + 2];
        let mut next = None;
        for col in (0..=n).rev() {
            s3[col] = next;
            if col >= 1 && !gaps[col] {
                next = Some(encoded[col]);
            }
        }

        Ok(Self {
            encoded,
            gaps,
            a2s,
            s5,
            s3,
        })
    }

    #[inline]
    pub fn code(&self, col: usize) -> BaseCode {
        self.encoded.get(col).copied().unwrap_or(0)
    }

    #[inline]
    pub fn is_gap(&self, col: usize) -> bool {
        self.gaps.get(col).copied().unwrap_or(true)
    }

    /// Number of nucleotides of this row in columns `1..=col`.
    #[inline]
    pub fn a2s(&self, col: usize) -> usize {
        self.a2s[col]
    }

    /// Nearest nucleotide strictly 5' of `col`, skipping gaps.
    #[inline]
    pub fn s5(&self, col: usize) -> Option<BaseCode> {
        self.s5[col]
    }

    /// Nearest nucleotide strictly 3' of `col`, skipping gaps.
    #[inline]
    pub fn s3(&self, col: usize) -> Option<BaseCode> {
        self.s3[col]
    }

    pub fn ungapped_len(&self) -> usize {
        self.a2s[self.a2s.len() - 1]
    }
}

/// A multiple sequence alignment of equal-length gapped rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    rows: Vec<AlignedRow>,
    columns: usize,
}

impl Alignment {
    pub fn new<S: AsRef<str>>(rows: &[S]) -> Result<Self, SequenceError> {
        if rows.is_empty() {
            return Err(SequenceError::EmptyAlignment);
        }

        let parsed = rows
            .iter()
            .enumerate()
            .map(|(idx, raw)| AlignedRow::parse(raw.as_ref(), idx))
            .collect::<Result<Vec<_>, _>>()?;

        let columns = parsed[0].encoded.len() - 2;
        if columns == 0 {
            return Err(SequenceError::Empty);
        }
        for (idx, row) in parsed.iter().enumerate().skip(1) {
            let found = row.encoded.len() - 2;
            if found != columns {
                return Err(SequenceError::RaggedAlignment {
                    row: idx + 1,
                    expected: columns,
                    found,
                });
            }
        }

        Ok(Self {
            rows: parsed,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns == 0
    }

    pub fn n_seq(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    /// Mean pairwise sequence identity in percent, pooled over every pair
    /// of rows. Columns where both rows have a gap are skipped; a single row
    /// is fully identical to itself.
    pub fn mean_pairwise_identity(&self) -> f64 {
        let (mut identical, mut compared) = (0usize, 0usize);
        for (a, b) in self.rows.iter().tuple_combinations() {
            for col in 1..=self.columns {
                match (a.is_gap(col), b.is_gap(col)) {
                    (true, true) => {}
                    (false, false) => {
                        compared += 1;
                        if a.code(col) == b.code(col) {
                            identical += 1;
                        }
                    }
                    _ => compared += 1,
                }
            }
        }
        if compared == 0 {
            100.0
        } else {
            100.0 * identical as f64 / compared as f64
        }
    }

    /// Majority nucleotide per column, with `-` where gaps dominate.
    pub fn consensus_sequence(&self) -> String {
        (1..=self.columns)
            .map(|col| {
                let mut counts = [0usize; 6];
                for row in &self.rows {
                    if row.is_gap(col) {
                        counts[5] += 1;
                    } else {
                        counts[row.code(col) as usize] += 1;
                    }
                }
                let (best, _) = counts
                    .iter()
                    .enumerate()
                    .skip(1)
                    .fold((0, 0), |acc, (idx, &count)| if count > acc.1 { (idx, count) } else { acc });
                match best {
                    5 | 0 => '-',
                    code => Base::from_code(code as BaseCode).to_char(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_maps_skip_gaps() {
        let aln = Alignment::new(&["GG-AC"]).unwrap();
        let row = &aln.rows()[0];
        assert_eq!(row.a2s(1), 1);
        assert_eq!(row.a2s(3), 2);
        assert_eq!(row.a2s(5), 4);
        assert_eq!(row.ungapped_len(), 4);
        assert_eq!(row.s3(2), Some(1));
        assert_eq!(row.s5(4), Some(3));
        assert_eq!(row.s5(1), None);
        assert_eq!(row.s3(5), None);
        assert!(row.is_gap(3));
    }

    #[test]
    fn rejects_rows_of_unequal_length() {
        let err = Alignment::new(&["GGAC", "GGA"]).unwrap_err();
        assert_eq!(
            err,
            SequenceError::RaggedAlignment {
                row: 2,
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn rejects_empty_alignment() {
        let rows: [&str; 0] = [];
        assert_eq!(Alignment::new(&rows), Err(SequenceError::EmptyAlignment));
    }

    #[test]
    fn rejects_invalid_symbols_with_row_and_column() {
        let err = Alignment::new(&["GGAC", "GZAC"]).unwrap_err();
        assert_eq!(
            err,
            SequenceError::InvalidAlignmentSymbol {
                symbol: 'Z',
                row: 2,
                column: 2
            }
        );
    }

    #[test]
    fn pairwise_identity_skips_shared_gaps() {
        let single = Alignment::new(&["GGGAAACCC"]).unwrap();
        assert_eq!(single.mean_pairwise_identity(), 100.0);

        let same = Alignment::new(&["GGGAAACCC", "GGGAAACCC"]).unwrap();
        assert_eq!(same.mean_pairwise_identity(), 100.0);

        let one_gap = Alignment::new(&["GGGA-ACCC", "GGGAAACCC"]).unwrap();
        assert!((one_gap.mean_pairwise_identity() - 800.0 / 9.0).abs() < 1e-9);

        let shared_gap = Alignment::new(&["GG-A", "GG-C"]).unwrap();
        assert!((shared_gap.mean_pairwise_identity() - 200.0 / 3.0).abs() < 1e-9);

        // Three rows, three pairs: 4/4, 3/4 and 3/4 identical columns.
        let three = Alignment::new(&["GGAC", "GGAC", "GGAU"]).unwrap();
        assert!((three.mean_pairwise_identity() - 1000.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn consensus_takes_majority_base() {
        let aln = Alignment::new(&["GCA-", "GCU-", "GGU-"]).unwrap();
        assert_eq!(aln.consensus_sequence(), "GCU-");
        assert_eq!(aln.n_seq(), 3);
    }
}
