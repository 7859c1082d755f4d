use super::alphabet::{Base, BaseCode};
use super::SequenceError;
use std::fmt;

/// An immutable, encoded RNA sequence.
///
/// Positions are 1-based. The encoded array carries a sentinel (code `0`)
/// at index `0` and at index `n + 1`, so neighbour lookups at the ends never
/// need a bounds check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    text: String,
    encoded: Vec<BaseCode>,
}

impl Sequence {
    pub fn parse(raw: &str) -> Result<Self, SequenceError> {
        let mut text = String::with_capacity(raw.len());
        let mut encoded = Vec::with_capacity(raw.len() + 2);
        encoded.push(0);

        for (idx, symbol) in raw.chars().filter(|c| !c.is_whitespace()).enumerate() {
            let base = Base::try_from(symbol).map_err(|_| SequenceError::InvalidSymbol {
                symbol,
                position: idx + 1,
            })?;
            text.push(base.to_char());
            encoded.push(base.code());
        }

        if text.is_empty() {
            return Err(SequenceError::Empty);
        }

        encoded.push(0);
        Ok(Self { text, encoded })
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Encoded base at `i`; `0` outside `1..=n`.
    #[inline]
    pub fn code(&self, i: usize) -> BaseCode {
        self.encoded.get(i).copied().unwrap_or(0)
    }

    pub fn base(&self, i: usize) -> Base {
        Base::from_code(self.code(i))
    }

    /// The full encoded array including both sentinels.
    pub fn encoded(&self) -> &[BaseCode] {
        &self.encoded
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Normalised subsequence `i..=j` (1-based, inclusive).
    pub fn slice(&self, i: usize, j: usize) -> &str {
        &self.text[i - 1..j]
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_dna_and_case() {
        let seq = Sequence::parse("acgT").unwrap();
        assert_eq!(seq.as_str(), "ACGU");
        assert_eq!(seq.len(), 4);
    }

    #[test]
    fn encoded_array_has_sentinels_at_both_ends() {
        let seq = Sequence::parse("GCA").unwrap();
        assert_eq!(seq.encoded(), &[0, 3, 2, 1, 0]);
        assert_eq!(seq.code(0), 0);
        assert_eq!(seq.code(4), 0);
        assert_eq!(seq.code(99), 0);
    }

    #[test]
    fn parse_rejects_empty_input() {
        assert_eq!(Sequence::parse(""), Err(SequenceError::Empty));
        assert_eq!(Sequence::parse("  \n"), Err(SequenceError::Empty));
    }

    #[test]
    fn parse_reports_position_of_invalid_symbol() {
        let err = Sequence::parse("GGX").unwrap_err();
        assert_eq!(
            err,
            SequenceError::InvalidSymbol {
                symbol: 'X',
                position: 3
            }
        );
    }

    #[test]
    fn gaps_are_not_accepted_in_plain_sequences() {
        assert!(Sequence::parse("GG-CC").is_err());
    }

    #[test]
    fn slice_is_one_based_and_inclusive() {
        let seq = Sequence::parse("GGGAAACCC").unwrap();
        assert_eq!(seq.slice(3, 7), "GAAAC");
    }
}
