use std::fmt;
use thiserror::Error;

/// Numeric code of a nucleotide as used to index energy tables.
///
/// `0` is reserved for unknown bases (`N`, ambiguity codes) and, in
/// alignments, for gaps. Codes `1..=4` are A, C, G, U.
pub type BaseCode = u8;

/// Numeric pair type as used to index energy tables.
///
/// `0` means "cannot pair", `1..=6` are the canonical pairs
/// CG, GC, GU, UG, AU, UA and `7` is the non-standard pair type used for
/// explicitly allowed non-canonical pairs and for gapped alignment rows.
pub type PairType = usize;

pub const NO_PAIR: PairType = 0;
pub const NON_STANDARD: PairType = 7;
pub const NUM_PAIR_TYPES: usize = 8;
pub const NUM_BASES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Base {
    A,
    C,
    G,
    U,
    N,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported nucleotide symbol '{symbol}'")]
pub struct InvalidSymbol {
    pub symbol: char,
}

impl Base {
    pub fn code(self) -> BaseCode {
        match self {
            Base::N => 0,
            Base::A => 1,
            Base::C => 2,
            Base::G => 3,
            Base::U => 4,
        }
    }

    pub fn from_code(code: BaseCode) -> Self {
        match code {
            1 => Base::A,
            2 => Base::C,
            3 => Base::G,
            4 => Base::U,
            _ => Base::N,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Base::A => 'A',
            Base::C => 'C',
            Base::G => 'G',
            Base::U => 'U',
            Base::N => 'N',
        }
    }
}

impl TryFrom<char> for Base {
    type Error = InvalidSymbol;

    fn try_from(symbol: char) -> Result<Self, Self::Error> {
        match symbol.to_ascii_uppercase() {
            'A' => Ok(Base::A),
            'C' => Ok(Base::C),
            'G' => Ok(Base::G),
            'U' | 'T' => Ok(Base::U),
            // IUPAC ambiguity codes fold as unknown bases.
            'N' | 'R' | 'Y' | 'K' | 'M' | 'S' | 'W' | 'B' | 'D' | 'H' | 'V' => Ok(Base::N),
            _ => Err(InvalidSymbol { symbol }),
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

pub fn is_gap_symbol(symbol: char) -> bool {
    matches!(symbol, '-' | '.' | '_' | '~')
}

/// Pair type of the bases `a` (5') and `b` (3'), or [`NO_PAIR`].
pub fn pair_type(a: BaseCode, b: BaseCode, allow_gu: bool) -> PairType {
    match (a, b) {
        (2, 3) => 1,
        (3, 2) => 2,
        (3, 4) if allow_gu => 3,
        (4, 3) if allow_gu => 4,
        (1, 4) => 5,
        (4, 1) => 6,
        _ => NO_PAIR,
    }
}

/// Type of the same pair read from the other strand, e.g. CG -> GC.
pub fn reverse_pair_type(pair: PairType) -> PairType {
    const REVERSED: [PairType; NUM_PAIR_TYPES] = [0, 2, 1, 4, 3, 6, 5, 7];
    REVERSED[pair]
}

/// Everything but GC and CG pays the terminal AU/GU penalty.
pub fn has_terminal_penalty(pair: PairType) -> bool {
    pair > 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_and_lowercase_symbols() {
        assert_eq!(Base::try_from('a'), Ok(Base::A));
        assert_eq!(Base::try_from('G'), Ok(Base::G));
        assert_eq!(Base::try_from('t'), Ok(Base::U));
    }

    #[test]
    fn ambiguity_codes_map_to_unknown_base() {
        for symbol in ['N', 'r', 'Y', 'k', 'S'] {
            assert_eq!(Base::try_from(symbol), Ok(Base::N));
        }
    }

    #[test]
    fn rejects_unsupported_symbols() {
        assert_eq!(Base::try_from('X'), Err(InvalidSymbol { symbol: 'X' }));
        assert!(Base::try_from('-').is_err());
    }

    #[test]
    fn pair_types_follow_canonical_order() {
        let (a, c, g, u) = (1, 2, 3, 4);
        assert_eq!(pair_type(c, g, true), 1);
        assert_eq!(pair_type(g, c, true), 2);
        assert_eq!(pair_type(g, u, true), 3);
        assert_eq!(pair_type(u, g, true), 4);
        assert_eq!(pair_type(a, u, true), 5);
        assert_eq!(pair_type(u, a, true), 6);
        assert_eq!(pair_type(a, g, true), NO_PAIR);
        assert_eq!(pair_type(g, u, false), NO_PAIR);
    }

    #[test]
    fn reverse_pair_type_is_an_involution() {
        for t in 0..NUM_PAIR_TYPES {
            assert_eq!(reverse_pair_type(reverse_pair_type(t)), t);
        }
        assert_eq!(reverse_pair_type(1), 2);
        assert_eq!(reverse_pair_type(5), 6);
    }
}
