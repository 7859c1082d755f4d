use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Set of loop contexts in which a pair or an unpaired base may occur.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoopContext(u8);

impl LoopContext {
    pub const NONE: Self = Self(0);
    /// Pair is a helix end in the exterior loop / base is exterior.
    pub const EXTERIOR: Self = Self(1);
    /// Pair closes a hairpin / base lies in a hairpin.
    pub const HAIRPIN: Self = Self(1 << 1);
    /// Pair closes an interior loop / base lies in an interior loop.
    pub const INTERIOR: Self = Self(1 << 2);
    /// Pair is the inner pair of an interior loop.
    pub const INTERIOR_ENCLOSED: Self = Self(1 << 3);
    /// Pair closes a multiloop / base lies in a multiloop.
    pub const MULTIBRANCH: Self = Self(1 << 4);
    /// Pair is a branch inside a multiloop.
    pub const MULTIBRANCH_ENCLOSED: Self = Self(1 << 5);
    pub const ALL: Self = Self(0b11_1111);

    /// Contexts meaningful for unpaired bases.
    pub const UNPAIRED_ALL: Self =
        Self(Self::EXTERIOR.0 | Self::HAIRPIN.0 | Self::INTERIOR.0 | Self::MULTIBRANCH.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Folds the enclosed-pair flags onto their loop for unpaired bases.
    pub const fn for_unpaired(self) -> Self {
        let mut bits = self.0 & Self::UNPAIRED_ALL.0;
        if self.0 & Self::INTERIOR_ENCLOSED.0 != 0 {
            bits |= Self::INTERIOR.0;
        }
        if self.0 & Self::MULTIBRANCH_ENCLOSED.0 != 0 {
            bits |= Self::MULTIBRANCH.0;
        }
        Self(bits)
    }

    /// Index of a single unpaired context in per-context lookup tables.
    pub(crate) fn unpaired_slot(self) -> Option<usize> {
        match self {
            Self::EXTERIOR => Some(0),
            Self::HAIRPIN => Some(1),
            Self::INTERIOR => Some(2),
            Self::MULTIBRANCH => Some(3),
            _ => None,
        }
    }

    pub(crate) const UNPAIRED_SLOTS: [Self; 4] =
        [Self::EXTERIOR, Self::HAIRPIN, Self::INTERIOR, Self::MULTIBRANCH];

    pub(crate) const PAIR_FLAGS: [Self; 6] = [
        Self::EXTERIOR,
        Self::HAIRPIN,
        Self::INTERIOR,
        Self::INTERIOR_ENCLOSED,
        Self::MULTIBRANCH,
        Self::MULTIBRANCH_ENCLOSED,
    ];

    /// Parses command-file context letters (`E H I i M m A`).
    pub fn parse_letters(letters: &str) -> Result<Self, char> {
        letters.chars().try_fold(Self::NONE, |acc, c| {
            let ctx = match c {
                'E' => Self::EXTERIOR,
                'H' => Self::HAIRPIN,
                'I' => Self::INTERIOR,
                'i' => Self::INTERIOR_ENCLOSED,
                'M' => Self::MULTIBRANCH,
                'm' => Self::MULTIBRANCH_ENCLOSED,
                'A' => Self::ALL,
                other => return Err(other),
            };
            Ok(acc | ctx)
        })
    }
}

impl BitOr for LoopContext {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LoopContext {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LoopContext {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for LoopContext {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for LoopContext {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Debug for LoopContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(LoopContext, char); 6] = [
            (LoopContext::EXTERIOR, 'E'),
            (LoopContext::HAIRPIN, 'H'),
            (LoopContext::INTERIOR, 'I'),
            (LoopContext::INTERIOR_ENCLOSED, 'i'),
            (LoopContext::MULTIBRANCH, 'M'),
            (LoopContext::MULTIBRANCH_ENCLOSED, 'm'),
        ];
        let letters: String = NAMES
            .iter()
            .filter(|(ctx, _)| self.contains(*ctx))
            .map(|&(_, c)| c)
            .collect();
        write!(f, "LoopContext({letters})")
    }
}
