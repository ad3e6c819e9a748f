/// Word count of a long line (§3).
pub const LONG_LINE_SIZE: usize = 108;
/// Word count of a fast line.
pub const FAST_LINE_SIZE: usize = 4;
/// Number of long lines, 0..19.
pub const LONG_LINE_COUNT: usize = 20;
/// Number of fast lines, 20..23.
pub const FAST_LINE_COUNT: usize = 4;

/// One of the 32 command-word-addressable source/destination lines (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// 108-word recirculating track, `0..=19`.
    Long(u8),
    /// 4-word recirculating track, `20..=23`.
    Fast(u8),
    /// MQ, the multiplier-quotient register (line 24).
    Mq,
    /// ID, the multiplicand-divisor register (line 25).
    Id,
    /// PN, the product-remainder register (line 26).
    Pn,
    /// TEST: not stored, writes drive CQ (line 27).
    Test,
    /// AR, the single-word accumulator (line 28).
    Ar,
    /// Read-only synthesized source (line20 AND IR) (line 29).
    Syn29,
    /// Read-only synthesized source (NOT line20 AND line21) (line 30).
    Syn30,
    /// Read-only synthesized source (line20 AND line21) (line 31).
    Syn31,
}

impl Line {
    /// Decode a command-word field value (0..=31) into a [`Line`].
    ///
    /// # Panics
    /// Panics if `n > 31`; the command decoder masks fields to 5 bits before
    /// this is ever called, so an out-of-range value here is a decode bug.
    #[must_use]
    pub fn from_field(n: u8) -> Self {
        match n {
            0..=19 => Line::Long(n),
            20..=23 => Line::Fast(n - 20),
            24 => Line::Mq,
            25 => Line::Id,
            26 => Line::Pn,
            27 => Line::Test,
            28 => Line::Ar,
            29 => Line::Syn29,
            30 => Line::Syn30,
            31 => Line::Syn31,
            other => panic!("line field {other} out of range 0..=31"),
        }
    }

    /// The command-word field value for this line.
    #[must_use]
    pub fn field(self) -> u8 {
        match self {
            Line::Long(n) => n,
            Line::Fast(n) => n + 20,
            Line::Mq => 24,
            Line::Id => 25,
            Line::Pn => 26,
            Line::Test => 27,
            Line::Ar => 28,
            Line::Syn29 => 29,
            Line::Syn30 => 30,
            Line::Syn31 => 31,
        }
    }

    /// True for lines 0..=23, the ones "Via AR" and characteristic handling
    /// treat as ordinary drum lines rather than registers.
    #[must_use]
    pub fn is_ordinary(self) -> bool {
        matches!(self, Line::Long(_) | Line::Fast(_))
    }
}
