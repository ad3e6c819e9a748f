use std::fmt;

/// Invariant violations the drum itself can detect (§7: "Invariant
/// violation" — fatal, stop the processor and report).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumError {
    /// A word outside `0..=WORD_MASK` was about to be stored.
    WordOutOfRange(u32),
    /// A line number outside the addressable 0..=31 command-word range.
    InvalidLine(u8),
    /// `stepper()` was called while a `Stepper` from a previous call was
    /// still outstanding — the non-reentrancy guarantee the G-15 source
    /// enforced at runtime with a promise is instead enforced here by the
    /// borrow checker; this variant exists for the rare case an adapter
    /// layer re-derives the check dynamically (e.g. across an FFI boundary).
    StepperReentered,
}

impl fmt::Display for DrumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WordOutOfRange(w) => write!(f, "word {w:#010x} exceeds the 29-bit field"),
            Self::InvalidLine(line) => write!(f, "line {line} is not addressable 0..=31"),
            Self::StepperReentered => write!(f, "stepDrum re-entered before the prior step completed"),
        }
    }
}

impl std::error::Error for DrumError {}
