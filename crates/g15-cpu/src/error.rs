use std::fmt;

use g15_drum::DrumError;

/// Processor-level errors (§7). Invariant violations are fatal; everything
/// else the processor handles itself (a warning goes to the diagnostics
/// sink, not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// Something underneath (usually a decode bug) addressed a line
    /// outside 0..=31 or wrote an out-of-range word.
    Drum(DrumError),
    /// RC and TR were both set, or both clear, while running — the §3
    /// invariant that exactly one holds was violated.
    InconsistentState,
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drum(e) => write!(f, "drum error: {e}"),
            Self::InconsistentState => write!(f, "RC/TR invariant violated"),
        }
    }
}

impl std::error::Error for CpuError {}

impl From<DrumError> for CpuError {
    fn from(e: DrumError) -> Self {
        Self::Drum(e)
    }
}
