//! Drum storage and word-time synchronization for the Bendix G-15.
//!
//! Everything in the machine is timed off one rotating position, `L`
//! (0..108). This crate owns that register, the physical lines that wrap
//! around it, and the handful of primitives ([`compute_drum_count`],
//! [`WaitSignal`]) that let the processor and I/O subsystem agree on how far
//! apart two word-times are without either of them knowing about the other.

mod drum;
mod error;
mod line;
mod partner;
mod timing;

pub use drum::{Drum, Stepper};
pub use error::DrumError;
pub use line::{Line, FAST_LINE_SIZE, LONG_LINE_SIZE};
pub use partner::{DrumPartner, NoPartner};
pub use timing::{compute_drum_count, Clock, WaitSignal};

#[cfg(feature = "snapshot")]
pub use drum::DrumSnapshot;
