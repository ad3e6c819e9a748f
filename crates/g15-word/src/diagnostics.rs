use std::fmt;

/// A non-fatal event the core wants surfaced without aborting execution
/// (§7: "Command-usage warning" and "Device error" both become one of
/// these rather than a propagated `Err`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagEvent {
    /// A command-usage warning: non-fatal, hardware-equivalent behavior is
    /// applied and execution continues (e.g. DP transfer starting on an
    /// odd word, execute from L=107, an unimplemented D=31 special).
    Warning(String),
    /// A peripheral adapter has nothing to deliver and is waiting for an
    /// operator cancel; the processor keeps running.
    Hung { device: &'static str },
    /// An I/O operation finished or was canceled cleanly.
    IoFinished { code: u8 },
}

impl fmt::Display for DiagEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning(msg) => write!(f, "warning: {msg}"),
            Self::Hung { device } => write!(f, "{device} hung, awaiting cancel"),
            Self::IoFinished { code } => write!(f, "I/O command {code} finished"),
        }
    }
}

/// The event sink every subsystem reports non-fatal conditions to (§6, §7).
/// Modeled on `emu_core::Observable`'s "expose everything, never affect
/// state" shape rather than pulling in a logging crate the rest of the
/// workspace never uses.
pub trait Diagnostics {
    fn report(&mut self, event: DiagEvent);
}

/// Default sink: writes to stderr, the same place the teacher's CLI entry
/// points already print usage/error text.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl Diagnostics for StderrDiagnostics {
    fn report(&mut self, event: DiagEvent) {
        eprintln!("g15: {event}");
    }
}

/// Collects events into a `Vec` instead of printing them — used by tests
/// that need to assert on what was reported.
#[derive(Debug, Default, Clone)]
pub struct CollectingDiagnostics {
    pub events: Vec<DiagEvent>,
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&mut self, event: DiagEvent) {
        self.events.push(event);
    }
}
