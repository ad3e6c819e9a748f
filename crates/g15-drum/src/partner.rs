use crate::Drum;

/// Whoever shares the drum's clock with the caller this word-time (§4.C,
/// §5). The processor's transfer loop and the I/O coroutine each advance
/// `L` exactly once per word-time; whichever one is driving a given call
/// gives its partner a chance to act on the same (pre-advance) `L` before
/// stepping, satisfying "every subsystem sees exactly the same L when it
/// resumes" without needing real threads or an async runtime (see
/// DESIGN.md's concurrency-model note).
pub trait DrumPartner {
    /// Do one word-time's worth of work at the drum's current `L`.
    fn word_time_tick(&mut self, drum: &mut Drum);

    /// Whether this partner currently has anything to do. A processor
    /// running with no I/O in flight can skip the call entirely.
    fn is_active(&self) -> bool;
}

/// A `DrumPartner` that does nothing — used when driving the processor or
/// I/O subsystem standalone, e.g. in unit tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPartner;

impl DrumPartner for NoPartner {
    fn word_time_tick(&mut self, _drum: &mut Drum) {}
    fn is_active(&self) -> bool {
        false
    }
}
