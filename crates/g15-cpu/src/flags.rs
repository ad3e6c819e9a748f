use g15_word::FlipFlop;

/// The processor's flip-flops (§3). Split into its own struct per the
/// redesign guidance — these are single-bit latches, not drum words, and
/// don't belong in the `Register` grab-bag the source used.
#[derive(Debug, Default, Clone, Copy)]
pub struct Flags {
    /// BP: breakpoint bit of the command currently executing.
    pub bp: FlipFlop,
    /// C1: double-precision bit of the command currently executing.
    pub c1: FlipFlop,
    /// CG: next command comes from AR rather than the command line.
    pub cg: FlipFlop,
    /// CH: halt.
    pub ch: FlipFlop,
    /// CQ: TEST result, consumed (and cleared) by the next fetch.
    pub cq: FlipFlop,
    /// CZ: stepping disabled (single-step switch state mirrored here).
    pub cz: FlipFlop,
    /// DI: deferred bit of the command currently executing.
    pub di: FlipFlop,
    /// FO: overflow latch. Cleared only by the TEST-OVERFLOW command.
    pub fo: FlipFlop,
    /// IP: double-precision sign carrier.
    pub ip: FlipFlop,
    /// RC: ready to fetch a command.
    pub rc: FlipFlop,
    /// TR: executing a command's transfer state.
    pub tr: FlipFlop,
}

impl Flags {
    #[must_use]
    pub fn new() -> Self {
        let mut f = Self::default();
        f.rc.set();
        f
    }

    /// §3 invariant: exactly one of RC, TR holds at any time while running.
    #[must_use]
    pub fn rc_tr_consistent(&self) -> bool {
        self.rc.get() != self.tr.get()
    }
}
