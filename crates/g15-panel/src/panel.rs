/// The `compute` switch: OFF stops the processor at the next breakpoint
/// opportunity, GO runs free, BP stops only at commands whose BP bit is set
/// (§6, consumed by the return-exit rule in `g15-cpu`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeSwitch {
    #[default]
    Off,
    Go,
    Bp,
}

/// The `enable` switch: gates whether the typewriter keyboard may start a
/// type-in operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnableSwitch {
    #[default]
    Off,
    On,
}

/// The `punch` switch: OFF leaves the punch idle, PUNCH arms it, REWIND
/// spins the tape back without punching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PunchSwitch {
    #[default]
    Off,
    Punch,
    Rewind,
}

/// The read interface the processor needs out of the panel: switch state
/// plus the bell sink (§6: "Bell: signaled by the processor writing a
/// wordTimes count that the panel drains").
pub trait PanelSwitches {
    fn compute(&self) -> ComputeSwitch;
    fn enable(&self) -> EnableSwitch;
    fn punch(&self) -> PunchSwitch;

    /// True when the compute switch is in BP mode — the one bit the
    /// return-exit rule actually consults.
    fn compute_is_bp(&self) -> bool {
        self.compute() == ComputeSwitch::Bp
    }

    /// Queue `word_times` of bell ringing for the panel to drain.
    fn ring_bell(&mut self, word_times: u16);
}

/// A concrete panel: three switches plus a pending-bell counter. The panel
/// owns no drum state; `reset()` only clears what belongs to the panel
/// itself, the boot sequence that reloads CN and a bootstrap lives in the
/// top-level machine wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControlPanel {
    compute: ComputeSwitch,
    enable: EnableSwitch,
    punch: PunchSwitch,
    bell_pending: u16,
}

impl ControlPanel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_compute(&mut self, value: ComputeSwitch) {
        self.compute = value;
    }

    pub fn set_enable(&mut self, value: EnableSwitch) {
        self.enable = value;
    }

    pub fn set_punch(&mut self, value: PunchSwitch) {
        self.punch = value;
    }

    /// Word-times of bell still pending; draining is the host UI's job, not
    /// the core's — this just exposes the counter.
    #[must_use]
    pub const fn bell_pending(&self) -> u16 {
        self.bell_pending
    }

    /// Drain up to `n` pending bell word-times, returning how many were
    /// actually consumed.
    pub fn drain_bell(&mut self, n: u16) -> u16 {
        let taken = n.min(self.bell_pending);
        self.bell_pending -= taken;
        taken
    }
}

impl PanelSwitches for ControlPanel {
    fn compute(&self) -> ComputeSwitch {
        self.compute
    }

    fn enable(&self) -> EnableSwitch {
        self.enable
    }

    fn punch(&self) -> PunchSwitch {
        self.punch
    }

    fn ring_bell(&mut self, word_times: u16) {
        self.bell_pending = self.bell_pending.saturating_add(word_times);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_accumulates_and_drains() {
        let mut panel = ControlPanel::new();
        panel.ring_bell(5);
        panel.ring_bell(3);
        assert_eq!(panel.bell_pending(), 8);
        assert_eq!(panel.drain_bell(6), 6);
        assert_eq!(panel.bell_pending(), 2);
        assert_eq!(panel.drain_bell(10), 2);
        assert_eq!(panel.bell_pending(), 0);
    }

    #[test]
    fn compute_is_bp_only_in_bp_mode() {
        let mut panel = ControlPanel::new();
        assert!(!panel.compute_is_bp());
        panel.set_compute(ComputeSwitch::Bp);
        assert!(panel.compute_is_bp());
    }
}
