//! Top-level Bendix G-15 machine: wires the drum, the fetch/transfer
//! processor, the I/O subsystem, and the control panel together behind one
//! `run`/`step` surface, the way the source's outer run loop does (§2, §6).

mod boot;

use std::cell::RefCell;
use std::rc::Rc;

use g15_cpu::{CpuError, IoController, Processor};
use g15_drum::{Drum, DrumPartner};
use g15_io::{decode_input, InputCode, IoState, IoSubsystem};
use g15_panel::{ComputeSwitch, ControlPanel, Device, PanelSwitches};
use g15_word::{Diagnostics, StderrDiagnostics};

/// Extract the data nibbles out of a 5-bit code stream, discarding every
/// control code (§4.E's input table) — used only by [`boot::reset_from_tape`]
/// to assemble raw words, not by the ordinary running I/O path.
fn decode_data_codes(codes: &[u8]) -> Vec<u8> {
    codes
        .iter()
        .filter_map(|&code| match decode_input(code) {
            InputCode::Data(nibble) => Some(nibble),
            InputCode::Control(_) => None,
        })
        .collect()
}

/// A cloneable handle onto the one [`IoSubsystem`], so `Processor::run_command`
/// can borrow it simultaneously in its two distinct roles — the drum's
/// cooperative-scheduling partner, and the D=31 start/cancel target — without
/// the two roles aliasing a `&mut IoSubsystem` directly. The two uses are
/// always sequential, never nested, so the inner `RefCell` never contests a
/// borrow (see DESIGN.md).
#[derive(Clone)]
struct IoHandle(Rc<RefCell<IoSubsystem>>);

impl DrumPartner for IoHandle {
    fn word_time_tick(&mut self, drum: &mut Drum) {
        self.0.borrow_mut().word_time_tick(drum);
    }

    fn is_active(&self) -> bool {
        DrumPartner::is_active(&*self.0.borrow())
    }
}

impl IoController for IoHandle {
    fn start(&mut self, code: u8, characteristic: u8) {
        self.0.borrow_mut().start(code, characteristic);
    }

    fn cancel(&mut self) {
        self.0.borrow_mut().cancel();
    }

    fn is_active(&self) -> bool {
        IoController::is_active(&*self.0.borrow())
    }
}

/// Fatal conditions the outer run loop surfaces instead of the core
/// continuing to step (§7: invariant violations are fatal).
#[derive(Debug)]
pub enum MachineError {
    Cpu(CpuError),
}

impl std::fmt::Display for MachineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu(e) => write!(f, "processor error: {e}"),
        }
    }
}

impl std::error::Error for MachineError {}

impl From<CpuError> for MachineError {
    fn from(e: CpuError) -> Self {
        Self::Cpu(e)
    }
}

/// The whole machine: drum, processor, I/O subsystem, and panel, plus the
/// diagnostics sink every subsystem reports non-fatal conditions to.
pub struct Machine {
    drum: Drum,
    cpu: Processor,
    io: IoHandle,
    panel: ControlPanel,
    diag: StderrDiagnostics,
}

impl Machine {
    #[must_use]
    pub fn new(reader: Box<dyn Device>, punch: Box<dyn Device>, typewriter: Box<dyn Device>) -> Self {
        Self {
            drum: Drum::new(),
            cpu: Processor::new(),
            io: IoHandle(Rc::new(RefCell::new(IoSubsystem::new(reader, punch, typewriter)))),
            panel: ControlPanel::new(),
            diag: StderrDiagnostics,
        }
    }

    #[must_use]
    pub const fn drum(&self) -> &Drum {
        &self.drum
    }

    #[must_use]
    pub const fn processor(&self) -> &Processor {
        &self.cpu
    }

    #[must_use]
    pub fn io_state(&self) -> IoState {
        self.io.0.borrow().state()
    }

    pub fn panel_mut(&mut self) -> &mut ControlPanel {
        &mut self.panel
    }

    /// Press the reset button: reload CN from `tape` and load the
    /// bootstrap block into line 23, then arm the processor to fetch from
    /// there (§6).
    pub fn reset(&mut self, tape: &[u8]) {
        boot::reset_from_tape(&mut self.drum, tape);
        self.cpu = Processor::new();
        self.panel.set_compute(ComputeSwitch::Go);
    }

    /// Run one fetch/transfer cycle, ticking the I/O subsystem alongside it
    /// when one is in flight (§5: the processor is the primary driver
    /// while it's running).
    ///
    /// # Errors
    /// Propagates a [`MachineError`] on any invariant violation; the caller
    /// should stop calling `step` after that.
    pub fn step(&mut self) -> Result<(), MachineError> {
        if self.cpu.flags.ch.get() {
            // Halted: the processor no longer drives the drum. If I/O is
            // still in flight (e.g. a punch operation outlives the HALT
            // that started it), step the drum directly so it keeps
            // advancing instead of stalling mid-operation.
            if DrumPartner::is_active(&self.io) {
                self.io.word_time_tick(&mut self.drum);
                self.drum.stepper().step();
            }
            return Ok(());
        }
        let mut partner = self.io.clone();
        let mut io = self.io.clone();
        self.cpu.run_command(&mut self.drum, &mut partner, &mut self.panel, &mut io, &mut self.diag)?;
        Ok(())
    }

    /// Run until halted, an error occurs, or `max_steps` fetch/transfer
    /// cycles have executed (a headless run-away guard; real hardware has
    /// no such limit).
    ///
    /// # Errors
    /// Propagates a [`MachineError`] on any invariant violation.
    pub fn run(&mut self, max_steps: u64) -> Result<u64, MachineError> {
        let mut n = 0;
        while n < max_steps && !self.cpu.flags.ch.get() {
            self.step()?;
            n += 1;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use g15_panel::MemoryTape;

    fn machine() -> Machine {
        Machine::new(
            Box::new(MemoryTape::new(vec![])),
            Box::new(MemoryTape::new(vec![])),
            Box::new(MemoryTape::new(vec![])),
        )
    }

    #[test]
    fn fresh_machine_is_not_halted() {
        let m = machine();
        assert!(!m.processor().flags.ch.get());
    }

    #[test]
    fn reset_arms_compute_switch_to_go() {
        let mut m = machine();
        let codes: Vec<u8> = std::iter::repeat(0x10).take(112 * 8).collect();
        m.reset(&codes);
        assert_eq!(m.panel_mut().compute(), ComputeSwitch::Go);
    }

    #[test]
    fn run_halts_on_explicit_ch_command() {
        // D=31 S=16 (halt), everything else zero, C1=0, immediate: word
        // value = (16 << 6) | (31 << 1) = 1024 + 62 = 1086.
        let mut m = machine();
        let halt_command = g15_word::Word::new(1086);
        let _ = m.drum.write(0, halt_command);
        let steps = m.run(10).unwrap();
        assert!(steps >= 1);
        assert!(m.processor().flags.ch.get());
    }
}
