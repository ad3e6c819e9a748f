//! Fetch/transfer processor state machine for the Bendix G-15 (§3, §4.D).
//!
//! The [`Processor`] holds only processor-local state — flip-flops, the
//! decoded current command, the mark-exit bookmark. The drum, the I/O
//! subsystem, and the panel are passed in by whoever drives the machine,
//! per the redesign guidance against global singletons.

mod error;
mod exits;
mod flags;
mod special;
mod transfer;

pub use error::CpuError;
pub use exits::{mark_exit_value, return_exit};
pub use flags::Flags;
pub use special::IoController;
pub use transfer::{apply_characteristic_plain, apply_characteristic_via_ar, ViaArResult};

use g15_decode::{apply_l107_adjustment, cd_to_line, Command};
use g15_drum::{compute_drum_count, Drum, DrumPartner};
use g15_panel::PanelSwitches;
use g15_word::{
    add_double_even, add_double_odd, add_single, complement_double_odd, complement_single,
    DiagEvent, Diagnostics, DpAddCarry, Word,
};

/// Advance the drum one word-time, giving an active partner a chance to
/// act at the current (pre-advance) L first (§4.C arbitration rule).
pub(crate) fn step_one<P: DrumPartner>(drum: &mut Drum, partner: &mut P) {
    if partner.is_active() {
        partner.word_time_tick(drum);
    }
    drum.stepper().step();
}

/// Step until `L == target`, per `waitUntil` (§4.C).
pub(crate) fn wait_until<P: DrumPartner>(drum: &mut Drum, partner: &mut P, target: u8) {
    let count = compute_drum_count(drum.l(), target);
    for _ in 0..count {
        step_one(drum, partner);
    }
}

/// The fetch/transfer processor.
#[derive(Debug, Clone, Copy)]
pub struct Processor {
    pub flags: Flags,
    cmd: Command,
    /// CD: which command line (0,1,2,3,4,5,19,23) an ordinary fetch reads.
    pub cd: u8,
    /// The mark-exit bookmark a later return-exit reads back. Conceptually
    /// "CM bits 1-13" (§4.D S=21); kept as its own field rather than
    /// literally overlaid on CM's D/S/C bits, since nothing besides
    /// return-exit ever reads that range as a command (see DESIGN.md).
    mark: u8,
    /// Carry threaded from MUL's even half-step to its odd half-step.
    dp_carry_scratch: Option<DpAddCarry>,
    /// Carry/sign state threaded from DIV's even half-step to its odd
    /// half-step: the DP-add carry, the complemented divisor's even-word
    /// sign, and the complement carry, in that order.
    dp_divide_scratch: Option<(DpAddCarry, bool, u32)>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            flags: Flags::new(),
            cmd: Command::decode(Word::default()),
            cd: 0,
            mark: 0,
            dp_carry_scratch: None,
            dp_divide_scratch: None,
        }
    }

    /// The command currently loaded into CM, decoded.
    #[must_use]
    pub const fn command(&self) -> Command {
        self.cmd
    }

    /// The mark-exit bookmark's current value.
    #[must_use]
    pub const fn mark(&self) -> u8 {
        self.mark
    }

    /// Run one fetch cycle followed by one transfer cycle — the unit of
    /// work the outer run loop calls repeatedly.
    ///
    /// # Errors
    /// Propagates a [`CpuError`] on any invariant violation (§7): these are
    /// fatal and the caller should stop the processor.
    pub fn run_command<P: DrumPartner>(
        &mut self,
        drum: &mut Drum,
        partner: &mut P,
        panel: &mut dyn PanelSwitches,
        io: &mut dyn IoController,
        diag: &mut dyn Diagnostics,
    ) -> Result<(), CpuError> {
        self.fetch(drum, partner, diag)?;
        self.transfer(drum, partner, panel, io, diag)?;
        Ok(())
    }

    fn fetch<P: DrumPartner>(
        &mut self,
        drum: &mut Drum,
        partner: &mut P,
        diag: &mut dyn Diagnostics,
    ) -> Result<(), CpuError> {
        if !self.flags.rc_tr_consistent() || !self.flags.rc.get() {
            return Err(CpuError::InconsistentState);
        }
        let loc = if self.flags.cq.get() {
            self.flags.cq.reset();
            (u16::from(self.cmd.n) + 1) as u8 % 108
        } else {
            self.cmd.n
        };
        wait_until(drum, partner, loc);

        let raw = if self.flags.cg.get() {
            self.flags.cg.reset();
            drum.ar()
        } else {
            drum.read(cd_to_line(self.cd))?
        };
        let mut cmd = Command::decode(raw);
        if drum.l() == 107 {
            diag.report(DiagEvent::Warning(
                "command fetched from L=107, applying counter compensation".into(),
            ));
            cmd = apply_l107_adjustment(cmd);
        }
        self.cmd = cmd;
        self.flags.bp.set_to(cmd.bp);
        self.flags.c1.set_to(cmd.c1);
        self.flags.di.set_to(cmd.di);
        self.flags.rc.reset();
        self.flags.tr.set();

        step_one(drum, partner);
        if cmd.di {
            step_one(drum, partner);
        }
        Ok(())
    }

    fn transfer<P: DrumPartner>(
        &mut self,
        drum: &mut Drum,
        partner: &mut P,
        panel: &mut dyn PanelSwitches,
        io: &mut dyn IoController,
        diag: &mut dyn Diagnostics,
    ) -> Result<(), CpuError> {
        if !self.flags.rc_tr_consistent() || !self.flags.tr.get() {
            return Err(CpuError::InconsistentState);
        }
        let cmd = self.cmd;
        if cmd.d == 31 {
            special::dispatch(self, drum, partner, panel, io, diag, cmd)?;
        } else {
            if cmd.di {
                wait_until(drum, partner, cmd.t);
            }
            let mut count = if cmd.di {
                1u8
            } else {
                compute_drum_count(drum.l(), cmd.t).max(1)
            };
            if cmd.di && cmd.c1 && drum.ce() {
                count += 1;
            }
            let mut dp_carry: Option<DpAddCarry> = None;
            let mut complement_carry: Option<(bool, u32)> = None;
            for _ in 0..count {
                self.transfer_step(drum, diag, cmd, &mut dp_carry, &mut complement_carry)?;
                step_one(drum, partner);
            }
        }
        self.flags.tr.reset();
        self.flags.rc.set();
        Ok(())
    }

    fn transfer_step(
        &mut self,
        drum: &mut Drum,
        diag: &mut dyn Diagnostics,
        cmd: Command,
        dp_carry: &mut Option<DpAddCarry>,
        complement_carry: &mut Option<(bool, u32)>,
    ) -> Result<(), CpuError> {
        let mut src = drum.read(cmd.s)?;
        if cmd.c1 && matches!(cmd.c, 0 | 2) && matches!(cmd.s, 24..=26) && drum.ce() {
            // Double-precision C=0/C=2 transfers re-sign the even word of a
            // sign-carrying register source (MQ/ID/PN) from IP before the
            // characteristic is applied (§4.D).
            src = Word::from_sign_magnitude(self.flags.ip.get(), src.magnitude());
        }
        let value_to_store = if cmd.cs() {
            let r = apply_characteristic_via_ar(src, cmd.c, drum.ar());
            drum.set_ar(r.new_ar);
            r.to_destination
        } else {
            apply_characteristic_plain(src, cmd.c)
        };

        match cmd.d {
            0..=23 => {
                drum.write(cmd.d, value_to_store)?;
            }
            24 => self.transfer_to_mq_or_pn(drum, cmd, 24, value_to_store, complement_carry)?,
            25 => self.transfer_to_id(drum, value_to_store)?,
            26 => self.transfer_to_mq_or_pn(drum, cmd, 26, value_to_store, complement_carry)?,
            27 => {
                if value_to_store.raw() != 0 {
                    self.flags.cq.set();
                }
            }
            28 => {
                let r = add_single(Word::default(), value_to_store, matches!(cmd.c, 1 | 3));
                drum.set_ar(r.result);
            }
            29 => {
                let r = add_single(drum.ar(), value_to_store, matches!(cmd.c, 1 | 3));
                drum.set_ar(r.result);
                if r.overflow {
                    self.flags.fo.set();
                }
            }
            30 => self.transfer_to_pn_plus(drum, diag, value_to_store, dp_carry)?,
            other => unreachable!("destination field is 5 bits, got {other}"),
        }
        Ok(())
    }

    /// D=24 (MQ) / D=26 (PN), C≠ the PN→PN complement special (§4.D).
    fn transfer_to_mq_or_pn(
        &mut self,
        drum: &mut Drum,
        cmd: Command,
        dest: u8,
        value_to_store: Word,
        complement_carry: &mut Option<(bool, u32)>,
    ) -> Result<(), CpuError> {
        if dest == 26 && cmd.s == 26 && cmd.c == 0 {
            return self.pn_to_pn_complement_cycle(drum, value_to_store, complement_carry);
        }
        drum.write(dest, value_to_store)?;
        let source_is_register = matches!(cmd.s, 24..=26);
        if !source_is_register && cmd.c1 && drum.ce() && value_to_store.sign() {
            self.flags.ip.flip();
        }
        Ok(())
    }

    /// PN→PN under C=0: the even word is re-signed from IP then
    /// complemented; the odd word completes via `complementDoubleOdd`
    /// using the sign/carry the even step captured (§4.D).
    fn pn_to_pn_complement_cycle(
        &mut self,
        drum: &mut Drum,
        value_to_store: Word,
        complement_carry: &mut Option<(bool, u32)>,
    ) -> Result<(), CpuError> {
        if drum.ce() {
            let resigned = Word::from_sign_magnitude(self.flags.ip.get(), value_to_store.magnitude());
            let (complemented, carry) = complement_single(resigned);
            drum.write(26, complemented)?;
            *complement_carry = Some((complemented.sign(), carry));
        } else {
            let (dp_even_sign, carry) = complement_carry.take().unwrap_or((false, 0));
            let raw = complement_double_odd(value_to_store.raw(), dp_even_sign, carry);
            drum.write(26, Word::new(raw & g15_word::WORD_MASK))?;
        }
        Ok(())
    }

    /// D=25 (ID): also clears the corresponding half of PN and captures
    /// the stored sign into IP (§4.D).
    fn transfer_to_id(&mut self, drum: &mut Drum, value_to_store: Word) -> Result<(), CpuError> {
        drum.write(25, value_to_store)?;
        drum.write(26, Word::default())?;
        self.flags.ip.set_to(value_to_store.sign());
        Ok(())
    }

    /// D=30 (PN+): DP add via the even/odd half-primitives; FO latches on
    /// odd-word overflow; the final sign is written back through
    /// `setPN0T1Bit` (§4.D).
    fn transfer_to_pn_plus(
        &mut self,
        drum: &mut Drum,
        diag: &mut dyn Diagnostics,
        value_to_store: Word,
        dp_carry: &mut Option<DpAddCarry>,
    ) -> Result<(), CpuError> {
        if drum.ce() {
            let (even, carry) = add_double_even(drum.read(26)?, value_to_store);
            drum.write(26, even)?;
            *dp_carry = Some(carry);
        } else {
            let carry = dp_carry.take().unwrap_or_else(|| {
                diag.report(DiagEvent::Warning("double-precision transfer started on an odd word-time".into()));
                add_double_even(Word::default(), Word::default()).1
            });
            let r = add_double_odd(drum.read(26)?, value_to_store, carry);
            drum.write(26, r.result)?;
            if r.overflow {
                self.flags.fo.set();
            }
            drum.set_pn0_t1(r.result.sign());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use g15_drum::NoPartner;
    use g15_panel::ControlPanel;
    use g15_word::CollectingDiagnostics;

    struct NoIo;
    impl IoController for NoIo {
        fn start(&mut self, _code: u8, _characteristic: u8) {}
        fn cancel(&mut self) {}
        fn is_active(&self) -> bool {
            false
        }
    }

    #[test]
    fn ar_plus_accumulates_and_latches_overflow() {
        let mut drum = Drum::new();
        drum.write(0, Word::from_sign_magnitude(false, 0x0FFF_FFFF)).unwrap();
        drum.set_ar(Word::from_sign_magnitude(false, 0x0FFF_FFFF));
        let mut cpu = Processor::new();
        cpu.flags.tr.set();
        cpu.flags.rc.reset();
        let cmd = g15_decode::Command {
            c1: false,
            d: 29,
            s: 0,
            c: 0,
            n: 0,
            bp: false,
            t: drum.l(),
            di: false,
        };
        cpu.cmd = cmd;
        let mut partner = NoPartner;
        let mut panel = ControlPanel::new();
        let mut io = NoIo;
        let mut diag = CollectingDiagnostics::default();
        cpu.transfer(&mut drum, &mut partner, &mut panel, &mut io, &mut diag).unwrap();
        assert!(cpu.flags.fo.get());
    }

    #[test]
    fn test_destination_sets_cq_on_nonzero() {
        let mut drum = Drum::new();
        drum.write(0, Word::from_sign_magnitude(false, 5)).unwrap();
        let mut cpu = Processor::new();
        cpu.flags.tr.set();
        cpu.flags.rc.reset();
        let cmd = g15_decode::Command {
            c1: false,
            d: 27,
            s: 0,
            c: 0,
            n: 0,
            bp: false,
            t: drum.l(),
            di: false,
        };
        cpu.cmd = cmd;
        let mut partner = NoPartner;
        let mut panel = ControlPanel::new();
        let mut io = NoIo;
        let mut diag = CollectingDiagnostics::default();
        cpu.transfer(&mut drum, &mut partner, &mut panel, &mut io, &mut diag).unwrap();
        assert!(cpu.flags.cq.get());
    }

    #[test]
    fn id_destination_clears_paired_pn_half_and_captures_sign() {
        let mut drum = Drum::new();
        drum.set_l(1);
        drum.write(26, Word::from_sign_magnitude(true, 9)).unwrap();
        let mut cpu = Processor::new();
        let value = Word::from_sign_magnitude(true, 3);
        cpu.transfer_to_id(&mut drum, value).unwrap();
        assert_eq!(drum.read(25).unwrap(), value);
        assert_eq!(drum.read(26).unwrap(), Word::default());
        assert!(cpu.flags.ip.get());
    }
}
