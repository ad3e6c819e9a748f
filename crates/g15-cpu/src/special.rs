//! The D=31 special-command family (§4.D), dispatched on S.

use g15_decode::{Command, Special};
use g15_drum::{Drum, DrumPartner};
use g15_panel::PanelSwitches;
use g15_word::{DiagEvent, Diagnostics, Word};

use crate::exits::{mark_exit_value, return_exit};
use crate::{step_one, wait_until, CpuError, Processor};

/// What the processor needs from the I/O subsystem for D=31 specials that
/// start or cancel a device operation (§4.E). Kept as a trait in this crate
/// — mirroring [`PanelSwitches`] — so `g15-cpu` never depends on `g15-io`;
/// the I/O crate implements this for its own controller type instead.
pub trait IoController {
    /// Start (or, if one of the same code is already in flight, absorb
    /// into) an I/O operation keyed by `code` (§4.E "Duplicate I/O").
    fn start(&mut self, code: u8, characteristic: u8);
    /// S=0 on D=31: cancel whatever I/O operation is active.
    fn cancel(&mut self);
    /// Whether an I/O operation is currently in flight.
    fn is_active(&self) -> bool;
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn dispatch<P: DrumPartner>(
    cpu: &mut Processor,
    drum: &mut Drum,
    partner: &mut P,
    panel: &mut dyn PanelSwitches,
    io: &mut dyn IoController,
    diag: &mut dyn Diagnostics,
    cmd: Command,
) -> Result<(), CpuError> {
    let special = Special::from_s(cmd.s);
    // MUL/DIV/SHIFT/NORM drive their own word-times internally (T is an
    // iteration count, not a single-transfer operand); every other special
    // takes exactly the one word-time the trailing `step_one` below applies.
    let self_stepping = matches!(
        special,
        Special::Multiply | Special::Divide | Special::ShiftMqLeftIdRight | Special::NormalizeMq
    );
    match special {
        Special::Halt => cpu.flags.ch.set(),
        Special::RingBell => {
            if cmd.c == 1 {
                panel.ring_bell(u16::from(cmd.t));
            }
        }
        Special::OrM20AndId => {
            let m20 = drum.read(20)?;
            let id = drum.read(25)?;
            drum.set_or(Word::new((m20.raw() | id.raw()) & g15_word::WORD_MASK));
        }
        Special::DifferentialAnalyzer => {
            diag.report(DiagEvent::Warning("differential-analyzer command is stubbed".into()));
        }
        Special::SelectCommandLineReturnExit => {
            cpu.cd = select_command_line(cmd);
            let loc = drum.l();
            let t = (u16::from(cmd.t) + u16::from(cmd.di)) as u8 % 108;
            cpu.cmd.n = return_exit(loc, cmd.n, t, cpu.mark, panel.compute_is_bp(), cmd.bp, !cpu.flags.cz.get());
        }
        Special::SelectCommandLineMarkExit => {
            cpu.cd = select_command_line(cmd);
            if cmd.di {
                wait_until(drum, partner, cmd.t);
            }
            cpu.mark = mark_exit_value(drum.l(), cmd.t, cmd.di);
        }
        Special::TestArSign => cpu.flags.cq.set_to(drum.ar().sign()),
        Special::ClearRegisters => match cmd.c {
            0 => {
                drum.write(24, Word::default())?;
                drum.write(25, Word::default())?;
                drum.write(26, Word::default())?;
                cpu.flags.ip.reset();
            }
            3 => {
                let m2 = drum.read_cn();
                drum.write(25, m2)?;
                drum.write(26, Word::new(!m2.raw() & g15_word::WORD_MASK))?;
            }
            other => {
                diag.report(DiagEvent::Warning(format!("clear-registers with characteristic {other} has no defined effect")));
            }
        },
        Special::Multiply => multiply(cpu, drum, partner, cmd, diag)?,
        Special::Divide => divide(cpu, drum, partner, cmd, diag)?,
        Special::ShiftMqLeftIdRight => shift(drum, partner, cmd)?,
        Special::NormalizeMq => normalize(drum, partner, cmd)?,
        Special::TestReady => {
            cpu.flags.cq.set_to(match cmd.c {
                0 => !io.is_active(),
                3 => true,
                _ => {
                    diag.report(DiagEvent::Warning("IR/OR ready test is stubbed, reporting not-ready".into()));
                    false
                }
            });
        }
        Special::TestOverflow => {
            cpu.flags.cq.set_to(cpu.flags.fo.get());
            cpu.flags.fo.reset();
        }
        Special::MagTapeFileCode => {
            diag.report(DiagEvent::Warning("magnetic-tape file-code command is stubbed".into()));
        }
        Special::OddsAndSods => match cmd.c {
            0 => cpu.flags.cg.set(),
            1 => {
                let cn = drum.read_cn();
                let l18 = drum.read(18)?;
                drum.write(18, Word::new((cn.raw() | l18.raw()) & g15_word::WORD_MASK))?;
            }
            2 => {
                let l20 = drum.read(20)?;
                let l18 = drum.read(18)?;
                drum.write(18, Word::new((l20.raw() | l18.raw()) & g15_word::WORD_MASK))?;
            }
            other => {
                diag.report(DiagEvent::Warning(format!("odds-and-sods characteristic {other} has no defined effect")));
            }
        },
        Special::Io(code) => {
            if code == 0 {
                io.cancel();
            } else {
                io.start(code, cmd.c);
            }
        }
    }
    if !self_stepping {
        step_one(drum, partner);
    }
    Ok(())
}

/// The "select-command-line" half of S=20/21 (§4.D): both commands pick a
/// new CD alongside their named return-exit/mark-exit action. The surviving
/// manual excerpt names CD as a 3-bit register but doesn't spell out which
/// bits of a D=31 S=20/21 word carry it — every other field is already
/// spoken for by the exit math itself, so this combines C1 and C (otherwise
/// unused here, and exactly 3 bits together) into the new value (see
/// DESIGN.md).
fn select_command_line(cmd: Command) -> u8 {
    (u8::from(cmd.c1) << 2) | cmd.c
}

/// MUL (§4.D S=24): must start on an even word. Each even step examines
/// MQ:1 T29 (PM), shifts ID right and MQ left, and if PM adds ID to PN via
/// the DP-even primitive; each odd step repeats the shifts and, if PM was
/// set, completes the add via the DP-odd primitive.
fn multiply<P: DrumPartner>(
    cpu: &mut Processor,
    drum: &mut Drum,
    partner: &mut P,
    cmd: Command,
    diag: &mut dyn Diagnostics,
) -> Result<(), CpuError> {
    if cmd.di || !drum.ce() {
        diag.report(DiagEvent::Warning("MUL must be immediate and start on an even word-time".into()));
        return Ok(());
    }
    let iterations = usize::from(cmd.t) * 2;
    let mut pm = false;
    for i in 0..iterations {
        let even_step = i % 2 == 0;
        if even_step {
            pm = drum.get_mq1_t29();
        }
        shift_mq_left_id_right_one_bit(drum)?;
        if pm {
            let id = drum.read(25)?;
            if even_step {
                let (sum, carry) = g15_word::add_double_even(drum.read(26)?, id);
                drum.write(26, sum)?;
                cpu.dp_carry_scratch = Some(carry);
            } else if let Some(carry) = cpu.dp_carry_scratch.take() {
                let r = g15_word::add_double_odd(drum.read(26)?, id, carry);
                drum.write(26, r.result)?;
            }
        }
        step_one(drum, partner);
    }
    Ok(())
}

/// DIV (§4.D S=25): non-restoring division with Princeton rounding. Must
/// start on an even word, runs for `T/2` even/odd iteration pairs.
fn divide<P: DrumPartner>(
    cpu: &mut Processor,
    drum: &mut Drum,
    partner: &mut P,
    cmd: Command,
    diag: &mut dyn Diagnostics,
) -> Result<(), CpuError> {
    if cmd.di || !drum.ce() {
        diag.report(DiagEvent::Warning("DIV must be immediate and start on an even word-time".into()));
        return Ok(());
    }
    let pairs = usize::from(cmd.t) / 2;
    let mut q_bit = false;
    let mut r_sign = false;
    let mut shift_carry = false;
    for _ in 0..pairs {
        // Even half.
        drum.set_mq0_t2(q_bit);
        shift_mq_left_one(drum)?;
        let id = drum.read(25)?;
        let composed_sign = !r_sign;
        let composed = Word::from_sign_magnitude(composed_sign, id.magnitude());
        let (complemented, carry) = g15_word::complement_single(composed);
        let (pn_even, dp_carry) = g15_word::add_double_even(drum.read(26)?, complemented);
        drum.write(26, pn_even)?;
        let (pn_even_shifted, even_carry_out) = shift_left_with_carry_out(pn_even);
        drum.write(26, pn_even_shifted)?;
        shift_carry = even_carry_out;
        cpu.dp_divide_scratch = Some((dp_carry, complemented.sign(), carry));
        step_one(drum, partner);

        // Odd half.
        shift_mq_left_one(drum)?;
        let (dp_carry, dp_even_sign, complement_carry) = cpu.dp_divide_scratch.take().ok_or(CpuError::InconsistentState)?;
        let id_odd = drum.read(25)?.raw();
        let complemented_odd = g15_word::complement_double_odd(id_odd, dp_even_sign, complement_carry);
        let r = g15_word::add_double_odd(drum.read(26)?, Word::new(complemented_odd), dp_carry);
        r_sign = r.result.sign();
        let (pn_odd_shifted, _) = shift_left_with_carry_in(r.result, shift_carry);
        drum.write(26, pn_odd_shifted)?;
        q_bit = !r_sign;
        step_one(drum, partner);
    }
    if shift_carry {
        cpu.flags.fo.set();
    }
    drum.set_mq0_t2(true);
    Ok(())
}

/// Shift (§4.D S=26): `T` half-steps of "ID right, MQ left"; if C=0, AR
/// increments each full pair and the loop stops early on AR wraparound.
fn shift<P: DrumPartner>(drum: &mut Drum, partner: &mut P, cmd: Command) -> Result<(), CpuError> {
    for i in 0..cmd.t {
        shift_mq_left_id_right_one_bit(drum)?;
        if cmd.c == 0 && i % 2 == 1 {
            let ar = drum.ar();
            if ar.raw() == 0x0FFF_FFFF {
                drum.set_ar(Word::default());
                step_one(drum, partner);
                break;
            }
            drum.set_ar(Word::new(ar.raw() + 1));
        }
        step_one(drum, partner);
    }
    Ok(())
}

/// Normalize (§4.D S=27): shift MQ left until MQ:1 T29 is set or `T` is
/// exhausted; if C=0, AR increments each full pair.
fn normalize<P: DrumPartner>(drum: &mut Drum, partner: &mut P, cmd: Command) -> Result<(), CpuError> {
    for i in 0..cmd.t {
        if drum.get_mq1_t29() {
            break;
        }
        shift_mq_left_one(drum)?;
        if cmd.c == 0 && i % 2 == 1 {
            drum.set_ar(Word::new(drum.ar().raw().wrapping_add(1) & g15_word::WORD_MASK));
        }
        step_one(drum, partner);
    }
    Ok(())
}

fn shift_mq_left_id_right_one_bit(drum: &mut Drum) -> Result<(), CpuError> {
    shift_mq_left_one(drum)?;
    let id = drum.read(25)?;
    drum.write(25, Word::new(id.raw() >> 1))?;
    Ok(())
}

fn shift_mq_left_one(drum: &mut Drum) -> Result<(), CpuError> {
    let mq = drum.read(24)?;
    drum.write(24, Word::new((mq.raw() << 1) & g15_word::WORD_MASK))?;
    Ok(())
}

fn shift_left_with_carry_out(w: Word) -> (Word, bool) {
    let carry_out = w.raw() & 0x1000_0000 != 0;
    (Word::new((w.raw() << 1) & g15_word::WORD_MASK), carry_out)
}

fn shift_left_with_carry_in(w: Word, carry_in: bool) -> (Word, bool) {
    let carry_out = w.raw() & 0x1000_0000 != 0;
    let mut raw = (w.raw() << 1) & g15_word::WORD_MASK;
    if carry_in {
        raw |= 1;
    }
    (Word::new(raw), carry_out)
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

    fn special_cmd(s: u8, c: u8) -> Command {
        Command {
            c1: false,
            d: 31,
            s,
            c,
            n: 0,
            bp: false,
            t: 0,
            di: false,
        }
    }

    #[test]
    fn halt_sets_ch() {
        let mut drum = Drum::new();
        let mut cpu = Processor::new();
        let mut partner = NoPartner;
        let mut panel = ControlPanel::new();
        let mut io = NoIo;
        let mut diag = CollectingDiagnostics::default();
        dispatch(&mut cpu, &mut drum, &mut partner, &mut panel, &mut io, &mut diag, special_cmd(16, 0)).unwrap();
        assert!(cpu.flags.ch.get());
    }

    #[test]
    fn test_overflow_reads_and_clears_fo() {
        let mut drum = Drum::new();
        let mut cpu = Processor::new();
        cpu.flags.fo.set();
        let mut partner = NoPartner;
        let mut panel = ControlPanel::new();
        let mut io = NoIo;
        let mut diag = CollectingDiagnostics::default();
        dispatch(&mut cpu, &mut drum, &mut partner, &mut panel, &mut io, &mut diag, special_cmd(29, 0)).unwrap();
        assert!(cpu.flags.cq.get());
        assert!(!cpu.flags.fo.get());
    }

    #[test]
    fn unrecognized_s_dispatches_to_io() {
        let mut drum = Drum::new();
        let mut cpu = Processor::new();
        let mut partner = NoPartner;
        let mut panel = ControlPanel::new();
        struct StartTrackingIo {
            started: Option<u8>,
        }
        impl IoController for StartTrackingIo {
            fn start(&mut self, code: u8, _characteristic: u8) {
                self.started = Some(code);
            }
            fn cancel(&mut self) {}
            fn is_active(&self) -> bool {
                self.started.is_some()
            }
        }
        let mut io = StartTrackingIo { started: None };
        let mut diag = CollectingDiagnostics::default();
        dispatch(&mut cpu, &mut drum, &mut partner, &mut panel, &mut io, &mut diag, special_cmd(5, 0)).unwrap();
        assert_eq!(io.started, Some(5));
    }

    #[test]
    fn multiply_rejects_deferred_start() {
        let mut drum = Drum::new();
        drum.set_l(0);
        let mut cpu = Processor::new();
        let mut partner = NoPartner;
        let mut diag = CollectingDiagnostics::default();
        let cmd = Command {
            c1: false,
            d: 31,
            s: 24,
            c: 0,
            n: 0,
            bp: false,
            t: 28,
            di: true,
        };
        multiply(&mut cpu, &mut drum, &mut partner, cmd, &mut diag).unwrap();
        assert_eq!(drum.l(), 0, "a rejected MUL must not advance the drum");
        assert_eq!(diag.events.len(), 1);
    }

    #[test]
    fn multiply_rejects_odd_start_word() {
        let mut drum = Drum::new();
        drum.set_l(1);
        let mut cpu = Processor::new();
        let mut partner = NoPartner;
        let mut diag = CollectingDiagnostics::default();
        let cmd = Command {
            c1: false,
            d: 31,
            s: 24,
            c: 0,
            n: 0,
            bp: false,
            t: 28,
            di: false,
        };
        multiply(&mut cpu, &mut drum, &mut partner, cmd, &mut diag).unwrap();
        assert_eq!(drum.l(), 1);
        assert_eq!(diag.events.len(), 1);
    }

    #[test]
    fn multiply_runs_t_times_two_half_steps() {
        let mut drum = Drum::new();
        drum.set_l(0);
        let mut cpu = Processor::new();
        let mut partner = NoPartner;
        let mut diag = CollectingDiagnostics::default();
        let cmd = Command {
            c1: false,
            d: 31,
            s: 24,
            c: 0,
            n: 0,
            bp: false,
            t: 3,
            di: false,
        };
        multiply(&mut cpu, &mut drum, &mut partner, cmd, &mut diag).unwrap();
        assert_eq!(drum.l(), 6, "MUL must advance L by exactly 2*T word-times");
    }
}
