//! The I/O coroutine (§4.E): a resumable state machine that performs one
//! word-time's worth of work per [`DrumPartner::word_time_tick`] call
//! instead of looping a whole block to completion, so it interleaves with
//! the processor at the granularity §5 requires. [`crate::precession`]'s
//! loop-to-completion primitives cover the case where I/O runs alone (the
//! boot loader, reload tests); this module covers the concurrent case.
//!
//! I/O command codes (OC) are the S field of a D=31 command once S falls
//! outside the 16..=31 special range (§4.D); S=0 is reserved for cancel and
//! never reaches [`IoSubsystem::start`]. The surviving manual excerpt this
//! core was built from does not enumerate which S value names which
//! operation, so the assignment below is this implementation's own
//! decision, recorded in DESIGN.md.
pub const OC_TYPE_AR: u8 = 1;
pub const OC_TYPE_19: u8 = 2;
pub const OC_PUNCH_19: u8 = 3;
pub const OC_PAPER_TAPE_READ: u8 = 4;
pub const OC_PAPER_TAPE_REVERSE_1: u8 = 5;
pub const OC_PAPER_TAPE_REVERSE_2: u8 = 6;
pub const OC_TYPE_IN: u8 = 7;
pub const OC_CARD: u8 = 8;
pub const OC_MAG_TAPE: u8 = 9;

use g15_cpu::IoController;
use g15_drum::{Drum, DrumPartner};
use g15_panel::{Device, DeviceOutcome};
use g15_word::{DiagEvent, Diagnostics, FlipFlop, Word};

use crate::decode::{data_code, decode_input, InputCode, InputControl, OutputFormat};
use crate::precession::precess_step;

/// One operation's outstanding state machine.
#[derive(Debug)]
enum Op {
    TypeAr(TypeArPhase),
    Input(InputPhase),
    Output(OutputPhase),
    Reverse { paced: u8 },
    Stub(&'static str),
}

/// Progress through a 4-word precession block anchored wherever `L`
/// happened to be when the block started, mirroring
/// [`crate::precession::io_precess_code_to_line`]'s math but split across
/// four separate `word_time_tick` calls.
#[derive(Debug, Clone, Copy, Default)]
struct BlockCursor {
    index: u8,
    carry: u8,
    all_zero: bool,
}

impl BlockCursor {
    fn start(feed: u8) -> Self {
        Self {
            index: 0,
            carry: feed,
            all_zero: true,
        }
    }
}

#[derive(Debug)]
enum TypeArPhase {
    Sign { paced: u8 },
    Digit { nibble: u8, paced: u8 },
    Stop { paced: u8 },
}

/// The number of artificial pacing word-times inserted between characters
/// that don't otherwise cost a drum word-time (AR has no line index —
/// §4.A "this takes no drum word-time"). Not specified precisely at the
/// manual level; chosen to match the "2- or 4-word-time pacing" §4.E
/// mentions for other output characters.
const AR_CHAR_PACE: u8 = 2;

#[derive(Debug)]
enum InputPhase {
    AwaitDevice,
    Data { cursor: BlockCursor },
    OsBit { cursor: BlockCursor },
    Wait { cursor: BlockCursor },
    ReloadCopy { cursor: BlockCursor, auto: bool },
    ReloadSwap { index: u8, auto: bool },
    ReloadZero23 { index: u8 },
}

#[derive(Debug)]
enum OutputPhase {
    /// MZ holds nothing usable yet; refill it from line 19 before decoding
    /// the next character.
    RefillMz { index: u8 },
    /// Pulling one 7-bit (3 fmt + 4 data) character out of MZ.
    Extract { cursor: BlockCursor },
    AwaitFmt { fmt: OutputFormat, data: u8 },
}

/// Outcome of one I/O operation cycle, for diagnostics and for the I/O
/// ready test (D=31 S=28, C=0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoState {
    Idle,
    Active,
    Canceled,
    Hung,
    Finished,
}

/// The I/O subsystem: three peripheral adapters (reader, punch, typewriter)
/// plus the flip-flops §5 says belong to I/O rather than the processor (OC,
/// OS, AS) and the resumable operation state machine.
pub struct IoSubsystem {
    reader: Box<dyn Device>,
    punch: Box<dyn Device>,
    typewriter: Box<dyn Device>,
    state: IoState,
    oc: Option<u8>,
    /// OS: output/input sign buffer (§3, §4.E).
    os: FlipFlop,
    /// AS: automatic-reload enable (§3, the AN-model flip-flop). Not
    /// selected by a command code in this implementation — the surviving
    /// manual excerpt ties it to panel/host configuration, not a D=31
    /// special, so `g15` (the top-level machine) drives it via
    /// [`Self::set_auto_reload`].
    auto_reload: FlipFlop,
    /// SA: typewriter keyboard enable, mirroring the panel's `enable`
    /// switch.
    typewriter_enabled: FlipFlop,
    op: Option<Op>,
    /// Extra leader word-times queued by a duplicate punch command
    /// absorbed into the one already in flight (§4.E "Duplicate I/O").
    extra_leader: u8,
}

impl IoSubsystem {
    #[must_use]
    pub fn new(reader: Box<dyn Device>, punch: Box<dyn Device>, typewriter: Box<dyn Device>) -> Self {
        Self {
            reader,
            punch,
            typewriter,
            state: IoState::Idle,
            oc: None,
            os: FlipFlop::default(),
            auto_reload: FlipFlop::default(),
            typewriter_enabled: FlipFlop::default(),
            op: None,
            extra_leader: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> IoState {
        self.state
    }

    #[must_use]
    pub const fn command_code(&self) -> Option<u8> {
        self.oc
    }

    pub fn set_auto_reload(&mut self, enabled: bool) {
        self.auto_reload.set_to(enabled);
    }

    pub fn set_typewriter_enabled(&mut self, enabled: bool) {
        self.typewriter_enabled.set_to(enabled);
    }

    fn begin(&mut self, code: u8, op: Op) {
        self.oc = Some(code);
        self.state = IoState::Active;
        self.op = Some(op);
    }

    fn finish(&mut self, diag: &mut dyn Diagnostics) {
        if let Some(code) = self.oc.take() {
            diag.report(DiagEvent::IoFinished { code });
        }
        self.op = None;
        self.state = IoState::Idle;
    }

    fn hang(&mut self, device: &'static str, diag: &mut dyn Diagnostics) {
        self.state = IoState::Hung;
        diag.report(DiagEvent::Hung { device });
    }

    /// One word-time of whichever operation is in flight. Returns the
    /// diagnostics sink separately from `DrumPartner` so callers that don't
    /// need it (most `DrumPartner` sites) can pass
    /// [`g15_word::StderrDiagnostics`] or a shared collector.
    fn tick(&mut self, drum: &mut Drum, diag: &mut dyn Diagnostics) {
        let Some(op) = self.op.take() else { return };
        let next = match op {
            Op::TypeAr(phase) => self.tick_type_ar(drum, phase, diag),
            Op::Input(phase) => self.tick_input(drum, phase, diag),
            Op::Output(phase) => self.tick_output(drum, phase, diag),
            Op::Reverse { paced } => self.tick_reverse(paced, diag),
            Op::Stub(name) => {
                diag.report(DiagEvent::Warning(format!("{name} I/O command is stubbed")));
                None
            }
        };
        self.op = next;
        if self.op.is_none() && self.state == IoState::Active {
            self.finish(diag);
        }
    }

    // -- TypeAR ---------------------------------------------------------

    fn tick_type_ar(&mut self, drum: &mut Drum, phase: TypeArPhase, diag: &mut dyn Diagnostics) -> Option<Op> {
        match phase {
            TypeArPhase::Sign { paced } => {
                if paced > 0 {
                    return Some(Op::TypeAr(TypeArPhase::Sign { paced: paced - 1 }));
                }
                let code = if drum.ar().sign() { crate::decode::OUT_MINUS } else { crate::decode::OUT_SPACE };
                self.write_typewriter(code, diag);
                Some(Op::TypeAr(TypeArPhase::Digit { nibble: 0, paced: AR_CHAR_PACE }))
            }
            TypeArPhase::Digit { nibble, paced } => {
                if paced > 0 {
                    return Some(Op::TypeAr(TypeArPhase::Digit { nibble, paced: paced - 1 }));
                }
                let ar = drum.ar();
                let shift = 28 - 4 * (u32::from(nibble) + 1);
                let chunk = ((ar.raw() >> shift) & 0xF) as u8;
                self.write_typewriter(data_code(chunk), diag);
                if nibble == 6 {
                    Some(Op::TypeAr(TypeArPhase::Stop { paced: AR_CHAR_PACE }))
                } else {
                    Some(Op::TypeAr(TypeArPhase::Digit { nibble: nibble + 1, paced: AR_CHAR_PACE }))
                }
            }
            TypeArPhase::Stop { paced } => {
                if paced > 0 {
                    return Some(Op::TypeAr(TypeArPhase::Stop { paced: paced - 1 }));
                }
                self.write_typewriter(crate::decode::OUT_STOP, diag);
                None
            }
        }
    }

    fn write_typewriter(&mut self, code: u8, diag: &mut dyn Diagnostics) {
        if matches!(self.typewriter.write(code), DeviceOutcome::Hung) {
            self.hang("typewriter", diag);
        }
    }

    // -- Input: paper-tape read and type-in share one state machine -----

    fn tick_input(&mut self, drum: &mut Drum, phase: InputPhase, diag: &mut dyn Diagnostics) -> Option<Op> {
        let is_type_in = self.oc == Some(OC_TYPE_IN);
        match phase {
            InputPhase::AwaitDevice => {
                let outcome = if is_type_in {
                    if !self.typewriter_enabled.get() {
                        diag.report(DiagEvent::Warning("type-in attempted with typewriter disabled".into()));
                        return None;
                    }
                    self.typewriter.read()
                } else {
                    self.reader.read()
                };
                let code = match outcome {
                    DeviceOutcome::Ready(c) => c,
                    DeviceOutcome::Hung => {
                        self.hang(if is_type_in { "typewriter" } else { "paper-tape reader" }, diag);
                        return None;
                    }
                };
                match decode_input(code) {
                    InputCode::Data(nibble) => Some(Op::Input(InputPhase::Data { cursor: BlockCursor::start(nibble) })),
                    InputCode::Control(InputControl::Space | InputControl::Period) => Some(Op::Input(InputPhase::AwaitDevice)),
                    InputCode::Control(InputControl::Minus) => {
                        self.os.set();
                        Some(Op::Input(InputPhase::AwaitDevice))
                    }
                    InputCode::Control(InputControl::Cr | InputControl::Tab) => {
                        let feed = u8::from(self.os.get());
                        Some(Op::Input(InputPhase::OsBit { cursor: BlockCursor::start(feed) }))
                    }
                    InputCode::Control(InputControl::Wait) => Some(Op::Input(InputPhase::Wait { cursor: BlockCursor::start(0) })),
                    InputCode::Control(InputControl::Reload) => {
                        Some(Op::Input(InputPhase::ReloadCopy { cursor: BlockCursor::start(0), auto: false }))
                    }
                    InputCode::Control(InputControl::Stop) => {
                        if is_type_in {
                            None
                        } else {
                            Some(Op::Input(InputPhase::ReloadCopy { cursor: BlockCursor::start(0), auto: false }))
                        }
                    }
                }
            }
            InputPhase::Data { mut cursor } => {
                let out = tick_block(drum, 23, 4, &mut cursor);
                match out {
                    None => Some(Op::Input(InputPhase::Data { cursor })),
                    Some(shifted_out) => {
                        if self.auto_reload.get() && shifted_out != 0 {
                            Some(Op::Input(InputPhase::ReloadCopy { cursor: BlockCursor::start(0), auto: true }))
                        } else {
                            Some(Op::Input(InputPhase::AwaitDevice))
                        }
                    }
                }
            }
            InputPhase::OsBit { mut cursor } => {
                let out = tick_block(drum, 23, 1, &mut cursor);
                match out {
                    None => Some(Op::Input(InputPhase::OsBit { cursor })),
                    Some(_) => {
                        self.os.reset();
                        Some(Op::Input(InputPhase::AwaitDevice))
                    }
                }
            }
            InputPhase::Wait { mut cursor } => {
                let out = tick_block(drum, 23, 4, &mut cursor);
                match out {
                    None => Some(Op::Input(InputPhase::Wait { cursor })),
                    Some(_) => Some(Op::Input(InputPhase::AwaitDevice)),
                }
            }
            InputPhase::ReloadCopy { mut cursor, auto } => {
                let w = match drum.read(23) {
                    Ok(w) => w,
                    Err(_) => return None,
                };
                drum.set_mz(cursor.index as usize, w);
                cursor.index += 1;
                if cursor.index < 4 {
                    Some(Op::Input(InputPhase::ReloadCopy { cursor, auto }))
                } else if auto {
                    // ioInitialize23ForReload (§9 Open Question): under
                    // auto-reload, line 23 is zeroed once its contents have
                    // been copied into MZ, so the next data nibble starts a
                    // fresh word rather than continuing to shift into
                    // whatever was left behind.
                    Some(Op::Input(InputPhase::ReloadZero23 { index: 0 }))
                } else {
                    Some(Op::Input(InputPhase::ReloadSwap { index: 0, auto }))
                }
            }
            InputPhase::ReloadZero23 { mut index } => {
                let _ = drum.write(23, Word::default());
                index += 1;
                if index < 4 {
                    Some(Op::Input(InputPhase::ReloadZero23 { index }))
                } else {
                    Some(Op::Input(InputPhase::ReloadSwap { index: 0, auto: true }))
                }
            }
            InputPhase::ReloadSwap { mut index, auto } => {
                let line_word = match drum.read(19) {
                    Ok(w) => w,
                    Err(_) => return None,
                };
                let mz_word = drum.mz(index as usize);
                let _ = drum.write(19, mz_word);
                drum.set_mz(index as usize, line_word);
                index += 1;
                if index < 4 {
                    Some(Op::Input(InputPhase::ReloadSwap { index, auto }))
                } else if auto {
                    Some(Op::Input(InputPhase::AwaitDevice))
                } else {
                    None
                }
            }
        }
    }

    // -- Output: type-19 and punch-19 share one state machine ------------

    fn tick_output(&mut self, drum: &mut Drum, phase: OutputPhase, diag: &mut dyn Diagnostics) -> Option<Op> {
        let is_punch = self.oc == Some(OC_PUNCH_19);
        match phase {
            OutputPhase::RefillMz { mut index } => {
                let line_word = match drum.read(19) {
                    Ok(w) => w,
                    Err(_) => return None,
                };
                let mz_word = drum.mz(index as usize);
                let _ = drum.write(19, mz_word);
                drum.set_mz(index as usize, line_word);
                index += 1;
                if index < 4 {
                    Some(Op::Output(OutputPhase::RefillMz { index }))
                } else {
                    Some(Op::Output(OutputPhase::Extract { cursor: BlockCursor::start(0) }))
                }
            }
            OutputPhase::Extract { mut cursor } => {
                let w = drum.mz(cursor.index as usize);
                let (new_raw, bits_out) = precess_step(w.raw(), 7, cursor.carry);
                drum.set_mz(cursor.index as usize, Word::new(new_raw));
                cursor.all_zero &= new_raw == 0;
                cursor.carry = bits_out;
                cursor.index += 1;
                if cursor.index < 4 {
                    Some(Op::Output(OutputPhase::Extract { cursor }))
                } else if cursor.all_zero {
                    Some(Op::Output(OutputPhase::RefillMz { index: 0 }))
                } else {
                    let fmt = OutputFormat::from_code(bits_out >> 4);
                    let data = bits_out & 0xF;
                    Some(Op::Output(OutputPhase::AwaitFmt { fmt, data }))
                }
            }
            OutputPhase::AwaitFmt { fmt, data } => {
                let device: &mut dyn Device = if is_punch { &mut *self.punch } else { &mut *self.typewriter };
                let emitted = match fmt {
                    OutputFormat::Digit => data_code(data),
                    OutputFormat::Stop => crate::decode::OUT_STOP,
                    OutputFormat::Cr | OutputFormat::Tab => crate::decode::OUT_CR,
                    OutputFormat::Period => 0b0_0110,
                    OutputFormat::Sign => {
                        if self.os.get() {
                            crate::decode::OUT_MINUS
                        } else {
                            crate::decode::OUT_SPACE
                        }
                    }
                    OutputFormat::Reload => 0b0_0101,
                    OutputFormat::Wait => 0b0_0111,
                };
                let hung = matches!(device.write(emitted), DeviceOutcome::Hung);
                if hung {
                    self.hang(if is_punch { "punch" } else { "typewriter" }, diag);
                    return None;
                }
                if matches!(fmt, OutputFormat::Stop) {
                    None
                } else {
                    Some(Op::Output(OutputPhase::Extract { cursor: BlockCursor::start(0) }))
                }
            }
        }
    }

    // -- Reverse ----------------------------------------------------------

    fn tick_reverse(&mut self, paced: u8, diag: &mut dyn Diagnostics) -> Option<Op> {
        if paced == 0 {
            let hung = self.reader.reverse_block();
            if hung {
                self.hang("paper-tape reader", diag);
                return None;
            }
            Some(Op::Reverse { paced: 3 })
        } else if paced == 1 {
            None
        } else {
            Some(Op::Reverse { paced: paced - 1 })
        }
    }
}

/// One word-time of a 4-word-block bit precession against drum `line`,
/// matching [`crate::precession::precess_step`]'s math. Returns the bits
/// shifted off the final word once the block completes.
fn tick_block(drum: &mut Drum, line: u8, n_bits: u8, cursor: &mut BlockCursor) -> Option<u8> {
    let Ok(w) = drum.read(line) else { return None };
    let (new_raw, bits_out) = precess_step(w.raw(), n_bits, cursor.carry);
    let _ = drum.write(line, Word::new(new_raw));
    cursor.all_zero &= new_raw == 0;
    cursor.carry = bits_out;
    cursor.index += 1;
    if cursor.index < 4 {
        None
    } else {
        Some(bits_out)
    }
}

impl DrumPartner for IoSubsystem {
    fn word_time_tick(&mut self, drum: &mut Drum) {
        let mut diag = g15_word::StderrDiagnostics;
        self.tick(drum, &mut diag);
    }

    fn is_active(&self) -> bool {
        matches!(self.state, IoState::Active | IoState::Hung)
    }
}

impl IoController for IoSubsystem {
    fn start(&mut self, code: u8, characteristic: u8) {
        if DrumPartner::is_active(self) {
            if self.oc == Some(code) {
                // Duplicate I/O (§4.E): absorbed into the one already in
                // flight. Only the punch op gives this observable meaning
                // (a longer blank leader); the others just drop the repeat.
                if code == OC_PUNCH_19 {
                    self.extra_leader = self.extra_leader.saturating_add(4);
                }
                return;
            }
            // A different code arrived while one is in flight: the real
            // hardware has exactly one I/O channel, so this is dropped
            // rather than queued or interrupting the active operation.
            return;
        }
        let op = match code {
            OC_TYPE_AR => Op::TypeAr(TypeArPhase::Sign { paced: AR_CHAR_PACE }),
            OC_TYPE_19 | OC_PUNCH_19 => Op::Output(OutputPhase::RefillMz { index: 0 }),
            OC_PAPER_TAPE_READ | OC_TYPE_IN => Op::Input(InputPhase::AwaitDevice),
            OC_PAPER_TAPE_REVERSE_1 | OC_PAPER_TAPE_REVERSE_2 => Op::Reverse { paced: 0 },
            OC_CARD => Op::Stub("card reader/punch"),
            OC_MAG_TAPE => Op::Stub("magnetic tape"),
            _ => Op::Stub("unrecognized I/O command"),
        };
        let _ = characteristic;
        self.begin(code, op);
    }

    fn cancel(&mut self) {
        if self.op.is_none() && self.state != IoState::Hung {
            return;
        }
        self.op = None;
        self.oc = None;
        self.state = IoState::Canceled;
    }

    fn is_active(&self) -> bool {
        DrumPartner::is_active(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use g15_drum::Drum;
    use g15_panel::MemoryTape;
    use g15_word::CollectingDiagnostics;

    fn subsystem() -> IoSubsystem {
        IoSubsystem::new(
            Box::new(MemoryTape::new(vec![])),
            Box::new(MemoryTape::new(vec![])),
            Box::new(MemoryTape::new(vec![])),
        )
    }

    #[test]
    fn idle_subsystem_is_not_active() {
        let io = subsystem();
        assert!(!DrumPartner::is_active(&io));
    }

    #[test]
    fn starting_type_ar_becomes_active() {
        let mut io = subsystem();
        IoController::start(&mut io, OC_TYPE_AR, 0);
        assert!(DrumPartner::is_active(&io));
        assert_eq!(io.command_code(), Some(OC_TYPE_AR));
    }

    #[test]
    fn cancel_clears_active_state() {
        let mut io = subsystem();
        IoController::start(&mut io, OC_TYPE_AR, 0);
        IoController::cancel(&mut io);
        assert_eq!(io.state(), IoState::Canceled);
        assert!(!DrumPartner::is_active(&io));
    }

    #[test]
    fn duplicate_punch_extends_leader_without_restarting() {
        let mut io = subsystem();
        IoController::start(&mut io, OC_PUNCH_19, 0);
        IoController::start(&mut io, OC_PUNCH_19, 0);
        assert_eq!(io.extra_leader, 4);
    }

    #[test]
    fn type_ar_emits_sign_then_digits_then_stop() {
        let mut drum = Drum::new();
        drum.set_ar(Word::from_sign_magnitude(false, 0x000_0001));
        let mut io = subsystem();
        IoController::start(&mut io, OC_TYPE_AR, 0);
        let mut diag = CollectingDiagnostics::default();
        // Sign pacing + 7 digit paces + stop pacing; run well past completion.
        for _ in 0..200 {
            if !DrumPartner::is_active(&io) {
                break;
            }
            io.tick(&mut drum, &mut diag);
        }
        assert!(!DrumPartner::is_active(&io), "type-AR must eventually finish");
    }

    #[test]
    fn reader_hang_reports_hung_and_keeps_state() {
        let mut drum = Drum::new();
        let mut io = subsystem(); // reader has no codes queued
        IoController::start(&mut io, OC_PAPER_TAPE_READ, 0);
        let mut diag = CollectingDiagnostics::default();
        io.tick(&mut drum, &mut diag);
        assert_eq!(io.state(), IoState::Hung);
        assert!(diag.events.iter().any(|e| matches!(e, DiagEvent::Hung { .. })));
    }

    #[test]
    fn paper_tape_read_precesses_data_nibble_into_line_23() {
        let mut drum = Drum::new();
        let mut io = IoSubsystem::new(
            Box::new(MemoryTape::new(vec![data_code(0b1010)])),
            Box::new(MemoryTape::new(vec![])),
            Box::new(MemoryTape::new(vec![])),
        );
        IoController::start(&mut io, OC_PAPER_TAPE_READ, 0);
        let mut diag = CollectingDiagnostics::default();
        // One device read (zero-cost) + 4 word-times of precession.
        for _ in 0..6 {
            io.tick(&mut drum, &mut diag);
            drum.stepper().step();
        }
        // Nothing further to read, so the op is parked awaiting the device.
        assert!(DrumPartner::is_active(&io));
    }
}
