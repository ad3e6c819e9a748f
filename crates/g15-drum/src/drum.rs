use g15_word::Word;

use crate::error::DrumError;
use crate::line::{Line, FAST_LINE_COUNT, FAST_LINE_SIZE, LONG_LINE_COUNT, LONG_LINE_SIZE};

/// The rotating store: 20 long lines, 4 fast lines, the MQ/ID/PN register
/// pairs, AR, the number track CN, and the I/O scratch buffer MZ, all
/// addressed relative to one shared word-time counter `L` (§3, §4.B).
#[derive(Debug, Clone)]
pub struct Drum {
    long_lines: [[Word; LONG_LINE_SIZE]; LONG_LINE_COUNT],
    fast_lines: [[Word; FAST_LINE_SIZE]; FAST_LINE_COUNT],
    mq: [Word; 2],
    id: [Word; 2],
    pn: [Word; 2],
    ar: Word,
    cn: [Word; LONG_LINE_SIZE],
    mz: [Word; 4],
    /// External input/output registers for lines 29-31's synthesis; default
    /// to zero absent attached hardware (§4.B).
    ir: Word,
    or: Word,
    l: u8,
}

impl Default for Drum {
    fn default() -> Self {
        Self::new()
    }
}

impl Drum {
    #[must_use]
    pub fn new() -> Self {
        Self {
            long_lines: [[Word::default(); LONG_LINE_SIZE]; LONG_LINE_COUNT],
            fast_lines: [[Word::default(); FAST_LINE_SIZE]; FAST_LINE_COUNT],
            mq: [Word::default(); 2],
            id: [Word::default(); 2],
            pn: [Word::default(); 2],
            ar: Word::default(),
            cn: [Word::default(); LONG_LINE_SIZE],
            mz: [Word::default(); 4],
            ir: Word::default(),
            or: Word::default(),
            l: 0,
        }
    }

    /// Current word-time position, always `0..108`.
    #[must_use]
    pub const fn l(&self) -> u8 {
        self.l
    }

    /// Force `L` directly — used only by reset/boot, never mid-command.
    pub fn set_l(&mut self, l: u8) {
        debug_assert!(l < 108, "L out of range: {l}");
        self.l = l % 108;
    }

    /// True when `L` is even (CE, "current even").
    #[must_use]
    pub const fn ce(&self) -> bool {
        self.l % 2 == 0
    }

    /// `L mod 2`, the index into a two-word register (MQ/ID/PN).
    #[must_use]
    pub const fn l2(&self) -> usize {
        (self.l % 2) as usize
    }

    /// `L mod 4`, the index into a fast line or MZ.
    #[must_use]
    pub const fn l4(&self) -> usize {
        (self.l % 4) as usize
    }

    /// Take the single non-reentrant stepping token. Only code holding a
    /// `Stepper` may advance `L`; the borrow checker statically prevents a
    /// second one from being taken until the first is dropped, which is
    /// this crate's answer to the source's runtime stepWait re-entrancy
    /// guard (see DESIGN.md).
    pub fn stepper(&mut self) -> Stepper<'_> {
        Stepper { drum: self }
    }

    /// Read the word currently addressed by `line` at the current `L`.
    ///
    /// # Errors
    /// Returns [`DrumError::InvalidLine`] for fields outside `0..=31`; this
    /// can only happen if a caller bypasses the command decoder.
    pub fn read(&self, line: u8) -> Result<Word, DrumError> {
        if line > 31 {
            return Err(DrumError::InvalidLine(line));
        }
        Ok(match Line::from_field(line) {
            Line::Long(n) => self.long_lines[n as usize][self.l as usize],
            Line::Fast(n) => self.fast_lines[n as usize][self.l4()],
            Line::Mq => self.mq[self.l2()],
            Line::Id => self.id[self.l2()],
            Line::Pn => self.pn[self.l2()],
            // §3 is authoritative over the read-side formula in §4.B: as a
            // destination TEST drives CQ; as a source it reads back zero.
            Line::Test => Word::default(),
            Line::Ar => self.ar,
            Line::Syn29 => self.synthesized_29(),
            Line::Syn30 => self.synthesized_30(),
            Line::Syn31 => self.synthesized_31(),
        })
    }

    /// Write `value` to the word currently addressed by `line`.
    ///
    /// # Errors
    /// Returns [`DrumError::WordOutOfRange`] if the value escaped the
    /// 29-bit field, or [`DrumError::InvalidLine`] for unwritable or
    /// out-of-range lines (27, 29, 30, 31 are special-cased by the
    /// processor, never written through this generic path).
    pub fn write(&mut self, line: u8, value: Word) -> Result<(), DrumError> {
        if value.raw() > g15_word::WORD_MASK {
            return Err(DrumError::WordOutOfRange(value.raw()));
        }
        match Line::from_field(line) {
            Line::Long(n) => self.long_lines[n as usize][self.l as usize] = value,
            Line::Fast(n) => {
                let i = self.l4();
                self.fast_lines[n as usize][i] = value;
            }
            Line::Mq => {
                let i = self.l2();
                self.mq[i] = value;
            }
            Line::Id => {
                let i = self.l2();
                self.id[i] = value;
            }
            Line::Pn => {
                let i = self.l2();
                self.pn[i] = value;
            }
            Line::Ar => self.ar = value,
            Line::Test | Line::Syn29 | Line::Syn30 | Line::Syn31 => {
                return Err(DrumError::InvalidLine(line));
            }
        }
        Ok(())
    }

    fn synthesized_29(&self) -> Word {
        and_words(self.fast_lines[0][self.l4()], self.ir)
    }

    fn synthesized_30(&self) -> Word {
        let not20 = Word::new(!self.fast_lines[0][self.l4()].raw() & g15_word::WORD_MASK);
        and_words(not20, self.fast_lines[1][self.l4()])
    }

    fn synthesized_31(&self) -> Word {
        and_words(self.fast_lines[0][self.l4()], self.fast_lines[1][self.l4()])
    }

    /// Read the accumulator AR.
    #[must_use]
    pub const fn ar(&self) -> Word {
        self.ar
    }

    /// Write the accumulator AR.
    pub fn set_ar(&mut self, value: Word) {
        self.ar = value;
    }

    /// Read the number track at the current `L`.
    #[must_use]
    pub fn read_cn(&self) -> Word {
        self.cn[self.l as usize]
    }

    /// Write the number track at the current `L` (used only during reset).
    pub fn write_cn(&mut self, value: Word) {
        self.cn[self.l as usize] = value;
    }

    /// Load all 108 words of CN at once, as done by the reset sequence.
    pub fn load_cn(&mut self, words: &[Word; LONG_LINE_SIZE]) {
        self.cn = *words;
    }

    /// Read a word of the 4-word I/O scratch buffer MZ.
    #[must_use]
    pub fn mz(&self, index: usize) -> Word {
        self.mz[index & 3]
    }

    /// Write a word of MZ.
    pub fn set_mz(&mut self, index: usize, value: Word) {
        self.mz[index & 3] = value;
    }

    /// Read the external input register IR.
    #[must_use]
    pub const fn ir(&self) -> Word {
        self.ir
    }

    /// Set the external input register IR (no-op absent attached hardware).
    pub fn set_ir(&mut self, value: Word) {
        self.ir = value;
    }

    /// Read the external output register OR.
    #[must_use]
    pub const fn or(&self) -> Word {
        self.or
    }

    /// Set the external output register OR.
    pub fn set_or(&mut self, value: Word) {
        self.or = value;
    }

    /// Direct long-line word access, used by the boot loader to seed CN's
    /// companion line and by snapshot restore.
    #[must_use]
    pub fn long_line_word(&self, line: u8, index: usize) -> Word {
        self.long_lines[line as usize][index]
    }

    /// Direct long-line word write, used by the boot loader.
    pub fn set_long_line_word(&mut self, line: u8, index: usize, value: Word) {
        self.long_lines[line as usize][index] = value;
    }

    // -- Register bit-level accessors (§4.B) --------------------------------
    //
    // T1 is the sign bit, T2..T29 are the magnitude bits low-to-high, in
    // the order the drum actually shifts them past the read/write heads.

    /// Bit T1 (sign) of ID, word index 1.
    #[must_use]
    pub fn get_id1_t1(&self) -> bool {
        bit_t(self.id[1], 1)
    }

    /// Set bit T2 of MQ, word index 0.
    pub fn set_mq0_t2(&mut self, value: bool) {
        set_bit_t(&mut self.mq[0], 2, value);
    }

    /// Bit T29 (magnitude MSB) of MQ, word index 0.
    #[must_use]
    pub fn get_mq0_t29(&self) -> bool {
        bit_t(self.mq[0], 29)
    }

    /// Bit T29 of MQ, word index 1 — examined by MUL/DIV as the bit being
    /// shifted out of the register this word-time (PM).
    #[must_use]
    pub fn get_mq1_t29(&self) -> bool {
        bit_t(self.mq[1], 29)
    }

    /// Bit T1 (sign) of PN, word index 0.
    #[must_use]
    pub fn get_pn0_t1(&self) -> bool {
        bit_t(self.pn[0], 1)
    }

    /// Set bit T1 of PN, word index 0.
    pub fn set_pn0_t1(&mut self, value: bool) {
        set_bit_t(&mut self.pn[0], 1, value);
    }

    /// Flip bit T1 of PN, word index 0.
    pub fn flip_pn0_t1(&mut self) {
        let cur = self.get_pn0_t1();
        self.set_pn0_t1(!cur);
    }

    /// Bit T29 of PN, word index 0.
    #[must_use]
    pub fn get_pn0_t29(&self) -> bool {
        bit_t(self.pn[0], 29)
    }
}

fn and_words(a: Word, b: Word) -> Word {
    Word::new(a.raw() & b.raw())
}

/// Read bit `t` (1-indexed, T1 = sign) of a word.
fn bit_t(word: Word, t: u8) -> bool {
    if t == 1 {
        word.sign()
    } else {
        (word.raw() >> (t - 1)) & 1 != 0
    }
}

/// Set bit `t` (1-indexed, T1 = sign) of a word in place.
fn set_bit_t(word: &mut Word, t: u8, value: bool) {
    let mut raw = word.raw();
    let shift = if t == 1 { 0 } else { t - 1 };
    if value {
        raw |= 1 << shift;
    } else {
        raw &= !(1 << shift);
    }
    *word = Word::new(raw);
}

/// The sole handle through which `L` can be advanced. Non-reentrant by
/// construction: a second `Stepper` cannot be obtained from the same
/// `Drum` while this one is alive, because [`Drum::stepper`] borrows `self`
/// mutably for the `Stepper`'s lifetime.
pub struct Stepper<'a> {
    drum: &'a mut Drum,
}

impl Stepper<'_> {
    /// Advance `L` by exactly one word-time, wrapping `107 -> 0`.
    pub fn step(&mut self) {
        self.drum.l = (self.drum.l + 1) % 108;
    }

    /// The word-time position the stepper will observe on its next read.
    #[must_use]
    pub fn l(&self) -> u8 {
        self.drum.l
    }

    /// Borrow the underlying drum for reads/writes at the current `L`.
    #[must_use]
    pub fn drum(&mut self) -> &mut Drum {
        self.drum
    }
}

#[cfg(feature = "snapshot")]
mod snapshot {
    use super::{Drum, FAST_LINE_COUNT, FAST_LINE_SIZE, LONG_LINE_COUNT, LONG_LINE_SIZE};
    use g15_word::Word;
    use serde::{Deserialize, Serialize};

    /// Serializable copy of the full drum state (§6: reset reloads CN then
    /// a bootstrap; this is the ambient save/restore path that implies).
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DrumSnapshot {
        long_lines: Vec<[u32; LONG_LINE_SIZE]>,
        fast_lines: Vec<[u32; FAST_LINE_SIZE]>,
        mq: [u32; 2],
        id: [u32; 2],
        pn: [u32; 2],
        ar: u32,
        cn: [u32; LONG_LINE_SIZE],
        mz: [u32; 4],
        ir: u32,
        or: u32,
        l: u8,
    }

    impl From<&Drum> for DrumSnapshot {
        fn from(d: &Drum) -> Self {
            Self {
                long_lines: d
                    .long_lines
                    .iter()
                    .map(|line| line.map(Word::raw))
                    .collect(),
                fast_lines: d
                    .fast_lines
                    .iter()
                    .map(|line| line.map(Word::raw))
                    .collect(),
                mq: d.mq.map(Word::raw),
                id: d.id.map(Word::raw),
                pn: d.pn.map(Word::raw),
                ar: d.ar.raw(),
                cn: d.cn.map(Word::raw),
                mz: d.mz.map(Word::raw),
                ir: d.ir.raw(),
                or: d.or.raw(),
                l: d.l,
            }
        }
    }

    impl DrumSnapshot {
        /// Rebuild a [`Drum`] from this snapshot.
        #[must_use]
        pub fn restore(&self) -> Drum {
            let mut d = Drum::new();
            for (i, line) in self.long_lines.iter().enumerate().take(LONG_LINE_COUNT) {
                d.long_lines[i] = line.map(Word::new);
            }
            for (i, line) in self.fast_lines.iter().enumerate().take(FAST_LINE_COUNT) {
                d.fast_lines[i] = line.map(Word::new);
            }
            d.mq = self.mq.map(Word::new);
            d.id = self.id.map(Word::new);
            d.pn = self.pn.map(Word::new);
            d.ar = Word::new(self.ar);
            d.cn = self.cn.map(Word::new);
            d.mz = self.mz.map(Word::new);
            d.ir = Word::new(self.ir);
            d.or = Word::new(self.or);
            d.l = self.l;
            d
        }
    }
}

#[cfg(feature = "snapshot")]
pub use snapshot::DrumSnapshot;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_wraps_107_to_0() {
        let mut drum = Drum::new();
        drum.set_l(107);
        drum.stepper().step();
        assert_eq!(drum.l(), 0);
    }

    #[test]
    fn long_line_write_read_round_trip() {
        let mut drum = Drum::new();
        drum.set_l(50);
        drum.write(3, Word::from_sign_magnitude(true, 12)).unwrap();
        assert_eq!(drum.read(3).unwrap(), Word::from_sign_magnitude(true, 12));
    }

    #[test]
    fn fast_line_indexes_by_l_mod_4() {
        let mut drum = Drum::new();
        drum.set_l(5); // l4 == 1
        drum.write(20, Word::from_sign_magnitude(false, 7)).unwrap();
        drum.set_l(9); // also l4 == 1
        assert_eq!(drum.read(20).unwrap(), Word::from_sign_magnitude(false, 7));
    }

    #[test]
    fn test_line_reads_zero() {
        let drum = Drum::new();
        assert_eq!(drum.read(27).unwrap(), Word::default());
    }

    #[test]
    fn invalid_line_is_rejected() {
        let drum = Drum::new();
        assert_eq!(drum.read(32), Err(DrumError::InvalidLine(32)));
    }

    #[test]
    fn pn0_t1_bit_accessors() {
        let mut drum = Drum::new();
        drum.set_pn0_t1(true);
        assert!(drum.get_pn0_t1());
        drum.flip_pn0_t1();
        assert!(!drum.get_pn0_t1());
    }
}
