//! Precession primitives (§4.E): bit-level cyclic shifts of a multi-word
//! drum line, driven one word-time at a time so the I/O subsystem and the
//! processor see a consistent `L` throughout.

use std::cell::Cell;

use g15_drum::{DrumError, DrumPartner};
use g15_drum::Drum;
use g15_word::Word;

fn step_one<P: DrumPartner>(drum: &mut Drum, partner: &mut P) {
    if partner.is_active() {
        partner.word_time_tick(drum);
    }
    drum.stepper().step();
}

/// `ioWaitUntil4(t)` (§4.C): step until `L` lands on the same phase as `t`
/// within a 4-word line, i.e. `(t - L) mod 4 == 0`. Used to bring `L` to a
/// 4-word line's local word 0 (`t = 0`) before a precession primitive below
/// starts reading/writing it word by word.
pub(crate) fn io_wait_until4<P: DrumPartner>(drum: &mut Drum, partner: &mut P, t: u8) {
    let count = (u16::from(t) + 108 - u16::from(drum.l())) % 4;
    for _ in 0..count {
        step_one(drum, partner);
    }
}

/// Shift `raw` left by `n_bits`, pulling `carry_in` into the vacated low
/// bits and returning the bits pushed off the top. Shared with
/// [`crate::subsystem`]'s resumable per-tick state machine, which performs
/// this same math one word at a time across separate `word_time_tick`
/// calls instead of looping internally.
pub(crate) fn precess_step(raw: u32, n_bits: u8, carry_in: u8) -> (u32, u8) {
    let mask = (1u32 << n_bits) - 1;
    let bits_out = ((raw >> (29 - n_bits)) & mask) as u8;
    let new_raw = ((raw << n_bits) | u32::from(carry_in)) & g15_word::WORD_MASK;
    (new_raw, bits_out)
}

/// Store `n_bits` of `code` into the low bits of a 4-word line (line 23 in
/// every call site), precessing the line's existing contents up, and
/// return the `n_bits` shifted off the top of the line's last word.
/// Aborts early with a sentinel `0` if `canceled` becomes set mid-shift
/// (§4.E). Brings `L` to the line's local word 0 via [`io_wait_until4`]
/// first, then touches exactly the next 4 word-times.
///
/// # Errors
/// Propagates a [`DrumError`] if `line` is not addressable.
pub fn io_precess_code_to_line<P: DrumPartner>(
    drum: &mut Drum,
    partner: &mut P,
    line: u8,
    n_bits: u8,
    code: u8,
    canceled: &Cell<bool>,
) -> Result<u8, DrumError> {
    if canceled.get() {
        return Ok(0);
    }
    io_wait_until4(drum, partner, 0);
    let mut carry = code;
    let mut out = 0u8;
    for _ in 0..4 {
        if canceled.get() {
            return Ok(0);
        }
        let w = drum.read(line)?;
        let (new_raw, bits_out) = precess_step(w.raw(), n_bits, carry);
        drum.write(line, Word::new(new_raw))?;
        carry = bits_out;
        out = bits_out;
        step_one(drum, partner);
    }
    Ok(out)
}

/// Converse of [`io_precess_code_to_line`]: precess a line up while reading
/// `n_bits`-sized codes out of the top of its last word, feeding zero into
/// the bottom. Returns the extracted code and whether the line became
/// entirely zero. Brings `L` to the line's local word 0 via
/// [`io_wait_until4`] first, then touches exactly the next 4 word-times.
///
/// # Errors
/// Propagates a [`DrumError`] if `line` is not addressable.
pub fn io_precess_line_to_code<P: DrumPartner>(
    drum: &mut Drum,
    partner: &mut P,
    line: u8,
    n_bits: u8,
    canceled: &Cell<bool>,
) -> Result<(u8, bool), DrumError> {
    if canceled.get() {
        return Ok((0, false));
    }
    io_wait_until4(drum, partner, 0);
    let mut carry = 0u8;
    let mut out = 0u8;
    let mut all_zero = true;
    for _ in 0..4 {
        if canceled.get() {
            return Ok((0, false));
        }
        let w = drum.read(line)?;
        let (new_raw, bits_out) = precess_step(w.raw(), n_bits, carry);
        drum.write(line, Word::new(new_raw))?;
        all_zero &= new_raw == 0;
        carry = bits_out;
        out = bits_out;
        step_one(drum, partner);
    }
    Ok((out, all_zero))
}

/// Swap MZ (the 4-word I/O scratch buffer) with the next 4 words of line
/// 19, cycling line 19 four words forward (§4.E).
///
/// # Errors
/// Propagates a [`DrumError`] if line 19 is not addressable (it always is;
/// this can only fail if the decoder is bypassed).
pub fn io_precess_mz_to_line19<P: DrumPartner>(drum: &mut Drum, partner: &mut P, canceled: &Cell<bool>) -> Result<(), DrumError> {
    for i in 0..4 {
        if canceled.get() {
            return Ok(());
        }
        let line_word = drum.read(19)?;
        let mz_word = drum.mz(i);
        drum.write(19, mz_word)?;
        drum.set_mz(i, line_word);
        step_one(drum, partner);
    }
    Ok(())
}

/// Seed MZ from the next 4 words of `line`, returning the low `n_bits` of
/// the first word as the initial code (§4.E).
///
/// # Errors
/// Propagates a [`DrumError`] if `line` is not addressable.
pub fn io_precess_long_line_to_mz<P: DrumPartner>(
    drum: &mut Drum,
    partner: &mut P,
    line: u8,
    n_bits: u8,
    canceled: &Cell<bool>,
) -> Result<u8, DrumError> {
    let mut first_code = 0u8;
    for i in 0..4 {
        if canceled.get() {
            return Ok(0);
        }
        let w = drum.read(line)?;
        drum.set_mz(i, w);
        if i == 0 {
            first_code = (w.raw() & ((1u32 << n_bits) - 1)) as u8;
        }
        step_one(drum, partner);
    }
    Ok(first_code)
}

/// Shift AR left by `n_bits`, writing zeros into the low bits, returning
/// the bits shifted out and a (always-false) "empty" indicator (§4.E —
/// AR is not line-indexed, so this takes no drum word-time).
pub fn io_precess_ar_to_code(drum: &mut Drum, n_bits: u8) -> (u8, bool) {
    let ar = drum.ar();
    let mask = (1u32 << n_bits) - 1;
    let bits_out = ((ar.raw() >> (29 - n_bits)) & mask) as u8;
    let new_raw = (ar.raw() << n_bits) & g15_word::WORD_MASK;
    drum.set_ar(Word::new(new_raw));
    (bits_out, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use g15_drum::NoPartner;

    #[test]
    fn code_to_line_round_trips_through_a_zeroed_line() {
        let mut drum = Drum::new();
        let mut partner = NoPartner;
        let canceled = Cell::new(false);
        let out = io_precess_code_to_line(&mut drum, &mut partner, 23, 4, 0b1010, &canceled).unwrap();
        assert_eq!(out, 0, "a previously-zero line has nothing to shift out yet");
    }

    #[test]
    fn line_to_code_drains_to_all_zero() {
        let mut drum = Drum::new();
        drum.write(23, Word::from_sign_magnitude(false, 0x0FFF_FFFF)).unwrap();
        let mut partner = NoPartner;
        let canceled = Cell::new(false);
        let (_, all_zero) = io_precess_line_to_code(&mut drum, &mut partner, 23, 4, &canceled).unwrap();
        assert!(!all_zero, "one pass does not necessarily drain every word");
    }

    #[test]
    fn cancel_flag_stops_code_to_line_immediately() {
        let mut drum = Drum::new();
        let mut partner = NoPartner;
        let canceled = Cell::new(true);
        let out = io_precess_code_to_line(&mut drum, &mut partner, 23, 4, 0b1111, &canceled).unwrap();
        assert_eq!(out, 0);
        assert_eq!(drum.l(), 0, "a canceled precession must not advance the drum");
    }

    #[test]
    fn ar_to_code_shifts_and_clears_low_bits() {
        let mut drum = Drum::new();
        drum.set_ar(Word::from_sign_magnitude(false, 0b1_0000));
        let (bits_out, empty) = io_precess_ar_to_code(&mut drum, 4);
        assert!(!empty);
        assert_eq!(bits_out, 0);
        assert_eq!(drum.ar().raw() & 0xF, 0);
    }

    #[test]
    fn mz_to_line19_swaps_and_advances_four_word_times() {
        let mut drum = Drum::new();
        drum.set_mz(0, Word::from_sign_magnitude(false, 7));
        let mut partner = NoPartner;
        let canceled = Cell::new(false);
        io_precess_mz_to_line19(&mut drum, &mut partner, &canceled).unwrap();
        assert_eq!(drum.l(), 4);
    }
}
