//! Reset-button boot sequence (§6): "re-loads CN from a paper-tape block
//! and then loads a bootstrap."
//!
//! The surviving manual excerpt gives the contract but not the tape's wire
//! format for CN itself (as opposed to the ordinary data-precession format
//! §4.E gives for line 23), and no original bootstrap tape was available to
//! check a concrete encoding against. This module makes an explicit,
//! documented choice (see DESIGN.md): treat the reset tape as a stream of
//! the same 5-bit data/control codes §4.E already defines, ignoring
//! anything but data codes, and assemble successive words by precessing 8
//! nibbles (32 bits) through a 29-bit register — the same left-shift-and-OR
//! math the ordinary input path uses, just run to completion up front
//! rather than word-time by word-time.

use g15_drum::{Drum, LONG_LINE_SIZE};
use g15_word::{Word, WORD_MASK};

use crate::decode_data_codes;

/// Assemble as many 29-bit words as the data codes in `codes` allow, 8
/// nibbles (32 shifted bits, truncated to 29) per word.
fn assemble_words(codes: &[u8]) -> Vec<Word> {
    let nibbles = decode_data_codes(codes);
    nibbles
        .chunks(8)
        .filter(|chunk| chunk.len() == 8)
        .map(|chunk| {
            let mut raw = 0u32;
            for &nibble in chunk {
                raw = ((raw << 4) | u32::from(nibble)) & WORD_MASK;
            }
            Word::new(raw)
        })
        .collect()
}

/// Reload CN from the first 108 assembled words of `tape`, then load the
/// bootstrap block (up to 4 words) into line 23, per the reset contract.
/// Leaves `L` at 0 and line 23 positioned to run from its first word.
pub fn reset_from_tape(drum: &mut Drum, tape: &[u8]) {
    let words = assemble_words(tape);
    let mut cn = [Word::default(); LONG_LINE_SIZE];
    for (slot, word) in cn.iter_mut().zip(words.iter().copied()) {
        *slot = word;
    }
    drum.load_cn(&cn);

    drum.set_l(0);
    for (i, word) in words.iter().skip(LONG_LINE_SIZE).take(4).enumerate() {
        let _ = drum.write(23, *word);
        drum.stepper().step();
        let _ = i;
    }
    drum.set_l(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_words_ignores_control_codes() {
        let codes = vec![0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x00, 0x06];
        let words = assemble_words(&codes);
        assert_eq!(words.len(), 1);
    }

    #[test]
    fn reset_loads_cn_and_line_23() {
        let mut drum = Drum::new();
        let mut codes = Vec::new();
        for _ in 0..(LONG_LINE_SIZE + 4) * 8 {
            codes.push(0x11);
        }
        reset_from_tape(&mut drum, &codes);
        assert_eq!(drum.l(), 0);
        assert_ne!(drum.read_cn().raw(), 0);
    }
}
