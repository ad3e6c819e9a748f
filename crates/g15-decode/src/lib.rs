//! Command word decoding and disassembly for the Bendix G-15 (§4.D fields,
//! component F in spec.md's table).
//!
//! A command is a 29-bit word read from whatever line CD currently
//! designates. This crate only knows how to pull the fields back apart and
//! render them for a trace; it has no opinion about what they *do* — that's
//! `g15-cpu`.

mod command;
mod special;

pub use command::{apply_l107_adjustment, cd_to_line, Command};
pub use special::Special;

#[cfg(test)]
mod tests {
    use super::*;
    use g15_word::Word;

    #[test]
    fn decode_encode_round_trip() {
        let cmd = Command {
            c1: true,
            d: 28,
            s: 7,
            c: 2,
            n: 92,
            bp: false,
            t: 91,
            di: false,
        };
        let encoded = cmd.encode();
        let decoded = Command::decode(encoded);
        assert_eq!(cmd, decoded);
    }

    #[test]
    fn cd_to_line_table() {
        assert_eq!(cd_to_line(0), 0);
        assert_eq!(cd_to_line(5), 5);
        assert_eq!(cd_to_line(6), 19);
        assert_eq!(cd_to_line(7), 23);
    }

    #[test]
    fn cs_set_only_for_ordinary_lines_and_high_characteristic() {
        let via_ar = Command {
            c1: false,
            d: 5,
            s: 3,
            c: 3,
            n: 0,
            bp: false,
            t: 0,
            di: false,
        };
        assert!(via_ar.cs());

        let not_via_ar_register_dest = Command { d: 28, ..via_ar };
        assert!(!not_via_ar_register_dest.cs());

        let not_via_ar_low_c = Command { c: 0, ..via_ar };
        assert!(!not_via_ar_low_c.cs());
    }

    #[test]
    fn zero_word_decodes_to_all_zero_fields() {
        let cmd = Command::decode(Word::new(0));
        assert!(!cmd.c1);
        assert_eq!(cmd.d, 0);
        assert_eq!(cmd.s, 0);
        assert_eq!(cmd.c, 0);
        assert_eq!(cmd.n, 0);
        assert!(!cmd.bp);
        assert_eq!(cmd.t, 0);
        assert!(!cmd.di);
    }
}
