//! Input/output code tables (§4.E): the control-code conventions that give
//! meaning to the 5-bit codes a device exchanges with the drum, and the
//! 3-bit format codes that drive each output character.

/// A decoded incoming 5-bit code: bit 4 set means the low 4 bits are a data
/// nibble bound for line 23; otherwise the low 3 bits select a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCode {
    Data(u8),
    Control(InputControl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputControl {
    Space,
    Minus,
    Cr,
    Tab,
    Stop,
    Reload,
    Period,
    Wait,
}

impl InputControl {
    #[must_use]
    pub fn from_low3(low3: u8) -> Self {
        match low3 & 0x7 {
            0 => Self::Space,
            1 => Self::Minus,
            2 => Self::Cr,
            3 => Self::Tab,
            4 => Self::Stop,
            5 => Self::Reload,
            6 => Self::Period,
            _ => Self::Wait,
        }
    }
}

/// Decode one incoming 5-bit code per the table in §4.E.
#[must_use]
pub fn decode_input(code: u8) -> InputCode {
    if code & 0x10 != 0 {
        InputCode::Data(code & 0xF)
    } else {
        InputCode::Control(InputControl::from_low3(code))
    }
}

/// A 3-bit output format code, extracted from MZ, that drives one output
/// character (§4.E "Output encode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Digit,
    Stop,
    Cr,
    Period,
    Sign,
    Reload,
    Tab,
    Wait,
}

impl OutputFormat {
    #[must_use]
    pub fn from_code(fmt: u8) -> Self {
        match fmt & 0x7 {
            0 => Self::Digit,
            1 => Self::Stop,
            2 => Self::Cr,
            3 => Self::Period,
            4 => Self::Sign,
            5 => Self::Reload,
            6 => Self::Tab,
            _ => Self::Wait,
        }
    }
}

/// The 5-bit codes emitted back out to a device, mirroring [`InputControl`]
/// so a typewriter reading its own punched-card style output decodes the
/// same way a reader would on the way back in.
pub const OUT_SPACE: u8 = 0b0_000;
pub const OUT_MINUS: u8 = 0b0_001;
pub const OUT_CR: u8 = 0b0_010;
pub const OUT_TAB: u8 = 0b0_011;
pub const OUT_STOP: u8 = 0b0_100;

#[must_use]
pub fn data_code(nibble: u8) -> u8 {
    0x10 | (nibble & 0xF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_bit_set_extracts_nibble() {
        assert_eq!(decode_input(0b1_0101), InputCode::Data(0b0101));
    }

    #[test]
    fn control_codes_match_the_table() {
        assert_eq!(decode_input(0), InputCode::Control(InputControl::Space));
        assert_eq!(decode_input(4), InputCode::Control(InputControl::Stop));
        assert_eq!(decode_input(7), InputCode::Control(InputControl::Wait));
    }

    #[test]
    fn output_format_wraps_at_three_bits() {
        assert_eq!(OutputFormat::from_code(0), OutputFormat::Digit);
        assert_eq!(OutputFormat::from_code(5), OutputFormat::Reload);
        assert_eq!(OutputFormat::from_code(0xFF), OutputFormat::Wait);
    }

    #[test]
    fn data_code_round_trips_through_decode_input() {
        assert_eq!(decode_input(data_code(0b1010)), InputCode::Data(0b1010));
    }
}
