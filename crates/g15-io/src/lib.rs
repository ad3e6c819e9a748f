//! Input/output coroutine, precession primitives, and device dispatch for
//! the Bendix G-15 (§4.E).
//!
//! The I/O subsystem is a cooperatively scheduled sibling of the processor:
//! once started by a D=31 command, it runs independently of the fetch/
//! transfer loop, touching the drum only through [`g15_drum::DrumPartner`]
//! so the two never advance `L` out of step (§5).

mod decode;
mod precession;
mod subsystem;

pub use decode::{
    data_code, decode_input, InputCode, InputControl, OutputFormat, OUT_CR, OUT_MINUS, OUT_SPACE,
    OUT_STOP, OUT_TAB,
};
pub use precession::{
    io_precess_ar_to_code, io_precess_code_to_line, io_precess_line_to_code,
    io_precess_long_line_to_mz, io_precess_mz_to_line19,
};
pub use subsystem::{
    IoSubsystem, IoState, OC_CARD, OC_MAG_TAPE, OC_PAPER_TAPE_READ, OC_PAPER_TAPE_REVERSE_1,
    OC_PAPER_TAPE_REVERSE_2, OC_PUNCH_19, OC_TYPE_19, OC_TYPE_AR, OC_TYPE_IN,
};
