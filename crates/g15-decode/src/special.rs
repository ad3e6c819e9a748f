/// The D=31 special-command family, dispatched on S (§4.D).
///
/// Values outside this table (`S` not matched below) mean "dispatch to the
/// I/O subsystem instead" (§4.E) — decoding never fails, it just yields
/// [`Special::Io`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Halt,
    RingBell,
    OrM20AndId,
    DifferentialAnalyzer,
    SelectCommandLineReturnExit,
    SelectCommandLineMarkExit,
    TestArSign,
    ClearRegisters,
    Multiply,
    Divide,
    ShiftMqLeftIdRight,
    NormalizeMq,
    TestReady,
    TestOverflow,
    MagTapeFileCode,
    OddsAndSods,
    /// Any S value not in the special table: dispatch to the I/O
    /// subsystem (§4.E), keyed by the S value itself (the I/O "command
    /// code" OC).
    Io(u8),
}

impl Special {
    /// Decode the S field of a D=31 command into the special it selects.
    #[must_use]
    pub fn from_s(s: u8) -> Self {
        match s {
            16 => Special::Halt,
            17 => Special::RingBell,
            18 => Special::OrM20AndId,
            19 => Special::DifferentialAnalyzer,
            20 => Special::SelectCommandLineReturnExit,
            21 => Special::SelectCommandLineMarkExit,
            22 => Special::TestArSign,
            23 => Special::ClearRegisters,
            24 => Special::Multiply,
            25 => Special::Divide,
            26 => Special::ShiftMqLeftIdRight,
            27 => Special::NormalizeMq,
            28 => Special::TestReady,
            29 => Special::TestOverflow,
            30 => Special::MagTapeFileCode,
            31 => Special::OddsAndSods,
            other => Special::Io(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_special_s_dispatches_to_io() {
        assert_eq!(Special::from_s(5), Special::Io(5));
    }

    #[test]
    fn multiply_and_divide_are_distinct() {
        assert_eq!(Special::from_s(24), Special::Multiply);
        assert_eq!(Special::from_s(25), Special::Divide);
    }
}
