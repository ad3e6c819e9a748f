/// A single-bit latch with the G-15's set/reset/flip vocabulary.
///
/// Split out of the register model per the redesign guidance: flip-flops
/// (AS, BP, C1, CG, CH, CQ, DI, FO, IP, OS, RC/TR, SA, ...) are distinct from
/// drum words and shouldn't share a type with them just because the source
/// material used one `Register` class for everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlipFlop(bool);

impl FlipFlop {
    #[must_use]
    pub const fn new(value: bool) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> bool {
        self.0
    }

    pub fn set(&mut self) {
        self.0 = true;
    }

    pub fn reset(&mut self) {
        self.0 = false;
    }

    pub fn set_to(&mut self, value: bool) {
        self.0 = value;
    }

    pub fn flip(&mut self) {
        self.0 = !self.0;
    }
}

impl From<bool> for FlipFlop {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

impl From<FlipFlop> for bool {
    fn from(ff: FlipFlop) -> Self {
        ff.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_toggles() {
        let mut f = FlipFlop::new(false);
        f.flip();
        assert!(f.get());
        f.flip();
        assert!(!f.get());
    }
}
