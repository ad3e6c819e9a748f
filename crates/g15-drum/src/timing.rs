use std::time::{Duration, Instant};

/// Number of word-times to advance from `l` to `t`, honoring that the drum
/// wraps `107 -> 0`, not `107 -> 108` (§4.B). This mirrors the G-15's CN
/// track counter-compensation arithmetic exactly; every step is dictated by
/// the boundary behaviors in spec.md §8, which this crate's tests check
/// directly (`compute_drum_count(l, l) == 0`, `compute_drum_count(0, 107)
/// == 107`, `compute_drum_count(107, 0) == 1`).
#[must_use]
pub fn compute_drum_count(l: u8, t: u8) -> u8 {
    let cm: u8 = (!t).wrapping_add(l) & 0x7F;
    if i16::from(l) + 0x7F - i16::from(cm) < 108 {
        return 0x7F - cm;
    }
    let adjusted = cm.wrapping_add(20);
    let overflowed = cm > 0x7F - 20;
    let adjusted_masked = adjusted & 0x7F;
    let still_crosses = i16::from(l) + 0x7F - i16::from(adjusted_masked) >= 108;
    if !overflowed && still_crosses {
        (0x7F - adjusted) & 0x7F
    } else {
        108 - l
    }
}

/// A single-shot, mutex-free handshake between two logical tasks sharing
/// one thread of control (§4.C, §9 "cross-task synchronization"). `wait`
/// arms the signal; a later `proceed` delivers a value to exactly that
/// arming. A second `wait` before a `proceed` replaces the pending arming
/// (the contract only promises *one* outstanding waiter, not a queue).
/// Calling `proceed` with nothing armed is the "double-proceed" programming
/// error the spec calls out, and panics rather than silently dropping data.
#[derive(Debug, Default)]
pub struct WaitSignal<T> {
    armed: bool,
    value: Option<T>,
}

impl<T> WaitSignal<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            armed: false,
            value: None,
        }
    }

    /// Arm the signal. Must be followed by [`Self::take`] to observe the
    /// value a paired [`Self::proceed`] delivers.
    pub fn wait(&mut self) {
        self.armed = true;
        self.value = None;
    }

    /// True while a `wait()` has not yet been matched by a `take()` that
    /// observed a delivered value.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.armed
    }

    /// Deliver `value` to the armed waiter.
    ///
    /// # Panics
    /// Panics if no `wait()` is outstanding — a double-proceed, which the
    /// spec documents as a programming error rather than a recoverable one.
    pub fn proceed(&mut self, value: T) {
        assert!(self.armed, "WaitSignal::proceed with no outstanding wait()");
        self.value = Some(value);
        self.armed = false;
    }

    /// Take the delivered value, if `proceed` has been called since the
    /// last `wait`.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }
}

/// Tracks emulation time and throttles it to real time at slice boundaries
/// (§4.C). `word_time` is the nominal duration of one drum word-time;
/// `min_throttle` is the coarse floor (~4ms) below which the emulator does
/// not bother sleeping, since OS timer resolution can't do better anyway.
#[derive(Debug)]
pub struct Clock {
    word_time: Duration,
    min_throttle: Duration,
    e_time: Duration,
    slice_end: Duration,
    run_time: Duration,
    slice_started_at: Option<Instant>,
}

impl Clock {
    #[must_use]
    pub fn new(word_time: Duration) -> Self {
        Self {
            word_time,
            min_throttle: Duration::from_millis(4),
            e_time: Duration::ZERO,
            slice_end: Duration::ZERO,
            run_time: Duration::ZERO,
            slice_started_at: None,
        }
    }

    /// Emulation time elapsed since the clock was created.
    #[must_use]
    pub const fn e_time(&self) -> Duration {
        self.e_time
    }

    /// Total wall-clock runtime accumulated across start/stop cycles.
    #[must_use]
    pub const fn run_time(&self) -> Duration {
        self.run_time
    }

    /// Begin a new throttling slice of `word_times` word-times.
    pub fn begin_slice(&mut self, word_times: u32) {
        self.slice_end = self.e_time + self.word_time * word_times;
        self.slice_started_at = Some(Instant::now());
    }

    /// Advance emulation time by one word-time. Returns `true` if this
    /// advance reached the end of the current slice, meaning the caller
    /// should call [`Self::throttle`] before doing further work.
    pub fn advance_word_time(&mut self) -> bool {
        self.e_time += self.word_time;
        self.e_time >= self.slice_end
    }

    /// Sleep, if needed, so that real time has caught up with `e_time`
    /// since the slice began. This is the emulator's only suspension point
    /// for real-time throttling (§4.C); fidelity beyond OS timer resolution
    /// is explicitly out of scope (spec.md §1 Non-goals).
    pub fn throttle(&mut self) {
        let Some(started) = self.slice_started_at.take() else {
            return;
        };
        let elapsed = started.elapsed();
        if elapsed < self.min_throttle {
            std::thread::sleep(self.min_throttle - elapsed);
            self.run_time += self.min_throttle;
        } else {
            self.run_time += elapsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_drum_count_same_position_is_zero() {
        for l in 0..108u8 {
            assert_eq!(compute_drum_count(l, l), 0, "l={l}");
        }
    }

    #[test]
    fn compute_drum_count_boundary_cases() {
        assert_eq!(compute_drum_count(0, 107), 107);
        assert_eq!(compute_drum_count(107, 0), 1);
    }

    #[test]
    fn wait_signal_round_trip() {
        let mut sig: WaitSignal<u32> = WaitSignal::new();
        sig.wait();
        assert!(sig.is_pending());
        sig.proceed(42);
        assert!(!sig.is_pending());
        assert_eq!(sig.take(), Some(42));
    }

    #[test]
    #[should_panic(expected = "no outstanding wait")]
    fn double_proceed_panics() {
        let mut sig: WaitSignal<u32> = WaitSignal::new();
        sig.wait();
        sig.proceed(1);
        sig.proceed(2);
    }
}
