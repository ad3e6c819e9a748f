//! Return-exit and mark-exit (D=31, S=20/21), the two halves of the
//! "select command line" special that lets a program bookmark a return
//! point on one line and jump back to it from another.

/// Return-exit (§4.D, S=20): decide the next command's word-time.
///
/// `loc`/`n`/`t`/`m` are all word-times in `0..108`; `t`/`n`/`m` are
/// compared as forward distances from `loc` so the line-wrap order ("is t
/// between n and m going forward") is measured correctly rather than by
/// raw numeric comparison.
#[must_use]
pub fn return_exit(loc: u8, n: u8, t: u8, m: u8, compute_is_bp: bool, bp: bool, stepping: bool) -> u8 {
    let forward = |x: u8| (u16::from(x) + 108 - u16::from(loc)) % 108;
    let n_rel = forward(n);
    let t_rel = forward(t);
    let m_rel = forward(m);
    if (compute_is_bp && bp) || stepping {
        m
    } else if t_rel == n_rel || (t_rel <= n_rel && n_rel <= m_rel) {
        n
    } else {
        m
    }
}

/// Mark-exit (§4.D, S=21): the word-time to embed as the bookmark a later
/// return-exit will read back as `m`. Immediate marks the current position;
/// deferred marks where the drum landed after waiting for T.
#[must_use]
pub fn mark_exit_value(immediate_loc: u8, deferred_t: u8, is_deferred: bool) -> u8 {
    if is_deferred {
        deferred_t % 108
    } else {
        immediate_loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_exit_keeps_n_when_t_between_n_and_m() {
        // loc=0, n=10, m=30, t=20 sits between n and m going forward.
        assert_eq!(return_exit(0, 10, 20, 30, false, false, false), 10);
    }

    #[test]
    fn return_exit_falls_back_to_m_when_t_outside_range() {
        assert_eq!(return_exit(0, 10, 50, 30, false, false, false), 30);
    }

    #[test]
    fn return_exit_forces_m_when_stepping() {
        assert_eq!(return_exit(0, 10, 20, 30, false, false, true), 30);
    }

    #[test]
    fn return_exit_forces_m_when_bp_mode_and_command_bp_set() {
        assert_eq!(return_exit(0, 10, 20, 30, true, true, false), 30);
    }

    #[test]
    fn mark_exit_immediate_uses_current_location() {
        assert_eq!(mark_exit_value(42, 90, false), 42);
    }

    #[test]
    fn mark_exit_deferred_uses_t() {
        assert_eq!(mark_exit_value(42, 90, true), 90);
    }
}
