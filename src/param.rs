/// maximum number of processes
pub const NPROC: usize = 64;
/// number of feedback-queue levels
pub const NLAYER: usize = 4;
/// open files per process
pub const NOFILE: usize = 16;
/// time quantum at level 3 (ticks)
pub const LV3_QUANTUM: usize = 32;
/// time quantum at level 2 (ticks)
pub const LV2_QUANTUM: usize = 16;
/// time quantum at level 1 (ticks)
pub const LV1_QUANTUM: usize = 8;
/// wait ticks before a level-0 process is promoted
pub const LV0_PROMOTE_WAIT: usize = 500;
/// levels 1 and 2 promote after waiting this many of their own quanta
pub const PROMOTE_FACTOR: usize = 10;

/// Time quantum for a level. Level 0 has none: it runs to completion.
pub const fn quantum(level: usize) -> Option<usize> {
    match level {
        1 => Some(LV1_QUANTUM),
        2 => Some(LV2_QUANTUM),
        3 => Some(LV3_QUANTUM),
        _ => None,
    }
}

/// Wait-tick threshold that promotes a process out of `level`.
/// The top level never promotes.
pub const fn promote_threshold(level: usize) -> Option<usize> {
    match level {
        0 => Some(LV0_PROMOTE_WAIT),
        1 => Some(PROMOTE_FACTOR * LV1_QUANTUM),
        2 => Some(PROMOTE_FACTOR * LV2_QUANTUM),
        _ => None,
    }
}
