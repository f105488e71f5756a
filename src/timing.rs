//! # Timing
//!
//! All waits of the adapter are busy-polled against a [fugit_timer::Timer]. The constants in
//! [Timing] were tuned on real hardware and may be adjusted if the target's timing margins differ.
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;

/// Default delay between the characters of the `+++` escape sequence in ms
pub const DEFAULT_ESCAPE_CHAR_DELAY_MS: u32 = 5;

/// Tuned timing values in milliseconds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Timeout for setup commands (echo, mode, auto connect, TCP setup)
    pub command_timeout_ms: u32,

    /// Timeout for joining the access point
    pub join_timeout_ms: u32,

    /// Timeout for leaving the access point
    pub disconnect_timeout_ms: u32,

    /// Timeout for the close command after leaving passthrough mode
    pub close_timeout_ms: u32,

    /// Delay after every successful command, so the modem can commit its state
    pub settle_ms: u32,

    /// Max. time for capturing a single line
    pub line_timeout_ms: u32,

    /// Time the reset line is held low
    pub reset_low_ms: u32,

    /// Time waited after releasing the reset line
    pub reset_recovery_ms: u32,

    /// Time received data is discarded after a reset (boot messages)
    pub drain_ms: u32,

    /// Quiet period before the escape sequence. ESP-AT requires at least 2 seconds.
    pub escape_guard_before_ms: u32,

    /// Quiet period between escape sequence and close command
    pub escape_guard_after_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            command_timeout_ms: 10_000,
            join_timeout_ms: 20_000,
            disconnect_timeout_ms: 1_000,
            close_timeout_ms: 10_000,
            settle_ms: 1_000,
            line_timeout_ms: 2_000,
            reset_low_ms: 500,
            reset_recovery_ms: 1_000,
            drain_ms: 2_000,
            escape_guard_before_ms: 3_000,
            escape_guard_after_ms: 2_000,
        }
    }
}

/// Point in time after which a wait is given up
#[derive(Copy, Clone, Debug)]
pub struct Deadline<const TIMER_HZ: u32> {
    start: TimerInstantU32<TIMER_HZ>,
    duration: TimerDurationU32<TIMER_HZ>,
}

impl<const TIMER_HZ: u32> Deadline<TIMER_HZ> {
    /// Arms a deadline of the given duration starting at the current timer instant
    pub fn start<T: Timer<TIMER_HZ>>(timer: &mut T, duration: TimerDurationU32<TIMER_HZ>) -> Self {
        Self::starting_at(timer.now(), duration)
    }

    /// Arms a deadline of the given duration starting at `start`
    pub fn starting_at(start: TimerInstantU32<TIMER_HZ>, duration: TimerDurationU32<TIMER_HZ>) -> Self {
        Self { start, duration }
    }

    /// Time passed since the deadline was armed. Instants before the start count as zero.
    pub fn elapsed(&self, now: TimerInstantU32<TIMER_HZ>) -> TimerDurationU32<TIMER_HZ> {
        now.checked_duration_since(self.start)
            .unwrap_or(TimerDurationU32::from_ticks(0))
    }

    /// Time left until expiry, zero if already expired
    pub fn remaining(&self, now: TimerInstantU32<TIMER_HZ>) -> TimerDurationU32<TIMER_HZ> {
        self.duration
            .checked_sub(self.elapsed(now))
            .unwrap_or(TimerDurationU32::from_ticks(0))
    }

    /// True once the full duration has elapsed
    pub fn is_expired(&self, now: TimerInstantU32<TIMER_HZ>) -> bool {
        self.elapsed(now) >= self.duration
    }
}

/// Busy-waits for the given duration
pub(crate) fn pause<T: Timer<TIMER_HZ>, const TIMER_HZ: u32>(timer: &mut T, duration: TimerDurationU32<TIMER_HZ>) {
    let deadline = Deadline::start(timer, duration);
    while !deadline.is_expired(timer.now()) {}
}
