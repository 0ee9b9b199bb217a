//! Pulse timer backed by an embassy signal.
//!
//! The scheduler arms and disarms the timer from whichever context mutates
//! it. [`SignalTimer`] only posts the latest request; the pulse task owns the
//! actual deadline and calls back into the scheduler when it expires. A
//! signal keeps just the newest command, which matches the disarm-then-arm
//! pairs the scheduler issues.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use servo_core::hal::PulseTimer;

/// Request posted to the pulse task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerCommand {
    /// Expire after the given delay, measured from the request (or from the
    /// expiry that triggered it).
    Arm(Duration),
    Disarm,
}

/// Mailbox between the scheduler and the pulse task.
pub type TimerSignal = Signal<CriticalSectionRawMutex, TimerCommand>;

/// [`PulseTimer`] that forwards requests to the pulse task.
pub struct SignalTimer {
    signal: &'static TimerSignal,
}

impl SignalTimer {
    pub const fn new(signal: &'static TimerSignal) -> Self {
        Self { signal }
    }
}

impl PulseTimer for SignalTimer {
    fn arm(&mut self, delay: core::time::Duration, _: bool) {
        let delay = Duration::try_from(delay).unwrap_or(Duration::MAX);
        self.signal.signal(TimerCommand::Arm(delay));
    }

    fn disarm(&mut self) {
        self.signal.signal(TimerCommand::Disarm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_request_wins() {
        static SIGNAL: TimerSignal = Signal::new();
        let mut timer = SignalTimer::new(&SIGNAL);

        timer.arm(core::time::Duration::from_millis(5), true);
        assert_eq!(
            SIGNAL.try_take(),
            Some(TimerCommand::Arm(Duration::from_millis(5)))
        );

        timer.disarm();
        timer.arm(core::time::Duration::from_millis(20), true);
        assert_eq!(
            SIGNAL.try_take(),
            Some(TimerCommand::Arm(Duration::from_millis(20)))
        );

        timer.arm(core::time::Duration::from_millis(20), true);
        timer.disarm();
        assert_eq!(SIGNAL.try_take(), Some(TimerCommand::Disarm));
        assert_eq!(SIGNAL.try_take(), None);
    }
}
