//! Owns the timer deadline and invokes the scheduler's emitter on expiry.

use embassy_futures::select::{Either, select};
use embassy_time::{Instant, Timer};

use super::with_scheduler;
use crate::hw::timer::{TimerCommand, TimerSignal};
use crate::status;

#[embassy_executor::task]
pub async fn run(signal: &'static TimerSignal) -> ! {
    let mut deadline: Option<Instant> = None;

    loop {
        deadline = match deadline {
            Some(at) => match select(signal.wait(), Timer::at(at)).await {
                Either::First(command) => apply(command, Instant::now()),
                Either::Second(()) => expire(signal, at),
            },
            None => {
                let command = signal.wait().await;
                apply(command, Instant::now())
            }
        };
    }
}

fn apply(command: TimerCommand, base: Instant) -> Option<Instant> {
    match command {
        TimerCommand::Arm(delay) => Some(base + delay),
        TimerCommand::Disarm => None,
    }
}

fn expire(signal: &TimerSignal, fired_at: Instant) -> Option<Instant> {
    let outcome = with_scheduler(|scheduler| scheduler.on_timer());
    if let Some(outcome) = outcome {
        status::record_outcome(&outcome);
    }

    // The emitter re-armed (or disarmed) through the signal; measure the
    // next deadline from this expiry so the pulse width does not drift it.
    signal
        .try_take()
        .and_then(|command| apply(command, fired_at))
}
