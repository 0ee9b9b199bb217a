//! Demo application: attaches every header position and sweeps the servos.

use embassy_time::{Duration, Ticker};
use servo_core::channels::MAX_CHANNELS;
use servo_core::handle::ServoHandle;
use servo_core::mapping::MAX_ANGLE_DEGREES;

use super::with_scheduler;
use crate::hw::ServoPin;
use crate::status;

const STEP_PERIOD: Duration = Duration::from_millis(20);
const STEP_DEGREES: i32 = 2;
const STATUS_EVERY_STEPS: u32 = 250;

#[embassy_executor::task]
pub async fn run(servos: &'static mut [ServoHandle<ServoPin>; MAX_CHANNELS]) -> ! {
    for (servo, pin) in servos.iter_mut().zip(ServoPin::ALL) {
        match with_scheduler(|scheduler| servo.attach(scheduler, pin)) {
            Some(Ok(_)) => defmt::info!("servo {} attached", pin.label()),
            Some(Err(err)) => defmt::warn!(
                "servo {} attach failed: {}",
                pin.label(),
                defmt::Display2Format(&err)
            ),
            None => defmt::error!("scheduler not initialised"),
        }
    }

    let mut ticker = Ticker::every(STEP_PERIOD);
    let mut angle = 0;
    let mut step = STEP_DEGREES;
    let mut steps: u32 = 0;

    loop {
        with_scheduler(|scheduler| {
            for (index, servo) in servos.iter_mut().enumerate() {
                // Odd header positions mirror the even ones.
                let target = if index % 2 == 0 {
                    angle
                } else {
                    MAX_ANGLE_DEGREES - angle
                };
                servo.write(scheduler, target);
            }
            status::record_active_mask(scheduler.table().active_mask());
        });

        angle += step;
        if angle <= 0 || angle >= MAX_ANGLE_DEGREES {
            step = -step;
        }

        steps = steps.wrapping_add(1);
        if steps % STATUS_EVERY_STEPS == 0 {
            let snapshot = status::snapshot();
            defmt::info!(
                "status pulses={} skipped={} idle={} active={} last={}us",
                snapshot.pulses_emitted,
                snapshot.turns_skipped,
                snapshot.idle_expiries,
                snapshot.active_channels(),
                snapshot.last_pulse_us
            );
        }

        ticker.next().await;
    }
}
