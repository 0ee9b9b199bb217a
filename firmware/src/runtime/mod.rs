use core::cell::RefCell;

use cortex_m::interrupt as cortex_interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32 as hal;
use embassy_stm32::gpio::Flex;
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use servo_core::channels::MAX_CHANNELS;
use servo_core::handle::ServoHandle;
use servo_core::schedule::SchedulerConfig;
use servo_core::scheduler::PulseScheduler;
use static_cell::StaticCell;

use crate::hw::timer::{SignalTimer, TimerSignal};
use crate::hw::{BlockingDelay, FlexPinBank, ServoPin};
use crate::telemetry::DefmtTelemetry;

mod pulse_task;
mod sweep_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        cortex_interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                cortex_interrupt::enable();
            }
        }
    }
}

pub(super) type FirmwareScheduler =
    PulseScheduler<FlexPinBank<'static>, SignalTimer, BlockingDelay, DefmtTelemetry>;

type SharedScheduler = Mutex<CriticalSectionRawMutex, RefCell<Option<FirmwareScheduler>>>;

static TIMER_SIGNAL: TimerSignal = Signal::new();
static SCHEDULER: SharedScheduler = Mutex::new(RefCell::new(None));
static PULSE_EXECUTOR: InterruptExecutor = InterruptExecutor::new();
static SERVOS: StaticCell<[ServoHandle<ServoPin>; MAX_CHANNELS]> = StaticCell::new();

/// Logs every pulse and skipped turn, not only table changes.
const LOG_EMITTER_EVENTS: bool = false;

#[interrupt]
unsafe fn TIM14() {
    unsafe { PULSE_EXECUTOR.on_interrupt() }
}

/// Runs `f` on the scheduler inside a critical section, so the pulse task
/// cannot observe a half-applied mutation. Returns `None` before init.
pub(super) fn with_scheduler<R>(f: impl FnOnce(&mut FirmwareScheduler) -> R) -> Option<R> {
    SCHEDULER.lock(|cell| cell.borrow_mut().as_mut().map(f))
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA6, PA7, PB0, PB1, ..
    } = hal::init(config);

    let pins = FlexPinBank::new([
        Flex::new(PA6),
        Flex::new(PA7),
        Flex::new(PB0),
        Flex::new(PB1),
    ]);
    let scheduler = PulseScheduler::with_components(
        pins,
        SignalTimer::new(&TIMER_SIGNAL),
        BlockingDelay::new(),
        if LOG_EMITTER_EVENTS {
            DefmtTelemetry::verbose()
        } else {
            DefmtTelemetry::new()
        },
        SchedulerConfig::default(),
    );
    SCHEDULER.lock(|cell| *cell.borrow_mut() = Some(scheduler));

    // Pulses preempt the application executor.
    interrupt::TIM14.set_priority(Priority::P1);
    let pulse_spawner = PULSE_EXECUTOR.start(interrupt::TIM14);
    pulse_spawner
        .spawn(pulse_task::run(&TIMER_SIGNAL))
        .expect("failed to spawn pulse task");

    let servos = SERVOS.init(Default::default());
    spawner
        .spawn(sweep_task::run(servos))
        .expect("failed to spawn sweep task");

    core::future::pending::<()>().await;
}
