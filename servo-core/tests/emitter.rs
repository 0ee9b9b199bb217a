use core::time::Duration;

use heapless::Vec as HeaplessVec;
use servo_core::channels::{MAX_CHANNELS, SlotId};
use servo_core::hal::{BusyWait, OutputPins, PinLevel, PulseTimer};
use servo_core::handle::{AttachConfig, ServoHandle};
use servo_core::schedule::{REFRESH_QUANTUM, SchedulerConfig};
use servo_core::scheduler::{EmitOutcome, PulseScheduler};
use servo_core::telemetry::{TelemetryEvent, TelemetryRing};

type Scheduler = PulseScheduler<MockPins, MockTimer, MockDelay, TelemetryRing<32>>;

#[test]
fn single_active_channel_waits_a_full_cycle() {
    let mut scheduler = build_scheduler();
    let mut servo = ServoHandle::new();
    servo.attach(&mut scheduler, 3).expect("attach should succeed");

    let slot = SlotId::new(0);
    assert_eq!(scheduler.schedule().next(slot), slot);
    assert_eq!(
        scheduler.schedule().delay(slot, scheduler.config()),
        REFRESH_QUANTUM * MAX_CHANNELS as u32
    );
    assert_eq!(scheduler.timer().armed, Some(Duration::from_millis(20)));

    let outcome = scheduler.on_timer();
    assert_eq!(
        outcome,
        EmitOutcome::Pulsed {
            slot,
            pulse_width_us: 1_500,
            next_in: Duration::from_millis(20),
        }
    );
    assert_eq!(scheduler.current(), slot);
    assert_eq!(scheduler.pins().pulses(), &[3]);
    assert_eq!(scheduler.delay().waits(), &[1_500]);
}

#[test]
fn all_channels_active_rotate_once_per_cycle() {
    let mut scheduler = build_scheduler();
    let mut servos: [ServoHandle<u8>; MAX_CHANNELS] = Default::default();
    for (index, servo) in servos.iter_mut().enumerate() {
        servo
            .attach_with(
                &mut scheduler,
                index as u8,
                AttachConfig::default().with_initial_value(1_000 + index as i32 * 250),
            )
            .expect("attach should succeed");
    }

    for index in 0..MAX_CHANNELS as u8 {
        let slot = SlotId::new(index);
        assert_eq!(scheduler.schedule().delay_quanta(slot), 1);
    }
    let order = scheduler.schedule().visit_order(SlotId::new(0));
    assert_eq!(
        order.as_slice(),
        &[SlotId::new(0), SlotId::new(1), SlotId::new(2), SlotId::new(3)]
    );
    assert_eq!(scheduler.schedule().next(SlotId::new(3)), SlotId::new(0));

    for _ in 0..MAX_CHANNELS * 2 {
        let outcome = scheduler.on_timer();
        assert!(outcome.rearmed());
        assert_eq!(scheduler.timer().armed, Some(REFRESH_QUANTUM));
    }

    let pulses = scheduler.pins().pulses();
    assert_eq!(pulses, &[0, 1, 2, 3, 0, 1, 2, 3]);
    assert_eq!(
        scheduler.delay().waits(),
        &[1_000, 1_250, 1_500, 1_750, 1_000, 1_250, 1_500, 1_750]
    );
}

#[test]
fn sparse_channels_absorb_idle_quanta() {
    let mut scheduler = build_scheduler();
    let mut servos: [ServoHandle<u8>; MAX_CHANNELS] = Default::default();
    for (index, servo) in servos.iter_mut().enumerate() {
        servo
            .attach(&mut scheduler, index as u8)
            .expect("attach should succeed");
    }
    servos[1].detach(&mut scheduler);
    servos[2].detach(&mut scheduler);

    let first = scheduler.on_timer();
    let second = scheduler.on_timer();

    assert_eq!(
        first,
        EmitOutcome::Pulsed {
            slot: SlotId::new(0),
            pulse_width_us: 1_500,
            next_in: REFRESH_QUANTUM * 3,
        }
    );
    assert_eq!(
        second,
        EmitOutcome::Pulsed {
            slot: SlotId::new(3),
            pulse_width_us: 1_500,
            next_in: REFRESH_QUANTUM,
        }
    );
}

#[test]
fn detaching_only_channel_stops_emission() {
    let mut scheduler = build_scheduler();
    let mut servo = ServoHandle::new();
    servo.attach(&mut scheduler, 7).expect("attach should succeed");
    assert!(scheduler.timer().armed.is_some());

    servo.detach(&mut scheduler);
    assert!(scheduler.schedule().is_idle());
    assert_eq!(scheduler.timer().armed, None);

    let arms_before = scheduler.timer().arm_count;
    assert_eq!(scheduler.on_timer(), EmitOutcome::Idle);
    assert_eq!(scheduler.timer().armed, None);
    assert_eq!(scheduler.timer().arm_count, arms_before);
    assert!(scheduler.pins().pulses().is_empty());
    assert_eq!(
        scheduler.telemetry().latest().map(|record| record.event),
        Some(TelemetryEvent::TimerDisarmed)
    );
}

#[test]
fn stale_expiry_after_going_idle_neither_pulses_nor_rearms() {
    let mut scheduler = build_scheduler();
    let mut servos: [ServoHandle<u8>; MAX_CHANNELS] = Default::default();
    for (index, servo) in servos.iter_mut().enumerate() {
        servo
            .attach(&mut scheduler, index as u8)
            .expect("attach should succeed");
    }
    scheduler.on_timer();
    scheduler.on_timer();
    let pulses_before = scheduler.pins().pulses().len();

    for servo in &mut servos {
        servo.detach(&mut scheduler);
    }

    // An expiry already in flight when the last channel went away.
    for _ in 0..3 {
        assert_eq!(scheduler.on_timer(), EmitOutcome::Idle);
    }
    assert_eq!(scheduler.pins().pulses().len(), pulses_before);
    assert_eq!(scheduler.timer().armed, None);
}

#[test]
fn detaching_cursor_slot_skips_its_turn_without_pulsing() {
    let mut scheduler = build_scheduler();
    let mut first = ServoHandle::new();
    let mut second = ServoHandle::new();
    first.attach(&mut scheduler, 10).expect("attach should succeed");
    second.attach(&mut scheduler, 11).expect("attach should succeed");

    scheduler.on_timer();
    assert_eq!(scheduler.current(), SlotId::new(1));

    second.detach(&mut scheduler);
    assert_eq!(scheduler.timer().armed, Some(REFRESH_QUANTUM * 3));

    assert_eq!(
        scheduler.on_timer(),
        EmitOutcome::Skipped {
            slot: SlotId::new(1),
            next_in: REFRESH_QUANTUM * 3,
        }
    );
    assert!(matches!(
        scheduler.on_timer(),
        EmitOutcome::Pulsed { slot, .. } if slot == SlotId::new(0)
    ));
    assert_eq!(scheduler.pins().pulses(), &[10, 10]);
}

#[test]
fn attach_drives_pin_low_as_output() {
    let mut scheduler = build_scheduler();
    let mut servo = ServoHandle::new();
    servo.attach(&mut scheduler, 4).expect("attach should succeed");

    assert_eq!(scheduler.pins().outputs(), &[4]);
    assert_eq!(scheduler.pins().levels(), &[(4, PinLevel::Low)]);
}

#[test]
fn custom_quantum_scales_timer_delays() {
    let mut scheduler: Scheduler = PulseScheduler::with_components(
        MockPins::default(),
        MockTimer::default(),
        MockDelay::default(),
        TelemetryRing::new(),
        SchedulerConfig::new(Duration::from_millis(2)),
    );
    let mut servo = ServoHandle::new();
    servo.attach(&mut scheduler, 1).expect("attach should succeed");

    assert_eq!(scheduler.timer().armed, Some(Duration::from_millis(8)));
}

#[test]
fn zero_quantum_never_arms_or_pulses() {
    let mut scheduler: Scheduler = PulseScheduler::with_components(
        MockPins::default(),
        MockTimer::default(),
        MockDelay::default(),
        TelemetryRing::new(),
        SchedulerConfig::new(Duration::ZERO),
    );
    let mut servo = ServoHandle::new();
    servo.attach(&mut scheduler, 6).expect("attach should succeed");
    assert!(!scheduler.schedule().is_idle());
    assert_eq!(scheduler.timer().arm_count, 0);

    assert_eq!(scheduler.on_timer(), EmitOutcome::Idle);
    assert_eq!(scheduler.timer().armed, None);
    assert_eq!(scheduler.timer().arm_count, 0);
    assert!(scheduler.pins().pulses().is_empty());
    assert!(scheduler.delay().waits().is_empty());
    assert_eq!(
        scheduler.telemetry().latest().map(|record| record.event),
        Some(TelemetryEvent::TimerDisarmed)
    );
}

fn build_scheduler() -> Scheduler {
    PulseScheduler::with_components(
        MockPins::default(),
        MockTimer::default(),
        MockDelay::default(),
        TelemetryRing::new(),
        SchedulerConfig::default(),
    )
}

#[derive(Default)]
struct MockPins {
    outputs: HeaplessVec<u8, 16>,
    levels: HeaplessVec<(u8, PinLevel), 64>,
    pulses: HeaplessVec<u8, 32>,
    high: Option<u8>,
}

impl MockPins {
    fn outputs(&self) -> &[u8] {
        &self.outputs
    }

    fn levels(&self) -> &[(u8, PinLevel)] {
        &self.levels
    }

    /// Pins that completed a high-then-low transition, in order.
    fn pulses(&self) -> &[u8] {
        &self.pulses
    }
}

impl OutputPins for MockPins {
    type Pin = u8;

    fn set_output_mode(&mut self, pin: u8) {
        self.outputs.push(pin).expect("output log full");
    }

    fn set_level(&mut self, pin: u8, level: PinLevel) {
        self.levels.push((pin, level)).expect("level log full");
        match level {
            PinLevel::High => self.high = Some(pin),
            PinLevel::Low if self.high == Some(pin) => {
                self.high = None;
                self.pulses.push(pin).expect("pulse log full");
            }
            PinLevel::Low => {}
        }
    }
}

#[derive(Default)]
struct MockTimer {
    armed: Option<Duration>,
    arm_count: usize,
}

impl PulseTimer for MockTimer {
    fn arm(&mut self, delay: Duration, _: bool) {
        self.armed = Some(delay);
        self.arm_count += 1;
    }

    fn disarm(&mut self) {
        self.armed = None;
    }
}

#[derive(Default)]
struct MockDelay {
    waits: HeaplessVec<u32, 32>,
}

impl MockDelay {
    fn waits(&self) -> &[u32] {
        &self.waits
    }
}

impl BusyWait for MockDelay {
    fn busy_wait_us(&mut self, micros: u32) {
        self.waits.push(micros).expect("wait log full");
    }
}
