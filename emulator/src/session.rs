//! Host-side simulation of the servo scheduler.
//!
//! The session owns a [`PulseScheduler`] wired to simulated pins, a simulated
//! one-shot timer and a counting busy wait. Time only advances through `run`,
//! which fires every timer expiry that falls inside the requested span, so
//! transcripts are fully deterministic.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use servo_core::channels::{MAX_CHANNELS, SlotId};
use servo_core::hal::{BusyWait, OutputPins, PinLevel, PulseTimer};
use servo_core::handle::{AttachConfig, ServoHandle};
use servo_core::schedule::SchedulerConfig;
use servo_core::scheduler::{EmitOutcome, PulseScheduler};
use servo_core::telemetry::{EventId, TelemetryRing};

use crate::grammar::{ConsoleCommand, parse_command};

/// Number of handles exposed by the console; one more than the channel
/// count so capacity exhaustion can be exercised.
pub const SERVO_HANDLES: usize = MAX_CHANNELS + 1;

/// Longest span a single `run` command may simulate.
const MAX_RUN_MILLIS: u32 = 60_000;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "attach",
        "attach <h> <pin> [<min> <max> [<value>]] - bind handle h to a pin",
    ),
    ("detach", "detach <h>                     - release handle h"),
    (
        "write",
        "write <h> <value>              - angle (<200) or pulse width",
    ),
    ("write-us", "write-us <h> <micros>          - pulse width"),
    ("read", "read <h>                       - last commanded value"),
    (
        "status",
        "status                         - channel table and timer",
    ),
    ("run", "run <ms>                       - advance simulated time"),
    ("help", "help                           - list commands"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Sweep,
    Capacity,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Sweep => "transcripts/emulator-sweep.log",
            TranscriptProfile::Capacity => "transcripts/emulator-capacity.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Sweep => "Servo emulator sweep transcript",
            TranscriptProfile::Capacity => "Servo emulator capacity transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("sweep") {
            Ok(Self::Sweep)
        } else if tag.eq_ignore_ascii_case("capacity") {
            Ok(Self::Capacity)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

type SimScheduler = PulseScheduler<SimPins, SimTimer, SimDelay, TelemetryRing>;

pub struct Session {
    scheduler: SimScheduler,
    handles: [ServoHandle<u8>; SERVO_HANDLES],
    now: Duration,
    reported_until: EventId,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    /// Creates a session that only answers on the console.
    pub fn new() -> Self {
        Self {
            scheduler: PulseScheduler::with_components(
                SimPins::default(),
                SimTimer::default(),
                SimDelay::default(),
                TelemetryRing::new(),
                SchedulerConfig::default(),
            ),
            handles: Default::default(),
            now: Duration::ZERO,
            reported_until: 0,
            transcript: None,
        }
    }

    /// Creates a session that also appends every exchange to a transcript.
    pub fn with_transcript(profile: TranscriptProfile) -> io::Result<Self> {
        let mut session = Self::new();
        session.transcript = Some(TranscriptLogger::new(profile)?);
        Ok(session)
    }

    /// Simulated time since the session started.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.log(TranscriptRole::Host, trimmed)?;

        let mut lines = match parse_command(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };
        lines.extend(self.drain_events());

        for line in &lines {
            self.log(TranscriptRole::Emulator, line)?;
        }
        Ok(lines)
    }

    fn execute(&mut self, command: ConsoleCommand) -> Vec<String> {
        match command {
            ConsoleCommand::Attach {
                handle,
                pin,
                bounds,
                value,
            } => self.attach(handle, pin, bounds, value),
            ConsoleCommand::Detach { handle } => self.with_handle(handle, |scheduler, servo| {
                if servo.attached() {
                    servo.detach(scheduler);
                    vec![format!("OK h{handle} detached")]
                } else {
                    vec![format!("OK h{handle} was not attached")]
                }
            }),
            ConsoleCommand::Write { handle, value } => {
                self.with_handle(handle, |scheduler, servo| {
                    servo.write(scheduler, value);
                    vec![describe_position(handle, servo, scheduler)]
                })
            }
            ConsoleCommand::WriteMicroseconds { handle, micros } => {
                self.with_handle(handle, |scheduler, servo| {
                    servo.write_microseconds(scheduler, micros);
                    vec![describe_position(handle, servo, scheduler)]
                })
            }
            ConsoleCommand::Read { handle } => self.with_handle(handle, |scheduler, servo| {
                vec![describe_position(handle, servo, scheduler)]
            }),
            ConsoleCommand::Status => self.status(),
            ConsoleCommand::Run { millis } => self.run(millis),
            ConsoleCommand::Help => HELP_TOPICS
                .iter()
                .map(|(_, usage)| (*usage).to_string())
                .collect(),
        }
    }

    fn attach(
        &mut self,
        handle: usize,
        pin: u8,
        bounds: Option<(u16, u16)>,
        value: Option<i32>,
    ) -> Vec<String> {
        let mut config = match bounds {
            Some((min_us, max_us)) => AttachConfig::with_bounds(min_us, max_us),
            None => AttachConfig::default(),
        };
        if let Some(value) = value {
            config = config.with_initial_value(value);
        }

        self.with_handle(handle, |scheduler, servo| {
            match servo.attach_with(scheduler, pin, config) {
                Ok(bound) => {
                    let slot = servo
                        .slot()
                        .map_or_else(|| "-".to_string(), |slot| slot.to_string());
                    let limits = servo.bounds();
                    vec![format!(
                        "OK h{handle} -> {slot} pin {bound} ({}..{}us)",
                        limits.min_us, limits.max_us
                    )]
                }
                Err(err) => vec![format!("ERR attach h{handle}: {err}")],
            }
        })
    }

    fn with_handle<F>(&mut self, handle: usize, f: F) -> Vec<String>
    where
        F: FnOnce(&mut SimScheduler, &mut ServoHandle<u8>) -> Vec<String>,
    {
        match self.handles.get_mut(handle) {
            Some(servo) => f(&mut self.scheduler, servo),
            None => vec![format!(
                "ERR unknown handle h{handle} (0..{})",
                SERVO_HANDLES - 1
            )],
        }
    }

    fn status(&self) -> Vec<String> {
        let table = self.scheduler.table();
        let schedule = self.scheduler.schedule();
        let config = self.scheduler.config();

        let mut lines: Vec<String> = table
            .iter()
            .map(|(slot, entry)| {
                let state = match entry.pin {
                    Some(pin) if table.is_active(slot) => format!(
                        "pin {pin} {}us active, {} pulses",
                        entry.pulse_width_us,
                        self.scheduler.pins().pulse_count(pin)
                    ),
                    Some(pin) => format!("pin {pin} idle"),
                    None => "vacant".to_string(),
                };
                format!(
                    "{slot}: {state}; next {} in {}ms",
                    schedule.next(slot),
                    schedule.delay(slot, config).as_millis()
                )
            })
            .collect();

        let timer = match self.scheduler.timer().deadline() {
            Some(deadline) => format!(
                "timer armed, fires at {}ms",
                deadline.as_millis()
            ),
            None => "timer disarmed".to_string(),
        };
        lines.push(format!(
            "t={}ms cursor {} {timer}; busy {}us",
            self.now.as_millis(),
            self.scheduler.current(),
            self.scheduler.delay().total_us()
        ));
        lines
    }

    /// Advances simulated time, firing every expiry that falls inside the span.
    fn run(&mut self, millis: u32) -> Vec<String> {
        if millis > MAX_RUN_MILLIS {
            return vec![format!("ERR run span limited to {MAX_RUN_MILLIS}ms")];
        }

        let end = self.now + Duration::from_millis(u64::from(millis));
        let mut pulses = 0usize;
        let mut skips = 0usize;
        let mut per_slot: BTreeMap<SlotId, usize> = BTreeMap::new();

        while let Some(deadline) = self.scheduler.timer().deadline() {
            if deadline > end {
                break;
            }
            self.advance_to(deadline);
            match self.scheduler.on_timer() {
                EmitOutcome::Pulsed { slot, .. } => {
                    pulses += 1;
                    *per_slot.entry(slot).or_default() += 1;
                }
                EmitOutcome::Skipped { .. } => skips += 1,
                EmitOutcome::Idle => {}
            }
        }
        self.advance_to(end);

        let breakdown: Vec<String> = per_slot
            .iter()
            .map(|(slot, count)| format!("{slot}={count}"))
            .collect();
        vec![format!(
            "OK ran {millis}ms to t={}ms: {pulses} pulses, {skips} skipped [{}]",
            self.now.as_millis(),
            breakdown.join(" ")
        )]
    }

    fn advance_to(&mut self, instant: Duration) {
        self.now = instant;
        self.scheduler.timer_mut().set_now(instant);
    }

    fn drain_events(&mut self) -> Vec<String> {
        let since = self.reported_until;
        let lines = self
            .scheduler
            .telemetry()
            .oldest_first()
            .filter(|record| record.id >= since && !record.event.is_emitter_event())
            .map(|record| format!("event #{} {}", record.id, record.event))
            .collect();
        self.reported_until = self.scheduler.telemetry().next_event_id();
        lines
    }

    fn log(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        let now = self.now;
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(now, role, line),
            None => Ok(()),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_position(handle: usize, servo: &ServoHandle<u8>, scheduler: &SimScheduler) -> String {
    if servo.attached() {
        format!(
            "h{handle} {}deg {}us",
            servo.read(scheduler),
            servo.read_microseconds(scheduler)
        )
    } else {
        format!("h{handle} detached")
    }
}

/// Pin bank that tracks levels and counts completed pulses per pin.
#[derive(Default)]
pub struct SimPins {
    levels: BTreeMap<u8, PinLevel>,
    pulses: BTreeMap<u8, usize>,
}

impl SimPins {
    pub fn pulse_count(&self, pin: u8) -> usize {
        self.pulses.get(&pin).copied().unwrap_or(0)
    }
}

impl OutputPins for SimPins {
    type Pin = u8;

    fn set_output_mode(&mut self, pin: u8) {
        self.levels.entry(pin).or_insert(PinLevel::Low);
    }

    fn set_level(&mut self, pin: u8, level: PinLevel) {
        let previous = self.levels.insert(pin, level);
        if previous == Some(PinLevel::High) && level == PinLevel::Low {
            *self.pulses.entry(pin).or_default() += 1;
        }
    }
}

/// One-shot timer measured against the session clock.
#[derive(Default)]
pub struct SimTimer {
    now: Duration,
    deadline: Option<Duration>,
}

impl SimTimer {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    fn set_now(&mut self, now: Duration) {
        self.now = now;
    }
}

impl PulseTimer for SimTimer {
    fn arm(&mut self, delay: Duration, _: bool) {
        self.deadline = Some(self.now + delay);
    }

    fn disarm(&mut self) {
        self.deadline = None;
    }
}

/// Busy wait that only accounts for the time it would have blocked.
#[derive(Default)]
pub struct SimDelay {
    total_us: u64,
}

impl SimDelay {
    pub fn total_us(&self) -> u64 {
        self.total_us
    }
}

impl BusyWait for SimDelay {
    fn busy_wait_us(&mut self, micros: u32) {
        self.total_us += u64::from(micros);
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_all(session: &mut Session, commands: &[&str]) -> Vec<String> {
        let mut output = Vec::new();
        for command in commands {
            output.extend(session.handle_command(command).expect("no transcript io"));
        }
        output
    }

    #[test]
    fn calibrated_writes_report_expected_widths() {
        let mut session = Session::new();
        run_all(&mut session, &["attach 0 3 1000 2000"]);

        let output = session.handle_command("write 0 90").expect("no io");
        assert_eq!(output[0], "h0 90deg 1500us");

        let output = session.handle_command("write-us 0 2500").expect("no io");
        assert_eq!(output[0], "h0 180deg 2000us");
    }

    #[test]
    fn fifth_attach_reports_exhaustion() {
        let mut session = Session::new();
        let output = run_all(
            &mut session,
            &["attach 0 1", "attach 1 2", "attach 2 3", "attach 3 4", "attach 4 5"],
        );

        assert!(
            output
                .iter()
                .any(|line| line == "ERR attach h4: all servo channels are in use"),
            "unexpected output: {output:?}"
        );
        assert!(output.iter().any(|line| line.ends_with("attach-rejected")));
    }

    #[test]
    fn run_emits_one_pulse_per_cycle_for_single_channel() {
        let mut session = Session::new();
        run_all(&mut session, &["attach 0 3"]);

        let output = session.handle_command("run 100").expect("no io");
        assert_eq!(
            output[0],
            "OK ran 100ms to t=100ms: 5 pulses, 0 skipped [ch0=5]"
        );
        assert_eq!(session.scheduler.pins().pulse_count(3), 5);
        assert_eq!(session.scheduler.delay().total_us(), 5 * 1_500);
    }

    #[test]
    fn detach_stops_the_timer() {
        let mut session = Session::new();
        run_all(&mut session, &["attach 0 3", "run 20", "detach 0"]);

        let output = session.handle_command("run 100").expect("no io");
        assert_eq!(output[0], "OK ran 100ms to t=120ms: 0 pulses, 0 skipped []");
        assert_eq!(session.scheduler.timer().deadline(), None);
    }

    #[test]
    fn unknown_handles_and_bad_syntax_are_reported() {
        let mut session = Session::new();
        let output = run_all(&mut session, &["read 9", "wiggle 0"]);
        assert_eq!(output[0], "ERR unknown handle h9 (0..4)");
        assert!(output[1].starts_with("ERR syntax"));
    }
}
