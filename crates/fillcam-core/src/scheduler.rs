//! Round scheduler.
//!
//! One round runs sense → decide light → warm up → shoot/upload ×N →
//! light off → retention → reschedule, to completion. Every step after
//! sensing is best-effort: failures are logged and the round carries on.
//!
//! Rounds are spaced by the configured interval measured from the previous
//! round's target, not from its completion, so slow rounds do not push the
//! schedule back. A loop that has fallen more than a whole interval behind
//! restarts the schedule from now instead of firing back-to-back.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::capture::{Camera, CaptureRequest, capture_file_name, discard_partial};
use crate::clock::Clock;
use crate::config::Config;
use crate::light::{FillControl, LightError};
use crate::retention::{RetentionManager, RetentionReport};
use crate::sampling::{LuxSummary, read_lux_avg};
use crate::sensors::AmbientLightSensor;
use crate::upload::{UploadError, Uploader};

/// Whether a round needs the fill light, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillDecision {
    /// Average at or above the threshold
    Sufficient,
    /// Average below the threshold
    Insufficient,
    /// No sample could be read; light is used anyway
    SensorFailure,
}

impl FillDecision {
    pub fn decide(summary: &LuxSummary, threshold: f64) -> Self {
        match summary.average {
            Some(avg) if avg < threshold => Self::Insufficient,
            Some(_) => Self::Sufficient,
            None => Self::SensorFailure,
        }
    }

    pub const fn needs_fill(self) -> bool {
        matches!(self, Self::Insufficient | Self::SensorFailure)
    }
}

#[derive(Debug, Clone, Copy)]
enum RoundPhase {
    Sense,
    DecideLight,
    Warmup,
    ShootUpload,
    LightOff,
    Retention,
    Reschedule,
}

/// What happened during one round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// 1-based round counter
    pub round: u64,
    /// Instant the round was scheduled for
    pub target: Instant,
    pub lux: LuxSummary,
    pub fill: FillDecision,
    /// Set whenever an ON request was issued, even if it failed
    pub light_switched_on: bool,
    pub shots: usize,
    pub captured: Vec<PathBuf>,
    pub uploaded: usize,
    /// `None` when the retention scan failed
    pub retention: Option<RetentionReport>,
    pub next_fire: Instant,
}

/// Next target after a round scheduled for `target` finished at `now`.
///
/// Normally `target + interval`, even when that is already slightly in the
/// past (the following round then fires at once). If `now` is more than one
/// interval past that, the schedule restarts at `now + interval`.
pub fn next_fire_after(target: Instant, interval: Duration, now: Instant) -> Instant {
    let next = target + interval;
    match now.checked_duration_since(next) {
        Some(behind) if behind > interval => {
            warn!(
                "Round schedule {:.1}s behind; restarting from now",
                behind.as_secs_f64()
            );
            now + interval
        }
        _ => next,
    }
}

/// Owns the configuration, the schedule, and every capability a round uses.
pub struct RoundScheduler<S, F, C, U, K> {
    config: Config,
    sensor: S,
    light: F,
    camera: C,
    uploader: U,
    clock: K,
    retention: RetentionManager,
    next_fire: Instant,
    rounds: u64,
}

impl<S, F, C, U, K> RoundScheduler<S, F, C, U, K>
where
    S: AmbientLightSensor,
    F: FillControl,
    C: Camera,
    U: Uploader,
    K: Clock,
{
    /// The first round is due immediately.
    pub fn new(config: Config, sensor: S, light: F, camera: C, uploader: U, clock: K) -> Self {
        let retention = RetentionManager::new(
            config.capture.output_dir.clone(),
            config.retention_policy(),
        );
        let next_fire = clock.now();
        Self {
            config,
            sensor,
            light,
            camera,
            uploader,
            clock,
            retention,
            next_fire,
            rounds: 0,
        }
    }

    pub const fn next_fire(&self) -> Instant {
        self.next_fire
    }

    pub fn is_due(&self) -> bool {
        self.clock.now() >= self.next_fire
    }

    /// Run a round if one is due.
    pub fn poll(&mut self) -> Option<RoundReport> {
        self.is_due().then(|| self.run_round())
    }

    /// Wait one poll period, or less if the next round falls due sooner.
    pub fn idle(&mut self) {
        let poll = Duration::from_millis(u64::from(self.config.runtime.poll_ms));
        let until_due = self
            .next_fire
            .saturating_duration_since(self.clock.now());
        self.clock.sleep(poll.min(until_due));
    }

    fn enter(&self, phase: RoundPhase) {
        debug!("Round {}: {:?}", self.rounds, phase);
    }

    /// Run one round now, regardless of the schedule.
    pub fn run_round(&mut self) -> RoundReport {
        self.rounds += 1;
        let target = self.next_fire;
        info!("Round {} starting", self.rounds);

        self.enter(RoundPhase::Sense);
        let lux = read_lux_avg(
            &mut self.sensor,
            &mut self.clock,
            self.config.lux.samples,
            self.config.lux.sample_gap_ms,
        );

        self.enter(RoundPhase::DecideLight);
        let fill = FillDecision::decide(&lux, self.config.lux.threshold);
        match (fill, lux.average) {
            (FillDecision::SensorFailure, _) => warn!(
                "No valid lux sample ({} attempts); using fill light",
                lux.requested
            ),
            (_, Some(avg)) => info!(
                "Lux {:.3} from {}/{} samples (threshold {}): {:?}",
                avg, lux.valid, lux.requested, self.config.lux.threshold, fill
            ),
            (_, None) => {}
        }

        let mut light_switched_on = false;
        if fill.needs_fill() {
            self.enter(RoundPhase::Warmup);
            if let Err(e) = self.light.set_fill(true) {
                warn!("Continuing without confirmed fill light: {e}");
            }
            light_switched_on = true;
            self.clock.delay_ms(self.config.light.warmup_ms);
        }

        self.enter(RoundPhase::ShootUpload);
        let shots = self.config.capture.shots_per_round;
        let mut captured = Vec::new();
        let mut uploaded = 0;
        for index in 1..=shots {
            let name = capture_file_name(&chrono::Local::now(), index);
            let request = CaptureRequest {
                output_path: self.config.capture.output_dir.join(&name),
                width: self.config.capture.width,
                height: self.config.capture.height,
            };

            if let Err(e) = self.camera.capture(&request) {
                warn!("Shot {index}/{shots} failed: {e}");
                discard_partial(&request.output_path);
                continue;
            }
            info!("Shot {index}/{shots} saved to {}", request.output_path.display());

            match self.uploader.upload(&request.output_path, &name) {
                Ok(()) => {
                    uploaded += 1;
                    info!("Uploaded {name}");
                }
                Err(UploadError::Disabled) => debug!("Upload disabled; keeping {name} local"),
                Err(e) => warn!("Upload of {name} failed: {e}"),
            }
            captured.push(request.output_path);

            self.clock.delay_ms(self.config.capture.shot_gap_ms);
        }

        if light_switched_on {
            self.enter(RoundPhase::LightOff);
            if let Err(e) = self.light.set_fill(false) {
                warn!("Fill light may still be on: {e}");
            }
        }

        self.enter(RoundPhase::Retention);
        let retention = match self.retention.run() {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Retention skipped: {e}");
                None
            }
        };

        self.enter(RoundPhase::Reschedule);
        let interval = self.config.interval();
        self.next_fire = next_fire_after(target, interval, self.clock.now());
        info!(
            "Round {} done: {}/{} captured, {} uploaded; next in {:.0}s",
            self.rounds,
            captured.len(),
            shots,
            uploaded,
            self.next_fire
                .saturating_duration_since(self.clock.now())
                .as_secs_f64()
        );

        RoundReport {
            round: self.rounds,
            target,
            lux,
            fill,
            light_switched_on,
            shots,
            captured,
            uploaded,
            retention,
            next_fire: self.next_fire,
        }
    }

    /// Force the fill light off.
    pub fn shutdown(&mut self) -> Result<(), LightError> {
        info!("Scheduler stopping after {} rounds", self.rounds);
        self.light.set_fill(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{FillLight, Polarity};
    use crate::sensors::RawLux;
    use crate::testing::{
        Event, EventLog, FakeCamera, FakeClock, FakeUploader, RecordingPin, ScriptedSensor,
    };

    const SECOND: Duration = Duration::from_secs(1);
    const DIM_LOW: RawLux = RawLux::new(10, 0);
    const DIM_MID: RawLux = RawLux::new(20, 0);
    const DIM_HIGH: RawLux = RawLux::new(25, 0);
    const BRIGHT: RawLux = RawLux::new(800, 200);

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.capture.output_dir = dir.to_path_buf();
        config.capture.interval_secs = 20;
        config.capture.shots_per_round = 5;
        config
    }

    fn fill_light(log: &EventLog) -> FillLight<RecordingPin, RecordingPin> {
        let light = FillLight::new(
            RecordingPin::new("led", log),
            Polarity::ActiveHigh,
            RecordingPin::new("relay", log),
            Polarity::ActiveLow,
        )
        .unwrap();
        log.borrow_mut().clear();
        light
    }

    fn ms(n: u64) -> Event {
        Event::Delay(Duration::from_millis(n))
    }

    fn pin(line: &'static str, high: bool) -> Event {
        Event::Pin { line, high }
    }

    #[test]
    fn test_decide_fail_open() {
        let absent = LuxSummary::from_observations([None, None]);
        let dark = LuxSummary::from_observations([Some(0.3)]);
        let bright = LuxSummary::from_observations([Some(0.8)]);

        assert_eq!(FillDecision::decide(&absent, 0.8), FillDecision::SensorFailure);
        assert_eq!(FillDecision::decide(&dark, 0.8), FillDecision::Insufficient);
        assert_eq!(FillDecision::decide(&bright, 0.8), FillDecision::Sufficient);
        assert!(FillDecision::SensorFailure.needs_fill());
        assert!(!FillDecision::Sufficient.needs_fill());
    }

    #[test]
    fn test_full_round_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let clock = FakeClock::with_log(&log);
        let t0 = clock.now();
        let sensor = ScriptedSensor::new([
            Some(DIM_LOW),
            None,
            Some(DIM_MID),
            None,
            Some(DIM_HIGH),
        ]);
        let camera = FakeCamera::new(&log).failing([2]);
        let uploader = FakeUploader::new(&log).failing([4]);
        let mut scheduler = RoundScheduler::new(
            config(dir.path()),
            sensor,
            fill_light(&log),
            camera,
            uploader,
            clock.clone(),
        );

        let report = scheduler.poll().expect("first round is due at start");

        assert_eq!(report.round, 1);
        assert_eq!(report.lux.valid, 3);
        assert_eq!(report.lux.requested, 5);
        assert!(report.lux.average.unwrap() < 0.8);
        assert_eq!(report.fill, FillDecision::Insufficient);
        assert!(report.light_switched_on);
        assert_eq!(report.shots, 5);
        assert_eq!(report.captured.len(), 4);
        assert_eq!(report.uploaded, 3);
        assert!(report.retention.is_some());
        assert_eq!(report.target, t0);
        assert_eq!(report.next_fire, t0 + 20 * SECOND);

        let expected = vec![
            ms(100),
            ms(100),
            ms(100),
            ms(100),
            pin("led", true),
            pin("relay", false),
            ms(300),
            Event::Capture(1),
            Event::Upload(1),
            ms(200),
            Event::Capture(2),
            Event::Capture(3),
            Event::Upload(3),
            ms(200),
            Event::Capture(4),
            Event::Upload(4),
            ms(200),
            Event::Capture(5),
            Event::Upload(5),
            ms(200),
            pin("led", false),
            pin("relay", true),
        ];
        assert_eq!(*log.borrow(), expected);

        let on_disk = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(on_disk, 4, "failed shot leaves no file");
    }

    #[test]
    fn test_remote_name_is_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let mut uploader = FakeUploader::new(&log);
        let mut scheduler = RoundScheduler::new(
            config(dir.path()),
            ScriptedSensor::new([Some(BRIGHT); 5]),
            fill_light(&log),
            FakeCamera::new(&log),
            &mut uploader,
            FakeClock::new(),
        );

        let report = scheduler.run_round();
        drop(scheduler);

        assert_eq!(report.fill, FillDecision::Sufficient);
        assert!(!report.light_switched_on);
        let local: Vec<String> = report
            .captured
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(uploader.remote_names, local);
        assert!(local[0].starts_with("photo_") && local[0].ends_with("_1.jpg"));
    }

    #[test]
    fn test_sensor_failure_uses_light() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let mut config = config(dir.path());
        config.capture.shots_per_round = 1;
        let mut scheduler = RoundScheduler::new(
            config,
            ScriptedSensor::new([None; 5]),
            fill_light(&log),
            FakeCamera::new(&log),
            FakeUploader::new(&log),
            FakeClock::new(),
        );

        let report = scheduler.run_round();

        assert_eq!(report.fill, FillDecision::SensorFailure);
        assert!(report.light_switched_on);
        assert!(log.borrow().contains(&pin("led", true)));
        assert_eq!(log.borrow().last(), Some(&pin("relay", true)));
    }

    #[test]
    fn test_light_off_attempted_after_failed_on() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let led = RecordingPin::new("led", &log);
        let led_faults = led.fault_handle();
        let light = FillLight::new(
            led,
            Polarity::ActiveHigh,
            RecordingPin::new("relay", &log),
            Polarity::ActiveLow,
        )
        .unwrap();
        log.borrow_mut().clear();
        let mut config = config(dir.path());
        config.capture.shots_per_round = 1;
        let mut scheduler = RoundScheduler::new(
            config,
            ScriptedSensor::new([Some(DIM_LOW); 5]),
            light,
            FakeCamera::new(&log),
            FakeUploader::new(&log),
            FakeClock::new(),
        );

        led_faults.set(1);
        let report = scheduler.run_round();

        assert!(report.light_switched_on);
        let pins: Vec<Event> = log
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Pin { .. }))
            .cloned()
            .collect();
        assert_eq!(
            pins,
            vec![pin("relay", false), pin("led", false), pin("relay", true)]
        );
    }

    #[test]
    fn test_next_fire_from_previous_target() {
        let t0 = Instant::now();
        let interval = 20 * SECOND;

        assert_eq!(next_fire_after(t0, interval, t0 + 2 * SECOND), t0 + interval);
        // Slow round, less than one interval behind: keep the fixed grid.
        assert_eq!(next_fire_after(t0, interval, t0 + 25 * SECOND), t0 + interval);
        assert_eq!(next_fire_after(t0, interval, t0 + 40 * SECOND), t0 + interval);
        // More than one interval behind the next target: restart from now.
        assert_eq!(
            next_fire_after(t0, interval, t0 + 45 * SECOND),
            t0 + 65 * SECOND
        );
    }

    #[test]
    fn test_round_overrunning_two_intervals_resets_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let clock = FakeClock::new();
        let t0 = clock.now();
        let camera = FakeCamera::new(&log).taking(&clock, 9 * SECOND);
        let mut scheduler = RoundScheduler::new(
            config(dir.path()),
            ScriptedSensor::new([Some(BRIGHT); 5]),
            fill_light(&log),
            camera,
            FakeUploader::new(&log),
            clock.clone(),
        );

        let report = scheduler.poll().unwrap();

        // 4 x 100 ms sampling + 5 x (9 s capture + 200 ms gap)
        let finished = t0 + Duration::from_millis(46_400);
        assert_eq!(clock.now(), finished);
        assert_eq!(report.next_fire, finished + 20 * SECOND);
        assert!(scheduler.poll().is_none());
    }

    #[test]
    fn test_slow_round_catches_up_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let clock = FakeClock::new();
        let t0 = clock.now();
        let camera = FakeCamera::new(&log).taking(&clock, 5 * SECOND);
        let mut scheduler = RoundScheduler::new(
            config(dir.path()),
            ScriptedSensor::new([Some(BRIGHT); 10]),
            fill_light(&log),
            camera,
            FakeUploader::new(&log),
            clock.clone(),
        );

        let first = scheduler.poll().unwrap();
        assert_eq!(first.next_fire, t0 + 20 * SECOND);

        let second = scheduler.poll().expect("overdue round fires at once");
        assert_eq!(second.target, t0 + 20 * SECOND);
        assert_eq!(second.next_fire, t0 + 40 * SECOND);
    }

    #[test]
    fn test_poll_waits_for_next_fire() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let clock = FakeClock::new();
        let t0 = clock.now();
        let mut scheduler = RoundScheduler::new(
            config(dir.path()),
            ScriptedSensor::new([Some(BRIGHT); 10]),
            fill_light(&log),
            FakeCamera::new(&log),
            FakeUploader::new(&log),
            clock.clone(),
        );

        scheduler.poll().unwrap();
        assert!(scheduler.poll().is_none());

        clock.advance(18 * SECOND);
        assert!(!scheduler.is_due());
        scheduler.idle();
        scheduler.idle();
        assert_eq!(clock.now(), t0 + 20 * SECOND);

        let report = scheduler.poll().unwrap();
        assert_eq!(report.round, 2);
        assert_eq!(report.target, t0 + 20 * SECOND);
        assert_eq!(scheduler.next_fire(), t0 + 40 * SECOND);
    }
}
