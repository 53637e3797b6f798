//! Fakes shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorType, OutputPin};

use crate::capture::{Camera, CaptureError, CaptureRequest};
use crate::clock::Clock;
use crate::sensors::{AmbientLightSensor, RawLux, SensorError};
use crate::upload::{UploadError, Uploader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Delay(Duration),
    Pin { line: &'static str, high: bool },
    Capture(usize),
    Upload(usize),
}

/// Shared, ordered record of everything the fakes did.
pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Shot index from a `..._<n>.jpg` name.
fn shot_index(name: &str) -> usize {
    name.rsplit_once('_')
        .and_then(|(_, tail)| tail.split('.').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Default)]
pub struct RecordingDelay {
    total_ns: u64,
}

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

/// Clock that only moves when told to; waits advance it instantly.
///
/// Clones share the same offset so a fake camera can make time pass.
#[derive(Clone)]
pub struct FakeClock {
    base: Instant,
    offset: Rc<Cell<Duration>>,
    log: Option<EventLog>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Rc::default(),
            log: None,
        }
    }

    pub fn with_log(log: &EventLog) -> Self {
        Self {
            log: Some(log.clone()),
            ..Self::new()
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    fn wait(&mut self, duration: Duration) {
        self.advance(duration);
        if let Some(log) = &self.log {
            log.borrow_mut().push(Event::Delay(duration));
        }
    }
}

impl DelayNs for FakeClock {
    fn delay_ns(&mut self, ns: u32) {
        self.wait(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        self.wait(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.wait(Duration::from_millis(u64::from(ms)));
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

/// Replays a fixed script of reads; `None` entries and reads past the end
/// fail.
pub struct ScriptedSensor {
    script: VecDeque<Option<RawLux>>,
    reads: usize,
}

impl ScriptedSensor {
    pub fn new<I: IntoIterator<Item = Option<RawLux>>>(script: I) -> Self {
        Self {
            script: script.into_iter().collect(),
            reads: 0,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl AmbientLightSensor for ScriptedSensor {
    fn read_raw(&mut self) -> Result<RawLux, SensorError> {
        self.reads += 1;
        self.script
            .pop_front()
            .flatten()
            .ok_or_else(|| SensorError::ReadFailed {
                sensor: "scripted",
                operation: "read",
                details: "no sample".into(),
            })
    }
}

#[derive(Debug)]
pub struct PinFault;

impl digital::Error for PinFault {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// Output pin that logs every accepted write.
pub struct RecordingPin {
    line: &'static str,
    log: EventLog,
    faults: Rc<Cell<usize>>,
}

impl RecordingPin {
    pub fn new(line: &'static str, log: &EventLog) -> Self {
        Self {
            line,
            log: log.clone(),
            faults: Rc::default(),
        }
    }

    /// Setting the handle to `n` makes the next `n` writes fail unlogged.
    pub fn fault_handle(&self) -> Rc<Cell<usize>> {
        self.faults.clone()
    }

    fn write(&mut self, high: bool) -> Result<(), PinFault> {
        let pending = self.faults.get();
        if pending > 0 {
            self.faults.set(pending - 1);
            return Err(PinFault);
        }
        self.log.borrow_mut().push(Event::Pin {
            line: self.line,
            high,
        });
        Ok(())
    }
}

impl ErrorType for RecordingPin {
    type Error = PinFault;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

/// Camera writing a small file per shot, failing the listed shot indices.
pub struct FakeCamera {
    log: EventLog,
    failing: HashSet<usize>,
    clock: Option<(FakeClock, Duration)>,
}

impl FakeCamera {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            failing: HashSet::new(),
            clock: None,
        }
    }

    pub fn failing<I: IntoIterator<Item = usize>>(mut self, shots: I) -> Self {
        self.failing.extend(shots);
        self
    }

    /// Each capture takes `per_shot` of simulated time.
    pub fn taking(mut self, clock: &FakeClock, per_shot: Duration) -> Self {
        self.clock = Some((clock.clone(), per_shot));
        self
    }
}

impl Camera for FakeCamera {
    fn capture(&mut self, request: &CaptureRequest) -> Result<(), CaptureError> {
        let name = request
            .output_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let index = shot_index(name);
        self.log.borrow_mut().push(Event::Capture(index));
        if let Some((clock, per_shot)) = &self.clock {
            clock.advance(*per_shot);
        }

        if self.failing.contains(&index) {
            return Err(CaptureError::Device(format!("shot {index} failed")));
        }
        fs::write(&request.output_path, [0xFF, 0xD8, 0xFF, 0xD9])
            .map_err(|e| CaptureError::Device(e.to_string()))
    }
}

/// Uploader that records attempts, rejecting the listed shot indices.
pub struct FakeUploader {
    log: EventLog,
    failing: HashSet<usize>,
    pub remote_names: Vec<String>,
}

impl FakeUploader {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            failing: HashSet::new(),
            remote_names: Vec::new(),
        }
    }

    pub fn failing<I: IntoIterator<Item = usize>>(mut self, shots: I) -> Self {
        self.failing.extend(shots);
        self
    }
}

impl Uploader for FakeUploader {
    fn upload(&mut self, local_path: &Path, remote_name: &str) -> Result<(), UploadError> {
        let index = shot_index(remote_name);
        self.log.borrow_mut().push(Event::Upload(index));
        self.remote_names.push(remote_name.to_owned());
        if !local_path.is_file() {
            return Err(UploadError::Transport("local file missing".into()));
        }
        if self.failing.contains(&index) {
            return Err(UploadError::Transport(format!("shot {index} rejected")));
        }
        Ok(())
    }
}
