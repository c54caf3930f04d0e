//! Request cycle over a shared segment
//!
//! Provides the producer (owner) and processor (peer) roles. One request is in
//! flight per segment at a time; the status word carries the handoff.

use crate::error::{AudioShmError, Result};
use crate::header::{AudioHeader, ProcessParams, StreamShape};
use crate::segment::AudioSegment;
use crate::status::Status;
use crate::transform;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default bound on a single wait
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Busy-spin iterations before yielding
const DEFAULT_SPIN_ITERATIONS: u32 = 256;

/// First sleep once spinning and yielding gave nothing
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(50);

/// Upper bound for the exponential sleep
const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Number of `yield_now` rounds between spinning and sleeping
const YIELD_ROUNDS: u32 = 16;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a wait may take before giving up
    pub timeout: Duration,
    /// Busy-spin iterations at the start of a wait
    pub spin_iterations: u32,
    /// Initial sleep between polls
    pub poll_interval: Duration,
    /// Cap for the doubling sleep
    pub max_poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            spin_iterations: DEFAULT_SPIN_ITERATIONS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_spin_iterations(mut self, spin_iterations: u32) -> Self {
        self.spin_iterations = spin_iterations;
        self
    }

    pub fn with_poll_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.poll_interval = initial;
        self.max_poll_interval = max.max(initial);
        self
    }
}

/// Spin, then yield, then sleep with doubling intervals
struct Backoff<'a> {
    config: &'a TransportConfig,
    round: u32,
    sleep: Duration,
}

impl<'a> Backoff<'a> {
    fn new(config: &'a TransportConfig) -> Self {
        Self {
            config,
            round: 0,
            sleep: config.poll_interval,
        }
    }

    fn snooze(&mut self) {
        if self.round < self.config.spin_iterations {
            core::hint::spin_loop();
        } else if self.round < self.config.spin_iterations + YIELD_ROUNDS {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.sleep);
            self.sleep = (self.sleep * 2).min(self.config.max_poll_interval);
        }
        self.round = self.round.saturating_add(1);
    }
}

/// Poll `status` until `done` accepts it or the timeout elapses
fn poll_status<F>(segment: &AudioSegment, config: &TransportConfig, done: F) -> Result<Status>
where
    F: Fn(Status) -> bool,
{
    let start = Instant::now();
    let mut backoff = Backoff::new(config);

    loop {
        let status = segment.status()?;
        if done(status) {
            return Ok(status);
        }

        let waited = start.elapsed();
        if waited >= config.timeout {
            return Err(AudioShmError::Timeout { waited });
        }
        backoff.snooze();
    }
}

/// Result handed back to the producer
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Output samples, interleaved
    pub samples: Vec<f32>,
    /// Processor-reported transform time
    pub elapsed_ns: i64,
}

/// Producer (owner) side of a segment
pub struct Producer {
    segment: AudioSegment,
    header: AudioHeader,
    config: TransportConfig,
    stalled: bool,
}

impl Producer {
    /// Allocate a segment for `shape` and leave it IDLE
    pub fn create(name: &str, shape: StreamShape, config: TransportConfig) -> Result<Self> {
        let params = ProcessParams::default();
        let segment = AudioSegment::create(name, shape, params)?;
        let header = AudioHeader::new(shape, params)?;

        debug!(name, ?shape, size = segment.len(), "producer segment ready");

        Ok(Self {
            segment,
            header,
            config,
            stalled: false,
        })
    }

    pub fn name(&self) -> &str {
        self.segment.name()
    }

    pub fn shape(&self) -> StreamShape {
        self.header.shape()
    }

    pub fn status(&self) -> Result<Status> {
        self.segment.status()
    }

    /// True after a timeout until [`Producer::recover`] succeeds
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Write parameters and input, then publish PROCESSING
    pub fn publish(&mut self, input: &[f32], params: ProcessParams) -> Result<()> {
        let current = self.segment.status()?;
        if current != Status::Idle {
            return Err(AudioShmError::IllegalTransition {
                from: current,
                to: Status::Processing,
            });
        }

        let expected = self.header.shape().sample_count();
        if input.len() != expected {
            return Err(AudioShmError::ShapeMismatch {
                expected: expected * 4,
                got: input.len() * 4,
            });
        }

        self.header.gain = params.gain;
        self.header.bypass = params.bypass;
        self.header.processing_time_ns = 0;

        self.segment.write_header_fields(&self.header);
        self.segment.write_input(&self.header, input);
        self.segment.transition(Status::Idle, Status::Processing)?;

        debug!(name = self.name(), samples = input.len(), ?params, "request published");
        Ok(())
    }

    /// Wait for DONE or ERROR, consume the result and reset to IDLE
    ///
    /// Fails at once with `IllegalTransition` if nothing is in flight.
    /// Consuming a terminal status clears the stalled flag.
    pub fn wait(&mut self) -> Result<Completion> {
        if self.segment.status()? == Status::Idle {
            return Err(AudioShmError::IllegalTransition {
                from: Status::Idle,
                to: Status::Idle,
            });
        }

        let status = match poll_status(&self.segment, &self.config, Status::is_terminal) {
            Ok(status) => status,
            Err(err @ AudioShmError::Timeout { .. }) => {
                warn!(name = self.name(), "timed out waiting for processor; segment stalled");
                self.stalled = true;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        match status {
            Status::Done => {
                let samples = self.segment.read_output(&self.header);
                let elapsed_ns = self.segment.read_processing_time();
                self.segment.transition(Status::Done, Status::Idle)?;
                self.stalled = false;
                Ok(Completion {
                    samples,
                    elapsed_ns,
                })
            }
            Status::Error => {
                self.segment.transition(Status::Error, Status::Idle)?;
                self.stalled = false;
                warn!(name = self.name(), "processor reported an error");
                Err(AudioShmError::ProcessingFailure(
                    "processor reported ERROR status".into(),
                ))
            }
            other => Err(AudioShmError::IllegalTransition {
                from: other,
                to: Status::Idle,
            }),
        }
    }

    /// Publish `input` and block until the processor answers
    pub fn submit(&mut self, input: &[f32], params: ProcessParams) -> Result<Completion> {
        self.publish(input, params)?;
        self.wait()
    }

    /// Bring a segment back to IDLE after a timeout
    ///
    /// Returns `Ok(true)` once the processor has reached a terminal status and
    /// the segment has been reset; `Ok(false)` while it is still PROCESSING.
    /// The late result is discarded.
    pub fn recover(&mut self) -> Result<bool> {
        match self.segment.status()? {
            Status::Idle => {
                self.stalled = false;
                Ok(true)
            }
            Status::Processing => Ok(false),
            terminal => {
                self.segment.transition(terminal, Status::Idle)?;
                self.stalled = false;
                debug!(name = self.name(), ?terminal, "stalled segment recovered");
                Ok(true)
            }
        }
    }
}

/// Outcome of one processor cycle
#[derive(Debug)]
pub enum Served {
    /// Output written, DONE published
    Done { elapsed_ns: i64 },
    /// ERROR published; the fault is reported to the processor's caller only
    Failed(AudioShmError),
}

/// Processor (peer) side of a segment
pub struct Processor {
    segment: AudioSegment,
    config: TransportConfig,
}

impl Processor {
    /// Map and validate an existing segment
    pub fn open(name: &str, config: TransportConfig) -> Result<Self> {
        let segment = AudioSegment::open(name)?;
        debug!(name, size = segment.len(), "processor attached");
        Ok(Self { segment, config })
    }

    pub fn name(&self) -> &str {
        self.segment.name()
    }

    pub fn status(&self) -> Result<Status> {
        self.segment.status()
    }

    /// Handle the pending request, if any
    ///
    /// Returns `Ok(None)` when the segment is not PROCESSING. Faults inside the
    /// cycle are published as ERROR and returned as [`Served::Failed`]; only
    /// failures to publish a status at all surface as `Err`.
    pub fn serve_pending(&self) -> Result<Option<Served>> {
        if self.segment.status()? != Status::Processing {
            return Ok(None);
        }

        match self.run_cycle() {
            Ok(elapsed_ns) => {
                self.segment.write_processing_time(elapsed_ns);
                self.segment.transition(Status::Processing, Status::Done)?;
                Ok(Some(Served::Done { elapsed_ns }))
            }
            Err(err) => {
                warn!(name = self.name(), error = %err, "request failed");
                self.segment.transition(Status::Processing, Status::Error)?;
                Ok(Some(Served::Failed(err)))
            }
        }
    }

    /// Wait up to the configured timeout for a request, then serve it
    pub fn wait_and_serve(&self) -> Result<Served> {
        poll_status(&self.segment, &self.config, |s| s == Status::Processing)?;
        match self.serve_pending()? {
            Some(served) => Ok(served),
            // Only this side leaves PROCESSING, so the request cannot vanish
            None => Err(AudioShmError::IllegalTransition {
                from: self.segment.status()?,
                to: Status::Done,
            }),
        }
    }

    fn run_cycle(&self) -> Result<i64> {
        let header = self.segment.read_header()?;
        self.segment.check_shape(&header)?;

        if header.frames == 0 {
            return Err(AudioShmError::ProcessingFailure(
                "request declares zero frames".into(),
            ));
        }
        if !header.gain.is_finite() {
            return Err(AudioShmError::ProcessingFailure(format!(
                "gain {} is not finite",
                header.gain
            )));
        }

        let input = self.segment.read_input(&header);
        let out = transform::process(&input, header.gain, header.bypass);
        self.segment.write_output(&header, &out.samples);

        debug!(
            name = self.name(),
            samples = input.len(),
            elapsed_ns = out.elapsed_ns,
            bypass = header.bypass,
            "request processed"
        );
        Ok(out.elapsed_ns)
    }
}
