use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::Sample;
use crate::error::{Result, ScopeError};
use crate::queue::{OverflowPolicy, PushOutcome, SampleQueue};

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_BLOCK_SIZE: usize = 2048;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Waveform {
    Sine = 0,
    SawUp = 1,
    SawDown = 2,
    Triangle = 3,
    Square = 4,
}

impl Waveform {
    pub const ALL: [Waveform; 5] = [
        Waveform::Sine,
        Waveform::SawUp,
        Waveform::SawDown,
        Waveform::Triangle,
        Waveform::Square,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Waveform::Sine => "Sine",
            Waveform::SawUp => "Saw up",
            Waveform::SawDown => "Saw down",
            Waveform::Triangle => "Triangle",
            Waveform::Square => "Square",
        }
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::SawUp => "saw_up",
            Waveform::SawDown => "saw_down",
            Waveform::Triangle => "triangle",
            Waveform::Square => "square",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "sine" => Some(Waveform::Sine),
            "saw_up" => Some(Waveform::SawUp),
            "saw_down" | "saw" => Some(Waveform::SawDown),
            "triangle" => Some(Waveform::Triangle),
            "square" => Some(Waveform::Square),
            _ => None,
        }
    }

    pub fn from_index(idx: u32) -> Self {
        match idx {
            1 => Waveform::SawUp,
            2 => Waveform::SawDown,
            3 => Waveform::Triangle,
            4 => Waveform::Square,
            _ => Waveform::Sine,
        }
    }
}

/// Phase accumulator producing one sample at a time.
///
/// The phase stays in `[0, 1)`. Inputs are not validated here: a zero
/// frequency holds the phase still, a negative one runs it backwards, and
/// the amplitude scales the output without clamping.
#[derive(Clone, Debug)]
pub struct Oscillator {
    sample_rate: f64,
    phase: f64,
    triangle_phase: f64,
}

impl Oscillator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: f64::from(sample_rate.max(1)),
            phase: 0.0,
            triangle_phase: 0.0,
        }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn triangle_phase(&self) -> f64 {
        self.triangle_phase
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.triangle_phase = 0.0;
    }

    pub fn advance(&mut self, frequency: f64) {
        self.phase += frequency / self.sample_rate;
        if !self.phase.is_finite() {
            self.phase = 0.0;
        } else if self.phase < 0.0 {
            self.phase = self.phase.rem_euclid(1.0);
        }
        // derived before the wrap so the triangle peaks exactly at the cycle edge
        self.triangle_phase = ((self.phase % 1.0) - 0.5).abs() * 2.0;
        if self.phase >= 1.0 {
            self.phase = 0.0;
        }
    }

    pub fn next_sample(&mut self, waveform: Waveform, frequency: f64, amplitude: f64) -> Sample {
        self.advance(frequency);
        let phase = self.phase;
        let value = match waveform {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::SawDown => phase * 2.0 - 1.0,
            Waveform::SawUp => (1.0 - phase) * 2.0 - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    -1.0
                } else {
                    1.0
                }
            }
            Waveform::Triangle => 2.0 * (self.triangle_phase - 0.5),
        };
        (value * amplitude) as Sample
    }
}

/// Atomic f32 using AtomicU32 bit-casting.
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Generator settings written by the UI and read by the generator thread.
///
/// Every field is its own atomic cell. A change to two fields at once may be
/// observed by the generator one field at a time.
pub struct SharedParams {
    frequency: AtomicF32,
    amplitude: AtomicF32,
    waveform: AtomicU32,
    running: AtomicBool,
    paused: AtomicBool,
}

impl SharedParams {
    pub fn new(frequency: f32, amplitude: f32, waveform: Waveform) -> Self {
        Self {
            frequency: AtomicF32::new(frequency),
            amplitude: AtomicF32::new(amplitude),
            waveform: AtomicU32::new(waveform as u32),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.load()
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude.load()
    }

    pub fn waveform(&self) -> Waveform {
        Waveform::from_index(self.waveform.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn set_frequency(&self, hz: f32) {
        self.frequency.store(hz);
    }

    fn set_amplitude(&self, gain: f32) {
        self.amplitude.store(gain);
    }

    fn set_waveform(&self, waveform: Waveform) {
        self.waveform.store(waveform as u32, Ordering::Relaxed);
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new(1.0, 0.0, Waveform::Sine)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratorConfig {
    pub sample_rate: u32,
    /// Samples produced per tick.
    pub block_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ScopeError::InvalidConfig(
                "sample rate must be positive".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(ScopeError::InvalidConfig(
                "block size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sleep between ticks so production roughly follows real time.
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / f64::from(self.sample_rate.max(1)))
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }
}

#[derive(Clone, Default)]
struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelToken {
    fn cancel(&self) {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
        self.inner.wake.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for `duration` unless cancelled first. Returns true if cancelled.
    fn sleep(&self, duration: Duration) -> bool {
        let guard = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Samples stored in the queue this tick.
    pub produced: usize,
    /// Samples the queue's overflow policy discarded this tick.
    pub dropped: u64,
    /// The queue was closed mid-tick.
    pub closed: bool,
}

/// One generation tick: a full block of samples, or nothing while paused.
///
/// Parameters are re-read for every sample, so a change lands mid-block.
pub fn generate_block(
    oscillator: &mut Oscillator,
    params: &SharedParams,
    queue: &SampleQueue,
    block_size: usize,
) -> TickReport {
    let mut report = TickReport::default();
    if params.is_paused() {
        return report;
    }
    let dropped_before = queue.dropped();
    for _ in 0..block_size {
        let sample = oscillator.next_sample(
            params.waveform(),
            f64::from(params.frequency()),
            f64::from(params.amplitude()),
        );
        match queue.push(sample) {
            PushOutcome::Closed => {
                report.closed = true;
                break;
            }
            outcome if outcome.is_stored() => report.produced += 1,
            _ => {}
        }
    }
    report.dropped = queue.dropped() - dropped_before;
    if report.dropped > 0 {
        log::debug!("queue overflow discarded {} samples", report.dropped);
    }
    report
}

fn run_worker(
    config: GeneratorConfig,
    params: Arc<SharedParams>,
    queue: Arc<SampleQueue>,
    token: CancelToken,
) {
    let mut oscillator = Oscillator::new(config.sample_rate);
    let period = config.block_period();
    let started = Instant::now();
    let mut reported_seconds = 0;

    while !token.is_cancelled() {
        let report = generate_block(&mut oscillator, &params, &queue, config.block_size);
        if report.closed {
            break;
        }
        if token.sleep(period) {
            break;
        }
        let seconds = started.elapsed().as_secs();
        if seconds != reported_seconds {
            log::debug!("generator running for {seconds} s");
            reported_seconds = seconds;
        }
    }
    log::info!("generator thread exiting");
}

struct Worker {
    handle: JoinHandle<()>,
    token: CancelToken,
}

/// Owns the generator thread and the settings it reads.
///
/// All methods take `&self` so the UI can share the generator behind an
/// `Arc`. Dropping the generator shuts the thread down and joins it.
pub struct WaveformGenerator {
    config: GeneratorConfig,
    params: Arc<SharedParams>,
    queue: Arc<SampleQueue>,
    worker: Mutex<Option<Worker>>,
}

impl WaveformGenerator {
    pub fn new(config: GeneratorConfig, queue: Arc<SampleQueue>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            params: Arc::new(SharedParams::default()),
            queue,
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> GeneratorConfig {
        self.config
    }

    pub fn queue(&self) -> &Arc<SampleQueue> {
        &self.queue
    }

    pub fn params(&self) -> &SharedParams {
        &self.params
    }

    pub fn is_running(&self) -> bool {
        self.params.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.params.is_paused()
    }

    pub fn frequency(&self) -> f32 {
        self.params.frequency()
    }

    pub fn amplitude(&self) -> f32 {
        self.params.amplitude()
    }

    pub fn waveform(&self) -> Waveform {
        self.params.waveform()
    }

    /// Spawns the generator thread. Does nothing if it is already running.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if self.params.is_running() {
            return Ok(());
        }
        if let Some(previous) = worker.take() {
            previous.token.cancel();
            if previous.handle.join().is_err() {
                log::warn!("previous generator thread had panicked");
            }
        }

        self.queue.reopen();
        self.params.set_running(true);
        let token = CancelToken::default();
        let handle = thread::Builder::new()
            .name("waveform-generator".to_string())
            .spawn({
                let config = self.config;
                let params = Arc::clone(&self.params);
                let queue = Arc::clone(&self.queue);
                let token = token.clone();
                move || {
                    run_worker(config, Arc::clone(&params), queue, token);
                    params.set_running(false);
                }
            })
            .map_err(|err| {
                self.params.set_running(false);
                ScopeError::Spawn(err.to_string())
            })?;

        log::info!(
            "generator started: {} Hz sample rate, {} samples per block",
            self.config.sample_rate,
            self.config.block_size
        );
        *worker = Some(Worker { handle, token });
        Ok(())
    }

    /// Asks the generator thread to exit without waiting for it.
    ///
    /// The thread notices at its next loop boundary. A queue with the
    /// blocking overflow policy is closed as well, releasing a producer that
    /// waits on a full queue.
    pub fn stop(&self) {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        self.request_stop(worker.as_ref());
    }

    /// Stops the generator thread and waits for it to finish.
    ///
    /// Cancelling and taking the worker happen under one lock, so a
    /// concurrent `start` either runs before and is joined here, or runs
    /// after and spawns a fresh thread.
    pub fn shutdown(&self) -> Result<()> {
        let worker = {
            let mut guard = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            self.request_stop(guard.as_ref());
            guard.take()
        };
        match worker {
            Some(worker) => worker.handle.join().map_err(|_| ScopeError::WorkerPanicked),
            None => Ok(()),
        }
    }

    /// Must be called with the worker lock held.
    fn request_stop(&self, worker: Option<&Worker>) {
        self.params.set_running(false);
        if let Some(worker) = worker {
            worker.token.cancel();
            if self.queue.policy() == Some(OverflowPolicy::Block) {
                self.queue.close();
            }
            log::info!("generator stop requested");
        }
    }

    pub fn pause(&self, paused: bool) {
        self.params.set_paused(paused);
    }

    /// Accepts frequencies strictly between 0 and the Nyquist frequency.
    pub fn set_frequency(&self, hz: f32) -> Result<()> {
        let nyquist = self.config.nyquist();
        if !hz.is_finite() || hz <= 0.0 || hz >= nyquist {
            log::warn!("rejected frequency {hz} Hz");
            return Err(ScopeError::InvalidConfig(format!(
                "frequency {hz} Hz outside (0, {nyquist})"
            )));
        }
        self.params.set_frequency(hz);
        Ok(())
    }

    /// Accepts gains in `[0, 1]`.
    pub fn set_amplitude(&self, gain: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&gain) {
            log::warn!("rejected amplitude {gain}");
            return Err(ScopeError::InvalidConfig(format!(
                "amplitude {gain} outside [0, 1]"
            )));
        }
        self.params.set_amplitude(gain);
        Ok(())
    }

    pub fn set_waveform(&self, waveform: Waveform) {
        self.params.set_waveform(waveform);
    }
}

impl Drop for WaveformGenerator {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::warn!("generator shutdown failed: {err}");
        }
    }
}
