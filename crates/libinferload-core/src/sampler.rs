//! Background host resource sampling
//!
//! A [`ResourceSampler`] polls a [`ResourceSource`] on its own thread while the
//! caller blocks on something else. Samples stay owned by the polling thread
//! until [`ResourceSampler::join`] hands them back, so a result can never be
//! read while the loop may still append to it.
//!
//! Readings are host-wide. Samplers running side by side all observe the same
//! machine, not the cost of their own caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::error::{BenchError, Result};

/// One host utilization reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Something that can be polled for host utilization
pub trait ResourceSource: Send + 'static {
    /// Take a baseline reading. Its value is discarded.
    fn prime(&mut self) -> Result<()>;

    fn sample(&mut self) -> Result<ResourceSample>;
}

impl ResourceSource for Box<dyn ResourceSource> {
    fn prime(&mut self) -> Result<()> {
        (**self).prime()
    }

    fn sample(&mut self) -> Result<ResourceSample> {
        (**self).sample()
    }
}

/// Host-wide CPU and memory utilization via `sysinfo`
pub struct SystemSource {
    system: System,
}

impl SystemSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSource for SystemSource {
    fn prime(&mut self) -> Result<()> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(BenchError::SamplerUnavailable(
                "platform not supported by sysinfo".to_string(),
            ));
        }
        // CPU usage is a delta between two refreshes
        self.system.refresh_cpu_usage();
        Ok(())
    }

    fn sample(&mut self) -> Result<ResourceSample> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(BenchError::SamplerUnavailable(
                "total memory reported as zero".to_string(),
            ));
        }
        let used = total.saturating_sub(self.system.available_memory());

        Ok(ResourceSample {
            cpu_percent: f64::from(self.system.global_cpu_usage()),
            memory_percent: used as f64 / total as f64 * 100.0,
        })
    }
}

/// Sampler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Running,
    Stopped,
}

/// What the polling thread hands back when it exits
struct LoopOutput<S> {
    source: S,
    samples: Vec<ResourceSample>,
    error: Option<BenchError>,
}

/// Polls a [`ResourceSource`] at a fixed interval on a dedicated thread
pub struct ResourceSampler<S: ResourceSource> {
    interval: Duration,
    source: Option<S>,
    state: SamplerState,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<LoopOutput<S>>>,
    samples: Vec<ResourceSample>,
}

impl ResourceSampler<SystemSource> {
    /// Sampler over host-wide metrics
    pub fn system(interval: Duration) -> Self {
        Self::new(SystemSource::new(), interval)
    }
}

impl<S: ResourceSource> ResourceSampler<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            interval,
            source: Some(source),
            state: SamplerState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            samples: Vec::new(),
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// Start the polling thread. Allowed from `Idle` and `Stopped`.
    pub fn start(&mut self) -> Result<()> {
        if self.state == SamplerState::Running {
            return Err(BenchError::SamplerAlreadyRunning);
        }
        // Collect any previous loop before reusing the source
        if self.handle.is_some() {
            self.join()?;
        }

        let source = self.source.take().ok_or_else(|| {
            BenchError::SamplerUnavailable("source lost in a panicked sampler".to_string())
        })?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("resource-sampler".to_string())
            .spawn(move || sample_loop(source, interval, running))?;

        self.handle = Some(handle);
        self.state = SamplerState::Running;
        Ok(())
    }

    /// Signal the polling thread to exit. No-op unless running.
    pub fn stop(&mut self) {
        if self.state != SamplerState::Running {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(ref handle) = self.handle {
            handle.thread().unpark();
        }
        self.state = SamplerState::Stopped;
    }

    /// Block until the polling thread has exited, then take its samples.
    ///
    /// Stops the sampler first if it is still running. If the source failed
    /// mid-run, the samples gathered before the failure are kept and the
    /// failure is returned.
    pub fn join(&mut self) -> Result<()> {
        self.stop();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        match handle.join() {
            Ok(output) => {
                self.source = Some(output.source);
                self.samples.extend(output.samples);
                match output.error {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
            Err(_) => Err(BenchError::SamplerPanicked),
        }
    }

    /// Mean (cpu %, memory %) over samples since the last `clear`, or
    /// (0, 0) when there are none
    pub fn get_average(&self) -> (f64, f64) {
        if self.samples.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.samples.len() as f64;
        let (cpu, memory) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(c, m), s| (c + s.cpu_percent, m + s.memory_percent));
        (cpu / n, memory / n)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl<S: ResourceSource> Drop for ResourceSampler<S> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.join();
        }
    }
}

fn sample_loop<S: ResourceSource>(
    mut source: S,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> LoopOutput<S> {
    let mut samples = Vec::new();

    if let Err(err) = source.prime() {
        return LoopOutput {
            source,
            samples,
            error: Some(err),
        };
    }

    loop {
        // Wait out one interval; park may wake early on stop or spuriously
        let deadline = Instant::now() + interval;
        loop {
            if !running.load(Ordering::SeqCst) {
                return LoopOutput {
                    source,
                    samples,
                    error: None,
                };
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }

        match source.sample() {
            Ok(sample) => samples.push(sample),
            Err(err) => {
                return LoopOutput {
                    source,
                    samples,
                    error: Some(err),
                }
            }
        }
    }
}
