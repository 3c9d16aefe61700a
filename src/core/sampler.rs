//! Background sampling loop.
//!
//! One sampler thread runs per active session. Every tick it pulls
//! CPU/memory/network readings from the metric source, computes
//! baseline-relative network deltas and appends one sample per series,
//! all four sharing the same elapsed-time key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::metrics::{NetworkCounters, SharedSource};
use crate::error::Result;

/// Bounded wait for the sampler thread to observe the stop signal.
pub const STOP_GRACE: Duration = Duration::from_secs(1);

/// One measurement point: seconds since session start and the value read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub elapsed_secs: f64,
    pub value: f64,
}

/// Ordered sequence of samples for one metric.
///
/// Samples are appended in time order by the single sampler thread and
/// never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn push(&mut self, elapsed_secs: f64, value: f64) {
        self.samples.push(Sample {
            elapsed_secs,
            value,
        });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Mean of all recorded values, `None` for an empty series
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| s.value).sum();
        Some(sum / self.samples.len() as f64)
    }

    /// Largest recorded value, `None` for an empty series
    pub fn max(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.value).fold(None, |acc, v| {
            Some(match acc {
                Some(m) if m >= v => m,
                _ => v,
            })
        })
    }

    /// Value of the most recent sample, `None` for an empty series
    pub fn last_value(&self) -> Option<f64> {
        self.samples.last().map(|s| s.value)
    }
}

/// The four series collected during a session.
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    pub cpu: Series,
    pub memory: Series,
    pub net_sent: Series,
    pub net_recv: Series,
}

/// Handle to the background sampling thread.
///
/// The loop owns a stop token checked every tick and signals completion
/// through a channel, which gives [`Sampler::stop`] its bounded join.
pub struct Sampler {
    running: Arc<AtomicBool>,
    series: Arc<Mutex<SeriesSet>>,
    done_rx: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Sampler {
    /// Spawn the sampling loop.
    ///
    /// `origin` is the session start instant; every sample's elapsed time
    /// is measured against it. `baseline` holds the network counters
    /// captured at session start. The first sample lands one interval
    /// after spawn, so a session shorter than one interval collects
    /// nothing.
    pub fn spawn(
        source: SharedSource,
        interval: Duration,
        baseline: NetworkCounters,
        origin: Instant,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let series = Arc::new(Mutex::new(SeriesSet::default()));
        let (done_tx, done_rx) = mpsc::channel();

        let flag = Arc::clone(&running);
        let buffer = Arc::clone(&series);

        let handle = thread::Builder::new()
            .name("resmon-sampler".into())
            .spawn(move || {
                sample_loop(source, buffer, flag, interval, baseline, origin);
                // Receiver gone means stop() already timed out; nothing to do.
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            running,
            series,
            done_rx,
            handle: Some(handle),
        })
    }

    /// Signal the loop to exit and wait up to `grace` for it to comply,
    /// then hand back everything collected.
    ///
    /// If the grace period elapses (the loop is mid-sleep on a long
    /// interval) the thread is abandoned; it observes the cleared flag on
    /// its next wake and exits on its own. The collected series are read
    /// through the shared buffer either way.
    pub fn stop(mut self, grace: Duration) -> SeriesSet {
        self.running.store(false, Ordering::Relaxed);

        match self.done_rx.recv_timeout(grace) {
            Ok(()) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
            }
            Err(_) => {
                log::warn!(
                    "sampler did not stop within {:.1}s, abandoning thread",
                    grace.as_secs_f64()
                );
                self.handle.take();
            }
        }

        std::mem::take(&mut *self.series.lock())
    }
}

fn sample_loop(
    source: SharedSource,
    series: Arc<Mutex<SeriesSet>>,
    running: Arc<AtomicBool>,
    interval: Duration,
    baseline: NetworkCounters,
    origin: Instant,
) {
    loop {
        thread::sleep(interval);
        if !running.load(Ordering::Relaxed) {
            break;
        }

        let elapsed = origin.elapsed().as_secs_f64();

        let (cpu, memory, network) = {
            let mut source = source.lock();
            (
                source.cpu_percent(),
                source.memory_percent(),
                source.network_counters(),
            )
        };

        let mut series = series.lock();

        match cpu {
            Ok(value) => series.cpu.push(elapsed, value),
            Err(e) => log::debug!("cpu read failed, skipping tick: {e}"),
        }

        match memory {
            Ok(value) => series.memory.push(elapsed, value),
            Err(e) => log::debug!("memory read failed, skipping tick: {e}"),
        }

        match network {
            Ok(counters) => {
                let sent = counters.bytes_sent.saturating_sub(baseline.bytes_sent);
                let recv = counters.bytes_recv.saturating_sub(baseline.bytes_recv);
                series.net_sent.push(elapsed, sent as f64);
                series.net_recv.push(elapsed, recv as f64);
            }
            Err(e) => log::debug!("network read failed, skipping tick: {e}"),
        }
    }
}
