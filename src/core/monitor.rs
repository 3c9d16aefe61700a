//! Session lifecycle and orchestration.
//!
//! [`ResourceMonitor`] is the only caller-facing component: it gates the
//! Idle/Running state machine, owns the sampler and the energy estimator
//! for the duration of a session, and produces the final report on stop.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::core::config::MonitorConfig;
use crate::core::energy::{EnergyEstimator, EstimatorConfig, PowercapEstimator};
use crate::core::metrics::{MetricSource, NetworkCounters, SharedSource, SystemSource};
use crate::core::report::MonitorReport;
use crate::core::sampler::{Sampler, STOP_GRACE};
use crate::error::{MonitorError, Result};

/// Lifecycle state of a [`ResourceMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

struct ActiveSession {
    sampler: Sampler,
    started_at: Instant,
}

/// Resource monitor for tracking consumption during code execution.
///
/// Usage:
/// ```no_run
/// use resmon::{MonitorConfig, ResourceMonitor};
///
/// let mut monitor = ResourceMonitor::new();
/// monitor.start(MonitorConfig::default())?;
/// // ... run your code ...
/// monitor.stop()?;
/// # Ok::<(), resmon::MonitorError>(())
/// ```
pub struct ResourceMonitor {
    source: SharedSource,
    estimator: Box<dyn EnergyEstimator>,
    active: Option<ActiveSession>,
}

impl ResourceMonitor {
    /// Monitor backed by `sysinfo` metrics and the powercap energy
    /// estimator.
    pub fn new() -> Self {
        Self::with_parts(
            Box::new(SystemSource::new()),
            Box::new(PowercapEstimator::new()),
        )
    }

    /// Monitor with a custom metric source and energy estimator.
    pub fn with_parts(
        source: Box<dyn MetricSource>,
        estimator: Box<dyn EnergyEstimator>,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            estimator,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Start monitoring.
    ///
    /// Captures the network baseline, starts the energy estimator and
    /// spawns the sampler. If any sub-start fails the session reverts to
    /// Idle; there is no partial Running state.
    pub fn start(&mut self, config: MonitorConfig) -> Result<()> {
        if self.active.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        let started_at = Instant::now();
        let baseline: NetworkCounters = self.source.lock().network_counters()?;

        let estimator_config = EstimatorConfig {
            persist_to_storage: config.export_csv,
            polling_cadence: config.output_interval,
            verbose: config.show_detailed_logs,
        };
        self.estimator.start(&estimator_config)?;

        let sampler = match Sampler::spawn(
            Arc::clone(&self.source),
            config.sampling_interval,
            baseline,
            started_at,
        ) {
            Ok(sampler) => sampler,
            Err(e) => {
                // Roll the estimator back so the failed start leaves
                // nothing behind.
                self.estimator.stop();
                let _ = self.estimator.final_report();
                return Err(e);
            }
        };

        log::debug!(
            "monitoring started (sampling every {:.3}s)",
            config.sampling_interval.as_secs_f64()
        );

        self.active = Some(ActiveSession {
            sampler,
            started_at,
        });
        Ok(())
    }

    /// Stop monitoring, print the report to stdout and return it.
    ///
    /// The sampler's running flag is cleared before the bounded join so
    /// the loop is guaranteed to observe it; the energy estimator is then
    /// stopped, with missing data degrading to zero values. All series
    /// state is cleared before returning to Idle.
    pub fn stop(&mut self) -> Result<MonitorReport> {
        let session = self.active.take().ok_or(MonitorError::NotRunning)?;

        let series = session.sampler.stop(STOP_GRACE);

        self.estimator.stop();
        let energy = self.estimator.final_report().unwrap_or_default();

        let duration = session.started_at.elapsed();
        let report = MonitorReport::new(&series, energy, duration);
        println!("{report}");

        log::debug!("monitoring stopped after {:.3}s", duration.as_secs_f64());
        Ok(report)
    }

    /// Start monitoring and return a guard that stops on drop.
    ///
    /// The guard stops the session exactly once on every exit path,
    /// including unwinding, so callers never need to pair calls manually.
    pub fn scoped(&mut self, config: MonitorConfig) -> Result<MonitorGuard<'_>> {
        self.start(config)?;
        Ok(MonitorGuard {
            monitor: Some(self),
        })
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped acquisition bracket over a running [`ResourceMonitor`].
pub struct MonitorGuard<'a> {
    monitor: Option<&'a mut ResourceMonitor>,
}

impl MonitorGuard<'_> {
    /// Stop explicitly and take the report instead of waiting for drop.
    pub fn stop(mut self) -> Result<MonitorReport> {
        match self.monitor.take() {
            Some(monitor) => monitor.stop(),
            None => Err(MonitorError::NotRunning),
        }
    }
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            if monitor.is_running() {
                if let Err(e) = monitor.stop() {
                    log::warn!("failed to stop monitor on scope exit: {e}");
                }
            }
        }
    }
}
