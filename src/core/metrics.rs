//! Point-in-time OS metric sources.
//!
//! The sampler pulls readings through the [`MetricSource`] trait; the
//! default implementation is backed by `sysinfo`.

use std::sync::Arc;

use parking_lot::Mutex;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Networks, RefreshKind, System};

use crate::error::{MonitorError, Result};

/// Cumulative network byte counters, summed over all interfaces.
///
/// Captured once at session start as the baseline for delta computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Abstraction over point-in-time OS metrics.
///
/// Implementations are expected to be fast relative to the sampling
/// interval. A failed read is skipped for the current tick, so methods
/// may fail transiently without consequence.
pub trait MetricSource: Send {
    /// Global CPU utilization in percent
    fn cpu_percent(&mut self) -> Result<f64>;

    /// Used physical memory in percent of total
    fn memory_percent(&mut self) -> Result<f64>;

    /// Cumulative bytes sent/received since boot
    fn network_counters(&mut self) -> Result<NetworkCounters>;
}

/// Metric source handle shared between the session and the sampler thread.
pub type SharedSource = Arc<Mutex<Box<dyn MetricSource>>>;

/// [`MetricSource`] backed by `sysinfo`.
pub struct SystemSource {
    system: System,
    networks: Networks,
}

impl SystemSource {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());

        let mut system = System::new_with_specifics(refresh_kind);
        let networks = Networks::new_with_refreshed_list();

        // CPU usage is a delta between two refreshes; prime the counters so
        // the first sampled tick carries a real value.
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();

        Self { system, networks }
    }
}

impl MetricSource for SystemSource {
    fn cpu_percent(&mut self) -> Result<f64> {
        self.system.refresh_cpu_usage();
        Ok(self.system.global_cpu_usage() as f64)
    }

    fn memory_percent(&mut self) -> Result<f64> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(MonitorError::metric("total memory reported as zero"));
        }

        let used = self.system.used_memory();
        Ok((used as f64 / total as f64) * 100.0)
    }

    fn network_counters(&mut self) -> Result<NetworkCounters> {
        self.networks.refresh(true);

        let mut counters = NetworkCounters::default();
        for data in self.networks.values() {
            counters.bytes_sent += data.total_transmitted();
            counters.bytes_recv += data.total_received();
        }

        Ok(counters)
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}
