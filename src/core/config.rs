use std::time::Duration;

/// Configuration for a monitoring session.
///
/// `output_interval`, `show_detailed_logs` and `export_csv` are passed
/// through to the energy estimator; `sampling_interval` drives the
/// CPU/memory/network sampler.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sampling interval for CPU/memory/network series
    pub sampling_interval: Duration,
    /// Polling cadence for the energy estimator
    pub output_interval: Duration,
    /// Show the energy estimator's own diagnostic output
    pub show_detailed_logs: bool,
    /// Persist energy readings as CSV
    pub export_csv: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_secs(1),
            output_interval: Duration::from_secs(60),
            show_detailed_logs: false,
            export_csv: false,
        }
    }
}

impl MonitorConfig {
    /// Config with a custom sampling interval, other fields at defaults
    pub fn with_sampling_interval(interval: Duration) -> Self {
        Self {
            sampling_interval: interval,
            ..Default::default()
        }
    }
}
