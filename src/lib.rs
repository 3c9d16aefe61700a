// Resmon Library - Public API

// Re-export error types
pub mod error;
pub use error::{MonitorError, Result};

// Module declarations
pub mod core;

// Re-export commonly used types
pub use core::config::MonitorConfig;
pub use core::energy::{
    EnergyEstimator, EnergyReport, EstimatorConfig, NullEstimator, PowercapEstimator,
};
pub use core::metrics::{MetricSource, NetworkCounters, SharedSource, SystemSource};
pub use core::monitor::{MonitorGuard, ResourceMonitor, SessionState};
pub use core::report::MonitorReport;
pub use core::sampler::{Sample, Sampler, Series, SeriesSet};

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
