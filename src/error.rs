use std::io;
use thiserror::Error;

/// Custom error type for the resmon crate
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("monitor is already running")]
    AlreadyRunning,

    #[error("monitor was not started")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("metric read failed: {0}")]
    Metric(String),

    #[error("energy estimator error: {0}")]
    Energy(String),
}

/// Result type alias for the resmon crate
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// Create a metric read error
    pub fn metric<S: Into<String>>(msg: S) -> Self {
        MonitorError::Metric(msg.into())
    }

    /// Create an energy estimator error
    pub fn energy<S: Into<String>>(msg: S) -> Self {
        MonitorError::Energy(msg.into())
    }
}
