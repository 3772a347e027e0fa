use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read temperature source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("temperature source returned non-numeric value {raw:?}")]
    Parse { raw: String },
    #[error("temperature source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("output write failed: {0}")]
    Write(String),
    /// The output handle is gone; no later write can succeed.
    #[error("output lost: {0}")]
    Lost(String),
}

impl HardwareError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Lost(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    #[error("display init failed: {0}")]
    Init(String),
    #[error("display flush failed: {0}")]
    Flush(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publish to {topic} rejected: {reason}")]
    Rejected { topic: String, reason: String },
    #[error("messaging disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?} as {expected}")]
    Parse {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("config file {path}: {reason}")]
    File { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not force fan output off: {0}")]
    Output(#[source] HardwareError),
    #[error("could not initialize display: {0}")]
    Display(#[source] DisplayError),
    #[error("synchronizer already started")]
    AlreadyStarted,
}
