use thiserror::Error;

#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("Invalid sample: value '{value}' is not a finite number")]
    InvalidSample { value: f64 },

    #[error("Invalid sample: timestamp '{timestamp}' can't be mapped to a time bucket")]
    InvalidTimestamp { timestamp: f64 },

    #[error("Context key collision: {key:016x} already belongs to another context")]
    ContextCollision { key: u64 },

    #[error("Unknown sample metric type: {0}")]
    UnknownMetricType(String),

    #[error("Flush error: {0}")]
    Flush(String),

    #[error("Invalid tags: {0}")]
    InvalidTags(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Channel closed: the receiving side has been dropped")]
    ChannelClosed,
}

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Creates a new flush error
    pub fn flush<S: Into<String>>(msg: S) -> Self {
        Self::Flush(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new invalid tags error
    pub fn invalid_tags<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTags(msg.into())
    }

    /// Returns true if processing can simply continue with the next sample or context
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidSample { .. }
                | Self::InvalidTimestamp { .. }
                | Self::ContextCollision { .. }
                | Self::UnknownMetricType(_)
                | Self::Flush(_)
                | Self::InvalidTags(_)
        )
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidSample { .. } => "invalid_sample",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
            Self::ContextCollision { .. } => "context_collision",
            Self::UnknownMetricType(_) => "unknown_type",
            Self::Flush(_) => "flush",
            Self::InvalidTags(_) => "invalid_tags",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Yaml(_) => "serialization",
            Self::ChannelClosed => "channel",
        }
    }
}
