//! Error handling for the weather_pi telemetry crate.

/// A specialized `Result` type for weather_pi operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// The main error type for sampling, caching and ingestion.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A hardware poll failed
    #[error("Sensor poll failed: {0}")]
    Sensor(String),

    /// A host metric could not be read
    #[error("Metric unavailable: {0}")]
    Metric(String),

    /// The sink rejected or could not accept a batch
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Startup could not complete
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// A shutdown step failed
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TelemetryError {
    /// Create a new sensor poll error
    pub fn sensor_error(msg: impl Into<String>) -> Self {
        Self::Sensor(msg.into())
    }

    /// Create a new metric error
    pub fn metric_error(msg: impl Into<String>) -> Self {
        Self::Metric(msg.into())
    }

    /// Create a new ingestion error
    pub fn ingestion_error(msg: impl Into<String>) -> Self {
        Self::Ingestion(msg.into())
    }

    /// Create a new initialization error
    pub fn initialization_error(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create a new shutdown error
    pub fn shutdown_error(msg: impl Into<String>) -> Self {
        Self::Shutdown(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error must abort the process rather than be logged and
    /// contained.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Initialization(_) | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(TelemetryError::initialization_error("no channel").is_fatal());
        assert!(TelemetryError::config_error("batch size").is_fatal());
        assert!(!TelemetryError::ingestion_error("rejected").is_fatal());
        assert!(!TelemetryError::sensor_error("i2c timeout").is_fatal());
        assert!(!TelemetryError::metric_error("thermal zone").is_fatal());
        assert!(!TelemetryError::shutdown_error("close").is_fatal());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TelemetryError = io.into();
        assert!(matches!(err, TelemetryError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
