use thiserror::Error;

#[derive(Error, Debug)]
pub enum TracekitError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("recursion depth exceeded the limit: {limit}")]
    DepthLimitExceeded { limit: usize },

    #[error("no aggregation mapped for instrument: {0}")]
    UnknownAggregationType(String),

    #[error("pool misuse: {0}")]
    PoolMisuse(String),

    #[error("invalid span data: {0}")]
    InvalidSpan(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("export sink error: {0}")]
    Sink(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

/// Result type alias for tracekit operations
pub type Result<T> = std::result::Result<T, TracekitError>;

impl TracekitError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new pool misuse error
    pub fn pool_misuse<S: Into<String>>(msg: S) -> Self {
        Self::PoolMisuse(msg.into())
    }

    /// Creates a new invalid span error
    pub fn invalid_span<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSpan(msg.into())
    }

    /// Creates a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Returns true if this error is a caller contract violation rather
    /// than bad input data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::PoolMisuse(_) | Self::DepthLimitExceeded { .. })
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) | Self::ConfigParse(_) => "config",
            Self::DepthLimitExceeded { .. } | Self::Encode(_) => "encode",
            Self::UnknownAggregationType(_) => "aggregation",
            Self::PoolMisuse(_) => "pool",
            Self::InvalidSpan(_) => "validation",
            Self::Sink(_) => "sink",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = TracekitError::config("bad bounds");
        assert_eq!(err.to_string(), "invalid configuration: bad bounds");
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_depth_limit_display() {
        let err = TracekitError::DepthLimitExceeded { limit: 64 };
        assert_eq!(err.to_string(), "recursion depth exceeded the limit: 64");
        assert_eq!(err.category(), "encode");
    }

    #[test]
    fn test_contract_violations() {
        assert!(TracekitError::pool_misuse("double release").is_contract_violation());
        assert!(!TracekitError::config("x").is_contract_violation());
    }
}
