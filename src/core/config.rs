//! Configuration for the telemetry core.
//!
//! YAML-backed with full defaults, so an empty document is a valid
//! configuration. Validation happens once, up front; nothing on the hot
//! path re-checks configuration.

use crate::core::error::Result;
use crate::core::error::TracekitError;
use crate::metrics::instrument::Temporality;
use crate::metrics::metric::DEFAULT_HISTOGRAM_BOUNDS;
use crate::metrics::store::validate_bounds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for the telemetry core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metrics pipeline configuration
    pub metrics: MetricsConfig,
    /// Span export configuration
    pub export: ExportConfig,
}

/// Metrics pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Default temporality for new metrics
    pub temporality: Temporality,
    /// Bucket boundaries applied to histograms without their own
    pub default_histogram_bounds: Vec<f64>,
    /// Optional cap on distinct points per metric
    pub cardinality_limit: Option<usize>,
    /// How often the caller should drive collection
    #[serde(with = "humantime_serde")]
    pub collect_interval: Duration,
}

/// Span export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Maximum nesting depth the encoder accepts before failing fast
    pub max_recursion_depth: usize,
    /// Buffers retained per record pool
    pub pool_retain: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics: MetricsConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            temporality: Temporality::Cumulative,
            default_histogram_bounds: DEFAULT_HISTOGRAM_BOUNDS.to_vec(),
            cardinality_limit: None,
            collect_interval: Duration::from_secs(60),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: crate::export::protocol::DEFAULT_RECURSION_LIMIT,
            pool_retain: 32,
        }
    }
}

impl Config {
    /// Parses a configuration from YAML and validates it.
    pub fn from_yaml(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_bounds(&self.metrics.default_histogram_bounds)?;
        if self.export.max_recursion_depth == 0 {
            return Err(TracekitError::config(
                "max_recursion_depth must be at least 1",
            ));
        }
        if self.metrics.collect_interval.is_zero() {
            return Err(TracekitError::config("collect_interval must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.metrics.temporality, Temporality::Cumulative);
        assert_eq!(config.export.max_recursion_depth, 64);
    }

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(
            config.metrics.default_histogram_bounds,
            DEFAULT_HISTOGRAM_BOUNDS.to_vec()
        );
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
metrics:
  temporality: delta
  default_histogram_bounds: [1.0, 2.0, 4.0]
  cardinality_limit: 2000
  collect_interval: 10s
export:
  max_recursion_depth: 16
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.metrics.temporality, Temporality::Delta);
        assert_eq!(config.metrics.default_histogram_bounds, vec![1.0, 2.0, 4.0]);
        assert_eq!(config.metrics.cardinality_limit, Some(2000));
        assert_eq!(config.metrics.collect_interval, Duration::from_secs(10));
        assert_eq!(config.export.max_recursion_depth, 16);
    }

    #[test]
    fn test_bad_bounds_rejected() {
        let yaml = "metrics:\n  default_histogram_bounds: [5.0, 1.0]\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let yaml = "export:\n  max_recursion_depth: 0\n";
        assert!(Config::from_yaml(yaml).is_err());
    }
}
