//! Query configuration.
//!
//! `QueryConfig` is a serializable, builder-style configuration struct
//! following the same `#[serde(default = "...")]` idiom used throughout
//! this crate's teacher lineage: small, flat, with const-fn defaults that
//! both `Default` and serde fall back to.

use serde::{Deserialize, Serialize};

use crate::error::{GeoQueryError, Result};

/// Retry policy for store errors marked retryable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial try (0-10).
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff with full jitter.
    #[serde(default = "RetryConfig::default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl RetryConfig {
    const fn default_max_attempts() -> u32 {
        4
    }

    const fn default_base_delay_ms() -> u64 {
        50
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts > 10 {
            return Err(GeoQueryError::invalid_input(
                "retry.max_attempts must be between 0 and 10",
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            base_delay_ms: Self::default_base_delay_ms(),
        }
    }
}

/// Top-level query configuration: covering limits, concurrency, retry
/// policy, and the earth radius used by every distance calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum number of cells a covering may enumerate before either
    /// truncating (if allowed) or returning `TooManyCells`.
    #[serde(default = "QueryConfig::default_max_cells")]
    pub max_cells: usize,

    /// Maximum number of per-cell store lookups in flight at once.
    #[serde(default = "QueryConfig::default_concurrency")]
    pub concurrency: usize,

    /// Retry/backoff policy applied to retryable store errors.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Earth radius in kilometers used for Haversine distance and radius
    /// containment checks. Deliberately not the `geo` crate's own
    /// built-in constant; this value is an explicit configuration knob.
    #[serde(default = "QueryConfig::default_earth_radius_km")]
    pub earth_radius_km: f64,

    /// Whether a covering that exceeds `max_cells` truncates (keeping the
    /// nearest cells and reporting truncation) instead of erroring.
    #[serde(default)]
    pub allow_truncation: bool,
}

impl QueryConfig {
    const fn default_max_cells() -> usize {
        500
    }

    const fn default_concurrency() -> usize {
        32
    }

    const fn default_earth_radius_km() -> f64 {
        6371.0088
    }

    /// Override `max_cells`.
    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    /// Override `concurrency`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Allow coverings to truncate rather than error when they exceed
    /// `max_cells`.
    pub fn with_truncation_allowed(mut self, allow: bool) -> Self {
        self.allow_truncation = allow;
        self
    }

    /// Validate configuration values, mirroring the input-shape checks
    /// this crate performs everywhere before doing any I/O.
    pub fn validate(&self) -> Result<()> {
        if self.max_cells == 0 {
            return Err(GeoQueryError::invalid_input("max_cells must be positive"));
        }
        if self.concurrency == 0 {
            return Err(GeoQueryError::invalid_input(
                "concurrency must be positive",
            ));
        }
        if !self.earth_radius_km.is_finite() || self.earth_radius_km <= 0.0 {
            return Err(GeoQueryError::invalid_input(
                "earth_radius_km must be finite and positive",
            ));
        }
        self.retry.validate()
    }

    /// Load configuration from a JSON string, validating the result.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: QueryConfig = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|e| serde::de::Error::custom(e.to_string()))?;
        Ok(config)
    }

    /// Serialize configuration as a JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from a TOML string (requires the `toml-config`
    /// feature).
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        use serde::de::Error as _;
        let config: QueryConfig = toml::from_str(toml_str)?;
        config
            .validate()
            .map_err(|e| toml::de::Error::custom(e.to_string()))?;
        Ok(config)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_cells: Self::default_max_cells(),
            concurrency: Self::default_concurrency(),
            retry: RetryConfig::default(),
            earth_radius_km: Self::default_earth_radius_km(),
            allow_truncation: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = QueryConfig::default();
        assert_eq!(config.max_cells, 500);
        assert_eq!(config.concurrency, 32);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.base_delay_ms, 50);
        assert_eq!(config.earth_radius_km, 6371.0088);
        assert!(!config.allow_truncation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_max_cells() {
        let config = QueryConfig::default().with_max_cells(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_excessive_retry_attempts() {
        let config = QueryConfig::default().with_retry(RetryConfig {
            max_attempts: 11,
            base_delay_ms: 50,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let config = QueryConfig::default()
            .with_max_cells(250)
            .with_concurrency(8)
            .with_truncation_allowed(true);
        let json = config.to_json().unwrap();
        let decoded = QueryConfig::from_json(&json).unwrap();
        assert_eq!(decoded, config);
    }
}
