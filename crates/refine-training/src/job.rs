use crate::error::{TrainingError, TrainingResult};
use crate::poller::DEFAULT_POLL_INTERVAL;
use crate::query::FetchParams;
use crate::split::{validate_fraction, DEFAULT_SEED};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_MODEL: &str = "gpt-4o-mini-2024-07-18";
pub const DEFAULT_VAL_FRACTION: f64 = 0.2;

/// Everything a fine-tuning run is parameterized by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSpec {
    pub config_path: PathBuf,
    pub function_name: String,
    pub metric_name: String,
    pub variant_name: String,
    /// Only used for float metrics.
    pub float_threshold: f64,
    pub val_fraction: f64,
    pub max_samples: u64,
    pub base_model: String,
    pub seed: u64,
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
}

impl RecipeSpec {
    #[must_use]
    pub fn new(
        config_path: impl Into<PathBuf>,
        function_name: impl Into<String>,
        metric_name: impl Into<String>,
        variant_name: impl Into<String>,
    ) -> Self {
        let fetch = FetchParams::default();
        Self {
            config_path: config_path.into(),
            function_name: function_name.into(),
            metric_name: metric_name.into(),
            variant_name: variant_name.into(),
            float_threshold: fetch.float_threshold,
            val_fraction: DEFAULT_VAL_FRACTION,
            max_samples: fetch.max_samples,
            base_model: DEFAULT_BASE_MODEL.to_string(),
            seed: DEFAULT_SEED,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub const fn fetch_params(&self) -> FetchParams {
        FetchParams { float_threshold: self.float_threshold, max_samples: self.max_samples }
    }

    pub fn validate(&self) -> TrainingResult<()> {
        for (field, value) in [
            ("function", &self.function_name),
            ("metric", &self.metric_name),
            ("variant", &self.variant_name),
            ("base_model", &self.base_model),
        ] {
            if value.trim().is_empty() {
                return Err(TrainingError::InvalidConfig(format!("{field} is required")));
            }
        }
        if !self.float_threshold.is_finite() {
            return Err(TrainingError::InvalidConfig("float_threshold must be finite".to_string()));
        }
        if self.max_samples == 0 {
            return Err(TrainingError::InvalidConfig("max_samples must be >= 1".to_string()));
        }
        validate_fraction(self.val_fraction)?;
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RecipeSpec {
        RecipeSpec::new("tensorzero.toml", "extract_entities", "exact_match", "gpt_4o_mini")
    }

    #[test]
    fn test_defaults() {
        let spec = spec();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.base_model, "gpt-4o-mini-2024-07-18");
        assert_eq!(spec.max_samples, 100_000);
        assert_eq!(spec.seed, 42);
        assert_eq!(spec.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut s = spec();
        s.val_fraction = 1.0;
        assert!(s.validate().is_err());

        let mut s = spec();
        s.max_samples = 0;
        assert!(s.validate().is_err());

        let mut s = spec();
        s.float_threshold = f64::INFINITY;
        assert!(s.validate().is_err());

        let mut s = spec();
        s.base_model = "  ".to_string();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("base_model"));
    }

    #[test]
    fn test_spec_serializes_interval_as_seconds() {
        let json = serde_json::to_value(spec()).unwrap();
        assert_eq!(json["poll_interval"], 10);
        let back: RecipeSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec());
    }
}
