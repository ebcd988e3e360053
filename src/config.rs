use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::processors::{ImputeStrategy, TotalFailurePolicy};
use crate::sources::{ClimateEndpoint, Strictness};
use crate::utils::constants::{
    COL_PRECIP_SUM, COL_T_MEAN, DEFAULT_CLIMATE_BASE_URL, DEFAULT_LAGS, DEFAULT_LOCALITY_LEVEL,
    DEFAULT_OUTLIER_THRESHOLD, DEFAULT_POPULATION_BASE_URL, DEFAULT_POPULATION_VARIABLE,
    DEFAULT_ROLLING_WINDOW, DEFAULT_TIMEOUT_SECS,
};

/// Environment variables override file values, e.g.
/// `WEEKLY_CLIMATE__HTTP__TIMEOUT_SECS=30`.
pub const ENV_PREFIX: &str = "WEEKLY_CLIMATE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    #[validate(nested)]
    pub climate: ClimateSourceConfig,

    #[validate(nested)]
    pub population: PopulationSourceConfig,

    #[validate(nested)]
    pub http: HttpConfig,

    #[validate(nested)]
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStyle {
    Query,
    Path,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClimateSourceConfig {
    #[validate(url)]
    pub base_url: String,

    pub endpoint: EndpointStyle,

    /// JSON pointer to the row array, used by the path-style endpoint.
    pub records_pointer: String,

    pub strictness: Strictness,
}

impl ClimateSourceConfig {
    pub fn endpoint(&self) -> ClimateEndpoint {
        match self.endpoint {
            EndpointStyle::Query => ClimateEndpoint::Query,
            EndpointStyle::Path => ClimateEndpoint::Path {
                records_pointer: self.records_pointer.clone(),
            },
        }
    }
}

impl Default for ClimateSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CLIMATE_BASE_URL.to_string(),
            endpoint: EndpointStyle::Query,
            records_pointer: "/dados".to_string(),
            strictness: Strictness::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PopulationSourceConfig {
    #[validate(url)]
    pub base_url: String,

    pub variable: u32,

    #[validate(length(min = 1))]
    pub locality_level: String,

    /// Flat CSV table; when set, density comes from here instead of one
    /// request per municipality.
    #[validate(url)]
    pub bulk_url: Option<String>,
}

impl Default for PopulationSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_POPULATION_BASE_URL.to_string(),
            variable: DEFAULT_POPULATION_VARIABLE,
            locality_level: DEFAULT_LOCALITY_LEVEL.to_string(),
            bulk_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HttpConfig {
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,

    #[validate(range(min = 1))]
    pub max_workers: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_workers: num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProcessingConfig {
    pub impute_strategy: ImputeStrategy,

    /// Columns screened by the z-score filter; empty disables it.
    pub outlier_columns: Vec<String>,

    pub outlier_threshold: f64,

    #[validate(length(min = 1))]
    pub feature_columns: Vec<String>,

    #[validate(length(min = 1))]
    pub lags: Vec<usize>,

    #[validate(range(min = 1))]
    pub rolling_window: usize,

    pub total_failure: TotalFailurePolicy,

    /// Station → municipality, used to attach `pop_density` to station rows.
    pub station_municipalities: BTreeMap<String, String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            impute_strategy: ImputeStrategy::Interpolate,
            outlier_columns: Vec::new(),
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            feature_columns: vec![COL_T_MEAN.to_string(), COL_PRECIP_SUM.to_string()],
            lags: DEFAULT_LAGS.to_vec(),
            rolling_window: DEFAULT_ROLLING_WINDOW,
            total_failure: TotalFailurePolicy::Fail,
            station_municipalities: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overlaid with an optional config file, overlaid with
    /// `WEEKLY_CLIMATE__*` environment variables; then validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: PipelineConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.check()?;
        Ok(config)
    }

    /// Field validation plus the rules the derive cannot express.
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if self.processing.lags.contains(&0) {
            return Err(ProcessingError::Config(
                "Lag 0 is not a lag; lags must be >= 1".to_string(),
            ));
        }

        let threshold = self.processing.outlier_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ProcessingError::Config(format!(
                "Outlier threshold must be a positive number, got {}",
                threshold
            )));
        }

        Ok(())
    }
}
