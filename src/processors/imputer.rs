use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{ProcessingError, Result};
use crate::models::ModelTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    Mean,
    Median,
    Interpolate,
}

impl FromStr for ImputeStrategy {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(ImputeStrategy::Mean),
            "median" => Ok(ImputeStrategy::Median),
            "interpolate" => Ok(ImputeStrategy::Interpolate),
            _ => Err(ProcessingError::Config(format!(
                "Invalid imputation strategy '{}'. Use 'mean', 'median' or 'interpolate'",
                s
            ))),
        }
    }
}

impl fmt::Display for ImputeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImputeStrategy::Mean => write!(f, "mean"),
            ImputeStrategy::Median => write!(f, "median"),
            ImputeStrategy::Interpolate => write!(f, "interpolate"),
        }
    }
}

/// Missing-value imputation and z-score outlier filtering over the numeric
/// columns of a [`ModelTable`]. Key columns are never modified.
pub struct Imputer {
    outlier_threshold: f64,
}

impl Imputer {
    pub fn new() -> Self {
        Self {
            outlier_threshold: crate::utils::constants::DEFAULT_OUTLIER_THRESHOLD,
        }
    }

    pub fn with_outlier_threshold(outlier_threshold: f64) -> Result<Self> {
        if !outlier_threshold.is_finite() || outlier_threshold <= 0.0 {
            return Err(ProcessingError::Config(format!(
                "Outlier threshold must be a positive number, got {}",
                outlier_threshold
            )));
        }
        Ok(Self { outlier_threshold })
    }

    pub fn impute(&self, table: &ModelTable, strategy: ImputeStrategy) -> ModelTable {
        let imputed = table.map_columns(|column| {
            let values = &column.values;
            match strategy {
                ImputeStrategy::Mean => fill_constant(values, mean(values)),
                ImputeStrategy::Median => fill_constant(values, median(values)),
                ImputeStrategy::Interpolate => interpolate(values),
            }
        });

        debug!(%strategy, rows = table.len(), "imputed missing values");
        imputed
    }

    /// Strategy given by name, as read from user input.
    pub fn impute_by_name(&self, table: &ModelTable, strategy: &str) -> Result<ModelTable> {
        let strategy: ImputeStrategy = strategy.parse()?;
        Ok(self.impute(table, strategy))
    }

    /// Drop rows whose z-score exceeds the threshold in any of `columns`.
    ///
    /// Each column uses its own mean and sample standard deviation over the
    /// whole table. Columns with zero variance are not filtered, and missing
    /// cells never count as outliers.
    pub fn remove_outliers(&self, table: &ModelTable, columns: &[String]) -> Result<ModelTable> {
        let mut keep = vec![true; table.len()];

        for name in columns {
            let values = table.require_column(name)?;
            let Some((mean, std_dev)) = mean_and_std(values) else {
                debug!(column = %name, "zero variance, outlier filter skipped");
                continue;
            };

            for (flag, value) in keep.iter_mut().zip(values) {
                if ((value - mean) / std_dev).abs() > self.outlier_threshold {
                    *flag = false;
                }
            }
        }

        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            info!(
                removed,
                threshold = self.outlier_threshold,
                "removed outlier rows"
            );
        }

        Ok(table.select_rows(&keep))
    }
}

impl Default for Imputer {
    fn default() -> Self {
        Self::new()
    }
}

fn present(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

fn mean(values: &[f64]) -> f64 {
    let (sum, count) = present(values).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = present(values).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Mean and sample standard deviation, or `None` when the column cannot
/// produce a meaningful z-score.
fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    let count = present(values).count();
    if count < 2 {
        return None;
    }

    let mean = mean(values);
    let variance = present(values).map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
    let std_dev = variance.sqrt();

    if !std_dev.is_finite() || std_dev <= f64::EPSILON * mean.abs() || std_dev == 0.0 {
        return None;
    }

    Some((mean, std_dev))
}

fn fill_constant(values: &[f64], fill: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v.is_nan() { fill } else { v })
        .collect()
}

/// Linear interpolation along row order, then forward fill, then backward
/// fill. Only an all-missing column keeps NaN.
fn interpolate(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    let anchors: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();

    let (Some(&first), Some(&last)) = (anchors.first(), anchors.last()) else {
        return out;
    };

    for pair in anchors.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        let span = (hi - lo) as f64;
        for i in lo + 1..hi {
            let t = (i - lo) as f64 / span;
            out[i] = values[lo] + (values[hi] - values[lo]) * t;
        }
    }

    for v in &mut out[last + 1..] {
        *v = values[last];
    }
    for v in &mut out[..first] {
        *v = values[first];
    }

    out
}
