use tracing::debug;

use crate::error::{ProcessingError, Result};
use crate::models::ModelTable;

pub fn lag_column_name(column: &str, lag: usize) -> String {
    format!("{}_lag{}", column, lag)
}

pub fn rolling_column_name(column: &str, window: usize) -> String {
    format!("{}_roll{}", column, window)
}

/// Add `{column}_lag{k}` for each `k` in `lags`.
///
/// Lags are positional within each station's chronologically ordered rows,
/// so a missing week is not filled in. Output rows keep the input order.
pub fn add_lag_features(table: &ModelTable, column: &str, lags: &[usize]) -> Result<ModelTable> {
    if lags.is_empty() {
        return Err(ProcessingError::Config(
            "At least one lag is required".to_string(),
        ));
    }
    if lags.contains(&0) {
        return Err(ProcessingError::Config(
            "Lag 0 is not a lag; lags must be >= 1".to_string(),
        ));
    }

    let source = table.require_column(column)?;
    let groups = table.station_groups();

    let mut output = table.clone();
    for &lag in lags {
        let mut lagged = vec![f64::NAN; source.len()];
        for rows in &groups {
            for (pos, &row) in rows.iter().enumerate().skip(lag) {
                lagged[row] = source[rows[pos - lag]];
            }
        }
        output = output.with_column(lag_column_name(column, lag), lagged)?;
    }

    debug!(column, ?lags, "added lag features");
    Ok(output)
}

/// Add `{column}_roll{window}`, the trailing mean over `window` station rows.
///
/// NaN until a station has `window` rows, and wherever the window holds a
/// missing value.
pub fn add_rolling_features(table: &ModelTable, column: &str, window: usize) -> Result<ModelTable> {
    if window == 0 {
        return Err(ProcessingError::Config(
            "Rolling window must be >= 1".to_string(),
        ));
    }

    let source = table.require_column(column)?;
    let mut rolled = vec![f64::NAN; source.len()];

    for rows in table.station_groups() {
        let values: Vec<f64> = rows.iter().map(|&i| source[i]).collect();
        for (end, frame) in values.windows(window).enumerate() {
            let row = rows[end + window - 1];
            rolled[row] = frame.iter().sum::<f64>() / window as f64;
        }
    }

    debug!(column, window, "added rolling feature");
    table.clone().with_column(rolling_column_name(column, window), rolled)
}

/// Lags and rolling mean for every column in `columns`.
pub fn add_features(
    table: &ModelTable,
    columns: &[String],
    lags: &[usize],
    window: usize,
) -> Result<ModelTable> {
    columns.iter().try_fold(table.clone(), |acc, column| {
        let with_lags = add_lag_features(&acc, column, lags)?;
        add_rolling_features(&with_lags, column, window)
    })
}
