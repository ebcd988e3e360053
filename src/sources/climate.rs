use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::models::{Observation, SkipReason};
use crate::sources::{classify_response, is_blank, Strictness, Transport};
use crate::utils::constants::{CLIMATE_DATE_FORMAT, CLIMATE_END_PARAM, CLIMATE_START_PARAM};

/// URL layout of the station endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClimateEndpoint {
    /// `{base}/{station}/dados?dataInicial=..&dataFinal=..`, rows at the top level.
    Query,
    /// `{base}/{start}/{end}/{station}`, rows under a JSON pointer.
    Path { records_pointer: String },
}

/// One row of the station payload, before validation.
///
/// Field names follow the upstream API; the aliases cover the native INMET
/// column names and plain English ones.
#[derive(Debug, Deserialize)]
struct ClimateRow {
    #[serde(default, rename = "datahora", alias = "timestamp", alias = "DT_MEDICAO")]
    datahora: Option<String>,

    #[serde(default, rename = "HR_MEDICAO")]
    hour: Option<String>,

    #[serde(default, rename = "temp", alias = "temperature", alias = "TEM_INS")]
    temp: Option<Value>,

    #[serde(default, rename = "prec", alias = "precipitation", alias = "CHUVA")]
    prec: Option<Value>,
}

#[derive(Error, Debug, PartialEq)]
enum RowError {
    #[error("row is not an object")]
    NotAnObject,
    #[error("row does not match the schema: {0}")]
    Schema(String),
    #[error("missing timestamp")]
    MissingTimestamp,
    #[error("unparseable timestamp '{0}'")]
    BadTimestamp(String),
    #[error("non-numeric {field}: {value}")]
    NonNumeric { field: &'static str, value: String },
}

pub struct ClimateClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    endpoint: ClimateEndpoint,
    strictness: Strictness,
}

impl ClimateClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoint: ClimateEndpoint::Query,
            strictness: Strictness::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: ClimateEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Fetch the raw hourly observations of one station for `[start, end]`.
    pub fn fetch_station(
        &self,
        station_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<Observation>, SkipReason> {
        let (url, query) = self.request(station_id, start, end);
        let body = classify_response(station_id, self.transport.get(&url, &query))?;
        self.parse_payload(station_id, &body)
    }

    fn request(
        &self,
        station_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (String, Vec<(&'static str, String)>) {
        let start = start.format(CLIMATE_DATE_FORMAT).to_string();
        let end = end.format(CLIMATE_DATE_FORMAT).to_string();

        match self.endpoint {
            ClimateEndpoint::Query => (
                format!("{}/{}/dados", self.base_url, station_id),
                vec![(CLIMATE_START_PARAM, start), (CLIMATE_END_PARAM, end)],
            ),
            ClimateEndpoint::Path { .. } => (
                format!("{}/{}/{}/{}", self.base_url, start, end, station_id),
                Vec::new(),
            ),
        }
    }

    /// Validate a 2xx body against the row schema.
    pub fn parse_payload(
        &self,
        station_id: &str,
        body: &[u8],
    ) -> std::result::Result<Vec<Observation>, SkipReason> {
        if is_blank(body) {
            return Err(SkipReason::EmptyPayload);
        }

        let mut document: Value =
            serde_json::from_slice(body).map_err(|_| SkipReason::MalformedPayload)?;

        let rows = match &self.endpoint {
            ClimateEndpoint::Query => document.take(),
            ClimateEndpoint::Path { records_pointer } => document
                .pointer_mut(records_pointer)
                .map(Value::take)
                .ok_or(SkipReason::EmptyPayload)?,
        };

        let rows = match rows {
            Value::Array(rows) => rows,
            Value::Null => return Err(SkipReason::EmptyPayload),
            _ => return Err(SkipReason::MalformedPayload),
        };

        if rows.is_empty() {
            return Err(SkipReason::EmptyPayload);
        }

        let total = rows.len();
        let mut observations = Vec::with_capacity(total);
        for (index, row) in rows.into_iter().enumerate() {
            match parse_row(station_id, row) {
                Ok(observation) => observations.push(observation),
                Err(e) if self.strictness == Strictness::Strict => {
                    debug!(station_id, index, error = %e, "rejecting payload");
                    return Err(SkipReason::MalformedPayload);
                }
                Err(e) => debug!(station_id, index, error = %e, "dropping row"),
            }
        }

        if observations.is_empty() {
            return Err(SkipReason::MalformedPayload);
        }

        if observations.len() < total {
            debug!(
                station_id,
                kept = observations.len(),
                total,
                "dropped invalid rows"
            );
        }

        Ok(observations)
    }
}

fn parse_row(station_id: &str, row: Value) -> std::result::Result<Observation, RowError> {
    if !row.is_object() {
        return Err(RowError::NotAnObject);
    }

    let row: ClimateRow = serde_json::from_value(row).map_err(|e| RowError::Schema(e.to_string()))?;

    let raw = row.datahora.ok_or(RowError::MissingTimestamp)?;
    let timestamp = parse_timestamp(&raw, row.hour.as_deref())
        .ok_or_else(|| RowError::BadTimestamp(raw.clone()))?;

    Ok(Observation::new(
        station_id,
        timestamp,
        parse_measurement("temperature", row.temp.as_ref())?,
        parse_measurement("precipitation", row.prec.as_ref())?,
    ))
}

/// Timestamps without an offset are taken as UTC. A separate `HHMM` hour
/// field completes a date-only value.
fn parse_timestamp(raw: &str, hour: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = match hour.map(str::trim) {
        Some(h) if !h.is_empty() => NaiveTime::parse_from_str(h, "%H%M").ok()?,
        _ => NaiveTime::MIN,
    };

    Some(date.and_time(time).and_utc())
}

/// Null, absent and blank values are missing (NaN), as are non-finite
/// strings like `"NaN"` or `"inf"`. Anything that is not a number or a
/// numeric string is a schema violation.
fn parse_measurement(
    field: &'static str,
    value: Option<&Value>,
) -> std::result::Result<f64, RowError> {
    let non_numeric = |v: &Value| RowError::NonNumeric {
        field,
        value: v.to_string(),
    };

    match value {
        None | Some(Value::Null) => Ok(f64::NAN),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(f64::NAN)),
        Some(v @ Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(f64::NAN);
            }
            trimmed
                .parse::<f64>()
                .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
                .map(|n| if n.is_finite() { n } else { f64::NAN })
                .map_err(|_| non_numeric(v))
        }
        Some(v) => Err(non_numeric(v)),
    }
}
