use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single hourly reading as delivered by a climate station.
///
/// Missing measurements are carried as `f64::NAN` so the aggregator can
/// apply its own missing-value policy per aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub precipitation: f64,
}

impl Observation {
    pub fn new(
        station_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        temperature: f64,
        precipitation: f64,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp,
            temperature,
            precipitation,
        }
    }

    pub fn has_temperature(&self) -> bool {
        !self.temperature.is_nan()
    }

    pub fn has_precipitation(&self) -> bool {
        !self.precipitation.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_missing_measurements() {
        let ts = Utc.with_ymd_and_hms(2023, 7, 15, 12, 0, 0).unwrap();

        let full = Observation::new("A001", ts, 21.5, 0.2);
        assert!(full.has_temperature());
        assert!(full.has_precipitation());

        let empty = Observation::new("A001", ts, f64::NAN, f64::NAN);
        assert!(!empty.has_temperature());
        assert!(!empty.has_precipitation());
    }
}
