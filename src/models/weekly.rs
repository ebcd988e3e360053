use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::iso_week::iso_week_start;

/// Weekly aggregate for one station, keyed by ISO week-year and week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyClimateRecord {
    pub station_id: String,
    pub iso_year: i32,
    pub iso_week: u32,
    /// Mean of the valid temperature readings; NaN when the week had none.
    pub t_mean: f64,
    pub precip_sum: f64,
}

impl WeeklyClimateRecord {
    pub fn new(
        station_id: impl Into<String>,
        iso_year: i32,
        iso_week: u32,
        t_mean: f64,
        precip_sum: f64,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            iso_year,
            iso_week,
            t_mean,
            precip_sum,
        }
    }

    pub fn key(&self) -> (&str, i32, u32) {
        (&self.station_id, self.iso_year, self.iso_week)
    }

    /// Monday that opens this record's week.
    pub fn week_start(&self) -> Option<NaiveDate> {
        iso_week_start(self.iso_year, self.iso_week)
    }

    pub fn has_temperature(&self) -> bool {
        !self.t_mean.is_nan()
    }
}
