use std::collections::BTreeMap;

use crate::models::{Observation, WeeklyClimateRecord};
use crate::utils::iso_week::iso_year_week;

/// Running sums for one (station, ISO year, ISO week) bucket.
#[derive(Debug, Default)]
struct WeekAccumulator {
    temp_sum: f64,
    temp_count: usize,
    precip_sum: f64,
}

impl WeekAccumulator {
    fn add(&mut self, observation: &Observation) {
        if observation.has_temperature() {
            self.temp_sum += observation.temperature;
            self.temp_count += 1;
        }
        if observation.has_precipitation() {
            self.precip_sum += observation.precipitation;
        }
    }

    fn t_mean(&self) -> f64 {
        if self.temp_count == 0 {
            f64::NAN
        } else {
            self.temp_sum / self.temp_count as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct WeeklyAggregator;

impl WeeklyAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Resample observations into one record per station and ISO week.
    ///
    /// Input order does not matter. Weeks without observations produce no
    /// record; output is sorted by `(station_id, iso_year, iso_week)`.
    pub fn aggregate(&self, observations: &[Observation]) -> Vec<WeeklyClimateRecord> {
        let mut buckets: BTreeMap<(&str, i32, u32), WeekAccumulator> = BTreeMap::new();

        for observation in observations {
            let (iso_year, iso_week) = iso_year_week(&observation.timestamp);
            buckets
                .entry((observation.station_id.as_str(), iso_year, iso_week))
                .or_default()
                .add(observation);
        }

        buckets
            .into_iter()
            .map(|((station_id, iso_year, iso_week), acc)| {
                WeeklyClimateRecord::new(station_id, iso_year, iso_week, acc.t_mean(), acc.precip_sum)
            })
            .collect()
    }
}
