use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{PopulationRecord, SkipReason};

/// Lookup of population density by municipality identifier.
pub type DensityTable = BTreeMap<String, f64>;

/// Build the density lookup, dropping skipped identifiers.
///
/// A municipality seen twice keeps the last value.
pub fn build_density_table<I>(records: I) -> DensityTable
where
    I: IntoIterator<Item = std::result::Result<PopulationRecord, SkipReason>>,
{
    records
        .into_iter()
        .filter_map(|r| r.ok())
        .map(|r| (r.municipality_id, r.pop_density))
        .collect()
}

/// Density for each station through the station → municipality mapping;
/// NaN when the station is unmapped or its municipality is missing.
///
/// Station keys match case-insensitively: the config loader folds map keys
/// to lowercase, while station identifiers such as `A652` are uppercase.
pub fn station_densities<'a, I>(
    stations: I,
    station_municipalities: &BTreeMap<String, String>,
    densities: &DensityTable,
) -> Vec<f64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mapping: BTreeMap<String, &str> = station_municipalities
        .iter()
        .map(|(station, municipality)| (station.to_lowercase(), municipality.as_str()))
        .collect();

    stations
        .into_iter()
        .map(|station| {
            let municipality = mapping.get(&station.to_lowercase());
            if municipality.is_none() {
                debug!(station, "station has no municipality mapping");
            }
            municipality
                .and_then(|municipality| densities.get(*municipality))
                .copied()
                .unwrap_or(f64::NAN)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_dropped_and_last_wins() {
        let table = build_density_table(vec![
            Ok(PopulationRecord::new("3304557", 5265.8)),
            Err(SkipReason::HttpStatus(500)),
            Ok(PopulationRecord::new("3550308", 7398.3)),
            Ok(PopulationRecord::new("3304557", 5300.0)),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table["3304557"], 5300.0);
        assert_eq!(table["3550308"], 7398.3);
    }

    #[test]
    fn test_station_densities() {
        let densities = build_density_table(vec![Ok(PopulationRecord::new("1", 10.0))]);
        let mapping: BTreeMap<String, String> = [
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ]
        .into_iter()
        .collect();

        let values = station_densities(["A", "B", "C"], &mapping, &densities);
        assert_eq!(values[0], 10.0);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_station_keys_match_ignoring_case() {
        let densities = build_density_table(vec![Ok(PopulationRecord::new("3304557", 5265.8))]);
        let mapping: BTreeMap<String, String> =
            [("a652".to_string(), "3304557".to_string())].into_iter().collect();

        let values = station_densities(["A652", "a652"], &mapping, &densities);
        assert_eq!(values, vec![5265.8, 5265.8]);
    }
}
