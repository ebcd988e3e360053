use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::{ModelTable, Observation, PopulationRecord, SkipReason, SkippedSource, SourceKind};
use crate::processors::{
    add_features, build_density_table, station_densities, DensityTable, Imputer, WeeklyAggregator,
};
use crate::sources::{acquire, Acquisition, ClimateClient, PopulationClient, Transport};
use crate::utils::constants::COL_POP_DENSITY;
use crate::utils::progress::ProgressReporter;

/// What to do when every identifier of a source was skipped.
///
/// The policy applies to stations and municipalities alike. Under
/// `ReturnEmpty` a total population failure also yields an empty table: a
/// requested density join that produced no density is treated as no data,
/// not as climate rows with a missing `pop_density`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalFailurePolicy {
    #[default]
    Fail,
    ReturnEmpty,
}

/// Counts for one acquisition pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub kind: SourceKind,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

impl AcquisitionReport {
    fn from_acquisition<T>(acquisition: &Acquisition<T>) -> Self {
        Self {
            kind: acquisition.kind,
            attempted: acquisition.attempted(),
            succeeded: acquisition.succeeded(),
            skipped: acquisition.skipped.len(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64 * 100.0
        }
    }
}

impl fmt::Display for AcquisitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} successful, {} skipped",
            self.kind, self.succeeded, self.attempted, self.skipped
        )
    }
}

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub stations: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub municipalities: Vec<String>,
    /// Reference year for density; the year of `end` when unset.
    pub year: Option<i32>,
}

impl PipelineRequest {
    pub fn new(stations: Vec<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            stations,
            start,
            end,
            municipalities: Vec::new(),
            year: None,
        }
    }

    pub fn with_municipalities(mut self, municipalities: Vec<String>) -> Self {
        self.municipalities = municipalities;
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn density_year(&self) -> i32 {
        self.year.unwrap_or_else(|| self.end.year())
    }

    fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(ProcessingError::Config(format!(
                "Start date {} is after end date {}",
                self.start, self.end
            )));
        }
        if self.stations.iter().all(|s| s.trim().is_empty()) {
            return Err(ProcessingError::Config(
                "At least one station identifier is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub table: ModelTable,
    /// Every skipped identifier, stations first, each group sorted.
    pub skipped: Vec<SkippedSource>,
    pub reports: Vec<AcquisitionReport>,
    pub densities: DensityTable,
}

impl PipelineOutput {
    fn empty(skipped: Vec<SkippedSource>, reports: Vec<AcquisitionReport>) -> Self {
        Self {
            skipped,
            reports,
            ..Self::default()
        }
    }
}

/// Acquisition, aggregation, density join, cleaning and feature generation
/// in one blocking run.
pub struct Pipeline {
    config: PipelineConfig,
    climate: ClimateClient,
    population: PopulationClient,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.check()?;

        let climate = ClimateClient::new(transport.clone(), config.climate.base_url.clone())
            .with_endpoint(config.climate.endpoint())
            .with_strictness(config.climate.strictness);
        let population = PopulationClient::new(
            transport,
            config.population.base_url.clone(),
            config.population.variable,
            config.population.locality_level.clone(),
        );

        Ok(Self {
            config,
            climate,
            population,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, request: &PipelineRequest) -> Result<PipelineOutput> {
        request.validate()?;

        let climate = self.acquire_climate(request)?;
        let mut reports = vec![AcquisitionReport::from_acquisition(&climate)];
        let mut skipped = climate.skipped.clone();

        if climate.is_total_failure() {
            return self.total_failure(SourceKind::Station, climate.attempted(), skipped, reports);
        }

        let observations: Vec<_> = climate.into_values().flatten().collect();
        let weekly = WeeklyAggregator::new().aggregate(&observations);
        info!(
            observations = observations.len(),
            weeks = weekly.len(),
            "aggregated observations into weekly records"
        );

        let mut table = ModelTable::from_weekly(&weekly);
        let mut densities = DensityTable::new();

        if !request.municipalities.is_empty() {
            let population = self.acquire_population(request)?;
            reports.push(AcquisitionReport::from_acquisition(&population));
            skipped.extend(population.skipped.iter().cloned());

            if population.is_total_failure() {
                return self.total_failure(
                    SourceKind::Municipality,
                    population.attempted(),
                    skipped,
                    reports,
                );
            }

            densities = build_density_table(population.into_values().map(Ok));
            let stations = table.keys().iter().map(|k| k.station_id.as_str());
            let column =
                station_densities(stations, &self.config.processing.station_municipalities, &densities);
            table = table.with_column(COL_POP_DENSITY, column)?;
        }

        let table = self.clean_and_enrich(&table)?;
        info!(
            rows = table.len(),
            stations = table.station_count(),
            columns = table.columns().len(),
            "model table ready"
        );

        Ok(PipelineOutput {
            table,
            skipped,
            reports,
            densities,
        })
    }

    fn acquire_climate(&self, request: &PipelineRequest) -> Result<Acquisition<Vec<Observation>>> {
        let progress = ProgressReporter::new(
            request.stations.len() as u64,
            "Fetching station observations...",
            !self.show_progress,
        );

        let acquisition = acquire(
            SourceKind::Station,
            &request.stations,
            self.config.http.max_workers,
            Some(&progress),
            |station| self.climate.fetch_station(station, request.start, request.end),
        )?;

        progress.finish_with_message("Station observations fetched");
        Ok(acquisition)
    }

    fn acquire_population(&self, request: &PipelineRequest) -> Result<Acquisition<PopulationRecord>> {
        let year = request.density_year();
        let progress = ProgressReporter::new(
            request.municipalities.len() as u64,
            "Fetching population density...",
            !self.show_progress,
        );

        let acquisition = match &self.config.population.bulk_url {
            Some(url) => {
                let download =
                    ProgressReporter::new_spinner("Downloading density table...", !self.show_progress);
                let table: std::result::Result<DensityTable, SkipReason> = self
                    .population
                    .fetch_bulk(url, year)
                    .map(|records| build_density_table(records.into_iter().map(Ok)));
                download.finish_with_message("Density table downloaded");

                acquire(
                    SourceKind::Municipality,
                    &request.municipalities,
                    self.config.http.max_workers,
                    Some(&progress),
                    |id| match &table {
                        Ok(table) => table
                            .get(id)
                            .map(|&density| PopulationRecord::new(id, density))
                            .ok_or(SkipReason::EmptyPayload),
                        Err(reason) => Err(*reason),
                    },
                )?
            }
            None => acquire(
                SourceKind::Municipality,
                &request.municipalities,
                self.config.http.max_workers,
                Some(&progress),
                |id| self.population.fetch_municipality(id, year),
            )?,
        };

        progress.finish_with_message("Population density fetched");
        Ok(acquisition)
    }

    fn clean_and_enrich(&self, table: &ModelTable) -> Result<ModelTable> {
        let processing = &self.config.processing;
        let imputer = Imputer::with_outlier_threshold(processing.outlier_threshold)?;

        let imputed = imputer.impute(table, processing.impute_strategy);
        let filtered = imputer.remove_outliers(&imputed, &processing.outlier_columns)?;

        add_features(
            &filtered,
            &processing.feature_columns,
            &processing.lags,
            processing.rolling_window,
        )
    }

    fn total_failure(
        &self,
        kind: SourceKind,
        attempted: usize,
        skipped: Vec<SkippedSource>,
        reports: Vec<AcquisitionReport>,
    ) -> Result<PipelineOutput> {
        match self.config.processing.total_failure {
            TotalFailurePolicy::Fail => Err(ProcessingError::NoData {
                entity: kind.entity_name().to_string(),
                attempted,
            }),
            TotalFailurePolicy::ReturnEmpty => {
                info!(entity = %kind, attempted, "no usable data, returning an empty table");
                Ok(PipelineOutput::empty(skipped, reports))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{RawResponse, TransportError};

    /// Serves one JSON body per station id found in the URL path.
    struct StationTransport;

    impl Transport for StationTransport {
        fn get(
            &self,
            url: &str,
            _query: &[(&str, String)],
        ) -> std::result::Result<RawResponse, TransportError> {
            if url.contains("/BAD/") {
                return Ok(RawResponse::new(500, ""));
            }
            if url.contains("/DOWN/") {
                return Err(TransportError::new("connection reset"));
            }
            Ok(RawResponse::new(
                200,
                r#"[
                    {"datahora": "2023-07-10 12:00:00", "temp": 20.0, "prec": 1.0},
                    {"datahora": "2023-07-11 12:00:00", "temp": 22.0, "prec": 0.5},
                    {"datahora": "2023-07-17 12:00:00", "temp": 18.0, "prec": null}
                ]"#,
            ))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pipeline(policy: TotalFailurePolicy) -> Pipeline {
        let mut config = PipelineConfig::default();
        config.http.max_workers = 2;
        config.processing.lags = vec![1];
        config.processing.rolling_window = 2;
        config.processing.total_failure = policy;
        Pipeline::new(config, Arc::new(StationTransport)).unwrap()
    }

    fn stations(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_run_builds_feature_table() {
        let request =
            PipelineRequest::new(stations(&["A1", "BAD", "B2"]), date(2023, 7, 10), date(2023, 7, 23));
        let output = pipeline(TotalFailurePolicy::Fail).run(&request).unwrap();

        assert_eq!(output.table.len(), 4);
        assert_eq!(output.table.station_count(), 2);
        assert!(output.table.has_column("t_mean_lag1"));
        assert!(output.table.has_column("precip_sum_roll2"));
        assert_eq!(output.table.column("t_mean").unwrap()[0], 21.0);
        assert_eq!(
            output.skipped,
            vec![SkippedSource::new(SourceKind::Station, "BAD", SkipReason::HttpStatus(500))]
        );
        assert_eq!(output.reports[0].succeeded, 2);
        assert!(!output.table.has_column(COL_POP_DENSITY));
    }

    #[test]
    fn test_total_failure_policies() {
        let request =
            PipelineRequest::new(stations(&["BAD", "DOWN"]), date(2023, 7, 10), date(2023, 7, 23));

        let err = pipeline(TotalFailurePolicy::Fail).run(&request).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::NoData { ref entity, attempted: 2 } if entity == "station"
        ));

        let output = pipeline(TotalFailurePolicy::ReturnEmpty).run(&request).unwrap();
        assert!(output.table.is_empty());
        assert_eq!(output.skipped.len(), 2);
        assert_eq!(output.skipped[0].reason, SkipReason::HttpStatus(500));
        assert_eq!(output.skipped[1].reason, SkipReason::NetworkFailure);
    }

    #[test]
    fn test_population_total_failure_follows_policy() {
        // every population URL answers with station rows, an empty aggregate
        let request = PipelineRequest::new(stations(&["A1"]), date(2023, 7, 10), date(2023, 7, 23))
            .with_municipalities(stations(&["3304557", "3550308"]));

        let err = pipeline(TotalFailurePolicy::Fail).run(&request).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::NoData { ref entity, attempted: 2 } if entity == "municipality"
        ));

        let output = pipeline(TotalFailurePolicy::ReturnEmpty).run(&request).unwrap();
        assert!(output.table.is_empty());
        assert_eq!(output.reports.len(), 2);
        assert_eq!(output.reports[0].succeeded, 1);
        assert!(output
            .skipped
            .iter()
            .all(|s| s.kind == SourceKind::Municipality && s.reason == SkipReason::EmptyPayload));
    }

    #[test]
    fn test_invalid_request() {
        let reversed = PipelineRequest::new(stations(&["A1"]), date(2023, 7, 23), date(2023, 7, 10));
        assert!(pipeline(TotalFailurePolicy::Fail)
            .run(&reversed)
            .unwrap_err()
            .is_configuration());

        let blank = PipelineRequest::new(stations(&[" "]), date(2023, 7, 10), date(2023, 7, 23));
        assert!(pipeline(TotalFailurePolicy::Fail)
            .run(&blank)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_density_year_defaults_to_end() {
        let request = PipelineRequest::new(stations(&["A1"]), date(2022, 12, 1), date(2023, 1, 31));
        assert_eq!(request.density_year(), 2023);
        assert_eq!(request.with_year(2021).density_year(), 2021);
    }

    #[test]
    fn test_report_display() {
        let report = AcquisitionReport {
            kind: SourceKind::Municipality,
            attempted: 4,
            succeeded: 3,
            skipped: 1,
        };
        assert_eq!(report.to_string(), "municipality: 3/4 successful, 1 skipped");
        assert_eq!(report.success_rate(), 75.0);
    }
}
