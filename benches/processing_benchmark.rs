use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weekly_climate::models::{ModelTable, Observation};
use weekly_climate::processors::{add_features, ImputeStrategy, Imputer, WeeklyAggregator};

// Hourly observations for `station_count` stations over `days` days
fn create_observations(station_count: usize, days: usize) -> Vec<Observation> {
    let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
    let mut observations = Vec::with_capacity(station_count * days * 24);

    for station in 0..station_count {
        let station_id = format!("A{:03}", station);
        for hour in 0..days * 24 {
            let timestamp = start + Duration::hours(hour as i64);
            let temperature = if hour % 97 == 0 {
                f64::NAN
            } else {
                20.0 + (hour % 24) as f64 * 0.3 + station as f64 * 0.1
            };
            let precipitation = if hour % 11 == 0 { 0.4 } else { 0.0 };
            observations.push(Observation::new(
                station_id.as_str(),
                timestamp,
                temperature,
                precipitation,
            ));
        }
    }

    observations
}

fn benchmark_weekly_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("weekly_aggregation");

    for station_count in [10, 50, 100].iter() {
        let observations = create_observations(*station_count, 365);

        group.bench_with_input(
            BenchmarkId::new("aggregate", station_count),
            &observations,
            |b, observations| {
                let aggregator = WeeklyAggregator::new();
                b.iter(|| aggregator.aggregate(black_box(observations)))
            },
        );
    }

    group.finish();
}

fn benchmark_cleaning_and_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("cleaning_and_features");
    let columns = vec!["t_mean".to_string(), "precip_sum".to_string()];

    for station_count in [10, 100].iter() {
        let weekly = WeeklyAggregator::new().aggregate(&create_observations(*station_count, 730));
        let table = ModelTable::from_weekly(&weekly);

        group.bench_with_input(
            BenchmarkId::new("interpolate", station_count),
            &table,
            |b, table| {
                let imputer = Imputer::new();
                b.iter(|| imputer.impute(black_box(table), ImputeStrategy::Interpolate))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("lag_and_rolling", station_count),
            &table,
            |b, table| b.iter(|| add_features(black_box(table), &columns, &[1, 2, 3, 4], 4)),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_weekly_aggregation,
    benchmark_cleaning_and_features
);
criterion_main!(benches);
