pub mod density_table;
pub mod feature_generator;
pub mod imputer;
pub mod pipeline;
pub mod weekly_aggregator;

pub use density_table::{build_density_table, station_densities, DensityTable};
pub use feature_generator::{
    add_features, add_lag_features, add_rolling_features, lag_column_name, rolling_column_name,
};
pub use imputer::{ImputeStrategy, Imputer};
pub use pipeline::{
    AcquisitionReport, Pipeline, PipelineOutput, PipelineRequest, TotalFailurePolicy,
};
pub use weekly_aggregator::WeeklyAggregator;
