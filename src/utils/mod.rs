pub mod columns;
pub mod constants;
pub mod iso_week;
pub mod progress;

pub use columns::{coerce_numeric, extract_numeric_id, normalize_column_name, normalize_column_names};
pub use constants::*;
pub use iso_week::{iso_week_start, iso_year_week};
pub use progress::ProgressReporter;
