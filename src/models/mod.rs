pub mod observation;
pub mod population;
pub mod skip;
pub mod table;
pub mod weekly;

pub use observation::Observation;
pub use population::PopulationRecord;
pub use skip::{SkipReason, SkippedSource, SourceKind};
pub use table::{Column, ModelRow, ModelTable, RowKey};
pub use weekly::WeeklyClimateRecord;
