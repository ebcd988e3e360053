use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub municipality_id: String,
    /// Inhabitants per km²; NaN when the source has no value for the year.
    pub pop_density: f64,
}

impl PopulationRecord {
    pub fn new(municipality_id: impl Into<String>, pop_density: f64) -> Self {
        Self {
            municipality_id: municipality_id.into(),
            pop_density,
        }
    }
}
