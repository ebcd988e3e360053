use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ProcessingError, Result};
use crate::models::WeeklyClimateRecord;
use crate::utils::constants::{COL_PRECIP_SUM, COL_T_MEAN};

/// Key columns of a model table row. Never touched by cleaning or features.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    pub station_id: String,
    pub iso_year: i32,
    pub iso_week: u32,
}

impl RowKey {
    pub fn new(station_id: impl Into<String>, iso_year: i32, iso_week: u32) -> Self {
        Self {
            station_id: station_id.into(),
            iso_year,
            iso_week,
        }
    }

    pub fn chronological(&self) -> (i32, u32) {
        (self.iso_year, self.iso_week)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Values that are present, in row order.
    pub fn present(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied().filter(|v| !v.is_nan())
    }
}

/// Borrowed view of one table row.
#[derive(Debug, Clone)]
pub struct ModelRow<'a> {
    pub key: &'a RowKey,
    pub values: Vec<f64>,
}

/// Columnar weekly table: key columns plus ordered numeric columns.
///
/// NaN marks a missing cell. Every transformation in the crate takes a
/// `&ModelTable` and returns a new table, so callers can keep the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTable {
    keys: Vec<RowKey>,
    columns: Vec<Column>,
}

impl ModelTable {
    pub fn new(keys: Vec<RowKey>) -> Self {
        Self {
            keys,
            columns: Vec::new(),
        }
    }

    pub fn from_weekly(records: &[WeeklyClimateRecord]) -> Self {
        let keys = records
            .iter()
            .map(|r| RowKey::new(r.station_id.clone(), r.iso_year, r.iso_week))
            .collect();

        Self {
            keys,
            columns: vec![
                Column::new(COL_T_MEAN, records.iter().map(|r| r.t_mean).collect()),
                Column::new(COL_PRECIP_SUM, records.iter().map(|r| r.precip_sum).collect()),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`ModelTable::column`], but an unknown name is a caller error.
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| {
            ProcessingError::Config(format!(
                "Unknown column '{}' (available: {})",
                name,
                self.column_names().join(", ")
            ))
        })
    }

    /// Add a column, or replace the values of an existing one in place.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if values.len() != self.keys.len() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Column '{}' has {} values but the table has {} rows",
                name,
                values.len(),
                self.keys.len()
            )));
        }

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column::new(name, values)),
        }

        Ok(self)
    }

    /// Apply `f` to every numeric column, keeping names and order.
    pub fn map_columns<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&Column) -> Vec<f64>,
    {
        Self {
            keys: self.keys.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), f(c)))
                .collect(),
        }
    }

    /// Keep the rows whose mask entry is `true`.
    pub fn select_rows(&self, keep: &[bool]) -> Self {
        let pick = |i: &usize| keep.get(*i).copied().unwrap_or(false);

        Self {
            keys: (0..self.keys.len())
                .filter(pick)
                .map(|i| self.keys[i].clone())
                .collect(),
            columns: self
                .columns
                .iter()
                .map(|c| {
                    Column::new(
                        c.name.clone(),
                        (0..c.values.len()).filter(pick).map(|i| c.values[i]).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Row indices per station, each list in chronological order.
    ///
    /// Stations come out sorted by identifier; rows of the same week keep
    /// their relative table order.
    pub fn station_groups(&self) -> Vec<Vec<usize>> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, key) in self.keys.iter().enumerate() {
            groups.entry(key.station_id.as_str()).or_default().push(i);
        }

        groups
            .into_values()
            .map(|mut rows| {
                rows.sort_by_key(|&i| self.keys[i].chronological());
                rows
            })
            .collect()
    }

    pub fn row(&self, index: usize) -> Option<ModelRow<'_>> {
        let key = self.keys.get(index)?;
        Some(ModelRow {
            key,
            values: self.columns.iter().map(|c| c.values[index]).collect(),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = ModelRow<'_>> {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    pub fn station_count(&self) -> usize {
        let mut stations: Vec<&str> = self.keys.iter().map(|k| k.station_id.as_str()).collect();
        stations.sort_unstable();
        stations.dedup();
        stations.len()
    }

    pub fn missing_count(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(Column::missing_count)
    }
}
