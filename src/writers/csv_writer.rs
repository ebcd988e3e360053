use crate::error::Result;
use crate::models::ModelTable;
use crate::utils::constants::{COL_ISO_WEEK, COL_ISO_YEAR, COL_STATION_ID, COL_WEEK_START};
use crate::utils::iso_week::iso_week_start;
use std::path::Path;

/// Plain CSV export of the model table. Missing cells are written empty.
pub struct CsvWriter {
    delimiter: u8,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn write_table(&self, table: &ModelTable, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;

        let mut header = vec![COL_STATION_ID, COL_ISO_YEAR, COL_ISO_WEEK, COL_WEEK_START];
        header.extend(table.column_names());
        writer.write_record(&header)?;

        for row in table.rows() {
            let key = row.key;
            let week_start = iso_week_start(key.iso_year, key.iso_week)
                .map(|d| d.to_string())
                .unwrap_or_default();

            let mut record = vec![
                key.station_id.clone(),
                key.iso_year.to_string(),
                key.iso_week.to_string(),
                week_start,
            ];
            record.extend(row.values.iter().map(|v| {
                if v.is_nan() {
                    String::new()
                } else {
                    v.to_string()
                }
            }));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeeklyClimateRecord;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_table() -> Result<()> {
        let table = ModelTable::from_weekly(&[
            WeeklyClimateRecord::new("A652", 2025, 1, 30.5, 2.0),
            WeeklyClimateRecord::new("A652", 2025, 2, f64::NAN, 0.0),
        ]);
        let temp_file = NamedTempFile::new()?;

        CsvWriter::new().write_table(&table, temp_file.path())?;
        let content = std::fs::read_to_string(temp_file.path())?;
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "station_id,iso_year,iso_week,week_start,t_mean,precip_sum");
        assert_eq!(lines[1], "A652,2025,1,2024-12-30,30.5,2");
        assert_eq!(lines[2], "A652,2025,2,2025-01-06,,0");
        Ok(())
    }

    #[test]
    fn test_semicolon_delimiter() -> Result<()> {
        let table = ModelTable::from_weekly(&[WeeklyClimateRecord::new("X", 2023, 10, 1.5, 0.25)]);
        let temp_file = NamedTempFile::new()?;

        CsvWriter::new()
            .with_delimiter(b';')
            .write_table(&table, temp_file.path())?;
        let content = std::fs::read_to_string(temp_file.path())?;

        assert!(content.starts_with("station_id;iso_year;"));
        assert!(content.contains("X;2023;10;2023-03-06;1.5;0.25"));
        Ok(())
    }
}
