pub mod csv_writer;
pub mod parquet_writer;

pub use csv_writer::CsvWriter;
pub use parquet_writer::{ParquetFileInfo, ParquetWriter};

use crate::error::{ProcessingError, Result};
use crate::models::ModelTable;
use std::path::Path;

/// Write the table in the format implied by the file extension.
pub fn write_table(table: &ModelTable, path: &Path, compression: &str) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
        Some("parquet") => ParquetWriter::new()
            .with_compression(compression)?
            .write_table(table, path),
        Some("csv") => CsvWriter::new().write_table(table, path),
        _ => Err(ProcessingError::Config(format!(
            "Unsupported output format for {} (use .parquet or .csv)",
            path.display()
        ))),
    }
}
