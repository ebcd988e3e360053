use crate::error::{ProcessingError, Result};
use crate::models::{ModelTable, RowKey};
use crate::utils::constants::{
    COL_ISO_WEEK, COL_ISO_YEAR, COL_STATION_ID, COL_WEEK_START, COMPRESSION_GZIP, COMPRESSION_LZ4,
    COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD, DEFAULT_ROW_GROUP_SIZE,
};
use crate::utils::iso_week::iso_week_start;
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Number of leading key columns in every written file.
const KEY_COLUMNS: usize = 4;

pub struct ParquetWriter {
    compression: Compression,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    /// Write the model table; missing cells become nulls.
    pub fn write_table(&self, table: &ModelTable, path: &Path) -> Result<()> {
        let schema = self.create_schema(table);

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(DEFAULT_ROW_GROUP_SIZE)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        if !table.is_empty() {
            let batch = self.table_to_batch(table, schema)?;
            writer.write(&batch)?;
        }
        writer.close()?;

        Ok(())
    }

    fn create_schema(&self, table: &ModelTable) -> Arc<Schema> {
        let mut fields = vec![
            Field::new(COL_STATION_ID, DataType::Utf8, false),
            Field::new(COL_ISO_YEAR, DataType::Int32, false),
            Field::new(COL_ISO_WEEK, DataType::UInt32, false),
            Field::new(COL_WEEK_START, DataType::Date32, true),
        ];
        fields.extend(
            table
                .columns()
                .iter()
                .map(|c| Field::new(c.name.as_str(), DataType::Float64, true)),
        );

        Arc::new(Schema::new(fields))
    }

    fn table_to_batch(&self, table: &ModelTable, schema: Arc<Schema>) -> Result<RecordBatch> {
        let keys = table.keys();

        let station_ids: Vec<&str> = keys.iter().map(|k| k.station_id.as_str()).collect();
        let iso_years: Vec<i32> = keys.iter().map(|k| k.iso_year).collect();
        let iso_weeks: Vec<u32> = keys.iter().map(|k| k.iso_week).collect();
        let week_starts: Vec<Option<i32>> = keys
            .iter()
            .map(|k| iso_week_start(k.iso_year, k.iso_week).and_then(days_since_epoch))
            .collect();

        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(station_ids)),
            Arc::new(Int32Array::from(iso_years)),
            Arc::new(UInt32Array::from(iso_weeks)),
            Arc::new(Date32Array::from(week_starts)),
        ];

        for column in table.columns() {
            let values: Vec<Option<f64>> = column
                .values
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect();
            arrays.push(Arc::new(Float64Array::from(values)));
        }

        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    /// Read a file written by [`ParquetWriter::write_table`] back into a
    /// table; nulls come back as NaN.
    pub fn read_table(&self, path: &Path) -> Result<ModelTable> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let value_names: Vec<String> = builder
            .schema()
            .fields()
            .iter()
            .skip(KEY_COLUMNS)
            .map(|f| f.name().clone())
            .collect();

        let mut keys = Vec::new();
        let mut values: Vec<Vec<f64>> = vec![Vec::new(); value_names.len()];

        for batch_result in builder.build()? {
            let batch = batch_result?;

            let station_ids = downcast::<StringArray>(&batch, COL_STATION_ID)?;
            let iso_years = downcast::<Int32Array>(&batch, COL_ISO_YEAR)?;
            let iso_weeks = downcast::<UInt32Array>(&batch, COL_ISO_WEEK)?;
            for i in 0..batch.num_rows() {
                keys.push(RowKey::new(
                    station_ids.value(i),
                    iso_years.value(i),
                    iso_weeks.value(i),
                ));
            }

            for (name, out) in value_names.iter().zip(values.iter_mut()) {
                let array = downcast::<Float64Array>(&batch, name)?;
                out.extend(array.iter().map(|v| v.unwrap_or(f64::NAN)));
            }
        }

        value_names
            .into_iter()
            .zip(values)
            .try_fold(ModelTable::new(keys), |table, (name, column)| {
                table.with_column(name, column)
            })
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let file_metadata = metadata.file_metadata();
        let row_groups = metadata.num_row_groups();
        let total_rows = file_metadata.num_rows();
        let file_size = std::fs::metadata(path)?.len();

        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();
        let columns = file_metadata
            .schema_descr()
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        Ok(ParquetFileInfo {
            total_rows,
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size,
            compression: self.compression,
            columns,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn days_since_epoch(date: NaiveDate) -> Option<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from(date.signed_duration_since(epoch).num_days()).ok()
}

fn downcast<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid {} column", name)))
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
    pub columns: Vec<String>,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        let avg_rows = if self.row_groups == 0 {
            0.0
        } else {
            self.total_rows as f64 / self.row_groups as f64
        };

        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} MB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}\n\
            - Columns: {}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1_048_576.0,
            self.compression,
            avg_rows,
            self.columns.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeeklyClimateRecord;
    use tempfile::NamedTempFile;

    fn sample_table() -> ModelTable {
        ModelTable::from_weekly(&[
            WeeklyClimateRecord::new("A652", 2023, 52, 24.5, 12.0),
            WeeklyClimateRecord::new("A652", 2024, 1, f64::NAN, 0.0),
            WeeklyClimateRecord::new("B101", 2024, 1, 19.25, 3.5),
        ])
    }

    #[test]
    fn test_write_empty_table() -> Result<()> {
        let writer = ParquetWriter::new();
        let temp_file = NamedTempFile::new()?;

        writer.write_table(&ModelTable::default(), temp_file.path())?;
        assert_eq!(writer.get_file_info(temp_file.path())?.total_rows, 0);
        Ok(())
    }

    #[test]
    fn test_write_and_read_back() -> Result<()> {
        let writer = ParquetWriter::new();
        let temp_file = NamedTempFile::new()?;
        let table = sample_table();

        writer.write_table(&table, temp_file.path())?;
        let read = writer.read_table(temp_file.path())?;

        assert_eq!(read.keys(), table.keys());
        assert_eq!(read.column_names(), vec!["t_mean", "precip_sum"]);
        let t_mean = read.column("t_mean").unwrap_or_default();
        assert_eq!(t_mean[0], 24.5);
        assert!(t_mean[1].is_nan());

        let info = writer.get_file_info(temp_file.path())?;
        assert_eq!(info.total_rows, 3);
        assert_eq!(
            info.columns,
            vec!["station_id", "iso_year", "iso_week", "week_start", "t_mean", "precip_sum"]
        );
        assert!(info.summary().contains("Total rows: 3"));
        Ok(())
    }

    #[test]
    fn test_different_compressions() -> Result<()> {
        let compressions = ["snappy", "gzip", "lz4", "zstd", "none"];

        for compression in &compressions {
            let writer = ParquetWriter::new().with_compression(compression)?;
            let temp_file = NamedTempFile::new()?;

            let result = writer.write_table(&sample_table(), temp_file.path());
            assert!(result.is_ok(), "Failed with compression: {}", compression);
        }

        assert!(ParquetWriter::new().with_compression("brotli9").is_err());
        Ok(())
    }

    #[test]
    fn test_days_since_epoch() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 11).unwrap();
        assert_eq!(days_since_epoch(date), Some(10));
    }
}
