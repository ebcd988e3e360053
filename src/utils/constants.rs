/// Column names of the weekly table
pub const COL_T_MEAN: &str = "t_mean";
pub const COL_PRECIP_SUM: &str = "precip_sum";
pub const COL_POP_DENSITY: &str = "pop_density";

/// Key column names, used by the writers
pub const COL_STATION_ID: &str = "station_id";
pub const COL_ISO_YEAR: &str = "iso_year";
pub const COL_ISO_WEEK: &str = "iso_week";
pub const COL_WEEK_START: &str = "week_start";

/// Climate source defaults (INMET)
pub const DEFAULT_CLIMATE_BASE_URL: &str = "https://apitempo.inmet.gov.br/estacao";
pub const CLIMATE_START_PARAM: &str = "dataInicial";
pub const CLIMATE_END_PARAM: &str = "dataFinal";
pub const CLIMATE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Population source defaults (IBGE aggregates API)
pub const DEFAULT_POPULATION_BASE_URL: &str =
    "https://servicodados.ibge.gov.br/api/v3/agregados/6579";
pub const DEFAULT_POPULATION_VARIABLE: u32 = 9324;
pub const DEFAULT_LOCALITY_LEVEL: &str = "N3";

/// Bulk population table column candidates, after name normalization
pub const BULK_LOCALITY_COLUMNS: &[&str] = &["localidade", "municipio", "município", "nome"];
pub const BULK_YEAR_COLUMNS: &[&str] = &["ano", "year"];
pub const BULK_VALUE_COLUMNS: &[&str] = &["valor", "value", "densidade", "pop_density"];

/// Request defaults
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Feature defaults
pub const DEFAULT_LAGS: [usize; 4] = [1, 2, 3, 4];
pub const DEFAULT_ROLLING_WINDOW: usize = 4;
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.0;

/// Writer defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
