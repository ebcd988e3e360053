use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "weekly-climate")]
#[command(about = "Build weekly climate and population-density datasets from remote sources")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, aggregate, clean and enrich station data into a model table
    Build {
        #[arg(
            short,
            long,
            value_delimiter = ',',
            required = true,
            help = "Station identifiers, comma separated"
        )]
        stations: Vec<String>,

        #[arg(long, help = "First day of the range (YYYY-MM-DD)")]
        start: NaiveDate,

        #[arg(long, help = "Last day of the range (YYYY-MM-DD)")]
        end: NaiveDate,

        #[arg(
            short,
            long,
            value_delimiter = ',',
            help = "Municipality identifiers for the density join"
        )]
        municipalities: Vec<String>,

        #[arg(long, help = "Reference year for density [default: year of --end]")]
        year: Option<i32>,

        #[arg(short, long, help = "TOML configuration file")]
        config: Option<PathBuf>,

        #[arg(
            short,
            long,
            help = "Output file, .parquet or .csv [default: weekly-climate-{YYMMDD}.parquet]"
        )]
        output_file: Option<PathBuf>,

        #[arg(long, default_value = "snappy")]
        compression: String,

        #[arg(long, help = "Override the configured worker count")]
        max_workers: Option<usize>,
    },

    /// Display information about a written Parquet file
    Inspect {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "weekly-climate",
            "build",
            "--stations",
            "A652,A621",
            "--start",
            "2023-01-01",
            "--end",
            "2023-03-31",
            "-m",
            "3304557",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Build {
                stations,
                start,
                municipalities,
                year,
                ..
            } => {
                assert_eq!(stations, vec!["A652", "A621"]);
                assert_eq!(start, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
                assert_eq!(municipalities, vec!["3304557"]);
                assert_eq!(year, None);
            }
            Commands::Inspect { .. } => panic!("expected build"),
        }
    }

    #[test]
    fn test_build_requires_stations() {
        assert!(Cli::try_parse_from([
            "weekly-climate",
            "build",
            "--start",
            "2023-01-01",
            "--end",
            "2023-03-31",
        ])
        .is_err());
    }
}
