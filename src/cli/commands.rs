use crate::cli::args::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::processors::{Pipeline, PipelineOutput, PipelineRequest};
use crate::sources::HttpTransport;
use crate::writers::{write_table, ParquetWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Build {
            stations,
            start,
            end,
            municipalities,
            year,
            config,
            output_file,
            compression,
            max_workers,
        } => {
            let mut config = PipelineConfig::load(config.as_deref())?;
            if let Some(workers) = max_workers {
                config.http.max_workers = workers;
            }

            let output_file = output_file.unwrap_or_else(default_output_file);
            println!("Building weekly dataset...");
            println!("Stations: {}", stations.join(", "));
            println!("Range: {} to {}", start, end);
            println!("Output file: {}", output_file.display());
            println!("Workers: {}", config.http.max_workers);

            let mut request =
                PipelineRequest::new(stations, start, end).with_municipalities(municipalities);
            if let Some(year) = year {
                request = request.with_year(year);
            }

            // The blocking HTTP client must be created and dropped off the runtime threads.
            let output = tokio::task::spawn_blocking(move || -> Result<PipelineOutput> {
                let transport = HttpTransport::new(Duration::from_secs(config.http.timeout_secs))?;
                let pipeline = Pipeline::new(config, Arc::new(transport))?.with_progress(true);
                pipeline.run(&request)
            })
            .await??;

            print_output_summary(&output);

            if output.table.is_empty() {
                println!("No rows to write");
                return Ok(());
            }

            if let Some(parent) = output_file.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            println!("Writing {} rows to {}...", output.table.len(), output_file.display());
            write_table(&output.table, &output_file, &compression)?;

            if is_parquet(&output_file) {
                let writer = ParquetWriter::new().with_compression(&compression)?;
                println!("\n{}", writer.get_file_info(&output_file)?.summary());
            }

            info!(path = %output_file.display(), rows = output.table.len(), "dataset written");
            println!("Build complete!");
        }

        Commands::Inspect { file, sample } => {
            println!("Inspecting Parquet file: {}", file.display());

            let writer = ParquetWriter::new();
            let file_info = writer.get_file_info(&file)?;
            println!("\n{}", file_info.summary());

            let table = writer.read_table(&file)?;
            println!("\nStations: {}", table.station_count());
            for column in table.columns() {
                println!("- {}: {} missing", column.name, column.missing_count());
            }

            if sample > 0 {
                println!("\nSample rows (showing up to {}):", sample);
                for (i, row) in table.rows().take(sample).enumerate() {
                    let values: Vec<String> = row
                        .values
                        .iter()
                        .map(|v| if v.is_nan() { "-".to_string() } else { format!("{:.2}", v) })
                        .collect();
                    println!(
                        "{}. {} {}-W{:02}: {}",
                        i + 1,
                        row.key.station_id,
                        row.key.iso_year,
                        row.key.iso_week,
                        values.join(", ")
                    );
                }
            }
        }
    }

    Ok(())
}

/// Stderr output filtered by `RUST_LOG` (default `info`, `debug` with
/// `--verbose`), plus an optional plain-text log file.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let stderr_layer = fmt::layer()
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ProcessingError::Config(format!("Failed to initialize logging: {}", e)))
}

fn print_output_summary(output: &PipelineOutput) {
    println!("\nAcquisition:");
    for report in &output.reports {
        println!("- {} ({:.1}%)", report, report.success_rate());
    }

    if !output.skipped.is_empty() {
        println!("\nSkipped sources:");
        for skipped in &output.skipped {
            println!("- {}", skipped);
        }
    }

    if !output.densities.is_empty() {
        println!("\nPopulation density:");
        for (municipality, density) in &output.densities {
            println!("- {}: {:.2}", municipality, density);
        }
    }

    println!(
        "\nModel table: {} rows, {} stations, columns: {}",
        output.table.len(),
        output.table.station_count(),
        output.table.column_names().join(", ")
    );
}

fn default_output_file() -> PathBuf {
    PathBuf::from(format!(
        "weekly-climate-{}.parquet",
        chrono::Local::now().format("%y%m%d")
    ))
}

fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
}
