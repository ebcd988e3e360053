use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info, warn};

use crate::error::{ProcessingError, Result};
use crate::models::{SkipReason, SkippedSource, SourceKind};
use crate::utils::progress::ProgressReporter;

/// Outcome of one acquisition pass over a list of identifiers.
#[derive(Debug, Clone)]
pub struct Acquisition<T> {
    pub kind: SourceKind,
    /// Successful results, sorted by identifier.
    pub records: Vec<(String, T)>,
    /// Skipped identifiers, sorted by identifier.
    pub skipped: Vec<SkippedSource>,
}

impl<T> Acquisition<T> {
    pub fn attempted(&self) -> usize {
        self.records.len() + self.skipped.len()
    }

    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    pub fn is_total_failure(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.records.into_iter().map(|(_, value)| value)
    }
}

/// Run `fetch` once per distinct identifier on a bounded thread pool.
///
/// Results are sorted by identifier regardless of completion order, and the
/// skip diagnostics are emitted afterwards, one line per identifier.
pub fn acquire<T, F>(
    kind: SourceKind,
    identifiers: &[String],
    max_workers: usize,
    progress: Option<&ProgressReporter>,
    fetch: F,
) -> Result<Acquisition<T>>
where
    T: Send,
    F: Fn(&str) -> std::result::Result<T, SkipReason> + Sync,
{
    let mut identifiers: Vec<&str> = identifiers
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    identifiers.sort_unstable();
    identifiers.dedup();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .build()
        .map_err(|e| ProcessingError::Config(e.to_string()))?;

    let completed = AtomicUsize::new(0);
    let outcomes: Vec<(&str, std::result::Result<T, SkipReason>)> = pool.install(|| {
        identifiers
            .par_iter()
            .map(|&id| {
                let outcome = fetch(id);

                completed.fetch_add(1, Ordering::Relaxed);
                if let Some(p) = progress {
                    p.increment(1);
                }

                (id, outcome)
            })
            .collect()
    });

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(value) => records.push((id.to_string(), value)),
            Err(reason) => {
                warn!(
                    entity = %kind,
                    identifier = id,
                    reason = %reason,
                    "{} {} {}. Skipping.",
                    kind,
                    id,
                    reason
                );
                skipped.push(SkippedSource::new(kind, id, reason));
            }
        }
    }

    let acquisition = Acquisition {
        kind,
        records,
        skipped,
    };
    log_acquisition_summary(&acquisition, completed.load(Ordering::Relaxed));

    Ok(acquisition)
}

fn log_acquisition_summary<T>(acquisition: &Acquisition<T>, completed: usize) {
    let message = format!(
        "{} acquisition complete: {}/{} successful, {} skipped",
        acquisition.kind,
        acquisition.succeeded(),
        completed,
        acquisition.skipped.len()
    );

    if acquisition.skipped.is_empty() {
        info!("{}", message);
    } else if acquisition.records.is_empty() {
        error!("{}", message);
    } else {
        warn!("{}", message);
    }
}
