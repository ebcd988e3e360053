//! Remote sources: the climate station API and the population API.
//!
//! Every fetch returns either parsed records or a [`SkipReason`]; nothing in
//! this module propagates a per-identifier failure as a `ProcessingError`.

pub mod acquisition;
pub mod climate;
pub mod population;
pub mod transport;

pub use acquisition::{acquire, Acquisition};
pub use climate::{ClimateClient, ClimateEndpoint};
pub use population::PopulationClient;
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::SkipReason;

/// How row-level schema violations inside an otherwise valid payload are
/// treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// One bad row rejects the whole payload as malformed.
    Strict,
    /// Bad rows are dropped; the payload is malformed only if none survive.
    #[default]
    Lenient,
}

/// First two steps of outcome classification: transport, then status.
/// Returns the body of a 2xx response.
pub(crate) fn classify_response(
    identifier: &str,
    outcome: std::result::Result<RawResponse, TransportError>,
) -> std::result::Result<Vec<u8>, SkipReason> {
    let response = outcome.map_err(|e| {
        debug!(identifier, error = %e, "transport failure");
        SkipReason::NetworkFailure
    })?;

    if !response.is_success() {
        return Err(SkipReason::HttpStatus(response.status));
    }

    Ok(response.body)
}

/// Blank bodies count as "no rows", not as unparseable JSON.
pub(crate) fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}
