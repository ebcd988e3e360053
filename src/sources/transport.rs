use reqwest::header::ACCEPT;
use std::time::Duration;
use thiserror::Error;

use crate::error::Result;

/// Connection-level failure: DNS, refused connection, timeout, or a body
/// that could not be read to the end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET seam. Implementations must be shareable across the worker
/// threads of an acquisition pass.
pub trait Transport: Send + Sync {
    fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// `reqwest` blocking client with a per-request timeout.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("weekly-climate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| TransportError::new(e.to_string()))?;

        Ok(RawResponse::new(status, body.to_vec()))
    }
}
