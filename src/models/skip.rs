use std::fmt;
use thiserror::Error;

/// Why a source identifier contributed no record.
///
/// Recoverable by construction: the acquisition pass records it and moves on
/// to the next identifier.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    #[error("network failure")]
    NetworkFailure,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("empty payload")]
    EmptyPayload,

    #[error("malformed payload")]
    MalformedPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Station,
    Municipality,
}

impl SourceKind {
    pub fn entity_name(&self) -> &'static str {
        match self {
            SourceKind::Station => "station",
            SourceKind::Municipality => "municipality",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity_name())
    }
}

/// A skipped identifier together with its reason, as surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub kind: SourceKind,
    pub identifier: String,
    pub reason: SkipReason,
}

impl SkippedSource {
    pub fn new(kind: SourceKind, identifier: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            reason,
        }
    }
}

impl fmt::Display for SkippedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.identifier, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_display() {
        let skipped = SkippedSource::new(SourceKind::Station, "A652", SkipReason::HttpStatus(404));
        assert_eq!(skipped.to_string(), "station A652 HTTP status 404");

        let skipped = SkippedSource::new(
            SourceKind::Municipality,
            "3550308",
            SkipReason::MalformedPayload,
        );
        assert_eq!(skipped.to_string(), "municipality 3550308 malformed payload");
    }
}
