//! Error taxonomy for the scraping pipeline.
//!
//! Every transport failure surfaces as a [`ScraperError`] whose [`ErrorKind`]
//! tells the caller what happened: the page took too long, an anti-bot
//! defence answered instead of the marketplace, the content was malformed,
//! or the network itself failed.

use std::fmt;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a scraping failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The operation exceeded its time bound.
    Timeout,
    /// An anti-automation defence was detected (status code or body content).
    Blocked,
    /// An expected structure was malformed.
    ParseError,
    /// Transport-level failure not otherwise classified.
    NetworkError,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Blocked => "BLOCKED",
            ErrorKind::ParseError => "PARSE_ERROR",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged scraping error.
#[derive(thiserror::Error, Debug)]
#[error("{kind}: {message}")]
pub struct ScraperError {
    pub kind: ErrorKind,
    pub message: String,
    /// Marketplace the failing call was made for, when known.
    pub marketplace: Option<String>,
    #[source]
    pub source: Option<BoxError>,
}

impl ScraperError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            marketplace: None,
            source: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Blocked, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Attach the marketplace identifier, keeping an existing one.
    pub fn with_marketplace(mut self, marketplace: impl Into<String>) -> Self {
        if self.marketplace.is_none() {
            self.marketplace = Some(marketplace.into());
        }
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether the failure justifies switching transport or marketplace.
    pub fn is_retryable_elsewhere(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout | ErrorKind::Blocked)
    }

    /// Convert an internal `anyhow` error, keeping a wrapped `ScraperError`
    /// as-is and classifying everything else as [`ErrorKind::Unknown`].
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<ScraperError>() {
            Ok(known) => known,
            Err(other) => {
                let message = format!("{other:#}");
                ScraperError::unknown(message).with_source(other)
            }
        }
    }
}

impl From<reqwest::Error> for ScraperError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_decode() {
            ErrorKind::ParseError
        } else {
            ErrorKind::NetworkError
        };
        ScraperError::new(kind, err.to_string()).with_source(err)
    }
}
