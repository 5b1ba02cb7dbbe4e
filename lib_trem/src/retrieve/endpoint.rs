//! Scheme-checked endpoint URL.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Result, TremError};

/// A URL whose scheme is one of `http`, `https`, `ws` or `wss`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parses and validates `raw`.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| TremError::InvalidEndpoint {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(Self { url }),
            other => Err(TremError::UnsupportedScheme(other.to_string())),
        }
    }

    /// True for `ws` and `wss`.
    pub fn is_websocket(&self) -> bool {
        matches!(self.url.scheme(), "ws" | "wss")
    }

    /// True for `http` and `https`.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// The parsed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL as text.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for Endpoint {
    type Err = TremError;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_websocket_schemes() {
        assert!(Endpoint::parse("https://api-1.exptech.dev").unwrap().is_http());
        assert!(Endpoint::parse("wss://lb-1.exptech.dev/websocket").unwrap().is_websocket());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(matches!(Endpoint::parse("ftp://example.com"), Err(TremError::UnsupportedScheme(s)) if s == "ftp"));
        assert!(matches!(Endpoint::parse("not a url"), Err(TremError::InvalidEndpoint { .. })));
    }
}
