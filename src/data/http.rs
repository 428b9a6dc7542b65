//! Minimal blocking HTTP transport.
//!
//! The paginated client only needs "GET this URL with these query parameters and
//! give me the status and body". Keeping that behind a trait lets the retry and
//! pagination logic run against a scripted transport in tests.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;

use crate::error::AppError;

/// Status code and raw body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// The request never produced a response (DNS, TLS, timeout, reset, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest::blocking`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| TransportError(e.to_string()))?;

        let status = resp.status().as_u16();
        // A body that cannot be read is a broken connection, not a payload problem.
        let body = resp.text().map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_is_a_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(TransportError("connection reset".to_string()));
        assert_eq!(err.to_string(), "connection reset");
        assert!(err.source().is_none());
    }

    #[test]
    fn only_5xx_counts_as_server_error() {
        let resp = |status| HttpResponse { status, body: String::new() };
        assert!(resp(503).is_server_error());
        assert!(!resp(404).is_server_error());
        assert!(!resp(200).is_server_error());
    }
}
