// =============================================================================
// FetchError — transient/fatal classification for exchange requests
// =============================================================================
//
// The fetch loop retries Transient errors at the same cursor and surfaces
// Fatal errors immediately. Classification happens here, at the client
// boundary, so the loop itself never inspects HTTP details.
// =============================================================================

use thiserror::Error;

/// Error returned by every exchange request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Worth retrying at the same cursor: connect/timeout failures,
    /// HTTP 408/429/5xx, and garbled response bodies.
    #[error("transient exchange failure: {0}")]
    Transient(String),

    /// Not retryable: the request itself is wrong (unknown symbol, bad
    /// granularity, rejected parameters). Surfaced to the caller as-is.
    #[error("fatal exchange failure: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify an HTTP status + body into a fetch error.
    ///
    /// 408 (timeout) and 429 (rate limited) are transient despite being
    /// 4xx; every other 4xx means the request is wrong and will never
    /// succeed. 5xx is the exchange's problem and worth retrying.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {status}: {body}");
        if status.is_server_error()
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            Self::Transient(detail)
        } else {
            Self::Fatal(detail)
        }
    }

    /// Classify a body that failed to parse. A garbled page (proxy error,
    /// truncated response) is retried at the same cursor.
    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::Transient(format!("malformed response: {detail}"))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // Transport-level failures (DNS, connect, timeout, broken body
        // stream) are all transient; anything that reached the status
        // phase is classified by from_status instead.
        Self::Transient(format!("request failed: {err}"))
    }
}
