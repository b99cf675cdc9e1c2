//! Shared helpers for HTTP OCR clients: document encoding, rate-limit
//! retries and backoff.

use std::future::Future;
use std::time::Duration;

use base64::Engine;
use reqwest::{Response, StatusCode};
use tracing::warn;

use super::backend::OcrError;

/// Maximum retry attempts on rate limit (429) errors.
const MAX_RETRIES: u32 = 5;

/// Longest single wait between retries.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Encode document bytes for a JSON request body.
pub fn encode_base64(document: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(document)
}

/// Parse a Retry-After header value (seconds form only), capped at 60s.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    header_value?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(60)))
}

/// Exponential backoff delay for a given attempt.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// Map a transport failure into an OCR error.
pub fn network_error(err: reqwest::Error) -> OcrError {
    if err.is_timeout() {
        OcrError::Network(format!("request timed out: {}", err))
    } else {
        OcrError::Network(err.to_string())
    }
}

/// Retry a request on 429 responses with exponential backoff.
///
/// Returns the first non-429 response. If all retries are exhausted,
/// returns `OcrError::RateLimited`.
pub async fn retry_on_rate_limit<F, Fut>(
    client_name: &str,
    make_request: F,
) -> Result<Response, OcrError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, OcrError>>,
{
    let mut attempt = 0;
    loop {
        let response = make_request().await?;

        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let retry_after_secs = retry_after.as_deref().and_then(|s| s.trim().parse::<u64>().ok());

        if attempt >= MAX_RETRIES {
            return Err(OcrError::RateLimited {
                client: client_name.to_string(),
                retry_after_secs,
            });
        }

        let wait = parse_retry_after(retry_after.as_deref())
            .unwrap_or_else(|| backoff_delay(attempt, 1000));

        warn!(
            "{} rate limited (attempt {}), waiting {:?}",
            client_name,
            attempt + 1,
            wait
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}
