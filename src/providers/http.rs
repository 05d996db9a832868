//! Shared reqwest plumbing for HTTP providers and services.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use crate::{HuginnError, Result};

/// Longest upstream error body echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client shared by a provider instance.
///
/// No overall timeout is set here; each request carries the call's own
/// deadline.
pub(crate) fn client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Map a send failure, reporting reqwest timeouts as [`HuginnError::Timeout`].
pub(crate) fn send_error(err: reqwest::Error, timeout: Duration) -> HuginnError {
    if err.is_timeout() {
        HuginnError::Timeout(timeout)
    } else {
        HuginnError::from(err)
    }
}

/// Pass successful responses through; map failures to typed errors.
///
/// 401/403 are authentication failures, 404 an unknown model, 429 rate
/// limiting (honouring a `Retry-After` seconds header). Everything else
/// becomes [`HuginnError::Api`] with a truncated body.
pub(crate) async fn check_status(response: Response, model: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HuginnError::AuthenticationFailed),
        StatusCode::NOT_FOUND => Err(HuginnError::ModelNotFound(model.to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(HuginnError::RateLimited {
            retry_after: retry_after(&response),
        }),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.to_string()
            } else {
                truncate(&body, MAX_ERROR_BODY)
            };
            Err(HuginnError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Decode a JSON body, mapping decode failures to [`HuginnError::Http`].
pub(crate) async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| HuginnError::Http(format!("invalid response body: {e}")))
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
