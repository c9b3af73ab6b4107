//! Shared blocking HTTP client: timeout, user agent, bounded retry with
//! backoff. A stuck external call fails that call after the timeout, never
//! the whole process.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::ExtractError;

pub(crate) const USER_AGENT: &str = concat!("shipdash/", env!("CARGO_PKG_VERSION"));

const MAX_RETRIES: u32 = 2;

pub struct HttpClient {
    http: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ExtractError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExtractError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// GET a page body as text.
    pub fn get_text(&self, url: &str) -> Result<String, ExtractError> {
        let resp = self.send(url, &[])?;
        resp.text()
            .map_err(|e| ExtractError::Network(format!("failed to read body from {url}: {e}")))
    }

    /// GET a JSON endpoint with query parameters.
    pub fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, ExtractError> {
        let resp = self.send(url, query)?;
        let text = resp
            .text()
            .map_err(|e| ExtractError::Network(format!("failed to read body from {url}: {e}")))?;
        serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| {
            let preview: String = text.chars().take(200).collect();
            ExtractError::Parse(format!("invalid JSON from {url}: {e} (body: {preview})"))
        })
    }

    /// Send with retry on transport errors, 429, and 5xx. Other non-success
    /// statuses fail immediately.
    fn send(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::blocking::Response, ExtractError> {
        let mut backoff = Duration::from_secs(1);

        for attempt in 0..=MAX_RETRIES {
            let result = self.http.get(url).query(query).send();

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt == MAX_RETRIES {
                        return Err(ExtractError::Network(format!(
                            "HTTP {} from {url}",
                            status.as_u16()
                        )));
                    }
                    warn!(url, status = status.as_u16(), attempt = attempt + 1, "retrying");
                }
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        return Err(ExtractError::Network(format!("{url}: {e}")));
                    }
                    warn!(url, error = %e, attempt = attempt + 1, "retrying");
                }
            }

            thread::sleep(backoff);
            backoff *= 2;
        }

        unreachable!()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn get_json_parses_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/data");
            then.status(200).json_body(serde_json::json!({"ok": true}));
        });

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let body = client.get_json(&server.url("/data"), &[]).unwrap();
        assert_eq!(body["ok"], true);
    }

    #[test]
    fn non_retryable_status_fails_immediately() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let err = client.get_text(&server.url("/missing")).unwrap_err();
        assert!(matches!(err, ExtractError::Network(_)));
        mock.assert_hits(1);
    }

    #[test]
    fn query_params_are_sent() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/q").query_param("key", "abc");
            then.status(200).json_body(serde_json::json!({"hit": 1}));
        });

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let body = client.get_json(&server.url("/q"), &[("key", "abc")]).unwrap();
        assert_eq!(body["hit"], 1);
    }
}
