//! HTTP client for the chatbot platform API.
//!
//! All commands go through [`ApiClient`]. It owns the base URL, the
//! per-request timeout, the session cookie, and the retry policy for the
//! designated read endpoints. Every finished call (including exhausted
//! retries) is appended to the request log.

pub mod multipart;
pub mod types;

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::de::DeserializeOwned;

use crate::config::BotdeskConfig;
use crate::reqlog;
use multipart::MultipartForm;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
    retries: u32,
    retry_delay: Duration,
    cookie: Option<String>,
}

impl ApiClient {
    /// Build a client from resolved configuration and an optional cached
    /// session cookie.
    pub fn from_config(config: &BotdeskConfig, cookie: Option<String>) -> Self {
        let timeout = Duration::from_millis(config.api.timeout_ms);
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("botdesk/", env!("CARGO_PKG_VERSION")))
            .build();

        Self {
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            agent,
            retries: config.api.retries.max(1),
            retry_delay: Duration::from_millis(config.api.retry_delay_ms),
            cookie,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_cookie(&mut self, cookie: Option<String>) {
        self.cookie = cookie;
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.agent.request(method, &url);
        if let Some(cookie) = &self.cookie {
            req = req.set("Cookie", cookie);
        }
        req
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Single-attempt GET returning parsed JSON.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let result = self.request("GET", path).call();
        self.finish("GET", path, 1, result)
    }

    /// Retrying GET for the read endpoints (stats, conversation lists).
    ///
    /// Up to `api.retries` attempts with a fixed `api.retry_delay_ms`
    /// pause between them, no backoff. Mutating calls must never go
    /// through here.
    pub fn get_json_with_retry<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let last = attempt >= self.retries;

            // A transient garbage body on an HTTP-OK response counts
            // against the retry budget the same as a transport failure.
            match self.request("GET", path).call() {
                Ok(response) => {
                    let status = response.status();
                    match response.into_json::<T>() {
                        Ok(parsed) => {
                            reqlog::log_request("GET", path, Some(status), attempt, true);
                            return Ok(parsed);
                        }
                        Err(err) if last => {
                            reqlog::log_request("GET", path, Some(status), attempt, false);
                            return Err(err)
                                .with_context(|| format!("invalid JSON from GET {path}"));
                        }
                        Err(_) => {}
                    }
                }
                Err(err) if last => return self.finish("GET", path, attempt, Err(err)),
                Err(_) => {}
            }

            eprintln!(
                "{} attempt {attempt}/{} failed for {path}, retrying in {}ms",
                "retry:".yellow().bold(),
                self.retries,
                self.retry_delay.as_millis()
            );
            thread::sleep(self.retry_delay);
        }
    }

    /// Reachability probe for `doctor`. Any HTTP response (including 401)
    /// proves the server is reachable; only transport failures are errors.
    pub fn probe(&self, path: &str) -> std::result::Result<u16, String> {
        match self.request("GET", path).call() {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(err) => Err(err.to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // Mutations (never retried)
    // -----------------------------------------------------------------------

    pub fn post_json<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let result = self.request("POST", path).send_json(body.clone());
        self.finish("POST", path, 1, result)
    }

    pub fn put_json<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let result = self.request("PUT", path).send_json(body.clone());
        self.finish("PUT", path, 1, result)
    }

    /// POST with an empty body, for action endpoints that respond with JSON.
    pub fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let result = self.request("POST", path).send_json(serde_json::json!({}));
        self.finish("POST", path, 1, result)
    }

    /// POST where only the status matters. Some action endpoints (logout,
    /// quota renewal) return empty or non-JSON bodies on success.
    pub fn post_ok(&self, path: &str) -> Result<u16> {
        let result = self.request("POST", path).send_json(serde_json::json!({}));
        self.finish_status("POST", path, result)
    }

    /// DELETE where only the status matters.
    pub fn delete_ok(&self, path: &str) -> Result<u16> {
        let result = self.request("DELETE", path).call();
        self.finish_status("DELETE", path, result)
    }

    fn finish_status(
        &self,
        method: &str,
        path: &str,
        result: std::result::Result<ureq::Response, ureq::Error>,
    ) -> Result<u16> {
        match result {
            Ok(response) => {
                let status = response.status();
                reqlog::log_request(method, path, Some(status), 1, true);
                Ok(status)
            }
            Err(ureq::Error::Status(code, response)) => {
                reqlog::log_request(method, path, Some(code), 1, false);
                let body = response
                    .into_string()
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                bail!("{method} {path} failed: HTTP {code}: {}", body.trim());
            }
            Err(err) => {
                reqlog::log_request(method, path, None, 1, false);
                Err(err).with_context(|| format!("{method} {path}: request failed"))
            }
        }
    }

    /// POST a multipart form (file uploads).
    pub fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: MultipartForm) -> Result<T> {
        let (content_type, body) = form.finish();
        let result = self
            .request("POST", path)
            .set("Content-Type", &content_type)
            .send_bytes(&body);
        self.finish("POST", path, 1, result)
    }

    /// POST that also captures the session cookie the server sets.
    ///
    /// Used by login: the platform authenticates with a `Set-Cookie`
    /// session header rather than a token in the body.
    pub fn post_capturing_cookie<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(T, Option<String>)> {
        let result = self.request("POST", path).send_json(body.clone());

        match result {
            Ok(response) => {
                let cookie = extract_session_cookie(&response);
                let parsed = self.finish("POST", path, 1, Ok(response))?;
                Ok((parsed, cookie))
            }
            Err(err) => {
                let parsed: T = self.finish("POST", path, 1, Err(err))?;
                Ok((parsed, None))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Shared completion path
    // -----------------------------------------------------------------------

    /// Log the outcome and turn the transport result into parsed JSON or a
    /// readable error. Every request funnel ends here.
    fn finish<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        attempts: u32,
        result: std::result::Result<ureq::Response, ureq::Error>,
    ) -> Result<T> {
        match result {
            Ok(response) => {
                let status = response.status();
                match response.into_json::<T>() {
                    Ok(parsed) => {
                        reqlog::log_request(method, path, Some(status), attempts, true);
                        Ok(parsed)
                    }
                    Err(err) => {
                        reqlog::log_request(method, path, Some(status), attempts, false);
                        Err(err).with_context(|| format!("invalid JSON from {method} {path}"))
                    }
                }
            }
            Err(ureq::Error::Status(code, response)) => {
                reqlog::log_request(method, path, Some(code), attempts, false);
                let body = response
                    .into_string()
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                bail!("{method} {path} failed: HTTP {code}: {}", body.trim());
            }
            Err(err) => {
                reqlog::log_request(method, path, None, attempts, false);
                Err(err).with_context(|| format!("{method} {path}: request failed"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// URL encoding
// ---------------------------------------------------------------------------

/// Percent-encode a path segment or query value.
pub fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Cookie extraction
// ---------------------------------------------------------------------------

/// Pull the session cookie pairs out of a response's `Set-Cookie` headers.
///
/// Only the `name=value` pair of each cookie is kept; attributes like
/// `Path` and `HttpOnly` are server-side concerns.
pub(crate) fn extract_session_cookie(response: &ureq::Response) -> Option<String> {
    let pairs: Vec<String> = response
        .all("set-cookie")
        .iter()
        .filter_map(|header| header.split(';').next())
        .map(|pair| pair.trim().to_string())
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_passes_unreserved_chars_through() {
        assert_eq!(urlencode("abc-123_XY.z~"), "abc-123_XY.z~");
    }

    #[test]
    fn urlencode_escapes_reserved_chars() {
        assert_eq!(urlencode("a b/c?"), "a%20b%2Fc%3F");
        assert_eq!(urlencode("user@example.com"), "user%40example.com");
    }
}
