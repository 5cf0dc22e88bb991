//! Request logger — best-effort JSONL record of every API call.
//!
//! Each completed HTTP request (including failed attempts that exhausted
//! their retries) appends one line to `~/.botdesk/request-log.jsonl`.
//! `botdesk doctor` reports the log's size; the log is otherwise purely
//! diagnostic and failures to write it are silently ignored.

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request log entry
// ---------------------------------------------------------------------------

/// A single entry in the request log. One line per finished API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub timestamp: String,
    /// HTTP method (`"GET"`, `"POST"`, ...).
    pub method: String,
    /// Request path relative to the API base URL.
    pub path: String,
    /// HTTP status of the final attempt, if a response was received at all.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    /// Number of attempts made (> 1 only for the retried read endpoints).
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Whether the call ultimately produced a parseable OK response.
    pub ok: bool,
}

fn default_attempts() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Append a request outcome to the log. Best-effort — never fails the call.
pub fn log_request(method: &str, path: &str, status: Option<u16>, attempts: u32, ok: bool) {
    let entry = RequestLogEntry {
        timestamp: Utc::now().to_rfc3339(),
        method: method.to_string(),
        path: path.to_string(),
        status,
        attempts,
        ok,
    };

    let _ = append_entry(&entry);
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read all request log entries.
///
/// Silently skips malformed lines. Returns an empty vec if the file does not
/// exist or cannot be read.
pub fn read_all_entries() -> Vec<RequestLogEntry> {
    let Some(path) = request_log_path() else {
        return Vec::new();
    };

    let Ok(file) = fs::File::open(path) else {
        return Vec::new();
    };

    let reader = BufReader::new(file);
    reader
        .lines()
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str::<RequestLogEntry>(&line).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

fn append_entry(entry: &RequestLogEntry) -> Result<()> {
    let Some(path) = request_log_path() else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry)?;
    writeln!(file, "{json}")?;

    Ok(())
}

/// Return the path to the request log file.
pub fn request_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".botdesk").join("request-log.jsonl"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
