//! Conversation export to JSON and CSV files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::api::types::Conversation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Filename used when no output path is given.
    pub fn default_filename(&self) -> &'static str {
        match self {
            ExportFormat::Json => "conversations.json",
            ExportFormat::Csv => "conversations.csv",
        }
    }
}

/// Pretty-printed JSON of the full conversation array. Parsing the output
/// back yields a deep-equal structure.
pub fn to_json(conversations: &[Conversation]) -> Result<String> {
    serde_json::to_string_pretty(conversations).context("failed to serialize conversations")
}

/// CSV with one row per message: `conversationIndex,role,content`.
///
/// Commas inside message content are replaced with spaces instead of being
/// quoted. Lossy, but it matches what every downstream consumer of these
/// exports already parses.
pub fn to_csv(conversations: &[Conversation]) -> String {
    let mut rows = Vec::new();
    for (index, convo) in conversations.iter().enumerate() {
        for message in &convo.history {
            rows.push(format!(
                "{index},{},{}",
                message.role,
                message.content.replace(',', " ")
            ));
        }
    }
    rows.join("\n")
}

/// Render and write an export, returning the path written.
pub fn write_export(
    format: ExportFormat,
    conversations: &[Conversation],
    out: Option<&Path>,
) -> Result<PathBuf> {
    let content = match format {
        ExportFormat::Json => to_json(conversations)?,
        ExportFormat::Csv => to_csv(conversations),
    };

    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format.default_filename()));

    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
