//! Conversation aggregation.
//!
//! Pure functions over fetched conversation lists. The reference calendar
//! date is an explicit parameter so "active today" stays deterministic
//! under test.

use chrono::{DateTime, Local, NaiveDate};

use crate::api::types::Conversation;

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SourceCounts {
    pub web: u64,
    pub messenger: u64,
    pub instagram: u64,
    pub whatsapp: u64,
    pub other: u64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ConversationStats {
    pub total: u64,
    /// Average messages per conversation, rounded to the nearest integer.
    pub avg_messages: u64,
    /// Conversations last updated on the reference local calendar date.
    pub active_today: u64,
    pub by_source: SourceCounts,
}

/// Aggregate a conversation list against a reference local date.
pub fn aggregate(conversations: &[Conversation], today: NaiveDate) -> ConversationStats {
    let total = conversations.len() as u64;

    let message_sum: usize = conversations.iter().map(|c| c.history.len()).sum();
    let avg_messages = if total == 0 {
        0
    } else {
        (message_sum as f64 / total as f64).round() as u64
    };

    let active_today = conversations
        .iter()
        .filter(|c| {
            c.updated_at
                .as_deref()
                .is_some_and(|ts| is_on_local_date(ts, today))
        })
        .count() as u64;

    let mut by_source = SourceCounts::default();
    for convo in conversations {
        match convo.source.as_deref() {
            Some("web") => by_source.web += 1,
            Some("messenger") => by_source.messenger += 1,
            Some("instagram") => by_source.instagram += 1,
            Some("whatsapp") => by_source.whatsapp += 1,
            _ => by_source.other += 1,
        }
    }

    ConversationStats {
        total,
        avg_messages,
        active_today,
        by_source,
    }
}

/// Whether an RFC 3339 timestamp falls on the given local calendar date.
/// Unparseable timestamps never match.
fn is_on_local_date(timestamp: &str, date: NaiveDate) -> bool {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Local).date_naive() == date)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::api::types::Message;

    fn convo(messages: usize, source: Option<&str>, updated_at: Option<String>) -> Conversation {
        Conversation {
            source: source.map(str::to_string),
            history: (0..messages)
                .map(|i| Message {
                    role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                    content: format!("msg {i}"),
                })
                .collect(),
            updated_at,
            ..Default::default()
        }
    }

    // A local timestamp string whose local calendar date is unambiguous.
    fn local_ts(y: i32, m: u32, d: u32, h: u32) -> String {
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .unwrap()
            .to_rfc3339()
    }

    #[test]
    fn empty_list_yields_zeroes() {
        let stats = aggregate(&[], NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(stats, ConversationStats::default());
    }

    #[test]
    fn avg_messages_rounds_to_nearest() {
        // 3 + 4 = 7 messages over 2 conversations -> 3.5 -> rounds to 4
        let convos = vec![convo(3, None, None), convo(4, None, None)];
        let stats = aggregate(&convos, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(stats.total, 2);
        assert_eq!(stats.avg_messages, 4);
    }

    #[test]
    fn active_today_matches_exact_local_date_only() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let convos = vec![
            convo(1, None, Some(local_ts(2025, 6, 1, 9))),
            convo(1, None, Some(local_ts(2025, 6, 1, 23))),
            convo(1, None, Some(local_ts(2025, 5, 31, 23))),
            convo(1, None, Some("not a timestamp".to_string())),
            convo(1, None, None),
        ];
        let stats = aggregate(&convos, today);
        assert_eq!(stats.active_today, 2);
    }

    #[test]
    fn sources_are_counted_per_channel() {
        let convos = vec![
            convo(1, Some("web"), None),
            convo(1, Some("web"), None),
            convo(1, Some("messenger"), None),
            convo(1, Some("instagram"), None),
            convo(1, Some("whatsapp"), None),
            convo(1, Some("telegram"), None),
            convo(1, None, None),
        ];
        let stats = aggregate(&convos, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(stats.by_source.web, 2);
        assert_eq!(stats.by_source.messenger, 1);
        assert_eq!(stats.by_source.instagram, 1);
        assert_eq!(stats.by_source.whatsapp, 1);
        assert_eq!(stats.by_source.other, 2);
    }
}
