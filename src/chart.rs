//! Activity-chart normalization.
//!
//! The server returns raw aggregation buckets `{_id, count}` whose key
//! meaning depends on the timeframe. This module turns them into labeled
//! rows for rendering. Server order is preserved; no sorting.

use clap::ValueEnum;

use crate::api::types::ChartBucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeframeMode {
    /// Buckets are hours of the day (0-23).
    Daily,
    /// Buckets are weekdays, 1=Sun through 7=Sat.
    Weekly,
    /// Buckets are days of the month.
    Monthly,
}

impl TimeframeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeframeMode::Daily => "daily",
            TimeframeMode::Weekly => "weekly",
            TimeframeMode::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub messages: u64,
}

/// Label each bucket according to the timeframe.
pub fn normalize(mode: TimeframeMode, buckets: &[ChartBucket]) -> Vec<ChartPoint> {
    buckets
        .iter()
        .map(|bucket| ChartPoint {
            label: label_for(mode, bucket.id),
            messages: bucket.count,
        })
        .collect()
}

fn label_for(mode: TimeframeMode, id: i64) -> String {
    match mode {
        TimeframeMode::Daily => format!("{id}:00"),
        TimeframeMode::Weekly => weekday_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string()),
        TimeframeMode::Monthly => id.to_string(),
    }
}

/// Weekday names keyed the way the server's aggregation emits them.
fn weekday_name(id: i64) -> Option<&'static str> {
    match id {
        1 => Some("Sun"),
        2 => Some("Mon"),
        3 => Some("Tue"),
        4 => Some("Wed"),
        5 => Some("Thu"),
        6 => Some("Fri"),
        7 => Some("Sat"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(id: i64, count: u64) -> ChartBucket {
        ChartBucket { id, count }
    }

    #[test]
    fn daily_buckets_become_hour_labels() {
        let points = normalize(TimeframeMode::Daily, &[bucket(13, 5), bucket(0, 2)]);
        assert_eq!(points[0].label, "13:00");
        assert_eq!(points[1].label, "0:00");
        assert_eq!(points[0].messages, 5);
    }

    #[test]
    fn weekly_bucket_four_is_wednesday() {
        let points = normalize(TimeframeMode::Weekly, &[bucket(4, 1)]);
        assert_eq!(points[0].label, "Wed");
    }

    #[test]
    fn weekly_out_of_range_falls_back_to_raw_id() {
        let points = normalize(TimeframeMode::Weekly, &[bucket(9, 1), bucket(0, 1)]);
        assert_eq!(points[0].label, "9");
        assert_eq!(points[1].label, "0");
    }

    #[test]
    fn monthly_buckets_are_stringified() {
        let points = normalize(TimeframeMode::Monthly, &[bucket(28, 3)]);
        assert_eq!(points[0].label, "28");
    }

    #[test]
    fn server_order_is_preserved() {
        let points = normalize(
            TimeframeMode::Daily,
            &[bucket(9, 1), bucket(3, 1), bucket(17, 1)],
        );
        let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["9:00", "3:00", "17:00"]);
    }
}
