use serde::Serialize;
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};

use crate::document::{Document, ExtractionMethod};

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Base-1024 size with two decimals, e.g. `1.50 MB`. Zero renders as `0 B`.
pub fn human_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodCount {
    pub method: ExtractionMethod,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub total_documents: usize,
    pub total_size_bytes: u64,
    pub total_size_human: String,
    pub average_processing_time_seconds: f64,
    pub recent_count: usize,
    pub recent_window_days: u32,
    pub method_distribution: Vec<MethodCount>,
}

/// Summarises one owner's documents. Deleted records are skipped even if passed in.
pub fn aggregate(docs: &[Document], now: OffsetDateTime, window_days: u32) -> StatisticsSummary {
    let live: Vec<&Document> = docs.iter().filter(|d| !d.deleted).collect();

    let total_size_bytes = live.iter().map(|d| d.size_bytes).sum();

    let timed: Vec<f64> = live.iter().filter_map(|d| d.processing_seconds).collect();
    let average_processing_time_seconds = if timed.is_empty() {
        0.0
    } else {
        round2(timed.iter().sum::<f64>() / timed.len() as f64)
    };

    let cutoff = now - Duration::days(i64::from(window_days));
    let recent_count = live.iter().filter(|d| d.processed_at >= cutoff).count();

    let mut by_method: BTreeMap<&'static str, (ExtractionMethod, usize)> = BTreeMap::new();
    for doc in &live {
        by_method
            .entry(doc.extraction_method.as_str())
            .or_insert((doc.extraction_method, 0))
            .1 += 1;
    }

    StatisticsSummary {
        total_documents: live.len(),
        total_size_bytes,
        total_size_human: human_size(total_size_bytes),
        average_processing_time_seconds,
        recent_count,
        recent_window_days: window_days,
        method_distribution: by_method
            .into_values()
            .map(|(method, count)| MethodCount { method, count })
            .collect(),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NewDocument, UserId};
    use time::macros::datetime;

    fn doc(id: u64, size: u64, method: ExtractionMethod, at: OffsetDateTime, secs: Option<f64>) -> Document {
        Document::from_new(
            id,
            NewDocument {
                owner_id: UserId::from("u1"),
                file_name: format!("{id}.pdf"),
                size_bytes: size,
                extraction_method: method,
                extracted_text: "text".into(),
                processed_at: at,
                processing_seconds: secs,
            },
        )
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(512), "512.00 B");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(50 * 1024 * 1024), "50.00 MB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(human_size(2 * 1024 * 1024 * 1024 * 1024), "2.00 TB");
    }

    #[test]
    fn empty_owner_has_zeroed_summary() {
        let s = aggregate(&[], datetime!(2024-05-10 00:00 UTC), 7);
        assert_eq!(s.total_documents, 0);
        assert_eq!(s.total_size_human, "0 B");
        assert_eq!(s.average_processing_time_seconds, 0.0);
        assert!(s.method_distribution.is_empty());
    }

    #[test]
    fn aggregates_live_documents() {
        let now = datetime!(2024-05-10 12:00 UTC);
        let mut gone = doc(4, 10_000, ExtractionMethod::Ocr, now, Some(9.0));
        gone.mark_deleted(now);
        let docs = vec![
            doc(1, 1024, ExtractionMethod::DirectText, datetime!(2024-05-09 12:00 UTC), Some(1.0)),
            doc(2, 1024, ExtractionMethod::Ocr, datetime!(2024-05-01 12:00 UTC), Some(2.333)),
            doc(3, 1024, ExtractionMethod::DirectText, datetime!(2024-05-03 12:00 UTC), None),
            gone,
        ];
        let s = aggregate(&docs, now, 7);
        assert_eq!(s.total_documents, 3);
        assert_eq!(s.total_size_bytes, 3072);
        assert_eq!(s.total_size_human, "3.00 KB");
        assert_eq!(s.average_processing_time_seconds, 1.67);
        // The window edge is inclusive.
        assert_eq!(s.recent_count, 2);
        assert_eq!(
            s.method_distribution,
            vec![
                MethodCount { method: ExtractionMethod::DirectText, count: 2 },
                MethodCount { method: ExtractionMethod::Ocr, count: 1 },
            ]
        );
    }
}
