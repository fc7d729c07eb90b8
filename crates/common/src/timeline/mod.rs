//! Timeline view derived from the record list

use crate::db::PaperRecord;
use serde::Serialize;
use std::collections::HashSet;

const MAX_POINTS: usize = 2;
const BULLETS: [char; 3] = ['-', '*', '•'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub id: i64,
    /// 0 when no year could be found
    pub year: i32,
    pub code: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub keywords_pending: bool,
    pub points: Vec<String>,
}

/// First four consecutive ASCII digits anywhere in `text`
///
/// A longer run yields its leading four digits, so "v12345" gives 1234.
pub fn extract_year(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    let start = bytes
        .windows(4)
        .position(|window| window.iter().all(u8::is_ascii_digit))?;
    text[start..start + 4].parse().ok()
}

/// Up to two summary points: bullet lines if the note has any,
/// otherwise its first sentences.
pub fn summary_points(note: &str) -> Vec<String> {
    let bullets: Vec<String> = note
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(BULLETS))
        .map(|point| point.trim().to_string())
        .filter(|point| !point.is_empty())
        .take(MAX_POINTS)
        .collect();
    if !bullets.is_empty() {
        return bullets;
    }

    let mut points = Vec::new();
    let mut current = String::new();
    for ch in note.chars() {
        if ch == '\n' {
            current.push(' ');
        } else {
            current.push(ch);
        }
        if matches!(ch, '.' | '!' | '?') {
            let sentence = current.trim();
            if !sentence.is_empty() {
                points.push(sentence.to_string());
            }
            current.clear();
            if points.len() == MAX_POINTS {
                return points;
            }
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        points.push(rest.to_string());
    }
    points
}

/// Build timeline entries, oldest year first.
///
/// Records without a year sort first. Ties keep list order.
pub fn build_timeline(records: &[PaperRecord], in_flight: &HashSet<i64>) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = records
        .iter()
        .map(|record| TimelineEntry {
            id: record.id,
            year: extract_year(&record.published_date)
                .or_else(|| extract_year(&record.created_at))
                .unwrap_or(0),
            code: record.code.clone(),
            title: record.title.clone(),
            keywords: record.keywords.clone().unwrap_or_default(),
            keywords_pending: in_flight.contains(&record.id),
            points: summary_points(&record.note),
        })
        .collect();

    entries.sort_by_key(|entry| entry.year);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, published_date: &str, created_at: &str, note: &str) -> PaperRecord {
        PaperRecord {
            id,
            code: format!("D{}", id),
            author: "Doe".into(),
            title: format!("Paper {}", id),
            url: String::new(),
            published_date: published_date.into(),
            citation_count: None,
            note: note.into(),
            keywords: None,
            created_at: created_at.into(),
        }
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("2020"), Some(2020));
        assert_eq!(extract_year("March 1999, rev. 2001"), Some(1999));
        assert_eq!(extract_year("v12345 then 1843"), Some(1234));
        assert_eq!(extract_year("ISBN 9780262033848"), Some(9780));
        assert_eq!(extract_year("12/3 then 2019"), Some(2019));
        assert_eq!(extract_year("2024-01-01 00:00:00"), Some(2024));
        assert_eq!(extract_year("n.d."), None);
        assert_eq!(extract_year(""), None);
    }

    #[test]
    fn test_points_prefer_bullets() {
        let note = "Intro sentence.\n- first point\n  * second point\n• third";
        assert_eq!(summary_points(note), vec!["first point", "second point"]);
    }

    #[test]
    fn test_points_fall_back_to_sentences() {
        let note = "LRU beats FIFO. It also\nscales! Third one?";
        assert_eq!(summary_points(note), vec!["LRU beats FIFO.", "It also scales!"]);
        assert_eq!(summary_points("no terminator"), vec!["no terminator"]);
        assert!(summary_points("   ").is_empty());
    }

    #[test]
    fn test_timeline_sorted_and_stable() {
        let records = vec![
            record(4, "2021", "2024-01-01 00:00:00", "a"),
            record(3, "", "", "b"),
            record(2, "2019", "2024-01-01 00:00:00", "c"),
            record(1, "published 2021", "2024-01-01 00:00:00", "d"),
            record(5, "", "2023-05-05 10:00:00", "e"),
        ];
        let in_flight = HashSet::from([2]);

        let timeline = build_timeline(&records, &in_flight);
        let order: Vec<(i64, i32)> = timeline.iter().map(|e| (e.id, e.year)).collect();
        assert_eq!(order, vec![(3, 0), (2, 2019), (4, 2021), (1, 2021), (5, 2023)]);
        assert!(timeline.iter().find(|e| e.id == 2).unwrap().keywords_pending);
        assert!(!timeline.iter().find(|e| e.id == 4).unwrap().keywords_pending);
    }
}
