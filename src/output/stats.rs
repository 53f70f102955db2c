//! Statistics aggregation over stored records
//!
//! This module turns a set of records into a serializable [`Stats`] value,
//! the sole input that charting or reporting code needs.

use crate::config::AnalyticsConfig;
use crate::record::{Record, ScrapeStatus};
use crate::url::extract_domain;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Words ignored when counting word frequencies
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Limits applied while summarizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Maximum number of entries in `top_words`
    pub top_n: usize,

    /// Maximum number of entries in `top_domains`
    pub top_domains: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            top_n: 50,
            top_domains: 10,
        }
    }
}

impl From<&AnalyticsConfig> for SummaryOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            top_n: config.top_n,
            top_domains: config.top_domains,
        }
    }
}

/// Earliest and latest fetch times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Shortest and longest successful text, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextLengthRange {
    pub min: usize,
    pub max: usize,
}

/// Summary statistics over a set of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_records: usize,

    /// Record count per status; only statuses that occur are present
    pub count_by_status: BTreeMap<ScrapeStatus, usize>,

    /// Percentage of records with status SUCCESS (0 when empty)
    pub success_rate: f64,

    /// Most frequent words across successful texts, most frequent first
    pub top_words: Vec<(String, u64)>,

    /// Mean text length over successful records (0 when none)
    pub avg_text_length: f64,

    pub text_length: Option<TextLengthRange>,

    pub time_range: Option<TimeRange>,

    /// Most frequent hosts, most frequent first
    pub top_domains: Vec<(String, u64)>,

    pub unique_domains: usize,
}

/// Computes statistics over records
///
/// Word counting folds case, strips punctuation and skips stop words.
/// Ties in `top_words` and `top_domains` are broken by first appearance.
///
/// # Example
///
/// ```
/// use page_harvest::output::{summarize, SummaryOptions};
/// use page_harvest::Record;
///
/// let records: Vec<Record> = Vec::new();
/// let stats = summarize(&records, &SummaryOptions::default());
/// assert!(stats.count_by_status.is_empty());
/// assert_eq!(stats.avg_text_length, 0.0);
/// assert!(stats.time_range.is_none());
/// ```
pub fn summarize<'a, I>(records: I, options: &SummaryOptions) -> Stats
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut count_by_status = BTreeMap::new();
    let mut words = FrequencyCounter::default();
    let mut domains = FrequencyCounter::default();
    let mut time_range: Option<TimeRange> = None;
    let mut text_length: Option<TextLengthRange> = None;
    let mut total_records = 0;
    let mut successful = 0;
    let mut total_text_length = 0usize;

    for record in records {
        total_records += 1;
        *count_by_status.entry(record.status).or_insert(0) += 1;

        time_range = Some(match time_range {
            None => TimeRange {
                start: record.fetched_at,
                end: record.fetched_at,
            },
            Some(range) => TimeRange {
                start: range.start.min(record.fetched_at),
                end: range.end.max(record.fetched_at),
            },
        });

        if let Some(domain) = extract_domain(&record.url) {
            domains.add(&domain);
        }

        if !record.status.is_success() {
            continue;
        }
        successful += 1;

        let length = record.text_length();
        total_text_length += length;
        text_length = Some(match text_length {
            None => TextLengthRange {
                min: length,
                max: length,
            },
            Some(range) => TextLengthRange {
                min: range.min.min(length),
                max: range.max.max(length),
            },
        });

        if let Some(text) = &record.text {
            for word in tokenize(text) {
                words.add(&word);
            }
        }
    }

    let avg_text_length = if successful == 0 {
        0.0
    } else {
        total_text_length as f64 / successful as f64
    };
    let success_rate = if total_records == 0 {
        0.0
    } else {
        (successful as f64 / total_records as f64) * 100.0
    };

    Stats {
        total_records,
        count_by_status,
        success_rate,
        top_words: words.top(options.top_n),
        avg_text_length,
        text_length,
        time_range,
        unique_domains: domains.len(),
        top_domains: domains.top(options.top_domains),
    }
}

/// Splits text into case-folded words with punctuation removed
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(&word.as_str()))
}

/// Counts occurrences while remembering first-seen order
#[derive(Default)]
struct FrequencyCounter {
    counts: HashMap<String, (u64, usize)>,
}

impl FrequencyCounter {
    fn add(&mut self, key: &str) {
        let next_index = self.counts.len();
        match self.counts.get_mut(key) {
            Some((count, _)) => *count += 1,
            None => {
                self.counts.insert(key.to_string(), (1, next_index));
            }
        }
    }

    fn len(&self) -> usize {
        self.counts.len()
    }

    fn top(self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64, usize)> = self
            .counts
            .into_iter()
            .map(|(key, (count, first_seen))| (key, count, first_seen))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        entries
            .into_iter()
            .take(n)
            .map(|(key, count, _)| (key, count))
            .collect()
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &Stats) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!("  Unique domains: {}", stats.unique_domains);
    println!("  Success rate: {:.1}%", stats.success_rate);
    if let Some(range) = &stats.time_range {
        println!("  First fetch: {}", range.start);
        println!("  Last fetch: {}", range.end);
    }
    println!();

    println!("Records by Status:");
    for (status, count) in &stats.count_by_status {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Content:");
    println!("  Average text length: {:.0} characters", stats.avg_text_length);
    if let Some(range) = &stats.text_length {
        println!("  Shortest text: {} characters", range.min);
        println!("  Longest text: {} characters", range.max);
    }
    println!();

    if !stats.top_domains.is_empty() {
        println!("Top Domains:");
        for (domain, count) in &stats.top_domains {
            println!("  {}: {}", domain, count);
        }
        println!();
    }

    if !stats.top_words.is_empty() {
        println!("Top Words:");
        for (word, count) in stats.top_words.iter().take(20) {
            println!("  {}: {}", word, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap()
    }

    fn success(url: &str, text: &str, minute: u32) -> Record {
        Record::success(url, None, text.to_string(), BTreeMap::new(), 200, at(minute))
    }

    #[test]
    fn test_empty_input() {
        let records: Vec<Record> = Vec::new();
        let stats = summarize(&records, &SummaryOptions::default());

        assert!(stats.count_by_status.is_empty());
        assert_eq!(stats.total_records, 0);
        assert!(stats.top_words.is_empty());
        assert_eq!(stats.avg_text_length, 0.0);
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats.time_range.is_none());
        assert!(stats.text_length.is_none());
    }

    #[test]
    fn test_count_by_status_sums_to_input_length() {
        let records = vec![
            success("https://a.example/", "one", 0),
            success("https://a.example/2", "two", 1),
            Record::failure("https://b.example/", ScrapeStatus::Timeout, None, at(2)),
            Record::failure("https://c.example/", ScrapeStatus::HttpError, Some(500), at(3)),
            Record::failure("https://c.example/x", ScrapeStatus::ParseError, Some(200), at(4)),
        ];

        let stats = summarize(&records, &SummaryOptions::default());

        assert_eq!(stats.count_by_status.values().sum::<usize>(), records.len());
        assert_eq!(stats.count_by_status[&ScrapeStatus::Success], 2);
        assert_eq!(stats.count_by_status.get(&ScrapeStatus::InvalidUrl), None);
        assert_eq!(stats.success_rate, 40.0);
        assert_eq!(
            stats.time_range,
            Some(TimeRange {
                start: at(0),
                end: at(4)
            })
        );
    }

    #[test]
    fn test_top_words_case_folded_and_stripped() {
        let records = vec![
            success("https://a.example/", "Rust is fast. rust, RUST!", 0),
            success("https://a.example/2", "the fast crab", 1),
            Record::failure("https://b.example/", ScrapeStatus::Timeout, None, at(2)),
        ];

        let stats = summarize(&records, &SummaryOptions::default());

        assert_eq!(
            stats.top_words,
            vec![
                ("rust".to_string(), 3),
                ("fast".to_string(), 2),
                ("crab".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_top_words_ties_by_first_seen() {
        let records = vec![success("https://a.example/", "zebra apple mango apple zebra", 0)];

        let stats = summarize(
            &records,
            &SummaryOptions {
                top_n: 2,
                top_domains: 10,
            },
        );

        assert_eq!(
            stats.top_words,
            vec![("zebra".to_string(), 2), ("apple".to_string(), 2)]
        );
    }

    #[test]
    fn test_text_lengths_over_successes_only() {
        let records = vec![
            success("https://a.example/", "abcd", 0),
            success("https://a.example/2", "", 1),
            success("https://a.example/3", "ab", 2),
            Record::failure("https://b.example/", ScrapeStatus::HttpError, Some(404), at(3)),
        ];

        let stats = summarize(&records, &SummaryOptions::default());

        assert_eq!(stats.avg_text_length, 2.0);
        assert_eq!(stats.text_length, Some(TextLengthRange { min: 0, max: 4 }));
    }

    #[test]
    fn test_top_domains() {
        let records = vec![
            success("https://b.example/", "x", 0),
            success("https://a.example/", "x", 1),
            success("https://a.example/2", "x", 2),
            Record::failure("https://b.example/3", ScrapeStatus::Timeout, None, at(3)),
            Record::failure("https://c.example/", ScrapeStatus::Timeout, None, at(4)),
        ];

        let stats = summarize(
            &records,
            &SummaryOptions {
                top_n: 50,
                top_domains: 2,
            },
        );

        assert_eq!(stats.unique_domains, 3);
        assert_eq!(
            stats.top_domains,
            vec![("b.example".to_string(), 2), ("a.example".to_string(), 2)]
        );
    }

    #[test]
    fn test_stats_serialize_with_status_labels() {
        let records = vec![success("https://a.example/", "hello", 0)];
        let stats = summarize(&records, &SummaryOptions::default());

        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["count_by_status"]["SUCCESS"], 1);
        assert_eq!(json["top_words"][0][0], "hello");
    }
}
