use chrono::{Duration, Months, NaiveDateTime};
use clap::ValueEnum;

use crate::models::LeadRecord;

/// Inclusive submit-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateWindow {
    pub fn contains(&self, stamp: NaiveDateTime) -> bool {
        stamp >= self.start && stamp <= self.end
    }
}

/// Relative periods offered by the analytics view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DatePreset {
    #[default]
    All,
    Week,
    Month,
    Quarter,
}

impl DatePreset {
    /// Window ending at `now`, or `None` for the whole history.
    pub fn window(self, now: NaiveDateTime) -> Option<DateWindow> {
        let start = match self {
            DatePreset::All => return None,
            DatePreset::Week => now - Duration::days(7),
            DatePreset::Month => now.checked_sub_months(Months::new(1))?,
            DatePreset::Quarter => now.checked_sub_months(Months::new(3))?,
        };
        Some(DateWindow { start, end: now })
    }

    pub fn label(self) -> &'static str {
        match self {
            DatePreset::All => "all time",
            DatePreset::Week => "the last 7 days",
            DatePreset::Month => "the last month",
            DatePreset::Quarter => "the last quarter",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub text: Option<String>,
    pub window: Option<DateWindow>,
}

impl RecordFilter {
    pub fn matches(&self, record: &LeadRecord) -> bool {
        let text_ok = match self.text.as_deref() {
            Some(query) if !query.is_empty() => matches_text(record, &query.to_lowercase()),
            _ => true,
        };
        let window_ok = match &self.window {
            Some(window) => record.submitted_at.is_some_and(|at| window.contains(at)),
            None => true,
        };
        text_ok && window_ok
    }
}

/// `needle` must already be lowercased.
fn matches_text(record: &LeadRecord, needle: &str) -> bool {
    record
        .entries()
        .iter()
        .any(|(_, value)| value.to_lowercase().contains(needle))
}

/// Records passing `filter`, in their original order.
pub fn filter_records(records: &[LeadRecord], filter: &RecordFilter) -> Vec<LeadRecord> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}
