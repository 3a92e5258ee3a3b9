use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::Serialize;

use crate::models::{Dimension, LeadRecord, PageVariant};

/// Content chart shows this many groups.
pub const TOP_CONTENT: usize = 7;
/// Campaign and course comparisons show this many groups.
pub const TOP_COMPARISON: usize = 5;
/// Daily trend tracks this many sources next to the total.
pub const TOP_TREND_SOURCES: usize = 3;
/// Time distribution tracks this many categories.
pub const TOP_TIME_CATEGORIES: usize = 5;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub value: String,
    pub count: usize,
    /// Percent of the denominator, 0 when the denominator is 0.
    pub percentage: f64,
}

/// Count records per value of `dimension`, largest first. Equal counts
/// keep the order in which the values first appeared.
pub fn group_by(records: &[LeadRecord], dimension: Dimension) -> Vec<GroupCount> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for record in records {
        *counts.entry(record.category(dimension)).or_insert(0) += 1;
    }
    sorted_counts(counts.into_iter().map(|(value, count)| (value.to_string(), count)))
}

fn sorted_counts(counts: impl Iterator<Item = (String, usize)>) -> Vec<GroupCount> {
    let mut groups: Vec<GroupCount> = counts
        .map(|(value, count)| GroupCount { value, count })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}

pub fn percentage(count: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        count as f64 * 100.0 / denominator as f64
    }
}

/// Attach percentages. `denominator` is the size of the set that was
/// grouped; callers pass the filtered set's length, never the full load.
pub fn shares(groups: &[GroupCount], denominator: usize) -> Vec<Share> {
    groups
        .iter()
        .map(|group| Share {
            value: group.value.clone(),
            count: group.count,
            percentage: percentage(group.count, denominator),
        })
        .collect()
}

/// Group, then attach percentages over `records.len()`.
pub fn distribution(records: &[LeadRecord], dimension: Dimension) -> Vec<Share> {
    shares(&group_by(records, dimension), records.len())
}

/// Keep the first `n` items of an already sorted list.
pub fn top_n<T>(mut items: Vec<T>, n: usize) -> Vec<T> {
    items.truncate(n);
    items
}

/// Calendar unit for time bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeUnit {
    #[default]
    Hour,
    Day,
    Month,
    DayOfWeek,
}

impl TimeUnit {
    /// Every bucket of the unit, in axis order.
    pub fn range(self) -> RangeInclusive<u32> {
        match self {
            TimeUnit::Hour => 0..=23,
            TimeUnit::Day => 1..=31,
            TimeUnit::Month => 1..=12,
            TimeUnit::DayOfWeek => 0..=6,
        }
    }

    pub fn bucket(self, at: NaiveDateTime) -> u32 {
        match self {
            TimeUnit::Hour => at.hour(),
            TimeUnit::Day => at.day(),
            TimeUnit::Month => at.month(),
            TimeUnit::DayOfWeek => at.weekday().num_days_from_sunday(),
        }
    }

    pub fn label(self, bucket: u32) -> String {
        match self {
            TimeUnit::Hour => format!("{bucket}h"),
            TimeUnit::Day => bucket.to_string(),
            TimeUnit::Month => MONTH_NAMES
                .get(bucket.wrapping_sub(1) as usize)
                .map_or_else(|| bucket.to_string(), |name| name.to_string()),
            TimeUnit::DayOfWeek => WEEKDAY_NAMES
                .get(bucket as usize)
                .map_or_else(|| bucket.to_string(), |name| name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub bucket: u32,
    pub total: usize,
    pub categories: IndexMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeDistribution {
    pub unit: TimeUnit,
    pub dimension: Option<Dimension>,
    pub buckets: Vec<TimeBucket>,
    /// Per-category volume over the whole range, largest first.
    pub category_totals: Vec<GroupCount>,
    /// Records without a usable submit time.
    pub undated: usize,
}

/// Bucket records by `unit`, then by `dimension` inside each bucket. The
/// unit's whole range is always present, empty buckets included.
pub fn time_distribution(
    records: &[LeadRecord],
    unit: TimeUnit,
    dimension: Option<Dimension>,
) -> TimeDistribution {
    let mut buckets: Vec<TimeBucket> = unit
        .range()
        .map(|bucket| TimeBucket {
            bucket,
            total: 0,
            categories: IndexMap::new(),
        })
        .collect();
    let first = *unit.range().start();
    let mut totals: IndexMap<String, usize> = IndexMap::new();
    let mut undated = 0usize;

    for record in records {
        let Some(at) = record.submitted_at else {
            undated += 1;
            continue;
        };
        let Some(slot) = buckets.get_mut((unit.bucket(at) - first) as usize) else {
            continue;
        };
        slot.total += 1;

        if let Some(dimension) = dimension {
            let category = record.category(dimension);
            *slot.categories.entry(category.to_string()).or_insert(0) += 1;
            *totals.entry(category.to_string()).or_insert(0) += 1;
        }
    }

    if undated > 0 {
        tracing::debug!(undated, "records without submit time left out of time buckets");
    }

    TimeDistribution {
        unit,
        dimension,
        buckets,
        category_totals: sorted_counts(totals.into_iter()),
        undated,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub total: usize,
    pub sources: IndexMap<String, usize>,
}

/// Submissions per calendar date, oldest first. Only dates that occur in
/// the data are listed.
pub fn daily_trend(records: &[LeadRecord]) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, DailyPoint> = BTreeMap::new();

    for record in records {
        let Some(at) = record.submitted_at else {
            continue;
        };
        let date = at.date();
        let point = days.entry(date).or_insert_with(|| DailyPoint {
            date,
            total: 0,
            sources: IndexMap::new(),
        });
        point.total += 1;
        *point
            .sources
            .entry(record.category(Dimension::Source).to_string())
            .or_insert(0) += 1;
    }

    days.into_values().collect()
}

/// Counts of one group split by landing-page variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantBreakdown {
    pub name: String,
    pub total: usize,
    pub a: usize,
    pub b: usize,
    pub default: usize,
}

impl VariantBreakdown {
    fn new(name: String) -> Self {
        Self {
            name,
            total: 0,
            a: 0,
            b: 0,
            default: 0,
        }
    }

    /// Percent of the group's total that came from `variant`.
    pub fn share(&self, variant: PageVariant) -> f64 {
        percentage(self.count(variant), self.total)
    }

    /// How far the stronger test variant is ahead of the other one. Only
    /// defined when both A and B drew leads; a tie reports A with 0.
    pub fn effect(&self) -> Option<VariantEffect> {
        if self.a == 0 || self.b == 0 {
            return None;
        }
        let (better, lead, other) = if self.b > self.a {
            (PageVariant::B, self.b, self.a)
        } else {
            (PageVariant::A, self.a, self.b)
        };
        Some(VariantEffect {
            better,
            improvement: percentage(lead - other, other),
        })
    }

    pub fn count(&self, variant: PageVariant) -> usize {
        match variant {
            PageVariant::A => self.a,
            PageVariant::B => self.b,
            PageVariant::Default => self.default,
        }
    }

    fn add(&mut self, variant: PageVariant) {
        self.total += 1;
        match variant {
            PageVariant::A => self.a += 1,
            PageVariant::B => self.b += 1,
            PageVariant::Default => self.default += 1,
        }
    }
}

/// Winner of an A/B split and its relative lead over the other variant,
/// in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariantEffect {
    pub better: PageVariant,
    pub improvement: f64,
}

/// Per value of `dimension`, how many records came from each variant.
/// Largest total first, ties in first-seen order.
pub fn variant_comparison(records: &[LeadRecord], dimension: Dimension) -> Vec<VariantBreakdown> {
    let mut groups: IndexMap<&str, VariantBreakdown> = IndexMap::new();
    for record in records {
        let name = record.category(dimension);
        groups
            .entry(name)
            .or_insert_with(|| VariantBreakdown::new(name.to_string()))
            .add(record.variant());
    }

    let mut rows: Vec<VariantBreakdown> = groups.into_values().collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub latest_submission: Option<NaiveDateTime>,
    /// Most common value per headline dimension.
    pub leaders: Vec<(Dimension, Share)>,
}

const SUMMARY_DIMENSIONS: [Dimension; 5] = [
    Dimension::Source,
    Dimension::Medium,
    Dimension::Course,
    Dimension::Campaign,
    Dimension::Content,
];

pub fn summarize(records: &[LeadRecord]) -> Summary {
    let leaders = SUMMARY_DIMENSIONS
        .into_iter()
        .filter_map(|dimension| {
            distribution(records, dimension)
                .into_iter()
                .next()
                .map(|share| (dimension, share))
        })
        .collect();

    Summary {
        total: records.len(),
        latest_submission: records.iter().filter_map(|r| r.submitted_at).max(),
        leaders,
    }
}
