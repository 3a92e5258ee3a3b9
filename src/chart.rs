//! Chart-ready shapes built from aggregation output.
//!
//! Every projection is total: no records in, empty series out. Rendering
//! an empty state is the caller's job.

use std::borrow::Cow;

use serde::Serialize;

use crate::aggregate::{
    percentage, DailyPoint, GroupCount, Share, TimeDistribution, VariantBreakdown, VariantEffect,
    TOP_TIME_CATEGORIES,
};
use crate::models::{Dimension, PageVariant};
use crate::theme::{series_color, ChartStyle, Theme};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub color: &'static str,
    pub values: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub name: String,
    pub value: usize,
    pub percentage: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub name: String,
    pub value: usize,
    /// Percent of the group total.
    pub percentage: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarGroup {
    pub name: String,
    pub bars: Vec<Bar>,
    pub effect: Option<VariantEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChartBody {
    TimeSeries { x: Vec<String>, series: Vec<Series> },
    Distribution { slices: Vec<Slice> },
    Comparison { groups: Vec<BarGroup> },
}

impl ChartBody {
    pub fn is_empty(&self) -> bool {
        match self {
            ChartBody::TimeSeries { series, .. } => series.is_empty(),
            ChartBody::Distribution { slices } => slices.is_empty(),
            ChartBody::Comparison { groups } => groups.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub style: ChartStyle,
    #[serde(flatten)]
    pub body: ChartBody,
}

impl Chart {
    pub fn new(title: impl Into<String>, theme: Theme, body: ChartBody) -> Self {
        Self {
            title: title.into(),
            style: ChartStyle::for_theme(theme),
            body,
        }
    }
}

/// Human label for a grouping key; variant keys become page names.
pub fn display_value(dimension: Option<Dimension>, value: &str) -> Cow<'_, str> {
    match dimension {
        Some(Dimension::Variant) => Cow::Borrowed(PageVariant::parse(Some(value)).label()),
        _ => Cow::Borrowed(value),
    }
}

/// One line per tracked category over the unit's full axis, limited to the
/// categories with the most volume across the whole range. Without a
/// category dimension a single `count` line is drawn.
pub fn time_series(distribution: &TimeDistribution) -> ChartBody {
    let seen: usize = distribution.buckets.iter().map(|b| b.total).sum();
    if seen + distribution.undated == 0 {
        return ChartBody::TimeSeries {
            x: Vec::new(),
            series: Vec::new(),
        };
    }

    let x = distribution
        .buckets
        .iter()
        .map(|bucket| distribution.unit.label(bucket.bucket))
        .collect();

    let series = match distribution.dimension {
        None => vec![Series {
            name: "count".to_string(),
            color: series_color(0),
            values: distribution.buckets.iter().map(|b| b.total).collect(),
        }],
        Some(dimension) => distribution
            .category_totals
            .iter()
            .take(TOP_TIME_CATEGORIES)
            .enumerate()
            .map(|(index, category)| Series {
                name: display_value(Some(dimension), &category.value).into_owned(),
                color: series_color(index),
                values: distribution
                    .buckets
                    .iter()
                    .map(|b| b.categories.get(&category.value).copied().unwrap_or(0))
                    .collect(),
            })
            .collect(),
    };

    ChartBody::TimeSeries { x, series }
}

/// Daily totals plus one line per source in `sources`.
pub fn trend_series(points: &[DailyPoint], sources: &[GroupCount]) -> ChartBody {
    if points.is_empty() {
        return ChartBody::TimeSeries {
            x: Vec::new(),
            series: Vec::new(),
        };
    }

    let x = points.iter().map(|p| p.date.to_string()).collect();
    let mut series = vec![Series {
        name: "total".to_string(),
        color: series_color(0),
        values: points.iter().map(|p| p.total).collect(),
    }];
    series.extend(sources.iter().enumerate().map(|(index, source)| Series {
        name: source.value.clone(),
        color: series_color(index + 1),
        values: points
            .iter()
            .map(|p| p.sources.get(&source.value).copied().unwrap_or(0))
            .collect(),
    }));

    ChartBody::TimeSeries { x, series }
}

/// Name/value slices for pie and bar distributions.
pub fn distribution(shares: &[Share], dimension: Dimension) -> ChartBody {
    let slices = shares
        .iter()
        .enumerate()
        .map(|(index, share)| Slice {
            name: display_value(Some(dimension), &share.value).into_owned(),
            value: share.count,
            percentage: share.percentage,
            color: series_color(index),
        })
        .collect();
    ChartBody::Distribution { slices }
}

/// Grouped bars: the group total followed by one bar per page variant,
/// with the A/B effect when both test variants drew leads.
pub fn comparison(rows: &[VariantBreakdown]) -> ChartBody {
    let groups = rows
        .iter()
        .map(|row| {
            let mut bars = vec![Bar {
                name: "total".to_string(),
                value: row.total,
                percentage: percentage(row.total, row.total),
                color: series_color(0),
            }];
            bars.extend(
                PageVariant::ALL
                    .into_iter()
                    .enumerate()
                    .map(|(index, variant)| Bar {
                        name: variant.label().to_string(),
                        value: row.count(variant),
                        percentage: row.share(variant),
                        color: series_color(index + 1),
                    }),
            );
            BarGroup {
                name: row.name.clone(),
                bars,
                effect: row.effect(),
            }
        })
        .collect();
    ChartBody::Comparison { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{
        daily_trend, distribution as shares_of, group_by, time_distribution, top_n,
        variant_comparison, TimeUnit,
    };
    use crate::models::LeadRecord;
    use crate::normalize::normalize;
    use serde_json::json;

    fn records() -> Vec<LeadRecord> {
        let rows = [
            ("google", "a", "2025-05-18 09:00:00"),
            ("google", "b", "2025-05-18 10:00:00"),
            ("naver", "a", "2025-05-19 10:00:00"),
            ("meta", "a", "2025-05-19 11:00:00"),
            ("kakao", "b", "2025-05-19 11:30:00"),
            ("tiktok", "", "2025-05-20 23:00:00"),
            ("email", "a", "2025-05-20 23:10:00"),
        ];
        rows.iter()
            .map(|(source, variant, at)| {
                normalize(json!({ "utmSource": source, "pageVariant": variant, "submitAt": at }))
            })
            .collect()
    }

    #[test]
    fn projections_of_nothing_are_empty() {
        let empty: Vec<LeadRecord> = Vec::new();
        assert!(time_series(&time_distribution(&empty, TimeUnit::Hour, None)).is_empty());
        assert!(trend_series(&daily_trend(&empty), &[]).is_empty());
        assert!(distribution(&shares_of(&empty, Dimension::Source), Dimension::Source).is_empty());
        assert!(comparison(&variant_comparison(&empty, Dimension::Campaign)).is_empty());
    }

    #[test]
    fn time_series_caps_categories_at_five() {
        let dist = time_distribution(&records(), TimeUnit::Hour, Some(Dimension::Source));
        let ChartBody::TimeSeries { x, series } = time_series(&dist) else {
            panic!("expected a time series");
        };
        assert_eq!(x.len(), 24);
        assert_eq!(x[0], "0h");
        assert_eq!(series.len(), 5);
        assert_eq!(series[0].name, "google");
        assert_eq!(series[0].values[9], 1);
        assert!(series.iter().all(|s| s.values.len() == 24));
    }

    #[test]
    fn uncategorized_time_series_has_one_line() {
        let dist = time_distribution(&records(), TimeUnit::DayOfWeek, None);
        let ChartBody::TimeSeries { x, series } = time_series(&dist) else {
            panic!("expected a time series");
        };
        assert_eq!(x, vec!["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].values.iter().sum::<usize>(), 7);
    }

    #[test]
    fn variant_series_use_page_labels() {
        let dist = time_distribution(&records(), TimeUnit::Hour, Some(Dimension::Variant));
        let ChartBody::TimeSeries { series, .. } = time_series(&dist) else {
            panic!("expected a time series");
        };
        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Variant A", "Variant B", "Default page"]);
    }

    #[test]
    fn trend_tracks_requested_sources() {
        let data = records();
        let sources = top_n(group_by(&data, Dimension::Source), 1);
        let ChartBody::TimeSeries { x, series } = trend_series(&daily_trend(&data), &sources)
        else {
            panic!("expected a time series");
        };
        assert_eq!(x, vec!["2025-05-18", "2025-05-19", "2025-05-20"]);
        assert_eq!(series[0].values, vec![2, 3, 2]);
        assert_eq!(series[1].name, "google");
        assert_eq!(series[1].values, vec![2, 0, 0]);
    }

    #[test]
    fn comparison_lists_total_then_variants() {
        let rows = variant_comparison(&records(), Dimension::Source);
        let ChartBody::Comparison { groups } = comparison(&rows) else {
            panic!("expected a comparison");
        };
        let google = &groups[0];
        assert_eq!(google.name, "google");
        let values: Vec<usize> = google.bars.iter().map(|b| b.value).collect();
        assert_eq!(values, vec![2, 1, 1, 0]);
        let shares: Vec<f64> = google.bars.iter().map(|b| b.percentage).collect();
        assert_eq!(shares, vec![100.0, 50.0, 50.0, 0.0]);
        assert_eq!(google.effect.map(|e| e.better), Some(PageVariant::A));

        let naver = groups.iter().find(|g| g.name == "naver").unwrap();
        assert!(naver.effect.is_none());
    }

    #[test]
    fn chart_serializes_with_kind_tag() {
        let chart = Chart::new(
            "Sources",
            Theme::Dark,
            distribution(&shares_of(&records(), Dimension::Source), Dimension::Source),
        );
        let value = serde_json::to_value(&chart).unwrap();
        assert_eq!(value["kind"], "distribution");
        assert_eq!(value["style"]["theme"], "dark");
        assert_eq!(value["slices"][0]["name"], "google");
    }
}
