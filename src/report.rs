use std::fmt::Write;

use crate::aggregate::{
    self, summarize, time_distribution, top_n, variant_comparison, Share, TimeUnit,
    VariantBreakdown, TOP_COMPARISON, TOP_CONTENT,
};
use crate::chart::display_value;
use crate::filter::DateWindow;
use crate::models::{Dimension, LeadRecord, PageVariant};

/// Headline labels longer than this are cut.
pub const LABEL_WIDTH: usize = 15;
const RECENT_SUBMISSIONS: usize = 5;

/// Long category names are cut for the headline figures.
pub fn truncate_label(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return label.to_string();
    }
    let cut: String = label.chars().take(width).collect();
    format!("{cut}...")
}

fn write_shares(output: &mut String, shares: &[Share], dimension: Dimension) {
    if shares.is_empty() {
        let _ = writeln!(output, "No leads in this period.");
        return;
    }
    for share in shares {
        let _ = writeln!(
            output,
            "- {}: {} leads ({:.1}%)",
            display_value(Some(dimension), &share.value),
            share.count,
            share.percentage
        );
    }
}

fn write_comparison(output: &mut String, rows: &[VariantBreakdown]) {
    if rows.is_empty() {
        let _ = writeln!(output, "No leads in this period.");
        return;
    }
    let _ = writeln!(
        output,
        "| Name | Total | Variant A | Variant B | Default page | Variant effect |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for row in rows {
        let cells: Vec<String> = PageVariant::ALL
            .into_iter()
            .map(|variant| format!("{} ({:.1}%)", row.count(variant), row.share(variant)))
            .collect();
        let effect = match row.effect() {
            Some(effect) if effect.improvement > 0.0 => format!(
                "{} +{:.1}%",
                effect.better.label(),
                effect.improvement
            ),
            Some(_) => "even".to_string(),
            None => "-".to_string(),
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            row.name,
            row.total,
            cells.join(" | "),
            effect
        );
    }
}

/// Markdown analytics report over `records`, which are already filtered to
/// the reported period.
pub fn build_report(records: &[LeadRecord], period: &str, window: Option<DateWindow>) -> String {
    let summary = summarize(records);
    let mut output = String::new();

    let _ = writeln!(output, "# Lead Analytics Report");
    match window {
        Some(window) => {
            let _ = writeln!(
                output,
                "Generated for {} ({} to {})",
                period,
                window.start.date(),
                window.end.date()
            );
        }
        None => {
            let _ = writeln!(output, "Generated for {}", period);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    if records.is_empty() {
        let _ = writeln!(output, "No leads in this period.");
        return output;
    }

    let _ = writeln!(output, "- Total leads: {}", summary.total);
    match summary.latest_submission {
        Some(at) => {
            let _ = writeln!(output, "- Latest submission: {}", at.format("%Y-%m-%d %H:%M"));
        }
        None => {
            let _ = writeln!(output, "- Latest submission: unknown");
        }
    }
    for (dimension, share) in &summary.leaders {
        let _ = writeln!(
            output,
            "- Top {}: {} ({} leads, {:.1}%)",
            dimension.title().to_lowercase(),
            truncate_label(&share.value, LABEL_WIDTH),
            share.count,
            share.percentage
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sources");
    write_shares(
        &mut output,
        &aggregate::distribution(records, Dimension::Source),
        Dimension::Source,
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Mediums");
    write_shares(
        &mut output,
        &aggregate::distribution(records, Dimension::Medium),
        Dimension::Medium,
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Content");
    write_shares(
        &mut output,
        &top_n(aggregate::distribution(records, Dimension::Content), TOP_CONTENT),
        Dimension::Content,
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Campaigns by Page Variant");
    write_comparison(
        &mut output,
        &top_n(variant_comparison(records, Dimension::Campaign), TOP_COMPARISON),
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Page Variants");
    write_shares(
        &mut output,
        &aggregate::distribution(records, Dimension::Variant),
        Dimension::Variant,
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses by Page Variant");
    write_comparison(
        &mut output,
        &top_n(variant_comparison(records, Dimension::Course), TOP_COMPARISON),
    );

    let hours = time_distribution(records, TimeUnit::Hour, None);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Submissions by Hour");
    let busy: Vec<_> = hours.buckets.iter().filter(|b| b.total > 0).collect();
    if busy.is_empty() {
        let _ = writeln!(output, "No dated submissions in this period.");
    } else {
        for bucket in busy {
            let _ = writeln!(
                output,
                "- {}: {}",
                hours.unit.label(bucket.bucket),
                bucket.total
            );
        }
    }
    if hours.undated > 0 {
        let _ = writeln!(output, "- without a submit time: {}", hours.undated);
    }

    let mut recent: Vec<&LeadRecord> = records
        .iter()
        .filter(|r| r.submitted_at.is_some())
        .collect();
    recent.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Submissions");
    if recent.is_empty() {
        let _ = writeln!(output, "No dated submissions in this period.");
    } else {
        for record in recent.iter().take(RECENT_SUBMISSIONS) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) on {}",
                record.name.as_deref().unwrap_or("(no name)"),
                record.category(Dimension::Source),
                record.category(Dimension::Course),
                record
                    .submitted_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default()
            );
        }
    }

    output
}
