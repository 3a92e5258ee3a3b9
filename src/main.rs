use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_insights::aggregate::{
    self, daily_trend, group_by, summarize, time_distribution, top_n, variant_comparison,
    TimeUnit, TOP_COMPARISON, TOP_CONTENT, TOP_TREND_SOURCES,
};
use lead_insights::chart::{self, Chart, ChartBody};
use lead_insights::config::{Config, Overrides};
use lead_insights::export;
use lead_insights::filter::{filter_records, DatePreset, DateWindow, RecordFilter};
use lead_insights::models::{Dimension, Field, LeadRecord};
use lead_insights::report::{self, truncate_label};
use lead_insights::source::{
    self, DataSource, FetchOptions, LoadOutcome, SheetClient, SourceMode,
};
use lead_insights::table::{SortDirection, TableState};
use lead_insights::theme::{Theme, ThemeService};

const TABLE_COLUMNS: [Field; 7] = [
    Field::SubmitAt,
    Field::Name,
    Field::Email,
    Field::UtmSource,
    Field::UtmCampaign,
    Field::PageVariant,
    Field::CourseName,
];

#[derive(Parser)]
#[command(name = "lead-insights")]
#[command(about = "Marketing lead analytics over a sheet-backed lead API", long_about = None)]
struct Cli {
    /// TOML config file (default: ./lead-insights.toml when present)
    #[arg(long, global = true, env = "LEAD_INSIGHTS_CONFIG")]
    config: Option<PathBuf>,
    /// Base URL of the sheet API
    #[arg(long, global = true, env = "LEAD_INSIGHTS_API_URL")]
    api_url: Option<String>,
    /// Local JSON snapshot of lead records
    #[arg(long, global = true, env = "LEAD_INSIGHTS_SNAPSHOT")]
    snapshot: Option<PathBuf>,
    /// Load live data from the sheet API instead of the snapshot
    #[arg(long, global = true)]
    live: bool,
    #[arg(long, global = true, value_enum)]
    theme: Option<Theme>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one page of the lead table
    Table {
        #[arg(long)]
        search: Option<String>,
        /// Column key to sort by; without --direction this toggles like a header click
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, value_enum)]
        direction: Option<SortDirection>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Print headline figures
    Summary {
        #[arg(long, value_enum, default_value_t = DatePreset::All)]
        preset: DatePreset,
    },
    /// Print a chart projection as JSON
    Chart {
        #[arg(value_enum)]
        kind: ChartKind,
        #[arg(long, value_enum, default_value_t = TimeUnit::Hour)]
        unit: TimeUnit,
        /// Category split for the time chart
        #[arg(long, value_enum)]
        category: Option<Dimension>,
        #[arg(long, value_enum, default_value_t = DatePreset::All)]
        preset: DatePreset,
    },
    /// Export leads as CSV
    Export {
        /// Output file (default: lead_data_<today>.csv)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, value_enum, default_value_t = DatePreset::All)]
        preset: DatePreset,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Fetch live data now and save it as the snapshot
    Fetch {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long, value_enum)]
        sort_order: Option<SortDirection>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ChartKind {
    Sources,
    Mediums,
    Content,
    Campaigns,
    Variants,
    Courses,
    Trend,
    Time,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_insights=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn in_period(records: &[LeadRecord], window: Option<DateWindow>) -> Vec<LeadRecord> {
    filter_records(records, &RecordFilter { text: None, window })
}

fn window_for(preset: DatePreset) -> Option<DateWindow> {
    preset.window(chrono::Local::now().naive_local())
}

fn build_chart(
    records: &[LeadRecord],
    kind: ChartKind,
    unit: TimeUnit,
    category: Option<Dimension>,
) -> (String, ChartBody) {
    match kind {
        ChartKind::Sources => (
            "Leads by source".to_string(),
            chart::distribution(
                &aggregate::distribution(records, Dimension::Source),
                Dimension::Source,
            ),
        ),
        ChartKind::Mediums => (
            "Leads by medium".to_string(),
            chart::distribution(
                &aggregate::distribution(records, Dimension::Medium),
                Dimension::Medium,
            ),
        ),
        ChartKind::Content => (
            format!("Top {TOP_CONTENT} content"),
            chart::distribution(
                &top_n(aggregate::distribution(records, Dimension::Content), TOP_CONTENT),
                Dimension::Content,
            ),
        ),
        ChartKind::Variants => (
            "Leads by page variant".to_string(),
            chart::distribution(
                &aggregate::distribution(records, Dimension::Variant),
                Dimension::Variant,
            ),
        ),
        ChartKind::Campaigns => (
            "Campaigns by page variant".to_string(),
            chart::comparison(&top_n(
                variant_comparison(records, Dimension::Campaign),
                TOP_COMPARISON,
            )),
        ),
        ChartKind::Courses => (
            "Courses by page variant".to_string(),
            chart::comparison(&top_n(
                variant_comparison(records, Dimension::Course),
                TOP_COMPARISON,
            )),
        ),
        ChartKind::Trend => (
            "Daily submissions".to_string(),
            chart::trend_series(
                &daily_trend(records),
                &top_n(group_by(records, Dimension::Source), TOP_TREND_SOURCES),
            ),
        ),
        ChartKind::Time => {
            let title = match category {
                Some(dimension) => format!(
                    "Submissions by time and {}",
                    dimension.title().to_lowercase()
                ),
                None => "Submissions by time".to_string(),
            };
            (title, chart::time_series(&time_distribution(records, unit, category)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let Cli {
        config,
        api_url,
        snapshot,
        live,
        theme,
        command,
    } = Cli::parse();

    let page_size = match &command {
        Commands::Table { page_size, .. } => *page_size,
        _ => None,
    };
    let config = Config::load(
        config.as_deref(),
        Overrides {
            api_url,
            snapshot,
            page_size,
            theme,
        },
    )
    .context("failed to load configuration")?;

    let themes = ThemeService::new(config.theme);
    let snapshot = source::load_snapshot(&config.snapshot)
        .with_context(|| format!("failed to load snapshot {}", config.snapshot.display()))?;
    let mut data = DataSource::new(snapshot);
    let mut pending: Option<JoinHandle<()>> = None;

    let fetch_options = match &command {
        Commands::Fetch {
            limit,
            offset,
            sort_by,
            sort_order,
        } => Some(FetchOptions {
            limit: *limit,
            offset: *offset,
            sort_by: sort_by.clone(),
            sort_order: *sort_order,
        }),
        _ => None,
    };

    if live || fetch_options.is_some() {
        let client = SheetClient::new(&config.api_url, config.timeout)
            .context("failed to build HTTP client")?;
        let outcome = match fetch_options {
            Some(options) => {
                data = data.with_options(options);
                data.refresh_live(&client).await
            }
            None => data.load_live(&client).await,
        };
        if let LoadOutcome::Fetched { records, persist } = outcome {
            tracing::info!(records, "showing live data");
            pending = Some(persist);
        }
        if let Some(err) = data.last_error() {
            let showing = match data.mode() {
                SourceMode::Live => "last live",
                SourceMode::Snapshot => "snapshot",
            };
            eprintln!("Could not load live data: {err}. Showing {showing} data.");
        }
    }

    let records = data.active();

    match command {
        Commands::Table {
            search,
            sort,
            direction,
            page,
            ..
        } => {
            let mut state = TableState::new(Arc::clone(&records));
            state.set_page_size(config.page_size);
            if let Some(search) = search {
                state.set_search(search);
            }
            match (sort, direction) {
                (Some(column), Some(direction)) => state.set_sort(column, direction),
                (Some(column), None) => state.toggle_sort(&column),
                (None, Some(direction)) => state.set_sort(Field::SubmitAt.key(), direction),
                (None, None) => {}
            }
            state.set_page(page);

            let view = state.view();
            if view.total_items == 0 {
                println!("No leads match.");
            } else {
                let (column, direction) = state.sort();
                println!(
                    "Page {} of {} ({} leads, sorted by {} {:?})",
                    view.page, view.total_pages, view.total_items, column, direction
                );
                let header: Vec<&str> = TABLE_COLUMNS.iter().map(|f| f.key()).collect();
                println!("id | {}", header.join(" | "));
                let offset = (view.page - 1) * view.page_size;
                for (index, record) in view.rows.iter().enumerate() {
                    let cells: Vec<&str> = TABLE_COLUMNS
                        .iter()
                        .map(|field| record.field(*field).unwrap_or("-"))
                        .collect();
                    println!("{} | {}", record.identity(offset + index), cells.join(" | "));
                }
            }
        }
        Commands::Summary { preset } => {
            let records = in_period(&records, window_for(preset));
            let summary = summarize(&records);
            if summary.total == 0 {
                println!("No leads for {}.", preset.label());
            } else {
                println!("Leads for {}: {}", preset.label(), summary.total);
                if let Some(latest) = summary.latest_submission {
                    println!("Latest submission: {}", latest.format("%Y-%m-%d %H:%M"));
                }
                for (dimension, share) in &summary.leaders {
                    println!(
                        "Top {}: {} ({} leads, {:.1}%)",
                        dimension.title().to_lowercase(),
                        truncate_label(&share.value, report::LABEL_WIDTH),
                        share.count,
                        share.percentage
                    );
                }
            }
        }
        Commands::Chart {
            kind,
            unit,
            category,
            preset,
        } => {
            let records = in_period(&records, window_for(preset));
            let (title, body) = build_chart(&records, kind, unit, category);
            if body.is_empty() {
                eprintln!("No data to chart for {}.", preset.label());
            }
            let chart = Chart::new(title, themes.get(), body);
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
        Commands::Export { out, search } => {
            let filter = RecordFilter {
                text: search,
                window: None,
            };
            let rows = filter_records(&records, &filter);
            let out = out.unwrap_or_else(|| {
                PathBuf::from(export::default_file_name(chrono::Local::now().date_naive()))
            });
            let written = export::write_csv_file(&out, &rows)
                .with_context(|| format!("failed to export {}", out.display()))?;
            println!("Exported {written} leads to {}.", out.display());
        }
        Commands::Report { preset, out } => {
            let window = window_for(preset);
            let records = in_period(&records, window);
            let report = report::build_report(&records, preset.label(), window);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Fetch { .. } => match data.mode() {
            SourceMode::Live if data.last_error().is_none() => {
                println!("Fetched {} leads from {}.", records.len(), config.api_url);
            }
            _ => anyhow::bail!("live fetch from {} failed", config.api_url),
        },
    }

    if let Some(persist) = pending {
        if let Err(err) = persist.await {
            tracing::warn!(error = %err, "snapshot write-back task did not finish");
        }
    }

    Ok(())
}
