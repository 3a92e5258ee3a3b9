use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDateTime;
use clap::ValueEnum;

use crate::filter::{filter_records, RecordFilter};
use crate::models::{Field, LeadRecord};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Comparable form of a cell. Kinds order as time < number < text.
#[derive(Debug, Clone, PartialEq)]
enum SortValue {
    Time(NaiveDateTime),
    Number(f64),
    Text { folded: String, raw: String },
}

impl SortValue {
    fn of(record: &LeadRecord, column: &str) -> Option<SortValue> {
        // An unparseable submit time counts as absent.
        if Field::from_key(column) == Some(Field::SubmitAt) {
            return record.submitted_at.map(SortValue::Time);
        }
        let text = record.get(column)?;
        if let Ok(number) = text.parse::<f64>() {
            if number.is_finite() {
                return Some(SortValue::Number(number));
            }
        }
        Some(SortValue::Text {
            folded: text.to_lowercase(),
            raw: text.into_owned(),
        })
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Time(_) => 0,
            SortValue::Number(_) => 1,
            SortValue::Text { .. } => 2,
        }
    }

    fn total_cmp(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (
                SortValue::Text { folded: a, raw: ra },
                SortValue::Text { folded: b, raw: rb },
            ) => a.cmp(b).then_with(|| ra.cmp(rb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Stable sort by `column`. Absent values go last in either direction.
pub fn sort_records(records: &mut [LeadRecord], column: &str, direction: SortDirection) {
    let mut keyed: Vec<(Option<SortValue>, LeadRecord)> = records
        .iter()
        .map(|record| (SortValue::of(record, column), record.clone()))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match direction {
            SortDirection::Asc => a.total_cmp(b),
            SortDirection::Desc => b.total_cmp(a),
        },
    });

    for (slot, (_, record)) in records.iter_mut().zip(keyed) {
        *slot = record;
    }
}

pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1))
}

/// Items of 1-based `page`. Past the end is an empty slice; page 0 is
/// treated as page 1.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let size = page_size.max(1);
    let start = page.max(1).saturating_sub(1).saturating_mul(size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(size).min(items.len());
    &items[start..end]
}

#[derive(Debug, Clone)]
pub struct TableView {
    pub rows: Vec<LeadRecord>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Table parameters over one loaded record set.
///
/// Changing anything that reshapes the result (search, sort, page size,
/// the records themselves) sends the view back to page 1.
#[derive(Debug, Clone)]
pub struct TableState {
    records: Arc<Vec<LeadRecord>>,
    search: String,
    sort_column: String,
    direction: SortDirection,
    page_size: usize,
    page: usize,
}

impl TableState {
    pub fn new(records: Arc<Vec<LeadRecord>>) -> Self {
        Self {
            records,
            search: String::new(),
            sort_column: Field::SubmitAt.key().to_string(),
            direction: SortDirection::Desc,
            page_size: DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn sort(&self) -> (&str, SortDirection) {
        (&self.sort_column, self.direction)
    }

    pub fn replace_records(&mut self, records: Arc<Vec<LeadRecord>>) {
        self.records = records;
        self.page = 1;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.page = 1;
    }

    pub fn set_sort(&mut self, column: impl Into<String>, direction: SortDirection) {
        self.sort_column = column.into();
        self.direction = direction;
        self.page = 1;
    }

    /// Header click: the current column flips direction, a new column
    /// starts descending.
    pub fn toggle_sort(&mut self, column: &str) {
        if column == self.sort_column {
            self.direction = self.direction.flipped();
        } else {
            self.sort_column = column.to_string();
            self.direction = SortDirection::Desc;
        }
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// Search, sort and slice the records for the current page.
    pub fn view(&self) -> TableView {
        let filter = RecordFilter {
            text: Some(self.search.clone()),
            window: None,
        };
        let mut rows = filter_records(&self.records, &filter);
        sort_records(&mut rows, &self.sort_column, self.direction);

        TableView {
            total_items: rows.len(),
            total_pages: total_pages(rows.len(), self.page_size),
            rows: paginate(&rows, self.page, self.page_size).to_vec(),
            page: self.page,
            page_size: self.page_size,
        }
    }
}
