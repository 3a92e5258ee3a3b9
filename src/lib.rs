//! Lead analytics over a spreadsheet-backed lead API.
//!
//! Records flow one way: load (snapshot or live), normalize, filter, then
//! either sort/paginate for the table or aggregate and project for charts,
//! the report and CSV export.

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod report;
pub mod source;
pub mod table;
pub mod theme;

pub use error::{Error, Result};
