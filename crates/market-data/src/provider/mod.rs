//! Concrete fetchers.
//!
//! - [`vci`]: Vietcap chart API, the primary source for Vietnamese listings
//! - [`yahoo`]: Yahoo Finance with an exchange suffix, the usual secondary
//! - [`csv_file`]: local CSV exports, an offline secondary

pub mod csv_file;
pub mod vci;
pub mod yahoo;

pub use csv_file::{CsvConfig, CsvFetcher};
pub use vci::{VciConfig, VciFetcher};
pub use yahoo::{YahooConfig, YahooFetcher};
