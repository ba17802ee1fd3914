//! # RumenKernel IO
//!
//! Collaborators around the analysis core:
//!
//! - wide and narrow spreadsheet (CSV) ingestion
//! - row-oriented CSV and column-major JSON export of result records
//! - output-ID scraping
//!
//! The analysis kernels never touch the filesystem; everything that reads or
//! writes files lives here and takes its paths from the caller.

#![warn(missing_docs)]

pub mod error;
pub mod export;
pub mod ids;
pub mod ingest;
pub mod timestamp;

pub use error::{IngestError, Result};
pub use export::{
    cosinor_table, curve_table, diagnostics_table, drink_table, read_cosinor_path, series_table,
    ReportWriter, Table,
};
pub use ids::{scrape_ids, OutputId, DEFAULT_PREFIX_LEN};
pub use ingest::{load_narrow_sources, read_narrow_path, read_wide_path, IngestStats, SourceSet};
