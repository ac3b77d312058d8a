//! Core library for the sku-filter command line application.
//!
//! The crate extracts the rows of large spreadsheet exports whose SKU code
//! appears in a reference list. Work flows through three stages: the
//! [`load`] stage reads workbooks and zip archives into one unified
//! [`model::Table`], the [`filter`] stage keeps the rows whose normalized
//! identifier belongs to the [`model::ReferenceSet`], and
//! [`io::excel_write`] splits the result across worksheets. The
//! [`pipeline`] module wires the stages together for callers.

pub mod error;
pub mod filter;
pub mod io;
pub mod load;
pub mod model;
pub mod pipeline;

pub use error::{ColumnContext, Result, ToolError};
pub use io::source::SourceInput;
pub use pipeline::{FilterOptions, FilterOutcome, FilterReport, SavedOutcome, filter, filter_to_path};
