use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::filter::filter_rows;
use crate::io::archive::SkippedEntry;
use crate::io::excel_write::{DEFAULT_MAX_ROWS_PER_SHEET, write_workbook};
use crate::io::source::SourceInput;
use crate::load::{load_reference, load_sources};

/// Column holding the identifier in both the data and the SKU list.
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "SKU Code";

/// Knobs for a single filter invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Identifier column in the source sheets.
    pub identifier_column: String,
    /// Identifier column in the reference workbook.
    pub reference_column: String,
    /// Data rows per output sheet, clamped to the worksheet capacity.
    pub max_rows_per_sheet: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            reference_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            max_rows_per_sheet: DEFAULT_MAX_ROWS_PER_SHEET,
        }
    }
}

/// Counts describing what a filter invocation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub reference_values: usize,
    pub tables_loaded: usize,
    pub unified_rows: usize,
    pub filtered_rows: usize,
    /// Data rows written to each output sheet; empty when nothing matched.
    pub sheet_rows: Vec<usize>,
    pub skipped: Vec<SkippedEntry>,
}

/// Outcome of [`filter`]. An empty match is a notice, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// The serialised result workbook.
    Workbook { bytes: Vec<u8>, report: FilterReport },
    /// Loading and filtering succeeded but no row matched the SKU list.
    NoMatches { report: FilterReport },
}

impl FilterOutcome {
    pub fn report(&self) -> &FilterReport {
        match self {
            FilterOutcome::Workbook { report, .. } | FilterOutcome::NoMatches { report } => report,
        }
    }
}

/// Outcome of [`filter_to_path`].
#[derive(Debug, Clone, PartialEq)]
pub enum SavedOutcome {
    Written { path: PathBuf, report: FilterReport },
    NoMatches { report: FilterReport },
}

impl SavedOutcome {
    pub fn report(&self) -> &FilterReport {
        match self {
            SavedOutcome::Written { report, .. } | SavedOutcome::NoMatches { report } => report,
        }
    }
}

/// Loads the sources and the SKU list, keeps the rows whose identifier is
/// listed, and renders them into a workbook.
#[instrument(
    level = "info",
    skip_all,
    fields(
        sources = sources.len(),
        reference = %reference.origin(),
        identifier = %options.identifier_column
    )
)]
pub fn filter(
    sources: &[SourceInput],
    reference: &SourceInput,
    options: &FilterOptions,
) -> Result<FilterOutcome> {
    let reference_set = load_reference(reference, &options.reference_column)?;
    let loaded = load_sources(sources)?;
    let filtered = filter_rows(&loaded.table, &options.identifier_column, &reference_set)?;

    info!(
        reference_values = reference_set.len(),
        unified_rows = loaded.table.row_count(),
        filtered_rows = filtered.row_count(),
        "applied SKU filter"
    );

    let mut report = FilterReport {
        reference_values: reference_set.len(),
        tables_loaded: loaded.tables_loaded,
        unified_rows: loaded.table.row_count(),
        filtered_rows: filtered.row_count(),
        sheet_rows: Vec::new(),
        skipped: loaded.skipped,
    };

    if filtered.is_empty() {
        info!("no matching rows found");
        return Ok(FilterOutcome::NoMatches { report });
    }

    let written = write_workbook(&filtered, options.max_rows_per_sheet)?;
    info!(sheets = written.sheet_rows.len(), "rendered result workbook");
    report.sheet_rows = written.sheet_rows;
    Ok(FilterOutcome::Workbook {
        bytes: written.bytes,
        report,
    })
}

/// Runs [`filter`] and saves the workbook to `output`.
///
/// Nothing is written when no rows match or when any stage fails. The file
/// is staged under a unique temporary name next to `output` and renamed into
/// place.
#[instrument(level = "info", skip_all, fields(output = %output.display()))]
pub fn filter_to_path(
    sources: &[SourceInput],
    reference: &SourceInput,
    options: &FilterOptions,
    output: &Path,
) -> Result<SavedOutcome> {
    match filter(sources, reference, options)? {
        FilterOutcome::Workbook { bytes, report } => {
            write_atomically(output, &bytes)?;
            Ok(SavedOutcome::Written {
                path: output.to_path_buf(),
                report,
            })
        }
        FilterOutcome::NoMatches { report } => Ok(SavedOutcome::NoMatches { report }),
    }
}

fn write_atomically(output: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result.xlsx".to_string());
    let staging = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    fs::write(&staging, bytes)?;
    if let Err(error) = fs::rename(&staging, output) {
        let _ = fs::remove_file(&staging);
        return Err(error.into());
    }
    Ok(())
}
