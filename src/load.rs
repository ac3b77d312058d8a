//! Loading stage: turns source inputs into one unified table and the
//! reference workbook into a [`ReferenceSet`].

use tracing::{debug, info, instrument};

use crate::error::{ColumnContext, Result, ToolError};
use crate::filter::{identifier_cell, resolve_identifier};
use crate::io::archive::{SkippedEntry, read_archive};
use crate::io::excel_read::read_workbook;
use crate::io::source::{InputKind, SourceInput, detect_kind};
use crate::model::{FILE_COLUMN, ReferenceSet, SHEET_COLUMN, Table};

/// Result of loading every source input.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSources {
    /// All sheets concatenated with column-union semantics.
    pub table: Table,
    /// Number of sheets that contributed to `table`.
    pub tables_loaded: usize,
    /// Archive entries that were skipped because they could not be read.
    pub skipped: Vec<SkippedEntry>,
}

/// Loads every sheet of every source and concatenates them.
///
/// Corrupt workbooks inside an archive are skipped; a corrupt workbook given
/// directly aborts the load. Fails with [`ToolError::NoData`] when no sheet
/// could be loaded at all.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub fn load_sources(sources: &[SourceInput]) -> Result<LoadedSources> {
    let mut tables = Vec::new();
    let mut skipped = Vec::new();

    for source in sources {
        let bytes = source.read_bytes()?;
        let loaded = match detect_kind(source.origin(), &bytes)? {
            InputKind::Workbook(kind) => read_workbook(bytes, kind, source.origin())?,
            InputKind::Archive => read_archive(bytes, source.origin(), &mut skipped)?,
        };
        debug!(origin = source.origin(), sheets = loaded.len(), "loaded source");
        tables.extend(loaded);
    }

    if tables.is_empty() {
        return Err(ToolError::NoData);
    }

    let tables_loaded = tables.len();
    let table = Table::concat(tables);
    info!(
        tables = tables_loaded,
        rows = table.row_count(),
        columns = table.columns().len(),
        skipped = skipped.len(),
        "unified source tables"
    );
    Ok(LoadedSources {
        table,
        tables_loaded,
        skipped,
    })
}

/// Loads the reference workbook and collects the normalized values of
/// `column` across all of its sheets.
#[instrument(level = "info", skip_all, fields(origin = %reference.origin(), column = %column))]
pub fn load_reference(reference: &SourceInput, column: &str) -> Result<ReferenceSet> {
    let bytes = reference.read_bytes()?;
    let kind = match detect_kind(reference.origin(), &bytes)? {
        InputKind::Workbook(kind) => kind,
        InputKind::Archive => {
            return Err(ToolError::UnsupportedFormat {
                input: reference.origin().to_string(),
                reason: "the SKU list must be a single Excel workbook, not an archive".to_string(),
            });
        }
    };

    let table = Table::concat(read_workbook(bytes, kind, reference.origin())?);
    let positions = resolve_identifier(&table, column, ColumnContext::Reference).map_err(
        |error| match error {
            ToolError::MissingColumn {
                column,
                context,
                available,
            } => ToolError::MissingColumn {
                column,
                context,
                available: available
                    .into_iter()
                    .filter(|name| name != FILE_COLUMN && name != SHEET_COLUMN)
                    .collect(),
            },
            other => other,
        },
    )?;

    let set = ReferenceSet::from_cells(
        table
            .rows()
            .iter()
            .filter_map(|row| identifier_cell(row, &positions)),
    );
    if set.is_empty() {
        return Err(ToolError::EmptyReference {
            column: column.to_string(),
        });
    }

    info!(values = set.len(), "loaded reference set");
    Ok(set)
}
