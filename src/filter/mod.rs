//! Identifier column resolution and the set-membership row filter.

use crate::error::{ColumnContext, Result, ToolError};
use crate::model::{CellValue, ReferenceSet, Table, normalize_key};

/// Finds every column of `table` whose name matches `wanted` once both are
/// trimmed and case-folded.
///
/// Source exports drift in header capitalisation, so `SKU Code` and
/// `sku code` from different sheets are both identifier columns. Fails with
/// [`ToolError::MissingColumn`] listing the table's columns verbatim.
pub fn resolve_identifier(
    table: &Table,
    wanted: &str,
    context: ColumnContext,
) -> Result<Vec<usize>> {
    let positions = table.columns().resolve_folded(wanted);
    if positions.is_empty() {
        return Err(ToolError::MissingColumn {
            column: wanted.to_string(),
            context,
            available: table.column_names().to_vec(),
        });
    }
    Ok(positions)
}

/// First non-empty cell among the identifier columns of a row.
pub fn identifier_cell<'a>(row: &'a [CellValue], positions: &[usize]) -> Option<&'a CellValue> {
    positions
        .iter()
        .filter_map(|position| row.get(*position))
        .find(|cell| !cell.is_empty())
}

/// Keeps the rows whose normalized identifier belongs to `reference`,
/// preserving their order.
pub fn filter_rows(table: &Table, identifier_column: &str, reference: &ReferenceSet) -> Result<Table> {
    let positions = resolve_identifier(table, identifier_column, ColumnContext::Data)?;
    Ok(table.retain_rows(|row| {
        identifier_cell(row, &positions)
            .map(|cell| reference.contains(&normalize_key(cell)))
            .unwrap_or(false)
    }))
}
