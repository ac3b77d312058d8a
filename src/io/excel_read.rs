use std::collections::HashSet;
use std::io::{Cursor, Read, Seek};

use calamine::{DataType, Range, Reader, Xls, Xlsx};
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::io::source::WorkbookKind;
use crate::model::{CellValue, FILE_COLUMN, SHEET_COLUMN, Table};

const DATETIME_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reads every sheet of a workbook into its own [`Table`], tagged with the
/// `__file__` and `__sheet__` provenance columns.
///
/// The first row of a sheet's used range is taken as the header. Sheets
/// without any cells contribute no table.
pub fn read_workbook(bytes: Vec<u8>, kind: WorkbookKind, origin: &str) -> Result<Vec<Table>> {
    let cursor = Cursor::new(bytes);
    let sheets = match kind {
        WorkbookKind::OpenXml => {
            let workbook: Xlsx<_> = Xlsx::new(cursor).map_err(|error| unreadable(origin, error))?;
            read_sheets(workbook, origin)?
        }
        WorkbookKind::Legacy => {
            let workbook: Xls<_> = Xls::new(cursor).map_err(|error| unreadable(origin, error))?;
            read_sheets(workbook, origin)?
        }
    };

    let mut tables = Vec::with_capacity(sheets.len());
    for (sheet_name, range) in sheets {
        let Some(mut table) = range_to_table(&range) else {
            debug!(origin, sheet = %sheet_name, "skipping empty sheet");
            continue;
        };
        table.add_constant_column(FILE_COLUMN, CellValue::Text(origin.to_string()));
        table.add_constant_column(SHEET_COLUMN, CellValue::Text(sheet_name));
        tables.push(table);
    }
    Ok(tables)
}

fn read_sheets<RS, R>(mut workbook: R, origin: &str) -> Result<Vec<(String, Range<DataType>)>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let names = workbook.sheet_names().to_owned();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let Some(range) = workbook.worksheet_range(&name) else {
            continue;
        };
        let range = range.map_err(|error| unreadable(origin, error))?;
        sheets.push((name, range));
    }
    Ok(sheets)
}

fn unreadable(origin: &str, error: impl std::fmt::Display) -> ToolError {
    ToolError::UnreadableWorkbook {
        input: origin.to_string(),
        reason: error.to_string(),
    }
}

fn range_to_table(range: &Range<DataType>) -> Option<Table> {
    if range.is_empty() {
        return None;
    }
    let mut rows = range.rows();
    let header = rows.next()?;
    let mut table = Table::with_columns(normalize_headers(header));

    for row in rows {
        let cells: Vec<CellValue> = row.iter().map(to_cell_value).collect();
        if cells.iter().all(CellValue::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    Some(table)
}

/// Trims header cells into unique column names. Blank headers become
/// `Unnamed: <index>` and repeats get a `.1`, `.2`, … suffix.
fn normalize_headers(header: &[DataType]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(header.len());

    for (index, cell) in header.iter().enumerate() {
        let rendered = to_cell_value(cell).render();
        let base = match rendered.trim() {
            "" => format!("Unnamed: {index}"),
            trimmed => trimmed.to_string(),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while !seen.insert(name.clone()) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        columns.push(name);
    }
    columns
}

fn to_cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty => CellValue::Empty,
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(serial) => match cell.as_datetime() {
            Some(datetime) => CellValue::DateTime {
                serial: *serial,
                text: datetime.format(DATETIME_TEXT_FORMAT).to_string(),
            },
            None => CellValue::Number(*serial),
        },
        other => CellValue::Text(other.to_string()),
    }
}
