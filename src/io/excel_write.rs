use std::ops::Range;

use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, Worksheet};
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::model::{CellValue, Table};

/// Rows an Excel worksheet can hold, header included.
pub const EXCEL_MAX_ROWS: usize = 1_048_576;
/// Default data rows per output sheet before clamping to the sheet capacity.
pub const DEFAULT_MAX_ROWS_PER_SHEET: usize = EXCEL_MAX_ROWS;

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// A serialised workbook together with the data rows written per sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenWorkbook {
    pub bytes: Vec<u8>,
    pub sheet_rows: Vec<usize>,
}

/// Name of the `index`-th (zero based) output sheet.
pub fn sheet_name(index: usize) -> String {
    format!("Sheet{}", index + 1)
}

/// Validates a rows-per-sheet limit and clamps it so a sheet plus its header
/// row fits in a worksheet.
pub fn effective_limit(max_rows_per_sheet: usize) -> Result<usize> {
    if max_rows_per_sheet == 0 {
        return Err(ToolError::InvalidSheetLimit(max_rows_per_sheet));
    }
    let capacity = EXCEL_MAX_ROWS - 1;
    if max_rows_per_sheet > capacity {
        debug!(
            requested = max_rows_per_sheet,
            capacity, "clamping rows per sheet to worksheet capacity"
        );
        return Ok(capacity);
    }
    Ok(max_rows_per_sheet)
}

/// Splits `total_rows` into consecutive chunks of at most `limit` rows.
///
/// Zero rows still produce a single empty chunk so the output always has a
/// `Sheet1` carrying the header.
pub fn sheet_ranges(total_rows: usize, limit: usize) -> Vec<Range<usize>> {
    if total_rows == 0 {
        return vec![0..0];
    }
    (0..total_rows.div_ceil(limit))
        .map(|index| {
            let start = index * limit;
            start..(start + limit).min(total_rows)
        })
        .collect()
}

/// Writes the table into a workbook, one sheet per chunk of at most
/// `max_rows_per_sheet` data rows.
pub fn write_workbook(table: &Table, max_rows_per_sheet: usize) -> Result<WrittenWorkbook> {
    let limit = effective_limit(max_rows_per_sheet)?;
    let mut workbook = Workbook::new();

    // A fixed creation time keeps the output byte-for-byte reproducible.
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);
    let mut sheet_rows = Vec::new();

    for (index, range) in sheet_ranges(table.row_count(), limit).into_iter().enumerate() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name(index))?;
        let rows = table.slice(range);
        write_sheet(worksheet, table.column_names(), rows, &datetime_format)?;
        sheet_rows.push(rows.len());
    }

    let bytes = workbook.save_to_buffer()?;
    Ok(WrittenWorkbook { bytes, sheet_rows })
}

fn write_sheet(
    worksheet: &mut Worksheet,
    columns: &[String],
    rows: &[Vec<CellValue>],
    datetime_format: &Format,
) -> Result<()> {
    for (col_idx, header) in columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            let excel_col = col_idx as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(value) => {
                    worksheet.write_string(excel_row, excel_col, value)?;
                }
                CellValue::Number(value) => {
                    worksheet.write_number(excel_row, excel_col, *value)?;
                }
                CellValue::Bool(value) => {
                    worksheet.write_boolean(excel_row, excel_col, *value)?;
                }
                CellValue::DateTime { serial, .. } => {
                    worksheet.write_number_with_format(
                        excel_row,
                        excel_col,
                        *serial,
                        datetime_format,
                    )?;
                }
            }
        }
    }

    if !columns.is_empty() {
        let last_col = (columns.len() - 1) as u16;
        worksheet.autofilter(0, 0, rows.len() as u32, last_col)?;
        worksheet.set_freeze_panes(1, 0)?;
    }
    Ok(())
}
