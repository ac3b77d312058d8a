#![allow(dead_code)]

use std::io::{Cursor, Write};

use calamine::{Reader, Xlsx};
use calamine::DataType;
use rust_xlsxwriter::{Format, Workbook};
use zip::ZipWriter;
use zip::write::FileOptions;

/// Cell used when building fixture workbooks.
pub enum Fx<'a> {
    S(&'a str),
    N(f64),
    /// Excel date serial written with a date number format.
    D(f64),
    E,
}

pub type Sheet<'a> = (&'a str, Vec<Vec<Fx<'a>>>);

/// Builds an `.xlsx` workbook in memory. The first row of each sheet is
/// the header.
pub fn workbook(sheets: &[Sheet<'_>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).expect("sheet name");
        for (row_idx, row) in rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let (row_idx, col_idx) = (row_idx as u32, col_idx as u16);
                match cell {
                    Fx::S(value) => {
                        worksheet
                            .write_string(row_idx, col_idx, *value)
                            .expect("string cell");
                    }
                    Fx::N(value) => {
                        worksheet
                            .write_number(row_idx, col_idx, *value)
                            .expect("number cell");
                    }
                    Fx::D(serial) => {
                        worksheet
                            .write_number_with_format(row_idx, col_idx, *serial, &date_format)
                            .expect("date cell");
                    }
                    Fx::E => {}
                }
            }
        }
    }
    workbook.save_to_buffer().expect("workbook serialised")
}

/// Builds a reference workbook with a single `SKU Code` column.
pub fn sku_list(values: &[&str]) -> Vec<u8> {
    let mut rows = vec![vec![Fx::S("SKU Code")]];
    rows.extend(values.iter().map(|value| vec![Fx::S(value)]));
    workbook(&[("Sheet1", rows)])
}

/// Packs the given entries into a zip archive.
pub fn archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, FileOptions::<()>::default())
            .expect("zip entry started");
        writer.write_all(contents).expect("zip entry written");
    }
    writer.finish().expect("zip finished").into_inner()
}

/// Reads a workbook back as `(sheet name, rows of rendered cells)`,
/// header row included.
pub fn read_back(bytes: &[u8]) -> Vec<(String, Vec<Vec<String>>)> {
    read_cells(bytes)
        .into_iter()
        .map(|(name, rows)| {
            let rows = rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect();
            (name, rows)
        })
        .collect()
}

/// Reads a workbook back keeping calamine's typed cells.
pub fn read_cells(bytes: &[u8]) -> Vec<(String, Vec<Vec<DataType>>)> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec())).expect("workbook opened");
    let names = workbook.sheet_names().to_owned();
    names
        .into_iter()
        .map(|name| {
            let range = workbook
                .worksheet_range(&name)
                .expect("sheet present")
                .expect("sheet parsed");
            let rows = range.rows().map(|row| row.to_vec()).collect();
            (name, rows)
        })
        .collect()
}
