use std::io::{Cursor, Read};

use serde::Serialize;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Result, ToolError};
use crate::io::excel_read::read_workbook;
use crate::io::source::{WorkbookKind, base_name, workbook_kind_from_name};
use crate::model::Table;

/// Upper bound on the buffer reserved up front for one archive entry.
const MAX_PREALLOCATED_ENTRY_BYTES: usize = 64 * 1024 * 1024;

/// An archive entry that looked like a workbook but could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub archive: String,
    pub entry: String,
    pub reason: String,
}

/// Loads every workbook inside a zip archive.
///
/// Entries that fail to decompress or parse are logged, recorded in
/// `skipped` and otherwise ignored. Only an archive that cannot be opened at
/// all is an error.
pub fn read_archive(
    bytes: Vec<u8>,
    origin: &str,
    skipped: &mut Vec<SkippedEntry>,
) -> Result<Vec<Table>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|error| ToolError::InvalidArchive {
            input: origin.to_string(),
            reason: error.to_string(),
        })?;

    let mut tables = Vec::new();
    for index in 0..archive.len() {
        let (name, kind, contents) = match read_entry(&mut archive, index) {
            Ok(Some(entry)) => entry,
            Ok(None) => continue,
            Err((entry, reason)) => {
                warn!(archive = origin, %entry, %reason, "skipping unreadable archive entry");
                skipped.push(SkippedEntry {
                    archive: origin.to_string(),
                    entry,
                    reason,
                });
                continue;
            }
        };

        match read_workbook(contents, kind, &base_name(&name)) {
            Ok(mut loaded) => {
                debug!(archive = origin, entry = %name, sheets = loaded.len(), "loaded archive entry");
                tables.append(&mut loaded);
            }
            Err(error) => {
                warn!(archive = origin, entry = %name, %error, "skipping corrupt workbook");
                skipped.push(SkippedEntry {
                    archive: origin.to_string(),
                    entry: name,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(tables)
}

type EntryContents = (String, WorkbookKind, Vec<u8>);

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
) -> std::result::Result<Option<EntryContents>, (String, String)> {
    let mut entry = archive
        .by_index(index)
        .map_err(|error| (format!("#{index}"), error.to_string()))?;
    if entry.is_dir() {
        return Ok(None);
    }

    let name = entry.name().to_string();
    let Some(kind) = workbook_kind_from_name(&name) else {
        debug!(entry = %name, "ignoring non-workbook archive entry");
        return Ok(None);
    };

    let mut contents = Vec::with_capacity(initial_capacity(entry.size()));
    entry
        .read_to_end(&mut contents)
        .map_err(|error| (name.clone(), error.to_string()))?;
    Ok(Some((name, kind, contents)))
}

/// Buffer size to reserve for an entry. The size declared in the archive
/// header is untrusted, so it only ever serves as a capped hint.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared)
        .unwrap_or(usize::MAX)
        .min(MAX_PREALLOCATED_ENTRY_BYTES)
}
