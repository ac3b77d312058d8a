use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{Result, ToolError};

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Where the bytes of an input live.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Content already held in memory, e.g. an uploaded file.
    Bytes(Vec<u8>),
    /// Content on disk, read when the input is loaded.
    Path(PathBuf),
}

/// One workbook or archive handed to the pipeline, together with the name
/// recorded in the `__file__` provenance column.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInput {
    origin: String,
    payload: Payload,
}

impl SourceInput {
    /// Wraps in-memory content. Only the base name of `origin` is kept.
    pub fn from_bytes(origin: impl AsRef<str>, bytes: Vec<u8>) -> Self {
        Self {
            origin: base_name(origin.as_ref()),
            payload: Payload::Bytes(bytes),
        }
    }

    /// Refers to a file on disk; the file name becomes the origin.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let origin = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            origin,
            payload: Payload::Path(path),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns the raw content of the input.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.payload {
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Path(path) => {
                if !path.exists() {
                    return Err(ToolError::MissingInput(path.clone()));
                }
                Ok(fs::read(path)?)
            }
        }
    }
}

/// Workbook container flavours understood by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookKind {
    /// Office Open XML (`.xlsx`, `.xlsm`).
    OpenXml,
    /// Legacy BIFF (`.xls`).
    Legacy,
}

/// What an input turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Workbook(WorkbookKind),
    Archive,
}

/// Maps a file name to a workbook flavour by extension.
pub fn workbook_kind_from_name(name: &str) -> Option<WorkbookKind> {
    match extension(name)?.as_str() {
        "xlsx" | "xlsm" => Some(WorkbookKind::OpenXml),
        "xls" => Some(WorkbookKind::Legacy),
        _ => None,
    }
}

/// Classifies an input by its name, falling back to its leading bytes when
/// the extension is not recognised.
pub fn detect_kind(origin: &str, bytes: &[u8]) -> Result<InputKind> {
    if let Some(kind) = workbook_kind_from_name(origin) {
        return Ok(InputKind::Workbook(kind));
    }
    if extension(origin).as_deref() == Some("zip") {
        return Ok(InputKind::Archive);
    }

    if bytes.starts_with(&OLE_MAGIC) {
        return Ok(InputKind::Workbook(WorkbookKind::Legacy));
    }
    if bytes.starts_with(&ZIP_MAGIC) {
        let is_workbook = match ZipArchive::new(Cursor::new(bytes)) {
            Ok(archive) => archive.index_for_name(WORKBOOK_PART).is_some(),
            Err(_) => false,
        };
        return Ok(if is_workbook {
            InputKind::Workbook(WorkbookKind::OpenXml)
        } else {
            InputKind::Archive
        });
    }

    Err(ToolError::UnsupportedFormat {
        input: origin.to_string(),
        reason: "expected an Excel workbook (.xlsx, .xlsm, .xls) or a .zip archive".to_string(),
    })
}

/// Strips any directory components from an archive entry or upload name.
pub fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .to_string()
}

fn extension(name: &str) -> Option<String> {
    Path::new(&base_name(name))
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}
