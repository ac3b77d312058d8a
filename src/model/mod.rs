use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Provenance column recording the file a row was loaded from.
pub const FILE_COLUMN: &str = "__file__";
/// Provenance column recording the sheet a row was loaded from.
pub const SHEET_COLUMN: &str = "__sheet__";

/// A single spreadsheet cell as carried through the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Blank or missing cell.
    #[default]
    Empty,
    /// Plain string content.
    Text(String),
    /// Numeric content. Excel stores integers as floats too.
    Number(f64),
    /// Boolean content.
    Bool(bool),
    /// Date or time, kept as the Excel serial plus its rendered text.
    DateTime { serial: f64, text: String },
}

impl CellValue {
    /// Returns `true` for blank cells and whitespace-only text.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the cell the way it would read in a plain-text export.
    ///
    /// Integral numbers drop their fractional part so that `123` typed as a
    /// number and `"123"` typed as text render identically.
    pub fn render(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(value) => value.clone(),
            CellValue::Number(value) => render_number(*value),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::DateTime { text, .. } => text.clone(),
        }
    }
}

fn render_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Normalizes a cell into the key used for identifier membership tests:
/// render to text, trim, then uppercase. Applied identically to the data
/// and the reference side.
pub fn normalize_key(cell: &CellValue) -> String {
    cell.render().trim().to_uppercase()
}

/// Folds a column name for identifier column resolution.
pub fn fold_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Ordered set of unique column names with a name → index lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRegistry {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnRegistry {
    /// Returns the index of `name`, registering it at the end if unknown.
    pub fn register(&mut self, name: &str) -> usize {
        if let Some(position) = self.index.get(name) {
            return *position;
        }
        let position = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), position);
        position
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Indices of every column whose folded name equals the folded `wanted`,
    /// in registry order.
    pub fn resolve_folded(&self, wanted: &str) -> Vec<usize> {
        let wanted = fold_column_name(wanted);
        self.names
            .iter()
            .enumerate()
            .filter(|(_, name)| fold_column_name(name) == wanted)
            .map(|(position, _)| position)
            .collect()
    }
}

/// Rows sharing a column registry. Every row is filled to the registry
/// width; cells for columns a row never had are [`CellValue::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: ColumnRegistry,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Creates a table from unique, already normalized column names.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = ColumnRegistry::default();
        for column in columns {
            registry.register(column.as_ref());
        }
        Self {
            columns: registry,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
    }

    /// Returns the cell at `row` × `column`, if present.
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let position = self.columns.position(column)?;
        self.rows.get(row).and_then(|cells| cells.get(position))
    }

    /// Appends a column holding the same value in every row.
    pub fn add_constant_column(&mut self, name: &str, value: CellValue) {
        let before = self.columns.len();
        let position = self.columns.register(name);
        if position < before {
            for row in &mut self.rows {
                row[position] = value.clone();
            }
        } else {
            for row in &mut self.rows {
                row.push(value.clone());
            }
        }
    }

    /// Keeps the rows for which `keep` returns `true`, preserving order.
    pub fn retain_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[CellValue]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row))
                .cloned()
                .collect(),
        }
    }

    /// Rows in `range`, used by the writer to materialise one sheet.
    pub fn slice(&self, range: std::ops::Range<usize>) -> &[Vec<CellValue>] {
        &self.rows[range]
    }

    /// Concatenates tables with column-union semantics. Columns keep the
    /// order of their first appearance.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut unified = Table::default();
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .names()
                .iter()
                .map(|name| unified.columns.register(name))
                .collect();
            for row in table.rows {
                let mut target = vec![CellValue::Empty; unified.columns.len()];
                for (cell, position) in row.into_iter().zip(&mapping) {
                    target[*position] = cell;
                }
                unified.rows.push(target);
            }
        }
        let width = unified.columns.len();
        for row in &mut unified.rows {
            row.resize(width, CellValue::Empty);
        }
        unified
    }
}

/// Normalized identifiers rows are matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    keys: BTreeSet<String>,
}

impl ReferenceSet {
    /// Builds the set from raw cells, dropping empties and normalizing the
    /// rest with [`normalize_key`].
    pub fn from_cells<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a CellValue>,
    {
        let keys = cells
            .into_iter()
            .filter(|cell| !cell.is_empty())
            .map(normalize_key)
            .filter(|key| !key.is_empty())
            .collect();
        Self { keys }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}
