//! Sample tables and the adapter interface the tree builder consumes.

use std::collections::HashSet;

use itertools::Itertools;
use tracing::debug;

use crate::domain::entities::{Label, Value};
use crate::domain::error::{ConfigurationError, DataError, DomainResult};

/// Tokens marking a missing cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValues {
    tokens: HashSet<String>,
}

impl Default for MissingValues {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TOKENS)
    }
}

impl MissingValues {
    pub const DEFAULT_TOKENS: [&'static str; 4] = ["", "NA", "NaN", "null"];

    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_missing(&self, raw: &str) -> bool {
        self.tokens.contains(raw.trim())
    }

    /// Map a raw cell to `None` when it is a missing token.
    pub fn cell(&self, raw: &str) -> Option<String> {
        if self.is_missing(raw) {
            None
        } else {
            Some(raw.trim().to_string())
        }
    }

    /// Map a slice of raw cells, convenient for building tables in code.
    pub fn cells(&self, raw: &[&str]) -> Vec<Option<String>> {
        raw.iter().map(|c| self.cell(c)).collect()
    }
}

/// Anything exposing per-sample clustering columns and attribute columns.
///
/// Implement this for containers other than [`Table`] to feed them to the
/// [`TreeBuilder`](crate::domain::TreeBuilder).
pub trait ClusteringSource {
    /// Number of samples (rows).
    fn n_samples(&self) -> usize;

    /// Column names in table order.
    fn column_names(&self) -> Vec<String>;

    /// Labels of one clustering column, `None` for missing cells.
    ///
    /// Fails with `ColumnNotFound` or `NonDiscreteLabels`.
    fn resolution_column(&self, name: &str) -> DomainResult<Vec<Option<Label>>>;

    /// Values of one attribute column, `None` for missing cells.
    fn attribute_column(&self, name: &str) -> DomainResult<Vec<Option<Value>>>;
}

/// In-memory table of raw cells, stored column-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Option<String>>>,
    n_rows: usize,
}

impl Table {
    /// Build a table from named columns.
    ///
    /// Every column must have the same number of rows as the first one.
    pub fn from_columns<I, S>(columns: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<Option<String>>)>,
        S: Into<String>,
    {
        let mut table = Table::default();
        for (name, cells) in columns {
            let name = name.into();
            if table.names.contains(&name) {
                return Err(ConfigurationError::DuplicateColumn(name).into());
            }
            if table.names.is_empty() {
                table.n_rows = cells.len();
            } else if cells.len() != table.n_rows {
                return Err(DataError::LengthMismatch {
                    column: name,
                    expected: table.n_rows,
                    found: cells.len(),
                }
                .into());
            }
            table.names.push(name);
            table.columns.push(cells);
        }
        Ok(table)
    }

    /// Parse CSV text with a header row.
    pub fn from_csv(text: &str, missing: &MissingValues) -> DomainResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let names: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Err(DataError::Malformed("missing header row".to_string()).into());
        }
        if let Some(name) = names.iter().duplicates().next() {
            return Err(DataError::Malformed(format!("duplicate column '{}' in header", name)).into());
        }

        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.push(missing.cell(field));
            }
        }
        debug!(
            "from_csv: {} columns, {} rows",
            names.len(),
            columns.first().map(Vec::len).unwrap_or(0)
        );

        Self::from_columns(names.into_iter().zip(columns))
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    fn require(&self, name: &str) -> DomainResult<&[Option<String>]> {
        self.column(name)
            .ok_or_else(|| ConfigurationError::ColumnNotFound(name.to_string()).into())
    }
}

fn csv_error(e: csv::Error) -> crate::domain::DomainError {
    match e.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => DataError::RaggedRow {
            row: pos.as_ref().map(|p| p.line()).unwrap_or(0),
            expected: *expected_len,
            found: *len,
        }
        .into(),
        _ => DataError::Malformed(e.to_string()).into(),
    }
}

impl ClusteringSource for Table {
    fn n_samples(&self) -> usize {
        self.n_rows
    }

    fn column_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn resolution_column(&self, name: &str) -> DomainResult<Vec<Option<Label>>> {
        self.require(name)?
            .iter()
            .map(|cell| match cell {
                None => Ok(None),
                Some(raw) => Label::parse(raw).map(Some).ok_or_else(|| {
                    DataError::NonDiscreteLabels {
                        column: name.to_string(),
                        example: raw.clone(),
                    }
                    .into()
                }),
            })
            .collect()
    }

    fn attribute_column(&self, name: &str) -> DomainResult<Vec<Option<Value>>> {
        Ok(self
            .require(name)?
            .iter()
            .map(|cell| cell.as_deref().map(Value::parse))
            .collect())
    }
}
