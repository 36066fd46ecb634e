use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{CollectError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<String>,
}

impl Row {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Ordered rows under a fixed column schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn append(&mut self, row: Row) -> Result<()> {
        if row.values.len() != self.columns.len() {
            return Err(CollectError::RowWidth {
                expected: self.columns.len(),
                found: row.values.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    fn extend(&mut self, other: &Table) -> Result<()> {
        for row in &other.rows {
            self.append(row.clone())?;
        }
        Ok(())
    }
}

/// Reads the table at `path`, or an empty one with `columns` if absent.
pub fn load_existing(path: &Path, columns: &[String]) -> Result<Table> {
    let mut table = Table {
        columns: columns.to_vec(),
        rows: Vec::new(),
    };

    if !path.exists() {
        return Ok(table);
    }

    let mut reader = csv::Reader::from_path(path)?;
    let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if found != columns {
        return Err(CollectError::SchemaMismatch {
            path: path.to_path_buf(),
            expected: columns.to_vec(),
            found,
        });
    }

    for record in reader.records() {
        let record = record?;
        table.append(Row::new(record.iter().map(str::to_string).collect()))?;
    }

    debug!("Loaded {} existing rows from {}", table.len(), path.display());
    Ok(table)
}

/// Writes existing rows followed by `new` back to `path` and returns the total row count.
pub fn persist(new: &Table, path: &Path) -> Result<usize> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let mut combined = load_existing(path, new.columns())?;
    let existing = combined.len();
    combined.extend(new)?;

    // Whole-file rewrite; the rename keeps a crash from truncating the old table.
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(combined.columns())?;
        for row in combined.rows() {
            writer.write_record(row.values())?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;

    info!(
        "Saved {} rows to {} ({} existing, {} new)",
        combined.len(),
        path.display(),
        existing,
        new.len()
    );

    Ok(combined.len())
}
