// ============================================================
// Layer 4 — Input Table Loader
// ============================================================
// Reads the molecule table (CSV with a header row) into an
// InputTable using the csv crate.
//
// Contract:
//   - the file must exist and be readable  → InputReadError::Open
//   - the SMILES column must be present    → InputReadError::MissingColumn
//   - rows may be ragged: short rows are padded, so a row
//     with no SMILES cell becomes a per-row parse failure
//     later instead of failing the whole read
//   - cells are decoded lossily: invalid UTF-8 in one row
//     becomes U+FFFD and fails that row's SMILES parse only
//
// Every other column is kept untouched (no trimming) and
// passed through to the output table.
//
// Reference: csv crate documentation (ReaderBuilder)

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder};

use crate::domain::error::InputReadError;
use crate::domain::record::InputTable;

/// Loads an input CSV and locates its SMILES column.
pub struct InputReader {
    path:          PathBuf,
    smiles_column: String,
}

impl InputReader {
    pub fn new(path: impl Into<PathBuf>, smiles_column: impl Into<String>) -> Self {
        Self {
            path:          path.into(),
            smiles_column: smiles_column.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file and read the whole table.
    pub fn read(&self) -> Result<InputTable, InputReadError> {
        let file = File::open(&self.path).map_err(|source| InputReadError::Open {
            path: self.path.clone(),
            source,
        })?;
        let table = self.read_from(file)?;
        tracing::info!(
            "Read {} rows from '{}'",
            table.len(),
            self.path.display()
        );
        Ok(table)
    }

    /// Read a table from any reader. `path` is only used in errors.
    pub fn read_from<R: Read>(&self, source: R) -> Result<InputTable, InputReadError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let malformed = |e: csv::Error| InputReadError::Malformed {
            path:    self.path.clone(),
            details: e.to_string(),
        };

        let headers = decode(reader.byte_headers().map_err(malformed)?);

        let smiles_column = headers
            .iter()
            .position(|h| h.trim() == self.smiles_column)
            .ok_or_else(|| InputReadError::MissingColumn {
                path:      self.path.clone(),
                column:    self.smiles_column.clone(),
                available: headers.clone(),
            })?;

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            rows.push(decode(&record.map_err(malformed)?));
        }

        Ok(InputTable::from_rows(headers, smiles_column, rows))
    }
}

fn decode(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}
