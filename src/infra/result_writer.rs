// ============================================================
// Layer 6 — Result Writer
// ============================================================
// Persists a ResultTable as CSV in the output directory.
//
// File naming:
//   <prefix>_<YYYYmmdd-HHMMSS>.csv
//   <prefix>_<YYYYmmdd-HHMMSS>-1.csv   ← same second, second run
//
// where prefix comes from the model family, e.g.
// PredictedGraphConvolution. Files are opened with
// create_new, so an existing file is never truncated; a
// failed write removes the partial file it created.
//
// Reference: csv crate documentation (Writer)

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::domain::error::WriteError;
use crate::domain::features::ModelKind;
use crate::domain::record::{ResultTable, WriteReport};
use crate::domain::traits::ResultSink;

const MAX_SUFFIX: usize = 1000;

pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Base file name for a run started at `at`.
    pub fn file_stem(kind: ModelKind, at: DateTime<Local>) -> String {
        format!("{}_{}", kind.output_prefix(), at.format("%Y%m%d-%H%M%S"))
    }

    /// Serialize the table as CSV into any writer.
    pub fn write_to<W: Write>(table: &ResultTable, sink: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(&table.headers)?;
        for record in &table.records {
            let scores = record.scores.iter().map(|s| s.to_string());
            writer.write_record(record.values.iter().cloned().chain(scores))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn create_unique(&self, stem: &str) -> Result<(PathBuf, fs::File), WriteError> {
        for n in 0..MAX_SUFFIX {
            let name = if n == 0 { format!("{stem}.csv") } else { format!("{stem}-{n}.csv") };
            let path = self.output_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(WriteError::Create { path, source }),
            }
        }
        Err(WriteError::Write {
            path:    self.output_dir.join(format!("{stem}.csv")),
            details: format!("no free file name after {MAX_SUFFIX} attempts"),
        })
    }
}

impl ResultSink for ResultWriter {
    fn write(&self, table: &ResultTable, kind: ModelKind) -> Result<WriteReport, WriteError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| WriteError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let (path, file) = self.create_unique(&Self::file_stem(kind, Local::now()))?;
        if let Err(e) = Self::write_to(table, file) {
            discard_partial(&path);
            return Err(WriteError::Write { path, details: e.to_string() });
        }

        tracing::info!("Wrote {} rows to '{}'", table.len(), path.display());
        Ok(WriteReport { path, rows: table.len() })
    }
}

/// Remove a file left behind by a failed write. Returns false, with a
/// warning, if the file could not be removed.
fn discard_partial(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Could not remove partial file '{}': {}", path.display(), e);
            false
        }
    }
}
