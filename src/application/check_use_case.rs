// ============================================================
// Layer 2 — CheckUseCase
// ============================================================
// Parse-only dry run: ReadInput → ParseMolecules, then report
// which rows a real run would drop. No model is loaded and
// nothing is written.

use std::path::PathBuf;

use crate::application::predict_use_case::{parse_rows, DroppedRow};
use crate::data::{loader::InputReader, smiles::MoleculeParser};
use crate::domain::error::{PipelineFailure, Stage};

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub input_rows: usize,
    pub valid:      usize,
    pub dropped:    Vec<DroppedRow>,
}

pub struct CheckUseCase {
    input:         PathBuf,
    smiles_column: String,
}

impl CheckUseCase {
    pub fn new(input: impl Into<PathBuf>, smiles_column: impl Into<String>) -> Self {
        Self { input: input.into(), smiles_column: smiles_column.into() }
    }

    pub fn execute(&self) -> Result<CheckReport, PipelineFailure> {
        let table = {
            let _span = tracing::info_span!("read_input").entered();
            InputReader::new(&self.input, &self.smiles_column)
                .read()
                .map_err(|e| PipelineFailure::at(Stage::ReadInput, e))?
        };

        let _span = tracing::info_span!("parse_molecules").entered();
        let (parsed, dropped) = parse_rows(&MoleculeParser::new(), &table);
        Ok(CheckReport { input_rows: table.len(), valid: parsed.len(), dropped })
    }
}
