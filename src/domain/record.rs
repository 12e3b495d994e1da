// ============================================================
// Layer 3 — Input / Output Records
// ============================================================
// The tabular side of the domain:
//
//   InputTable   — header + every row read from the input CSV
//   InputRecord  — one row: its index, the SMILES identifier,
//                  and all cell values for passthrough
//   OutputRecord — an InputRecord's values plus one score
//                  per predicted property
//   ResultTable  — the merged table handed to the writer,
//                  or back to an embedding caller
//
// Records are immutable after construction; the pipeline
// only ever builds new values from old ones.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One row of the source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Zero-based data row index (header excluded)
    pub row: usize,

    /// The SMILES string, exactly as read
    pub smiles: String,

    /// Every cell of the row in header order, SMILES included.
    /// Short rows are padded with empty strings.
    pub values: Vec<String>,
}

impl InputRecord {
    pub fn new(row: usize, smiles: impl Into<String>, values: Vec<String>) -> Self {
        Self { row, smiles: smiles.into(), values }
    }
}

/// The whole input file, read once at job start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTable {
    pub headers: Vec<String>,
    pub smiles_column: usize,
    pub records: Vec<InputRecord>,
}

impl InputTable {
    /// Build a table from raw rows. The SMILES value of each record is
    /// the trimmed `smiles_column` cell; a missing cell becomes "".
    /// Passthrough values are kept as read.
    pub fn from_rows(headers: Vec<String>, smiles_column: usize, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(row, mut values)| {
                values.resize(width, String::new());
                let smiles = values.get(smiles_column).map(|s| s.trim().to_string()).unwrap_or_default();
                InputRecord::new(row, smiles, values)
            })
            .collect();
        Self { headers, smiles_column, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A successfully predicted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub row: usize,
    pub smiles: String,
    pub values: Vec<String>,
    /// One score per task, in the model's task order
    pub scores: Vec<f32>,
}

/// Merged identifiers and predictions, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub headers: Vec<String>,
    pub records: Vec<OutputRecord>,
}

impl ResultTable {
    /// Column contract: every input column, then `Predicted <task>`
    /// for each task. A prediction column whose name is already taken
    /// gets a ` (2)`, ` (3)`, ... suffix; input headers are never renamed.
    pub fn new(input_headers: &[String], tasks: &[String]) -> Self {
        let mut headers = input_headers.to_vec();
        for task in tasks {
            let base = prediction_column(task);
            let mut name = base.clone();
            let mut n = 2;
            while headers.contains(&name) {
                name = format!("{base} ({n})");
                n += 1;
            }
            headers.push(name);
        }
        Self { headers, records: Vec::new() }
    }

    pub fn push(&mut self, input: &InputRecord, scores: Vec<f32>) {
        self.records.push(OutputRecord {
            row:    input.row,
            smiles: input.smiles.clone(),
            values: input.values.clone(),
            scores,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What a successful write produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    pub path: PathBuf,
    pub rows: usize,
}

/// Output column name for a predicted property.
pub fn prediction_column(task: &str) -> String {
    format!("Predicted {task}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec!["Name".to_string(), "Smiles".to_string()]
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = InputTable::from_rows(headers(), 1, vec![vec!["ethanol".to_string()]]);
        assert_eq!(table.records[0].values, vec!["ethanol".to_string(), String::new()]);
        assert_eq!(table.records[0].smiles, "");
    }

    #[test]
    fn test_long_rows_are_truncated() {
        let rows = vec![vec!["a".into(), "CCO".into(), "extra".into()]];
        let table = InputTable::from_rows(headers(), 1, rows);
        assert_eq!(table.records[0].values.len(), 2);
        assert_eq!(table.records[0].smiles, "CCO");
    }

    #[test]
    fn test_result_table_columns() {
        let table = ResultTable::new(&headers(), &["Solubility".to_string()]);
        assert_eq!(table.headers, vec!["Name", "Smiles", "Predicted Solubility"]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_prediction_column_never_shadows_input() {
        let input = vec![
            "Smiles".to_string(),
            "Predicted Solubility".to_string(),
            "Predicted Solubility (2)".to_string(),
        ];
        let table = ResultTable::new(&input, &["Solubility".to_string()]);
        assert_eq!(
            table.headers,
            vec!["Smiles", "Predicted Solubility", "Predicted Solubility (2)", "Predicted Solubility (3)"]
        );
    }
}
