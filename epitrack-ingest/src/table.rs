//! Raw CSV tables as fetched from upstream.

use epitrack_core::IngestError;

/// A decoded CSV file: the header row plus every data row as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Name of the dataset this table came from, used in error messages.
    pub dataset: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Decode comma-separated bytes whose first row is the header.
    ///
    /// Rows with a different field count than the header are rejected.
    pub fn from_csv(dataset: impl Into<String>, input: &[u8]) -> Result<Self, IngestError> {
        let dataset = dataset.into();
        let csv_error = |e: csv::Error| IngestError::Csv {
            dataset: dataset.clone(),
            reason: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::Headers)
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self {
            dataset,
            headers,
            rows,
        })
    }

    /// Position of the header named `column`.
    pub fn column_index(&self, column: &str) -> Result<usize, IngestError> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| IngestError::MissingColumn {
                dataset: self.dataset.clone(),
                column: column.to_string(),
            })
    }

    /// Cell text, empty when the row is short.
    pub fn cell<'a>(row: &'a [String], index: usize) -> &'a str {
        row.get(index).map(String::as_str).unwrap_or("")
    }
}
