use std::path::PathBuf;

use shipdash_schema::RawRecord;

use crate::error::ExtractError;
use crate::Extractor;

/// Reads a structured local CSV file. Headers are normalized to
/// lower_snake_case so downstream schemas can rely on stable field names.
pub struct CsvExtractor {
    path: PathBuf,
}

impl CsvExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Extractor for CsvExtractor {
    fn source_name(&self) -> &str {
        "csv file"
    }

    fn extract(&mut self) -> Result<Vec<RawRecord>, ExtractError> {
        if !self.path.exists() {
            return Err(ExtractError::SourceUnavailable(format!(
                "file not found: {}",
                self.path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| ExtractError::Parse(format!("{}: {e}", self.path.display())))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ExtractError::Parse(format!("{}: {e}", self.path.display())))?
            .iter()
            .map(normalize_header)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record
                .map_err(|e| ExtractError::Parse(format!("{}: {e}", self.path.display())))?;
            let mut row = RawRecord::new();
            for (i, header) in headers.iter().enumerate() {
                if let Some(cell) = record.get(i) {
                    row.insert(header.clone(), serde_json::Value::String(cell.to_string()));
                }
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_source_unavailable() {
        let mut extractor = CsvExtractor::new("/nonexistent/shipping.csv");
        assert!(matches!(
            extractor.extract(),
            Err(ExtractError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn reads_rows_with_normalized_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shipping.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "Rank,State,Postal,Population Total").unwrap();
        writeln!(f, "1,California,CA,100").unwrap();
        writeln!(f, "2,Texas,TX,200").unwrap();
        drop(f);

        let rows = CsvExtractor::new(&path).extract().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["rank"], serde_json::json!("1"));
        assert_eq!(rows[0]["population_total"], serde_json::json!("100"));
        assert_eq!(rows[1]["state"], serde_json::json!("Texas"));
    }
}
