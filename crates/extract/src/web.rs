use shipdash_schema::RawRecord;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::html;
use crate::http::HttpClient;
use crate::Extractor;

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// How scraped table columns map to record field names.
#[derive(Debug, Clone)]
pub enum ColumnMap {
    /// Remap the first N columns, in order, to these names. Extra columns
    /// are dropped; fewer columns than names is a parse failure.
    Positional(Vec<String>),
    /// Pick columns whose header contains one of the needles
    /// (case-insensitive). If any target cannot be matched, fall back to
    /// these fixed column positions, in target order.
    HeaderContains {
        targets: Vec<HeaderTarget>,
        fallback: Vec<usize>,
    },
}

#[derive(Debug, Clone)]
pub struct HeaderTarget {
    pub field: String,
    pub needles: Vec<String>,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Fetches an HTML page and parses its first table into records.
pub struct WebTableExtractor {
    name: String,
    url: String,
    map: ColumnMap,
    /// Drop `[...]` footnote markers from cells (reference pages).
    strip_brackets: bool,
    client: HttpClient,
}

impl WebTableExtractor {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        map: ColumnMap,
        client: HttpClient,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            map,
            strip_brackets: false,
            client,
        }
    }

    pub fn strip_brackets(mut self) -> Self {
        self.strip_brackets = true;
        self
    }

    /// Parse records out of a fetched page. Pure; split from `extract` so
    /// captured fixtures can be parsed offline.
    pub fn records_from_html(&self, page: &str) -> Result<Vec<RawRecord>, ExtractError> {
        let table = html::first_table(page)
            .ok_or_else(|| ExtractError::Parse(format!("{}: no table found", self.name)))?;
        let mut rows = html::rows(table).into_iter();

        let header = rows
            .next()
            .ok_or_else(|| ExtractError::Parse(format!("{}: table has no rows", self.name)))?;

        let columns: Vec<(String, usize)> = match &self.map {
            ColumnMap::Positional(names) => {
                if header.len() < names.len() {
                    return Err(ExtractError::Parse(format!(
                        "{}: table has {} columns, expected at least {}",
                        self.name,
                        header.len(),
                        names.len()
                    )));
                }
                names.iter().cloned().zip(0..).collect()
            }
            ColumnMap::HeaderContains { targets, fallback } => {
                match match_headers(&header, targets) {
                    Some(columns) => columns,
                    None => {
                        if fallback.len() != targets.len()
                            || fallback.iter().any(|&i| i >= header.len())
                        {
                            return Err(ExtractError::Parse(format!(
                                "{}: headers {:?} match no expected column",
                                self.name, header
                            )));
                        }
                        warn!(
                            source = self.name.as_str(),
                            "header match failed, using positional fallback"
                        );
                        targets
                            .iter()
                            .map(|t| t.field.clone())
                            .zip(fallback.iter().copied())
                            .collect()
                    }
                }
            }
        };

        let width_needed = columns.iter().map(|(_, i)| i + 1).max().unwrap_or(0);
        let mut records = Vec::new();
        for row in rows {
            if row.len() < width_needed {
                debug!(source = self.name.as_str(), ?row, "skipping short row");
                continue;
            }
            let mut record = RawRecord::new();
            for (field, index) in &columns {
                let mut cell = row[*index].clone();
                if self.strip_brackets {
                    cell = remove_brackets(&cell);
                }
                record.insert(field.clone(), serde_json::Value::String(cell));
            }
            records.push(record);
        }

        Ok(records)
    }
}

impl Extractor for WebTableExtractor {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn extract(&mut self) -> Result<Vec<RawRecord>, ExtractError> {
        let page = self.client.get_text(&self.url)?;
        self.records_from_html(&page)
    }
}

/// Match every target to a header column by needle containment. None if any
/// target has no match.
fn match_headers(header: &[String], targets: &[HeaderTarget]) -> Option<Vec<(String, usize)>> {
    let lowered: Vec<String> = header.iter().map(|h| h.to_lowercase()).collect();
    targets
        .iter()
        .map(|target| {
            lowered
                .iter()
                .position(|h| target.needles.iter().any(|n| h.contains(n.as_str())))
                .map(|i| (target.field.clone(), i))
        })
        .collect()
}

/// Remove `[...]` spans, e.g. Wikipedia footnote markers.
fn remove_brackets(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
