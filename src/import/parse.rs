//! Pasted tabular text and JSON arrays into raw rows.

use csv::ReaderBuilder;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::ImportError;

/// One pasted row: header -> cell. Cells missing from a short row are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCutoffRow {
    cells: BTreeMap<String, String>,
}

impl RawCutoffRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn insert(&mut self, header: &str, value: &str) {
        self.cells.insert(header.to_string(), value.to_string());
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(String::as_str)
    }

    pub fn get_ignore_case(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(header))
            .map(|(_, value)| value.as_str())
    }

    /// True when every cell is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|value| value.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawCutoffRow>,
}

impl ParsedTable {
    pub fn has_header(&self, header: &str) -> bool {
        self.headers.iter().any(|h| h == header)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Delimited,
    Json,
    Html,
}

impl InputFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "json" => InputFormat::Json,
            "html" | "htm" => InputFormat::Html,
            _ => InputFormat::Delimited,
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" | "tsv" | "text" => Ok(InputFormat::Delimited),
            "json" => Ok(InputFormat::Json),
            "html" => Ok(InputFormat::Html),
            other => Err(format!("unknown input format: {other}")),
        }
    }
}

fn clean_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').trim().to_string()
}

/// Tab when the first line contains one, comma otherwise. Mixed delimiters
/// are not supported.
pub fn detect_delimiter(text: &str) -> u8 {
    match text.lines().next() {
        Some(first) if first.contains('\t') => b'\t',
        _ => b',',
    }
}

/// Parse pasted CSV/TSV. The first line holds the headers; each later line is
/// matched to headers by position. Short rows simply lack the trailing cells.
pub fn parse_delimited(text: &str) -> Result<ParsedTable, ImportError> {
    let delimiter = detect_delimiter(text);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(clean_header).collect(),
        None => return Err(ImportError::Parse("input has no header row".to_string())),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        let mut row = RawCutoffRow::default();
        for (header, value) in headers.iter().zip(record.iter()) {
            row.insert(header, value.trim());
        }
        rows.push(row);
    }

    Ok(ParsedTable { headers, rows })
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// Convert one JSON object into a raw row; nulls are left out.
pub fn row_from_object(object: &Map<String, Value>) -> RawCutoffRow {
    let mut row = RawCutoffRow::default();
    for (key, value) in object {
        if let Some(text) = cell_text(value) {
            row.insert(key, &text);
        }
    }
    row
}

/// Parse a JSON array of flat objects. Headers are the keys in first-seen order.
pub fn parse_json(text: &str) -> Result<ParsedTable, ImportError> {
    let objects: Vec<Map<String, Value>> = serde_json::from_str(text)?;

    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(objects.len());
    for object in &objects {
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        rows.push(row_from_object(object));
    }

    Ok(ParsedTable { headers, rows })
}
