use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::info;

use crate::error::ScrapeError;
use crate::import::mapping::ColumnMapping;
use crate::import::parse::{ParsedTable, RawCutoffRow};

/// One cutoff as returned by the scrape endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedCutoff {
    pub college_name: String,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub opening_rank: Option<i64>,
    #[serde(default)]
    pub closing_rank: Option<i64>,
    #[serde(default)]
    pub domicile: Option<String>,
    #[serde(default)]
    pub quota: Option<String>,
}

impl ScrapedCutoff {
    fn to_raw_row(&self) -> RawCutoffRow {
        let mut row = RawCutoffRow::default();
        row.insert("college_name", &self.college_name);
        let optional = [
            ("branch_name", self.branch_name.clone()),
            ("year", self.year.map(|v| v.to_string())),
            ("round", self.round.map(|v| v.to_string())),
            ("category", self.category.clone()),
            ("opening_rank", self.opening_rank.map(|v| v.to_string())),
            ("closing_rank", self.closing_rank.map(|v| v.to_string())),
            ("domicile", self.domicile.clone()),
            ("quota", self.quota.clone()),
        ];
        for (header, value) in optional {
            if let Some(value) = value {
                row.insert(header, &value);
            }
        }
        row
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ScrapeResponse {
    success: bool,
    #[serde(default)]
    cutoffs: Vec<ScrapedCutoff>,
    #[serde(default)]
    error: Option<String>,
}

/// Scraped cutoffs as an import table plus the mapping that fits it.
pub fn scraped_table(cutoffs: &[ScrapedCutoff]) -> (ParsedTable, ColumnMapping) {
    let headers = [
        "college_name",
        "branch_name",
        "category",
        "opening_rank",
        "closing_rank",
        "domicile",
        "quota",
        "round",
        "year",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    let rows = cutoffs.iter().map(ScrapedCutoff::to_raw_row).collect();
    (ParsedTable { headers, rows }, ColumnMapping::for_scraped())
}

/// Client for the cutoff scrape endpoint. Construct once and pass it along;
/// build a new one when credentials change.
#[derive(Debug, Clone)]
pub struct ScrapeClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ScrapeClient {
    pub fn new(endpoint: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    pub fn with_credentials(&self, api_key: &str) -> Self {
        Self::new(&self.endpoint, Some(api_key))
    }

    pub async fn fetch_cutoffs(&self, url: &str, year: i32) -> Result<Vec<ScrapedCutoff>, ScrapeError> {
        info!(url, year, "requesting cutoff scrape");

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "url": url, "year": year }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: ScrapeResponse = request.send().await?.error_for_status()?.json().await?;
        if !response.success {
            return Err(ScrapeError::Remote(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        info!(cutoffs = response.cutoffs.len(), "scrape finished");
        Ok(response.cutoffs)
    }
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{css}: {e:?}")))
}

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn cell_text(cell: ElementRef) -> String {
    let text = cell.text().collect::<String>();
    whitespace().replace_all(text.trim(), " ").into_owned()
}

/// First `<table>` of a saved page as an import table. Header cells come from
/// the first row with `<th>` cells, else from the first row.
pub fn extract_html_table(content: &str) -> Result<ParsedTable, ScrapeError> {
    let document = Html::parse_document(content);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let th_selector = selector("th")?;
    let cell_selector = selector("th, td")?;

    let table = document.select(&table_selector).next().ok_or(ScrapeError::NoTable)?;
    let mut rows = table.select(&row_selector);

    let header_row = match table
        .select(&row_selector)
        .position(|row| row.select(&th_selector).next().is_some())
    {
        Some(index) => rows.nth(index),
        None => rows.next(),
    }
    .ok_or(ScrapeError::NoTable)?;

    let headers: Vec<String> = header_row.select(&cell_selector).map(cell_text).collect();

    let mut parsed = Vec::new();
    for row in rows {
        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        let mut raw = RawCutoffRow::default();
        for (header, value) in headers.iter().zip(cells.iter()) {
            raw.insert(header, value);
        }
        parsed.push(raw);
    }

    Ok(ParsedTable { headers, rows: parsed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::mapping::CanonicalField;

    const PAGE: &str = r#"
        <html><body>
        <h1>WBJEE 2024 Round 1</h1>
        <table class="cutoffs">
          <thead><tr><th>Institute</th><th>Program</th><th>Category</th><th>Closing
              Rank</th></tr></thead>
          <tbody>
            <tr><td>Jadavpur  University</td><td>CSE</td><td>GEN</td><td>120</td></tr>
            <tr><td></td><td></td><td></td><td></td></tr>
            <tr><td>IIEST Shibpur</td><td>IT</td><td>OBC-A</td></tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn extracts_first_table() {
        let table = extract_html_table(PAGE).expect("table");
        assert_eq!(table.headers, vec!["Institute", "Program", "Category", "Closing Rank"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("Institute"), Some("Jadavpur University"));
        assert_eq!(table.rows[0].get("Closing Rank"), Some("120"));
        assert_eq!(table.rows[1].get("Closing Rank"), None);
    }

    #[test]
    fn table_without_th_uses_first_row() {
        let page = "<table><tr><td>College</td><td>Year</td></tr><tr><td>A</td><td>2024</td></tr></table>";
        let table = extract_html_table(page).expect("table");
        assert_eq!(table.headers, vec!["College", "Year"]);
        assert_eq!(table.rows[0].get("Year"), Some("2024"));
    }

    #[test]
    fn page_without_table_is_an_error() {
        assert!(matches!(extract_html_table("<p>nothing</p>"), Err(ScrapeError::NoTable)));
    }

    #[test]
    fn scraped_rows_use_known_field_names() {
        let cutoffs = vec![ScrapedCutoff {
            college_name: "Jadavpur University".to_string(),
            branch_name: Some("CSE".to_string()),
            year: Some(2024),
            closing_rank: Some(120),
            ..ScrapedCutoff::default()
        }];
        let (table, mapping) = scraped_table(&cutoffs);
        let header = mapping.header_for(CanonicalField::CollegeId).expect("college header");
        assert_eq!(table.rows[0].get(header), Some("Jadavpur University"));
        assert_eq!(table.rows[0].get("closing_rank"), Some("120"));
        assert_eq!(table.rows[0].get("opening_rank"), None);
    }

    #[test]
    fn decodes_endpoint_response() {
        let body = r#"{"success": true, "cutoffs": [{"college_name": "A", "branch_name": "B", "year": 2024, "round": 2, "category": "GEN", "opening_rank": 1, "closing_rank": 90, "domicile": "Home", "quota": "GMR"}]}"#;
        let response: ScrapeResponse = serde_json::from_str(body).expect("response");
        assert!(response.success);
        assert_eq!(response.cutoffs[0].round, Some(2));

        let failed: ScrapeResponse = serde_json::from_str(r#"{"success": false, "error": "blocked"}"#).expect("response");
        assert!(!failed.success);
        assert!(failed.cutoffs.is_empty());
        assert_eq!(failed.error.as_deref(), Some("blocked"));
    }
}
