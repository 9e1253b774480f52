//! Access to the hosted datastore.
//!
//! The hosted backend exposes tables over a PostgREST-style REST API. Only the
//! handful of calls the importer and catalog need are modelled: select all,
//! select by id, batch insert with a row count, update by id.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_RANGE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::error::DatastoreError;

#[allow(async_fn_in_trait)]
pub trait Datastore {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>, DatastoreError>;

    async fn select_by_id(&self, table: &str, id: &str) -> Result<Value, DatastoreError>;

    /// Insert all rows in a single call. Returns the number of rows written.
    async fn insert_batch(&self, table: &str, rows: &[Value]) -> Result<usize, DatastoreError>;

    async fn update_by_id(&self, table: &str, id: &str, patch: &Value) -> Result<(), DatastoreError>;
}

/// Inserted rows come back in the body and their total in `Content-Range`.
const INSERT_PREFER: &str = "return=representation,count=exact";

/// Row count from a `Content-Range` such as `0-2/3` or `*/0`, else the number
/// of returned rows.
fn inserted_count(content_range: Option<&str>, returned: usize) -> usize {
    content_range
        .and_then(|range| range.rsplit_once('/'))
        .and_then(|(_, total)| total.trim().parse().ok())
        .unwrap_or(returned)
}

/// `select_all` decoded into typed rows.
pub async fn select_typed<T, D>(store: &D, table: &str) -> Result<Vec<T>, DatastoreError>
where
    T: DeserializeOwned,
    D: Datastore,
{
    store
        .select_all(table)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| DatastoreError::Decode(format!("{table}: {e}"))))
        .collect()
}

/// REST client for the hosted datastore. Build one at start-up and pass it
/// to whatever needs it.
#[derive(Debug, Clone)]
pub struct RestDatastore {
    client: Client,
    base_url: String,
}

impl RestDatastore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, DatastoreError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key).map_err(|e| DatastoreError::Decode(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| DatastoreError::Decode(e.to_string()))?;
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, DatastoreError> {
        match (config.datastore_url.as_deref(), config.datastore_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Self::new(url, key),
            _ => Err(DatastoreError::NotConfigured),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn insert_request(&self, table: &str, rows: &[Value]) -> RequestBuilder {
        self.client
            .post(self.table_url(table))
            .header("Prefer", INSERT_PREFER)
            .json(rows)
    }

    async fn check(response: Response) -> Result<Response, DatastoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DatastoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl Datastore for RestDatastore {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>, DatastoreError> {
        debug!(table, "select all");
        let response = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*")])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn select_by_id(&self, table: &str, id: &str) -> Result<Value, DatastoreError> {
        debug!(table, id, "select by id");
        let response = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))])
            .send()
            .await?;
        let rows: Vec<Value> = Self::check(response).await?.json().await?;
        rows.into_iter().next().ok_or_else(|| DatastoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        })
    }

    async fn insert_batch(&self, table: &str, rows: &[Value]) -> Result<usize, DatastoreError> {
        debug!(table, rows = rows.len(), "insert batch");
        let response = self.insert_request(table, rows).send().await?;
        let response = Self::check(response).await?;
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let inserted: Vec<Value> = response.json().await?;
        Ok(inserted_count(content_range.as_deref(), inserted.len()))
    }

    async fn update_by_id(&self, table: &str, id: &str, patch: &Value) -> Result<(), DatastoreError> {
        debug!(table, id, "update by id");
        let response = self
            .client
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .json(patch)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// In-process tables, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failure: Option<String>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: &str, rows: Vec<Value>) -> Self {
        self.lock().insert(table.to_string(), rows);
        self
    }

    /// Every call fails with the given message.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>> {
        // a poisoned lock still holds consistent rows
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail_if_configured(&self) -> Result<(), DatastoreError> {
        match &self.failure {
            Some(message) => Err(DatastoreError::Status {
                status: 500,
                body: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Datastore for MemoryDatastore {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>, DatastoreError> {
        self.fail_if_configured()?;
        Ok(self.rows(table))
    }

    async fn select_by_id(&self, table: &str, id: &str) -> Result<Value, DatastoreError> {
        self.fail_if_configured()?;
        self.rows(table)
            .into_iter()
            .find(|row| row_id(row).as_deref() == Some(id))
            .ok_or_else(|| DatastoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    async fn insert_batch(&self, table: &str, rows: &[Value]) -> Result<usize, DatastoreError> {
        self.fail_if_configured()?;
        self.lock()
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows.len())
    }

    async fn update_by_id(&self, table: &str, id: &str, patch: &Value) -> Result<(), DatastoreError> {
        self.fail_if_configured()?;
        let mut tables = self.lock();
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row).as_deref() == Some(id)))
            .ok_or_else(|| DatastoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        if let (Value::Object(target), Value::Object(changes)) = (row, patch) {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}
