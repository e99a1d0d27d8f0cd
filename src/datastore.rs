use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::newsapi::Article;

/// Default Catalyst API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.catalyst.zoho.com";

/// One cached news row: the two columns every news table carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRow {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl From<Article> for NewsRow {
    fn from(article: Article) -> Self {
        Self {
            title: article.title.unwrap_or_default(),
            url: article.url.unwrap_or_default(),
        }
    }
}

/// Trait defining the tabular datastore operations required by the news
/// services. The datastore itself stays opaque: rows are only inserted,
/// updated in place by identifier, and read back.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Identifiers of the rows currently stored in a table, in storage order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    async fn row_ids(&self, table: &str) -> Result<Vec<String>>;

    /// Insert a new row
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    async fn insert_row(&self, table: &str, row: &NewsRow) -> Result<()>;

    /// Update an existing row in place
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    async fn update_row(&self, table: &str, row_id: &str, row: &NewsRow) -> Result<()>;

    /// All rows of a table, in storage order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    async fn fetch_rows(&self, table: &str) -> Result<Vec<NewsRow>>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Catalyst Data Store client over the platform's REST API.
///
/// Queries go through the ZCQL endpoint; inserts and updates through the
/// table row resource. Query responses nest each row under its table name.
pub struct CatalystDatastore {
    client: Client,
    base_url: String,
    project_id: String,
    token: String,
}

impl CatalystDatastore {
    /// Creates a new client for the given project
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            project_id: project_id.into(),
            token: token.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/baas/v1/project/{}/{path}", self.base_url, self.project_id)
    }

    fn authorization(&self) -> String {
        format!("Zoho-oauthtoken {}", self.token)
    }

    #[instrument(skip(self), fields(query = %query))]
    async fn execute_query(&self, query: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .post(self.endpoint("query"))
            .header("Authorization", self.authorization())
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| Error::DatastoreError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::DatastoreError(format!(
                "query returned {}",
                response.status()
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| Error::DatastoreError(e.to_string()))?;

        debug!(rows = body.data.len(), "Query completed");
        Ok(body.data)
    }

    async fn push_row(&self, table: &str, body: Value, update: bool) -> Result<()> {
        let url = self.endpoint(&format!("table/{table}/row"));
        let request = if update {
            self.client.put(url)
        } else {
            self.client.post(url)
        };

        let response = request
            .header("Authorization", self.authorization())
            // The row resource takes a batch; a single row is a batch of one.
            .json(&[body])
            .send()
            .await
            .map_err(|e| Error::DatastoreError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::DatastoreError(format!(
                "row write to {table} returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Pulls the per-table object out of one ZCQL result row.
    fn table_record<'a>(&self, table: &str, row: &'a Value) -> Result<&'a Value> {
        row.get(table).ok_or_else(|| {
            Error::DatastoreError(format!("query result row is missing the {table} record"))
        })
    }
}

fn rowid_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Datastore for CatalystDatastore {
    #[instrument(skip(self))]
    async fn row_ids(&self, table: &str) -> Result<Vec<String>> {
        let rows = self.execute_query(&format!("SELECT ROWID FROM {table}")).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = self.table_record(table, row)?;
            let id = record.get("ROWID").and_then(rowid_string).ok_or_else(|| {
                Error::DatastoreError(format!("query result row for {table} has no ROWID"))
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    #[instrument(skip(self, row), fields(title = %row.title))]
    async fn insert_row(&self, table: &str, row: &NewsRow) -> Result<()> {
        self.push_row(table, json!({ "title": row.title, "url": row.url }), false)
            .await
    }

    #[instrument(skip(self, row), fields(title = %row.title))]
    async fn update_row(&self, table: &str, row_id: &str, row: &NewsRow) -> Result<()> {
        self.push_row(
            table,
            json!({ "ROWID": row_id, "title": row.title, "url": row.url }),
            true,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_rows(&self, table: &str) -> Result<Vec<NewsRow>> {
        let rows = self
            .execute_query(&format!("SELECT title, url FROM {table}"))
            .await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = self.table_record(table, row)?;
            records.push(
                NewsRow::deserialize(record)
                    .map_err(|e| Error::DatastoreError(e.to_string()))?,
            );
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_row_from_article_fills_missing_fields() {
        let row = NewsRow::from(Article {
            title: Some("headline".to_string()),
            url: None,
        });
        assert_eq!(row.title, "headline");
        assert_eq!(row.url, "");
    }

    #[test]
    fn test_rowid_string_accepts_numbers_and_strings() {
        assert_eq!(
            rowid_string(&Value::String("123".to_string())),
            Some("123".to_string())
        );
        assert_eq!(rowid_string(&json!(456)), Some("456".to_string()));
        assert_eq!(rowid_string(&Value::Null), None);
    }

    #[test]
    fn test_endpoint_joins_project_and_path() {
        let store = CatalystDatastore::new("https://api.example.com", "4000123", "token");
        assert_eq!(
            store.endpoint("query"),
            "https://api.example.com/baas/v1/project/4000123/query"
        );
        assert_eq!(
            store.endpoint("table/HEADLINES/row"),
            "https://api.example.com/baas/v1/project/4000123/table/HEADLINES/row"
        );
    }

    #[test]
    fn test_table_record_extracts_nested_row() {
        let store = CatalystDatastore::new(DEFAULT_BASE_URL, "p", "t");
        let row = json!({ "HEADLINES": { "ROWID": "1", "title": "x", "url": "y" } });
        let record = store
            .table_record("HEADLINES", &row)
            .expect("record should be present");
        assert_eq!(record.get("ROWID"), Some(&Value::String("1".to_string())));

        let err = store
            .table_record("BUSINESS", &row)
            .expect_err("missing record should error");
        assert!(matches!(err, Error::DatastoreError(_)));
    }
}
