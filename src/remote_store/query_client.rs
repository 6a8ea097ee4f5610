//! Generic query client for the hosted relational backend.
//!
//! `QueryClient` is the seam the remote store talks through; `RestClient`
//! implements it over the PostgREST HTTP interface (`/rest/v1/{table}`).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::error::{Result, StoreError};

#[cfg(test)]
use mockall::automock;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend tables, each with an auto-generated `id` and a `created_at` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Analysis,
    Networks,
    Issues,
    PerformanceMetrics,
    CoveragePoints,
    Reports,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Analysis => "wifi_analise",
            Table::Networks => "wifi_networks",
            Table::Issues => "wifi_issues",
            Table::PerformanceMetrics => "wifi_performance_metrics",
            Table::CoveragePoints => "wifi_coverage_points",
            Table::Reports => "wifi_relatorio",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row filter, ordering and projection of a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<(String, bool)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to return, in PostgREST syntax (embedded resources allowed).
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    /// Value of the equality filter on `column`, if any.
    pub fn eq_value(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn order_columns(&self) -> Vec<(&str, bool)> {
        self.order.iter().map(|(c, asc)| (c.as_str(), *asc)).collect()
    }

    /// Query-string pairs understood by PostgREST.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(select) = &self.select {
            params.push(("select".to_string(), select.clone()));
        }
        for (column, value) in &self.filters {
            params.push((column.clone(), format!("eq.{}", value)));
        }
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(column, asc)| {
                    format!("{}.{}", column, if *asc { "asc" } else { "desc" })
                })
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        params
    }
}

/// Operations of the relational backend. Rows travel as JSON objects.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QueryClient: Send + Sync + 'static {
    async fn select(&self, table: Table, query: Query) -> Result<Vec<Value>>;

    /// Inserts rows and returns them as stored.
    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>>;

    /// Updates matching rows and returns them as stored.
    async fn update(
        &self, table: Table, query: Query, patch: Value,
    ) -> Result<Vec<Value>>;

    /// Deletes matching rows and returns the removed rows.
    async fn delete(&self, table: Table, query: Query) -> Result<Vec<Value>>;
}

/// PostgREST client authenticated with the public API key.
pub struct RestClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table.name());
        debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, table: Table, builder: RequestBuilder) -> Result<Vec<Value>> {
        let response = builder.send().await.map_err(|e| {
            error!("Request to {} failed: {}", table, e);
            StoreError::Backend(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Request to {} answered {}: {}", table, status, text);
            return Err(StoreError::Backend(format!("{}: {}", status, text)).into());
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        response.json::<Vec<Value>>().await.map_err(|e| {
            error!("Unreadable response from {}: {}", table, e);
            StoreError::Backend(e.to_string()).into()
        })
    }
}

#[async_trait]
impl QueryClient for RestClient {
    async fn select(&self, table: Table, query: Query) -> Result<Vec<Value>> {
        let query = if query.select.is_none() { query.select("*") } else { query };
        let builder = self.request(Method::GET, table).query(&query.params());
        self.send(table, builder).await
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>> {
        let builder = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&rows);
        self.send(table, builder).await
    }

    async fn update(
        &self, table: Table, query: Query, patch: Value,
    ) -> Result<Vec<Value>> {
        let builder = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&query.params())
            .json(&patch);
        self.send(table, builder).await
    }

    async fn delete(&self, table: Table, query: Query) -> Result<Vec<Value>> {
        let builder = self
            .request(Method::DELETE, table)
            .header("Prefer", "return=representation")
            .query(&query.params());
        self.send(table, builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params() {
        let query = Query::new()
            .eq("analise_id", 5)
            .order("severity", false)
            .order("created_at", true);

        assert_eq!(
            query.params(),
            vec![
                ("analise_id".to_string(), "eq.5".to_string()),
                ("order".to_string(), "severity.desc,created_at.asc".to_string()),
            ]
        );
        assert_eq!(query.eq_value("analise_id"), Some("5"));
        assert_eq!(query.eq_value("id"), None);
    }

    #[test]
    fn test_select_comes_first() {
        let params = Query::new().select("*,wifi_analise(analise_nome)").eq("id", 1).params();
        assert_eq!(params[0], ("select".to_string(), "*,wifi_analise(analise_nome)".to_string()));
        assert_eq!(params[1], ("id".to_string(), "eq.1".to_string()));
    }

    #[test]
    fn test_table_names() {
        assert_eq!(Table::Analysis.to_string(), "wifi_analise");
        assert_eq!(Table::Reports.name(), "wifi_relatorio");
    }

    #[test]
    fn test_rest_client_trims_base_url() {
        let client = RestClient::new(&RemoteConfig {
            base_url: "https://example.supabase.co/".to_string(),
            api_key: "key".to_string(),
        })
        .unwrap();
        assert_eq!(client.base_url, "https://example.supabase.co");
    }
}
