//! Cluster transport boundary.
//!
//! The engine core never talks to the cluster directly: it receives the
//! index name list through [`IndexStore`] and hands classifications back as
//! close/delete calls on the same trait. [`ElasticsearchClient`] is the
//! production implementation against the cluster's HTTP API.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors from the cluster transport.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The HTTP request itself failed (connection, timeout, decoding).
    #[error("cluster transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cluster answered with a non-success status.
    #[error("cluster returned status {status} for {operation}: {body}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        body: String,
    },
}

/// Operations the curator needs from the cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Names of all indices currently present in the cluster.
    async fn list_indices(&self) -> Result<Vec<String>, ClusterError>;

    /// Closes an index.
    async fn close_index(&self, name: &str) -> Result<(), ClusterError>;

    /// Deletes an index.
    async fn delete_index(&self, name: &str) -> Result<(), ClusterError>;
}

/// [`IndexStore`] implementation against the Elasticsearch REST API.
#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CatIndexRow {
    index: String,
}

impl ElasticsearchClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn expect_success(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClusterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClusterError::UnexpectedStatus {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl IndexStore for ElasticsearchClient {
    async fn list_indices(&self) -> Result<Vec<String>, ClusterError> {
        let url = format!("{}/_cat/indices?h=index&format=json", self.base_url);
        let response = self.http.get(&url).send().await?;
        let response = Self::expect_success("list indices", response).await?;
        let rows: Vec<CatIndexRow> = response.json().await?;
        Ok(rows.into_iter().map(|row| row.index).collect())
    }

    async fn close_index(&self, name: &str) -> Result<(), ClusterError> {
        let url = format!("{}/{}/_close", self.base_url, name);
        let response = self.http.post(&url).send().await?;
        Self::expect_success("close index", response).await?;
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), ClusterError> {
        let url = format!("{}/{}", self.base_url, name);
        let response = self.http.delete(&url).send().await?;
        Self::expect_success("delete index", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ElasticsearchClient::new("http://localhost:9200/");
        assert_eq!(client.base_url, "http://localhost:9200");
    }

    #[tokio::test]
    async fn test_mock_store_round_trip() {
        let mut store = MockIndexStore::new();
        store
            .expect_list_indices()
            .returning(|| Ok(vec!["logs-2024.01.01".to_string()]));
        store
            .expect_delete_index()
            .withf(|name| name == "logs-2024.01.01")
            .returning(|_| Ok(()));

        let indices = store.list_indices().await.unwrap();
        assert_eq!(indices, vec!["logs-2024.01.01"]);
        store.delete_index("logs-2024.01.01").await.unwrap();
    }
}
