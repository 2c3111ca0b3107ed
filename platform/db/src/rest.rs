use std::fmt::Display;

use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use crate::{BackendClient, DbError, DbResult, ensure_success};

/// Builder for one call against a REST table (`/rest/v1/{table}`).
///
/// Filters use the backend's `column=op.value` query syntax.
#[derive(Clone, Debug)]
pub struct TableQuery {
    client: BackendClient,
    table: String,
    params: Vec<(String, String)>,
}

impl TableQuery {
    pub(crate) fn new(client: BackendClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.to_string()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.params.push(("order".into(), format!("{column}.desc")));
        self
    }

    pub fn on_conflict(mut self, column: &str) -> Self {
        self.params.push(("on_conflict".into(), column.to_string()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> DbResult<Vec<T>> {
        let response = self.send(Method::GET, None, None::<&()>).await?;
        Ok(response.json().await?)
    }

    /// First matching row, or [`DbError::NotFound`] when nothing matched.
    pub async fn fetch_one<T: DeserializeOwned>(self) -> DbResult<T> {
        self.fetch::<T>()
            .await?
            .into_iter()
            .next()
            .ok_or(DbError::NotFound)
    }

    /// Insert one row and return it as stored.
    pub async fn insert<B: Serialize, T: DeserializeOwned>(self, row: &B) -> DbResult<T> {
        let response = self
            .send(Method::POST, Some("return=representation"), Some(row))
            .await?;
        let rows: Vec<T> = response.json().await?;
        rows.into_iter().next().ok_or(DbError::NotFound)
    }

    pub async fn insert_minimal<B: Serialize>(self, row: &B) -> DbResult<()> {
        self.send(Method::POST, Some("return=minimal"), Some(row))
            .await?;
        Ok(())
    }

    /// Insert-or-merge keyed by the `on_conflict` column.
    pub async fn upsert<B: Serialize>(self, row: &B) -> DbResult<()> {
        self.send(
            Method::POST,
            Some("resolution=merge-duplicates,return=minimal"),
            Some(row),
        )
        .await?;
        Ok(())
    }

    /// Patch every matching row. Returns the number of rows changed.
    pub async fn update<B: Serialize>(self, patch: &B) -> DbResult<usize> {
        let response = self
            .send(Method::PATCH, Some("return=representation"), Some(patch))
            .await?;
        let rows: Vec<Value> = response.json().await?;
        Ok(rows.len())
    }

    async fn send<B: Serialize>(
        self,
        method: Method,
        prefer: Option<&str>,
        body: Option<&B>,
    ) -> DbResult<reqwest::Response> {
        let url = self.client.endpoint(&format!("/rest/v1/{}", self.table));
        debug!(table = %self.table, %method, "backend rest call");
        let mut request = self
            .client
            .authorize(self.client.http().request(method, url))
            .query(&self.params);
        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        ensure_success(request.send().await?).await
    }
}
