//! Supabase `PostgREST` remote store.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ListQuery, RemoteError, RemoteResult, RemoteStore, TextFilter};
use crate::config::RemoteConfig;
use crate::models::{Collection, Record, RecordId};
use crate::util::compact_text;

/// `PostgREST` error codes meaning the payload does not fit the table.
const SCHEMA_ERROR_CODES: [&str; 3] = ["PGRST204", "PGRST100", "42703"];

#[derive(Clone)]
pub struct SupabaseStore {
    rest_url: String,
    anon_key: String,
    client: Client,
}

impl std::fmt::Debug for SupabaseStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseStore")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseStore {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(RemoteError::NotConfigured);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RemoteError::Transport(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            rest_url,
            anon_key,
            client,
        })
    }

    /// Build from configuration; `NotConfigured` when URL or key is missing.
    pub fn from_config(config: &RemoteConfig, timeout: Duration) -> RemoteResult<Self> {
        let (url, anon_key) = config.credentials().ok_or(RemoteError::NotConfigured)?;
        Self::new(url, anon_key, timeout)
    }

    fn table_url(&self, collection: Collection) -> String {
        format!(
            "{}/{}",
            self.rest_url,
            urlencoding::encode(collection.table())
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| RemoteError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_api_error(status, &body));
        }
        Ok(response)
    }

    async fn rows(response: Response) -> RemoteResult<Vec<Record>> {
        let rows = response
            .json::<Vec<Value>>()
            .await
            .map_err(|error| RemoteError::Transport(format!("unreadable response: {error}")))?;
        Ok(rows.into_iter().filter_map(Record::from_value).collect())
    }
}

impl RemoteStore for SupabaseStore {
    async fn list(&self, collection: Collection, query: &ListQuery) -> RemoteResult<Vec<Record>> {
        let request = self
            .client
            .get(self.table_url(collection))
            .query(&list_params(query));
        let response = self.send(request).await?;
        Self::rows(response).await
    }

    async fn insert(
        &self,
        collection: Collection,
        rows: Vec<Map<String, Value>>,
    ) -> RemoteResult<Vec<Record>> {
        let request = self
            .client
            .post(self.table_url(collection))
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = self.send(request).await?;
        Self::rows(response).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> RemoteResult<Vec<Record>> {
        let request = self
            .client
            .patch(self.table_url(collection))
            .query(&[id_filter(id)])
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.send(request).await?;
        Self::rows(response).await
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> RemoteResult<()> {
        let request = self
            .client
            .delete(self.table_url(collection))
            .query(&[id_filter(id)])
            .header("Prefer", "return=minimal");
        self.send(request).await?;
        Ok(())
    }
}

/// Turn a project URL into its REST endpoint root.
pub fn normalize_rest_url(url: &str) -> RemoteResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::NotConfigured);
    }
    if !crate::util::is_http_url(trimmed) {
        return Err(RemoteError::Transport(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

fn id_filter(id: &RecordId) -> (String, String) {
    ("id".to_string(), format!("eq.{id}"))
}

fn list_params(query: &ListQuery) -> Vec<(String, String)> {
    let direction = if query.order.ascending { "asc" } else { "desc" };
    let mut order = format!("{}.{direction}", query.order.column);
    if let Some(tiebreak) = query.order.tiebreak {
        order.push_str(&format!(",{tiebreak}.{direction}"));
    }

    let mut params = vec![
        ("select".to_string(), "*".to_string()),
        ("order".to_string(), order),
        ("offset".to_string(), query.range_from.to_string()),
        ("limit".to_string(), query.limit().to_string()),
    ];
    if let Some(filter) = &query.text_filter {
        params.push(text_filter_param(filter));
    }
    params
}

fn text_filter_param(filter: &TextFilter) -> (String, String) {
    let pattern = format!("*{}*", filter.needle.trim());
    match filter.columns.as_slice() {
        [column] => ((*column).to_string(), format!("ilike.{pattern}")),
        columns => {
            let quoted = quote_filter_value(&pattern);
            let clauses = columns
                .iter()
                .map(|column| format!("{column}.ilike.{quoted}"))
                .collect::<Vec<_>>()
                .join(",");
            ("or".to_string(), format!("({clauses})"))
        }
    }
}

/// Quote a value embedded in a logical filter when it holds reserved
/// characters.
fn quote_filter_value(value: &str) -> String {
    let reserved = |ch: char| matches!(ch, ',' | '.' | ':' | '(' | ')' | '"' | '\\');
    if !value.chars().any(reserved) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> RemoteError {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        let message = payload
            .message
            .or(payload.details)
            .or(payload.hint)
            .map(|message| message.trim().to_string())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        let code_is_schema = payload
            .code
            .as_deref()
            .is_some_and(|code| SCHEMA_ERROR_CODES.contains(&code));
        if code_is_schema || mentions_unknown_column(&message) {
            return RemoteError::SchemaMismatch(message);
        }
        return RemoteError::Api {
            status: status.as_u16(),
            message,
        };
    }

    let trimmed = compact_text(body);
    RemoteError::Api {
        status: status.as_u16(),
        message: if trimmed.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            trimmed
        },
    }
}

fn mentions_unknown_column(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("column")
        && (message.contains("does not exist") || message.contains("could not find"))
}
