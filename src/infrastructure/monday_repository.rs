// Monday.com GraphQL repository implementation
use crate::application::board_repository::{BoardQuery, BoardRepository};
use crate::application::errors::FetchError;
use crate::domain::board::{BoardId, BoardItem, ColumnValue};
use crate::infrastructure::config::MondaySettings;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

const ITEMS_QUERY: &str = r#"query ($ids: [ID!], $limit: Int!, $cursor: String) {
  boards(ids: $ids) {
    columns { id title }
    items_page(limit: $limit, cursor: $cursor) {
      cursor
      items {
        id
        name
        column_values { id type text value }
      }
    }
  }
}"#;

#[derive(Debug, Clone)]
pub struct MondayRepository {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    api_version: String,
    max_retries: u32,
    retry_backoff: Duration,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
    // Older style error envelope, still used for auth and rate limit failures
    error_code: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct ErrorExtensions {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(default)]
    boards: Vec<BoardPayload>,
}

#[derive(Debug, Deserialize)]
struct BoardPayload {
    #[serde(default)]
    columns: Vec<ColumnPayload>,
    items_page: ItemsPagePayload,
}

#[derive(Debug, Deserialize)]
struct ColumnPayload {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ItemsPagePayload {
    cursor: Option<String>,
    #[serde(default)]
    items: Vec<ItemPayload>,
}

#[derive(Debug, Deserialize)]
struct ItemPayload {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    column_values: Vec<ColumnValuePayload>,
}

#[derive(Debug, Deserialize)]
struct ColumnValuePayload {
    id: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
    value: Option<serde_json::Value>,
}

/// How a single failed attempt should be treated
#[derive(Debug)]
enum Failure {
    Retryable(String),
    Fatal(FetchError),
}

impl MondayRepository {
    pub fn new(settings: &MondaySettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            token: settings.api_token.clone(),
            api_version: settings.api_version.clone(),
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff(),
        })
    }

    async fn execute_query(&self, board_id: BoardId, variables: serde_json::Value) -> Result<ResponseData, FetchError> {
        let body = json!({ "query": ITEMS_QUERY, "variables": variables });
        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.send_once(board_id, &body).await {
                Ok(data) => return Ok(data),
                Err(Failure::Fatal(e)) => return Err(e),
                Err(Failure::Retryable(message)) => {
                    tracing::warn!(
                        board_id = %board_id,
                        attempt,
                        attempts,
                        "Transient Monday.com failure: {}",
                        message
                    );
                    last_error = message;
                    if attempt < attempts {
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                    }
                }
            }
        }

        Err(FetchError::TransientNetwork {
            attempts,
            message: last_error,
        })
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    async fn send_once(&self, board_id: BoardId, body: &serde_json::Value) -> Result<ResponseData, Failure> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.token)
            .header("API-Version", &self.api_version)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Failure::Retryable(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Failure::Retryable(format!("failed to read response body: {}", e)))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Failure::Fatal(FetchError::Auth(format!("HTTP {}: {}", status, text))));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Failure::Retryable(format!("HTTP {}: {}", status, text)));
        }

        let parsed: GraphQlResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(Failure::Fatal(FetchError::InvalidResponse(format!(
                    "could not decode response: {}",
                    e
                ))));
            }
            Err(_) => {
                return Err(Failure::Fatal(FetchError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status, text
                ))));
            }
        };

        if let Some(failure) = classify_errors(board_id, &parsed) {
            return Err(failure);
        }
        if !status.is_success() {
            return Err(Failure::Fatal(FetchError::InvalidResponse(format!("HTTP {}: {}", status, text))));
        }

        parsed
            .data
            .ok_or_else(|| Failure::Fatal(FetchError::InvalidResponse("response has no data".to_string())))
    }
}

/// Sorts API-level errors into the fetch error taxonomy
fn classify_errors(board_id: BoardId, response: &GraphQlResponse) -> Option<Failure> {
    let mut messages: Vec<String> = response
        .errors
        .iter()
        .map(|e| {
            let code = e
                .extensions
                .as_ref()
                .and_then(|x| x.code.as_deref())
                .unwrap_or_default();
            format!("{} {}", code, e.message)
        })
        .collect();
    if response.error_code.is_some() || response.error_message.is_some() {
        messages.push(format!(
            "{} {}",
            response.error_code.as_deref().unwrap_or_default(),
            response.error_message.as_deref().unwrap_or_default()
        ));
    }
    if messages.is_empty() {
        return None;
    }

    let combined = messages.join("; ").trim().to_string();
    let lower = combined.to_lowercase();

    let failure = if ["unauthorized", "not authenticated", "authentication"]
        .iter()
        .any(|p| lower.contains(p))
    {
        Failure::Fatal(FetchError::Auth(combined))
    } else if ["invalidboardid", "resourcenotfound", "not found", "does not exist"]
        .iter()
        .any(|p| lower.contains(p))
    {
        Failure::Fatal(FetchError::BoardNotFound {
            board_id,
            message: combined,
        })
    } else if ["complexity", "rate limit", "ratelimit", "concurrency", "internal server error"]
        .iter()
        .any(|p| lower.contains(p))
    {
        Failure::Retryable(combined)
    } else {
        Failure::Fatal(FetchError::InvalidResponse(combined))
    };

    Some(failure)
}

fn column_value(payload: ColumnValuePayload, titles: &HashMap<String, String>) -> ColumnValue {
    let value = payload.value.and_then(|v| match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    });

    ColumnValue {
        title: titles.get(&payload.id).cloned().unwrap_or_default(),
        id: payload.id,
        kind: payload.kind,
        text: payload.text,
        value,
    }
}

#[async_trait]
impl BoardRepository for MondayRepository {
    async fn fetch_items(&self, query: &BoardQuery) -> Result<Vec<BoardItem>, FetchError> {
        let board_id = query.board_id;
        let limit = query.page_limit.max(1);
        let mut titles: HashMap<String, String> = HashMap::new();
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page = 0;

        loop {
            page += 1;
            let variables = json!({
                "ids": [board_id.to_string()],
                "limit": limit,
                "cursor": cursor,
            });

            let data = self.execute_query(board_id, variables).await?;
            let Some(board) = data.boards.into_iter().next() else {
                return Err(FetchError::BoardNotFound {
                    board_id,
                    message: "no board returned".to_string(),
                });
            };

            if titles.is_empty() {
                titles = board.columns.into_iter().map(|c| (c.id, c.title)).collect();
            }

            let page_len = board.items_page.items.len();
            items.extend(board.items_page.items.into_iter().map(|item| {
                let values = item
                    .column_values
                    .into_iter()
                    .map(|cv| column_value(cv, &titles))
                    .collect();
                BoardItem::new(item.id, item.name, values)
            }));

            tracing::debug!(
                board_id = %board_id,
                page,
                page_len,
                total = items.len(),
                "Fetched items page"
            );

            let next = board.items_page.cursor.filter(|c| !c.is_empty());
            match next {
                Some(next) if page_len as u32 >= limit => {
                    if cursor.as_deref() == Some(next.as_str()) {
                        tracing::warn!(board_id = %board_id, "Cursor did not advance, stopping pagination");
                        break;
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        tracing::info!(board_id = %board_id, items = items.len(), "Fetched board");
        Ok(items)
    }
}
