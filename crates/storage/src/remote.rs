//! Hosted record store: one row per `(user_id, chapter_id)` behind a
//! PostgREST-style HTTP API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use companion_core::model::{ChapterId, ChapterProgress, ToolId, UserId};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::repository::{BackendKind, ProgressBackend, ProgressMap, Storage, StorageError};

/// Table holding progress rows.
pub const DEFAULT_PROGRESS_TABLE: &str = "user_progress";

const CONFLICT_TARGET: &str = "user_id,chapter_id";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

/// Connection parameters for the hosted backend.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub table: String,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
            table: DEFAULT_PROGRESS_TABLE.to_owned(),
        }
    }

    /// Resource URL of the progress table.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the endpoint cannot be joined.
    pub fn table_url(&self) -> Result<Url, StorageError> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/rest/v1/{}", self.table))
            .map_err(|err| StorageError::Connection(err.to_string()))
    }
}

/// Row shape of the remote table. Timestamps are maintained by the server
/// and never sent. Progress columns are nullable; a null reads as the
/// default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRow {
    pub user_id: UserId,
    pub chapter_id: ChapterId,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub quiz_score: Option<u32>,
    #[serde(default)]
    pub quiz_completed: Option<bool>,
    #[serde(default)]
    pub time_spent: Option<f64>,
    #[serde(default)]
    pub tools_used: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRow {
    #[must_use]
    pub fn from_progress(user_id: UserId, record: &ChapterProgress) -> Self {
        Self {
            user_id,
            chapter_id: record.chapter_id,
            completed: Some(record.completed),
            quiz_score: Some(record.quiz_score),
            quiz_completed: Some(record.quiz_completed),
            time_spent: Some(record.time_spent),
            tools_used: Some(
                record
                    .tools_used
                    .iter()
                    .map(|tool| tool.as_str().to_owned())
                    .collect(),
            ),
            notes: Some(record.notes.clone()),
            created_at: None,
            updated_at: None,
        }
    }

    /// Convert back into the domain record. Nulls become defaults and blank
    /// tool ids are dropped.
    #[must_use]
    pub fn into_progress(self) -> ChapterProgress {
        ChapterProgress {
            chapter_id: self.chapter_id,
            completed: self.completed.unwrap_or_default(),
            quiz_score: self.quiz_score.unwrap_or_default(),
            quiz_completed: self.quiz_completed.unwrap_or_default(),
            time_spent: self.time_spent.unwrap_or_default().max(0.0),
            tools_used: self
                .tools_used
                .unwrap_or_default()
                .into_iter()
                .filter_map(|tool| ToolId::new(tool).ok())
                .collect(),
            notes: self.notes.unwrap_or_default(),
        }
    }
}

/// Progress backend for a signed-in user.
#[derive(Clone)]
pub struct RemoteProgressBackend {
    client: Client,
    config: RemoteConfig,
    user_id: UserId,
    access_token: Option<String>,
}

impl RemoteProgressBackend {
    #[must_use]
    pub fn new(config: RemoteConfig, user_id: UserId, access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            config,
            user_id,
            access_token,
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxy settings).
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn headers(&self) -> Result<HeaderMap, StorageError> {
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(self.config.api_key.as_str());

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.config.api_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {bearer}"))?);
        Ok(headers)
    }

    fn select_url(&self) -> Result<Url, StorageError> {
        let mut url = self.config.table_url()?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{}", self.user_id))
            .append_pair("select", "*");
        Ok(url)
    }

    fn upsert_url(&self) -> Result<Url, StorageError> {
        let mut url = self.config.table_url()?;
        url.query_pairs_mut()
            .append_pair("on_conflict", CONFLICT_TARGET);
        Ok(url)
    }
}

impl Storage {
    /// Build a `Storage` that persists to the hosted record store as `user_id`.
    #[must_use]
    pub fn remote(config: RemoteConfig, user_id: UserId, access_token: Option<String>) -> Self {
        Self {
            progress: Arc::new(RemoteProgressBackend::new(config, user_id, access_token)),
        }
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, StorageError> {
    HeaderValue::from_str(raw).map_err(|err| StorageError::Connection(err.to_string()))
}

fn transport(err: reqwest::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ProgressBackend for RemoteProgressBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn load_all(&self) -> Result<ProgressMap, StorageError> {
        let response = self
            .client
            .get(self.select_url()?)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<ProgressRow> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        debug!(user = %self.user_id, rows = rows.len(), "loaded remote progress");
        Ok(rows
            .into_iter()
            .map(|row| {
                let record = row.into_progress();
                (record.chapter_id, record)
            })
            .collect())
    }

    async fn save(
        &self,
        changed: &ChapterProgress,
        _all: &ProgressMap,
    ) -> Result<(), StorageError> {
        let row = ProgressRow::from_progress(self.user_id, changed);
        let response = self
            .client
            .post(self.upsert_url()?)
            .headers(self.headers()?)
            .header("Prefer", UPSERT_PREFERENCE)
            .json(&[row])
            .send()
            .await
            .map_err(transport)?;

        ensure_success(response).await?;
        debug!(user = %self.user_id, chapter = %changed.chapter_id, "upserted remote progress");
        Ok(())
    }
}
