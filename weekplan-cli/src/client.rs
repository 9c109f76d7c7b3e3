//! HTTP client for communicating with weekplan-server

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde_json::Value;

use weekplan_core::CalendarDocument;
use weekplan_core::migrate::migrate;
use weekplan_core::protocol::{
    CLIENT_LAST_MODIFIED, CalendarList, ConflictResponse, CreateResponse, ErrorResponse,
    HealthResponse, SaveResponse,
};

use crate::autosave::Remote;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What the server did with a save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveResult {
    Accepted {
        last_modified: Option<DateTime<Utc>>,
        has_changes: bool,
    },
    /// The server holds a newer document; it wins.
    Conflict {
        server_data: Box<CalendarDocument>,
        server_last_modified: DateTime<Utc>,
    },
}

/// HTTP client for weekplan-server
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorResponse>().await {
        Ok(err) => err.error,
        Err(_) => format!("Server responded with {}", status),
    }
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET /api/health
    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .http
            .get(self.url("/api/health"))
            .send()
            .await
            .context("Failed to connect to server")?;

        if !resp.status().is_success() {
            anyhow::bail!("{}", error_message(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// GET /api/calendar/:id
    pub async fn fetch(&self, calendar_id: &str) -> Result<CalendarDocument> {
        let resp = self
            .http
            .get(self.url(&format!("/api/calendar/{}", calendar_id)))
            .send()
            .await
            .context("Failed to connect to server")?;

        if !resp.status().is_success() {
            anyhow::bail!("{}", error_message(resp).await);
        }

        let raw: Value = resp.json().await.context("Invalid calendar from server")?;
        Ok(migrate(&raw))
    }

    /// POST /api/calendar/:id
    pub async fn save(
        &self,
        calendar_id: &str,
        document: &CalendarDocument,
        client_last_modified: Option<DateTime<Utc>>,
    ) -> Result<SaveResult> {
        let mut body = serde_json::to_value(document)?;
        if let (Some(token), Some(obj)) = (client_last_modified, body.as_object_mut()) {
            obj.insert(
                CLIENT_LAST_MODIFIED.to_string(),
                Value::String(token.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }

        let resp = self
            .http
            .post(self.url(&format!("/api/calendar/{}", calendar_id)))
            .json(&body)
            .send()
            .await
            .context("Failed to connect to server")?;

        match resp.status() {
            StatusCode::CONFLICT => {
                let conflict: ConflictResponse = resp.json().await?;
                Ok(SaveResult::Conflict {
                    server_data: Box::new(conflict.server_data),
                    server_last_modified: conflict.server_last_modified,
                })
            }
            status if status.is_success() => {
                let saved: SaveResponse = resp.json().await?;
                Ok(SaveResult::Accepted {
                    last_modified: saved.last_modified,
                    has_changes: saved.has_changes,
                })
            }
            _ => anyhow::bail!("{}", error_message(resp).await),
        }
    }

    /// POST /api/calendar/new
    pub async fn create(&self, seed: Option<&CalendarDocument>) -> Result<String> {
        let mut request = self.http.post(self.url("/api/calendar/new"));
        if let Some(seed) = seed {
            request = request.json(seed);
        }

        let resp = request.send().await.context("Failed to connect to server")?;
        if !resp.status().is_success() {
            anyhow::bail!("{}", error_message(resp).await);
        }

        let created: CreateResponse = resp.json().await?;
        Ok(created.id)
    }

    /// GET /api/calendars
    pub async fn list(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.url("/api/calendars"))
            .send()
            .await
            .context("Failed to connect to server")?;

        if !resp.status().is_success() {
            anyhow::bail!("{}", error_message(resp).await);
        }

        let list: CalendarList = resp.json().await?;
        Ok(list.calendars)
    }
}

#[async_trait]
impl Remote for Client {
    async fn fetch(&self, calendar_id: &str) -> Result<CalendarDocument> {
        Client::fetch(self, calendar_id).await
    }

    async fn save(
        &self,
        calendar_id: &str,
        document: &CalendarDocument,
        client_last_modified: Option<DateTime<Utc>>,
    ) -> Result<SaveResult> {
        Client::save(self, calendar_id, document, client_last_modified).await
    }
}
