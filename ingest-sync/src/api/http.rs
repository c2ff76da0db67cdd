//! HTTP implementation of the recorder API
//!
//! JSON over HTTP with reqwest. Non-success statuses surface as
//! `Error::Http`, connection problems and timeouts as `Error::Transport`,
//! bad bodies as `Error::Decode` / `Error::ProtocolVersion`.

use super::RemoteApi;
use crate::error::{Error, Result};
use async_trait::async_trait;
use ingest_common::api::{
    decode, ActionAck, CacheContentsPayload, ClipMarksPayload, CommentsEcho, CommentsPayload,
    CommentsRequest, ItemClipEcho, ItemListPayload, ItemMutationRequest, ItemOrderEcho,
    SessionAction, StatusPayload, Validate,
};
use ingest_common::config::ClientConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Recorder API client
#[derive(Debug, Clone)]
pub struct HttpApi {
    /// HTTP client for API requests
    client: Client,
    /// Base URL without trailing slash, e.g. `http://localhost:7000`
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            config.server_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Body bytes of a successful response
    async fn body(response: reqwest::Response) -> Result<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response body: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn get_raw(&self, path: &str) -> Result<Vec<u8>> {
        debug!("GET {}", path);
        let response = self.client.get(self.url(path)).send().await?;
        Self::body(response).await
    }

    async fn get<T: DeserializeOwned + Validate>(&self, path: &str) -> Result<T> {
        let bytes = self.get_raw(path).await?;
        Ok(decode(&bytes)?)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Validate,
    {
        debug!("POST {}", path);
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let bytes = Self::body(response).await?;
        Ok(decode(&bytes)?)
    }

    async fn item_mutation(&self, id: i64, index: usize, verb: &str) -> Result<ItemOrderEcho> {
        self.post(
            &format!("/api/items/{}/{}", id, verb),
            &ItemMutationRequest { index },
        )
        .await
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn fetch_status(&self) -> Result<StatusPayload> {
        let bytes = self.get_raw("/api/status").await?;
        Ok(StatusPayload::decode(&bytes)?)
    }

    async fn fetch_item_list(&self) -> Result<ItemListPayload> {
        self.get("/api/items").await
    }

    async fn fetch_clip_marks(&self) -> Result<ClipMarksPayload> {
        self.get("/api/items/clips").await
    }

    async fn fetch_comments(&self) -> Result<CommentsPayload> {
        self.get("/api/comments").await
    }

    async fn fetch_cache_contents(&self) -> Result<CacheContentsPayload> {
        self.get("/api/cache").await
    }

    async fn move_item_up(&self, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.item_mutation(id, index, "move-up").await
    }

    async fn move_item_down(&self, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.item_mutation(id, index, "move-down").await
    }

    async fn enable_item(&self, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.item_mutation(id, index, "enable").await
    }

    async fn disable_item(&self, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.item_mutation(id, index, "disable").await
    }

    async fn mark_item_boundary(&self) -> Result<ItemClipEcho> {
        self.post("/api/items/mark", &serde_json::json!({})).await
    }

    async fn clear_item_boundary(&self) -> Result<ItemClipEcho> {
        self.post("/api/items/clear", &serde_json::json!({})).await
    }

    async fn save_comments(&self, text: &str) -> Result<CommentsEcho> {
        self.post(
            "/api/comments",
            &CommentsRequest {
                text: text.to_string(),
            },
        )
        .await
    }

    async fn session_action(&self, action: SessionAction) -> Result<ActionAck> {
        self.post(
            &format!("/api/session/{}", action.path()),
            &serde_json::json!({}),
        )
        .await
    }
}
