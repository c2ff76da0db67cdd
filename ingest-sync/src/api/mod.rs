//! Remote recorder API
//!
//! `RemoteApi` is the seam between the sync engine and the transport. The
//! engine only ever sees typed, validated payloads; `HttpApi` is the
//! production implementation, tests substitute scripted fakes.

pub mod http;

pub use http::HttpApi;

use crate::error::Result;
use async_trait::async_trait;
use ingest_common::api::{
    ActionAck, CacheContentsPayload, ClipMarksPayload, CommentsEcho, CommentsPayload,
    ItemClipEcho, ItemListPayload, ItemOrderEcho, SessionAction, StatusPayload,
};

/// Operations the sync engine consumes
///
/// Mutations return the post-mutation value of the counter they affect.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Aggregate session status
    async fn fetch_status(&self) -> Result<StatusPayload>;

    async fn fetch_item_list(&self) -> Result<ItemListPayload>;

    async fn fetch_clip_marks(&self) -> Result<ClipMarksPayload>;

    async fn fetch_comments(&self) -> Result<CommentsPayload>;

    async fn fetch_cache_contents(&self) -> Result<CacheContentsPayload>;

    /// `index` is where the client believes the item is; the server uses it
    /// to detect a stale client view
    async fn move_item_up(&self, id: i64, index: usize) -> Result<ItemOrderEcho>;

    async fn move_item_down(&self, id: i64, index: usize) -> Result<ItemOrderEcho>;

    async fn enable_item(&self, id: i64, index: usize) -> Result<ItemOrderEcho>;

    async fn disable_item(&self, id: i64, index: usize) -> Result<ItemOrderEcho>;

    /// Mark an item boundary at the current review position
    async fn mark_item_boundary(&self) -> Result<ItemClipEcho>;

    async fn clear_item_boundary(&self) -> Result<ItemClipEcho>;

    async fn save_comments(&self, text: &str) -> Result<CommentsEcho>;

    async fn session_action(&self, action: SessionAction) -> Result<ActionAck>;
}
