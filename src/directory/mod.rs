//! Remote topic directory.
//!
//! bemfa keeps its own list of topics and their display names; the phone
//! app and the voice assistants only see devices listed there. The bridge
//! treats that list as the source of truth for which syncs exist.

mod bemfa_http;

pub use bemfa_http::BemfaHttp;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::sync::Topic;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("bemfa API error {code}: {message}")]
    ApiError { code: i64, message: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    DecodeError(#[from] serde_json::Error),
}

/// Topic CRUD against the remote directory. Creating an existing topic or
/// deleting a missing one may fail remotely but never touches local state.
#[async_trait]
pub trait TopicDirectory: Send + Sync {
    /// Every topic the user owns, with its display name.
    async fn fetch_all_topics(&self) -> Result<BTreeMap<Topic, String>, DirectoryError>;

    async fn create_topic(&self, topic: &Topic, name: &str) -> Result<(), DirectoryError>;

    async fn rename_topic(&self, topic: &Topic, name: &str) -> Result<(), DirectoryError>;

    async fn delete_topic(&self, topic: &Topic) -> Result<(), DirectoryError>;
}
