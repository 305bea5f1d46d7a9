use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DirectoryError, TopicDirectory};
use crate::config::HttpConfig;
use crate::sync::Topic;

/// bemfa's device type for MQTT topics.
const TOPIC_TYPE: u8 = 2;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TopicEntry {
    topic: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct TopicRequest<'a> {
    uid: &'a str,
    topic: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Parses a bemfa envelope. Any code other than 0 is an error.
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<Option<T>, DirectoryError> {
    let response: ApiResponse<T> = serde_json::from_str(body)?;
    if response.code != 0 {
        return Err(DirectoryError::ApiError {
            code: response.code,
            message: response.message,
        });
    }
    Ok(response.data)
}

fn parse_topics(body: &str) -> Result<BTreeMap<Topic, String>, DirectoryError> {
    let entries: Vec<TopicEntry> = parse_response(body)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .map(|entry| (Topic::from(entry.topic), entry.name))
        .collect())
}

/// Directory client for `api.bemfa.com`.
#[derive(Debug, Clone)]
pub struct BemfaHttp {
    client: Client,
    base_url: String,
    uid: String,
}

impl BemfaHttp {
    pub fn new(uid: &str, config: &HttpConfig) -> Result<Self, DirectoryError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            uid: uid.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn fetch_url(&self) -> String {
        self.url(&format!("device/v1/topic/?uid={}&type={}", self.uid, TOPIC_TYPE))
    }

    fn request<'a>(&'a self, topic: &'a Topic, name: Option<&'a str>) -> TopicRequest<'a> {
        TopicRequest {
            uid: &self.uid,
            topic: topic.as_str(),
            kind: TOPIC_TYPE,
            name,
        }
    }

    async fn post(&self, path: &str, body: &TopicRequest<'_>) -> Result<(), DirectoryError> {
        let body = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_response::<serde_json::Value>(&body)?;
        Ok(())
    }
}

#[async_trait]
impl TopicDirectory for BemfaHttp {
    async fn fetch_all_topics(&self) -> Result<BTreeMap<Topic, String>, DirectoryError> {
        let body = self
            .client
            .get(self.fetch_url())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let topics = parse_topics(&body)?;
        debug!("Fetched {} topics", topics.len());
        Ok(topics)
    }

    async fn create_topic(&self, topic: &Topic, name: &str) -> Result<(), DirectoryError> {
        self.post("user/addtopic/", &self.request(topic, Some(name)))
            .await?;
        info!("Created topic {} ({})", topic, name);
        Ok(())
    }

    async fn rename_topic(&self, topic: &Topic, name: &str) -> Result<(), DirectoryError> {
        self.post("device/v1/topic/name/", &self.request(topic, Some(name)))
            .await?;
        info!("Renamed topic {} to {}", topic, name);
        Ok(())
    }

    async fn delete_topic(&self, topic: &Topic) -> Result<(), DirectoryError> {
        self.post("user/deltopic/", &self.request(topic, None))
            .await?;
        info!("Deleted topic {}", topic);
        Ok(())
    }
}
