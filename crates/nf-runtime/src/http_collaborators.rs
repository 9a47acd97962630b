//! reqwest-backed implementations of the `nf-pipeline` collaborator traits.
//! These are the only places in the workspace that actually reach the
//! network; everything else talks to the `SourceDecoder`/`Ranker`/`Publisher`
//! traits.

use std::time::Duration;

use async_trait::async_trait;
use nf_pipeline::{
    decode_feed_bytes, DecodedEntry, DecoderFailure, PublishFailure, Publisher, RankFailure,
    Ranker, SourceDecoder, TrainingExample,
};
use serde_json::Value;

pub struct HttpSourceDecoder {
    client: reqwest::Client,
}

impl HttpSourceDecoder {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpSourceDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceDecoder for HttpSourceDecoder {
    async fn fetch_entries(&self, source_url: &str) -> Result<Vec<DecodedEntry>, DecoderFailure> {
        let body = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(|e| DecoderFailure::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| DecoderFailure::Fetch(e.to_string()))?
            .text()
            .await
            .map_err(|e| DecoderFailure::Fetch(e.to_string()))?;

        decode_feed_bytes(&body).map_err(DecoderFailure::Parse)
    }
}

pub struct HttpRanker {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpRanker {
    pub fn new(api_base_url: String, timeout_seconds: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("reqwest client build must not fail");
        Self {
            client,
            api_base_url,
        }
    }
}

#[async_trait]
impl Ranker for HttpRanker {
    async fn rank_url(&self, link: &str) -> Result<f64, RankFailure> {
        let url = format!("{}/rank", self.api_base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("url", link)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RankFailure::Timeout
                } else {
                    RankFailure::Http(e.to_string())
                }
            })?
            .error_for_status()
            .map_err(|e| RankFailure::Http(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| RankFailure::Decode(e.to_string()))?;

        body.get("rank")
            .and_then(Value::as_f64)
            .ok_or_else(|| RankFailure::Decode("response missing numeric 'rank' field".to_string()))
    }

    async fn training_set(&self) -> Result<Vec<TrainingExample>, RankFailure> {
        let url = format!("{}/training_set", self.api_base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RankFailure::Timeout
                } else {
                    RankFailure::Http(e.to_string())
                }
            })?
            .error_for_status()
            .map_err(|e| RankFailure::Http(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| RankFailure::Decode(e.to_string()))?;

        let items = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| RankFailure::Decode("response missing 'items' array".to_string()))?;

        items
            .iter()
            .map(|item| {
                let url = item
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RankFailure::Decode("training item missing 'url'".to_string()))?
                    .to_string();
                let score = item
                    .get("score")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| RankFailure::Decode("training item missing 'score'".to_string()))?;
                Ok(TrainingExample { url, score })
            })
            .collect()
    }
}

pub struct HttpPublisher {
    client: reqwest::Client,
    webhook_url: String,
}

impl HttpPublisher {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, message: &str) -> Result<(), PublishFailure> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "content": message }))
            .send()
            .await
            .map_err(|e| PublishFailure::classify(&e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let raw = format!("status={status} body={body}");
        Err(PublishFailure::classify(&raw))
    }
}
