//! Supabase REST implementation of the log store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{LogStore, StoreError};
use crate::config::Config;
use crate::models::StoredLog;

// Everything except the embedding column; pgvector columns come back as
// strings over REST and nothing downstream reads stored vectors anyway.
const READ_COLUMNS: &str =
    "id,level,message,is_anomaly,analysis,service_name,risk_score,attack_type,created_at";

pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct MatchLogsParams<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
}

impl SupabaseStore {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            api_key: config.supabase_key.clone(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

#[async_trait]
impl LogStore for SupabaseStore {
    async fn insert(&self, record: &StoredLog) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/logs", self.base_url);

        let response = self
            .authed(self.client.post(&url))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<StoredLog>, StoreError> {
        let url = format!("{}/rest/v1/rpc/match_logs", self.base_url);

        let response = self
            .authed(self.client.post(&url))
            .json(&MatchLogsParams {
                query_embedding: query,
                match_threshold: threshold,
                match_count: count,
            })
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredLog>, StoreError> {
        let url = format!(
            "{}/rest/v1/logs?select={}&order=created_at.desc&limit={}",
            self.base_url, READ_COLUMNS, limit
        );

        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}
