//! Post-commit result notification.
//!
//! A best-effort side channel fired after a result row and its status
//! transition have committed - typically consumed by a search indexer.
//! Callers log and swallow errors; nothing here may affect job status.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use super::BaseResultNotifier;

/// POSTs a small JSON event to a configured webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl BaseResultNotifier for WebhookNotifier {
    async fn result_persisted(
        &self,
        job_id: Uuid,
        source_id: Uuid,
        result_id: Uuid,
    ) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "event": "analysis_result_persisted",
                "job_id": job_id,
                "source_id": source_id,
                "result_id": result_id,
            }))
            .send()
            .await
            .context("Result webhook request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Result webhook returned {}", response.status()));
        }

        Ok(())
    }
}

/// Used when no webhook is configured.
pub struct NoopNotifier;

#[async_trait]
impl BaseResultNotifier for NoopNotifier {
    async fn result_persisted(&self, _: Uuid, _: Uuid, _: Uuid) -> Result<()> {
        Ok(())
    }
}
