use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::BaseSourceRegistry;

/// HTTP client for the media registry, the service that tracks each
/// source's playback state.
pub struct MediaRegistryClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct PlaybackStateResponse {
    duration_seconds: f64,
}

#[derive(Deserialize)]
struct PlaybackRefResponse {
    playback_ref: String,
}

impl MediaRegistryClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl BaseSourceRegistry for MediaRegistryClient {
    async fn source_duration(&self, playback_ref: &str) -> Result<i64> {
        let url = format!("{}/v1/playback/{}/state", self.base_url, playback_ref);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Registry state request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Registry returned {} for playback state",
                response.status()
            ));
        }

        let state: PlaybackStateResponse = response
            .json()
            .await
            .context("Invalid playback state response")?;

        Ok(state.duration_seconds.floor() as i64)
    }

    async fn playback_ref(&self, source_id: Uuid) -> Result<String> {
        let url = format!("{}/v1/sources/{}/playback", self.base_url, source_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Registry playback request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Registry returned {} for playback ref",
                response.status()
            ));
        }

        let body: PlaybackRefResponse = response
            .json()
            .await
            .context("Invalid playback ref response")?;

        Ok(body.playback_ref)
    }
}
