//! HTTP clients for the two analysis services.
//!
//! The vision analyzer is the primary: its failure fails the attempt.
//! The object detector is secondary: callers tolerate its failure.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use super::{BaseObjectDetector, BaseVideoAnalyzer, FrameDetections, SemanticAnalysis};
use crate::models::Detection;

// =============================================================================
// Primary: semantic video analysis
// =============================================================================

pub struct VisionAnalyzerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct VisionResponse {
    summary: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    events: Vec<String>,
}

impl VisionAnalyzerClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl BaseVideoAnalyzer for VisionAnalyzerClient {
    async fn analyze(&self, segment: Bytes) -> Result<SemanticAnalysis> {
        let url = format!("{}/v1/analyze", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(segment)
            .send()
            .await
            .context("Vision analyzer request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Vision analyzer returned {}", response.status()));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .context("Invalid vision analyzer response")?;
        let parsed: VisionResponse = serde_json::from_value(raw.clone())
            .context("Vision analyzer response missing required fields")?;

        Ok(SemanticAnalysis {
            summary: parsed.summary,
            tags: parsed.tags,
            entities: parsed.entities,
            events: parsed.events,
            raw,
        })
    }
}

// =============================================================================
// Secondary: object detection
// =============================================================================

pub struct DetectorClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct DetectorResponse {
    #[serde(default)]
    frames: Vec<DetectorFrame>,
}

/// Frames come back stamped relative to the submitted segment.
#[derive(Deserialize)]
struct DetectorFrame {
    timestamp: f64,
    #[serde(default)]
    detections: Vec<Detection>,
}

impl DetectorClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl BaseObjectDetector for DetectorClient {
    async fn detect(&self, segment: Bytes, offset_secs: i64) -> Result<Vec<FrameDetections>> {
        let url = format!("{}/v1/detect", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(segment)
            .send()
            .await
            .context("Object detector request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Object detector returned {}", response.status()));
        }

        let body: DetectorResponse = response
            .json()
            .await
            .context("Invalid object detector response")?;

        // Shift segment-relative stamps into source time, so the frame
        // key is stable if the same window is ever analyzed again.
        Ok(body
            .frames
            .into_iter()
            .map(|f| FrameDetections {
                timestamp: f.timestamp + offset_secs as f64,
                detections: f.detections,
            })
            .collect())
    }
}
