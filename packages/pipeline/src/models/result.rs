//! Analysis output models.
//!
//! One `AnalysisResult` row per succeeded job, plus zero or more
//! `DetectionFrame` rows when the object detector produced anything.
//! These rows are the sole artifacts downstream indexing and UI layers
//! consume.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow, Debug, Clone)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub job_id: Uuid,
    pub summary: String,
    pub tags: Json<Vec<String>>,
    pub entities: Json<Vec<String>>,
    pub events: Json<Vec<String>>,
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(
        job_id: Uuid,
        summary: String,
        tags: Vec<String>,
        entities: Vec<String>,
        events: Vec<String>,
        raw_payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            summary,
            tags: Json(tags),
            entities: Json(entities),
            events: Json(events),
            raw_payload,
            created_at: Utc::now(),
        }
    }

    pub async fn insert(&self, db: &PgPool) -> Result<Self> {
        let result = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO analysis_results (
                id, job_id, summary, tags, entities, events, raw_payload, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, job_id, summary, tags, entities, events, raw_payload, created_at
            "#,
        )
        .bind(self.id)
        .bind(self.job_id)
        .bind(&self.summary)
        .bind(&self.tags)
        .bind(&self.entities)
        .bind(&self.events)
        .bind(&self.raw_payload)
        .bind(self.created_at)
        .fetch_one(db)
        .await?;

        Ok(result)
    }

    pub async fn find_by_job(job_id: Uuid, db: &PgPool) -> Result<Option<Self>> {
        let result = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, job_id, summary, tags, entities, events, raw_payload, created_at
            FROM analysis_results
            WHERE job_id = $1
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .fetch_optional(db)
        .await?;

        Ok(result)
    }
}

/// A single detected object within a frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    /// Bounding box as [x, y, width, height] in normalized coordinates.
    pub bbox: [f64; 4],
}

/// One analyzed frame with its detections, timestamped in source-relative
/// seconds so the key is stable across re-analysis of the same window.
#[derive(FromRow, Debug, Clone)]
pub struct DetectionFrame {
    pub id: Uuid,
    pub job_id: Uuid,
    pub frame_timestamp: f64,
    pub detections: Json<Vec<Detection>>,
    pub created_at: DateTime<Utc>,
}

impl DetectionFrame {
    pub fn new(job_id: Uuid, frame_timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            frame_timestamp,
            detections: Json(detections),
            created_at: Utc::now(),
        }
    }

    /// Insert a batch of frames, ignoring frames already recorded for this
    /// job. Returns the number of rows actually written.
    pub async fn insert_batch(frames: &[Self], db: &PgPool) -> Result<u64> {
        let mut written = 0;
        for frame in frames {
            let result = sqlx::query(
                r#"
                INSERT INTO detection_frames (
                    id, job_id, frame_timestamp, detections, created_at
                )
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (job_id, frame_timestamp) DO NOTHING
                "#,
            )
            .bind(frame.id)
            .bind(frame.job_id)
            .bind(frame.frame_timestamp)
            .bind(&frame.detections)
            .bind(frame.created_at)
            .execute(db)
            .await?;
            written += result.rows_affected();
        }

        Ok(written)
    }

    pub async fn count_for_job(job_id: Uuid, db: &PgPool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM detection_frames WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_one(db)
        .await?;

        Ok(count)
    }
}
