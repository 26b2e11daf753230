//! Video source model.
//!
//! Sources are written by the ingest service and read-mostly here. The
//! pipeline only ever flips `analysis_complete`, which marks a finished
//! source as fully scheduled so the scanner stops revisiting it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::common::Record;

/// Ingest status a source must reach before scheduling considers it.
pub const SOURCE_STATUS_READY: &str = "ready";

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    /// Parent-stream association. Sources without one are never scheduled.
    pub stream_id: Option<String>,
    pub playback_ref: Option<String>,
    pub status: String,
    pub is_live: bool,
    /// Authoritative only once the source has finished; stale while live.
    pub duration_seconds: Option<i64>,
    /// Epoch base for live addressing: relative offsets project onto
    /// absolute program time from here.
    pub started_at: DateTime<Utc>,
    pub analysis_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    /// Sources eligible for a scheduling pass: ingest finished, attached to
    /// a parent stream, and not yet fully scheduled.
    pub async fn find_schedulable(db: &PgPool) -> Result<Vec<Self>> {
        let sources = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, stream_id, playback_ref, status, is_live,
                   duration_seconds, started_at, analysis_complete,
                   created_at, updated_at
            FROM sources
            WHERE status = $1
              AND stream_id IS NOT NULL
              AND NOT analysis_complete
            ORDER BY created_at ASC
            "#,
        )
        .bind(SOURCE_STATUS_READY)
        .fetch_all(db)
        .await?;

        Ok(sources)
    }

    /// Mark a source as fully scheduled. Once set, the scheduler never
    /// revisits it, so any remaining partial window is dropped for good.
    pub async fn mark_analysis_complete(id: Uuid, db: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources
            SET analysis_complete = TRUE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Epoch seconds of the source's start, the base for live addressing.
    pub fn start_epoch(&self) -> i64 {
        self.started_at.timestamp()
    }
}

#[async_trait]
impl Record for Source {
    const TABLE: &'static str = "sources";
    type Id = Uuid;

    async fn find_by_id(id: Uuid, db: &PgPool) -> Result<Self> {
        let source = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, stream_id, playback_ref, status, is_live,
                   duration_seconds, started_at, analysis_complete,
                   created_at, updated_at
            FROM sources
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await?;

        Ok(source)
    }

    async fn insert(&self, db: &PgPool) -> Result<Self> {
        let source = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO sources (
                id, name, stream_id, playback_ref, status, is_live,
                duration_seconds, started_at, analysis_complete,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, name, stream_id, playback_ref, status, is_live,
                      duration_seconds, started_at, analysis_complete,
                      created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.stream_id)
        .bind(&self.playback_ref)
        .bind(&self.status)
        .bind(self.is_live)
        .bind(self.duration_seconds)
        .bind(self.started_at)
        .bind(self.analysis_complete)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(db)
        .await?;

        Ok(source)
    }

    async fn update(&self, db: &PgPool) -> Result<Self> {
        let source = sqlx::query_as::<_, Self>(
            r#"
            UPDATE sources SET
                name = $1, stream_id = $2, playback_ref = $3, status = $4,
                is_live = $5, duration_seconds = $6, started_at = $7,
                analysis_complete = $8, updated_at = NOW()
            WHERE id = $9
            RETURNING id, name, stream_id, playback_ref, status, is_live,
                      duration_seconds, started_at, analysis_complete,
                      created_at, updated_at
            "#,
        )
        .bind(&self.name)
        .bind(&self.stream_id)
        .bind(&self.playback_ref)
        .bind(&self.status)
        .bind(self.is_live)
        .bind(self.duration_seconds)
        .bind(self.started_at)
        .bind(self.analysis_complete)
        .bind(self.id)
        .fetch_one(db)
        .await?;

        Ok(source)
    }
}
