use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,

    // Loop cadence
    pub poll_interval: Duration,
    pub scheduler_interval: Duration,
    pub retry_interval: Duration,

    // Execution limits
    pub max_concurrent_jobs: usize,
    pub max_attempts: i32,
    pub backoff_base: Duration,
    pub processing_timeout: Duration,
    pub segment_timeout: Duration,
    pub analysis_timeout: Duration,

    // Windowing
    pub window_size_secs: i64,
    pub live_window_size_secs: i64,

    // External services
    pub media_registry_url: String,
    pub media_registry_token: String,
    pub vision_api_url: String,
    pub vision_api_key: String,
    pub detector_api_url: String,
    pub detector_api_key: String,
    pub result_webhook_url: Option<String>,
    pub ffmpeg_path: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            poll_interval: secs_var("POLL_INTERVAL_SECS", 5)?,
            scheduler_interval: secs_var("SCHEDULER_INTERVAL_SECS", 60)?,
            retry_interval: secs_var("RETRY_INTERVAL_SECS", 30)?,
            max_concurrent_jobs: env::var("MAX_CONCURRENT_JOBS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("MAX_CONCURRENT_JOBS must be a valid number")?,
            max_attempts: env::var("MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("MAX_ATTEMPTS must be a valid number")?,
            backoff_base: secs_var("BACKOFF_BASE_SECS", 10)?,
            processing_timeout: secs_var("PROCESSING_TIMEOUT_SECS", 900)?,
            segment_timeout: secs_var("SEGMENT_TIMEOUT_SECS", 120)?,
            analysis_timeout: secs_var("ANALYSIS_TIMEOUT_SECS", 180)?,
            window_size_secs: int_var("WINDOW_SIZE_SECS", 60)?,
            live_window_size_secs: int_var("LIVE_WINDOW_SIZE_SECS", 30)?,
            media_registry_url: env::var("MEDIA_REGISTRY_URL")
                .context("MEDIA_REGISTRY_URL must be set")?,
            media_registry_token: env::var("MEDIA_REGISTRY_TOKEN")
                .context("MEDIA_REGISTRY_TOKEN must be set")?,
            vision_api_url: env::var("VISION_API_URL").context("VISION_API_URL must be set")?,
            vision_api_key: env::var("VISION_API_KEY").context("VISION_API_KEY must be set")?,
            detector_api_url: env::var("DETECTOR_API_URL")
                .context("DETECTOR_API_URL must be set")?,
            detector_api_key: env::var("DETECTOR_API_KEY")
                .context("DETECTOR_API_KEY must be set")?,
            result_webhook_url: env::var("RESULT_WEBHOOK_URL").ok(),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
        })
    }
}

fn secs_var(name: &str, default: u64) -> Result<Duration> {
    let secs: u64 = env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a valid number of seconds", name))?;
    Ok(Duration::from_secs(secs))
}

fn int_var(name: &str, default: i64) -> Result<i64> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a valid number", name))
}
