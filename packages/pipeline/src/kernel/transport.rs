//! Segment fetch + transcode.
//!
//! Downloads one window's media from the playback endpoint and normalizes
//! it through ffmpeg so both analyzers always see the same container and
//! codec, whatever the source produced. Scratch files live in a temp
//! directory that is released on every exit path, including failure.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::debug;

use super::{BaseSegmentTransport, SegmentRequest};
use crate::kernel::jobs::SourceKind;

pub struct FfmpegSegmentTransport {
    client: reqwest::Client,
    ffmpeg_path: String,
}

impl FfmpegSegmentTransport {
    pub fn new(ffmpeg_path: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            ffmpeg_path,
        }
    }

    /// The playback ref is a base playback URL; the range rides on query
    /// parameters whose names differ by addressing scheme. Live playback
    /// endpoints take absolute program time, finished ones asset-relative
    /// clip bounds.
    fn segment_url(request: &SegmentRequest) -> String {
        match request.kind {
            SourceKind::Live => format!(
                "{}/segment.mp4?program_start={}&program_end={}",
                request.playback_ref, request.start, request.end
            ),
            SourceKind::Finished => format!(
                "{}/segment.mp4?start={}&end={}",
                request.playback_ref, request.start, request.end
            ),
        }
    }
}

#[async_trait]
impl BaseSegmentTransport for FfmpegSegmentTransport {
    async fn fetch_segment(&self, request: &SegmentRequest) -> Result<Bytes> {
        let url = Self::segment_url(request);
        debug!(url = %url, "fetching segment");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Segment download failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Playback endpoint returned {} for segment",
                response.status()
            ));
        }

        let raw = response
            .bytes()
            .await
            .context("Segment download interrupted")?;

        // Scratch space; dropped (and deleted) on every path out of here.
        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
        let input_path = scratch.path().join("segment.raw");
        let output_path = scratch.path().join("segment.mp4");

        tokio::fs::write(&input_path, &raw)
            .await
            .context("Failed to write segment scratch file")?;

        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(&input_path)
            .args([
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-crf",
                "23",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
            ])
            .arg(&output_path)
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or("no output")
            ));
        }

        let transcoded = tokio::fs::read(&output_path)
            .await
            .context("Failed to read transcoded segment")?;

        Ok(Bytes::from(transcoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_segments_address_by_program_time() {
        let request = SegmentRequest {
            playback_ref: "https://play.example.com/abc".to_string(),
            kind: SourceKind::Live,
            start: 1_700_000_000,
            end: 1_700_000_030,
        };
        assert_eq!(
            FfmpegSegmentTransport::segment_url(&request),
            "https://play.example.com/abc/segment.mp4?program_start=1700000000&program_end=1700000030"
        );
    }

    #[test]
    fn finished_segments_address_by_asset_time() {
        let request = SegmentRequest {
            playback_ref: "https://play.example.com/abc".to_string(),
            kind: SourceKind::Finished,
            start: 60,
            end: 120,
        };
        assert_eq!(
            FfmpegSegmentTransport::segment_url(&request),
            "https://play.example.com/abc/segment.mp4?start=60&end=120"
        );
    }
}
