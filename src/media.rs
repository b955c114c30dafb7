//! Media index access and video launching.
//!
//! The static asset store serves two kinds of JSON under `[media].base_url`:
//!
//! - `keyframes_index.json`: `{ "<videoKey>": ["/keyframes/.../<videoKey>_<n>.jpg", ...] }`
//! - `<videoKey>.json`: `{ "watch_url": ..., "length": ..., "fps": ..., "title": ... }`
//!
//! The keyframes index is large and immutable, so [`HttpMediaSource`] fetches
//! it once and serves later lookups from memory.
//!
//! [`LaunchRequest`] is the body the desktop launcher (see [`crate::server`])
//! accepts; [`LauncherClient`] posts it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use frame_search_core::FrameId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::{LauncherConfig, MediaConfig};

/// Per-video metadata used to turn a frame number into a playback offset.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoInfo {
    pub watch_url: String,
    /// Duration in seconds.
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
}

impl VideoInfo {
    /// The video's fps, or `default_fps` when absent or not positive.
    pub fn effective_fps(&self, default_fps: f64) -> f64 {
        match self.fps {
            Some(fps) if fps > 0.0 => fps,
            _ => default_fps,
        }
    }
}

/// Whole seconds into the video at which `frame_number` appears, clamped to
/// `[0, length - 1]`.
pub fn timestamp_secs(frame_number: u64, info: &VideoInfo, default_fps: f64) -> u64 {
    let fps = info.effective_fps(default_fps);
    let secs = (frame_number as f64 / fps).floor();
    let last = (info.length - 1.0).max(0.0);
    secs.clamp(0.0, last) as u64
}

/// Extract the YouTube video id from a watch, short, or embed URL.
pub fn youtube_video_id(url: &str) -> Option<&str> {
    const MARKERS: [&str; 3] = ["youtube.com/watch?v=", "youtu.be/", "youtube.com/embed/"];
    let rest = MARKERS
        .iter()
        .find_map(|marker| url.find(marker).map(|pos| &url[pos + marker.len()..]))?;
    let end = rest
        .find(|c: char| matches!(c, '&' | '?' | '#' | '\n'))
        .unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}

/// Read access to the static media store.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Keyframe image paths for `video_key`, in index order. A video absent
    /// from the index yields an empty list.
    async fn keyframes(&self, video_key: &str) -> Result<Vec<String>>;

    async fn video_info(&self, video_key: &str) -> Result<VideoInfo>;
}

pub struct HttpMediaSource {
    client: reqwest::Client,
    base_url: String,
    index: OnceCell<HashMap<String, Vec<String>>>,
}

impl HttpMediaSource {
    pub fn new(config: &MediaConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            index: OnceCell::new(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} fetching {}", status.as_u16(), url);
        }
        response
            .json()
            .await
            .with_context(|| format!("Invalid JSON at {}", url))
    }

    async fn index(&self) -> Result<&HashMap<String, Vec<String>>> {
        self.index
            .get_or_try_init(|| async {
                let url = format!("{}/keyframes_index.json", self.base_url);
                let index: HashMap<String, Vec<String>> = self.get_json(&url).await?;
                tracing::info!(videos = index.len(), "loaded keyframes index");
                Ok::<_, anyhow::Error>(index)
            })
            .await
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn keyframes(&self, video_key: &str) -> Result<Vec<String>> {
        let index = self.index().await?;
        match index.get(video_key) {
            Some(paths) => Ok(paths.clone()),
            None => {
                tracing::warn!(video_key, "video not present in keyframes index");
                Ok(Vec::new())
            }
        }
    }

    async fn video_info(&self, video_key: &str) -> Result<VideoInfo> {
        let url = format!("{}/{}.json", self.base_url, video_key);
        self.get_json(&url)
            .await
            .with_context(|| format!("Could not load video info for {}", video_key))
    }
}

// ============ Launcher wire types ============

/// Frame position details that let the launcher seek to the exact frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    pub frame_order: u64,
    pub fps: f64,
    pub video_id: String,
}

/// Body of `POST /launch-mpc`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    #[serde(default)]
    pub youtube_url: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_info: Option<FrameInfo>,
}

impl LaunchRequest {
    pub fn for_frame(frame: &FrameId, info: &VideoInfo, default_fps: f64) -> Self {
        let video_key = frame.video_key();
        let title = info
            .title
            .clone()
            .unwrap_or_else(|| format!("Video {}", video_key));
        Self {
            youtube_url: info.watch_url.clone(),
            timestamp: timestamp_secs(frame.frame_number, info, default_fps),
            video_title: Some(title),
            frame_info: Some(FrameInfo {
                frame_order: frame.frame_number,
                fps: info.effective_fps(default_fps),
                video_id: video_key,
            }),
        }
    }
}

/// Successful `POST /launch-mpc` response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
    pub success: bool,
    pub message: String,
    pub mpc_path: String,
    pub method: String,
    pub url: String,
    pub timestamp: u64,
    pub seek_ms: u64,
}

#[derive(Debug, Deserialize)]
struct LaunchFailure {
    error: String,
    #[serde(default)]
    suggestions: Vec<String>,
}

pub struct LauncherClient {
    client: reqwest::Client,
    base_url: String,
}

impl LauncherClient {
    pub fn new(config: &LauncherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn launch(&self, req: &LaunchRequest) -> Result<LaunchResponse> {
        let url = format!("{}/launch-mpc", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .with_context(|| format!("Launcher not reachable at {}", self.base_url))?;

        if response.status().is_success() {
            return response
                .json()
                .await
                .context("Failed to parse launcher response");
        }

        let status = response.status();
        match response.json::<LaunchFailure>().await {
            Ok(failure) if failure.suggestions.is_empty() => bail!("{}", failure.error),
            Ok(failure) => bail!(
                "{}\n  - {}",
                failure.error,
                failure.suggestions.join("\n  - ")
            ),
            Err(_) => bail!("Launcher returned HTTP {}", status.as_u16()),
        }
    }
}
