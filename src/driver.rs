//! Async search driver.
//!
//! [`Session`] wraps a [`SessionController`] with the collaborators it needs
//! to make progress: a [`SearchBackend`] for searches and a [`MediaSource`]
//! for keyframe listings and video metadata.
//!
//! The controller lock is held only while starting or completing a search,
//! never across the HTTP call. Two overlapping submissions therefore both
//! reach the backend; the controller's generation check decides which
//! response is applied.

use anyhow::{Context, Result};
use frame_search_core::models::TemporalPayload;
use frame_search_core::session::{Completion, SessionController, SubmitError};
use frame_search_core::trake::Keyframe;
use frame_search_core::{parse_frame_id, FrameId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::client::SearchBackend;
use crate::media::{LaunchRequest, MediaSource};

/// Outcome of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    /// Rejected before any network call.
    Rejected(SubmitError),
    /// The request ran; the response was applied or dropped as stale.
    Finished(Completion),
}

pub struct Session {
    controller: Mutex<SessionController>,
    backend: Arc<dyn SearchBackend>,
    media: Arc<dyn MediaSource>,
    timeout: Duration,
    default_fps: f64,
}

impl Session {
    pub fn new(
        controller: SessionController,
        backend: Arc<dyn SearchBackend>,
        media: Arc<dyn MediaSource>,
        timeout: Duration,
        default_fps: f64,
    ) -> Self {
        Self {
            controller: Mutex::new(controller),
            backend,
            media,
            timeout,
            default_fps,
        }
    }

    /// Run `f` against the controller under the lock.
    pub async fn with<R>(&self, f: impl FnOnce(&mut SessionController) -> R) -> R {
        let mut controller = self.controller.lock().await;
        f(&mut controller)
    }

    /// A copy of the current state for rendering.
    pub async fn snapshot(&self) -> SessionController {
        self.controller.lock().await.clone()
    }

    pub async fn submit_search(&self) -> Submitted {
        let ticket = match self.controller.lock().await.begin_search() {
            Ok(ticket) => ticket,
            Err(e) => return Submitted::Rejected(e),
        };

        tracing::info!(generation = ticket.generation, "search started");
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.backend.search(&ticket.backend_url, &ticket.request),
        )
        .await
        .unwrap_or_else(|_| Err(timed_out(self.timeout)));
        let elapsed = started.elapsed();

        if let Ok(hits) = &outcome {
            tracing::info!(
                generation = ticket.generation,
                results = hits.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "search finished"
            );
        }

        let completion = self.controller.lock().await.complete_search(
            ticket.generation,
            outcome.map_err(|e| format!("{:#}", e)),
            elapsed,
        );
        log_completion(ticket.generation, completion);
        Submitted::Finished(completion)
    }

    pub async fn submit_temporal_search(&self) -> Submitted {
        let ticket = match self.controller.lock().await.begin_temporal_search() {
            Ok(ticket) => ticket,
            Err(e) => return Submitted::Rejected(e),
        };

        tracing::info!(
            generation = ticket.generation,
            events = ticket.request.events.len(),
            mode = %ticket.request.search_mode,
            "temporal search started"
        );
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.backend
                .temporal_search(&ticket.backend_url, &ticket.request),
        )
        .await
        .unwrap_or_else(|_| Err(timed_out(self.timeout)));
        let elapsed = started.elapsed();

        if let Ok(payload) = &outcome {
            let results = match payload {
                TemporalPayload::Progressive(steps) => steps.last().map_or(0, Vec::len),
                TemporalPayload::Consolidated(timelines) => timelines.len(),
            };
            tracing::info!(
                generation = ticket.generation,
                results,
                elapsed_ms = elapsed.as_millis() as u64,
                "temporal search finished"
            );
        }

        let completion = self.controller.lock().await.complete_temporal_search(
            ticket.generation,
            outcome.map_err(|e| format!("{:#}", e)),
            elapsed,
        );
        log_completion(ticket.generation, completion);
        Submitted::Finished(completion)
    }

    /// Select the video containing `raw_id` for TRAKE and load its keyframes.
    ///
    /// Media failures degrade to an empty frame strip. Returns the number of
    /// frames loaded, or `None` if another video was selected meanwhile.
    pub async fn select_video_for_trake(&self, raw_id: &str) -> Result<Option<usize>> {
        let video_key = self.controller.lock().await.begin_trake_selection(raw_id)?;

        let frames = self.fetch_keyframes(&video_key).await;
        let count = frames.len();
        let loaded = self
            .controller
            .lock()
            .await
            .load_trake_frames(&video_key, frames);
        Ok(loaded.then_some(count))
    }

    /// All keyframes of `video_key`, ascending. Unparseable index entries and
    /// media failures are logged and skipped.
    pub async fn fetch_keyframes(&self, video_key: &str) -> Vec<Keyframe> {
        let paths = match self.media.keyframes(video_key).await {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(video_key, error = %format!("{:#}", e), "failed to load keyframes");
                return Vec::new();
            }
        };

        let mut frames: Vec<Keyframe> = paths
            .iter()
            .filter_map(|path| {
                let frame = Keyframe::from_image_path(video_key, path);
                if frame.is_none() {
                    tracing::debug!(path, "skipping keyframe path without frame number");
                }
                frame
            })
            .collect();
        frames.sort_by_key(|f| f.frame_number);
        frames
    }

    /// Build the launcher request for a result frame.
    pub async fn launch_request(&self, raw_id: &str) -> Result<LaunchRequest> {
        let frame: FrameId =
            parse_frame_id(raw_id).with_context(|| format!("Invalid frame id '{}'", raw_id))?;
        let info = self.media.video_info(&frame.video_key()).await?;
        Ok(LaunchRequest::for_frame(&frame, &info, self.default_fps))
    }
}

fn timed_out(timeout: Duration) -> anyhow::Error {
    anyhow::anyhow!("request timed out after {:?}", timeout)
}

fn log_completion(generation: u64, completion: Completion) {
    if completion == Completion::Superseded {
        tracing::info!(generation, "discarding response from superseded search");
    }
}
