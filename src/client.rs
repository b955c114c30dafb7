//! Search API client.
//!
//! Defines the [`SearchBackend`] trait and [`HttpSearchBackend`], which talks
//! to the external retrieval service:
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/search` | form: `query, topK, mode, caption_mode, alpha` |
//! | `POST` | `/search` | multipart: `file, topK, mode=image` |
//! | `POST` | `/temporal_search` | form: `events` (JSON array), `topK, mode, caption_mode, alpha, search_mode` |
//!
//! The service reports some failures as HTTP 200 with an `{"error": "..."}`
//! body; those are surfaced as errors like any non-2xx status.
//!
//! No retries are attempted. A failed call is reported to the session,
//! which keeps its previous results.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use frame_search_core::models::{RawHit, RawTimeline, TemporalPayload, TemporalStrategy};
use frame_search_core::session::{SearchRequest, TemporalRequest};
use serde::Deserialize;
use std::time::Duration;

use crate::config::BackendConfig;

/// Tunnels such as ngrok interpose a warning page unless told otherwise.
const SKIP_BROWSER_WARNING: (&str, &str) = ("ngrok-skip-browser-warning", "true");

/// The external search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a text or image search against `base_url`.
    async fn search(&self, base_url: &str, req: &SearchRequest) -> Result<Vec<RawHit>>;

    /// Run a multi-event temporal search against `base_url`.
    async fn temporal_search(&self, base_url: &str, req: &TemporalRequest)
        -> Result<TemporalPayload>;
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    results: Option<Vec<RawHit>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemporalEnvelope {
    #[serde(default)]
    results: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// [`SearchBackend`] over HTTP via `reqwest`.
pub struct HttpSearchBackend {
    client: reqwest::Client,
}

impl HttpSearchBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, base_url: &str, req: &SearchRequest) -> Result<Vec<RawHit>> {
        let url = format!("{}/search", base_url);

        let builder = match req {
            SearchRequest::Text {
                query,
                top_k,
                strategy,
                caption_model,
                alpha,
            } => self.client.post(&url).form(&[
                ("query", query.clone()),
                ("topK", top_k.to_string()),
                ("mode", strategy.as_str().to_string()),
                ("caption_mode", caption_model.as_str().to_string()),
                ("alpha", alpha.to_string()),
            ]),
            SearchRequest::Image {
                file_name,
                bytes,
                top_k,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone());
                let form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("topK", top_k.to_string())
                    .text("mode", "image")
                    .text("query", "");
                self.client.post(&url).multipart(form)
            }
        };

        tracing::debug!(%url, "sending search request");
        let response = builder
            .header(SKIP_BROWSER_WARNING.0, SKIP_BROWSER_WARNING.1)
            .send()
            .await
            .with_context(|| format!("Failed to reach search backend at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("HTTP {}: {}", status.as_u16(), body);
        }

        let envelope: SearchEnvelope = response
            .json()
            .await
            .context("Failed to parse search response")?;

        if let Some(err) = envelope.error {
            bail!("backend error: {}", err);
        }
        Ok(envelope.results.unwrap_or_default())
    }

    async fn temporal_search(
        &self,
        base_url: &str,
        req: &TemporalRequest,
    ) -> Result<TemporalPayload> {
        let url = format!("{}/temporal_search", base_url);
        let events = serde_json::to_string(&req.events)?;

        tracing::debug!(
            %url,
            events = req.events.len(),
            mode = %req.search_mode,
            "sending temporal search request"
        );
        let response = self
            .client
            .post(&url)
            .header(SKIP_BROWSER_WARNING.0, SKIP_BROWSER_WARNING.1)
            .form(&[
                ("events", events),
                ("topK", req.top_k.to_string()),
                ("mode", req.strategy.as_str().to_string()),
                ("caption_mode", req.caption_model.as_str().to_string()),
                ("alpha", req.alpha.to_string()),
                ("search_mode", req.search_mode.as_str().to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach search backend at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("HTTP {}: {}", status.as_u16(), body);
        }

        let envelope: TemporalEnvelope = response
            .json()
            .await
            .context("Failed to parse temporal search response")?;

        if let Some(err) = envelope.error {
            bail!("backend error: {}", err);
        }
        parse_temporal_results(req.search_mode, envelope.results.unwrap_or_default())
    }
}

/// Decode the `results` value according to the requested mode.
fn parse_temporal_results(
    mode: TemporalStrategy,
    results: serde_json::Value,
) -> Result<TemporalPayload> {
    if results.is_null() {
        return Ok(match mode {
            TemporalStrategy::Progressive => TemporalPayload::Progressive(Vec::new()),
            TemporalStrategy::Consolidated => TemporalPayload::Consolidated(Vec::new()),
        });
    }
    match mode {
        TemporalStrategy::Progressive => {
            let steps: Vec<Vec<RawHit>> = serde_json::from_value(results)
                .context("Invalid progressive temporal results: expected one list per event")?;
            Ok(TemporalPayload::Progressive(steps))
        }
        TemporalStrategy::Consolidated => {
            let timelines: Vec<RawTimeline> = serde_json::from_value(results)
                .context("Invalid consolidated temporal results: expected video timelines")?;
            Ok(TemporalPayload::Consolidated(timelines))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_progressive() {
        let value = json!([
            [{"image": "L01_V001_5", "caption": "c", "score": 0.4}],
            [{"image": "L01_V001_9"}, {"image": "L01_V002_1"}]
        ]);
        match parse_temporal_results(TemporalStrategy::Progressive, value).unwrap() {
            TemporalPayload::Progressive(steps) => {
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[1][1].image, "L01_V002_1");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_parse_consolidated() {
        let value = json!([
            {"video_id": "L05_V012", "score": 1.5, "image": ["L05_V012_100", "L05_V012_400"]}
        ]);
        match parse_temporal_results(TemporalStrategy::Consolidated, value).unwrap() {
            TemporalPayload::Consolidated(timelines) => {
                assert_eq!(timelines[0].video_id, "L05_V012");
                assert_eq!(timelines[0].image.len(), 2);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_parse_shape_mismatch_is_error() {
        let value = json!([{"video_id": "L05_V012", "image": []}]);
        assert!(parse_temporal_results(TemporalStrategy::Progressive, value).is_err());
    }

    #[test]
    fn test_parse_null_is_empty() {
        assert_eq!(
            parse_temporal_results(TemporalStrategy::Consolidated, serde_json::Value::Null)
                .unwrap(),
            TemporalPayload::Consolidated(Vec::new())
        );
    }

    #[test]
    fn test_error_envelope_decodes() {
        let env: SearchEnvelope =
            serde_json::from_str(r#"{"error": "No query provided for text mode"}"#).unwrap();
        assert!(env.results.is_none());
        assert_eq!(env.error.as_deref(), Some("No query provided for text mode"));
    }
}
