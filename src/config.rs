//! TOML configuration.
//!
//! ```toml
//! [backend]
//! url = "https://xxxx.ngrok-free.app"
//! timeout_secs = 60
//!
//! [media]
//! base_url = "http://localhost:3000/media-info"
//!
//! [search]
//! top_k = 20
//! strategy = "hybrid"
//! alpha = 0.5
//! caption_model = "bge"
//!
//! [temporal]
//! max_events = 5
//! strategy = "progressive"
//!
//! [launcher]
//! bind = "127.0.0.1:3001"
//!
//! [export]
//! dir = "./submissions"
//! ```
//!
//! Every section is optional; [`Config::minimal`] is what an empty file
//! produces.

use anyhow::{Context, Result};
use frame_search_core::models::{CaptionModel, Strategy, TemporalStrategy};
use frame_search_core::settings::{SessionConfig, ALPHA_MAX, ALPHA_MIN, TOP_K_MAX, TOP_K_MIN};
use frame_search_core::temporal::DEFAULT_MAX_EVENTS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub search: SearchDefaults,
    #[serde(default)]
    pub temporal: TemporalConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Search API base URL. May be left empty and set interactively.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    /// Root serving `keyframes_index.json` and `<video>.json`.
    #[serde(default = "default_media_url")]
    pub base_url: String,
    /// Used when a video's media info has no usable fps.
    #[serde(default = "default_fps")]
    pub default_fps: f64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: default_media_url(),
            default_fps: default_fps(),
        }
    }
}

fn default_media_url() -> String {
    "http://localhost:3000/media-info".to_string()
}
fn default_fps() -> f64 {
    25.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchDefaults {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_caption_model")]
    pub caption_model: CaptionModel,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            strategy: default_strategy(),
            alpha: default_alpha(),
            caption_model: default_caption_model(),
        }
    }
}

fn default_top_k() -> u32 {
    TOP_K_MIN
}
fn default_strategy() -> Strategy {
    Strategy::Hybrid
}
fn default_alpha() -> f64 {
    0.5
}
fn default_caption_model() -> CaptionModel {
    CaptionModel::Bge
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemporalConfig {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default)]
    pub strategy: TemporalStrategy,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            strategy: TemporalStrategy::default(),
        }
    }
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS
}

#[derive(Debug, Deserialize, Clone)]
pub struct LauncherConfig {
    /// Address the launcher service binds to.
    #[serde(default = "default_launcher_bind")]
    pub bind: String,
    /// Address clients use to reach the launcher.
    #[serde(default = "default_launcher_url")]
    pub url: String,
    /// Player executables checked in order before searching `PATH`.
    #[serde(default = "default_player_paths")]
    pub player_paths: Vec<PathBuf>,
    /// Binary names looked up on `PATH`.
    #[serde(default = "default_player_names")]
    pub player_names: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            bind: default_launcher_bind(),
            url: default_launcher_url(),
            player_paths: default_player_paths(),
            player_names: default_player_names(),
        }
    }
}

fn default_launcher_bind() -> String {
    "127.0.0.1:3001".to_string()
}
fn default_launcher_url() -> String {
    "http://127.0.0.1:3001".to_string()
}
fn default_player_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(
        r"C:\Program Files (x86)\K-Lite Codec Pack\MPC-HC64\mpc-hc64.exe",
    )]
}
fn default_player_names() -> Vec<String> {
    ["mpc-hc64", "mpc-hc", "mpc-be64", "mpc-be"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// All defaults; used when no config file is available.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Initial session settings derived from `[backend]` and `[search]`.
    pub fn session_config(&self) -> SessionConfig {
        let mut cfg = SessionConfig {
            strategy: self.search.strategy,
            caption_model: self.search.caption_model,
            ..SessionConfig::default()
        };
        cfg.set_backend_url(&self.backend.url);
        cfg.set_top_k(self.search.top_k);
        cfg.set_alpha(self.search.alpha);
        cfg
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    if !(TOP_K_MIN..=TOP_K_MAX).contains(&config.search.top_k) {
        anyhow::bail!("search.top_k must be in [{}, {}]", TOP_K_MIN, TOP_K_MAX);
    }

    if !(ALPHA_MIN..=ALPHA_MAX).contains(&config.search.alpha) {
        anyhow::bail!("search.alpha must be in [{}, {}]", ALPHA_MIN, ALPHA_MAX);
    }

    if config.temporal.max_events == 0 {
        anyhow::bail!("temporal.max_events must be >= 1");
    }

    if config.media.default_fps.is_nan() || config.media.default_fps <= 0.0 {
        anyhow::bail!("media.default_fps must be > 0");
    }

    let url = config.backend.url.trim();
    if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!(
            "backend.url must start with http:// or https:// (got '{}')",
            url
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_is_minimal() {
        let config = parse("").unwrap();
        assert_eq!(config.backend.timeout_secs, 60);
        assert_eq!(config.search.top_k, 10);
        assert_eq!(config.temporal.max_events, 5);
        assert_eq!(config.launcher.bind, "127.0.0.1:3001");
        assert_eq!(config.launcher.player_names.len(), 4);
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
[backend]
url = "https://abc.ngrok-free.app/"
timeout_secs = 15

[search]
top_k = 40
strategy = "vintern"
alpha = 0.3
caption_model = "gte"

[temporal]
max_events = 3
strategy = "consolidated"
"#,
        )
        .unwrap();
        assert_eq!(config.search.strategy, Strategy::Vintern);
        assert_eq!(config.temporal.strategy, TemporalStrategy::Consolidated);

        let session = config.session_config();
        assert_eq!(session.backend_url, "https://abc.ngrok-free.app");
        assert_eq!(session.top_k, 40);
        assert_eq!(session.caption_model, CaptionModel::Gte);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(parse("[search]\ntop_k = 5").is_err());
        assert!(parse("[search]\nalpha = 0.95").is_err());
        assert!(parse("[temporal]\nmax_events = 0").is_err());
        assert!(parse("[backend]\ntimeout_secs = 0").is_err());
        assert!(parse("[backend]\nurl = \"ftp://x\"").is_err());
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let err = parse("[search]\nstrategy = \"bm25\"").unwrap_err();
        assert!(format!("{:#}", err).contains("bm25") || err.to_string().contains("variant"));
    }
}
