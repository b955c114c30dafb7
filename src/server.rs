//! Desktop player launcher service.
//!
//! A small local HTTP service that opens a YouTube URL in MPC-HC / MPC-BE
//! seeked to a keyframe. Browsers cannot start desktop processes, so the
//! search UI (or `frs open`) asks this service to do it.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/launch-mpc` | Spawn the player for a URL and seek offset |
//! | `GET`  | `/health` | Service status and located player path |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "YouTube URL is required" }
//! { "error": "MPC-HC or MPC-BE not found. ...", "suggestions": ["..."] }
//! ```
//!
//! Missing URL is `400`; a missing player or a failed spawn is `500` with
//! remediation suggestions.
//!
//! The player is spawned detached and the response is sent as soon as the
//! process starts. Nothing tracks it afterwards.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, LauncherConfig};
use crate::media::{LaunchRequest, LaunchResponse};

const PLAYER_NOT_FOUND: &str = "MPC-HC or MPC-BE not found. Please install MPC or add it to PATH.";

const SUGGESTIONS: [&str; 4] = [
    "Install MPC-HC from: https://mpc-hc.org/",
    "Install MPC-BE from: https://sourceforge.net/projects/mpcbe/",
    "Add MPC to your system PATH",
    "Ensure yt-dlp is configured in MPC",
];

/// Starts a player process. Implementations must not wait for it to exit.
pub trait PlayerSpawner: Send + Sync {
    fn spawn(&self, player: &Path, args: &[String]) -> std::io::Result<()>;
}

/// Spawns the player detached with all stdio discarded.
pub struct DetachedSpawner;

impl PlayerSpawner for DetachedSpawner {
    fn spawn(&self, player: &Path, args: &[String]) -> std::io::Result<()> {
        let mut cmd = Command::new(player);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        // The child handle is dropped; the player outlives this request.
        cmd.spawn().map(|_| ())
    }
}

/// Locate the player: the first configured path that exists, else the first
/// configured binary name found on `PATH`.
pub fn find_player(config: &LauncherConfig) -> Option<PathBuf> {
    config
        .player_paths
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .or_else(|| {
            config
                .player_names
                .iter()
                .find_map(|name| which::which(name).ok())
        })
}

/// Append `t={secs}s` so the player's YouTube handler starts at the offset.
pub fn url_with_timestamp(url: &str, timestamp: u64) -> String {
    if timestamp == 0 {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}s", url, sep, timestamp)
}

/// Seek offset in milliseconds. Frame-precise when frame info is present.
pub fn seek_ms(req: &LaunchRequest) -> u64 {
    match &req.frame_info {
        Some(info) if info.fps > 0.0 => {
            (info.frame_order as f64 / info.fps * 1000.0).floor() as u64
        }
        _ => req.timestamp.saturating_mul(1000),
    }
}

#[derive(Clone)]
pub struct LauncherState {
    config: Arc<LauncherConfig>,
    spawner: Arc<dyn PlayerSpawner>,
    port: u16,
}

impl LauncherState {
    pub fn new(config: LauncherConfig, spawner: Arc<dyn PlayerSpawner>, port: u16) -> Self {
        Self {
            config: Arc::new(config),
            spawner,
            port,
        }
    }
}

/// Build the launcher router. Exposed separately from [`run_launcher`] so
/// tests can serve it with a recording spawner.
pub fn router(state: LauncherState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/launch-mpc", post(handle_launch))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the launcher service on `[launcher].bind`.
///
/// Runs until the process is terminated.
pub async fn run_launcher(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.launcher.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let port = listener.local_addr()?.port();

    match find_player(&config.launcher) {
        Some(path) => tracing::info!(player = %path.display(), "player located"),
        None => tracing::warn!("{}", PLAYER_NOT_FOUND),
    }

    let state = LauncherState::new(config.launcher.clone(), Arc::new(DetachedSpawner), port);
    let app = router(state);

    println!("Launcher listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggestions: Vec<String>,
}

struct AppError {
    status: StatusCode,
    message: String,
    suggestions: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            suggestions: self.suggestions,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
        suggestions: Vec::new(),
    }
}

fn launch_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
        suggestions: SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    mpc_available: bool,
    mpc_path: Option<String>,
    port: u16,
}

async fn handle_health(State(state): State<LauncherState>) -> Json<HealthResponse> {
    let player = find_player(&state.config);
    Json(HealthResponse {
        status: "running".to_string(),
        mpc_available: player.is_some(),
        mpc_path: player.map(|p| p.display().to_string()),
        port: state.port,
    })
}

// ============ POST /launch-mpc ============

async fn handle_launch(
    State(state): State<LauncherState>,
    Json(req): Json<LaunchRequest>,
) -> Result<Json<LaunchResponse>, AppError> {
    if req.youtube_url.trim().is_empty() {
        return Err(bad_request("YouTube URL is required"));
    }

    let player = find_player(&state.config).ok_or_else(|| launch_failed(PLAYER_NOT_FOUND))?;
    let url = url_with_timestamp(&req.youtube_url, req.timestamp);
    let seek = seek_ms(&req);
    let args = vec![url.clone(), "/start".to_string(), seek.to_string()];

    tracing::info!(
        title = req.video_title.as_deref().unwrap_or("Unknown"),
        player = %player.display(),
        %url,
        seek_ms = seek,
        "launching player"
    );

    state
        .spawner
        .spawn(&player, &args)
        .map_err(|e| launch_failed(format!("Failed to launch MPC: {}", e)))?;

    Ok(Json(LaunchResponse {
        success: true,
        message: "MPC launched successfully".to_string(),
        mpc_path: player.display().to_string(),
        method: "method_1".to_string(),
        url: req.youtube_url,
        timestamp: req.timestamp,
        seek_ms: seek,
    }))
}
