//! # Frame Search CLI (`frs`)
//!
//! The `frs` binary drives the search session from the terminal and hosts
//! the desktop player launcher.
//!
//! ## Usage
//!
//! ```bash
//! frs --config ./config/frs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `frs frame <id>` | Decode a frame identifier |
//! | `frs search "<query>"` | Text (or `--image`) search, one page of results |
//! | `frs temporal <event>...` | Multi-event temporal search |
//! | `frs frames <id>` | List every keyframe of the id's video |
//! | `frs open <id>` | Play the frame's video in the desktop player |
//! | `frs session` | Interactive session shell |
//! | `frs serve launcher` | Run the desktop player launcher |
//! | `frs completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Hybrid text search, second page, one video only
//! frs search "person running" --strategy hybrid --filter L21_V008 --page 2
//!
//! # Image search
//! frs search --image ./query.jpg
//!
//! # Temporal search with whole-video timelines
//! frs temporal "a man opens a door" "he sits down" --mode consolidated
//! ```

mod client;
mod config;
mod driver;
mod export;
mod media;
mod search;
mod server;
mod shell;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use frame_search_core::models::{CaptionModel, Strategy, TemporalStrategy};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use search::SearchOptions;

/// Frame Search CLI: search video keyframes, build TRAKE sequences, export
/// submission CSVs, and open frames in a desktop player.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/frs.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "frs",
    about = "Frame Search: client for a multimodal video keyframe retrieval service",
    version,
    long_about = "Frame Search runs text, image, and temporal searches against a keyframe \
    retrieval API, builds TRAKE event sequences, exports submission CSVs, and launches \
    the source video at the matching frame in MPC-HC / MPC-BE."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/frs.toml`. Commands that only need defaults
    /// run without it.
    #[arg(long, global = true, default_value = "./config/frs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Decode a frame identifier such as `L21_V008_1200`.
    Frame {
        /// Raw frame identifier.
        id: String,
    },

    /// Search keyframes by text or by example image.
    ///
    /// Prints one page of results. Selection and export live in
    /// `frs session`.
    Search {
        /// The text query. Ignored with `--image`.
        #[arg(default_value = "")]
        query: String,

        /// Search by this image instead of text.
        #[arg(long)]
        image: Option<PathBuf>,

        #[command(flatten)]
        opts: SearchArgs,
    },

    /// Multi-event temporal search.
    ///
    /// Each event is one free-text description, in chronological order.
    Temporal {
        /// Event descriptions, in order.
        #[arg(required = true)]
        events: Vec<String>,

        /// `progressive` (one list per event, last one shown) or
        /// `consolidated` (whole-video timelines).
        #[arg(long = "mode")]
        search_mode: Option<TemporalStrategy>,

        #[command(flatten)]
        opts: SearchArgs,
    },

    /// List the keyframes of the video containing a frame.
    Frames {
        /// Any frame identifier of the video.
        id: String,

        /// Page number (10 frames per page, starting at 1).
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Open a frame's source video in the desktop player.
    ///
    /// Requires the launcher (`frs serve launcher`) to be running.
    Open {
        /// Raw frame identifier.
        id: String,
    },

    /// Start an interactive search session.
    Session,

    /// Start a background service.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },
}

/// Search settings shared by `search` and `temporal`.
#[derive(clap::Args)]
struct SearchArgs {
    /// Retrieval strategy: `clip`, `vintern`, or `hybrid`.
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Number of results (10..100).
    #[arg(long)]
    top_k: Option<u32>,

    /// Text/visual blend for `hybrid` (0.1..0.9).
    #[arg(long)]
    alpha: Option<f64>,

    /// Caption model for `vintern` and `hybrid`: `bge` or `gte`.
    #[arg(long)]
    caption_model: Option<CaptionModel>,

    /// Only show results from this video (e.g. `L21_V008`).
    #[arg(long)]
    filter: Option<String>,

    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: usize,
}

impl From<SearchArgs> for SearchOptions {
    fn from(args: SearchArgs) -> Self {
        SearchOptions {
            strategy: args.strategy,
            top_k: args.top_k,
            alpha: args.alpha,
            caption_model: args.caption_model,
            filter: args.filter,
            page: args.page.saturating_sub(1),
        }
    }
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Start the desktop player launcher.
    ///
    /// Binds to `[launcher].bind` and serves `POST /launch-mpc` and
    /// `GET /health`.
    Launcher,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frame_search=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Frame { id } => {
            search::run_frame(id)?;
            return Ok(());
        }
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "frs", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    // Everything else has usable defaults, but an explicit file must parse.
    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::debug!(path = %cli.config.display(), "no config file, using defaults");
        config::Config::minimal()
    };

    match cli.command {
        Commands::Frame { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Search { query, image, opts } => {
            search::run_search(&cfg, &query, image, &opts.into()).await?;
        }
        Commands::Temporal {
            events,
            search_mode,
            opts,
        } => {
            search::run_temporal(&cfg, &events, search_mode, &opts.into()).await?;
        }
        Commands::Frames { id, page } => {
            search::run_frames(&cfg, &id, page.saturating_sub(1)).await?;
        }
        Commands::Open { id } => {
            search::run_open(&cfg, &id).await?;
        }
        Commands::Session => {
            shell::run_session(&cfg).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Launcher => {
                server::run_launcher(&cfg).await?;
            }
        },
    }

    Ok(())
}
