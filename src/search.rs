//! One-shot commands and result rendering.
//!
//! `frs search`, `frs temporal`, `frs frames`, `frs open`, and `frs frame`
//! each build a fresh [`Session`], run one operation, and print the
//! requested page. The printing helpers are shared with the interactive
//! shell.

use anyhow::{bail, Context, Result};
use frame_search_core::models::{AppMode, CaptionModel, SearchType, Strategy, TemporalStrategy};
use frame_search_core::session::{format_elapsed, ResultPage, SearchPhase, SessionController};
use frame_search_core::settings::ImageUpload;
use frame_search_core::view::{paginate, TRAKE_FRAMES_PER_PAGE};
use frame_search_core::{parse_frame_id, Completion};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::client::HttpSearchBackend;
use crate::config::Config;
use crate::driver::{Session, Submitted};
use crate::media::{youtube_video_id, HttpMediaSource, LauncherClient};

/// Build a session wired to the HTTP backend and media store.
pub fn connect(config: &Config) -> Result<Session> {
    let backend = HttpSearchBackend::new(&config.backend)?;
    let timeout = Duration::from_secs(config.backend.timeout_secs);
    let media = HttpMediaSource::new(&config.media, timeout)?;
    let mut controller =
        SessionController::new(config.session_config(), config.temporal.max_events);
    controller.set_temporal_strategy(config.temporal.strategy);
    Ok(Session::new(
        controller,
        Arc::new(backend),
        Arc::new(media),
        timeout,
        config.media.default_fps,
    ))
}

/// Per-invocation overrides of the `[search]` defaults.
#[derive(Debug, Default, Clone)]
pub struct SearchOptions {
    pub strategy: Option<Strategy>,
    pub top_k: Option<u32>,
    pub alpha: Option<f64>,
    pub caption_model: Option<CaptionModel>,
    pub filter: Option<String>,
    pub page: usize,
}

impl SearchOptions {
    fn apply(&self, controller: &mut SessionController) {
        let cfg = controller.config_mut();
        if let Some(strategy) = self.strategy {
            cfg.strategy = strategy;
        }
        if let Some(top_k) = self.top_k {
            cfg.set_top_k(top_k);
        }
        if let Some(alpha) = self.alpha {
            cfg.set_alpha(alpha);
        }
        if let Some(model) = self.caption_model {
            cfg.caption_model = model;
        }
    }
}

/// Load an image for image search.
pub fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(ImageUpload { file_name, bytes })
}

pub async fn run_search(
    config: &Config,
    query: &str,
    image: Option<PathBuf>,
    opts: &SearchOptions,
) -> Result<()> {
    let session = connect(config)?;
    let upload = image.as_deref().map(read_image).transpose()?;

    session
        .with(|c| {
            opts.apply(c);
            match upload {
                Some(upload) => {
                    c.set_search_type(SearchType::Image);
                    c.set_image(upload);
                }
                None => c.set_query(query),
            }
        })
        .await;

    finish(&session, session.submit_search().await, opts).await
}

pub async fn run_temporal(
    config: &Config,
    events: &[String],
    strategy: Option<TemporalStrategy>,
    opts: &SearchOptions,
) -> Result<()> {
    let session = connect(config)?;
    let max = config.temporal.max_events;
    if events.len() > max {
        bail!(
            "At most {} temporal events are allowed (got {})",
            max,
            events.len()
        );
    }

    session
        .with(|c| {
            opts.apply(c);
            if let Some(strategy) = strategy {
                c.set_temporal_strategy(strategy);
            }
            for (i, event) in events.iter().enumerate() {
                if i > 0 {
                    c.add_temporal_event();
                }
                c.set_temporal_event(i, event);
            }
        })
        .await;

    finish(&session, session.submit_temporal_search().await, opts).await
}

async fn finish(session: &Session, submitted: Submitted, opts: &SearchOptions) -> Result<()> {
    match submitted {
        Submitted::Rejected(e) => match e.user_message() {
            Some(msg) => bail!("{}", msg),
            None => {
                println!("No results.");
                return Ok(());
            }
        },
        Submitted::Finished(Completion::Superseded) => return Ok(()),
        Submitted::Finished(Completion::Applied) => {}
    }

    let controller = session
        .with(|c| {
            c.set_video_filter(opts.filter.as_deref());
            c.go_to_page(opts.page as i64);
            c.clone()
        })
        .await;

    if let SearchPhase::Failed { message } = controller.phase() {
        bail!("{}", message);
    }
    print_summary(&controller);
    print_page(&controller);
    Ok(())
}

pub async fn run_frames(config: &Config, raw_id: &str, page: usize) -> Result<()> {
    let session = connect(config)?;
    let frame = parse_frame_id(raw_id)?;
    let frames = session.fetch_keyframes(&frame.video_key()).await;
    if frames.is_empty() {
        println!("No keyframes for {}.", frame.video_key());
        return Ok(());
    }

    let view = paginate(frames.iter().collect(), page, TRAKE_FRAMES_PER_PAGE);
    println!(
        "{}: {} keyframes (page {}/{})",
        frame.video_key(),
        view.total_items,
        view.index + 1,
        view.total_pages
    );
    for kf in view.items {
        let marker = if kf.frame_number == frame.frame_number {
            "*"
        } else {
            " "
        };
        println!("  {} {:>8}  {}", marker, kf.frame_number, kf.image_path);
    }
    Ok(())
}

pub async fn run_open(config: &Config, raw_id: &str) -> Result<()> {
    let session = connect(config)?;
    let req = session.launch_request(raw_id).await?;

    let title = req.video_title.as_deref().unwrap_or("Unknown");
    println!("{} @ {}", title, format_clock(req.timestamp));
    if let Some(id) = youtube_video_id(&req.youtube_url) {
        println!("    youtube: {}", id);
    }

    let launcher = LauncherClient::new(&config.launcher)?;
    let resp = launcher.launch(&req).await?;
    println!("{} ({})", resp.message, resp.mpc_path);
    println!("    url: {}", resp.url);
    println!("    seek: {}ms", resp.seek_ms);
    Ok(())
}

pub fn run_frame(raw_id: &str) -> Result<()> {
    let frame = parse_frame_id(raw_id)?;
    println!("batch:      {}", frame.batch);
    println!("video:      {}", frame.video_num);
    println!("frame:      {}", frame.frame_number);
    println!("video key:  {}", frame.video_key());
    println!("image path: {}", frame.image_path());
    Ok(())
}

/// `m:ss` for a whole-second offset.
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ============ Rendering ============

pub fn print_summary(c: &SessionController) {
    let elapsed = c.elapsed().map(format_elapsed).unwrap_or_default();
    let total = c.results().len();
    if c.is_temporal_active() {
        let events = c.events().valid_events().len();
        println!(
            "Temporal search ({}) completed in {}: {} results from {} events",
            c.temporal_strategy(),
            elapsed,
            total,
            events
        );
    } else if total > 0 {
        let label = match c.config().search_type {
            SearchType::Image => "IMAGE SEARCH".to_string(),
            SearchType::Text => c.config().strategy.as_str().to_uppercase(),
        };
        println!("Search completed in {}: {} results ({})", elapsed, total, label);
    }
}

/// Rows are numbered from 1 within the page; the shell accepts those
/// numbers in place of selection keys.
pub fn print_page(c: &SessionController) {
    let page = c.current_page();
    if page.total_items() == 0 {
        println!("No results.");
        return;
    }

    let selection = c.selection();
    let mark = |key: &str| if selection.contains(key) { "[x]" } else { "[ ]" };

    match &page {
        ResultPage::Frames(p) => {
            for (i, item) in p.items.iter().enumerate() {
                println!(
                    "{}. {} [{:.2}] {}",
                    i + 1,
                    mark(&item.raw_id),
                    item.score,
                    item.raw_id
                );
                match &item.image_path {
                    Some(path) => println!("    image: {}", path),
                    None => println!("    image: (unavailable)"),
                }
                if !item.caption.is_empty() {
                    println!("    caption: {}", item.caption.replace('\n', " ").trim());
                }
                if c.app_mode() == AppMode::Qa {
                    if let Some(answer) = c.answers().get(&item.raw_id) {
                        println!("    answer: \"{}\"", answer);
                    }
                }
            }
        }
        ResultPage::Timelines(p) => {
            for (i, timeline) in p.items.iter().enumerate() {
                println!(
                    "{}. {} [{:.2}] {}",
                    i + 1,
                    mark(&timeline.video_id),
                    timeline.score,
                    timeline.video_id
                );
                for (event, frame) in timeline.frames.iter().enumerate() {
                    let shown = frame
                        .frame
                        .as_ref()
                        .map(|f| f.frame_number.to_string())
                        .unwrap_or_else(|| frame.raw_id.clone());
                    println!("    event {}: {}", event + 1, shown);
                }
            }
        }
    }
    println!("Page {}/{}", page.index() + 1, page.total_pages());
}

pub fn print_trake(c: &SessionController) {
    let trake = c.trake();
    match trake.selected_video() {
        Some(video) => {
            let page = trake.frames_page();
            println!(
                "TRAKE video {}: {} frames (page {}/{})",
                video,
                page.total_items,
                page.index + 1,
                page.total_pages
            );
            for kf in &page.items {
                let mark = if trake.contains_frame(kf.frame_number) {
                    "[x]"
                } else {
                    "[ ]"
                };
                println!("  {} {:>8}", mark, kf.frame_number);
            }
            let current: Vec<String> = trake
                .current_sequence()
                .iter()
                .map(u64::to_string)
                .collect();
            println!("Current sequence: [{}]", current.join(", "));
        }
        None => println!("No TRAKE video selected."),
    }
    for (i, seq) in trake.event_sequences().iter().enumerate() {
        let frames: Vec<String> = seq.frames.iter().map(u64::to_string).collect();
        println!("  #{} {}: {}", i, seq.video_key, frames.join(", "));
    }
}
