//! Interactive session shell (`frs session`).
//!
//! Reads one command per line, tokenized with shell quoting rules, and
//! dispatches it against a long-lived [`Session`]. Every command maps onto
//! one controller intent; the shell itself keeps no state.
//!
//! Row arguments accept either a key (`L21_V008_1200`, or a video id for
//! timelines) or the row number printed on the current page.

use anyhow::{anyhow, bail, Result};
use frame_search_core::models::{AppMode, CaptionModel, SearchType, Strategy, TemporalStrategy};
use frame_search_core::session::SessionController;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::driver::{Session, Submitted};
use crate::export::write_export;
use crate::media::LauncherClient;
use crate::search::{connect, print_page, print_summary, print_trake, read_image};

const HELP: &str = "\
Commands:
  search <query>            text search
  image <path>              image search with a file
  type text|image           switch search type
  strategy clip|vintern|hybrid
  caption bge|gte
  topk <n>                  10..100
  alpha <x>                 0.1..0.9
  backend <url>             set the search API base URL
  mode textual-kis|qa|trake switch app mode (clears selections)
  events                    list temporal events
  event add | event rm <i> | event set <i> <text>
  temporal [progressive|consolidated]
                            run a temporal search
  exit-temporal             leave temporal results
  show | next | prev | page <n>
  filter [videoKey]         restrict to one video; no argument clears
  select <row> | select-all | clear
  answer <row> <text>       qa mode only
  trake select <row> | trake toggle <frame> | trake commit
  trake delete <i> | trake page <n> | trake
  export [name]             write CSV to the export directory
  open <row>                play the frame in the desktop player
  dismiss                   clear the last error
  status | help | quit";

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Help,
    Quit,
    Status,
    Search(String),
    Image(PathBuf),
    SearchType(SearchType),
    Strategy(Strategy),
    Caption(CaptionModel),
    TopK(u32),
    Alpha(f64),
    Backend(String),
    Mode(AppMode),
    Events,
    EventAdd,
    EventRemove(usize),
    EventSet(usize, String),
    Temporal(Option<TemporalStrategy>),
    ExitTemporal,
    Show,
    Next,
    Prev,
    Page(i64),
    Filter(Option<String>),
    Select(String),
    SelectAll,
    Clear,
    Answer(String, String),
    TrakeShow,
    TrakeSelect(String),
    TrakeToggle(u64),
    TrakeCommit,
    TrakeDelete(usize),
    TrakePage(i64),
    Export(Option<String>),
    Open(String),
    Dismiss,
}

fn arg<T: FromStr>(words: &[String], index: usize, what: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = words
        .get(index)
        .ok_or_else(|| anyhow!("missing {}", what))?;
    raw.parse::<T>()
        .map_err(|e| anyhow!("invalid {} '{}': {}", what, raw, e))
}

fn rest(words: &[String], from: usize) -> String {
    words.get(from..).unwrap_or_default().join(" ")
}

/// Tokenize and parse one line. `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>> {
    let words = shell_words::split(line)?;
    let Some(head) = words.first() else {
        return Ok(None);
    };

    let cmd = match head.as_str() {
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        "status" => ShellCommand::Status,
        "search" | "s" => ShellCommand::Search(rest(&words, 1)),
        "image" => ShellCommand::Image(PathBuf::from(arg::<String>(&words, 1, "image path")?)),
        "type" => ShellCommand::SearchType(arg(&words, 1, "search type")?),
        "strategy" => ShellCommand::Strategy(arg(&words, 1, "strategy")?),
        "caption" => ShellCommand::Caption(arg(&words, 1, "caption model")?),
        "topk" => ShellCommand::TopK(arg(&words, 1, "top-k")?),
        "alpha" => ShellCommand::Alpha(arg(&words, 1, "alpha")?),
        "backend" => ShellCommand::Backend(arg(&words, 1, "backend url")?),
        "mode" => ShellCommand::Mode(arg(&words, 1, "app mode")?),
        "events" => ShellCommand::Events,
        "event" => match words.get(1).map(String::as_str) {
            Some("add") => ShellCommand::EventAdd,
            Some("rm") => ShellCommand::EventRemove(arg(&words, 2, "event index")?),
            Some("set") => ShellCommand::EventSet(arg(&words, 2, "event index")?, rest(&words, 3)),
            _ => bail!("usage: event add | event rm <i> | event set <i> <text>"),
        },
        "temporal" | "t" => ShellCommand::Temporal(match words.get(1) {
            Some(_) => Some(arg(&words, 1, "temporal strategy")?),
            None => None,
        }),
        "exit-temporal" => ShellCommand::ExitTemporal,
        "show" | "ls" => ShellCommand::Show,
        "next" | "n" => ShellCommand::Next,
        "prev" | "p" => ShellCommand::Prev,
        "page" => ShellCommand::Page(arg::<i64>(&words, 1, "page")?.saturating_sub(1)),
        "filter" => ShellCommand::Filter(words.get(1).cloned()),
        "select" => ShellCommand::Select(arg(&words, 1, "row")?),
        "select-all" => ShellCommand::SelectAll,
        "clear" => ShellCommand::Clear,
        "answer" => ShellCommand::Answer(arg(&words, 1, "row")?, rest(&words, 2)),
        "trake" => match words.get(1).map(String::as_str) {
            None => ShellCommand::TrakeShow,
            Some("select") => ShellCommand::TrakeSelect(arg(&words, 2, "row")?),
            Some("toggle") => ShellCommand::TrakeToggle(arg(&words, 2, "frame number")?),
            Some("commit") => ShellCommand::TrakeCommit,
            Some("delete") => ShellCommand::TrakeDelete(arg(&words, 2, "sequence index")?),
            Some("page") => {
                ShellCommand::TrakePage(arg::<i64>(&words, 2, "page")?.saturating_sub(1))
            }
            Some(other) => bail!("unknown trake command '{}'", other),
        },
        "export" => ShellCommand::Export(words.get(1).cloned()),
        "open" => ShellCommand::Open(arg(&words, 1, "row")?),
        "dismiss" => ShellCommand::Dismiss,
        other => bail!("unknown command '{}' (try 'help')", other),
    };
    Ok(Some(cmd))
}

/// Resolve a row number on the current page to its key; anything else is
/// taken as a key already.
pub fn resolve_row(controller: &SessionController, row: &str) -> String {
    if let Ok(n) = row.parse::<usize>() {
        if let Some(key) = n
            .checked_sub(1)
            .and_then(|i| controller.current_page().keys().get(i).cloned())
        {
            return key;
        }
    }
    row.to_string()
}

pub async fn run_session(config: &Config) -> Result<()> {
    let session = connect(config)?;
    let launcher = LauncherClient::new(&config.launcher)?;

    println!("Frame Search session. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let prompt = session
            .with(|c| format!("frs[{}]> ", c.app_mode()))
            .await;
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if cmd == ShellCommand::Quit {
            break;
        }
        if let Err(e) = execute(&session, &launcher, config, cmd).await {
            println!("{:#}", e);
        }
    }
    Ok(())
}

async fn execute(
    session: &Session,
    launcher: &LauncherClient,
    config: &Config,
    cmd: ShellCommand,
) -> Result<()> {
    match cmd {
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => {}
        ShellCommand::Status => print_status(&session.snapshot().await),
        ShellCommand::Search(query) => {
            session
                .with(|c| {
                    c.set_search_type(SearchType::Text);
                    c.set_query(&query);
                })
                .await;
            report(session, session.submit_search().await).await?;
        }
        ShellCommand::Image(path) => {
            let upload = read_image(&path)?;
            session
                .with(|c| {
                    c.set_search_type(SearchType::Image);
                    c.set_image(upload);
                })
                .await;
            report(session, session.submit_search().await).await?;
        }
        ShellCommand::SearchType(t) => session.with(|c| c.set_search_type(t)).await,
        ShellCommand::Strategy(s) => session.with(|c| c.config_mut().strategy = s).await,
        ShellCommand::Caption(m) => session.with(|c| c.config_mut().caption_model = m).await,
        ShellCommand::TopK(k) => {
            let k = session
                .with(|c| {
                    c.config_mut().set_top_k(k);
                    c.config().top_k
                })
                .await;
            println!("top-k = {}", k);
        }
        ShellCommand::Alpha(a) => {
            let a = session
                .with(|c| {
                    c.config_mut().set_alpha(a);
                    c.config().alpha
                })
                .await;
            println!("alpha = {}", a);
        }
        ShellCommand::Backend(url) => session.with(|c| c.config_mut().set_backend_url(&url)).await,
        ShellCommand::Mode(mode) => {
            session.with(|c| c.set_app_mode(mode)).await;
            println!("Switched to {} mode.", mode);
        }
        ShellCommand::Events => print_events(&session.snapshot().await),
        ShellCommand::EventAdd => {
            if !session.with(|c| c.add_temporal_event()).await {
                println!("At most {} events.", config.temporal.max_events);
            }
            print_events(&session.snapshot().await);
        }
        ShellCommand::EventRemove(i) => {
            if !session.with(|c| c.remove_temporal_event(i.saturating_sub(1))).await {
                println!("Cannot remove event {}.", i);
            }
            print_events(&session.snapshot().await);
        }
        ShellCommand::EventSet(i, text) => {
            if !session
                .with(|c| c.set_temporal_event(i.saturating_sub(1), &text))
                .await
            {
                println!("No event {}.", i);
            }
        }
        ShellCommand::Temporal(strategy) => {
            if let Some(strategy) = strategy {
                session.with(|c| c.set_temporal_strategy(strategy)).await;
            }
            report(session, session.submit_temporal_search().await).await?;
        }
        ShellCommand::ExitTemporal => session.with(|c| c.exit_temporal_search()).await,
        ShellCommand::Show => print_page(&session.snapshot().await),
        ShellCommand::Next => {
            session.with(|c| c.next_page()).await;
            print_page(&session.snapshot().await);
        }
        ShellCommand::Prev => {
            session.with(|c| c.prev_page()).await;
            print_page(&session.snapshot().await);
        }
        ShellCommand::Page(p) => {
            session.with(|c| c.go_to_page(p)).await;
            print_page(&session.snapshot().await);
        }
        ShellCommand::Filter(key) => {
            session.with(|c| c.set_video_filter(key.as_deref())).await;
            print_page(&session.snapshot().await);
        }
        ShellCommand::Select(row) => {
            let (key, selected) = session
                .with(|c| {
                    let key = resolve_row(c, &row);
                    let selected = c.toggle_selection(&key);
                    (key, selected)
                })
                .await;
            println!("{} {}", if selected { "Selected" } else { "Deselected" }, key);
        }
        ShellCommand::SelectAll => {
            let added = session.with(|c| c.select_all_on_page()).await;
            println!("Selected {} more.", added);
        }
        ShellCommand::Clear => session.with(|c| c.clear_selection()).await,
        ShellCommand::Answer(row, text) => {
            session
                .with(|c| {
                    let key = resolve_row(c, &row);
                    c.set_answer(&key, &text)
                })
                .await?;
        }
        ShellCommand::TrakeShow => print_trake(&session.snapshot().await),
        ShellCommand::TrakeSelect(row) => {
            let key = session.with(|c| resolve_row(c, &row)).await;
            match session.select_video_for_trake(&key).await? {
                Some(0) => println!("No keyframes found for this video."),
                Some(_) => print_trake(&session.snapshot().await),
                None => {}
            }
        }
        ShellCommand::TrakeToggle(frame) => {
            session.with(|c| c.toggle_trake_frame(frame)).await?;
            print_trake(&session.snapshot().await);
        }
        ShellCommand::TrakeCommit => {
            let index = session.with(|c| c.commit_trake_sequence()).await?;
            println!("Committed sequence #{}.", index);
        }
        ShellCommand::TrakeDelete(i) => {
            if !session.with(|c| c.delete_trake_sequence(i)).await {
                println!("No sequence #{}.", i);
            }
        }
        ShellCommand::TrakePage(p) => {
            session.with(|c| c.trake_go_to_page(p)).await;
            print_trake(&session.snapshot().await);
        }
        ShellCommand::Export(name) => {
            let snapshot = session.snapshot().await;
            write_export(&snapshot, name.as_deref(), Some(&config.export.dir))?;
        }
        ShellCommand::Open(row) => {
            let key = session.with(|c| resolve_row(c, &row)).await;
            let req = session.launch_request(&key).await?;
            let resp = launcher.launch(&req).await?;
            println!("{} ({})", resp.message, resp.url);
        }
        ShellCommand::Dismiss => session.with(|c| c.dismiss_error()).await,
    }
    Ok(())
}

async fn report(session: &Session, submitted: Submitted) -> Result<()> {
    if let Submitted::Rejected(e) = submitted {
        if let Some(msg) = e.user_message() {
            bail!("{}", msg);
        }
    }
    let snapshot = session.snapshot().await;
    if let frame_search_core::SearchPhase::Failed { message } = snapshot.phase() {
        bail!("{}", message);
    }
    print_summary(&snapshot);
    print_page(&snapshot);
    Ok(())
}

fn print_events(c: &SessionController) {
    for (i, event) in c.events().events().iter().enumerate() {
        println!("  {}. {}", i + 1, event);
    }
}

fn print_status(c: &SessionController) {
    let cfg = c.config();
    println!("mode:      {}", c.app_mode());
    println!("phase:     {}", c.phase());
    println!(
        "backend:   {} ({})",
        if cfg.backend_url.is_empty() {
            "(not set)"
        } else {
            cfg.backend_url.as_str()
        },
        if c.is_connected() {
            "connected"
        } else {
            "disconnected"
        }
    );
    println!("search:    {} / {}", cfg.search_type, cfg.strategy);
    println!("top-k:     {}", cfg.top_k);
    if cfg.strategy.uses_alpha() {
        println!("alpha:     {}", cfg.alpha);
    }
    if cfg.strategy.uses_caption_model() {
        println!("caption:   {}", cfg.caption_model);
    }
    println!("temporal:  {}", c.temporal_strategy());
    println!("results:   {}", c.results().len());
    println!("selected:  {}", c.selection().len());
    if let Some(filter) = c.video_filter() {
        println!("filter:    {}", filter);
    }
}
