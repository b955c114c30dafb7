//! Search session state machine.
//!
//! [`SessionController`] owns every piece of client state: settings, the
//! active result shape, selections, QA answers, the temporal event list, and
//! the TRAKE builder. Renderers read it; intents mutate it through methods.
//!
//! # Search lifecycle
//!
//! ```text
//!  Idle ──begin──▶ Searching ──complete(Ok)──▶ Ready
//!   ▲                 │
//!   │                 └──complete(Err)──▶ Failed ──dismiss──▶ Idle
//! ```
//!
//! Searches are split into `begin_*` (validate input, bump the request
//! generation, produce a request) and `complete_*` (apply the response).
//! The caller performs the HTTP call in between. Every `begin_*` supersedes
//! the previous request: a completion carrying an older generation is
//! discarded instead of overwriting newer results.
//!
//! # Scoped state
//!
//! Selections, answers, TRAKE sequences, and temporal results belong to the
//! current app mode and temporal strategy. [`SessionController::set_app_mode`]
//! and [`SessionController::set_temporal_strategy`] both go through
//! `reset_scoped_state`, so switching never leaks state across modes.
//!
//! Selections and answers are held behind `Arc` and updated copy-on-write,
//! so cloning the controller for a render snapshot is cheap.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::export::{self, CsvExport, ExportError, ExportSource};
use crate::models::{
    AppMode, CaptionModel, RawHit, SearchResultItem, SearchType, Strategy, TemporalPayload,
    TemporalStrategy, Timeline,
};
use crate::settings::{ImageUpload, SessionConfig};
use crate::temporal::TemporalEvents;
use crate::trake::{Keyframe, TrakeError, TrakeState};
use crate::view::{
    clamp_page, filter_by_video_key, paginate, total_pages, Page, PAGE_SIZE, TEMPORAL_PAGE_SIZE,
};

/// Where the session is in the search lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SearchPhase {
    #[default]
    Idle,
    Searching { generation: u64 },
    Ready,
    Failed { message: String },
}

/// The active result set. Temporal searches produce their own shapes; only
/// one shape is live at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultShape {
    #[default]
    Empty,
    Normal(Vec<SearchResultItem>),
    /// One list per event step. The last step is the actionable result.
    Progressive(Vec<Vec<SearchResultItem>>),
    Consolidated(Vec<Timeline>),
}

impl ResultShape {
    pub fn is_temporal(&self) -> bool {
        matches!(self, ResultShape::Progressive(_) | ResultShape::Consolidated(_))
    }

    /// The frame list shown to the user: the plain results or the final
    /// progressive step.
    pub fn frames(&self) -> &[SearchResultItem] {
        match self {
            ResultShape::Normal(items) => items,
            ResultShape::Progressive(steps) => steps.last().map(Vec::as_slice).unwrap_or(&[]),
            ResultShape::Empty | ResultShape::Consolidated(_) => &[],
        }
    }

    pub fn timelines(&self) -> &[Timeline] {
        match self {
            ResultShape::Consolidated(timelines) => timelines,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResultShape::Consolidated(t) => t.len(),
            _ => self.frames().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Input problems detected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Blank text query. Clears results without bothering the user.
    #[error("empty query")]
    EmptyQuery,
    #[error("Please upload an image for image search.")]
    MissingImage,
    #[error("Please enter at least one temporal event to search.")]
    NoTemporalEvents,
    #[error("Please enter the backend URL first!")]
    MissingBackendUrl,
}

impl SubmitError {
    /// The message to show, or `None` for rejections that stay silent.
    pub fn user_message(&self) -> Option<String> {
        match self {
            SubmitError::EmptyQuery => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Answers can only be recorded in qa mode.")]
    AnswersRequireQaMode,
    #[error(transparent)]
    Trake(#[from] TrakeError),
}

/// Body of a `POST /search` request.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRequest {
    Text {
        query: String,
        top_k: u32,
        strategy: Strategy,
        caption_model: CaptionModel,
        alpha: f64,
    },
    Image {
        file_name: String,
        bytes: Vec<u8>,
        top_k: u32,
    },
}

/// Body of a `POST /temporal_search` request.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalRequest {
    pub events: Vec<String>,
    pub top_k: u32,
    pub strategy: Strategy,
    pub caption_model: CaptionModel,
    pub alpha: f64,
    pub search_mode: TemporalStrategy,
}

/// A started search. Hand its generation back to `complete_*`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTicket<R> {
    pub generation: u64,
    pub backend_url: String,
    pub request: R,
}

/// What happened to a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Results (or the failure) were applied.
    Applied,
    /// A newer search was started in the meantime; the response was dropped.
    Superseded,
}

/// One page of whatever result shape is active.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPage<'a> {
    Frames(Page<'a, SearchResultItem>),
    Timelines(Page<'a, Timeline>),
}

impl ResultPage<'_> {
    pub fn index(&self) -> usize {
        match self {
            ResultPage::Frames(p) => p.index,
            ResultPage::Timelines(p) => p.index,
        }
    }

    pub fn total_pages(&self) -> usize {
        match self {
            ResultPage::Frames(p) => p.total_pages,
            ResultPage::Timelines(p) => p.total_pages,
        }
    }

    pub fn total_items(&self) -> usize {
        match self {
            ResultPage::Frames(p) => p.total_items,
            ResultPage::Timelines(p) => p.total_items,
        }
    }

    /// Selection keys of the rows on this page.
    pub fn keys(&self) -> Vec<String> {
        match self {
            ResultPage::Frames(p) => p.items.iter().map(|i| i.raw_id.clone()).collect(),
            ResultPage::Timelines(p) => p.items.iter().map(|t| t.video_id.clone()).collect(),
        }
    }
}

/// Seconds with two decimals, e.g. `1.25s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

#[derive(Debug, Clone, Default)]
pub struct SessionController {
    config: SessionConfig,
    app_mode: AppMode,
    temporal_strategy: TemporalStrategy,
    phase: SearchPhase,
    generation: u64,
    results: Arc<ResultShape>,
    events: TemporalEvents,
    selection: Arc<BTreeSet<String>>,
    answers: Arc<BTreeMap<String, String>>,
    trake: TrakeState,
    page_index: usize,
    video_filter: Option<String>,
    connected: bool,
    elapsed: Option<Duration>,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPhase::Idle => f.write_str("idle"),
            SearchPhase::Searching { generation } => write!(f, "searching (#{})", generation),
            SearchPhase::Ready => f.write_str("ready"),
            SearchPhase::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

impl SessionController {
    pub fn new(config: SessionConfig, max_events: usize) -> Self {
        Self {
            config,
            events: TemporalEvents::new(max_events),
            ..Self::default()
        }
    }

    // ============ Read access ============

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn app_mode(&self) -> AppMode {
        self.app_mode
    }

    pub fn temporal_strategy(&self) -> TemporalStrategy {
        self.temporal_strategy
    }

    pub fn phase(&self) -> &SearchPhase {
        &self.phase
    }

    pub fn results(&self) -> &ResultShape {
        &self.results
    }

    pub fn is_temporal_active(&self) -> bool {
        self.results.is_temporal()
    }

    pub fn events(&self) -> &TemporalEvents {
        &self.events
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    pub fn trake(&self) -> &TrakeState {
        &self.trake
    }

    pub fn video_filter(&self) -> Option<&str> {
        self.video_filter.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    // ============ Settings ============

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    pub fn set_query(&mut self, query: &str) {
        self.config.query_text = query.to_string();
    }

    pub fn set_image(&mut self, image: ImageUpload) {
        self.config.image = Some(image);
    }

    pub fn set_search_type(&mut self, search_type: SearchType) {
        self.config.set_search_type(search_type);
    }

    /// Switch app mode. Always clears mode-scoped state, even when the mode
    /// does not change.
    pub fn set_app_mode(&mut self, mode: AppMode) {
        self.app_mode = mode;
        self.reset_scoped_state();
    }

    /// Switch temporal strategy. Clears mode-scoped state.
    pub fn set_temporal_strategy(&mut self, strategy: TemporalStrategy) {
        self.temporal_strategy = strategy;
        self.reset_scoped_state();
    }

    fn reset_scoped_state(&mut self) {
        self.selection = Arc::default();
        self.answers = Arc::default();
        self.trake = TrakeState::default();
        if self.results.is_temporal() {
            self.results = Arc::new(ResultShape::Empty);
        }
        self.page_index = 0;
        self.video_filter = None;
    }

    // ============ Temporal events ============

    pub fn add_temporal_event(&mut self) -> bool {
        self.events.add()
    }

    pub fn remove_temporal_event(&mut self, index: usize) -> bool {
        self.events.remove(index)
    }

    pub fn set_temporal_event(&mut self, index: usize, text: &str) -> bool {
        self.events.set(index, text)
    }

    /// Leave temporal results and return to an empty plain view.
    pub fn exit_temporal_search(&mut self) {
        if self.results.is_temporal() {
            self.results = Arc::new(ResultShape::Empty);
        }
        self.page_index = 0;
    }

    // ============ Search transitions ============

    /// Validate input and start a plain (text or image) search.
    pub fn begin_search(&mut self) -> Result<SearchTicket<SearchRequest>, SubmitError> {
        let request = match self.config.search_type {
            SearchType::Text => {
                let query = self.config.query_text.trim();
                if query.is_empty() {
                    self.results = Arc::new(ResultShape::Empty);
                    self.elapsed = None;
                    self.selection = Arc::default();
                    self.answers = Arc::default();
                    self.page_index = 0;
                    self.phase = SearchPhase::Idle;
                    return Err(SubmitError::EmptyQuery);
                }
                SearchRequest::Text {
                    query: query.to_string(),
                    top_k: self.config.top_k,
                    strategy: self.config.strategy,
                    caption_model: self.config.caption_model,
                    alpha: self.config.alpha,
                }
            }
            SearchType::Image => {
                let image = self.config.image.as_ref().ok_or(SubmitError::MissingImage)?;
                SearchRequest::Image {
                    file_name: image.file_name.clone(),
                    bytes: image.bytes.clone(),
                    top_k: self.config.top_k,
                }
            }
        };
        let backend_url = self.require_backend()?;
        Ok(self.start(backend_url, request))
    }

    /// Validate the event list and start a temporal search.
    pub fn begin_temporal_search(
        &mut self,
    ) -> Result<SearchTicket<TemporalRequest>, SubmitError> {
        let events = self.events.valid_events();
        if events.is_empty() {
            return Err(SubmitError::NoTemporalEvents);
        }
        let backend_url = self.require_backend()?;
        let request = TemporalRequest {
            events,
            top_k: self.config.top_k,
            strategy: self.config.strategy,
            caption_model: self.config.caption_model,
            alpha: self.config.alpha,
            search_mode: self.temporal_strategy,
        };
        Ok(self.start(backend_url, request))
    }

    fn require_backend(&self) -> Result<String, SubmitError> {
        if self.config.backend_url.trim().is_empty() {
            return Err(SubmitError::MissingBackendUrl);
        }
        Ok(self.config.backend_url.clone())
    }

    fn start<R>(&mut self, backend_url: String, request: R) -> SearchTicket<R> {
        self.generation += 1;
        self.phase = SearchPhase::Searching {
            generation: self.generation,
        };
        self.elapsed = None;
        SearchTicket {
            generation: self.generation,
            backend_url,
            request,
        }
    }

    /// Apply the outcome of a plain search.
    pub fn complete_search<E: fmt::Display>(
        &mut self,
        generation: u64,
        outcome: Result<Vec<RawHit>, E>,
        elapsed: Duration,
    ) -> Completion {
        if generation != self.generation {
            return Completion::Superseded;
        }
        match outcome {
            Ok(hits) => {
                let items = hits.into_iter().map(SearchResultItem::from_hit).collect();
                self.apply(ResultShape::Normal(items), elapsed);
            }
            Err(e) => self.fail(format!("Search failed: {}", e)),
        }
        Completion::Applied
    }

    /// Apply the outcome of a temporal search.
    pub fn complete_temporal_search<E: fmt::Display>(
        &mut self,
        generation: u64,
        outcome: Result<TemporalPayload, E>,
        elapsed: Duration,
    ) -> Completion {
        if generation != self.generation {
            return Completion::Superseded;
        }
        match outcome {
            Ok(TemporalPayload::Progressive(steps)) => {
                let steps = steps
                    .into_iter()
                    .map(|step| step.into_iter().map(SearchResultItem::from_hit).collect())
                    .collect();
                self.apply(ResultShape::Progressive(steps), elapsed);
            }
            Ok(TemporalPayload::Consolidated(timelines)) => {
                let timelines = timelines.into_iter().map(Timeline::from_raw).collect();
                self.apply(ResultShape::Consolidated(timelines), elapsed);
            }
            Err(e) => self.fail(format!("Temporal search failed: {}", e)),
        }
        Completion::Applied
    }

    fn apply(&mut self, results: ResultShape, elapsed: Duration) {
        self.results = Arc::new(results);
        self.selection = Arc::default();
        self.answers = Arc::default();
        self.page_index = 0;
        self.video_filter = None;
        self.connected = true;
        self.elapsed = Some(elapsed);
        self.phase = SearchPhase::Ready;
    }

    /// Prior results stay in place.
    fn fail(&mut self, message: String) {
        self.connected = false;
        self.phase = SearchPhase::Failed { message };
    }

    /// Acknowledge a failure and return to `Idle`.
    pub fn dismiss_error(&mut self) {
        if matches!(self.phase, SearchPhase::Failed { .. }) {
            self.phase = SearchPhase::Idle;
        }
    }

    // ============ Paging and filtering ============

    fn page_size(&self) -> usize {
        if self.is_temporal_active() {
            TEMPORAL_PAGE_SIZE
        } else {
            PAGE_SIZE
        }
    }

    fn filtered_len(&self) -> usize {
        let filter = self.video_filter.as_deref();
        match self.results.as_ref() {
            ResultShape::Consolidated(t) => filter_by_video_key(t, filter).len(),
            shape => filter_by_video_key(shape.frames(), filter).len(),
        }
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.filtered_len(), self.page_size())
    }

    /// Navigate to `page`, clamped into range. Returns the new index.
    pub fn go_to_page(&mut self, page: i64) -> usize {
        self.page_index = clamp_page(page, self.total_pages());
        self.page_index
    }

    pub fn next_page(&mut self) -> usize {
        self.go_to_page(self.page_index as i64 + 1)
    }

    pub fn prev_page(&mut self) -> usize {
        self.go_to_page(self.page_index as i64 - 1)
    }

    /// Restrict results to one video (`None` clears). Resets to page 0.
    pub fn set_video_filter(&mut self, video_key: Option<&str>) {
        self.video_filter = video_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        self.page_index = 0;
    }

    /// The current page, derived from results, filter, and page index.
    pub fn current_page(&self) -> ResultPage<'_> {
        let filter = self.video_filter.as_deref();
        let size = self.page_size();
        match self.results.as_ref() {
            ResultShape::Consolidated(timelines) => ResultPage::Timelines(paginate(
                filter_by_video_key(timelines, filter),
                self.page_index,
                size,
            )),
            shape => ResultPage::Frames(paginate(
                filter_by_video_key(shape.frames(), filter),
                self.page_index,
                size,
            )),
        }
    }

    // ============ Selection and answers ============

    /// Toggle a result (raw frame id, or video id for timelines). Returns
    /// whether it is selected afterwards.
    pub fn toggle_selection(&mut self, key: &str) -> bool {
        let selection = Arc::make_mut(&mut self.selection);
        if selection.remove(key) {
            false
        } else {
            selection.insert(key.to_string());
            true
        }
    }

    pub fn select_all_on_page(&mut self) -> usize {
        let keys = self.current_page().keys();
        let selection = Arc::make_mut(&mut self.selection);
        keys.into_iter().filter(|k| selection.insert(k.clone())).count()
    }

    pub fn clear_selection(&mut self) {
        self.selection = Arc::default();
    }

    pub fn set_answer(&mut self, raw_id: &str, answer: &str) -> Result<(), SessionError> {
        if self.app_mode != AppMode::Qa {
            return Err(SessionError::AnswersRequireQaMode);
        }
        Arc::make_mut(&mut self.answers).insert(raw_id.to_string(), answer.to_string());
        Ok(())
    }

    // ============ TRAKE ============

    /// Select the video containing `raw_id`; returns the video key whose
    /// frames the caller must fetch and pass to [`Self::load_trake_frames`].
    pub fn begin_trake_selection(&mut self, raw_id: &str) -> Result<String, SessionError> {
        Ok(self.trake.select_video(raw_id)?)
    }

    pub fn load_trake_frames(&mut self, video_key: &str, frames: Vec<Keyframe>) -> bool {
        self.trake.load_frames(video_key, frames)
    }

    pub fn toggle_trake_frame(&mut self, frame_number: u64) -> Result<bool, SessionError> {
        Ok(self.trake.toggle_frame(frame_number)?)
    }

    pub fn commit_trake_sequence(&mut self) -> Result<usize, SessionError> {
        Ok(self.trake.commit_sequence()?)
    }

    pub fn delete_trake_sequence(&mut self, index: usize) -> bool {
        self.trake.delete_sequence(index)
    }

    pub fn trake_go_to_page(&mut self, page: i64) -> usize {
        self.trake.go_to_page(page)
    }

    // ============ Export ============

    /// Build the CSV for the current mode and result shape.
    pub fn export_csv(&self, file_name: Option<&str>) -> Result<CsvExport, ExportError> {
        let source = match self.results.as_ref() {
            ResultShape::Consolidated(timelines) => ExportSource::Timelines(timelines),
            ResultShape::Progressive(_) => ExportSource::Temporal(self.results.frames()),
            _ if self.app_mode == AppMode::Trake => {
                ExportSource::Sequences(self.trake.event_sequences())
            }
            shape => ExportSource::Selected(shape.frames()),
        };
        export::export_csv(
            self.app_mode,
            source,
            &self.selection,
            &self.answers,
            file_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawTimeline;

    fn hit(id: &str) -> RawHit {
        RawHit {
            image: id.to_string(),
            caption: format!("{id} | Score: 0.50"),
            score: 0.5,
        }
    }

    fn hits(n: usize) -> Vec<RawHit> {
        (0..n).map(|i| hit(&format!("L21_V008_{}", 1200 + i))).collect()
    }

    fn session() -> SessionController {
        let mut s = SessionController::new(SessionConfig::default(), 5);
        s.config_mut().set_backend_url("http://backend");
        s
    }

    fn searched(n: usize) -> SessionController {
        let mut s = session();
        s.set_query("person running");
        let ticket = s.begin_search().unwrap();
        s.complete_search::<String>(ticket.generation, Ok(hits(n)), Duration::from_millis(1250));
        s
    }

    #[test]
    fn test_text_request_carries_settings() {
        let mut s = session();
        s.set_query("  person running ");
        s.config_mut().set_top_k(10);
        s.config_mut().strategy = Strategy::Hybrid;
        let ticket = s.begin_search().unwrap();
        assert_eq!(ticket.generation, 1);
        assert_eq!(ticket.backend_url, "http://backend");
        assert_eq!(
            ticket.request,
            SearchRequest::Text {
                query: "person running".to_string(),
                top_k: 10,
                strategy: Strategy::Hybrid,
                caption_model: CaptionModel::Bge,
                alpha: 0.5,
            }
        );
        assert_eq!(s.phase(), &SearchPhase::Searching { generation: 1 });
    }

    #[test]
    fn test_empty_query_is_silent_and_clears() {
        let mut s = searched(3);
        s.toggle_selection("L21_V008_1200");
        s.set_query("   ");
        let err = s.begin_search().unwrap_err();
        assert_eq!(err, SubmitError::EmptyQuery);
        assert_eq!(err.user_message(), None);
        assert!(s.results().is_empty());
        assert!(s.selection().is_empty());
        assert_eq!(s.phase(), &SearchPhase::Idle);
    }

    #[test]
    fn test_image_search_requires_image() {
        let mut s = session();
        s.set_search_type(SearchType::Image);
        let err = s.begin_search().unwrap_err();
        assert_eq!(err, SubmitError::MissingImage);
        assert!(err.user_message().unwrap().contains("upload an image"));

        s.set_image(ImageUpload {
            file_name: "query.png".to_string(),
            bytes: vec![0x89, 0x50],
        });
        let ticket = s.begin_search().unwrap();
        assert!(matches!(ticket.request, SearchRequest::Image { top_k: 10, .. }));
    }

    #[test]
    fn test_backend_url_required() {
        let mut s = SessionController::new(SessionConfig::default(), 5);
        s.set_query("cat");
        assert_eq!(s.begin_search().unwrap_err(), SubmitError::MissingBackendUrl);
        assert_eq!(s.phase(), &SearchPhase::Idle);
    }

    #[test]
    fn test_ready_maps_ids_and_resets() {
        let s = searched(10);
        assert_eq!(s.phase(), &SearchPhase::Ready);
        assert!(s.is_connected());
        assert_eq!(s.elapsed().map(format_elapsed).as_deref(), Some("1.25s"));
        let frames = s.results().frames();
        assert_eq!(frames.len(), 10);
        assert_eq!(
            frames[0].image_path.as_deref(),
            Some("/keyframes/L21/L21_V008/L21_V008_1200.jpg")
        );
    }

    #[test]
    fn test_new_search_resets_selection_and_answers() {
        let mut s = searched(4);
        s.set_app_mode(AppMode::Qa);
        s.toggle_selection("L21_V008_1201");
        s.set_answer("L21_V008_1201", "blue").unwrap();
        s.go_to_page(3);

        let ticket = s.begin_search().unwrap();
        // Still visible while the request is in flight.
        assert_eq!(s.selection().len(), 1);
        s.complete_search::<String>(ticket.generation, Ok(hits(2)), Duration::ZERO);
        assert!(s.selection().is_empty());
        assert!(s.answers().is_empty());
        assert_eq!(s.current_page().index(), 0);
    }

    #[test]
    fn test_failure_keeps_prior_results() {
        let mut s = searched(5);
        let ticket = s.begin_search().unwrap();
        s.complete_search(ticket.generation, Err("HTTP 502: bad gateway"), Duration::ZERO);
        assert!(!s.is_connected());
        assert_eq!(s.results().len(), 5);
        match s.phase() {
            SearchPhase::Failed { message } => assert!(message.contains("502")),
            other => panic!("unexpected phase {other:?}"),
        }
        s.dismiss_error();
        assert_eq!(s.phase(), &SearchPhase::Idle);
    }

    #[test]
    fn test_superseded_response_discarded() {
        let mut s = session();
        s.set_query("first");
        let slow = s.begin_search().unwrap();
        s.set_query("second");
        let fast = s.begin_search().unwrap();

        assert_eq!(
            s.complete_search::<String>(fast.generation, Ok(hits(2)), Duration::ZERO),
            Completion::Applied
        );
        assert_eq!(
            s.complete_search::<String>(slow.generation, Ok(hits(9)), Duration::ZERO),
            Completion::Superseded
        );
        assert_eq!(s.results().len(), 2);
    }

    #[test]
    fn test_app_mode_switch_resets_scoped_state() {
        let mut s = searched(6);
        s.set_app_mode(AppMode::Qa);
        s.toggle_selection("L21_V008_1200");
        s.set_answer("L21_V008_1200", "a red car").unwrap();
        s.begin_trake_selection("L21_V008_1200").unwrap();

        s.set_app_mode(AppMode::Qa);
        assert!(s.selection().is_empty());
        assert!(s.answers().is_empty());
        assert!(s.trake().selected_video().is_none());
        // Plain results survive a mode switch.
        assert_eq!(s.results().len(), 6);
    }

    fn with_committed_sequence(mut s: SessionController) -> SessionController {
        s.set_app_mode(AppMode::Trake);
        s.begin_trake_selection("L21_V008_1200").unwrap();
        s.toggle_trake_frame(1203).unwrap();
        s.toggle_trake_frame(1200).unwrap();
        assert_eq!(s.commit_trake_sequence().unwrap(), 0);
        s.toggle_selection("L21_V008_1200");
        assert_eq!(s.trake().event_sequences().len(), 1);
        s
    }

    #[test]
    fn test_app_mode_switch_drops_committed_sequences() {
        let mut s = with_committed_sequence(searched(3));
        s.set_app_mode(AppMode::Trake);
        assert!(s.trake().event_sequences().is_empty());
        assert!(s.trake().selected_video().is_none());
        assert!(s.selection().is_empty());
        assert_eq!(s.export_csv(None).unwrap_err(), ExportError::NoSequences);
    }

    #[test]
    fn test_temporal_strategy_switch_drops_committed_sequences() {
        let mut s = with_committed_sequence(searched(3));
        s.set_temporal_strategy(TemporalStrategy::Consolidated);
        assert!(s.trake().event_sequences().is_empty());
        assert!(s.selection().is_empty());
    }

    #[test]
    fn test_new_search_keeps_committed_sequences() {
        let mut s = with_committed_sequence(searched(3));
        let ticket = s.begin_search().unwrap();
        s.complete_search::<String>(ticket.generation, Ok(hits(2)), Duration::ZERO);
        assert_eq!(s.trake().event_sequences().len(), 1);
        assert_eq!(s.trake().event_sequences()[0].frames, vec![1200, 1203]);
    }

    #[test]
    fn test_answers_only_in_qa_mode() {
        let mut s = searched(1);
        assert_eq!(
            s.set_answer("L21_V008_1200", "x"),
            Err(SessionError::AnswersRequireQaMode)
        );
    }

    #[test]
    fn test_pagination_clamps() {
        let mut s = searched(17);
        assert_eq!(s.total_pages(), 3);
        assert_eq!(s.go_to_page(10), 2);
        assert_eq!(s.next_page(), 2);
        assert_eq!(s.go_to_page(-2), 0);
        assert_eq!(s.prev_page(), 0);
        if let ResultPage::Frames(page) = s.current_page() {
            assert_eq!(page.items.len(), 8);
        } else {
            panic!("expected frames");
        }
    }

    #[test]
    fn test_empty_results_have_one_page() {
        let mut s = session();
        assert_eq!(s.total_pages(), 1);
        assert_eq!(s.go_to_page(4), 0);
    }

    #[test]
    fn test_filter_resets_page() {
        let mut s = session();
        s.set_query("q");
        let ticket = s.begin_search().unwrap();
        let mut mixed = hits(12);
        mixed.push(hit("L30_V001_5"));
        s.complete_search::<String>(ticket.generation, Ok(mixed), Duration::ZERO);
        s.go_to_page(1);
        s.set_video_filter(Some("L30_V001"));
        assert_eq!(s.current_page().index(), 0);
        assert_eq!(s.current_page().total_items(), 1);
        s.set_video_filter(Some(" "));
        assert_eq!(s.video_filter(), None);
    }

    #[test]
    fn test_select_all_on_page() {
        let mut s = searched(10);
        assert_eq!(s.select_all_on_page(), 8);
        assert_eq!(s.select_all_on_page(), 0);
        s.next_page();
        assert_eq!(s.select_all_on_page(), 2);
        assert_eq!(s.selection().len(), 10);
        s.clear_selection();
        assert!(s.selection().is_empty());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut s = searched(3);
        s.toggle_selection("L21_V008_1200");
        let snapshot = s.clone();
        s.toggle_selection("L21_V008_1201");
        assert_eq!(snapshot.selection().len(), 1);
        assert_eq!(s.selection().len(), 2);
    }

    #[test]
    fn test_progressive_uses_last_step() {
        let mut s = session();
        s.set_temporal_event(0, "a man opens a door");
        s.add_temporal_event();
        s.set_temporal_event(1, "he sits down");
        let ticket = s.begin_temporal_search().unwrap();
        assert_eq!(ticket.request.events.len(), 2);
        assert_eq!(ticket.request.search_mode, TemporalStrategy::Progressive);

        let payload = TemporalPayload::Progressive(vec![hits(20), vec![hit("L01_V001_5")]]);
        s.complete_temporal_search::<String>(ticket.generation, Ok(payload), Duration::ZERO);
        assert!(s.is_temporal_active());
        assert_eq!(s.results().frames().len(), 1);
        if let ResultShape::Progressive(steps) = s.results() {
            assert_eq!(steps[0].len(), 20);
        }

        s.exit_temporal_search();
        assert!(!s.is_temporal_active());
        assert!(s.results().is_empty());
    }

    #[test]
    fn test_temporal_requires_an_event() {
        let mut s = session();
        s.set_temporal_event(0, "   ");
        assert_eq!(
            s.begin_temporal_search().unwrap_err(),
            SubmitError::NoTemporalEvents
        );
    }

    #[test]
    fn test_strategy_switch_clears_temporal_results() {
        let mut s = session();
        s.set_temporal_event(0, "x");
        let ticket = s.begin_temporal_search().unwrap();
        s.complete_temporal_search::<String>(
            ticket.generation,
            Ok(TemporalPayload::Progressive(vec![hits(3)])),
            Duration::ZERO,
        );
        s.toggle_selection("L21_V008_1200");
        s.set_temporal_strategy(TemporalStrategy::Consolidated);
        assert!(s.results().is_empty());
        assert!(s.selection().is_empty());
    }

    #[test]
    fn test_consolidated_export_keeps_event_order() {
        let mut s = session();
        s.set_app_mode(AppMode::Trake);
        s.set_temporal_strategy(TemporalStrategy::Consolidated);
        s.set_temporal_event(0, "a");
        s.add_temporal_event();
        s.set_temporal_event(1, "b");
        s.add_temporal_event();
        s.set_temporal_event(2, "c");
        let ticket = s.begin_temporal_search().unwrap();
        let payload = TemporalPayload::Consolidated(vec![RawTimeline {
            video_id: "L05_V012".to_string(),
            score: 3.0,
            image: vec![
                "L05_V012_100".to_string(),
                "L05_V012_400".to_string(),
                "L05_V012_900".to_string(),
            ],
        }]);
        s.complete_temporal_search::<String>(ticket.generation, Ok(payload), Duration::ZERO);
        assert_eq!(s.current_page().keys(), vec!["L05_V012".to_string()]);
        s.toggle_selection("L05_V012");
        let csv = s.export_csv(None).unwrap();
        assert_eq!(csv.content, "L05_V012, 100, 400, 900");
        assert_eq!(csv.file_name, "timeline_sequences.csv");
    }

    #[test]
    fn test_trake_flow_and_export() {
        let mut s = searched(3);
        s.set_app_mode(AppMode::Trake);
        let key = s.begin_trake_selection("L21_V008_1201").unwrap();
        let frames = [1200u64, 1100, 1300]
            .iter()
            .filter_map(|n| {
                Keyframe::from_image_path(&key, &format!("/keyframes/L21/{key}/{key}_{n}.jpg"))
            })
            .collect();
        assert!(s.load_trake_frames(&key, frames));
        assert_eq!(
            s.commit_trake_sequence(),
            Err(SessionError::Trake(TrakeError::EmptySequence))
        );
        s.toggle_trake_frame(1300).unwrap();
        s.toggle_trake_frame(1100).unwrap();
        s.commit_trake_sequence().unwrap();
        let csv = s.export_csv(Some("final")).unwrap();
        assert_eq!(csv.content, "L21_V008, 1100, 1300");
        assert_eq!(csv.file_name, "final.csv");
    }

    #[test]
    fn test_textual_kis_example_scenario() {
        let mut s = searched(10);
        for id in ["L21_V008_1200", "L21_V008_1203", "L21_V008_1207"] {
            assert!(s.toggle_selection(id));
        }
        let csv = s.export_csv(None).unwrap();
        let lines: Vec<&str> = csv.content.lines().collect();
        assert_eq!(lines, vec!["L21_V008, 1200", "L21_V008, 1203", "L21_V008, 1207"]);
    }
}
