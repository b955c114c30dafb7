//! TRAKE event-sequence builder.
//!
//! In TRAKE mode the user picks one video, browses all of its keyframes ten
//! at a time, toggles frame numbers into a working sequence, and commits the
//! sequence. Committed sequences accumulate until deleted.

use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::frame_id::{frame_number_from_image_path, parse_frame_id, FrameIdError};
use crate::view::{clamp_page, paginate, Page, TRAKE_FRAMES_PER_PAGE};

/// One keyframe of the selected video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keyframe {
    pub raw_id: String,
    pub frame_number: u64,
    pub image_path: String,
}

impl Keyframe {
    /// Build from an entry of the keyframes index. `None` if the path does
    /// not end in `_<frame>.jpg`.
    pub fn from_image_path(video_key: &str, image_path: &str) -> Option<Self> {
        let frame_number = frame_number_from_image_path(image_path)?;
        Some(Self {
            raw_id: format!("{}_{}", video_key, frame_number),
            frame_number,
            image_path: image_path.to_string(),
        })
    }
}

/// A committed sequence of frame numbers from one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSequence {
    pub video_key: String,
    /// Ascending.
    pub frames: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrakeError {
    #[error("Please select at least one frame for the event sequence.")]
    EmptySequence,
    #[error("Select a video before building an event sequence.")]
    NoVideoSelected,
    #[error(transparent)]
    InvalidFrameId(#[from] FrameIdError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrakeState {
    selected_video: Option<String>,
    video_frames: Vec<Keyframe>,
    current_sequence: BTreeSet<u64>,
    event_sequences: Vec<EventSequence>,
    page: usize,
}

impl TrakeState {
    pub fn selected_video(&self) -> Option<&str> {
        self.selected_video.as_deref()
    }

    pub fn video_frames(&self) -> &[Keyframe] {
        &self.video_frames
    }

    /// The working sequence, ascending.
    pub fn current_sequence(&self) -> Vec<u64> {
        self.current_sequence.iter().copied().collect()
    }

    pub fn contains_frame(&self, frame_number: u64) -> bool {
        self.current_sequence.contains(&frame_number)
    }

    pub fn event_sequences(&self) -> &[EventSequence] {
        &self.event_sequences
    }

    /// Pick the video containing `raw_id`. Clears the frame strip and the
    /// working sequence; the caller loads frames with [`Self::load_frames`].
    ///
    /// Returns the video key to fetch.
    pub fn select_video(&mut self, raw_id: &str) -> Result<String, TrakeError> {
        let video_key = parse_frame_id(raw_id)?.video_key();
        self.selected_video = Some(video_key.clone());
        self.video_frames.clear();
        self.current_sequence.clear();
        self.page = 0;
        Ok(video_key)
    }

    /// Install the frame list for `video_key`, sorted ascending by frame
    /// number. Ignored (returns `false`) if another video has been selected
    /// since the fetch started.
    pub fn load_frames(&mut self, video_key: &str, mut frames: Vec<Keyframe>) -> bool {
        if self.selected_video.as_deref() != Some(video_key) {
            return false;
        }
        frames.sort_by_key(|f| f.frame_number);
        frames.dedup_by_key(|f| f.frame_number);
        self.video_frames = frames;
        self.page = 0;
        true
    }

    /// Add the frame if absent, remove it if present. Returns whether the
    /// frame is in the sequence afterwards.
    pub fn toggle_frame(&mut self, frame_number: u64) -> Result<bool, TrakeError> {
        if self.selected_video.is_none() {
            return Err(TrakeError::NoVideoSelected);
        }
        if self.current_sequence.remove(&frame_number) {
            Ok(false)
        } else {
            self.current_sequence.insert(frame_number);
            Ok(true)
        }
    }

    /// Append the working sequence to the committed list and clear it.
    ///
    /// Returns the index of the new sequence.
    pub fn commit_sequence(&mut self) -> Result<usize, TrakeError> {
        if self.current_sequence.is_empty() {
            return Err(TrakeError::EmptySequence);
        }
        let video_key = self
            .selected_video
            .clone()
            .ok_or(TrakeError::NoVideoSelected)?;
        let frames = std::mem::take(&mut self.current_sequence)
            .into_iter()
            .collect();
        self.event_sequences.push(EventSequence { video_key, frames });
        Ok(self.event_sequences.len() - 1)
    }

    /// Remove a committed sequence. Out-of-range indices are ignored.
    pub fn delete_sequence(&mut self, index: usize) -> bool {
        if index >= self.event_sequences.len() {
            return false;
        }
        self.event_sequences.remove(index);
        true
    }

    /// Move the frame strip to `page`, clamped into range.
    pub fn go_to_page(&mut self, page: i64) -> usize {
        let total = crate::view::total_pages(self.video_frames.len(), TRAKE_FRAMES_PER_PAGE);
        self.page = clamp_page(page, total);
        self.page
    }

    pub fn frames_page(&self) -> Page<'_, Keyframe> {
        paginate(
            self.video_frames.iter().collect(),
            self.page,
            TRAKE_FRAMES_PER_PAGE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(key: &str, numbers: &[u64]) -> Vec<Keyframe> {
        numbers
            .iter()
            .map(|n| {
                Keyframe::from_image_path(
                    key,
                    &format!("/keyframes/L21/{key}/{key}_{n}.jpg"),
                )
                .unwrap()
            })
            .collect()
    }

    fn with_video() -> TrakeState {
        let mut state = TrakeState::default();
        let key = state.select_video("L21_V008_1200").unwrap();
        assert_eq!(key, "L21_V008");
        state.load_frames(&key, frames(&key, &[300, 100, 200]));
        state
    }

    #[test]
    fn test_keyframe_from_index_path() {
        let kf = Keyframe::from_image_path("L21_V008", "/keyframes/L21/L21_V008/L21_V008_1200.jpg")
            .unwrap();
        assert_eq!(kf.raw_id, "L21_V008_1200");
        assert_eq!(kf.frame_number, 1200);
        assert!(Keyframe::from_image_path("L21_V008", "/keyframes/readme.txt").is_none());
    }

    #[test]
    fn test_select_video_rejects_bad_id() {
        let mut state = TrakeState::default();
        assert!(matches!(
            state.select_video("nonsense"),
            Err(TrakeError::InvalidFrameId(_))
        ));
        assert!(state.selected_video().is_none());
    }

    #[test]
    fn test_frames_sorted_on_load() {
        let state = with_video();
        let numbers: Vec<u64> = state.video_frames().iter().map(|f| f.frame_number).collect();
        assert_eq!(numbers, vec![100, 200, 300]);
    }

    #[test]
    fn test_stale_frame_load_ignored() {
        let mut state = with_video();
        state.select_video("L21_V009_1").unwrap();
        assert!(!state.load_frames("L21_V008", frames("L21_V008", &[1, 2])));
        assert!(state.video_frames().is_empty());
    }

    #[test]
    fn test_toggle_keeps_sorted_and_is_idempotent() {
        let mut state = with_video();
        state.toggle_frame(300).unwrap();
        state.toggle_frame(100).unwrap();
        let before = state.current_sequence();
        assert_eq!(before, vec![100, 300]);

        assert!(state.toggle_frame(200).unwrap());
        assert_eq!(state.current_sequence(), vec![100, 200, 300]);
        assert!(!state.toggle_frame(200).unwrap());
        assert!(state.toggle_frame(200).unwrap());
        assert!(!state.toggle_frame(200).unwrap());
        assert_eq!(state.current_sequence(), before);
    }

    #[test]
    fn test_toggle_requires_video() {
        let mut state = TrakeState::default();
        assert_eq!(state.toggle_frame(5), Err(TrakeError::NoVideoSelected));
    }

    #[test]
    fn test_commit_empty_rejected() {
        let mut state = with_video();
        let err = state.commit_sequence().unwrap_err();
        assert_eq!(err, TrakeError::EmptySequence);
        assert!(err.to_string().contains("at least one frame"));
        assert!(state.event_sequences().is_empty());
    }

    #[test]
    fn test_commit_and_delete() {
        let mut state = with_video();
        state.toggle_frame(200).unwrap();
        state.toggle_frame(100).unwrap();
        assert_eq!(state.commit_sequence().unwrap(), 0);
        assert!(state.current_sequence().is_empty());
        assert_eq!(
            state.event_sequences()[0],
            EventSequence {
                video_key: "L21_V008".to_string(),
                frames: vec![100, 200],
            }
        );

        assert!(!state.delete_sequence(3));
        assert!(state.delete_sequence(0));
        assert!(state.event_sequences().is_empty());
    }

    #[test]
    fn test_frame_pages_clamp() {
        let mut state = TrakeState::default();
        let key = state.select_video("L01_V001_0").unwrap();
        let numbers: Vec<u64> = (0..25).collect();
        state.load_frames(&key, frames(&key, &numbers));

        assert_eq!(state.go_to_page(9), 2);
        assert_eq!(state.frames_page().items.len(), 5);
        assert_eq!(state.go_to_page(-4), 0);
        assert_eq!(state.frames_page().items.len(), 10);
        assert_eq!(state.frames_page().total_pages, 3);
    }
}
