//! Data types shared by the session model and the HTTP layer.
//!
//! Wire types ([`RawHit`], [`RawTimeline`], [`TemporalPayload`]) mirror the
//! search API's JSON. Session types ([`SearchResultItem`], [`Timeline`]) are
//! built from them once per response and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::frame_id::{parse_frame_id, FrameId};

/// Returned when a settings string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The identifier used on the wire and in config files.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                        expected: concat!($($wire, " "),+),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// Whether a search is driven by text or by an example image.
    SearchType, "search type" {
        Text => "text",
        Image => "image",
    }
}

wire_enum! {
    /// Retrieval strategy sent as the `mode` form field.
    Strategy, "search strategy" {
        Clip => "clip",
        Vintern => "vintern",
        Hybrid => "hybrid",
    }
}

wire_enum! {
    /// Caption embedding model used by the `vintern` and `hybrid` strategies.
    CaptionModel, "caption model" {
        Bge => "bge",
        Gte => "gte",
    }
}

wire_enum! {
    /// Competition task the user is answering; decides how selections are
    /// captured and what the CSV export looks like.
    AppMode, "app mode" {
        TextualKis => "textual-kis",
        Qa => "qa",
        Trake => "trake",
    }
}

wire_enum! {
    /// How a multi-event temporal search is resolved by the backend.
    TemporalStrategy, "temporal strategy" {
        Progressive => "progressive",
        Consolidated => "consolidated",
    }
}

impl Default for AppMode {
    fn default() -> Self {
        AppMode::TextualKis
    }
}

impl Default for TemporalStrategy {
    fn default() -> Self {
        TemporalStrategy::Progressive
    }
}

impl Strategy {
    /// Only `vintern` and `hybrid` consult the caption model.
    pub fn uses_caption_model(&self) -> bool {
        matches!(self, Strategy::Vintern | Strategy::Hybrid)
    }

    /// Only `hybrid` blends text and visual scores.
    pub fn uses_alpha(&self) -> bool {
        matches!(self, Strategy::Hybrid)
    }
}

// ============ Wire types ============

/// One ranked hit as returned by `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    /// Raw frame identifier, e.g. `L21_V008_1200`.
    pub image: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub score: f64,
}

/// One whole-video timeline as returned by a consolidated temporal search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTimeline {
    #[serde(alias = "video")]
    pub video_id: String,
    #[serde(default)]
    pub score: f64,
    /// One raw frame identifier per event, in event order.
    pub image: Vec<String>,
}

/// The `results` of `POST /temporal_search`; its shape depends on the
/// requested `search_mode`.
#[derive(Debug, Clone, PartialEq)]
pub enum TemporalPayload {
    /// One ranked list per event step.
    Progressive(Vec<Vec<RawHit>>),
    /// Ranked whole-video timelines.
    Consolidated(Vec<RawTimeline>),
}

// ============ Session types ============

/// A ranked hit after identifier decoding.
///
/// A hit whose identifier does not decode keeps its raw id and gets no
/// frame or image path; renderers show a placeholder for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultItem {
    pub raw_id: String,
    pub frame: Option<FrameId>,
    pub image_path: Option<String>,
    pub caption: String,
    pub score: f64,
}

impl SearchResultItem {
    pub fn from_hit(hit: RawHit) -> Self {
        let raw_id = hit.image.trim().to_string();
        let frame = parse_frame_id(&raw_id).ok();
        let image_path = frame.as_ref().map(FrameId::image_path);
        Self {
            raw_id,
            frame,
            image_path,
            caption: hit.caption,
            score: hit.score,
        }
    }

    pub fn video_key(&self) -> Option<String> {
        self.frame.as_ref().map(FrameId::video_key)
    }
}

/// One frame of a consolidated timeline, aligned to its event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineFrame {
    pub raw_id: String,
    pub frame: Option<FrameId>,
    pub image_path: Option<String>,
}

/// A whole-video timeline: one frame per event, in event order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub video_id: String,
    pub score: f64,
    /// Index `i` answers event `i`. Never re-sorted.
    pub frames: Vec<TimelineFrame>,
}

impl Timeline {
    pub fn from_raw(raw: RawTimeline) -> Self {
        let frames = raw
            .image
            .into_iter()
            .map(|id| {
                let raw_id = id.trim().to_string();
                let frame = parse_frame_id(&raw_id).ok();
                let image_path = frame.as_ref().map(FrameId::image_path);
                TimelineFrame {
                    raw_id,
                    frame,
                    image_path,
                }
            })
            .collect();
        Self {
            video_id: raw.video_id.trim().to_string(),
            score: raw.score,
            frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_strings() {
        assert_eq!("textual-kis".parse::<AppMode>().unwrap(), AppMode::TextualKis);
        assert_eq!(AppMode::Qa.as_str(), "qa");
        assert_eq!(" hybrid ".parse::<Strategy>().unwrap(), Strategy::Hybrid);
        assert_eq!(
            TemporalStrategy::Consolidated.to_string(),
            "consolidated"
        );
    }

    #[test]
    fn test_enum_parse_error_lists_choices() {
        let err = "bm25".parse::<Strategy>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bm25"));
        assert!(msg.contains("clip vintern hybrid"));
    }

    #[test]
    fn test_strategy_knobs() {
        assert!(Strategy::Hybrid.uses_alpha());
        assert!(!Strategy::Vintern.uses_alpha());
        assert!(Strategy::Vintern.uses_caption_model());
        assert!(!Strategy::Clip.uses_caption_model());
    }

    #[test]
    fn test_hit_decoding() {
        let item = SearchResultItem::from_hit(RawHit {
            image: " L21_V008_1200 ".to_string(),
            caption: "L21_V008_1200 | Score: 0.91".to_string(),
            score: 0.91,
        });
        assert_eq!(item.raw_id, "L21_V008_1200");
        assert_eq!(
            item.image_path.as_deref(),
            Some("/keyframes/L21/L21_V008/L21_V008_1200.jpg")
        );
        assert_eq!(item.video_key().as_deref(), Some("L21_V008"));
    }

    #[test]
    fn test_malformed_hit_degrades() {
        let item = SearchResultItem::from_hit(RawHit {
            image: "broken".to_string(),
            caption: String::new(),
            score: 0.0,
        });
        assert_eq!(item.raw_id, "broken");
        assert!(item.frame.is_none());
        assert!(item.image_path.is_none());
    }

    #[test]
    fn test_hit_json_defaults() {
        let hit: RawHit = serde_json::from_str(r#"{"image": "L01_V001_5"}"#).unwrap();
        assert_eq!(hit.caption, "");
        assert_eq!(hit.score, 0.0);
    }

    #[test]
    fn test_timeline_keeps_event_order() {
        let raw: RawTimeline = serde_json::from_str(
            r#"{"video_id": "L05_V012", "score": 2.5,
                "image": ["L05_V012_900", "L05_V012_100", "L05_V012_400"]}"#,
        )
        .unwrap();
        let timeline = Timeline::from_raw(raw);
        let numbers: Vec<u64> = timeline
            .frames
            .iter()
            .filter_map(|f| f.frame.as_ref().map(|id| id.frame_number))
            .collect();
        assert_eq!(numbers, vec![900, 100, 400]);
    }

    #[test]
    fn test_timeline_accepts_video_alias() {
        let raw: RawTimeline =
            serde_json::from_str(r#"{"video": "L01_V002", "image": []}"#).unwrap();
        assert_eq!(raw.video_id, "L01_V002");
    }
}
