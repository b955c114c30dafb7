//! Frame identifier codec.
//!
//! Every keyframe in the collection is addressed by a flat identifier of the
//! form `<batch>_<video>_<frame>`, e.g. `L21_V008_1200`. The batch and video
//! segments together name the source video (`L21_V008`); the third segment is
//! the frame number within that video.
//!
//! Parsing is permissive about trailing segments: `L21_V008_1200_extra`
//! decodes to the same [`FrameId`] as `L21_V008_1200`. Only the segment count
//! and the frame number are validated.
//!
//! # Derived paths
//!
//! | Function | Output for `L21_V008_1200` |
//! |----------|----------------------------|
//! | [`format_video_key`] | `L21_V008` |
//! | [`format_image_path`] | `/keyframes/L21/L21_V008/L21_V008_1200.jpg` |

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A decoded keyframe identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FrameId {
    /// Collection batch, e.g. `L21`.
    pub batch: String,
    /// Video number within the batch, e.g. `V008`.
    pub video_num: String,
    /// Frame number within the video.
    pub frame_number: u64,
}

/// Why a raw identifier could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameIdError {
    #[error("invalid frame id '{0}': expected <batch>_<video>_<frame>")]
    TooFewSegments(String),
    #[error("invalid frame id '{raw}': frame number '{segment}' is not a non-negative integer")]
    InvalidFrameNumber { raw: String, segment: String },
}

impl FrameId {
    /// The `<batch>_<video>` key grouping all frames of one video.
    pub fn video_key(&self) -> String {
        format!("{}_{}", self.batch, self.video_num)
    }

    /// Static asset path of this frame's keyframe image.
    pub fn image_path(&self) -> String {
        let key = self.video_key();
        format!(
            "/keyframes/{}/{}/{}_{}.jpg",
            self.batch, key, key, self.frame_number
        )
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.batch, self.video_num, self.frame_number)
    }
}

impl FromStr for FrameId {
    type Err = FrameIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_frame_id(s)
    }
}

/// Decode a raw `<batch>_<video>_<frame>` identifier.
///
/// Surrounding whitespace is ignored. Segments after the third are ignored.
pub fn parse_frame_id(raw: &str) -> Result<FrameId, FrameIdError> {
    let trimmed = raw.trim();
    let mut segments = trimmed.split('_');

    let (Some(batch), Some(video_num), Some(frame)) =
        (segments.next(), segments.next(), segments.next())
    else {
        return Err(FrameIdError::TooFewSegments(trimmed.to_string()));
    };

    let frame_number =
        parse_frame_number(frame).ok_or_else(|| FrameIdError::InvalidFrameNumber {
            raw: trimmed.to_string(),
            segment: frame.to_string(),
        })?;

    Ok(FrameId {
        batch: batch.to_string(),
        video_num: video_num.to_string(),
        frame_number,
    })
}

/// `/keyframes/{batch}/{batch}_{video}/{batch}_{video}_{frame}.jpg`
pub fn format_image_path(frame_id: &FrameId) -> String {
    frame_id.image_path()
}

/// `{batch}_{video}`
pub fn format_video_key(frame_id: &FrameId) -> String {
    frame_id.video_key()
}

/// Extract the frame number from a keyframe image path such as
/// `/keyframes/L21/L21_V008/L21_V008_1200.jpg`.
///
/// Returns `None` when the file name does not end in `_<digits>.jpg`.
pub fn frame_number_from_image_path(path: &str) -> Option<u64> {
    let file_name = path.rsplit('/').next()?;
    let stem = file_name.strip_suffix(".jpg")?;
    let (_, digits) = stem.rsplit_once('_')?;
    parse_frame_number(digits)
}

fn parse_frame_number(segment: &str) -> Option<u64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let id = parse_frame_id("L21_V008_1200").unwrap();
        assert_eq!(id.batch, "L21");
        assert_eq!(id.video_num, "V008");
        assert_eq!(id.frame_number, 1200);
        assert_eq!(id.video_key(), "L21_V008");
        assert_eq!(id.to_string(), "L21_V008_1200");
    }

    #[test]
    fn test_image_path_layout() {
        let id: FrameId = "L21_V008_1200".parse().unwrap();
        assert_eq!(
            format_image_path(&id),
            "/keyframes/L21/L21_V008/L21_V008_1200.jpg"
        );
        assert_eq!(format_video_key(&id), "L21_V008");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let id = parse_frame_id("  L05_V012_100\n").unwrap();
        assert_eq!(id.frame_number, 100);
        assert_eq!(id.batch, "L05");
    }

    #[test]
    fn test_parse_ignores_trailing_segments() {
        let id = parse_frame_id("L21_V008_1200_extra_bits").unwrap();
        assert_eq!(id, parse_frame_id("L21_V008_1200").unwrap());
    }

    #[test]
    fn test_parse_too_few_segments() {
        assert_eq!(
            parse_frame_id("L21_V008"),
            Err(FrameIdError::TooFewSegments("L21_V008".to_string()))
        );
        assert!(matches!(
            parse_frame_id(""),
            Err(FrameIdError::TooFewSegments(_))
        ));
    }

    #[test]
    fn test_parse_non_numeric_frame() {
        for raw in ["L21_V008_abc", "L21_V008_-5", "L21_V008_", "L21_V008_12x", "L21_V008_+3"] {
            assert!(
                matches!(
                    parse_frame_id(raw),
                    Err(FrameIdError::InvalidFrameNumber { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_frame_number_from_image_path() {
        assert_eq!(
            frame_number_from_image_path("/keyframes/L21/L21_V008/L21_V008_1200.jpg"),
            Some(1200)
        );
        assert_eq!(frame_number_from_image_path("L21_V008_7.jpg"), Some(7));
        assert_eq!(frame_number_from_image_path("/keyframes/L21/cover.png"), None);
        assert_eq!(frame_number_from_image_path("/keyframes/L21/L21_V008_x.jpg"), None);
    }
}
