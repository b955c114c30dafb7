//! Submission CSV formatting.
//!
//! Rows are plain data (no header), joined with `\n`, fields separated by
//! `", "`. The row shape depends on the app mode and on which result shape
//! is active:
//!
//! | Situation | Row | Default file |
//! |-----------|-----|--------------|
//! | consolidated timelines | `video_id, f1, f2, ...` (event order) | `timeline_sequences` |
//! | progressive temporal, `qa` | `video, frame, "answer"` | `temporal_search_results` |
//! | progressive temporal, other | `video, frame` | `temporal_search_results` |
//! | `trake` | `video, f1, f2, ...` (ascending) | `trake_event_sequences` |
//! | `qa` | `video, frame, "answer"` | `qa_selected_results` |
//! | `textual-kis` | `video, frame` | `textual_kis_selected_results` |
//!
//! Consolidated and `trake`/`qa`/`textual-kis` rows cover only selected
//! items; progressive temporal rows cover every result of the final step.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::models::{AppMode, SearchResultItem, Timeline};
use crate::trake::EventSequence;

/// What the export reads from the session.
#[derive(Debug, Clone, Copy)]
pub enum ExportSource<'a> {
    /// Plain search results; rows for the selected ones.
    Selected(&'a [SearchResultItem]),
    /// Final step of a progressive temporal search; rows for all of them.
    Temporal(&'a [SearchResultItem]),
    /// Consolidated timelines; rows for the selected ones.
    Timelines(&'a [Timeline]),
    /// Committed TRAKE sequences.
    Sequences(&'a [EventSequence]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    /// Always ends in `.csv`.
    pub file_name: String,
    pub content: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("Please select at least one item to download.")]
    NothingSelected,
    #[error("Please create at least one event sequence to download.")]
    NoSequences,
    #[error("There are no temporal search results to download.")]
    NoTemporalResults,
}

/// Quote a free-text field, doubling embedded quotes.
pub fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Build the CSV for `source`.
///
/// `file_name` overrides the default stem when non-blank; `.csv` is always
/// appended.
pub fn export_csv(
    app_mode: AppMode,
    source: ExportSource<'_>,
    selection: &BTreeSet<String>,
    answers: &BTreeMap<String, String>,
    file_name: Option<&str>,
) -> Result<CsvExport, ExportError> {
    let (rows, default_stem) = match source {
        ExportSource::Timelines(timelines) => {
            let rows: Vec<String> = timelines
                .iter()
                .filter(|t| selection.contains(&t.video_id))
                .map(timeline_row)
                .collect();
            if rows.is_empty() {
                return Err(ExportError::NothingSelected);
            }
            (rows, "timeline_sequences")
        }
        ExportSource::Temporal(items) => {
            let rows: Vec<String> = items
                .iter()
                .filter_map(|item| frame_row(app_mode, item, answers))
                .collect();
            if rows.is_empty() {
                return Err(ExportError::NoTemporalResults);
            }
            (rows, "temporal_search_results")
        }
        ExportSource::Sequences(sequences) => {
            if sequences.is_empty() {
                return Err(ExportError::NoSequences);
            }
            (sequences.iter().map(sequence_row).collect(), "trake_event_sequences")
        }
        ExportSource::Selected(items) => {
            let rows: Vec<String> = items
                .iter()
                .filter(|item| selection.contains(&item.raw_id))
                .filter_map(|item| frame_row(app_mode, item, answers))
                .collect();
            if rows.is_empty() {
                return Err(ExportError::NothingSelected);
            }
            let stem = match app_mode {
                AppMode::Qa => "qa_selected_results",
                _ => "textual_kis_selected_results",
            };
            (rows, stem)
        }
    };

    let stem = file_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(default_stem);

    Ok(CsvExport {
        file_name: format!("{}.csv", stem),
        rows: rows.len(),
        content: rows.join("\n"),
    })
}

fn frame_row(
    app_mode: AppMode,
    item: &SearchResultItem,
    answers: &BTreeMap<String, String>,
) -> Option<String> {
    let frame = item.frame.as_ref()?;
    let base = format!("{}, {}", frame.video_key(), frame.frame_number);
    if app_mode == AppMode::Qa {
        let answer = answers.get(&item.raw_id).map(String::as_str).unwrap_or("");
        Some(format!("{}, {}", base, quote_field(answer)))
    } else {
        Some(base)
    }
}

fn timeline_row(timeline: &Timeline) -> String {
    let mut fields = vec![timeline.video_id.clone()];
    fields.extend(timeline.frames.iter().map(|f| match &f.frame {
        Some(id) => id.frame_number.to_string(),
        None => f.raw_id.clone(),
    }));
    fields.join(", ")
}

fn sequence_row(sequence: &EventSequence) -> String {
    let mut fields = vec![sequence.video_key.clone()];
    fields.extend(sequence.frames.iter().map(u64::to_string));
    fields.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawHit, RawTimeline};

    fn items(ids: &[&str]) -> Vec<SearchResultItem> {
        ids.iter()
            .map(|id| {
                SearchResultItem::from_hit(RawHit {
                    image: id.to_string(),
                    caption: String::new(),
                    score: 0.5,
                })
            })
            .collect()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quote_field_doubles_quotes() {
        assert_eq!(quote_field(r#"He said "hi""#), r#""He said ""hi""""#);
        assert_eq!(quote_field(""), r#""""#);
    }

    #[test]
    fn test_textual_kis_rows_follow_rank_order() {
        let results = items(&["L21_V008_1200", "L21_V008_40", "L22_V001_7", "L23_V002_9"]);
        let selection = set(&["L23_V002_9", "L21_V008_1200", "L22_V001_7"]);
        let csv = export_csv(
            AppMode::TextualKis,
            ExportSource::Selected(&results),
            &selection,
            &BTreeMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(csv.file_name, "textual_kis_selected_results.csv");
        assert_eq!(csv.rows, 3);
        assert_eq!(csv.content, "L21_V008, 1200\nL22_V001, 7\nL23_V002, 9");
    }

    #[test]
    fn test_qa_rows_escape_answers() {
        let results = items(&["L01_V001_5", "L01_V001_6"]);
        let mut answers = BTreeMap::new();
        answers.insert("L01_V001_5".to_string(), r#"He said "hi""#.to_string());
        let csv = export_csv(
            AppMode::Qa,
            ExportSource::Selected(&results),
            &set(&["L01_V001_5", "L01_V001_6"]),
            &answers,
            Some("  "),
        )
        .unwrap();
        assert_eq!(csv.file_name, "qa_selected_results.csv");
        assert_eq!(
            csv.content,
            "L01_V001, 5, \"He said \"\"hi\"\"\"\nL01_V001, 6, \"\""
        );
    }

    #[test]
    fn test_nothing_selected() {
        let results = items(&["L01_V001_5"]);
        let err = export_csv(
            AppMode::TextualKis,
            ExportSource::Selected(&results),
            &BTreeSet::new(),
            &BTreeMap::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, ExportError::NothingSelected);
    }

    #[test]
    fn test_trake_sequences() {
        let sequences = vec![
            EventSequence {
                video_key: "L21_V008".to_string(),
                frames: vec![100, 250, 900],
            },
            EventSequence {
                video_key: "L02_V010".to_string(),
                frames: vec![4],
            },
        ];
        let csv = export_csv(
            AppMode::Trake,
            ExportSource::Sequences(&sequences),
            &BTreeSet::new(),
            &BTreeMap::new(),
            Some("run1"),
        )
        .unwrap();
        assert_eq!(csv.file_name, "run1.csv");
        assert_eq!(csv.content, "L21_V008, 100, 250, 900\nL02_V010, 4");

        let err = export_csv(
            AppMode::Trake,
            ExportSource::Sequences(&[]),
            &BTreeSet::new(),
            &BTreeMap::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, ExportError::NoSequences);
    }

    #[test]
    fn test_timeline_rows_keep_event_order() {
        let timelines = vec![
            Timeline::from_raw(RawTimeline {
                video_id: "L05_V012".to_string(),
                score: 1.0,
                image: vec![
                    "L05_V012_100".to_string(),
                    "L05_V012_900".to_string(),
                    "L05_V012_400".to_string(),
                ],
            }),
            Timeline::from_raw(RawTimeline {
                video_id: "L05_V013".to_string(),
                score: 0.5,
                image: vec!["L05_V013_1".to_string()],
            }),
        ];
        let csv = export_csv(
            AppMode::Trake,
            ExportSource::Timelines(&timelines),
            &set(&["L05_V012"]),
            &BTreeMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(csv.file_name, "timeline_sequences.csv");
        assert_eq!(csv.content, "L05_V012, 100, 900, 400");
    }

    #[test]
    fn test_temporal_exports_every_row() {
        let results = items(&["L01_V001_5", "bad", "L01_V002_8"]);
        let csv = export_csv(
            AppMode::TextualKis,
            ExportSource::Temporal(&results),
            &BTreeSet::new(),
            &BTreeMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(csv.file_name, "temporal_search_results.csv");
        assert_eq!(csv.content, "L01_V001, 5\nL01_V002, 8");
    }
}
