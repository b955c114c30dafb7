//! Pagination and video filtering.
//!
//! Pages are derived from the full result set on every read; nothing here
//! caches. Page indices are clamped, never rejected: any requested index
//! lands in `[0, total_pages - 1]`.

use crate::models::{SearchResultItem, Timeline};

/// Page size for plain search results.
pub const PAGE_SIZE: usize = 8;
/// Page size while temporal results are shown. Currently equal to
/// [`PAGE_SIZE`]; the two are kept separate on purpose.
pub const TEMPORAL_PAGE_SIZE: usize = 8;
/// Page size for a TRAKE video's keyframe strip.
pub const TRAKE_FRAMES_PER_PAGE: usize = 10;

/// Anything that belongs to a single source video.
pub trait VideoScoped {
    fn scope_key(&self) -> Option<String>;
}

impl VideoScoped for SearchResultItem {
    fn scope_key(&self) -> Option<String> {
        self.video_key()
    }
}

impl VideoScoped for Timeline {
    fn scope_key(&self) -> Option<String> {
        Some(self.video_id.clone())
    }
}

/// One page of a derived list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub index: usize,
    pub total_pages: usize,
    /// Item count after filtering.
    pub total_items: usize,
    pub items: Vec<&'a T>,
}

impl<T> Page<'_, T> {
    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.total_pages
    }
}

/// `max(ceil(len / page_size), 1)`
pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    len.div_ceil(page_size).max(1)
}

/// Clamp a requested (possibly negative) page index into range.
pub fn clamp_page(requested: i64, total_pages: usize) -> usize {
    let last = total_pages.max(1) - 1;
    if requested <= 0 {
        0
    } else {
        usize::try_from(requested).map_or(last, |r| r.min(last))
    }
}

/// Keep only items of the given video. `None` keeps everything.
///
/// Items without a video key (undecodable ids) are dropped when a filter
/// is active.
pub fn filter_by_video_key<'a, T: VideoScoped>(
    items: &'a [T],
    filter: Option<&str>,
) -> Vec<&'a T> {
    match filter {
        None => items.iter().collect(),
        Some(key) => items
            .iter()
            .filter(|item| item.scope_key().as_deref() == Some(key))
            .collect(),
    }
}

/// Slice one page out of an already-filtered list.
pub fn paginate<'a, T>(items: Vec<&'a T>, page_index: usize, page_size: usize) -> Page<'a, T> {
    let total_items = items.len();
    let total = total_pages(total_items, page_size);
    let index = page_index.min(total - 1);
    let items = items
        .into_iter()
        .skip(index * page_size)
        .take(page_size)
        .collect();
    Page {
        index,
        total_pages: total,
        total_items,
        items,
    }
}
