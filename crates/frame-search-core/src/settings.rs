//! User-controlled search parameters.
//!
//! [`SessionConfig`] is written only by explicit settings actions and read
//! by the search transitions when they build a request.

use serde::Serialize;

use crate::models::{CaptionModel, SearchType, Strategy};

pub const TOP_K_MIN: u32 = 10;
pub const TOP_K_MAX: u32 = 100;
pub const ALPHA_MIN: f64 = 0.1;
pub const ALPHA_MAX: f64 = 0.9;

/// An image selected for image search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub backend_url: String,
    pub query_text: String,
    pub search_type: SearchType,
    pub strategy: Strategy,
    pub top_k: u32,
    /// Text/visual blend weight; only sent under [`Strategy::Hybrid`].
    pub alpha: f64,
    pub caption_model: CaptionModel,
    #[serde(skip)]
    pub image: Option<ImageUpload>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            query_text: String::new(),
            search_type: SearchType::Text,
            strategy: Strategy::Hybrid,
            top_k: TOP_K_MIN,
            alpha: 0.5,
            caption_model: CaptionModel::Bge,
            image: None,
        }
    }
}

impl SessionConfig {
    /// Sets `top_k`, clamped into `[10, 100]`.
    pub fn set_top_k(&mut self, top_k: u32) {
        self.top_k = top_k.clamp(TOP_K_MIN, TOP_K_MAX);
    }

    /// Sets `alpha`, clamped into `[0.1, 0.9]`. NaN is ignored.
    pub fn set_alpha(&mut self, alpha: f64) {
        if alpha.is_nan() {
            return;
        }
        self.alpha = alpha.clamp(ALPHA_MIN, ALPHA_MAX);
    }

    /// Switching to image search drops the text query; switching back to
    /// text drops the uploaded image.
    pub fn set_search_type(&mut self, search_type: SearchType) {
        match search_type {
            SearchType::Image => self.query_text.clear(),
            SearchType::Text => self.image = None,
        }
        self.search_type = search_type;
    }

    pub fn set_backend_url(&mut self, url: &str) {
        self.backend_url = url.trim().trim_end_matches('/').to_string();
    }
}
