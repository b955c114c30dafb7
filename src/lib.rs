//! # Frame Search
//!
//! Client tooling for a multimodal video keyframe retrieval service: a
//! search session (text, image, and multi-event temporal search), TRAKE
//! event-sequence building, submission CSV export, and a local launcher
//! that opens a keyframe's source video in a desktop player.
//!
//! Retrieval itself happens in an external search API. The client-side
//! state model lives in the `frame-search-core` crate; this crate connects
//! it to the network, the filesystem, and the terminal.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ CLI/shell  │──▶│   Session    │──▶│ Search API  │
//! │   (frs)    │   │ (driver.rs)  │   │ (external)  │
//! └─────┬──────┘   └──────┬───────┘   └─────────────┘
//!       │                 │
//!       │                 ▼
//!       │          ┌──────────────┐
//!       │          │ Media store  │
//!       │          │ (index/info) │
//!       ▼          └──────────────┘
//! ┌────────────┐
//! │  Launcher  │──▶ MPC-HC / MPC-BE
//! │ (axum)     │
//! └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! frs search "person running" --strategy hybrid --top-k 20
//! frs temporal "a man opens a door" "he sits down" --mode consolidated
//! frs frames L21_V008_1200
//! frs serve launcher            # in another terminal
//! frs open L21_V008_1200
//! frs session                   # interactive shell
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`client`] | Search API client |
//! | [`media`] | Keyframe index, video info, launcher client |
//! | [`driver`] | Async session driver with stale-response discard |
//! | [`search`] | One-shot commands and result rendering |
//! | [`export`] | CSV files on disk |
//! | [`shell`] | Interactive session shell |
//! | [`server`] | Desktop player launcher service |

pub mod client;
pub mod config;
pub mod driver;
pub mod export;
pub mod media;
pub mod search;
pub mod server;
pub mod shell;
