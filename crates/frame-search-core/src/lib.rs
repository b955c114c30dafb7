//! # Frame Search Core
//!
//! The client-side state model for Frame Search: frame identifier codec,
//! search session state machine, temporal event editing, TRAKE sequence
//! building, pagination, and CSV export.
//!
//! This crate performs no I/O. It has no tokio, reqwest, or filesystem
//! dependencies; every transition is a plain method call on owned state,
//! so the whole model can be unit-tested without a backend.

pub mod export;
pub mod frame_id;
pub mod models;
pub mod session;
pub mod settings;
pub mod temporal;
pub mod trake;
pub mod view;

pub use frame_id::{parse_frame_id, FrameId, FrameIdError};
pub use session::{Completion, SearchPhase, SessionController, SubmitError};
