#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use,
    clippy::uninlined_format_args
)]

//! Sleep-session tracking core.
//!
//! [`manager::SessionManager`] owns the session lifecycle rules (start, stop,
//! manual backfill) and the day-level queries a calendar view needs.
//! [`sessions::SessionStore`] is the durable storage boundary; two backends
//! ship with the crate (in-memory and JSON file). The display layer is not
//! part of this crate — it drives the manager and re-renders on the
//! [`manager::SessionManager::subscribe`] change signal.

pub mod config;
pub mod manager;
pub mod sessions;

pub use config::Config;
pub use manager::{SessionError, SessionManager};
pub use sessions::{SessionStore, SleepSession};
