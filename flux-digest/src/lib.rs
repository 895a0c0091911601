//! flux-digest library crate.
//!
//! Feed entries arrive through a webhook, are queued in SQLite, summarized by
//! a text-generation service one at a time and written back to Miniflux with
//! the summary prepended.

pub mod api;
pub mod clients;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod worker;

pub use error::{Error, Result};
