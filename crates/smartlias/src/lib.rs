//! `smartlias` - Barangay resident-services backend
//!
//! This library provides resident records, PIN-based login with lockout,
//! announcements with SMS broadcast to targeted groups, and document
//! requests, served as a JSON API over HTTP. Records live in SQLite or in
//! plain JSON files.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod announcements;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod config;
pub mod documents;
pub mod error;
pub mod http;
pub mod logging;
pub mod model;
pub mod residents;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use storage::{open_store, Store};
