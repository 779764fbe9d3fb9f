//! Client-side sync engine for a personal movie / TV / anime watchlist
//!
//! The hosted store is the only source of truth: the visible collection is
//! always the result of a fresh fetch, and every write is followed by one.
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod shell;
pub mod telemetry;

pub use app::{AppState, Screen};
pub use config::Config;
pub use error::{AppError, AppResult};
