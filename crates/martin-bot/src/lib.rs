//! MARTIN application crate: configuration, wiring and operational
//! commands.

pub mod app;
pub mod commands;
pub mod config;
pub mod error;

pub use app::{App, AppRun};
pub use config::{apply_settings, AppConfig, ExecutionMode, NotifierMode};
pub use error::{AppError, AppResult};
