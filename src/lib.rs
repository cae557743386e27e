//! NewsApp configuration bootstrap.
//!
//! Fetches the remote app configuration, keeps an offline copy in SQLite, and
//! decides at launch which configuration the client runs with.

pub mod auth;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod helpers;
pub mod localization;
pub mod models;
pub mod network;
pub mod remote;
pub mod sync;

pub use bootstrap::{AppConfigService, AppConfigState, BootstrapOptions, ConfigSource};
pub use errors::AppError;
pub use models::ConfigurationDocument;
