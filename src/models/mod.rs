//! Data models for the configuration service.
//!
//! The document mirrors the JSON served by the remote configuration API;
//! articles are the offline reading cache.

mod article;
mod document;
mod entry;

pub use article::*;
pub use document::*;
pub use entry::*;
