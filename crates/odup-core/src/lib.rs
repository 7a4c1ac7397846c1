//! Core of the odup uploader: resumable chunked uploads to a drive-style
//! object store, with retry, token caching and bounded batch concurrency.

pub mod config;
pub mod logging;

pub mod api;
pub mod auth;
pub mod batch;
pub mod engine;
pub mod error;
pub mod queue;
pub mod range;
pub mod retry;
pub mod session;
pub mod source;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::{Result, UploadError};
