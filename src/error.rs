//! Error taxonomy for the sweep pipeline.
//!
//! Adapter, timeout, and persistence errors end the task that raised them and
//! nothing else. Configuration errors are fatal and surface before any task
//! is submitted.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::config::Site;

/// Error type for adapter, persistence, and configuration failures.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("source adapter for '{site}' failed: {reason}")]
    Adapter { site: Site, reason: String },
    #[error("source adapter for '{site}' timed out after {after:?}")]
    Timeout { site: Site, after: Duration },
    #[error("i/o failure: {0}")]
    Persistence(#[from] io::Error),
    #[error("dataset encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("could not parse config file: {0}")]
    ConfigFile(#[from] serde_yaml::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned an unusable reply: {0}")]
    Model(String),
}
