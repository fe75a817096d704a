//! Error types for feeds, sinks and startup configuration.

use std::time::Duration;
use thiserror::Error;

/// Failure to fetch or interpret one feed. The caller keeps its watermark.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("{feed}: request failed: {source}")]
    Transport {
        feed: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{feed}: malformed response: {source}")]
    Decode {
        feed: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{feed}: feed error (status {status}): {message}")]
    Feed {
        feed: &'static str,
        status: u16,
        message: String,
    },
}

impl FeedError {
    pub fn feed(&self) -> &'static str {
        match self {
            FeedError::Transport { feed, .. }
            | FeedError::Decode { feed, .. }
            | FeedError::Feed { feed, .. } => feed,
        }
    }
}

/// Failure to deliver one event to one sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("{sink}: request failed: {source}")]
    Transport {
        sink: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{sink}: rejected: {message}")]
    Rejected { sink: &'static str, message: String },

    #[error("{sink}: timed out after {after:?}")]
    Timeout { sink: &'static str, after: Duration },
}

/// Fatal at startup; polling never begins.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
