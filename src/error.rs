use std::path::PathBuf;

use thiserror::Error;

/// Errors that cross the component boundary to the CLI layer.
///
/// Everything recoverable (quota waits, the single retry after an
/// authoritative rejection) is handled inside the guarded call path; only
/// terminal outcomes surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing application keys or an unusable state directory.
    #[error("configuration error: {0}")]
    Config(String),

    /// The interactive authorization flow failed or was declined.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Quota stayed exhausted after the computed wait, or the server
    /// rejected twice in a row for one invocation.
    #[error("rate limit exceeded for {endpoint}: window resets at epoch {reset_at} (waited {waited_secs}s)")]
    RateLimitExceeded {
        endpoint: String,
        reset_at: i64,
        waited_secs: u64,
    },

    /// Network-level failure. Quota state is never mutated for these.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-rate-limit error status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Persisted state could not be written. Reads degrade instead.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The user aborted while waiting out a rate-limit window.
    #[error("interrupted while waiting for {endpoint} rate limit reset")]
    Interrupted { endpoint: String },
}

pub type Result<T> = std::result::Result<T, Error>;
