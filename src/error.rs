//! Error taxonomy for lab runs.
//!
//! Everything here is fatal to a run except where the caller says
//! otherwise; sensor echo mismatches are deliberately not an error
//! variant (they are counted and reported by the sensor driver).

use std::time::Duration;

use thiserror::Error;

/// Errors raised while driving a lab instance.
#[derive(Debug, Error)]
pub enum LabError {
    /// The instance reported lifecycle state `error` during polling.
    #[error("instance entered error state")]
    InstanceError,

    /// The outer run deadline elapsed before the flow finished.
    #[error("run exceeded deadline of {0:?}")]
    Timeout(Duration),

    /// No hardware model matched the requested flavor prefix.
    #[error("no hardware model with flavor starting with '{0}'")]
    NoMatchingModel(String),

    /// No software package satisfied the selection predicate.
    #[error("no software package matching {0}")]
    NoMatchingSoftware(String),

    /// The lab API answered with a non-success status.
    #[error("lab API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Connection, TLS or body-decoding failure talking to the API.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Failure on the live console websocket.
    #[error("console stream error: {0}")]
    Console(#[from] tokio_tungstenite::tungstenite::Error),

    /// An authenticated call was made before `login`.
    #[error("not logged in")]
    NotLoggedIn,

    /// The account has no projects to provision into.
    #[error("account has no projects")]
    MissingProject,

    /// The endpoint argument is not a valid URL.
    #[error("invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),

    /// The firmware image could not be read from disk.
    #[error("failed to read firmware image '{path}': {source}")]
    FirmwareRead {
        path: String,
        source: std::io::Error,
    },
}
