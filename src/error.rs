//! Error types for the fallible edges of the crate.
//!
//! Clustering and marker reconciliation never fail: anomalies there are
//! reported as values. Only loading a region catalog and fetching stores
//! can return errors.

use thiserror::Error;

/// Region catalog parsing and validation errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to parse region catalog: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("region catalog is empty")]
    Empty,

    #[error("duplicate region id '{0}'")]
    DuplicateId(String),

    #[error("duplicate region name '{0}'")]
    DuplicateName(String),

    #[error("region '{id}' has an invalid anchor coordinate")]
    InvalidAnchor { id: String },

    #[error("region '{id}' has no address keywords")]
    MissingKeywords { id: String },

    #[error("region '{id}' must name a parent area")]
    MissingParent { id: String },

    #[error("top-level region '{id}' cannot have a parent")]
    UnexpectedParent { id: String },

    #[error("region '{id}' refers to unknown parent area '{parent}'")]
    UnknownParent { id: String, parent: String },

    #[error("only half regions can be marked as remainder (region '{id}')")]
    InvalidRemainder { id: String },

    #[error("area '{parent}' has an invalid north/south split: {reason}")]
    InvalidSplit { parent: String, reason: String },
}

/// Store fetch errors.
#[cfg(feature = "http")]
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to decode store list: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
