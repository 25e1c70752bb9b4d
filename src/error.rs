//! Error taxonomy for site runs.
//!
//! Two tiers, matching how failures propagate: `ScrapeError` is fatal for the
//! site run that raised it (bad configuration, browser startup, export I/O),
//! while `ItemError` is contained at the item boundary. The item is dropped,
//! logged, and the batch continues.

use thiserror::Error;

/// Fatal failure for one site run. Per-request and per-item problems never
/// become a `ScrapeError`; they are absorbed as sentinels or dropped items.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("browser session error: {0}")]
    Browser(String),

    #[error("lookup resolution failed: {0}")]
    Resolution(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("catalog error: {0}")]
    Catalog(#[from] sqlx::Error),

    #[error("catalog migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Why one item was excluded from its batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable price `{0}`")]
    Price(String),

    #[error("unparseable identifier `{0}`")]
    Identifier(String),
}
