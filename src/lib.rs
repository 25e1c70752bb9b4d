//! Aggregates video game console listings from Colombian marketplaces.
//!
//! Each site is described by a capability descriptor (pagination strategy,
//! transport, locators, pacing) and a small scraper that parses its pages.
//! One generic pipeline reads the descriptor, enumerates pages, fetches
//! them plainly or through a headless browser, assembles normalized
//! records and exports them as JSON shards, optionally forwarding the run
//! to the store API and folding it into a local catalog.

pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod sites;
pub mod store;

pub use error::{ItemError, ScrapeError};
pub use models::{Batch, Category, ProductRecord, RunSummary, Site};
pub use pipeline::SiteRunner;
