//! Error types shared across the crate.
//!
//! Collaborators (crawlers, enrichers, storage adapters, the LLM transport)
//! report failures as a boxed [`BoxError`]. The refresh pipeline turns the
//! few failures it cannot absorb into a [`RefreshError`].

use thiserror::Error;

/// Boxed error used at collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures surfaced by [`crate::pipeline::RefreshPipeline`].
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The crawl failed and there was no cached collection to fall back on.
    #[error("crawl failed and no cached articles are available: {0}")]
    Crawl(#[source] BoxError),

    /// Another refresh (or cache mutation) is already in flight.
    #[error("a refresh is already in progress")]
    AlreadyRunning,

    /// No cached article carries the requested id.
    #[error("no cached article with id {0}")]
    NotFound(String),
}
