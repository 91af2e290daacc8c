//! Crawlers that discover candidate articles from the tracked journal.
//!
//! A crawler takes no input and returns a best-effort list of
//! [`RawArticle`] candidates. It may fail outright or return partial data;
//! the refresh pipeline filters unusable candidates and treats any failure
//! as "no new data this cycle".
//!
//! # Backends
//!
//! | Backend | Module | Method |
//! |---------|--------|--------|
//! | ASAP RSS feed | [`feed`] | HTTP fetch + XML decoding |
//! | LLM search | [`llm`] | Asks an OpenAI-compatible model for a JSON array |

pub mod feed;
pub mod llm;

use crate::error::BoxError;
use crate::models::RawArticle;

pub use feed::FeedCrawler;
pub use llm::LlmCrawler;

/// Source of fresh article candidates.
pub trait Crawl {
    async fn crawl(&self) -> Result<Vec<RawArticle>, BoxError>;
}

/// The crawler selected by configuration.
#[derive(Debug)]
pub enum CrawlerBackend {
    Feed(FeedCrawler),
    Llm(LlmCrawler),
}

impl Crawl for CrawlerBackend {
    async fn crawl(&self) -> Result<Vec<RawArticle>, BoxError> {
        match self {
            CrawlerBackend::Feed(c) => c.crawl().await,
            CrawlerBackend::Llm(c) => c.crawl().await,
        }
    }
}
