//! Enrichers that attach a Chinese translation and summary to an article.
//!
//! Enrichment is best-effort. An adapter returns the input untouched,
//! without any external call, when the article is already enriched; the
//! refresh pipeline records any error on the single affected article.

pub mod http;
pub mod llm;

use crate::error::BoxError;
use crate::models::{Article, Translation};
use serde::Serialize;

pub use http::HttpEnricher;
pub use llm::LlmEnricher;

/// Adds translated title/abstract and a generated summary to an article.
pub trait Enrich {
    async fn enrich(&self, article: &Article) -> Result<Article, BoxError>;
}

/// The enricher selected by configuration.
#[derive(Debug)]
pub enum EnricherBackend {
    Http(HttpEnricher),
    Llm(LlmEnricher),
}

impl Enrich for EnricherBackend {
    async fn enrich(&self, article: &Article) -> Result<Article, BoxError> {
        match self {
            EnricherBackend::Http(e) => e.enrich(article).await,
            EnricherBackend::Llm(e) => e.enrich(article).await,
        }
    }
}

/// The article fields an enrichment service gets to see.
#[derive(Debug, Serialize)]
pub struct EnrichmentRequest<'a> {
    pub title: &'a str,
    pub url: &'a str,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<&'a str>,
    pub authors: Option<&'a str>,
    pub date: &'a str,
}

impl<'a> From<&'a Article> for EnrichmentRequest<'a> {
    fn from(a: &'a Article) -> Self {
        Self {
            title: &a.title,
            url: &a.url,
            abstract_text: a.abstract_text.as_deref(),
            authors: a.authors.as_deref(),
            date: &a.date,
        }
    }
}

/// Copy of `article` carrying `translation`. The timestamp is left alone;
/// the pipeline bumps `last_updated` with its own clock.
fn with_translation(article: &Article, translation: Translation) -> Article {
    let mut enriched = article.clone();
    let last_updated = enriched.last_updated;
    enriched.apply_translation(translation, last_updated);
    enriched
}
