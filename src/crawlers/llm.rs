//! Crawler that asks a search-capable model for the latest articles.
//!
//! The model is prompted for a JSON array of objects with the keys
//! `title`, `authors`, `date`, `url` and `abstract`. Responses tend to come
//! wrapped in prose or code fences, so the array is cut out between the
//! first `[` and the last `]` before decoding.

use super::Crawl;
use crate::api::{LlmContext, ask_with_backoff};
use crate::error::BoxError;
use crate::models::RawArticle;
use crate::utils::{extract_delimited, looks_truncated, truncate_for_log};
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// Asks an OpenAI-compatible model for recent journal articles.
#[derive(Debug)]
pub struct LlmCrawler {
    context: LlmContext,
    max_articles: usize,
    max_retries: usize,
}

impl LlmCrawler {
    pub fn new(context: LlmContext, max_articles: usize, max_retries: usize) -> Self {
        Self {
            context,
            max_articles,
            max_retries,
        }
    }

    fn prompt(&self) -> String {
        format!(
            "Find the {} most recent \"ASAP\" (As Soon As Publishable) research articles from the \
             Journal of Chemical Theory and Computation (pubs.acs.org). For each article give the \
             full English title, the authors, the publication date, the direct URL and the English \
             abstract. Output only a JSON array of objects with the keys \"title\", \"authors\", \
             \"date\", \"url\", \"abstract\".",
            self.max_articles
        )
    }

    async fn ask(&self, prompt: &str) -> Result<String, BoxError> {
        ask_with_backoff(&self.context.config, prompt, &self.context.template, self.max_retries).await
    }
}

/// Decode the article array embedded in a model response.
///
/// The array as a whole must be valid JSON, but its elements are decoded
/// one at a time: an element with a wrongly typed field is logged and
/// dropped while the rest of the batch survives.
///
/// # Errors
///
/// Returns the `serde_json` error when no JSON array can be read from the
/// response. A reply cut off mid-array yields an EOF error (see
/// [`looks_truncated`]).
pub fn parse_response(response: &str) -> Result<Vec<RawArticle>, serde_json::Error> {
    // fall back to the whole text so a missing ']' surfaces as an EOF error
    let json = extract_delimited(response, '[', ']').unwrap_or(response);
    let elements: Vec<serde_json::Value> = serde_json::from_str(json)?;

    let total = elements.len();
    let articles: Vec<RawArticle> = elements
        .into_iter()
        .filter_map(|element| match serde_json::from_value::<RawArticle>(element) {
            Ok(article) => Some(article),
            Err(e) => {
                warn!(error = %e, "Skipping malformed article candidate");
                None
            }
        })
        .collect();
    if articles.len() < total {
        debug!(total, kept = articles.len(), "Dropped malformed candidates");
    }
    Ok(articles)
}

/// Parse a reply, asking once more when it was cut off mid-array.
///
/// Returns the reply that was parsed last together with the outcome, so
/// failures can be reported against the text that actually failed.
async fn parse_or_reask<F, Fut>(
    response: String,
    reask: F,
) -> Result<(String, Result<Vec<RawArticle>, serde_json::Error>), BoxError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, BoxError>>,
{
    match parse_response(&response) {
        Err(e) if looks_truncated(&e) => {
            warn!(error = %e, "EOF while parsing crawl response; re-asking once");
            let retry = reask().await?;
            let parsed = parse_response(&retry);
            Ok((retry, parsed))
        }
        parsed => Ok((response, parsed)),
    }
}

impl Crawl for LlmCrawler {
    #[instrument(level = "info", skip_all, fields(max_articles = self.max_articles))]
    async fn crawl(&self) -> Result<Vec<RawArticle>, BoxError> {
        let prompt = self.prompt();
        let first = self.ask(&prompt).await?;
        let (response, parsed) = parse_or_reask(first, || self.ask(&prompt)).await?;

        match parsed {
            Ok(mut articles) => {
                articles.truncate(self.max_articles);
                info!(count = articles.len(), "Model returned article candidates");
                Ok(articles)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&response, 300),
                    "Model did not return a JSON article array"
                );
                Err(format!("crawl response was not a JSON article array: {e}").into())
            }
        }
    }
}
