//! Enrichment by asking the model directly for a translation and summary.

use super::{Enrich, EnrichmentRequest, with_translation};
use crate::api::{LlmContext, ask_with_backoff};
use crate::error::BoxError;
use crate::models::{Article, Translation};
use crate::utils::{extract_delimited, truncate_for_log};
use tracing::{debug, instrument, warn};

/// Translates and summarizes through an OpenAI-compatible model.
#[derive(Debug)]
pub struct LlmEnricher {
    context: LlmContext,
    max_retries: usize,
}

impl LlmEnricher {
    pub fn new(context: LlmContext, max_retries: usize) -> Self {
        Self { context, max_retries }
    }
}

/// Prompt carrying the article as JSON so titles with quotes survive intact.
pub fn build_prompt(article: &Article) -> Result<String, BoxError> {
    let payload = serde_json::to_string_pretty(&EnrichmentRequest::from(article))?;
    Ok(format!(
        "Translate the following journal article metadata into Simplified Chinese.\n\
         Article:\n{payload}\n\n\
         Reply with a JSON object with the keys \"title_cn\" (the translated title), \
         \"summary_cn\" (a concise one or two sentence academic summary of the abstract) and \
         \"abstract_cn\" (a full translation of the abstract)."
    ))
}

/// Decode the JSON object embedded in a model response.
pub fn parse_response(response: &str) -> Result<Translation, serde_json::Error> {
    let json = extract_delimited(response, '{', '}').unwrap_or(response);
    serde_json::from_str(json)
}

impl Enrich for LlmEnricher {
    #[instrument(level = "info", skip_all, fields(id = %article.id))]
    async fn enrich(&self, article: &Article) -> Result<Article, BoxError> {
        if article.is_enriched() {
            debug!("Already enriched; skipping model call");
            return Ok(article.clone());
        }

        let prompt = build_prompt(article)?;
        let response =
            ask_with_backoff(&self.context.config, &prompt, &self.context.template, self.max_retries).await?;

        match parse_response(&response) {
            Ok(translation) => Ok(with_translation(article, translation)),
            Err(e) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&response, 300),
                    "Model returned non-conforming JSON"
                );
                Err(format!("enrichment response was not a translation object: {e}").into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawArticle;

    #[test]
    fn test_build_prompt_embeds_article_fields() {
        let article = Article::discovered(
            RawArticle {
                title: Some("The \"Best\" Functional".into()),
                url: Some("https://pubs.acs.org/doi/c".into()),
                abstract_text: Some("We benchmark.".into()),
                ..Default::default()
            },
            0,
        );
        let prompt = build_prompt(&article).unwrap();
        assert!(prompt.contains(r#""title": "The \"Best\" Functional""#));
        assert!(prompt.contains(r#""abstract": "We benchmark.""#));
        assert!(prompt.contains("summary_cn"));
    }

    #[test]
    fn test_parse_response_in_code_fence() {
        let response = "```json\n{\"title_cn\": \"最佳泛函\", \"summary_cn\": \"基准测试。\", \"abstract_cn\": \"我们进行基准测试。\"}\n```";
        let t = parse_response(response).unwrap();
        assert_eq!(t.title_cn.as_deref(), Some("最佳泛函"));
        assert_eq!(t.summary_cn, "基准测试。");
    }

    #[test]
    fn test_parse_response_requires_summary() {
        assert!(parse_response(r#"{"title_cn": "最佳泛函"}"#).is_err());
    }
}
