//! Enrichment through a dedicated translation/summary HTTP service.
//!
//! The service receives the article's `title`, `url`, `abstract`,
//! `authors` and `date` as a JSON POST body and answers with
//! `{"summary_cn": ..., "title_cn": ..., "abstract_cn": ...}` where only
//! `summary_cn` is required.

use super::{Enrich, EnrichmentRequest, with_translation};
use crate::error::BoxError;
use crate::models::{Article, Translation};
use tracing::{debug, instrument};
use url::Url;

/// Default endpoint of the external summary service.
pub const DEFAULT_ENDPOINT: &str = "https://api.my-custom-ai-host.com/v1/jctc-summary";

#[derive(Debug, Clone)]
pub struct HttpEnricher {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpEnricher {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, BoxError> {
        let endpoint = Url::parse(endpoint).map_err(|e| format!("invalid enrichment endpoint {endpoint}: {e}"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        })
    }
}

impl Enrich for HttpEnricher {
    #[instrument(level = "info", skip_all, fields(id = %article.id))]
    async fn enrich(&self, article: &Article) -> Result<Article, BoxError> {
        if article.is_enriched() {
            debug!("Already enriched; skipping external call");
            return Ok(article.clone());
        }

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&EnrichmentRequest::from(article));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("enrichment service returned {status}").into());
        }

        let translation: Translation = response.json().await?;
        debug!(summary_chars = translation.summary_cn.chars().count(), "Enriched article");
        Ok(with_translation(article, translation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawArticle;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article() -> Article {
        Article::discovered(
            RawArticle {
                title: Some("Coupled Cluster at Scale".into()),
                url: Some("https://pubs.acs.org/doi/b".into()),
                abstract_text: Some("We scale CCSD(T).".into()),
                date: Some("2025-05-06".into()),
                ..Default::default()
            },
            100,
        )
    }

    #[tokio::test]
    async fn test_enrich_posts_article_and_applies_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/jctc-summary"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "title": "Coupled Cluster at Scale",
                "url": "https://pubs.acs.org/doi/b",
                "abstract": "We scale CCSD(T).",
                "date": "2025-05-06"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "summary_cn": "大规模耦合簇计算。",
                "title_cn": "大规模耦合簇"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let enricher =
            HttpEnricher::new(&format!("{}/v1/jctc-summary", server.uri()), Some("secret".into())).unwrap();
        let enriched = enricher.enrich(&article()).await.unwrap();

        let t = enriched.translation().unwrap();
        assert_eq!(t.summary_cn, "大规模耦合簇计算。");
        assert_eq!(t.title_cn.as_deref(), Some("大规模耦合簇"));
        assert_eq!(t.abstract_cn, None);
        assert_eq!(enriched.id, "https://pubs.acs.org/doi/b");
    }

    #[tokio::test]
    async fn test_enrich_fails_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let enricher = HttpEnricher::new(&format!("{}/v1/jctc-summary", server.uri()), None).unwrap();
        let err = enricher.enrich(&article()).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_enrich_fails_without_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "title_cn": "只有标题" })))
            .mount(&server)
            .await;

        let enricher = HttpEnricher::new(&format!("{}/v1/jctc-summary", server.uri()), None).unwrap();
        assert!(enricher.enrich(&article()).await.is_err());
    }

    #[tokio::test]
    async fn test_already_enriched_article_skips_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut done = article();
        done.apply_translation(
            Translation {
                summary_cn: "已有".into(),
                ..Default::default()
            },
            200,
        );
        let enricher = HttpEnricher::new(&format!("{}/v1/jctc-summary", server.uri()), None).unwrap();
        assert_eq!(enricher.enrich(&done).await.unwrap(), done);
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(HttpEnricher::new("not a url", None).is_err());
    }
}
