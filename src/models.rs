//! Data models for tracked articles and crawl candidates.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawArticle`]: A best-effort candidate as returned by a crawler
//! - [`Article`]: A cached record with identity, discovery timestamps and
//!   enrichment state
//! - [`Enrichment`] / [`Translation`]: The tri-state enrichment outcome
//!
//! On disk an [`Article`] keeps the flat shape used by the cache file
//! (`title_cn`, `abstract_cn` and `summary_cn` are simply absent until an
//! enrichment succeeds). The conversion goes through [`StoredArticle`].

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Identity used when a record carries neither an id, a url nor a title.
pub const UNKNOWN_ID: &str = "unknown";

/// Derive the stable identity of an article.
///
/// The first non-blank value among `id`, `url` and `title` wins; if all
/// three are blank the sentinel [`UNKNOWN_ID`] is returned. The result is
/// the deduplication key, so it must not change between refresh cycles.
///
/// # Arguments
///
/// * `id` - An explicit id, as carried by stored records
/// * `url` - The article URL (the usual identity)
/// * `title` - Last resort when neither of the above is present
///
/// # Examples
///
/// ```ignore
/// assert_eq!(derive_id(None, Some("https://x/y"), Some("T")), "https://x/y");
/// assert_eq!(derive_id(None, Some("  "), Some("T")), "T");
/// assert_eq!(derive_id(None, None, None), UNKNOWN_ID);
/// ```
pub fn derive_id(id: Option<&str>, url: Option<&str>, title: Option<&str>) -> String {
    [id, url, title]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_ID)
        .to_string()
}

/// A candidate article as returned by a crawler.
///
/// Every field is optional because crawlers are best-effort: an LLM may
/// omit keys, a feed item may lack a description. Candidates without a
/// title or a url are discarded by the pipeline (see [`RawArticle::is_usable`]).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawArticle {
    #[serde(default)]
    pub title: Option<String>,
    /// Author list, accepted either as one string or as a list of names.
    #[serde(default, deserialize_with = "string_or_list")]
    pub authors: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
}

impl RawArticle {
    /// Whether the candidate carries both a non-blank title and url.
    pub fn is_usable(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.title) && present(&self.url)
    }

    /// The identity this candidate would receive as an [`Article`].
    pub fn identity(&self) -> String {
        derive_id(None, self.url.as_deref(), self.title.as_deref())
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Authors {
        One(String),
        Many(Vec<String>),
    }

    let authors = match Option::<Authors>::deserialize(deserializer)? {
        Some(Authors::One(s)) => Some(s),
        Some(Authors::Many(names)) => Some(names.join(", ")),
        None => None,
    };
    Ok(authors.filter(|s| !s.trim().is_empty()))
}

/// Chinese translation and summary produced by an enricher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Translation {
    #[serde(default)]
    pub title_cn: Option<String>,
    #[serde(default)]
    pub abstract_cn: Option<String>,
    pub summary_cn: String,
}

/// Enrichment state of a cached article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Enrichment {
    /// Not attempted yet.
    #[default]
    Pending,
    /// Translation and summary are available.
    Enriched(Translation),
    /// The last attempt failed; the article is still displayable.
    Failed { reason: String },
}

/// A tracked article as held in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "StoredArticle", into = "StoredArticle")]
pub struct Article {
    /// Deduplication key, stable across refresh cycles.
    pub id: String,
    pub title: String,
    pub authors: Option<String>,
    /// Publication date as reported by the source, not parsed.
    pub date: String,
    pub url: String,
    /// English abstract.
    pub abstract_text: Option<String>,
    pub enrichment: Enrichment,
    /// Epoch milliseconds of first discovery. Never overwritten.
    pub first_seen: i64,
    /// Epoch milliseconds of the last successful enrichment (or discovery).
    pub last_updated: i64,
    /// Discovered during the most recent refresh cycle.
    pub is_new: bool,
}

impl Article {
    /// Build a freshly discovered record from a crawl candidate.
    pub fn discovered(raw: RawArticle, now: i64) -> Self {
        let id = raw.identity();
        let date = raw
            .date
            .filter(|d| !d.trim().is_empty())
            .or_else(|| DateTime::from_timestamp_millis(now).map(|dt| dt.to_rfc3339()))
            .unwrap_or_default();

        Self {
            id,
            title: raw.title.unwrap_or_default(),
            authors: raw.authors,
            date,
            url: raw.url.unwrap_or_default(),
            abstract_text: raw.abstract_text,
            enrichment: Enrichment::Pending,
            first_seen: now,
            last_updated: now,
            is_new: true,
        }
    }

    pub fn is_enriched(&self) -> bool {
        matches!(self.enrichment, Enrichment::Enriched(_))
    }

    pub fn translation(&self) -> Option<&Translation> {
        match &self.enrichment {
            Enrichment::Enriched(t) => Some(t),
            _ => None,
        }
    }

    /// Record a successful enrichment.
    ///
    /// Missing `title_cn`/`abstract_cn` fall back to whatever the record
    /// already had.
    pub fn apply_translation(&mut self, mut translation: Translation, now: i64) {
        if let Some(prev) = self.translation() {
            translation.title_cn = translation.title_cn.or_else(|| prev.title_cn.clone());
            translation.abstract_cn = translation.abstract_cn.or_else(|| prev.abstract_cn.clone());
        }
        self.enrichment = Enrichment::Enriched(translation);
        self.last_updated = now;
    }

    /// Record a failed enrichment attempt. A record that is already enriched
    /// keeps its translation.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        if !self.is_enriched() {
            self.enrichment = Enrichment::Failed {
                reason: reason.into(),
            };
        }
    }
}

/// The flat, persisted shape of an [`Article`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoredArticle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_cn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_cn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_cn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_error: Option<String>,
    #[serde(default)]
    pub first_seen: i64,
    #[serde(default)]
    pub last_updated: i64,
    #[serde(default)]
    pub is_new: bool,
}

impl From<StoredArticle> for Article {
    fn from(s: StoredArticle) -> Self {
        let id = derive_id(s.id.as_deref(), Some(&s.url), Some(&s.title));
        let enrichment = match (s.summary_cn, s.enrichment_error) {
            (Some(summary_cn), _) => Enrichment::Enriched(Translation {
                title_cn: s.title_cn,
                abstract_cn: s.abstract_cn,
                summary_cn,
            }),
            (None, Some(reason)) => Enrichment::Failed { reason },
            (None, None) => Enrichment::Pending,
        };

        Self {
            id,
            title: s.title,
            authors: s.authors,
            date: s.date,
            url: s.url,
            abstract_text: s.abstract_text,
            enrichment,
            first_seen: s.first_seen,
            last_updated: s.last_updated,
            is_new: s.is_new,
        }
    }
}

impl From<Article> for StoredArticle {
    fn from(a: Article) -> Self {
        let (title_cn, abstract_cn, summary_cn, enrichment_error) = match a.enrichment {
            Enrichment::Pending => (None, None, None, None),
            Enrichment::Enriched(t) => (t.title_cn, t.abstract_cn, Some(t.summary_cn), None),
            Enrichment::Failed { reason } => (None, None, None, Some(reason)),
        };

        Self {
            id: Some(a.id),
            title: a.title,
            title_cn,
            authors: a.authors,
            date: a.date,
            url: a.url,
            abstract_text: a.abstract_text,
            abstract_cn,
            summary_cn,
            enrichment_error,
            first_seen: a.first_seen,
            last_updated: a.last_updated,
            is_new: a.is_new,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, url: &str) -> RawArticle {
        RawArticle {
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_id_prefers_url_then_title() {
        assert_eq!(derive_id(None, Some("https://x/y"), Some("T")), "https://x/y");
        assert_eq!(derive_id(None, Some("  "), Some("Title")), "Title");
        assert_eq!(derive_id(None, None, None), UNKNOWN_ID);
        assert_eq!(derive_id(Some("doi:1"), Some("https://x/y"), None), "doi:1");
    }

    #[test]
    fn test_stored_record_without_id_uses_url() {
        let json = r#"{"title": "T", "url": "https://x/y", "date": "2025", "first_seen": 1, "last_updated": 1}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.id, "https://x/y");
        assert_eq!(article.enrichment, Enrichment::Pending);
    }

    #[test]
    fn test_stored_record_without_id_or_url_uses_title() {
        let json = r#"{"title": "Only a title", "date": "", "first_seen": 1, "last_updated": 1}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.id, "Only a title");
    }

    #[test]
    fn test_stored_shape_is_flat() {
        let mut article = Article::discovered(raw("T", "https://x/y"), 10);
        article.apply_translation(
            Translation {
                title_cn: Some("标题".into()),
                abstract_cn: None,
                summary_cn: "总结".into(),
            },
            20,
        );

        let value = serde_json::to_value(&article).unwrap();
        assert_eq!(value["id"], "https://x/y");
        assert_eq!(value["title_cn"], "标题");
        assert_eq!(value["summary_cn"], "总结");
        assert!(value.get("abstract_cn").is_none());
        assert!(value.get("enrichment_error").is_none());
        assert_eq!(value["first_seen"], 10);
        assert_eq!(value["last_updated"], 20);
        assert_eq!(value["is_new"], true);

        let back: Article = serde_json::from_value(value).unwrap();
        assert_eq!(back, article);
    }

    #[test]
    fn test_failed_state_survives_persistence() {
        let mut article = Article::discovered(raw("T", "https://x/y"), 10);
        article.mark_failed("timed out");
        let json = serde_json::to_string(&article).unwrap();
        let back: Article = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.enrichment,
            Enrichment::Failed {
                reason: "timed out".into()
            }
        );
    }

    #[test]
    fn test_mark_failed_keeps_existing_translation() {
        let mut article = Article::discovered(raw("T", "https://x/y"), 10);
        article.apply_translation(
            Translation {
                summary_cn: "总结".into(),
                ..Default::default()
            },
            11,
        );
        article.mark_failed("boom");
        assert!(article.is_enriched());
    }

    #[test]
    fn test_apply_translation_keeps_previous_optional_fields() {
        let mut article = Article::discovered(raw("T", "https://x/y"), 10);
        article.apply_translation(
            Translation {
                title_cn: Some("旧标题".into()),
                abstract_cn: Some("旧摘要".into()),
                summary_cn: "旧".into(),
            },
            11,
        );
        article.apply_translation(
            Translation {
                summary_cn: "新".into(),
                ..Default::default()
            },
            12,
        );
        let t = article.translation().unwrap();
        assert_eq!(t.title_cn.as_deref(), Some("旧标题"));
        assert_eq!(t.abstract_cn.as_deref(), Some("旧摘要"));
        assert_eq!(t.summary_cn, "新");
        assert_eq!(article.last_updated, 12);
    }

    #[test]
    fn test_discovered_defaults_missing_date_to_now() {
        let article = Article::discovered(raw("T", "https://x/y"), 0);
        assert!(article.date.starts_with("1970-01-01T00:00:00"));
        assert_eq!(article.first_seen, 0);
        assert!(article.is_new);
    }

    #[test]
    fn test_raw_article_usability() {
        assert!(raw("T", "https://x/y").is_usable());
        assert!(!raw("T", " ").is_usable());
        assert!(!RawArticle {
            url: Some("https://x/y".into()),
            ..Default::default()
        }
        .is_usable());
    }

    #[test]
    fn test_raw_article_authors_accepts_list_or_string() {
        let list: RawArticle =
            serde_json::from_str(r#"{"title": "T", "url": "u", "authors": ["A. One", "B. Two"]}"#).unwrap();
        assert_eq!(list.authors.as_deref(), Some("A. One, B. Two"));

        let one: RawArticle =
            serde_json::from_str(r#"{"title": "T", "url": "u", "authors": "A. One"}"#).unwrap();
        assert_eq!(one.authors.as_deref(), Some("A. One"));

        let missing: RawArticle = serde_json::from_str(r#"{"title": "T"}"#).unwrap();
        assert_eq!(missing.authors, None);
    }
}
