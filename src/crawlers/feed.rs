//! Crawler for the journal's "ASAP" RSS feed.
//!
//! ACS publishes an RSS 2.0 feed of articles that are online ahead of
//! print. Each `<item>` maps onto a [`RawArticle`]: `title`, `link`,
//! `pubDate`, `dc:creator` and `description` (with its markup stripped,
//! used as the abstract).

use super::Crawl;
use crate::error::BoxError;
use crate::models::RawArticle;
use crate::utils::strip_html;
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// ASAP feed of the Journal of Chemical Theory and Computation.
pub const JCTC_ASAP_FEED: &str = "https://pubs.acs.org/action/showFeed?type=axatoc&feed=rss&jc=jctcce";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:creator", alias = "creator")]
    creator: Option<String>,
}

impl From<FeedItem> for RawArticle {
    fn from(item: FeedItem) -> Self {
        let clean = |s: String| Some(strip_html(&s)).filter(|s| !s.is_empty());
        RawArticle {
            title: item.title.and_then(clean),
            authors: item.creator.and_then(clean),
            date: item.pub_date.map(|d| d.trim().to_string()),
            url: item.link.map(|l| l.trim().to_string()),
            abstract_text: item.description.and_then(clean),
        }
    }
}

/// Decode an RSS document into at most `limit` candidates, in feed order.
pub fn parse_feed(xml: &str, limit: usize) -> Result<Vec<RawArticle>, BoxError> {
    let rss: Rss = quick_xml::de::from_str(xml).map_err(|e| format!("failed to decode feed: {e}"))?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .take(limit)
        .map(RawArticle::from)
        .collect())
}

/// Fetches and decodes an RSS feed.
#[derive(Debug, Clone)]
pub struct FeedCrawler {
    client: reqwest::Client,
    feed_url: String,
    max_articles: usize,
}

impl FeedCrawler {
    pub fn new(feed_url: impl Into<String>, max_articles: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            feed_url: feed_url.into(),
            max_articles,
        }
    }
}

impl Crawl for FeedCrawler {
    #[instrument(level = "info", skip_all, fields(feed_url = %self.feed_url))]
    async fn crawl(&self) -> Result<Vec<RawArticle>, BoxError> {
        let body = self
            .client
            .get(&self.feed_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(bytes = body.len(), "Fetched feed");

        let articles = parse_feed(&body, self.max_articles)?;
        info!(count = articles.len(), "Indexed feed articles");
        Ok(articles)
    }
}
