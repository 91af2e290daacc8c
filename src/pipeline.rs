//! The refresh pipeline: load cache, crawl, reconcile, enrich, merge, persist.
//!
//! One call to [`RefreshPipeline::refresh`] runs a full cycle:
//!
//! 1. **Load** the cached collection and index it by id
//! 2. **Crawl** for fresh candidates (on failure, fall back to the cache)
//! 3. **Reconcile** each usable candidate: known ids keep their cached record
//!    verbatim, unknown ids become new records queued for enrichment
//! 4. **Enrich** the new records concurrently; a failure only affects the
//!    record it happened on
//! 5. **Merge** in cached records the crawl did not mention, so history is
//!    never lost
//! 6. **Sort** by `first_seen`, newest first
//! 7. **Persist** (best-effort) and return the merged collection
//!
//! Only a crawl failure with nothing cached to fall back on is reported as
//! an error. Every other failure degrades to a smaller or older result.

use crate::crawlers::Crawl;
use crate::enrichers::Enrich;
use crate::error::{BoxError, RefreshError};
use crate::models::{Article, RawArticle};
use crate::store::{ArticleStore, KeyValueStore};
use crate::utils::now_millis;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Coarse progress of a refresh cycle, reported in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    LoadingCache,
    Crawling,
    /// Only reported when at least one new article was found.
    Enriching { count: usize },
    Complete { total: usize },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::LoadingCache => write!(f, "Loading cached data..."),
            Stage::Crawling => write!(f, "Crawling JCTC for new articles..."),
            Stage::Enriching { count } => write!(f, "Enriching {count} new articles via external AI..."),
            Stage::Complete { total } => write!(f, "Done: {total} articles"),
        }
    }
}

/// Observer for [`Stage`] updates. Fire-and-forget; closures qualify.
pub trait Progress {
    fn on_stage(&self, stage: &Stage);
}

impl<F: Fn(&Stage)> Progress for F {
    fn on_stage(&self, stage: &Stage) {
        self(stage)
    }
}

/// Progress observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Progress for Silent {
    fn on_stage(&self, _stage: &Stage) {}
}

/// Tuning knobs for a refresh cycle.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum enrichment calls in flight at once.
    pub concurrency: usize,
    pub crawl_timeout: Option<Duration>,
    /// Applied to each enrichment call separately.
    pub enrich_timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 12,
            crawl_timeout: Some(Duration::from_secs(120)),
            enrich_timeout: Some(Duration::from_secs(60)),
        }
    }
}

async fn within<T>(
    limit: Option<Duration>,
    what: &str,
    fut: impl Future<Output = Result<T, BoxError>>,
) -> Result<T, BoxError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| format!("{what} timed out after {limit:?}"))?,
        None => fut.await,
    }
}

/// Orchestrates crawler, enricher and article cache.
pub struct RefreshPipeline<C, E, S> {
    crawler: C,
    enricher: E,
    store: ArticleStore<S>,
    options: PipelineOptions,
    clock: fn() -> i64,
    in_flight: Mutex<()>,
}

impl<C, E, S> fmt::Debug for RefreshPipeline<C, E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshPipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C, E, S> RefreshPipeline<C, E, S>
where
    C: Crawl,
    E: Enrich,
    S: KeyValueStore,
{
    pub fn new(crawler: C, enricher: E, store: ArticleStore<S>) -> Self {
        Self {
            crawler,
            enricher,
            store,
            options: PipelineOptions::default(),
            clock: now_millis,
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_options(mut self, mut options: PipelineOptions) -> Self {
        options.concurrency = options.concurrency.max(1);
        self.options = options;
        self
    }

    /// Replace the epoch-millisecond clock used for discovery timestamps.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &ArticleStore<S> {
        &self.store
    }

    /// Run one refresh cycle and return the merged collection, newest first.
    ///
    /// # Errors
    ///
    /// - [`RefreshError::Crawl`] when the crawl fails and the cache is empty
    /// - [`RefreshError::AlreadyRunning`] when another cycle holds the guard
    #[instrument(level = "info", skip_all)]
    pub async fn refresh(&self, progress: &impl Progress) -> Result<Vec<Article>, RefreshError> {
        let _guard = self.in_flight.try_lock().map_err(|_| RefreshError::AlreadyRunning)?;
        let started = Instant::now();

        progress.on_stage(&Stage::LoadingCache);
        let cached = self.store.load().await;
        info!(cached = cached.len(), "Loaded cache");

        progress.on_stage(&Stage::Crawling);
        let candidates = match within(self.options.crawl_timeout, "crawl", self.crawler.crawl()).await {
            Ok(candidates) => candidates,
            Err(e) if cached.is_empty() => {
                error!(error = %e, "Crawl failed with nothing cached");
                return Err(RefreshError::Crawl(e));
            }
            Err(e) => {
                warn!(error = %e, cached = cached.len(), "Crawl failed; returning cached articles");
                progress.on_stage(&Stage::Complete { total: cached.len() });
                return Ok(cached);
            }
        };
        if candidates.is_empty() {
            info!("Crawl returned no candidates; treating as a cycle without new articles");
        }

        // new records always sort ahead of everything already cached
        let now = cached
            .iter()
            .map(|a| a.first_seen.saturating_add(1))
            .fold((self.clock)(), i64::max);

        let cached_by_id: HashMap<&str, &Article> = cached.iter().map(|a| (a.id.as_str(), a)).collect();
        let (kept, discovered) = reconcile(candidates, &cached_by_id, now);
        info!(kept = kept.len(), new = discovered.len(), "Reconciled crawl against cache");

        let enriched = if discovered.is_empty() {
            Vec::new()
        } else {
            progress.on_stage(&Stage::Enriching {
                count: discovered.len(),
            });
            self.enrich_all(discovered).await
        };

        let retained: Vec<Article> = {
            let seen: HashSet<&str> = kept.iter().chain(&enriched).map(|a| a.id.as_str()).collect();
            cached
                .iter()
                .filter(|a| !seen.contains(a.id.as_str()))
                .map(|a| Article {
                    is_new: false,
                    ..a.clone()
                })
                .collect()
        };
        debug!(retained = retained.len(), "Carried over articles missing from this crawl");

        let mut merged: Vec<Article> = kept.into_iter().chain(enriched).chain(retained).collect();
        merged.sort_by(|a, b| b.first_seen.cmp(&a.first_seen));

        self.store.save(&merged).await;

        let elapsed = started.elapsed();
        info!(total = merged.len(), elapsed_ms = elapsed.as_millis(), "Refresh complete");
        progress.on_stage(&Stage::Complete { total: merged.len() });
        Ok(merged)
    }

    /// Enrich new records concurrently, keeping their input order.
    async fn enrich_all(&self, discovered: Vec<Article>) -> Vec<Article> {
        let total = discovered.len();
        let enriched: Vec<Article> = stream::iter(discovered)
            .map(|article| self.enrich_one(article))
            .buffered(self.options.concurrency)
            .collect()
            .await;

        let succeeded = enriched.iter().filter(|a| a.is_enriched()).count();
        info!(total, succeeded, failed = total - succeeded, "Enrichment finished");
        enriched
    }

    /// Enrich a single record. Never fails: errors are logged and recorded
    /// on the returned article.
    async fn enrich_one(&self, article: Article) -> Article {
        if article.is_enriched() {
            return article;
        }
        match within(self.options.enrich_timeout, "enrichment", self.enricher.enrich(&article)).await {
            Ok(mut enriched) => {
                if enriched.is_enriched() {
                    enriched.last_updated = (self.clock)().max(article.last_updated);
                }
                // identity and discovery metadata belong to the pipeline
                enriched.id = article.id;
                enriched.first_seen = article.first_seen;
                enriched.is_new = article.is_new;
                enriched
            }
            Err(e) => {
                warn!(id = %article.id, title = %article.title, error = %e, "Failed to enrich article");
                let mut article = article;
                article.mark_failed(e.to_string());
                article
            }
        }
    }

    /// Re-run enrichment for one cached article and persist the outcome.
    ///
    /// An already enriched article is returned as-is without calling the
    /// enricher. A failed attempt is recorded on the article, which is still
    /// returned.
    #[instrument(level = "info", skip(self))]
    pub async fn retry_enrichment(&self, id: &str) -> Result<Article, RefreshError> {
        let _guard = self.in_flight.try_lock().map_err(|_| RefreshError::AlreadyRunning)?;

        let mut articles = self.store.load().await;
        let slot = articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| RefreshError::NotFound(id.to_string()))?;

        if slot.is_enriched() {
            debug!("Article already enriched");
            return Ok(slot.clone());
        }

        *slot = self.enrich_one(slot.clone()).await;
        let updated = slot.clone();
        self.store.save(&articles).await;
        Ok(updated)
    }
}

/// Split usable candidates into cached records to keep and new records to
/// enrich, both in crawl order. Repeated ids keep their first occurrence.
fn reconcile(
    candidates: Vec<RawArticle>,
    cached_by_id: &HashMap<&str, &Article>,
    now: i64,
) -> (Vec<Article>, Vec<Article>) {
    let total = candidates.len();
    let usable: Vec<RawArticle> = candidates
        .into_iter()
        .filter(RawArticle::is_usable)
        .unique_by(RawArticle::identity)
        .collect();
    if usable.len() < total {
        debug!(dropped = total - usable.len(), "Dropped unusable or duplicate candidates");
    }

    let mut kept = Vec::new();
    let mut discovered = Vec::new();
    for raw in usable {
        match cached_by_id.get(raw.identity().as_str()) {
            Some(existing) => kept.push(Article {
                is_new: false,
                ..(*existing).clone()
            }),
            None => discovered.push(Article::discovered(raw, now)),
        }
    }
    (kept, discovered)
}
