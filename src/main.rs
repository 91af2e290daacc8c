//! # JCTC Scout
//!
//! Keeps track of newly published "ASAP" articles from the Journal of
//! Chemical Theory and Computation, enriches each new article with a Chinese
//! translation and summary, and caches the merged history locally.
//!
//! ## Usage
//!
//! ```sh
//! jctc_scout refresh
//! jctc_scout list
//! ```
//!
//! ## Architecture
//!
//! Each `refresh` runs one cycle of the [`pipeline::RefreshPipeline`]:
//! 1. **Load**: Read the cached collection from local storage
//! 2. **Crawl**: Discover the latest articles (RSS feed or LLM search)
//! 3. **Reconcile**: Keep known articles as cached, queue unknown ones
//! 4. **Enrich**: Translate and summarize new articles (parallel, 12 at a time)
//! 5. **Persist**: Save the merged, newest-first collection and print it

use clap::Parser;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod crawlers;
mod enrichers;
mod error;
mod models;
mod outputs;
mod pipeline;
mod store;
mod utils;

use api::load_llm_context;
use cli::{Cli, Command};
use config::{AppConfig, CrawlerConfig, EnricherConfig};
use crawlers::{CrawlerBackend, FeedCrawler, LlmCrawler};
use enrichers::{EnricherBackend, HttpEnricher, LlmEnricher};
use error::BoxError;
use outputs::{digest, json};
use models::Article;
use pipeline::{Progress, RefreshPipeline, Silent, Stage};
use store::{ArticleStore, DEFAULT_STORAGE_KEY, FileStore, KeyValueStore, MemoryStore};

#[instrument(level = "info", skip_all)]
async fn build_crawler(config: &AppConfig) -> Result<CrawlerBackend, BoxError> {
    Ok(match &config.crawler {
        CrawlerConfig::Feed {
            feed_url,
            max_articles,
        } => CrawlerBackend::Feed(FeedCrawler::new(feed_url.clone(), *max_articles)),
        CrawlerConfig::Llm {
            template,
            max_articles,
        } => {
            let context = load_llm_context(template, config.llm_config_path.as_deref()).await?;
            CrawlerBackend::Llm(LlmCrawler::new(context, *max_articles, config.max_retries))
        }
    })
}

#[instrument(level = "info", skip_all)]
async fn build_enricher(config: &AppConfig) -> Result<EnricherBackend, BoxError> {
    Ok(match &config.enricher {
        EnricherConfig::Http { endpoint, api_key } => {
            EnricherBackend::Http(HttpEnricher::new(endpoint, api_key.clone())?)
        }
        EnricherConfig::Llm { template } => {
            let context = load_llm_context(template, config.llm_config_path.as_deref()).await?;
            EnricherBackend::Llm(LlmEnricher::new(context, config.max_retries))
        }
    })
}

async fn build_pipeline<S: KeyValueStore>(
    config: &AppConfig,
    store: ArticleStore<S>,
) -> Result<RefreshPipeline<CrawlerBackend, EnricherBackend, S>, BoxError> {
    let crawler = build_crawler(config).await?;
    let enricher = build_enricher(config).await?;
    Ok(RefreshPipeline::new(crawler, enricher, store).with_options(config.pipeline_options()))
}

async fn run_refresh<S: KeyValueStore>(
    config: &AppConfig,
    store: ArticleStore<S>,
    progress: &impl Progress,
) -> Result<Vec<Article>, BoxError> {
    let pipeline = build_pipeline(config, store).await?;
    pipeline.refresh(progress).await.map_err(|e| {
        error!(error = %e, "Refresh failed");
        e.into()
    })
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!("jctc_scout starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = AppConfig::load(args.config.as_deref()).await?;
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    info!(storage_dir = %config.storage_dir.display(), "Using article cache");

    let store = ArticleStore::with_key(FileStore::new(&config.storage_dir), config.storage_key.clone());

    match args.command {
        Command::Refresh { dry_run, quiet } => {
            let report = |stage: &Stage| info!(%stage, "Refresh progress");
            let articles = match (dry_run, quiet) {
                (false, false) => run_refresh(&config, store, &report).await?,
                (false, true) => run_refresh(&config, store, &Silent).await?,
                (true, _) => {
                    let snapshot = serde_json::to_string(&store.load().await)?;
                    let scratch = ArticleStore::new(MemoryStore::new().with_entry(DEFAULT_STORAGE_KEY, &snapshot));
                    info!("Dry run: the cache file will not be modified");
                    if quiet {
                        run_refresh(&config, scratch, &Silent).await?
                    } else {
                        run_refresh(&config, scratch, &report).await?
                    }
                }
            };
            print!("{}", digest::render(&articles));
        }
        Command::List => {
            print!("{}", digest::render(&store.stored().await));
        }
        Command::Retry { id } => {
            let pipeline = build_pipeline(&config, store).await?;
            let article = pipeline.retry_enrichment(&id).await?;
            print!("{}", digest::render(std::slice::from_ref(&article)));
        }
        Command::Export { output } => {
            let articles = store.stored().await;
            json::write_articles(&articles, &output).await?;
            info!(path = %output.display(), count = articles.len(), "Exported articles");
        }
        Command::Clear => {
            store.clear().await;
        }
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, "Execution complete");
    Ok(())
}
