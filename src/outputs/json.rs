//! JSON export of the article collection.
//!
//! The export uses the same flat record shape as the cache file, pretty
//! printed, so it can be fed to other tools or re-imported by hand.

use crate::error::BoxError;
use crate::models::Article;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `articles` to `path`, creating parent directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = articles.len()))]
pub async fn write_articles(articles: &[Article], path: &Path) -> Result<(), BoxError> {
    let json = serde_json::to_string_pretty(articles)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create export dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote JSON export");
    Ok(())
}
