//! Markdown digest of the cached articles.
//!
//! Articles are listed in the order given (the pipeline hands them over
//! newest first). Articles discovered in the latest refresh are flagged
//! with **NEW**, and each entry shows the Chinese title and summary when
//! enrichment succeeded or the enrichment state otherwise.

use crate::models::{Article, Enrichment};
use std::fmt::Write;

/// Render the collection as Markdown.
pub fn render(articles: &[Article]) -> String {
    let mut md = String::new();

    if articles.is_empty() {
        md.push_str("No articles cached yet. Run `jctc_scout refresh` to scan for new ones.\n");
        return md;
    }

    let new_count = articles.iter().filter(|a| a.is_new).count();
    // writing into a String cannot fail
    let _ = writeln!(md, "# JCTC Latest Articles ({} total, {} new)\n", articles.len(), new_count);

    for (i, article) in articles.iter().enumerate() {
        let _ = write_entry(&mut md, i + 1, article);
    }
    md
}

fn write_entry(md: &mut String, n: usize, article: &Article) -> std::fmt::Result {
    let flag = if article.is_new { " **NEW**" } else { "" };
    writeln!(md, "## {n}. {}{flag}\n", article.title)?;

    if let Some(title_cn) = article.translation().and_then(|t| t.title_cn.as_deref()) {
        writeln!(md, "*{title_cn}*\n")?;
    }

    let mut meta = Vec::new();
    if let Some(authors) = article.authors.as_deref() {
        meta.push(authors);
    }
    if !article.date.is_empty() {
        meta.push(&article.date);
    }
    if !meta.is_empty() {
        writeln!(md, "{}\n", meta.join(" · "))?;
    }
    writeln!(md, "<{}>\n", article.url)?;

    match &article.enrichment {
        Enrichment::Enriched(t) => writeln!(md, "> {}\n", t.summary_cn)?,
        Enrichment::Pending => writeln!(md, "_Chinese summary pending._\n")?,
        Enrichment::Failed { reason } => writeln!(
            md,
            "_Chinese summary unavailable ({reason}); retry with `jctc_scout retry {}`._\n",
            article.id
        )?,
    }
    Ok(())
}
