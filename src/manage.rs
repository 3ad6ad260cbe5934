//! Source management commands: `list`, `show`, `delete`, `clear`.
//!
//! These are the only commands that touch the metadata store and the
//! vector index together outside of ingestion. `delete` cascades: the
//! metadata row and the source's index entries go in the same command,
//! so neither store can end up naming a source the other has dropped.

use anyhow::{bail, Result};

use crate::context::AppContext;
use crate::index::VectorIndex;
use crate::store;

/// List ingested sources with their index footprint.
pub async fn run_list(ctx: &AppContext) -> Result<()> {
    let records = store::list(&ctx.pool).await?;
    if records.is_empty() {
        println!("No sources ingested yet.");
        return Ok(());
    }

    let index = VectorIndex::load(&ctx.config.storage.index_dir)?;

    println!(
        "  {:>4}  {:<40} {:>8}   {}",
        "ID", "SOURCE", "CHUNKS", "INGESTED"
    );
    println!("  {}", "-".repeat(72));

    for record in &records {
        let chunks = index
            .as_ref()
            .map(|i| i.source_chunk_count(&record.file_name))
            .unwrap_or(0);
        println!(
            "  {:>4}  {:<40} {:>8}   {}",
            record.id,
            record.file_name,
            chunks,
            format_ts(record.upload_time)
        );
    }

    println!();
    println!("  {} source(s)", records.len());

    Ok(())
}

/// Print one source's stored text snapshot and its index footprint.
pub async fn run_show(ctx: &AppContext, source: &str) -> Result<()> {
    let record = match store::get(&ctx.pool, source).await? {
        Some(record) => record,
        None => bail!("source not found: {}", source),
    };
    let content = store::get_content(&ctx.pool, source)
        .await?
        .unwrap_or_default();

    let index = VectorIndex::load(&ctx.config.storage.index_dir)?;
    let chunks = index
        .as_ref()
        .map(|i| i.source_chunk_count(source))
        .unwrap_or(0);

    println!("--- Source ---");
    println!("id:        {}", record.id);
    println!("source:    {}", record.file_name);
    println!("ingested:  {}", format_ts(record.upload_time));
    println!("chunks:    {}", chunks);
    println!();
    println!("--- Content ---");
    println!("{}", content);

    Ok(())
}

/// Remove a source everywhere: the metadata row and its index entries.
///
/// Deleting a source that was never ingested is a no-op, reported as such.
pub async fn run_delete(ctx: &AppContext, source: &str) -> Result<()> {
    let removed = store::delete(&ctx.pool, source).await?;

    let mut removed_chunks = 0;
    if let Some(mut index) = VectorIndex::load(&ctx.config.storage.index_dir)? {
        removed_chunks = index.remove_source(source);
        if removed_chunks > 0 {
            index.persist(&ctx.config.storage.index_dir)?;
        }
    }

    println!("delete {}", source);
    println!(
        "  metadata row: {}",
        if removed { "removed" } else { "not found" }
    );
    println!("  index chunks removed: {}", removed_chunks);
    println!("ok");

    Ok(())
}

/// Delete the persisted vector index; `--all` also wipes the metadata rows.
pub async fn run_clear(ctx: &AppContext, all: bool) -> Result<()> {
    VectorIndex::clear(&ctx.config.storage.index_dir)?;
    println!("Vector index cleared.");

    if all {
        let rows = store::clear(&ctx.pool).await?;
        println!("Metadata cleared ({} row(s)).", rows);
    }

    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::hash_embed;
    use crate::index::IndexEntry;
    use tempfile::TempDir;

    async fn test_ctx(dir: &TempDir) -> AppContext {
        let mut config = Config::default();
        config.storage.db_path = dir.path().join("data/docqa.db");
        config.storage.index_dir = dir.path().join("data/index");
        AppContext::init(config).await.unwrap()
    }

    fn hash_entry(text: &str, source: &str) -> IndexEntry {
        IndexEntry {
            text: text.to_string(),
            source: source.to_string(),
            embedding: hash_embed(text, 32),
        }
    }

    async fn seed(ctx: &AppContext, sources: &[&str]) {
        let entries: Vec<IndexEntry> = sources
            .iter()
            .map(|s| hash_entry(&format!("content of {}", s), s))
            .collect();
        let index = VectorIndex::build(entries).unwrap();
        index.persist(&ctx.config.storage.index_dir).unwrap();

        for s in sources {
            store::insert(&ctx.pool, s, &format!("content of {}", s))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn delete_cascades_across_both_stores() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        seed(&ctx, &["a.txt", "b.txt"]).await;

        run_delete(&ctx, "a.txt").await.unwrap();

        assert!(!store::exists(&ctx.pool, "a.txt").await.unwrap());
        assert!(store::exists(&ctx.pool, "b.txt").await.unwrap());

        let index = VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .unwrap();
        assert_eq!(index.source_chunk_count("a.txt"), 0);
        assert_eq!(index.source_chunk_count("b.txt"), 1);
    }

    #[tokio::test]
    async fn delete_of_unknown_source_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        seed(&ctx, &["a.txt"]).await;

        run_delete(&ctx, "ghost.pdf").await.unwrap();

        assert!(store::exists(&ctx.pool, "a.txt").await.unwrap());
        let index = VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn clear_removes_index_but_keeps_metadata() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        seed(&ctx, &["a.txt"]).await;

        run_clear(&ctx, false).await.unwrap();

        assert!(VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .is_none());
        assert!(store::exists(&ctx.pool, "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn clear_all_leaves_both_stores_empty() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        seed(&ctx, &["a.txt", "b.txt"]).await;

        run_clear(&ctx, true).await.unwrap();

        assert!(VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .is_none());
        assert_eq!(store::count(&ctx.pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn show_of_unknown_source_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;

        assert!(run_show(&ctx, "ghost.pdf").await.is_err());
    }

    #[test]
    fn timestamps_render_as_utc_minutes() {
        assert_eq!(format_ts(0), "1970-01-01 00:00");
        assert_eq!(format_ts(1_700_000_000), "2023-11-14 22:13");
    }
}
