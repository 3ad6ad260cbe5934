//! Ingestion: from raw sources to persisted chunks.
//!
//! Coordinates the full flow per source: extraction → chunking →
//! embedding → index update → index persist → metadata insert, in that
//! order. The metadata row is written only after the index is safely on
//! disk, so a crash in between leaves at worst an orphaned index entry
//! that the next ingest of the same key replaces.
//!
//! One failing source never aborts the batch; it is reported and the
//! remaining sources proceed.

use std::path::PathBuf;

use anyhow::bail;
use walkdir::WalkDir;

use crate::chunker::chunk_source;
use crate::context::AppContext;
use crate::embedding::{create_provider, embed_texts, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::extract::{classify_path, extract_pdf, extract_plain_text, fetch_page, SourceKind};
use crate::index::{IndexEntry, VectorIndex};
use crate::progress::{IngestProgressEvent, IngestProgressReporter};
use crate::store;
use crate::store::InsertOutcome;

/// What happened to one source during ingestion.
enum IngestOutcome {
    /// Chunks written to the index; metadata recorded.
    Ingested(u64),
    /// Source key already recorded; nothing touched.
    Duplicate,
    /// Extraction produced no usable text; nothing recorded.
    Empty,
}

/// One unit of ingestable input.
enum SourceInput {
    File(PathBuf),
    Link(String),
}

impl SourceInput {
    /// The source key: file name for files, the URL itself for links.
    fn key(&self) -> String {
        match self {
            SourceInput::File(path) => match path.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => path.display().to_string(),
            },
            SourceInput::Link(url) => url.clone(),
        }
    }
}

/// Ingest files, directories, and web links into the index and store.
///
/// Prints a per-source line as each source settles, then a summary block.
/// Returns an error (after the full batch has run) when any source failed.
pub async fn run_ingest(
    ctx: &AppContext,
    paths: &[PathBuf],
    links: &[String],
    reporter: &dyn IngestProgressReporter,
) -> anyhow::Result<()> {
    let mut inputs: Vec<SourceInput> = expand_paths(paths)
        .into_iter()
        .map(SourceInput::File)
        .collect();
    inputs.extend(links.iter().cloned().map(SourceInput::Link));

    if inputs.is_empty() {
        bail!("Nothing to ingest: pass file paths, directories, or --link URLs");
    }

    let provider = create_provider(&ctx.config.embedding)?;
    let mut index = VectorIndex::load(&ctx.config.storage.index_dir)?;

    let mut ingested = 0u64;
    let mut duplicates = 0u64;
    let mut empty = 0u64;
    let mut failed = 0u64;
    let mut chunks_written = 0u64;

    println!("ingest");

    for input in &inputs {
        let key = input.key();
        match ingest_one(ctx, provider.as_ref(), &mut index, input, reporter).await {
            Ok(IngestOutcome::Ingested(chunks)) => {
                ingested += 1;
                chunks_written += chunks;
                println!("  {}: ingested ({} chunks)", key, chunks);
            }
            Ok(IngestOutcome::Duplicate) => {
                duplicates += 1;
                println!("  {}: skipped (already ingested)", key);
            }
            Ok(IngestOutcome::Empty) => {
                empty += 1;
                println!("  {}: skipped (no text content)", key);
            }
            Err(e) => {
                failed += 1;
                println!("  {}: failed ({})", key, e);
            }
        }
    }

    println!("  sources: {}", inputs.len());
    println!("  ingested: {}", ingested);
    println!("  duplicates skipped: {}", duplicates);
    println!("  empty skipped: {}", empty);
    println!("  failed: {}", failed);
    println!("  chunks written: {}", chunks_written);

    if failed > 0 {
        bail!("{} source(s) failed to ingest", failed);
    }

    println!("ok");
    Ok(())
}

/// Expand directories into the supported files beneath them.
///
/// Explicit file paths pass through untouched (so an unsupported file the
/// user named directly still gets a visible failure); directory walks keep
/// only supported extensions and sort for a stable order.
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.path().to_path_buf())
                .filter(|p| classify_path(p).is_ok())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    files
}

async fn ingest_one(
    ctx: &AppContext,
    provider: &dyn EmbeddingProvider,
    index: &mut Option<VectorIndex>,
    input: &SourceInput,
    reporter: &dyn IngestProgressReporter,
) -> Result<IngestOutcome> {
    let key = input.key();

    if store::exists(&ctx.pool, &key).await? {
        return Ok(IngestOutcome::Duplicate);
    }

    reporter.report(IngestProgressEvent::Extracting { source: key.clone() });

    let text = match input {
        SourceInput::File(path) => {
            let kind = classify_path(path)?;
            let bytes = std::fs::read(path)?;
            match kind {
                SourceKind::Pdf => extract_pdf(&bytes)?,
                SourceKind::PlainText => extract_plain_text(&key, &bytes)?,
                SourceKind::WebPage => return Err(Error::UnsupportedFormat(key)),
            }
        }
        SourceInput::Link(url) => fetch_page(&ctx.http, url).await?,
    };

    if text.trim().is_empty() {
        return Ok(IngestOutcome::Empty);
    }

    let chunks = chunk_source(&text, &key, &ctx.config.chunking);
    if chunks.is_empty() {
        return Ok(IngestOutcome::Empty);
    }

    let total = chunks.len() as u64;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());

    for batch in texts.chunks(ctx.config.embedding.batch_size) {
        let embedded = embed_texts(&ctx.http, provider, &ctx.config.embedding, batch).await?;
        vectors.extend(embedded);
        reporter.report(IngestProgressEvent::Embedding {
            source: key.clone(),
            n: vectors.len() as u64,
            total,
        });
    }

    let entries: Vec<IndexEntry> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, embedding)| IndexEntry {
            text: chunk.text,
            source: chunk.source,
            embedding,
        })
        .collect();

    reporter.report(IngestProgressEvent::Indexing {
        source: key.clone(),
        chunks: total,
    });

    let index_dir = &ctx.config.storage.index_dir;
    match index.as_mut() {
        Some(idx) => {
            // Entries under this key can survive a crash between persist
            // and record; replace them rather than stack duplicates.
            idx.remove_source(&key);
            let prior_len = idx.len();
            idx.add(entries)?;
            if let Err(e) = idx.persist(index_dir) {
                // Disk still holds the previous snapshot; drop the
                // in-memory additions so the two stay in step.
                idx.truncate(prior_len);
                return Err(e);
            }
        }
        None => {
            let built = VectorIndex::build(entries)?;
            built.persist(index_dir)?;
            *index = Some(built);
        }
    }

    match store::insert(&ctx.pool, &key, &text).await? {
        InsertOutcome::Inserted => Ok(IngestOutcome::Ingested(total)),
        // Lost a race with a concurrent ingest; the index holds exactly
        // one copy of this source's chunks either way.
        InsertOutcome::AlreadyExists => Ok(IngestOutcome::Duplicate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    async fn test_ctx(dir: &TempDir) -> AppContext {
        let mut config = Config::default();
        config.storage.db_path = dir.path().join("data/docqa.db");
        config.storage.index_dir = dir.path().join("data/index");
        config.embedding.provider = "hash".to_string();
        config.embedding.dims = Some(32);
        AppContext::init(config).await.unwrap()
    }

    #[tokio::test]
    async fn ingests_a_text_file_end_to_end() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "The office shuts between Christmas and New Year.").unwrap();

        run_ingest(&ctx, &[file], &[], &NoProgress).await.unwrap();

        assert!(store::exists(&ctx.pool, "notes.txt").await.unwrap());
        let index = VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .unwrap();
        assert_eq!(index.source_chunk_count("notes.txt"), 1);
    }

    #[tokio::test]
    async fn long_text_produces_multiple_chunks() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let file = dir.path().join("handbook.txt");
        let body = "All staff must badge in at reception. ".repeat(100);
        std::fs::write(&file, &body).unwrap();

        run_ingest(&ctx, &[file], &[], &NoProgress).await.unwrap();

        let index = VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .unwrap();
        assert!(index.source_chunk_count("handbook.txt") > 1);
    }

    #[tokio::test]
    async fn second_ingest_of_same_name_is_skipped() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "Parking is on level B2.").unwrap();

        run_ingest(&ctx, &[file.clone()], &[], &NoProgress)
            .await
            .unwrap();
        let before = VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .unwrap()
            .len();

        run_ingest(&ctx, &[file], &[], &NoProgress).await.unwrap();

        assert_eq!(store::count(&ctx.pool).await.unwrap(), 1);
        let after = VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .unwrap()
            .len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn empty_file_is_not_recorded() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let file = dir.path().join("blank.txt");
        std::fs::write(&file, "   \n\n  ").unwrap();

        run_ingest(&ctx, &[file], &[], &NoProgress).await.unwrap();

        assert!(!store::exists(&ctx.pool, "blank.txt").await.unwrap());
        assert!(VectorIndex::load(&ctx.config.storage.index_dir)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unsupported_file_fails_but_batch_continues() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let good = dir.path().join("good.txt");
        let bad = dir.path().join("slides.pptx");
        std::fs::write(&good, "Expense reports are due Fridays.").unwrap();
        std::fs::write(&bad, "binary").unwrap();

        let result = run_ingest(&ctx, &[bad, good], &[], &NoProgress).await;

        assert!(result.is_err());
        assert!(store::exists(&ctx.pool, "good.txt").await.unwrap());
        assert!(!store::exists(&ctx.pool, "slides.pptx").await.unwrap());
    }

    #[test]
    fn directories_expand_to_supported_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.docx"), "b").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.md"), "c").unwrap();

        let files = expand_paths(&[dir.path().to_path_buf()]);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.txt", "c.md"]);
    }

    #[test]
    fn explicit_file_paths_pass_through_unclassified() {
        let files = expand_paths(&[PathBuf::from("report.docx")]);
        assert_eq!(files, vec![PathBuf::from("report.docx")]);
    }
}
