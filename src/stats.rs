//! Corpus statistics.
//!
//! `docqa stats` summarizes both durable stores: how many sources the
//! metadata database holds, how much raw text they carry, and what the
//! persisted vector index looks like on disk. A quick way to confirm
//! that ingestion actually wrote what it reported.

use anyhow::Result;

use crate::context::AppContext;
use crate::index::{VectorIndex, INDEX_FILE};
use crate::store;

/// Run the stats command: query both stores and print a summary.
pub async fn run_stats(ctx: &AppContext) -> Result<()> {
    let sources = store::count(&ctx.pool).await?;
    let content_bytes = store::content_bytes(&ctx.pool).await?;

    let db_size = std::fs::metadata(&ctx.config.storage.db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Document QA — Corpus Stats");
    println!("==========================");
    println!();
    println!("  Database:   {}", ctx.config.storage.db_path.display());
    println!("  Size:       {}", format_bytes(db_size));
    println!("  Sources:    {}", sources);
    println!("  Content:    {}", format_bytes(content_bytes.max(0) as u64));
    println!();

    match VectorIndex::load(&ctx.config.storage.index_dir)? {
        Some(index) => {
            let index_file = ctx.config.storage.index_dir.join(INDEX_FILE);
            let index_size = std::fs::metadata(&index_file)
                .map(|m| m.len())
                .unwrap_or(0);

            println!("  Index:      {}", index_file.display());
            println!("  Size:       {}", format_bytes(index_size));
            println!("  Chunks:     {}", index.len());
            println!("  Dimensions: {}", index.dims());
        }
        None => {
            println!("  Index:      absent");
        }
    }

    println!();

    Ok(())
}

/// Render a byte count with a binary-unit suffix.
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * KIB;
    const GIB: u64 = KIB * MIB;
    match bytes {
        b if b < KIB => format!("{} B", b),
        b if b < MIB => format!("{:.1} KB", b as f64 / KIB as f64),
        b if b < GIB => format!("{:.1} MB", b as f64 / MIB as f64),
        b => format!("{:.2} GB", b as f64 / GIB as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_format_scales_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
