//! Source classification and text extraction.
//!
//! Turns a file or URL into plain text ready for chunking. PDF output keeps
//! `[Page N]` markers in page order, and tabular line groups are additionally
//! linearized as pipe-delimited rows under `[Page N - Table K]` markers
//! appended after the page text, so chunks stay traceable to their physical
//! location in the document. Plain-text files pass through verbatim; web
//! pages are stripped of markup and boilerplate and then normalized.

use std::path::Path;

use crate::error::{Error, Result};

/// What kind of input a source key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    PlainText,
    WebPage,
}

/// File extensions accepted for ingestion.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "md"];

/// Classify a file path by extension. Pure; never touches the filesystem.
pub fn classify_path(path: &Path) -> Result<SourceKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pdf") => Ok(SourceKind::Pdf),
        Some("txt") | Some("md") => Ok(SourceKind::PlainText),
        _ => Err(Error::UnsupportedFormat(path.display().to_string())),
    }
}

// ============ PDF ============

/// Minimum consecutive table-shaped lines for a group to count as a table.
const TABLE_MIN_ROWS: usize = 2;

/// Extract a PDF into marked-up plain text.
///
/// Each non-empty page contributes a `[Page N]` section. Detected tables are
/// re-emitted after all page text as `[Page N - Table K]` sections with
/// their rows joined by `" | "`, which keeps row/column association intact
/// once the text is chunked.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let pages =
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| Error::Pdf(e.to_string()))?;

    let mut text = String::new();
    let mut tables = String::new();

    for (i, page) in pages.iter().enumerate() {
        let page_no = i + 1;
        let page_text = page.trim();
        if page_text.is_empty() {
            continue;
        }

        text.push_str(&format!("\n\n[Page {}]\n{}", page_no, page_text));

        for (k, table) in find_tables(page_text).iter().enumerate() {
            tables.push_str(&format!("\n\n[Page {} - Table {}]\n{}", page_no, k + 1, table));
        }
    }

    text.push_str(&tables);
    Ok(text.trim_start().to_string())
}

/// Detect groups of consecutive table-shaped lines and return each group as
/// newline-joined, pipe-delimited rows.
fn find_tables(page_text: &str) -> Vec<String> {
    let mut tables = Vec::new();
    let mut rows: Vec<String> = Vec::new();

    for line in page_text.lines() {
        match table_row(line) {
            Some(row) => rows.push(row),
            None => flush_table(&mut rows, &mut tables),
        }
    }
    flush_table(&mut rows, &mut tables);
    tables
}

fn flush_table(rows: &mut Vec<String>, tables: &mut Vec<String>) {
    if rows.len() >= TABLE_MIN_ROWS {
        tables.push(rows.join("\n"));
    }
    rows.clear();
}

/// Interpret a line as a table row when it splits into two or more cells.
/// Cells are separated by tabs or runs of two or more spaces, the way PDF
/// text layers render column gaps.
fn table_row(line: &str) -> Option<String> {
    let cells = split_cells(line);
    if cells.len() >= 2 {
        Some(cells.join(" | "))
    } else {
        None
    }
}

fn split_cells(line: &str) -> Vec<String> {
    line.split('\t')
        .flat_map(|part| part.split("  "))
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

// ============ Plain text ============

/// Decode a plain-text file. Returned verbatim, no normalization.
pub fn extract_plain_text(name: &str, bytes: &[u8]) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => Err(Error::InvalidEncoding(name.to_string())),
    }
}

// ============ Web pages ============

/// Subtrees that are page chrome, not content.
const SKIP_TAGS: [&str; 8] = [
    "script", "style", "nav", "header", "footer", "aside", "noscript", "form",
];

/// Elements that start a new line of text.
const BLOCK_TAGS: [&str; 18] = [
    "p", "div", "li", "ul", "ol", "table", "tr", "br", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article", "blockquote", "pre",
];

/// Fetch a web page and return its normalized visible text.
///
/// Single attempt; a dead link fails this source and the ingest batch
/// continues without it.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|e| Error::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::Fetch {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            })
        }
    }

    let response = client.get(parsed).send().await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "web fetch failed");
        Error::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(url = %url, status = %status, "web fetch failed");
        return Err(Error::Fetch {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
        });
    }

    let html = response.text().await.map_err(|e| Error::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    Ok(clean_text(&strip_markup(&html)))
}

/// Collect the visible text of an HTML document.
///
/// Boilerplate subtrees ([`SKIP_TAGS`]) are dropped entirely; block-level
/// elements break lines so that unrelated fragments do not run together.
pub fn strip_markup(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let mut out = String::new();

    for node in document.tree.root().descendants() {
        match node.value() {
            scraper::Node::Element(element) => {
                if BLOCK_TAGS.contains(&element.name()) {
                    out.push('\n');
                }
            }
            scraper::Node::Text(text) => {
                let in_skipped = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .map(|el| SKIP_TAGS.contains(&el.name()))
                        .unwrap_or(false)
                });
                if !in_skipped {
                    out.push_str(text);
                }
            }
            _ => {}
        }
    }

    out
}

/// Normalize extracted text: line endings unified, control characters
/// dropped, runs of spaces and tabs collapsed, blank-line runs reduced to a
/// single blank line, edges trimmed.
pub fn clean_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = Vec::new();
    for raw_line in unified.lines() {
        let mut line = String::with_capacity(raw_line.len());
        let mut pending_space = false;
        for ch in raw_line.chars() {
            if ch == ' ' || ch == '\t' {
                pending_space = !line.is_empty();
            } else if ch.is_control() {
                continue;
            } else {
                if pending_space {
                    line.push(' ');
                    pending_space = false;
                }
                line.push(ch);
            }
        }
        lines.push(line);
    }

    let mut out = String::new();
    let mut blank_run = 0usize;
    for line in &lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }

    out.trim_matches('\n').to_string()
}
