//! Overlapping text chunker.
//!
//! Splits extracted text into chunks of at most `chunk_size` characters,
//! where every chunk after the first begins with exactly the last
//! `chunk_overlap` characters of its predecessor. Cut points prefer the
//! strongest boundary available in range: paragraph break, then line break,
//! then sentence end, then word gap, with a hard character cut as the last
//! resort.
//!
//! All limits are measured in characters, never bytes, so multi-byte text
//! cannot be cut mid-scalar.

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Separator hierarchy, strongest boundary first.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split a source's text into overlapping chunks carrying the source key.
pub fn chunk_source(text: &str, source: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    split_text(text, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .map(|text| Chunk {
            text,
            source: source.to_string(),
        })
        .collect()
}

/// Split `text` into pieces of at most `size` characters with `overlap`
/// characters shared between consecutive pieces.
///
/// The text is first cut into non-overlapping core segments of at most
/// `size - overlap` characters; each emitted chunk is then the previous
/// chunk's tail plus the next core. Concatenating the cores reproduces the
/// input exactly, so no text is lost or duplicated beyond the overlap.
///
/// Empty input yields no chunks. Input short enough to fit in one chunk is
/// returned verbatim. `overlap` must be smaller than `size` (enforced at
/// config load).
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= size {
        return vec![text.to_string()];
    }

    let cores = split_cores(text, size - overlap);

    let mut chunks: Vec<String> = Vec::with_capacity(cores.len());
    for core in cores {
        let chunk = match chunks.last() {
            None => core,
            Some(prev) => {
                let mut with_overlap = char_tail(prev, overlap).to_string();
                with_overlap.push_str(&core);
                with_overlap
            }
        };
        chunks.push(chunk);
    }
    chunks
}

/// Cut `text` into consecutive segments of at most `max` characters at the
/// best boundary available. Separators stay attached to the segment on
/// their left.
fn split_cores(text: &str, max: usize) -> Vec<String> {
    let mut cores = Vec::new();
    let mut rest = text;
    let mut rest_chars = text.chars().count();

    while !rest.is_empty() {
        if rest_chars <= max {
            cores.push(rest.to_string());
            break;
        }
        let cut = find_cut(rest, max);
        let (head, tail) = rest.split_at(cut);
        rest_chars -= head.chars().count();
        cores.push(head.to_string());
        rest = tail;
    }
    cores
}

/// Byte offset at which to cut `text` so the head holds at most `max`
/// characters: the latest occurrence of the strongest separator within
/// range, or a hard cut at the character limit when no separator exists.
fn find_cut(text: &str, max: usize) -> usize {
    let limit = byte_of_char(text, max);
    let window = &text[..limit];

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            return pos + sep.len();
        }
    }
    limit
}

/// Byte offset of the `n`-th character (or the text's length if shorter).
fn byte_of_char(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// The last `n` characters of `s`, or all of it when shorter.
fn char_tail(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    &s[byte_of_char(s, count - n)..]
}
