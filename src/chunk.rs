//! Overlapping text chunker.
//!
//! Splits extracted page text into chunks bounded by a character budget, with
//! consecutive chunks sharing a fixed overlap so a sentence spanning a chunk
//! boundary is never lost entirely. Chunk order is stable and follows document
//! reading order; every chunk remembers its source page.

/// One chunk of document text, tagged with its 1-based source page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageChunk {
    pub page_number: i64,
    pub text: String,
}

/// Split pages into overlapping chunks.
///
/// `chunk_chars` bounds every chunk's length; `overlap_chars` is shared
/// between consecutive chunks within a page. Empty pages produce no chunks.
pub fn chunk_pages(pages: &[String], chunk_chars: usize, overlap_chars: usize) -> Vec<PageChunk> {
    let mut chunks = Vec::new();
    for (page_idx, page) in pages.iter().enumerate() {
        chunk_page(page, page_idx as i64 + 1, chunk_chars, overlap_chars, &mut chunks);
    }
    chunks
}

fn chunk_page(
    text: &str,
    page_number: i64,
    chunk_chars: usize,
    overlap_chars: usize,
    out: &mut Vec<PageChunk>,
) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= chunk_chars {
        out.push(PageChunk {
            page_number,
            text: trimmed.to_string(),
        });
        return;
    }

    let mut start = 0usize;
    loop {
        let hard_end = (start + chunk_chars).min(chars.len());
        let end = if hard_end < chars.len() {
            split_point(&chars, start, hard_end)
        } else {
            hard_end
        };

        out.push(PageChunk {
            page_number,
            text: chars[start..end].iter().collect(),
        });

        if end >= chars.len() {
            break;
        }

        // Step back to share the overlap region, but always make progress.
        let next = end.saturating_sub(overlap_chars);
        start = if next > start { next } else { end };
    }
}

/// Prefer breaking at a newline or space in the back half of the window so
/// chunks end on word boundaries where the text allows it.
fn split_point(chars: &[char], start: usize, hard_end: usize) -> usize {
    let floor = start + (hard_end - start) / 2;
    for i in (floor..hard_end).rev() {
        if chars[i] == '\n' || chars[i] == ' ' {
            return i + 1;
        }
    }
    hard_end
}
