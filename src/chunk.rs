//! Line-boundary text chunker.
//!
//! Splits a file's text into [`Chunk`]s bounded by a character budget.
//! Consecutive chunks share a configurable number of trailing lines so the
//! model keeps local context across a split; the shared lines are recorded
//! in [`Chunk::overlap_lines`] and removed exactly once on reconstruction.
//!
//! A single line larger than the whole budget is hard-split at the budget on
//! a UTF-8 char boundary. The split pieces carry no overlap and the chunk
//! after them starts fresh, so reconstruction stays exact and no input is
//! ever dropped.

use anyhow::{bail, Result};

use crate::models::Chunk;

/// Split `text` into ordered chunks covering it completely.
///
/// Returns chunks with contiguous indices starting at 0. Fails only on a
/// non-positive character budget; the chunker performs no I/O.
pub fn chunk_lines(text: &str, max_chars: usize, overlap_lines: usize) -> Result<Vec<Chunk>> {
    if max_chars == 0 {
        bail!("chunk character budget must be > 0");
    }

    if text.len() <= max_chars {
        let line_count = text.split_inclusive('\n').count();
        return Ok(vec![Chunk {
            index: 0,
            start_line: 0,
            end_line: line_count,
            overlap_lines: 0,
            text: text.to_string(),
        }]);
    }

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut chunks: Vec<Chunk> = Vec::new();

    // Current accumulation window: `cur` holds line slices, the first
    // `cur_overlap` of which repeat the previous chunk's tail.
    let mut cur: Vec<&str> = Vec::new();
    let mut cur_len = 0usize;
    let mut cur_overlap = 0usize;
    let mut cur_start = 0usize;

    for (line_no, line) in lines.iter().copied().enumerate() {
        if line.len() > max_chars {
            // Oversized line: flush whatever accumulated, then emit the line
            // as budget-sized pieces with no overlap on either side.
            if !cur.is_empty() {
                flush(
                    &mut cur,
                    &mut cur_len,
                    &mut cur_overlap,
                    &mut cur_start,
                    0,
                    &mut chunks,
                );
            }
            for piece in split_at_budget(line, max_chars) {
                chunks.push(Chunk {
                    index: chunks.len(),
                    start_line: line_no,
                    end_line: line_no + 1,
                    overlap_lines: 0,
                    text: piece.to_string(),
                });
            }
            cur_start = line_no + 1;
            continue;
        }

        if !cur.is_empty() && cur_len + line.len() > max_chars {
            flush(
                &mut cur,
                &mut cur_len,
                &mut cur_overlap,
                &mut cur_start,
                overlap_lines,
                &mut chunks,
            );
        }

        cur.push(line);
        cur_len += line.len();
    }

    if !cur.is_empty() {
        flush(
            &mut cur,
            &mut cur_len,
            &mut cur_overlap,
            &mut cur_start,
            0,
            &mut chunks,
        );
    }

    Ok(chunks)
}

/// Emit the accumulated window as a chunk and seed the next window with the
/// requested overlap tail.
fn flush<'a>(
    cur: &mut Vec<&'a str>,
    cur_len: &mut usize,
    cur_overlap: &mut usize,
    cur_start: &mut usize,
    next_overlap: usize,
    chunks: &mut Vec<Chunk>,
) {
    let end_line = *cur_start + cur.len();
    chunks.push(Chunk {
        index: chunks.len(),
        start_line: *cur_start,
        end_line,
        overlap_lines: *cur_overlap,
        text: cur.concat(),
    });

    if next_overlap > 0 {
        let keep = next_overlap.min(cur.len());
        let tail: Vec<&'a str> = cur[cur.len() - keep..].to_vec();
        *cur_start = end_line - keep;
        *cur_len = tail.iter().map(|l| l.len()).sum();
        *cur_overlap = keep;
        *cur = tail;
    } else {
        *cur_start = end_line;
        *cur_len = 0;
        *cur_overlap = 0;
        cur.clear();
    }
}

/// Split one oversized line into pieces of at most `max_chars` bytes,
/// breaking only on char boundaries.
fn split_at_budget(line: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line;
    while rest.len() > max_chars {
        let mut at = max_chars;
        while at > 0 && !rest.is_char_boundary(at) {
            at -= 1;
        }
        if at == 0 {
            // Budget smaller than one char: take the first full char.
            at = rest
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
        }
        pieces.push(&rest[..at]);
        rest = &rest[at..];
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

/// Inverse of [`chunk_lines`]: drop each chunk's leading overlap lines and
/// concatenate. Used to verify the no-loss invariant.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        if chunk.overlap_lines == 0 {
            out.push_str(&chunk.text);
            continue;
        }
        let fresh: String = chunk
            .text
            .split_inclusive('\n')
            .skip(chunk.overlap_lines)
            .collect();
        out.push_str(&fresh);
    }
    out
}
