//! Fragment reassembly.
//!
//! Combines the complete, index-ordered list of [`Fragment`]s for one file
//! into a single document. A lone fragment passes through unchanged.
//! Multi-fragment files are concatenated in chunk order; lines the upstream
//! generation repeated verbatim because of chunk overlap (the tail of one
//! fragment reappearing as the head of the next) are dropped once. The merge
//! never reorders content.
//!
//! Merging requires every fragment: a missing index means a chunk failed
//! permanently, and the whole file is treated as failed rather than
//! partially documented.

use anyhow::{bail, Result};

use crate::models::Fragment;

/// Longest tail/head window inspected for overlap-induced duplication.
const MAX_SEAM_LINES: usize = 40;

/// Merge index-ordered fragments into one document.
///
/// `expected` is the file's chunk count; fewer fragments, a gap, or a
/// duplicate index fails the merge.
pub fn merge_fragments(fragments: &[Fragment], expected: usize) -> Result<String> {
    if fragments.len() != expected {
        bail!(
            "incomplete fragment set: have {}, expected {}",
            fragments.len(),
            expected
        );
    }
    for (i, fragment) in fragments.iter().enumerate() {
        if fragment.chunk_index != i {
            bail!(
                "fragment index {} out of order at position {}",
                fragment.chunk_index,
                i
            );
        }
    }

    if fragments.len() == 1 {
        return Ok(fragments[0].text.trim().to_string());
    }

    let mut merged: Vec<String> = Vec::new();
    for fragment in fragments {
        let lines: Vec<&str> = fragment.text.trim().lines().collect();
        let skip = seam_overlap(&merged, &lines);
        for line in &lines[skip..] {
            merged.push((*line).to_string());
        }
    }

    Ok(merged.join("\n"))
}

/// Number of leading `next` lines that verbatim-repeat the tail of `merged`.
///
/// Scans window sizes longest-first so the widest duplicated seam is removed
/// in one step.
fn seam_overlap(merged: &[String], next: &[&str]) -> usize {
    let max = MAX_SEAM_LINES.min(merged.len()).min(next.len());
    for window in (1..=max).rev() {
        let tail = &merged[merged.len() - window..];
        let head = &next[..window];
        let matches = tail
            .iter()
            .zip(head.iter())
            .all(|(a, b)| a.as_str() == *b);
        if matches {
            return window;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fragment(index: usize, text: &str) -> Fragment {
        Fragment {
            chunk_index: index,
            text: text.to_string(),
            model: "m".to_string(),
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn single_fragment_passes_through() {
        let frags = vec![fragment(0, "# Doc\n\nBody text.\n")];
        let merged = merge_fragments(&frags, 1).unwrap();
        assert_eq!(merged, "# Doc\n\nBody text.");
    }

    #[test]
    fn fragments_concatenated_in_index_order() {
        let frags = vec![
            fragment(0, "## Part one\nalpha"),
            fragment(1, "## Part two\nbeta"),
            fragment(2, "## Part three\ngamma"),
        ];
        let merged = merge_fragments(&frags, 3).unwrap();
        let one = merged.find("Part one").unwrap();
        let two = merged.find("Part two").unwrap();
        let three = merged.find("Part three").unwrap();
        assert!(one < two && two < three);
    }

    #[test]
    fn overlap_duplicated_seam_removed_once() {
        let frags = vec![
            fragment(0, "intro\nshared line a\nshared line b"),
            fragment(1, "shared line a\nshared line b\noutro"),
        ];
        let merged = merge_fragments(&frags, 2).unwrap();
        assert_eq!(merged, "intro\nshared line a\nshared line b\noutro");
    }

    #[test]
    fn repeated_interior_lines_not_collapsed() {
        // Duplication is only removed at the seam, never inside a fragment.
        let frags = vec![
            fragment(0, "item\nitem\nend of first"),
            fragment(1, "start of second\nitem\nitem"),
        ];
        let merged = merge_fragments(&frags, 2).unwrap();
        assert_eq!(
            merged,
            "item\nitem\nend of first\nstart of second\nitem\nitem"
        );
    }

    #[test]
    fn interior_blank_lines_preserved() {
        let frags = vec![
            fragment(0, "## First\n\nbody one"),
            fragment(1, "## Second\n\nbody two"),
        ];
        let merged = merge_fragments(&frags, 2).unwrap();
        assert_eq!(merged, "## First\n\nbody one\n## Second\n\nbody two");
    }

    #[test]
    fn missing_fragment_fails() {
        let frags = vec![fragment(0, "a"), fragment(1, "b")];
        assert!(merge_fragments(&frags, 3).is_err());
    }

    #[test]
    fn out_of_order_fragment_fails() {
        let frags = vec![fragment(1, "b"), fragment(0, "a")];
        assert!(merge_fragments(&frags, 2).is_err());
    }

    #[test]
    fn no_reordering_of_sections() {
        let frags = vec![
            fragment(0, "## Usage\nrun it\n\n## Caveats\nnone yet"),
            fragment(1, "## Internals\ndetails"),
        ];
        let merged = merge_fragments(&frags, 2).unwrap();
        let usage = merged.find("## Usage").unwrap();
        let caveats = merged.find("## Caveats").unwrap();
        let internals = merged.find("## Internals").unwrap();
        assert!(usage < caveats && caveats < internals);
    }
}
