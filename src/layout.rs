//! Output tree layout.
//!
//! Maps a source file's relative path to the destination of its generated
//! document, mirrored under `<output_root>/src`, and persists documents and
//! the project index. Two layouts:
//!
//! - `flat`: `src/<parent>/<stem>.md`
//! - `stem_folder`: `src/<parent>/<stem>/<stem>.md`

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    Flat,
    StemFolder,
}

impl OutputLayout {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "flat" => Ok(OutputLayout::Flat),
            "stem_folder" => Ok(OutputLayout::StemFolder),
            other => bail!("Unsupported output layout: {}", other),
        }
    }
}

/// Destination path for one source file's document.
pub fn doc_path_for(rel_path: &str, output_root: &Path, layout: OutputLayout) -> PathBuf {
    let rel = Path::new(rel_path);
    let parent = rel.parent().unwrap_or_else(|| Path::new(""));
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| rel_path.to_string());

    let base = output_root.join("src").join(parent);
    match layout {
        OutputLayout::Flat => base.join(format!("{}.md", stem)),
        OutputLayout::StemFolder => base.join(&stem).join(format!("{}.md", stem)),
    }
}

/// Write one merged document, creating parent directories as needed.
pub fn write_document(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut body = text.trim_end().to_string();
    body.push('\n');
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write `INDEX.md` linking every generated document, sorted by source path.
pub fn write_index(
    output_root: &Path,
    entries: &[(String, PathBuf)], // (rel source path, absolute doc path)
) -> Result<PathBuf> {
    let index_path = output_root.join("INDEX.md");

    let mut sorted: Vec<&(String, PathBuf)> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut lines = vec![
        "# Documentation index".to_string(),
        String::new(),
        "Generated by docweave.".to_string(),
        String::new(),
    ];
    for (rel, doc_path) in sorted {
        let doc_rel = doc_path
            .strip_prefix(output_root)
            .unwrap_or(doc_path)
            .to_string_lossy()
            .replace('\\', "/");
        lines.push(format!("- {} -> [{}]({})", rel, doc_rel, doc_rel));
    }

    std::fs::write(&index_path, lines.join("\n") + "\n")
        .with_context(|| format!("Failed to write {}", index_path.display()))?;
    Ok(index_path)
}

/// Remove generated outputs and nothing else: the mirrored `src` subtree and
/// `INDEX.md`. User files elsewhere under the output root are left alone.
pub fn remove_generated(output_root: &Path) -> Result<()> {
    let gen_src = output_root.join("src");
    if gen_src.exists() {
        std::fs::remove_dir_all(&gen_src)
            .with_context(|| format!("Failed to remove {}", gen_src.display()))?;
    }
    let index = output_root.join("INDEX.md");
    if index.exists() {
        std::fs::remove_file(&index)
            .with_context(|| format!("Failed to remove {}", index.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flat_layout_mirrors_parent() {
        let path = doc_path_for("components/header.tsx", Path::new("/docs"), OutputLayout::Flat);
        assert_eq!(path, PathBuf::from("/docs/src/components/header.md"));
    }

    #[test]
    fn stem_folder_layout_adds_stem_dir() {
        let path = doc_path_for(
            "components/header.tsx",
            Path::new("/docs"),
            OutputLayout::StemFolder,
        );
        assert_eq!(path, PathBuf::from("/docs/src/components/header/header.md"));
    }

    #[test]
    fn top_level_file_lands_under_src() {
        let path = doc_path_for("main.rs", Path::new("/docs"), OutputLayout::Flat);
        assert_eq!(path, PathBuf::from("/docs/src/main.md"));
    }

    #[test]
    fn layout_parse_rejects_unknown() {
        assert!(OutputLayout::parse("flat").is_ok());
        assert!(OutputLayout::parse("stem_folder").is_ok());
        assert!(OutputLayout::parse("tree").is_err());
    }

    #[test]
    fn write_document_creates_parents_and_trailing_newline() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("src/deep/doc.md");
        write_document(&path, "# Doc\n\nbody").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Doc\n\nbody\n");
    }

    #[test]
    fn index_lists_entries_sorted() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            ("b.rs".to_string(), tmp.path().join("src/b.md")),
            ("a.rs".to_string(), tmp.path().join("src/a.md")),
        ];
        let index_path = write_index(tmp.path(), &entries).unwrap();
        let content = std::fs::read_to_string(index_path).unwrap();
        let a = content.find("a.rs").unwrap();
        let b = content.find("b.rs").unwrap();
        assert!(a < b);
        assert!(content.contains("[src/a.md](src/a.md)"));
    }

    #[test]
    fn remove_generated_leaves_user_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/a.md"), "doc").unwrap();
        std::fs::write(tmp.path().join("INDEX.md"), "index").unwrap();
        std::fs::write(tmp.path().join("NOTES.md"), "mine").unwrap();

        remove_generated(tmp.path()).unwrap();
        assert!(!tmp.path().join("src").exists());
        assert!(!tmp.path().join("INDEX.md").exists());
        assert!(tmp.path().join("NOTES.md").exists());
    }
}
