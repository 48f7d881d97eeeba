//! Prompt assembly for documentation requests.
//!
//! Renders one prompt per chunk from a Markdown instruction template with
//! `{placeholder}` substitution. The built-in template can be overridden by
//! a template file from config; both use the same placeholder set.

use anyhow::{Context, Result};
use std::path::Path;

const BUILTIN_TEMPLATE: &str = r#"You are documenting one file of a larger codebase.

Write clear {language} documentation in Markdown, {tone}.
Explain what the file does, its main types/functions, and how it fits together.
Do not invent behavior that is not in the code. Do not include the full source;
quote at most short snippets where they aid the explanation.

File: `{rel_path}` ({file_kind})

```{code_fence}
{code}
```
"#;

/// Per-chunk context fed into the template.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub rel_path: &'a str,
    pub ext: &'a str,
    /// 0-based chunk index and total, for the chunk-position annotation.
    pub chunk: usize,
    pub chunk_total: usize,
    pub code: &'a str,
}

/// Prompt settings resolved once per run.
#[derive(Debug, Clone)]
pub struct PromptSettings {
    pub language: String,
    pub tone: String,
    pub template: String,
}

impl PromptSettings {
    pub fn from_config(cfg: &crate::config::PromptConfig) -> Result<Self> {
        let template = match &cfg.template_file {
            Some(path) => load_template_file(path)?,
            None => BUILTIN_TEMPLATE.to_string(),
        };
        Ok(Self {
            language: cfg.language.clone(),
            tone: cfg.tone.clone(),
            template,
        })
    }
}

fn load_template_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt template: {}", path.display()))
}

/// Render the prompt for one chunk.
pub fn render(settings: &PromptSettings, ctx: &PromptContext<'_>) -> String {
    let kind = file_kind(ctx.ext);
    let kind = if ctx.chunk_total > 1 {
        format!("{}, chunk {}/{}", kind, ctx.chunk + 1, ctx.chunk_total)
    } else {
        kind.to_string()
    };

    settings
        .template
        .replace("{language}", &settings.language)
        .replace("{tone}", &settings.tone)
        .replace("{rel_path}", ctx.rel_path)
        .replace("{file_kind}", &kind)
        .replace("{code_fence}", code_fence(ctx.ext))
        .replace("{code}", ctx.code)
}

/// Rough category for the template, derived from the extension.
pub fn file_kind(ext: &str) -> &'static str {
    match ext {
        "rs" | "py" | "ts" | "tsx" | "js" | "jsx" | "go" | "c" | "h" | "cpp" => "code",
        "css" | "scss" => "style",
        "json" | "toml" | "yaml" | "yml" => "config",
        "md" => "markdown",
        _ => "unknown",
    }
}

/// Fence language tag for the embedded source block.
pub fn code_fence(ext: &str) -> &str {
    match ext {
        "rs" | "py" | "ts" | "tsx" | "js" | "jsx" | "go" | "c" | "h" | "cpp" | "css" | "scss"
        | "json" | "toml" | "yaml" | "yml" | "md" => ext,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PromptSettings {
        PromptSettings {
            language: "English".to_string(),
            tone: "concise".to_string(),
            template: BUILTIN_TEMPLATE.to_string(),
        }
    }

    #[test]
    fn render_substitutes_all_placeholders() {
        let prompt = render(
            &settings(),
            &PromptContext {
                rel_path: "src/lib.rs",
                ext: "rs",
                chunk: 0,
                chunk_total: 1,
                code: "pub fn answer() -> u32 { 42 }",
            },
        );
        assert!(prompt.contains("`src/lib.rs` (code)"));
        assert!(prompt.contains("```rs"));
        assert!(prompt.contains("pub fn answer()"));
        for placeholder in ["{language}", "{tone}", "{rel_path}", "{file_kind}", "{code}"] {
            assert!(!prompt.contains(placeholder), "unreplaced {}", placeholder);
        }
    }

    #[test]
    fn multi_chunk_annotates_position() {
        let prompt = render(
            &settings(),
            &PromptContext {
                rel_path: "a.py",
                ext: "py",
                chunk: 1,
                chunk_total: 3,
                code: "x = 1",
            },
        );
        assert!(prompt.contains("(code, chunk 2/3)"));
    }

    #[test]
    fn unknown_extension_gets_bare_fence() {
        assert_eq!(code_fence("weird"), "");
        assert_eq!(file_kind("weird"), "unknown");
    }
}
