//! Shared types for the self-indexing sweeps.
//!
//! A sweep discovers one category of project content and returns it as
//! [`SweepItem`]s; the scheduler submits each item to the orchestrator.
//! The sweeps themselves live in:
//!
//! | Module | Sweep |
//! |--------|-------|
//! | [`sweep_fs`](crate::sweep_fs) | documentation and code files |
//! | [`sweep_git`](crate::sweep_git) | recent commit history and working-tree status |
//! | [`sweep_tree`](crate::sweep_tree) | rendered directory tree |

use std::path::Path;

use context_indexer_core::models::DocumentMetadata;

use crate::ingest::AddDocumentRequest;

/// Metadata `source` of everything the scheduler indexes.
pub const SELF_INDEX_SOURCE: &str = "self-index";

/// The four sweeps of an indexing pass, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    Documentation,
    Code,
    History,
    Structure,
}

impl SweepKind {
    pub const ALL: [SweepKind; 4] = [
        SweepKind::Documentation,
        SweepKind::Code,
        SweepKind::History,
        SweepKind::Structure,
    ];

    /// Context label used as `content_type` and first tag.
    pub fn label(self) -> &'static str {
        match self {
            SweepKind::Documentation => "documentation",
            SweepKind::Code => "code",
            SweepKind::History => "git_history",
            SweepKind::Structure => "project_structure",
        }
    }
}

/// One piece of content discovered by a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepItem {
    /// Stable or time-based document id.
    pub id: String,
    pub title: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl SweepItem {
    pub fn into_request(self) -> AddDocumentRequest {
        AddDocumentRequest {
            id: Some(self.id),
            title: self.title,
            content: self.content,
            metadata: self.metadata,
        }
    }
}

/// Items found by a sweep, plus what it had to leave behind.
#[derive(Debug, Default)]
pub struct SweepScan {
    pub items: Vec<SweepItem>,
    /// Files ignored on purpose (too large, empty, not UTF-8).
    pub skipped: usize,
    /// Entries that could not be read.
    pub failed: usize,
}

/// Metadata for an indexed file at `relative` (forward slashes).
pub fn file_metadata(kind: SweepKind, relative: &str, size: u64) -> DocumentMetadata {
    let ext = extension_of(relative);
    let mut tags = vec![kind.label().to_string()];
    if let Some(ext) = &ext {
        tags.push(ext.clone());
    }
    DocumentMetadata {
        source: SELF_INDEX_SOURCE.to_string(),
        content_type: kind.label().to_string(),
        tags,
        language: ext.as_deref().and_then(detect_language).map(str::to_string),
        size: Some(size),
        mime_type: Some(detect_mime_type(ext.as_deref()).to_string()),
        file_path: Some(relative.to_string()),
        ..Default::default()
    }
}

/// Metadata for synthesized text (history, structure) with a fixed tag.
pub fn text_metadata(kind: SweepKind, tag: &str, size: u64) -> DocumentMetadata {
    DocumentMetadata {
        source: SELF_INDEX_SOURCE.to_string(),
        content_type: kind.label().to_string(),
        tags: vec![kind.label().to_string(), tag.to_string()],
        size: Some(size),
        mime_type: Some("text/plain".to_string()),
        ..Default::default()
    }
}

/// Lower-cased extension, or the whole file name for dotfiles and
/// extensionless files such as `Makefile`.
pub fn extension_of(relative: &str) -> Option<String> {
    let path = Path::new(relative);
    match path.extension() {
        Some(ext) => Some(ext.to_string_lossy().to_lowercase()),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().trim_start_matches('.').to_lowercase())
            .filter(|n| !n.is_empty()),
    }
}

pub fn detect_language(ext: &str) -> Option<&'static str> {
    let lang = match ext {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cc" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "sh" => "shell",
        "sql" => "sql",
        "md" | "mdx" => "markdown",
        "rst" => "restructuredtext",
        "adoc" => "asciidoc",
        "toml" => "toml",
        "json" => "json",
        "yml" | "yaml" => "yaml",
        "dockerfile" => "dockerfile",
        "makefile" => "make",
        _ => return None,
    };
    Some(lang)
}

pub fn detect_mime_type(ext: Option<&str>) -> &'static str {
    match ext {
        Some("md" | "mdx") => "text/markdown",
        Some("json") => "application/json",
        Some("toml") => "application/toml",
        Some("yaml" | "yml") => "text/yaml",
        Some("rst") => "text/x-rst",
        Some("html" | "htm") => "text/html",
        Some("rs") => "text/x-rust",
        Some("py") => "text/x-python",
        Some("js" | "jsx" | "mjs" | "cjs") => "text/javascript",
        Some("ts" | "tsx") => "text/typescript",
        _ => "text/plain",
    }
}
