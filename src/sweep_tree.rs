//! Structure sweep: the project's directory tree as indented text.
//!
//! ```text
//! demo/
//!   Cargo.toml
//!   src/
//!     main.rs
//! ```

use anyhow::{bail, Result};
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::SelfIndexConfig;
use crate::sweep::{text_metadata, SweepItem, SweepKind, SweepScan};
use crate::sweep_fs::is_excluded_dir;

/// Stable id; each pass replaces the previous tree.
pub const STRUCTURE_DOCUMENT_ID: &str = "self-index:project_structure";

pub fn scan_structure(config: &SelfIndexConfig) -> Result<SweepScan> {
    let root = &config.project_root;
    if !root.is_dir() {
        bail!("Project root does not exist: {}", root.display());
    }

    let mut scan = SweepScan::default();
    let tree = render_tree(
        root,
        &config.exclude_dirs,
        config.structure_max_depth,
        &mut scan.failed,
    );
    scan.items.push(SweepItem {
        id: STRUCTURE_DOCUMENT_ID.to_string(),
        title: "Project structure".to_string(),
        metadata: text_metadata(SweepKind::Structure, "tree", tree.len() as u64),
        content: tree,
    });
    Ok(scan)
}

/// Render `root` as an indented tree; directories end with `/`.
///
/// Unreadable entries are logged, counted in `failed`, and left out.
pub fn render_tree(
    root: &Path,
    exclude_dirs: &[String],
    max_depth: usize,
    failed: &mut usize,
) -> String {
    let name = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| ".".to_string());
    let mut out = format!("{name}/\n");

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth.max(1))
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, exclude_dirs));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path in structure sweep");
                *failed += 1;
                continue;
            }
        };
        let indent = "  ".repeat(entry.depth());
        let suffix = if entry.file_type().is_dir() { "/" } else { "" };
        out.push_str(&format!(
            "{indent}{}{suffix}\n",
            entry.file_name().to_string_lossy()
        ));
    }
    out
}
