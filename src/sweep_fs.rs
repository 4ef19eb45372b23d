//! Documentation and code sweeps over the project filesystem.
//!
//! Both sweeps combine a fixed list of top-level files with a recursive
//! walk of one directory. The walk prunes excluded directory names at every
//! level, admits only allowlisted extensions, and treats unreadable
//! subtrees as non-fatal.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::SelfIndexConfig;
use crate::sweep::{extension_of, file_metadata, SweepItem, SweepKind, SweepScan};

/// Top-level documentation files plus the docs directory.
pub fn scan_documentation(config: &SelfIndexConfig) -> Result<SweepScan> {
    let mut scanner = FileScanner::new(config, SweepKind::Documentation, &config.doc_extensions)?;
    let mut scan = SweepScan::default();
    scanner.scan_top_level(&config.doc_files, &mut scan);
    scanner.scan_dir(&config.docs_dir, &mut scan);
    Ok(scan)
}

/// The source directory plus top-level configuration files.
pub fn scan_code(config: &SelfIndexConfig) -> Result<SweepScan> {
    let mut scanner = FileScanner::new(config, SweepKind::Code, &config.code_extensions)?;
    let mut scan = SweepScan::default();
    scanner.scan_dir(&config.src_dir, &mut scan);
    scanner.scan_top_level(&config.config_files, &mut scan);
    Ok(scan)
}

struct FileScanner {
    root: PathBuf,
    kind: SweepKind,
    extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    excludes: GlobSet,
    max_file_bytes: u64,
    seen: HashSet<String>,
}

impl FileScanner {
    fn new(config: &SelfIndexConfig, kind: SweepKind, extensions: &[String]) -> Result<Self> {
        if !config.project_root.is_dir() {
            bail!(
                "Project root does not exist: {}",
                config.project_root.display()
            );
        }
        Ok(Self {
            root: config.project_root.clone(),
            kind,
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_dirs: config.exclude_dirs.clone(),
            excludes: build_globset(&config.exclude_globs)?,
            max_file_bytes: config.max_file_bytes,
            seen: HashSet::new(),
        })
    }

    /// Named files directly under the project root; no extension filter.
    fn scan_top_level(&mut self, names: &[String], scan: &mut SweepScan) {
        for name in names {
            let path = self.root.join(name);
            if path.is_file() {
                self.read_into(&path, scan);
            }
        }
    }

    fn scan_dir(&mut self, dir: &Path, scan: &mut SweepScan) {
        let dir = self.root.join(dir);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), sweep = self.kind.label(), "directory not found, skipping");
            return;
        }

        let exclude_dirs = self.exclude_dirs.clone();
        let walker = WalkDir::new(&dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| e.depth() == 0 || !is_excluded_dir(e, &exclude_dirs));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, sweep = self.kind.label(), "skipping unreadable path");
                    scan.failed += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.admits(entry.path()) {
                continue;
            }
            self.read_into(entry.path(), scan);
        }
    }

    fn admits(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn read_into(&mut self, path: &Path, scan: &mut SweepScan) {
        let relative = relative_path(&self.root, path);
        if self.excludes.is_match(&relative) || !self.seen.insert(relative.clone()) {
            return;
        }

        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %relative, error = %e, "failed to stat file");
                scan.failed += 1;
                return;
            }
        };
        if size == 0 || size > self.max_file_bytes {
            debug!(path = %relative, size, "skipping empty or oversized file");
            scan.skipped += 1;
            return;
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %relative, error = %e, "failed to read file");
                scan.failed += 1;
                return;
            }
        };
        let content = match String::from_utf8(bytes) {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => {
                debug!(path = %relative, "skipping whitespace-only file");
                scan.skipped += 1;
                return;
            }
            Err(_) => {
                debug!(path = %relative, "skipping non-UTF-8 file");
                scan.skipped += 1;
                return;
            }
        };

        debug!(path = %relative, ext = ?extension_of(&relative), "discovered file");
        scan.items.push(SweepItem {
            id: format!("self-index:{}:{}", self.kind.label(), relative),
            title: relative.clone(),
            content,
            metadata: file_metadata(self.kind, &relative, size),
        });
    }
}

pub(crate) fn is_excluded_dir(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| exclude_dirs.iter().any(|d| d == name))
}

/// `path` relative to `root`, with forward slashes.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
