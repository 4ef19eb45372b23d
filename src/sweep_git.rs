//! History sweep: recent commits and working-tree status from `git`.
//!
//! Produces up to two documents per pass, each keyed by a time-based id so
//! every pass adds new history rather than replacing the previous one. A
//! project that is not a git work tree yields nothing. Failing `git`
//! subcommands only drop the document they would have produced.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use crate::config::SelfIndexConfig;
use crate::sweep::{text_metadata, SweepItem, SweepKind, SweepScan};

pub fn scan_history(config: &SelfIndexConfig) -> Result<SweepScan> {
    let root = &config.project_root;
    let mut scan = SweepScan::default();

    if !is_work_tree(root)? {
        debug!(root = %root.display(), "not a git work tree, skipping history sweep");
        return Ok(scan);
    }

    let stamp = Utc::now().timestamp_millis();

    // A repository without commits makes `git log` fail.
    let log = recent_commits(root, config.history_days).unwrap_or_else(|e| {
        warn!(root = %root.display(), error = %e, "could not read commit log");
        String::new()
    });
    if !log.trim().is_empty() {
        let content = format!(
            "Commits from the last {} days:\n\n{}",
            config.history_days,
            log.trim_end()
        );
        scan.items.push(SweepItem {
            id: format!("git-history-{stamp}"),
            title: format!("Git history (last {} days)", config.history_days),
            metadata: text_metadata(SweepKind::History, "commits", content.len() as u64),
            content,
        });
    }

    let branch = git(root, &["branch", "--show-current"])
        .unwrap_or_default()
        .trim()
        .to_string();
    let status = match git(root, &["status", "--porcelain"]) {
        Ok(status) => status,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "could not read working-tree status");
            scan.failed += 1;
            return Ok(scan);
        }
    };
    if !branch.is_empty() || !status.trim().is_empty() {
        let content = render_status(&branch, &status);
        let label = if branch.is_empty() { "detached" } else { branch.as_str() };
        scan.items.push(SweepItem {
            id: format!("git-status-{stamp}"),
            title: format!("Git status ({label})"),
            metadata: text_metadata(SweepKind::History, "status", content.len() as u64),
            content,
        });
    }

    Ok(scan)
}

fn is_work_tree(root: &Path) -> Result<bool> {
    let output = Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(root)
        .output()
        .with_context(|| "Failed to execute 'git'. Is git installed?")?;
    Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
}

fn recent_commits(root: &Path, days: u32) -> Result<String> {
    let since = format!("--since={days} days ago");
    git(
        root,
        &[
            "log",
            &since,
            "--date=short",
            "--pretty=format:%h %ad %an: %s",
        ],
    )
}

/// Run `git` in `root` and return stdout.
fn git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("Failed to execute 'git {}'", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn render_status(branch: &str, porcelain: &str) -> String {
    let branch = if branch.is_empty() { "(detached)" } else { branch };
    let mut out = format!("Branch: {branch}\n\n");
    let changes: Vec<&str> = porcelain.lines().filter(|l| !l.trim().is_empty()).collect();
    if changes.is_empty() {
        out.push_str("Working tree clean\n");
    } else {
        out.push_str(&format!("Uncommitted changes ({}):\n", changes.len()));
        for line in changes {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
