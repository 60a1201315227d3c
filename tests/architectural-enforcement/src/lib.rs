//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce how the poller
//! waits and does I/O:
//! - Every delay is a cancellable timer, never a thread-blocking sleep
//! - Async code paths use tokio I/O
//!
//! The scanners are line based and only look at production code: each
//! file is read up to its `#[cfg(test)]` module.

use std::fs;
use std::path::{Path, PathBuf};

/// Source directories holding production code, relative to the workspace
pub const PRODUCTION_DIRS: [&str; 2] = ["poller/core/src", "poller/cli/src"];

/// Workspace root, resolved from this crate's manifest
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// A rule violation at a specific line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub code: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.code)
    }
}

/// Production lines of every `.rs` file under the production directories
#[must_use]
pub fn production_sources() -> Vec<(PathBuf, Vec<String>)> {
    let root = workspace_root();
    let mut sources = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            sources.push((entry.path().to_path_buf(), production_lines(&content)));
        }
    }
    sources
}

/// Lines before the first `#[cfg(test)]`
#[must_use]
pub fn production_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .take_while(|line| line.trim() != "#[cfg(test)]")
        .map(str::to_string)
        .collect()
}

/// The code part of a line (comments stripped)
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Signature line of the function enclosing `idx`, if any
#[must_use]
pub fn enclosing_fn(lines: &[String], idx: usize) -> Option<&str> {
    lines[..=idx].iter().rev().map(|l| l.trim()).find(|line| {
        line.starts_with("fn ")
            || line.starts_with("pub fn ")
            || line.starts_with("async fn ")
            || line.starts_with("pub async fn ")
            || line.starts_with("pub(crate) fn ")
            || line.starts_with("pub(crate) async fn ")
    })
}

/// Name of a function from its signature line
#[must_use]
pub fn fn_name(signature: &str) -> Option<&str> {
    let after = signature.split("fn ").nth(1)?;
    let end = after.find(|c: char| c == '(' || c == '<')?;
    Some(after[..end].trim())
}
