// SPDX-License-Identifier: MIT
//! Unified-diff parsing.
//!
//! The parser keeps only the lines a change introduces: per file, the `+`
//! lines in diff order, with context and removed lines discarded. The result
//! is NOT the post-patch file — it is a deliberately lossy reconstruction
//! that is good enough to drive surface-level lint heuristics and nothing
//! more.

use std::collections::BTreeMap;

/// Marker that opens a file section and names the new path.
const NEW_FILE_MARKER: &str = "+++ b/";
/// Marker that opens a whole-file diff header.
const DIFF_HEADER: &str = "diff ";

/// A raw unified diff plus the derived per-file added-lines map.
#[derive(Debug, Clone)]
pub struct DiffDocument {
    /// The diff text exactly as fetched from the repository host.
    pub raw: String,
    /// File path → added-lines content. Files with no added lines are absent.
    pub files: BTreeMap<String, String>,
}

impl DiffDocument {
    pub fn parse(raw: String) -> Self {
        let files = parse_added_lines(&raw);
        Self { raw, files }
    }

    pub fn byte_len(&self) -> usize {
        self.raw.len()
    }
}

/// Extract each file's added-lines content from a multi-file unified diff.
///
/// Scan rules, in order per line:
/// - `+++ b/<path>` starts a new file section (any unflushed accumulator for
///   a previous section is dropped with it).
/// - `+`-prefixed lines inside a section are appended, marker stripped.
/// - A `diff ` header or a blank line ends the section and flushes it.
/// - End of input flushes a still-open section.
pub fn parse_added_lines(diff: &str) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    let mut current_file: Option<String> = None;
    let mut current_content: Vec<&str> = Vec::new();

    for line in diff.split('\n') {
        if let Some(path) = line.strip_prefix(NEW_FILE_MARKER) {
            current_file = Some(path.to_string());
            current_content.clear();
        } else if current_file.is_some()
            && line.starts_with('+')
            && !line.starts_with("+++")
        {
            current_content.push(&line[1..]);
        }

        if current_file.is_some() && (line.starts_with(DIFF_HEADER) || line.is_empty()) {
            if let Some(path) = current_file.take() {
                if !current_content.is_empty() {
                    files.insert(path, current_content.join("\n"));
                }
            }
            current_content.clear();
        }
    }

    if let Some(path) = current_file {
        if !current_content.is_empty() {
            files.insert(path, current_content.join("\n"));
        }
    }

    files
}
