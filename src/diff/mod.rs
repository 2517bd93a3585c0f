//! Diff normalization
//!
//! Converts a raw [`FilePatch`] into the record's structured
//! [`FileChange`] form: status, rename metadata, hunks with verbatim
//! headers and sign-retaining line capture, per-file add/delete counts,
//! and a derived language tag. Binary files pass through with empty
//! hunks; files whose patch text is not valid UTF-8 are dropped with a
//! warning and never abort the record.

use std::path::Path;

use tracing::warn;

use crate::git::FilePatch;
use crate::models::{ChangeStatus, DiffStats, FileChange, Hunk};

/// Normalize one raw patch into a [`FileChange`].
///
/// Returns `None` when the patch text cannot be decoded as UTF-8; the
/// caller proceeds with the remaining files.
pub fn normalize_file_patch(patch: &FilePatch) -> Option<FileChange> {
    let path = patch
        .new_path
        .clone()
        .or_else(|| patch.old_path.clone())
        .unwrap_or_default();
    let previous_path = match patch.status {
        ChangeStatus::Renamed => patch
            .old_path
            .clone()
            .filter(|old| patch.new_path.as_deref() != Some(old.as_str())),
        _ => None,
    };
    let extension = extension_of(&path);
    let language = language_for_extension(&extension).map(str::to_string);

    if patch.is_binary {
        return Some(FileChange {
            path,
            previous_path,
            status: patch.status,
            extension,
            language,
            hunks: Vec::new(),
            stats: DiffStats::default(),
        });
    }

    let text = match std::str::from_utf8(&patch.text) {
        Ok(text) => text,
        Err(error) => {
            warn!(path = %path, %error, "patch text is not valid UTF-8; skipping file");
            return None;
        }
    };

    let hunks = parse_hunks(text);
    let stats = DiffStats {
        additions: hunks.iter().map(|h| h.added.len()).sum(),
        deletions: hunks.iter().map(|h| h.removed.len()).sum(),
    };

    Some(FileChange {
        path,
        previous_path,
        status: patch.status,
        extension,
        language,
        hunks,
        stats,
    })
}

/// Parse unified diff text into structured hunks.
///
/// Lines before the first `@@` are the file-level header and are not
/// captured. Body lines are classified by their first byte and keep
/// their leading sign character exactly as stored.
pub fn parse_hunks(text: &str) -> Vec<Hunk> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in text.lines() {
        if line.starts_with("@@") {
            if let Some(done) = current.take() {
                hunks.push(done);
            }
            current = Some(Hunk {
                header: line.to_string(),
                ..Hunk::default()
            });
            continue;
        }
        let Some(hunk) = current.as_mut() else {
            continue;
        };
        match line.as_bytes().first() {
            Some(b'+') => hunk.added.push(line.to_string()),
            Some(b'-') => hunk.removed.push(line.to_string()),
            // Context lines, empty lines, and markers such as
            // `\ No newline at end of file`.
            _ => hunk.context.push(line.to_string()),
        }
    }
    if let Some(done) = current {
        hunks.push(done);
    }
    hunks
}

/// Lowercase suffix of a path including the leading dot, or empty.
pub fn extension_of(path: &str) -> String {
    match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => String::new(),
    }
}

/// Language name for a known extension; `None` keeps the record's
/// `language` field at JSON `null`.
pub fn language_for_extension(extension: &str) -> Option<&'static str> {
    let language = match extension {
        ".py" | ".pyi" => "python",
        ".ts" | ".tsx" => "typescript",
        ".js" | ".jsx" | ".mjs" => "javascript",
        ".rs" => "rust",
        ".go" => "go",
        ".java" => "java",
        ".c" | ".h" => "c",
        ".cpp" | ".hpp" | ".cc" => "cpp",
        ".cs" => "csharp",
        ".kt" | ".kts" => "kotlin",
        ".rb" => "ruby",
        ".php" => "php",
        ".swift" => "swift",
        ".yaml" | ".yml" => "yaml",
        _ => return None,
    };
    Some(language)
}
