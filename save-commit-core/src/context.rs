// change evidence for the analyzer and the generation prompt

use crate::git;
use crate::utils::take_chars;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// characters of live document text used when no diff is available
pub const EXCERPT_CHARS: usize = 2000;
/// hard cap on what is handed to the analyzer and the backend
pub const MAX_CONTEXT_CHARS: usize = 8000;
pub const TRUNCATION_MARKER: &str = "\n... [diff truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    StagedDiff,
    FileDiff,
    Excerpt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContext {
    pub source: ContextSource,
    pub text: String,
    pub truncated: bool,
}

/// gather the most relevant change evidence for `file_path`
///
/// preference order: staged diff of everything (stages all changes first),
/// then the single-file diff, then an excerpt of the document text. note
/// that the first step mutates the index.
pub fn extract_context(repo_root: &Path, file_path: &Path, doc_text: Option<&str>) -> ExtractedContext {
    match git::stage_all(repo_root).and_then(|_| git::diff_cached(repo_root)) {
        Ok(diff) if !diff.trim().is_empty() => {
            return bounded(ContextSource::StagedDiff, &diff);
        }
        Ok(_) => debug!("staged diff is empty, trying single-file diff"),
        Err(e) => warn!("could not stage or read staged diff: {e}"),
    }

    match git::diff_file(repo_root, file_path) {
        Ok(diff) if !diff.trim().is_empty() => {
            return bounded(ContextSource::FileDiff, &diff);
        }
        Ok(_) => debug!("file diff is empty, falling back to document text"),
        Err(e) => debug!("file diff unavailable: {e}"),
    }

    let text = match doc_text {
        Some(text) => text.to_string(),
        None => fs::read_to_string(file_path).unwrap_or_default(),
    };
    let (excerpt, _) = take_chars(&text, EXCERPT_CHARS);
    bounded(ContextSource::Excerpt, &excerpt)
}

/// apply the size cap with a visible marker
pub fn bounded(source: ContextSource, text: &str) -> ExtractedContext {
    let (mut text, truncated) = take_chars(text, MAX_CONTEXT_CHARS);
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    ExtractedContext {
        source,
        text,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_context_is_untouched() {
        let ctx = bounded(ContextSource::FileDiff, "+one line");
        assert_eq!(ctx.text, "+one line");
        assert!(!ctx.truncated);
    }

    #[test]
    fn oversized_context_is_capped_with_marker() {
        let diff = "+x\n".repeat(5000);
        let ctx = bounded(ContextSource::StagedDiff, &diff);
        assert!(ctx.truncated);
        assert!(ctx.text.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            ctx.text.chars().count(),
            MAX_CONTEXT_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }
}
