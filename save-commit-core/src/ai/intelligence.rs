// change analysis - classifies a diff by size, type, scope and breakage

use super::patterns::{self, NEW_ARROW_FN, NEW_SIGNATURE, REMOVED_EXPORT, DIFF_HEADER};
use crate::utils::normalize_scope;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
    Major,
}

impl Complexity {
    /// tier for a weighted change score
    pub fn from_score(score: usize) -> Self {
        match score {
            0..=5 => Complexity::Trivial,
            6..=20 => Complexity::Simple,
            21..=50 => Complexity::Moderate,
            51..=150 => Complexity::Complex,
            _ => Complexity::Major,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Feat,
    Fix,
    Refactor,
    Docs,
    Style,
    Test,
    Chore,
    Perf,
    Build,
    Ci,
    Security,
}

impl ChangeType {
    pub const ALL: [ChangeType; 11] = [
        ChangeType::Feat,
        ChangeType::Fix,
        ChangeType::Refactor,
        ChangeType::Docs,
        ChangeType::Style,
        ChangeType::Test,
        ChangeType::Chore,
        ChangeType::Perf,
        ChangeType::Build,
        ChangeType::Ci,
        ChangeType::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Feat => "feat",
            ChangeType::Fix => "fix",
            ChangeType::Refactor => "refactor",
            ChangeType::Docs => "docs",
            ChangeType::Style => "style",
            ChangeType::Test => "test",
            ChangeType::Chore => "chore",
            ChangeType::Perf => "perf",
            ChangeType::Build => "build",
            ChangeType::Ci => "ci",
            ChangeType::Security => "security",
        }
    }

    /// gitmoji-style marker used when emoji are enabled
    pub fn emoji(&self) -> &'static str {
        match self {
            ChangeType::Feat => "✨",
            ChangeType::Fix => "🐛",
            ChangeType::Refactor => "♻️",
            ChangeType::Docs => "📝",
            ChangeType::Style => "💄",
            ChangeType::Test => "✅",
            ChangeType::Chore => "🔧",
            ChangeType::Perf => "⚡",
            ChangeType::Build => "📦",
            ChangeType::Ci => "👷",
            ChangeType::Security => "🔒",
        }
    }

    pub fn parse(token: &str) -> Option<ChangeType> {
        ChangeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == token.trim().to_lowercase())
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLength {
    Short,
    Medium,
    Detailed,
}

impl MessageLength {
    /// body lines kept from a generated message
    pub fn max_body_lines(&self) -> usize {
        match self {
            MessageLength::Short => 0,
            MessageLength::Medium => 4,
            MessageLength::Detailed => 9,
        }
    }

    /// subject length the prompt asks for
    pub fn target_subject_chars(&self) -> usize {
        match self {
            MessageLength::Short => 50,
            MessageLength::Medium | MessageLength::Detailed => 72,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeAnalysis {
    pub lines_added: usize,
    pub lines_removed: usize,
    pub files_changed: usize,
    pub complexity: Complexity,
    pub change_type: ChangeType,
    pub scope: Option<String>,
    pub is_breaking_change: bool,
    pub suggested_length: MessageLength,
    pub has_new_function: bool,
    pub has_dependency_changes: bool,
}

impl ChangeAnalysis {
    pub fn total_changes(&self) -> usize {
        self.lines_added + self.lines_removed
    }
}

/// line-level facts pulled from a unified diff
#[derive(Debug, Default)]
struct DiffScan<'a> {
    added: Vec<&'a str>,
    removed: Vec<&'a str>,
    paths: Vec<String>,
}

fn scan_diff(diff: &str) -> DiffScan<'_> {
    let mut scan = DiffScan::default();
    // `---`/`+++` are file headers only before the first hunk of a section
    let mut in_hunk = false;

    for line in diff.lines() {
        if let Some(caps) = DIFF_HEADER.captures(line) {
            scan.paths.push(caps[2].to_string());
            in_hunk = false;
        } else if line.starts_with("@@") {
            in_hunk = true;
        } else if !in_hunk && (line.starts_with("+++") || line.starts_with("---")) {
            continue;
        } else if line.starts_with('+') {
            scan.added.push(line);
        } else if line.starts_with('-') {
            scan.removed.push(line);
        }
    }

    scan
}

/// classify a diff for message steering; best effort, never blocks a commit
pub fn analyze(diff: &str, file_path: &str) -> ChangeAnalysis {
    let scan = scan_diff(diff);
    let lines_added = scan.added.len();
    let lines_removed = scan.removed.len();
    let files_changed = scan.paths.len().max(1);
    let total = lines_added + lines_removed;

    // cross-file churn is harder to summarise than raw line count
    let complexity = Complexity::from_score(total + (files_changed - 1) * 10);

    let has_new_function = scan
        .added
        .iter()
        .any(|line| NEW_SIGNATURE.is_match(line) || NEW_ARROW_FN.is_match(line));

    let has_dependency_changes = patterns::is_dependency_path(file_path)
        || scan.paths.iter().any(|p| patterns::is_dependency_path(p));

    let changed_text = scan
        .added
        .iter()
        .chain(scan.removed.iter())
        .map(|line| &line[1..])
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    let change_type = detect_change_type(file_path, &scan, &changed_text, has_new_function);
    let scope = extract_scope(file_path);

    let is_breaking_change = patterns::BREAKING_MARKERS
        .iter()
        .any(|m| changed_text.contains(m))
        || scan.removed.iter().any(|line| REMOVED_EXPORT.is_match(line));

    let suggested_length = suggest_length(complexity, is_breaking_change, has_new_function);

    ChangeAnalysis {
        lines_added,
        lines_removed,
        files_changed,
        complexity,
        change_type,
        scope,
        is_breaking_change,
        suggested_length,
        has_new_function,
        has_dependency_changes,
    }
}

/// priority-ordered heuristics, first match wins
fn detect_change_type(
    file_path: &str,
    scan: &DiffScan<'_>,
    changed_text: &str,
    has_new_function: bool,
) -> ChangeType {
    let added = scan.added.len();
    let removed = scan.removed.len();
    let total = added + removed;

    if patterns::is_test_path(file_path) {
        return ChangeType::Test;
    }
    if patterns::is_docs_path(file_path) {
        return ChangeType::Docs;
    }
    if patterns::is_ci_path(file_path) {
        return ChangeType::Ci;
    }
    if patterns::is_build_path(file_path) {
        return ChangeType::Build;
    }
    if total > 0 && total <= 30 && is_whitespace_only(scan) {
        return ChangeType::Style;
    }
    if contains_any(changed_text, patterns::FIX_KEYWORDS) {
        return ChangeType::Fix;
    }
    if contains_any(changed_text, patterns::PERF_KEYWORDS) {
        return ChangeType::Perf;
    }
    if contains_any(changed_text, patterns::SECURITY_KEYWORDS) {
        return ChangeType::Security;
    }
    if !has_new_function && removed >= 5 && removed as f32 >= added as f32 * 1.5 {
        return ChangeType::Refactor;
    }
    if has_new_function || (added >= 30 && added >= removed * 2) {
        return ChangeType::Feat;
    }

    if total > 15 {
        ChangeType::Feat
    } else {
        ChangeType::Chore
    }
}

/// removed and added lines are identical once whitespace is ignored
fn is_whitespace_only(scan: &DiffScan<'_>) -> bool {
    let squash = |lines: &[&str]| -> Vec<String> {
        let mut out: Vec<String> = lines
            .iter()
            .map(|l| l[1..].chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|l| !l.is_empty())
            .collect();
        out.sort();
        out
    };
    squash(&scan.added) == squash(&scan.removed)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// short scope token derived from the path
pub fn extract_scope(file_path: &str) -> Option<String> {
    let dirs = patterns::dir_segments_lower(file_path);

    for (i, seg) in dirs.iter().enumerate() {
        if !patterns::SCOPE_CONTAINERS.contains(&seg.as_str()) {
            continue;
        }
        if let Some(next) = dirs.get(i + 1) {
            if !patterns::SCOPE_CONTAINERS.contains(&next.as_str()) {
                let scope = normalize_scope(next);
                if !scope.is_empty() {
                    return Some(scope);
                }
            }
        }
    }

    // `src/api/users.ts`: the container itself is the best label
    if let Some(last) = dirs.last() {
        if patterns::SCOPE_CONTAINERS.contains(&last.as_str())
            && !patterns::SCOPE_ROOTS.contains(&last.as_str())
        {
            return Some(last.clone());
        }
    }

    let ext = patterns::extension_lower(file_path);
    if patterns::STYLE_EXTENSIONS.contains(&ext.as_str()) {
        return Some("styles".to_string());
    }
    if ext == "md" || ext == "mdx" {
        return Some("docs".to_string());
    }
    if patterns::is_dependency_path(file_path) {
        return Some("deps".to_string());
    }

    None
}

fn suggest_length(complexity: Complexity, breaking: bool, new_function: bool) -> MessageLength {
    if breaking {
        return MessageLength::Detailed;
    }
    match complexity {
        Complexity::Trivial => MessageLength::Short,
        Complexity::Simple if new_function => MessageLength::Medium,
        Complexity::Simple => MessageLength::Short,
        Complexity::Moderate => MessageLength::Medium,
        Complexity::Complex | Complexity::Major => MessageLength::Detailed,
    }
}
