// pattern tables for the change analyzer - paths, keywords and signatures

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// new function, class or type declarations on an added line (multi-language)
    pub static ref NEW_SIGNATURE: Regex = Regex::new(
        r"(?x)^\+\s*
        (?:export\s+(?:default\s+)?)?
        (?:pub(?:\([a-z]+\))?\s+)?
        (?:public\s+|private\s+|protected\s+|static\s+)*
        (?:async\s+)?
        (?:function\*?\s+\w|fn\s+\w|def\s+\w|class\s+\w|struct\s+\w|enum\s+\w|interface\s+\w|trait\s+\w|impl\b|func\s+\w)"
    ).unwrap();

    /// arrow functions bound to a name: `const handle = async (req) =>`
    pub static ref NEW_ARROW_FN: Regex = Regex::new(
        r"^\+\s*(?:export\s+)?(?:const|let)\s+\w+\s*=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*=>"
    ).unwrap();

    /// removed public surface, a likely breaking change
    pub static ref REMOVED_EXPORT: Regex = Regex::new(
        r"^-\s*(?:export\s|module\.exports|pub\s+(?:fn|struct|enum|trait|mod|const|type|use)\b)"
    ).unwrap();

    /// per-file header in a unified git diff
    pub static ref DIFF_HEADER: Regex = Regex::new(r"^diff --git a/(\S+) b/(\S+)").unwrap();
}

/// directory names that mark test code
pub const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "e2e"];

pub const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "rst", "adoc", "txt"];
pub const DOC_FILE_PREFIXES: &[&str] = &["readme", "changelog", "contributing", "license"];
pub const DOC_DIRS: &[&str] = &["docs", "doc", "documentation"];

pub const CI_MARKERS: &[&str] = &[
    ".github/workflows",
    ".gitlab-ci",
    ".circleci",
    "jenkinsfile",
    "azure-pipelines",
    ".travis.yml",
    "bitbucket-pipelines",
];

/// manifests and lockfiles; a change to any of these is a dependency change
pub const DEPENDENCY_FILES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "cargo.toml",
    "cargo.lock",
    "go.mod",
    "go.sum",
    "requirements.txt",
    "pyproject.toml",
    "pipfile",
    "pipfile.lock",
    "poetry.lock",
    "gemfile",
    "gemfile.lock",
    "composer.json",
    "composer.lock",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
];

/// build tooling that is not itself a dependency manifest
pub const BUILD_FILE_MARKERS: &[&str] = &[
    "makefile",
    "dockerfile",
    "docker-compose",
    "webpack.config",
    "vite.config",
    "rollup.config",
    "tsconfig",
    "babel.config",
    ".babelrc",
    "cmakelists.txt",
    "build.rs",
    "justfile",
];

pub const STYLE_EXTENSIONS: &[&str] = &["css", "scss", "sass", "less", "styl"];

pub const FIX_KEYWORDS: &[&str] = &[
    "fix", "bug", "error", "issue", "crash", "broken", "regression", "typo", "workaround",
];

pub const PERF_KEYWORDS: &[&str] = &[
    "perf", "optimiz", "optimis", "faster", "speed up", "speedup", "memoiz", "cache", "latency",
    "throughput",
];

pub const SECURITY_KEYWORDS: &[&str] = &[
    "security", "vulnerab", "xss", "csrf", "injection", "sanitiz", "sanitis", "cve-", "exploit",
    "escape html",
];

pub const BREAKING_MARKERS: &[&str] = &["breaking", "deprecated", "removed", "migration"];

/// path segments whose next segment names the scope
pub const SCOPE_CONTAINERS: &[&str] = &[
    "src",
    "lib",
    "app",
    "components",
    "services",
    "api",
    "modules",
    "features",
    "pages",
    "routes",
    "controllers",
    "models",
    "hooks",
    "utils",
    "packages",
    "crates",
];

/// generic source roots, never a scope on their own
pub const SCOPE_ROOTS: &[&str] = &["src", "lib", "app", "packages", "crates"];

/// lowercase file name of a slash-separated path
pub fn file_name_lower(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_lowercase()
}

/// lowercase extension of a slash-separated path, empty when none
pub fn extension_lower(path: &str) -> String {
    let name = file_name_lower(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_string(),
        _ => String::new(),
    }
}

/// directory segments (file name excluded), lowercased
pub fn dir_segments_lower(path: &str) -> Vec<String> {
    let mut parts: Vec<String> = path
        .split('/')
        .filter(|p| !p.is_empty())
        .map(|p| p.to_lowercase())
        .collect();
    parts.pop();
    parts
}

pub fn is_test_path(path: &str) -> bool {
    let name = file_name_lower(path);
    dir_segments_lower(path)
        .iter()
        .any(|seg| TEST_DIRS.contains(&seg.as_str()))
        || name.contains(".test.")
        || name.contains(".spec.")
        || name.starts_with("test_")
        || name
            .rsplit_once('.')
            .map(|(stem, _)| stem.ends_with("_test") || stem.ends_with("_spec"))
            .unwrap_or(false)
}

pub fn is_docs_path(path: &str) -> bool {
    let name = file_name_lower(path);
    DOC_EXTENSIONS.contains(&extension_lower(path).as_str())
        || DOC_FILE_PREFIXES.iter().any(|p| name.starts_with(p))
        || dir_segments_lower(path)
            .iter()
            .any(|seg| DOC_DIRS.contains(&seg.as_str()))
}

pub fn is_ci_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    CI_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn is_dependency_path(path: &str) -> bool {
    DEPENDENCY_FILES.contains(&file_name_lower(path).as_str())
}

pub fn is_build_path(path: &str) -> bool {
    let name = file_name_lower(path);
    is_dependency_path(path) || BUILD_FILE_MARKERS.iter().any(|m| name.starts_with(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert!(is_test_path("src/__tests__/login.ts"));
        assert!(is_test_path("src/auth/login.test.ts"));
        assert!(is_test_path("pkg/parser_test.go"));
        assert!(is_test_path("tests/e2e.rs"));
        assert!(!is_test_path("src/latest.ts"));
        assert!(!is_test_path("src/contest/entry.rs"));
    }

    #[test]
    fn docs_ci_and_build_paths() {
        assert!(is_docs_path("README.md"));
        assert!(is_docs_path("docs/setup/index.html"));
        assert!(!is_docs_path("src/doctor.rs"));
        assert!(is_ci_path(".github/workflows/ci.yml"));
        assert!(is_build_path("Dockerfile"));
        assert!(is_build_path("frontend/package.json"));
        assert!(is_dependency_path("Cargo.lock"));
        assert!(!is_dependency_path("src/package.rs"));
    }

    #[test]
    fn signature_patterns() {
        assert!(NEW_SIGNATURE.is_match("+export async function login(user) {"));
        assert!(NEW_SIGNATURE.is_match("+    pub fn parse(&self) -> Result<()> {"));
        assert!(NEW_SIGNATURE.is_match("+class Session:"));
        assert!(NEW_SIGNATURE.is_match("+    pub(crate) struct Token {"));
        assert!(!NEW_SIGNATURE.is_match("+    let definitely = 3;"));
        assert!(!NEW_SIGNATURE.is_match("-fn removed() {}"));
        assert!(NEW_ARROW_FN.is_match("+export const handler = async (req, res) => {"));
        assert!(REMOVED_EXPORT.is_match("-export function legacy() {}"));
        assert!(REMOVED_EXPORT.is_match("-pub fn old_api() {}"));
    }

    #[test]
    fn path_helpers() {
        assert_eq!(extension_lower("src/App.TSX"), "tsx");
        assert_eq!(extension_lower(".gitignore"), "");
        assert_eq!(dir_segments_lower("src/Auth/login.ts"), vec!["src", "auth"]);
    }
}
