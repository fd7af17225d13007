// deterministic commit subjects used when generation is off or fails

use super::patterns::{extension_lower, file_name_lower};
use crate::utils::stable_index;

/// templates may name the file with `{file}`; otherwise it is appended
type Rule = (&'static str, &'static [&'static str]);

/// matched against the lowercase file name, exact or substring
const FILENAME_RULES: &[Rule] = &[
    ("package.json", &["Update dependencies", "Update package manifest"]),
    ("cargo.toml", &["Update crate manifest", "Update dependencies"]),
    ("lock", &["Refresh lockfile"]),
    ("readme", &["Update readme", "Refresh project docs"]),
    ("changelog", &["Update changelog"]),
    ("dockerfile", &["Update container build"]),
    ("docker-compose", &["Update compose services"]),
    ("makefile", &["Update build targets"]),
    (".gitignore", &["Update ignore rules"]),
    (".env.example", &["Update example environment"]),
    ("tsconfig", &["Update typescript config"]),
    ("eslint", &["Update lint rules"]),
    ("prettier", &["Update formatting rules"]),
    ("license", &["Update license"]),
];

/// matched against lowercase directory segments
const SEGMENT_RULES: &[Rule] = &[
    ("components", &["Update component", "Refine component"]),
    ("hooks", &["Update hook"]),
    ("pages", &["Update page"]),
    ("routes", &["Update route handling"]),
    ("api", &["Update API handler", "Refine API logic"]),
    ("services", &["Update service logic"]),
    ("models", &["Update data model"]),
    ("utils", &["Update utilities"]),
    ("styles", &["Update styles"]),
    ("tests", &["Update tests"]),
    ("__tests__", &["Update tests"]),
    ("docs", &["Update documentation"]),
    (".github", &["Update CI workflow"]),
    ("migrations", &["Add database migration"]),
    ("config", &["Update configuration"]),
];

/// matched against the lowercase extension
const EXTENSION_RULES: &[Rule] = &[
    ("md", &["Update docs in {file}", "Edit {file}"]),
    ("css", &["Adjust styles"]),
    ("scss", &["Adjust styles"]),
    ("json", &["Update {file}"]),
    ("yml", &["Update {file} settings"]),
    ("yaml", &["Update {file} settings"]),
    ("toml", &["Update {file} settings"]),
    ("sql", &["Update SQL"]),
    ("sh", &["Update script"]),
    ("html", &["Update markup"]),
    ("svg", &["Update graphic"]),
];

const GENERIC_POOL: &[&str] = &[
    "Update {file}",
    "Refine {file}",
    "Tweak {file}",
    "Adjust {file}",
    "Improve {file}",
];

fn find_rule<'a>(rules: &'a [Rule], mut matches: impl FnMut(&str) -> bool) -> Option<&'a [&'static str]> {
    rules
        .iter()
        .find(|(key, _)| matches(key))
        .map(|(_, templates)| *templates)
}

/// pick the template pool for a path: file name, then directory, then
/// extension, then the generic pool
fn pool_for(path: &str) -> &'static [&'static str] {
    let name = file_name_lower(path);
    let dirs: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect();
    let dirs = &dirs[..dirs.len().saturating_sub(1)];
    let ext = extension_lower(path);

    find_rule(FILENAME_RULES, |key| name == key || name.contains(key))
        .or_else(|| find_rule(SEGMENT_RULES, |key| dirs.iter().any(|d| d == key)))
        .or_else(|| find_rule(EXTENSION_RULES, |key| ext == key))
        .unwrap_or(GENERIC_POOL)
}

/// fallback subject for `path` (slash-separated, repository-relative)
///
/// the same path always yields the same subject. the result always
/// mentions the file's base name.
pub fn fallback_subject(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    let pool = pool_for(path);
    let template = pool[stable_index(path, pool.len())];

    if template.contains("{file}") {
        template.replace("{file}", base)
    } else if template.to_lowercase().contains(&base.to_lowercase()) {
        template.to_string()
    } else {
        format!("{template} in {base}")
    }
}
