// validation and message processing module

use super::composer::MessageStyle;
use super::intelligence::{ChangeAnalysis, MessageLength};
use crate::utils::truncate_with_ellipsis;
use lazy_static::lazy_static;
use regex::Regex;

/// hard ceiling on a finalized subject line
pub const MAX_SUBJECT_CHARS: usize = 72;

lazy_static! {
    static ref CONVENTIONAL_PREFIX: Regex = Regex::new(
        r"(?i)^(?:feat|fix|docs|style|refactor|perf|test|build|ci|chore|revert|security)(?:\([^()]*\))?!?:\s*"
    ).unwrap();

    /// `type[scope]:` as some models write it
    static ref BRACKET_SCOPE: Regex = Regex::new(r"^(\w+)\[([^\]]*)\](!?):").unwrap();

    static ref SHORTCODE: Regex = Regex::new(r"^:[a-z0-9_+\-]+:").unwrap();

    static ref LABEL_PREFIX: Regex = Regex::new(
        r"(?i)^(?:commit message|generated commit|subject|title)\s*:\s*"
    ).unwrap();
}

/// subject and body lines recovered from backend output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub subject: String,
    pub body: Vec<String>,
}

/// recover a commit message from raw generated text
///
/// the short tier keeps the first line only; the other tiers keep at most
/// `max_body_lines` non-empty body lines. returns None when nothing usable
/// is left after cleanup.
pub fn parse_generated(raw: &str, length: MessageLength) -> Option<ParsedMessage> {
    let mut lines = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("```"))
        .filter(|line| !is_meta_line(line))
        .map(clean_line)
        .filter(|line| !line.is_empty());

    let subject = lines.next()?;
    let body = lines.take(length.max_body_lines()).collect();

    Some(ParsedMessage { subject, body })
}

/// drop quote, emphasis, heading and bullet markup from one line
fn clean_line(line: &str) -> String {
    let line = line
        .trim()
        .trim_start_matches('#')
        .trim_start();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .unwrap_or(line);
    let line = LABEL_PREFIX.replace(line, "");

    line.trim()
        .trim_matches(|c: char| c == '"' || c == '`' || c == '*' || c == '\'')
        .replace("**", "")
        .replace('`', "")
        .trim()
        .to_string()
}

/// chatter some models put around the message
fn is_meta_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with("here is")
        || lower.starts_with("here's")
        || lower.starts_with("this commit")
        || lower.starts_with("the commit")
        || lower.starts_with("note:")
        || lower.starts_with("explanation:")
}

/// whether `subject` already carries a `type(scope):` prefix
pub fn has_conventional_prefix(subject: &str) -> bool {
    CONVENTIONAL_PREFIX.is_match(subject)
}

/// rough emoji classification covering pictographs, symbols and joiners
fn is_emoji_char(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF
            | 0x2190..=0x21FF
            | 0x2300..=0x23FF
            | 0x2600..=0x27BF
            | 0x2B00..=0x2BFF
            | 0x200D
            | 0x20E3
            | 0xFE0F
    )
}

/// split any leading emoji or `:shortcode:` markers off `text`
fn split_leading_emoji(text: &str) -> (&str, &str) {
    let mut rest = text.trim_start();
    loop {
        if let Some(c) = rest.chars().next() {
            if is_emoji_char(c) {
                rest = rest[c.len_utf8()..].trim_start();
                continue;
            }
        }
        if let Some(m) = SHORTCODE.find(rest) {
            rest = rest[m.end()..].trim_start();
            continue;
        }
        break;
    }

    let lead_len = text.len() - rest.len();
    (text[..lead_len].trim(), rest)
}

/// `text` without leading emoji or shortcodes
pub fn strip_leading_emoji(text: &str) -> String {
    split_leading_emoji(text).1.to_string()
}

/// `type(scope)` for the analysis under the style's scope preference
fn conventional_prefix(analysis: &ChangeAnalysis, style: &MessageStyle) -> String {
    match (&analysis.scope, style.include_scope) {
        (Some(scope), true) => format!("{}({scope})", analysis.change_type),
        _ => analysis.change_type.to_string(),
    }
}

/// lowercase the first letter unless the first word is an acronym
fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(first), second) if first.is_uppercase() && !second.is_some_and(char::is_uppercase) => {
            first.to_lowercase().collect::<String>() + &text[first.len_utf8()..]
        }
        _ => text.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// normalise a subject line for either message path
///
/// double quotes become single quotes, whitespace collapses, emoji follow
/// the style, the conventional prefix is added when missing and the result
/// never exceeds `MAX_SUBJECT_CHARS`. returns None when no text is left.
pub fn finalize_subject(subject: &str, analysis: &ChangeAnalysis, style: &MessageStyle) -> Option<String> {
    let text = collapse_whitespace(&subject.replace('"', "'"));
    let text = BRACKET_SCOPE.replace(&text, "$1($2)$3:").into_owned();

    let (lead, rest) = split_leading_emoji(&text);
    let rest = rest.trim_end_matches('.').trim();
    if rest.is_empty() {
        return None;
    }

    let body = if style.conventional_commits && !has_conventional_prefix(rest) {
        format!("{}: {}", conventional_prefix(analysis, style), lowercase_first(rest))
    } else {
        rest.to_string()
    };

    let finished = if style.use_emoji {
        let marker = if lead.is_empty() { analysis.change_type.emoji() } else { lead };
        format!("{marker} {body}")
    } else {
        body
    };

    Some(truncate_with_ellipsis(&finished, MAX_SUBJECT_CHARS))
}
