// prompt construction module - builds prompts for ai interaction

use super::composer::MessageStyle;
use super::intelligence::{ChangeAnalysis, Complexity, MessageLength};

/// system prompt parameterised by length tier and style preferences
pub fn build_system_prompt(analysis: &ChangeAnalysis, style: &MessageStyle) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "you are a developer writing git commit messages. reply with the commit message only, \
         no commentary, no quotes, no markdown.\n",
    );

    match analysis.suggested_length {
        MessageLength::Short => {
            prompt.push_str(&format!(
                "write a single line of at most {} characters. no body.\n",
                MessageLength::Short.target_subject_chars()
            ));
        }
        MessageLength::Medium => {
            prompt.push_str(&format!(
                "write a subject line of at most 72 characters, then a blank line, then up to {} short bullet lines describing the key changes.\n",
                MessageLength::Medium.max_body_lines()
            ));
        }
        MessageLength::Detailed => {
            prompt.push_str(&format!(
                "write a subject line of at most 72 characters, then a blank line, then up to {} bullet lines explaining what changed and why.\n",
                MessageLength::Detailed.max_body_lines()
            ));
        }
    }

    prompt.push_str("use the imperative mood (\"add\", not \"added\") and no trailing period.\n");

    if style.conventional_commits {
        if style.include_scope {
            prompt.push_str("format the subject as a conventional commit: <type>(<scope>): <description>.\n");
        } else {
            prompt.push_str("format the subject as a conventional commit: <type>: <description>. do not add a scope.\n");
        }
        prompt.push_str(
            "allowed types: feat, fix, refactor, docs, style, test, chore, perf, build, ci, security.\n",
        );
    } else {
        prompt.push_str("do not use a type prefix; start with a capitalised verb.\n");
    }

    if style.use_emoji {
        prompt.push_str("start the subject with one fitting emoji.\n");
    } else {
        prompt.push_str("do not use emoji.\n");
    }

    prompt.push_str(&format!("detected change type: {}\n", analysis.change_type));
    if style.include_scope {
        if let Some(scope) = &analysis.scope {
            prompt.push_str(&format!("suggested scope: {scope}\n"));
        }
    }
    if analysis.is_breaking_change {
        prompt.push_str("this change looks breaking; say so in the body.\n");
    }

    prompt
}

/// user prompt carrying the change evidence
pub fn build_user_prompt(analysis: &ChangeAnalysis, diff: &str, file_path: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("saved file: {file_path}\n"));
    prompt.push_str(&format!(
        "change size: +{} -{} across {} file{} ({})\n",
        analysis.lines_added,
        analysis.lines_removed,
        analysis.files_changed,
        if analysis.files_changed == 1 { "" } else { "s" },
        describe_complexity(analysis.complexity)
    ));
    if analysis.has_dependency_changes {
        prompt.push_str("dependency manifests changed\n");
    }

    prompt.push_str("\nchanges:\n");
    prompt.push_str(diff.trim_end());
    prompt.push_str("\n\nwrite the commit message now.\n");

    prompt
}

fn describe_complexity(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::Trivial => "trivial",
        Complexity::Simple => "simple",
        Complexity::Moderate => "moderate",
        Complexity::Complex => "complex",
        Complexity::Major => "major",
    }
}
