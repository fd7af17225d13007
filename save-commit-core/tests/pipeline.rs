mod common;

use common::{git, Sandbox, TestRepo, TEMPLATE_ONLY};
use save_commit_core::ai::MessageOrigin;
use save_commit_core::{GuardVerdict, NonInteractive, SaveCommitError, SaveEvent, SaveOutcome, SkipReason, UndoMode};
use std::sync::Arc;

#[tokio::test]
async fn dry_run_reports_the_command_and_leaves_head_alone() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(&format!("{TEMPLATE_ONLY}\n[policy]\ndry_run = true\n"));
    let handler = sandbox.handler(&repo);
    let before = repo.head();

    let file = repo.write("src/lib.rs", "pub fn one() -> u32 {\n    2\n}\n");
    let outcome = handler.save_and_run(SaveEvent::new(&file)).await;

    match outcome {
        SaveOutcome::DryRun { command, message } => {
            assert!(command.starts_with(&format!("cd \"{}\" && git add -A && git commit -m \"", repo.root.display())));
            assert!(!command.contains("git push"));
            assert!(!message.is_empty());
        }
        other => panic!("expected dry run, got {other:?}"),
    }
    assert_eq!(repo.head(), before);
    assert_eq!(sandbox.state().load().stats.dry_runs, 1);
}

#[tokio::test]
async fn save_creates_a_commit_and_records_it() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(TEMPLATE_ONLY);
    let handler = sandbox.handler(&repo);

    let file = repo.write("src/lib.rs", "pub fn one() -> u32 {\n    1\n}\n\npub fn two() -> u32 {\n    2\n}\n");
    let outcome = handler.save_and_run(SaveEvent::new(&file)).await;

    let (hash, message) = match outcome {
        SaveOutcome::Committed {
            hash,
            message,
            origin,
            pushed,
            ..
        } => {
            assert_eq!(origin, MessageOrigin::Template);
            assert!(!pushed);
            (hash, message)
        }
        other => panic!("expected a commit, got {other:?}"),
    };

    assert_eq!(repo.head(), hash);
    assert_eq!(repo.last_subject(), message.lines().next().unwrap());
    assert!(message.lines().next().unwrap().chars().count() <= 72);

    let state = sandbox.state().load();
    let last = state.last_commit.expect("last commit recorded");
    assert_eq!(last.commit_hash, hash);
    assert_eq!(last.repo_root, repo.root);
    assert_eq!(state.stats.total_commits, 1);
    assert_eq!(state.stats.history[0].file, "src/lib.rs");
}

#[tokio::test]
async fn token_fires_once() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(TEMPLATE_ONLY);
    let handler = sandbox.handler(&repo);

    let file = repo.write("notes.txt", "first\n");
    handler.trigger(&file);
    assert!(matches!(handler.on_save(SaveEvent::new(&file)).await, SaveOutcome::Committed { .. }));

    repo.write("notes.txt", "second\n");
    assert_eq!(
        handler.on_save(SaveEvent::new(&file)).await,
        SaveOutcome::Ignored {
            verdict: GuardVerdict::NoToken
        }
    );
    assert_eq!(sandbox.state().load().stats.total_commits, 1);
}

#[tokio::test]
async fn clean_tree_is_a_successful_no_op() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(TEMPLATE_ONLY);
    let before = repo.head();

    let outcome = sandbox
        .handler(&repo)
        .save_and_run(SaveEvent::new(repo.root.join("src/lib.rs")))
        .await;

    assert_eq!(outcome, SaveOutcome::NothingToCommit);
    assert_eq!(repo.head(), before);
}

#[tokio::test]
async fn sensitive_and_ignored_files_are_skipped() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(TEMPLATE_ONLY);
    let handler = sandbox.handler(&repo);
    let before = repo.head();

    let env = repo.write(".env", "TOKEN=abc\n");
    assert!(matches!(
        handler.save_and_run(SaveEvent::new(&env)).await,
        SaveOutcome::Skipped {
            reason: SkipReason::Sensitive,
            ..
        }
    ));

    let log = repo.write("debug.log", "noise\n");
    assert!(matches!(
        handler.save_and_run(SaveEvent::new(&log)).await,
        SaveOutcome::Skipped {
            reason: SkipReason::Ignored,
            ..
        }
    ));

    assert_eq!(repo.head(), before);
    let skipped = sandbox.state().load().stats.skipped;
    assert_eq!(skipped.get("sensitive"), Some(&1));
    assert_eq!(skipped.get("ignored"), Some(&1));
}

#[tokio::test]
async fn protected_branch_commits_without_pushing() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(&format!("{TEMPLATE_ONLY}\n[policy]\nauto_push = true\n"));

    let file = repo.write("src/lib.rs", "pub fn one() -> u32 {\n    3\n}\n");
    match sandbox.handler(&repo).save_and_run(SaveEvent::new(&file)).await {
        SaveOutcome::Committed {
            pushed,
            push_suppressed,
            ..
        } => {
            assert!(!pushed);
            assert!(push_suppressed);
        }
        other => panic!("expected a commit, got {other:?}"),
    }
}

#[tokio::test]
async fn undo_soft_resets_the_auto_commit() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(TEMPLATE_ONLY);
    let handler = sandbox.handler(&repo).with_prompter(Arc::new(NonInteractive::yes()));
    let before = repo.head();

    let file = repo.write("src/lib.rs", "pub fn one() -> u32 {\n    4\n}\n");
    assert!(matches!(handler.save_and_run(SaveEvent::new(&file)).await, SaveOutcome::Committed { .. }));

    let undone = handler.undo(UndoMode::Soft).unwrap();
    assert_ne!(undone.commit_hash, before);
    assert_eq!(repo.head(), before);
    // soft reset keeps the change staged
    assert_eq!(repo.staged_names(), "src/lib.rs");
    assert!(sandbox.state().load().last_commit.is_none());
}

#[tokio::test]
async fn undo_is_refused_after_head_moves() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(TEMPLATE_ONLY);
    let handler = sandbox.handler(&repo).with_prompter(Arc::new(NonInteractive::yes()));

    let file = repo.write("src/lib.rs", "pub fn one() -> u32 {\n    5\n}\n");
    assert!(matches!(handler.save_and_run(SaveEvent::new(&file)).await, SaveOutcome::Committed { .. }));

    repo.write("manual.txt", "by hand\n");
    git(&repo.root, &["add", "manual.txt"]);
    git(&repo.root, &["commit", "-q", "-m", "manual commit"]);
    let manual = repo.head();

    let err = handler.undo(UndoMode::Soft).unwrap_err();
    assert!(matches!(err, SaveCommitError::HeadMoved { ref actual, .. } if *actual == manual));
    assert_eq!(repo.head(), manual);
    assert!(sandbox.state().load().last_commit.is_some());
}

#[tokio::test]
async fn declined_undo_changes_nothing() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(TEMPLATE_ONLY);
    let handler = sandbox.handler(&repo);

    let file = repo.write("src/lib.rs", "pub fn one() -> u32 {\n    6\n}\n");
    assert!(matches!(handler.save_and_run(SaveEvent::new(&file)).await, SaveOutcome::Committed { .. }));
    let committed = repo.head();

    // the default prompter answers no
    assert!(matches!(handler.undo(UndoMode::Hard), Err(SaveCommitError::Cancelled)));
    assert_eq!(repo.head(), committed);
}

#[tokio::test]
async fn declined_confirmation_cancels_the_commit() {
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(&format!("{TEMPLATE_ONLY}\n[policy]\nconfirm_before_commit = true\n"));
    let before = repo.head();

    let file = repo.write("src/lib.rs", "pub fn one() -> u32 {\n    7\n}\n");
    let outcome = sandbox.handler(&repo).save_and_run(SaveEvent::new(&file)).await;

    assert_eq!(outcome, SaveOutcome::Cancelled);
    assert_eq!(repo.head(), before);
}
