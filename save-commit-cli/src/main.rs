use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use save_commit_core::ai::CommitMessage;
use save_commit_core::config::{user_config_path, WORKSPACE_FILE_NAME};
use save_commit_core::{
    dotenv, style, user_attended, Config, ConfigLoader, NonInteractive, Overrides, Prompter, SaveCommitError,
    SaveEvent, SaveHandler, SaveOutcome, StateStore, TerminalPrompter, UndoMode,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// save-commit - commit (and optionally push) a file when it is saved
#[derive(Parser, Debug)]
#[command(name = "save-commit")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// workspace root (defaults to the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// "save and run": authorize and handle one save of FILE
    Run {
        file: PathBuf,

        /// show the command instead of running it
        #[arg(long)]
        dry_run: bool,

        /// never push, whatever the config says
        #[arg(long)]
        no_push: bool,

        /// answer yes to confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// read save events as json lines on stdin, write one outcome per line
    Serve {
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        no_push: bool,
    },
    /// reset the last auto-commit
    Undo {
        /// discard the changes instead of keeping them staged
        #[arg(long)]
        hard: bool,

        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// show commit counts and recent history
    Stats {
        /// print the raw state as json
        #[arg(long)]
        json: bool,
    },
    /// print the effective configuration
    Config {
        /// write a default `.save-commit.toml` into the workspace
        #[arg(long)]
        init: bool,

        /// with --init, write the user config file instead
        #[arg(long, requires = "init")]
        user: bool,
    },
}

/// terminal prompts for the api key, automatic yes for confirmations
struct AssumeYes(TerminalPrompter);

impl Prompter for AssumeYes {
    fn api_key(&self, env_var: &str) -> Option<String> {
        self.0.api_key(env_var)
    }

    fn confirm_commit(&self, _message: &CommitMessage) -> bool {
        true
    }

    fn confirm_undo(&self, _commit_hash: &str, _message: &str) -> bool {
        true
    }
}

fn prompter_for(yes: bool) -> Arc<dyn Prompter> {
    match (user_attended(), yes) {
        (true, false) => Arc::new(TerminalPrompter),
        (true, true) => Arc::new(AssumeYes(TerminalPrompter)),
        (false, yes) => Arc::new(NonInteractive { assume_yes: yes }),
    }
}

fn overrides(dry_run: bool, no_push: bool) -> Overrides {
    Overrides {
        dry_run: dry_run.then_some(true),
        auto_push: no_push.then_some(false),
    }
}

fn build_handler(workspace: &Path, overrides: Overrides, prompter: Arc<dyn Prompter>) -> Result<SaveHandler> {
    let state = StateStore::open_default().context("failed to locate the state file")?;
    Ok(SaveHandler::new(workspace, state)
        .with_overrides(overrides)
        .with_prompter(prompter)
        .with_progress(user_attended()))
}

fn print_outcome(outcome: &SaveOutcome) {
    let line = outcome.to_string();
    match outcome {
        SaveOutcome::Committed { .. } => println!("{}", style(format!("✅ {line}")).green().bold()),
        SaveOutcome::DryRun { command, message } => {
            println!("{}", style("dry run, nothing was executed").cyan());
            println!("{}", style(message).yellow());
            println!("{}", style(command).dim());
        }
        SaveOutcome::NothingToCommit | SaveOutcome::Ignored { .. } | SaveOutcome::Cancelled => {
            println!("{}", style(line).dim())
        }
        SaveOutcome::Skipped { .. } => println!("{}", style(line).yellow()),
        SaveOutcome::Failed { .. } => eprintln!("{}", style(format!("❌ {line}")).red().bold()),
    }
}

/// one json line from the host
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request {
    Trigger {
        path: PathBuf,
    },
    Save {
        path: PathBuf,
        #[serde(default)]
        text: Option<String>,
    },
    SaveAndRun {
        path: PathBuf,
        #[serde(default)]
        text: Option<String>,
    },
    Undo {
        #[serde(default)]
        hard: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum Reply {
    Triggered { path: PathBuf },
    Undone { hash: String },
    Error { error: String },
}

fn save_event(workspace: &Path, path: PathBuf, text: Option<String>) -> SaveEvent {
    SaveEvent {
        path: workspace.join(path),
        text,
    }
}

async fn handle_request(handler: &SaveHandler, workspace: &Path, line: &str) -> serde_json::Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return to_json(&Reply::Error { error: format!("invalid request: {e}") }),
    };

    match request {
        Request::Trigger { path } => {
            let path = workspace.join(path);
            handler.trigger(&path);
            to_json(&Reply::Triggered { path })
        }
        Request::Save { path, text } => to_json(&handler.on_save(save_event(workspace, path, text)).await),
        Request::SaveAndRun { path, text } => {
            to_json(&handler.save_and_run(save_event(workspace, path, text)).await)
        }
        Request::Undo { hard } => {
            let mode = if hard { UndoMode::Hard } else { UndoMode::Soft };
            match handler.undo(mode) {
                Ok(last) => to_json(&Reply::Undone { hash: last.commit_hash }),
                Err(e) => to_json(&Reply::Error { error: e.to_string() }),
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| serde_json::json!({ "outcome": "error", "error": e.to_string() }))
}

async fn serve(handler: SaveHandler, workspace: &Path) -> Result<()> {
    tracing::info!("serving save events for {}", workspace.display());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_request(&handler, workspace, &line).await;
        let mut encoded = serde_json::to_string(&reply)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

fn print_stats(state_store: &StateStore, json: bool) -> Result<()> {
    let state = state_store.load();
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let stats = &state.stats;
    println!("{}", style("save-commit stats").cyan().bold());
    println!("commits:  {}", stats.total_commits);
    println!("pushes:   {}", stats.total_pushes);
    println!("dry runs: {}", stats.dry_runs);
    for (reason, count) in &stats.skipped {
        println!("skipped ({reason}): {count}");
    }
    if let Some(at) = state.last_action_at {
        println!("last action: {}", at.to_rfc3339());
    }

    if !stats.history.is_empty() {
        println!("\n{}", style("recent commits").cyan().bold());
        for entry in stats.history.iter().rev().take(10) {
            let short = entry.hash.get(..7).unwrap_or(&entry.hash);
            let pushed = if entry.pushed { " (pushed)" } else { "" };
            println!("{} {} {}{}", style(short).yellow(), entry.subject, style(&entry.file).dim(), pushed);
        }
    }
    Ok(())
}

fn config_command(workspace: &Path, init: bool, user: bool) -> Result<()> {
    if init {
        let path = if user {
            user_config_path().context("no config directory on this platform")?
        } else {
            workspace.join(WORKSPACE_FILE_NAME)
        };
        Config::write_default(&path)?;
        println!("{} {}", style("wrote").green(), path.display());
        return Ok(());
    }

    let config = ConfigLoader::new(workspace).load()?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

async fn run(args: Args) -> Result<i32> {
    let workspace = match args.workspace {
        Some(path) => path,
        None => std::env::current_dir().context("failed to get current directory")?,
    };

    match args.command {
        Command::Run {
            file,
            dry_run,
            no_push,
            yes,
        } => {
            let handler = build_handler(&workspace, overrides(dry_run, no_push), prompter_for(yes))?;
            let outcome = handler.save_and_run(save_event(&workspace, file, None)).await;
            print_outcome(&outcome);
            Ok(if matches!(outcome, SaveOutcome::Failed { .. }) { 1 } else { 0 })
        }
        Command::Serve { dry_run, no_push } => {
            // stdout carries the protocol, so no prompts and no spinner
            let handler = build_handler(&workspace, overrides(dry_run, no_push), Arc::new(NonInteractive::yes()))?
                .with_progress(false);
            serve(handler, &workspace).await?;
            Ok(0)
        }
        Command::Undo { hard, yes } => {
            let handler = build_handler(&workspace, Overrides::default(), prompter_for(yes))?;
            let mode = if hard { UndoMode::Hard } else { UndoMode::Soft };
            match handler.undo(mode) {
                Ok(last) => {
                    let short = last.commit_hash.get(..7).unwrap_or(&last.commit_hash);
                    println!("{}", style(format!("↩️  undid {short} ({mode:?})")).green().bold());
                    Ok(0)
                }
                Err(SaveCommitError::Cancelled) => {
                    println!("{}", style("undo cancelled").dim());
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("{} {}", style("undo refused:").red().bold(), style(&e).red());
                    Ok(1)
                }
            }
        }
        Command::Stats { json } => {
            let store = StateStore::open_default().context("failed to locate the state file")?;
            print_stats(&store, json)?;
            Ok(0)
        }
        Command::Config { init, user } => {
            config_command(&workspace, init, user)?;
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!(
                "{} {} {}",
                style("❌"),
                style("save-commit failed:").red().bold(),
                style(format!("{e:#}")).red()
            );
            std::process::exit(1);
        }
    }
}
