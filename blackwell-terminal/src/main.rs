mod terminal_view;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blackwell_client::config::{BASE_URL_ENV, DEFAULT_BASE_URL};
use blackwell_client::{
    AnamnesisController, AnamnesisView, Attachment, ClientConfig, EvaluationController, FileSessionStore,
    HttpTransport, InMemorySessionStore, LoadOutcome, SessionStore, Transport,
    render_anamnesis_report, render_evaluation_report,
};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use terminal_view::TerminalView;

#[derive(Parser)]
#[command(
    name = "blackwell",
    version,
    about = "Anamnesis interview and clinical evaluation from the terminal"
)]
struct Cli {
    /// Base URL of the anamnesis backend
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL, global = true)]
    api_url: String,

    /// Persist session state to this JSON file instead of keeping it in memory
    #[arg(long, env = "BLACKWELL_STATE_FILE", global = true)]
    state_file: Option<PathBuf>,

    /// Directory rendered HTML pages are written to
    #[arg(long, default_value = ".", global = true)]
    out: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the anamnesis interview
    Chat,
    /// Show or generate the evaluation for the stored report
    Evaluate,
    /// Format a report file offline and print the HTML
    Render {
        #[arg(long, value_enum)]
        kind: RenderKind,
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RenderKind {
    Anamnesis,
    Evaluation,
}

/// A line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatCommand {
    Message(String),
    Attach(PathBuf),
    Reset,
    Evaluate,
    Quit,
    Unknown(String),
}

impl ChatCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return ChatCommand::Message(line.to_string());
        };

        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        match name {
            "attach" if !argument.is_empty() => ChatCommand::Attach(PathBuf::from(argument)),
            "reset" => ChatCommand::Reset,
            "evaluate" => ChatCommand::Evaluate,
            "quit" | "exit" => ChatCommand::Quit,
            _ => ChatCommand::Unknown(line.to_string()),
        }
    }
}

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blackwell_terminal=info,blackwell_client=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            // stdout carries the conversation
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_store(state_file: Option<&Path>) -> Result<Arc<dyn SessionStore>> {
    match state_file {
        Some(path) => {
            let store = FileSessionStore::open(path)
                .with_context(|| format!("opening session state {}", path.display()))?;
            info!("Using session state file {}", store.path().display());
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemorySessionStore::new())),
    }
}

fn connect(api_url: &str) -> Result<Arc<dyn Transport>> {
    let transport = HttpTransport::new(ClientConfig::new(api_url))
        .context("building HTTP client")?;
    info!("Using anamnesis backend at {}", transport.config().base_url);
    Ok(Arc::new(transport))
}

async fn run_chat(
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    out_dir: &Path,
) -> Result<()> {
    let view = TerminalView::new(std::io::stdout(), out_dir);
    let mut page = AnamnesisController::new(transport.clone(), store.clone(), view);
    page.initialize().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        page.view_mut().prompt();
        let Some(line) = lines.next_line().await.context("reading input")? else {
            break;
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Reset => {
                page.reset().await;
                page.view_mut().forget_transcript();
            }
            ChatCommand::Attach(path) => match Attachment::from_path(&path).await {
                Ok(file) => page.queue_files([file]),
                Err(e) => page.view_mut().show_error(&e.to_string()),
            },
            ChatCommand::Evaluate => {
                if page.request_evaluation().is_ok() && page.view_mut().take_navigation() {
                    run_evaluation(transport.clone(), store.clone(), out_dir).await;
                }
            }
            ChatCommand::Message(text) => {
                let outcome = page.send_turn(&text, Vec::new()).await;
                debug!("Turn outcome: {:?}", outcome);
            }
            ChatCommand::Unknown(text) => {
                println!("Unknown command {}. Use /attach <path>, /reset, /evaluate or /quit.", text);
            }
        }
    }

    Ok(())
}

async fn run_evaluation(
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    out_dir: &Path,
) -> LoadOutcome {
    let view = TerminalView::new(std::io::stdout(), out_dir);
    let mut page = EvaluationController::new(transport, store, view);
    let outcome = page.load().await;
    info!("Evaluation page finished: {:?}", outcome);
    outcome
}

async fn run_render(kind: RenderKind, file: &Path) -> Result<()> {
    let document = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let html = match kind {
        RenderKind::Anamnesis => render_anamnesis_report(&document),
        RenderKind::Evaluation => render_evaluation_report(&document),
    };
    println!("{}", html);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat => {
            let transport = connect(&cli.api_url)?;
            let store = open_store(cli.state_file.as_deref())?;
            run_chat(transport, store, &cli.out).await
        }
        Commands::Evaluate => {
            let transport = connect(&cli.api_url)?;
            let store = open_store(cli.state_file.as_deref())?;
            match run_evaluation(transport, store, &cli.out).await {
                LoadOutcome::Failed(message) => anyhow::bail!("evaluation failed: {}", message),
                _ => Ok(()),
            }
        }
        Commands::Render { kind, file } => run_render(kind, &file).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_chat_commands() {
        assert_eq!(
            ChatCommand::parse("  I feel dizzy "),
            ChatCommand::Message("I feel dizzy".to_string())
        );
        assert_eq!(
            ChatCommand::parse("/attach labs/blood panel.pdf"),
            ChatCommand::Attach(PathBuf::from("labs/blood panel.pdf"))
        );
        assert_eq!(ChatCommand::parse("/reset"), ChatCommand::Reset);
        assert_eq!(ChatCommand::parse("/evaluate"), ChatCommand::Evaluate);
        assert_eq!(ChatCommand::parse("/exit"), ChatCommand::Quit);
        assert!(matches!(ChatCommand::parse("/attach"), ChatCommand::Unknown(_)));
        assert!(matches!(ChatCommand::parse("/help"), ChatCommand::Unknown(_)));
    }

    #[test]
    fn cli_reads_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "blackwell",
            "render",
            "--kind",
            "evaluation",
            "report.md",
            "--out",
            "pages",
        ])
        .unwrap();
        assert_eq!(cli.out, PathBuf::from("pages"));
        assert!(matches!(
            cli.command,
            Commands::Render { kind: RenderKind::Evaluation, .. }
        ));
    }

    #[test]
    fn file_store_persists_between_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = open_store(Some(&path)).unwrap();
        store.set("blackwell-thread", "t-9").unwrap();
        drop(store);

        let reopened = open_store(Some(&path)).unwrap();
        assert_eq!(reopened.get("blackwell-thread").as_deref(), Some("t-9"));
    }

    #[tokio::test]
    async fn render_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = run_render(RenderKind::Anamnesis, &dir.path().join("missing.md"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.md"));
    }
}
