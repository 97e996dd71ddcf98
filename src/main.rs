//! Interactive terminal front end: one line in, one answer out.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use hybrid_assistant::agent_core::TurnRole;
use hybrid_assistant::config::{find_config_path, load_config};
use hybrid_assistant::{build_orchestrator, init_tracing};

/// Conversational assistant over indexed documents and user-data tools.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Session to continue; a fresh id is generated when omitted
    #[arg(long)]
    session: Option<String>,

    /// Config file (defaults to config/assistant.yaml found upward from cwd)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => find_config_path(&std::env::current_dir()?)?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let log_path = init_tracing(&config.logging)?;
    tracing::info!(config = %config_path.display(), "config loaded");

    let orchestrator = build_orchestrator(&config)
        .await
        .context("failed to start assistant")?;

    let session_id = args
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    println!("session {session_id} (logs: {})", log_path.display());
    println!("commands: /history, /sessions, /quit");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "/quit" | "/exit" => break,
            "/history" => {
                for turn in orchestrator.history(&session_id)? {
                    let who = match turn.role {
                        TurnRole::User => "you",
                        TurnRole::Assistant => "assistant",
                    };
                    println!("{who}: {}", turn.content);
                }
            }
            "/sessions" => {
                for id in orchestrator.session_ids()? {
                    println!("{id}");
                }
            }
            _ => match orchestrator.process_turn(&session_id, input).await {
                Ok(answer) => println!("{answer}"),
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }

    tracing::info!(session_id = %session_id, "session closed");
    Ok(())
}
