mod agents;
mod api;
mod config;
mod credential;
mod error;
mod knowledge;
mod llm_client;
mod orchestrator;
#[cfg(test)]
mod stub_http;

use std::io::{self, Write};

use anyhow::Context;
use api::{ChatRequest, ErrorResponse, HealthResponse};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::AppConfig;
use credential::EnvCredentialProvider;
use orchestrator::{Orchestrator, RouteLabel};
use serde::Serialize;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "foundry-router",
    version,
    about = "Route questions to knowledge-base grounded HR, marketing, and products specialists"
)]
struct Cli {
    /// Optional one-shot question; if omitted the CLI enters interactive mode.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Send the question straight to one specialist (hr, marketing, products) instead of routing.
    #[arg(short, long)]
    agent: Option<String>,

    /// Session identifier attached to requests for log correlation.
    #[arg(long)]
    session_id: Option<String>,

    /// Print responses as JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report service status and version.
    Health,
    /// List the router and the specialist agents.
    Agents,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => {
            let health = HealthResponse::healthy();
            if cli.json {
                print_json(&health)?;
            } else {
                println!("status: {} (version {})", health.status, health.version);
            }
            return Ok(());
        }
        Some(Commands::Agents) => {
            let catalog = api::agent_catalog();
            if cli.json {
                print_json(&catalog)?;
            } else {
                for agent in &catalog.agents {
                    println!("{:<16} {:<16} {}", agent.id, agent.name, agent.description);
                }
            }
            return Ok(());
        }
        None => {}
    }

    let config = AppConfig::from_env().context("Configuration incomplete")?;
    let credentials = EnvCredentialProvider::new(config.http_timeout());
    let orchestrator = Orchestrator::start(&config, &credentials)
        .context("Failed to start orchestrator")?;

    let outcome = match cli.prompt {
        Some(prompt) => {
            let request = ChatRequest {
                message: prompt,
                session_id: cli.session_id,
                agent: cli.agent,
            };
            run_single(&orchestrator, request, cli.json).await
        }
        None => run_repl(&orchestrator, cli.agent, cli.session_id).await,
    };

    orchestrator.stop();
    outcome
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to encode JSON output")?;
    println!("{rendered}");
    Ok(())
}

async fn run_single(
    orchestrator: &Orchestrator,
    request: ChatRequest,
    json: bool,
) -> anyhow::Result<()> {
    match api::chat(orchestrator, request).await {
        Ok(response) if json => print_json(&response),
        Ok(response) => {
            println!("\n[{}]\n{}\n", response.agent.to_uppercase(), response.message);
            if !response.sources.is_empty() {
                println!("Sources: {}", response.sources.join(", "));
            }
            Ok(())
        }
        Err(err) => {
            error!(kind = err.kind(), %err, "Chat request failed");
            if json {
                print_json(&ErrorResponse::from(&err))?;
            }
            Err(err).context("Chat request failed")
        }
    }
}

async fn run_repl(
    orchestrator: &Orchestrator,
    agent: Option<String>,
    session_id: Option<String>,
) -> anyhow::Result<()> {
    let session_id = session_id.unwrap_or_else(new_session_id);
    let roster = RouteLabel::ALL
        .into_iter()
        .filter_map(|label| {
            orchestrator
                .knowledge_base(label)
                .map(|kb| format!("{} ({kb})", label.display_name()))
        })
        .collect::<Vec<_>>()
        .join(", ");
    println!("Foundry router ready (session {session_id}).");
    println!("Specialists: {roster}");
    println!("Type 'quit' to exit.\n");
    let stdin = io::stdin();

    loop {
        print!("Question > ");
        io::stdout().flush()?;

        let mut buffer = String::new();
        if stdin.read_line(&mut buffer)? == 0 {
            break;
        }
        let trimmed = buffer.trim();

        if is_exit_command(trimmed) {
            info!("User exited CLI");
            break;
        }

        if trimmed.is_empty() {
            continue;
        }

        let request = ChatRequest {
            message: trimmed.to_owned(),
            session_id: Some(session_id.clone()),
            agent: agent.clone(),
        };

        match api::chat(orchestrator, request).await {
            Ok(response) => {
                println!("Routed to: {} agent", response.agent.to_uppercase());
                println!("\n{}\n", response.message);
                if !response.sources.is_empty() {
                    println!("Sources: {}", response.sources.join(", "));
                }
                println!("{}", "-".repeat(55));
            }
            Err(err) => {
                error!(kind = err.kind(), %err, "Chat request failed");
                println!("\nError: {err}\n");
            }
        }
    }

    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    ["quit", "exit", "q"]
        .iter()
        .any(|cmd| input.eq_ignore_ascii_case(cmd))
}

fn new_session_id() -> String {
    format!("cli-{}", Utc::now().timestamp_millis())
}
