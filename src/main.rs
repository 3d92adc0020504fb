use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deckgate::cli::{Cli, Command};
use deckgate::client::ProjectsClient;
use deckgate::config::DeckgateConfig;
use deckgate::gate::StatusGate;
use deckgate::poller::{PollDecision, Poller};
use deckgate::project::ReviewQuestion;
use deckgate::server::{self, AppState};
use deckgate::store::JsonFileStore;
use deckgate::webhook::WebhookClient;
use deckgate::wire::UpdateRequest;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = DeckgateConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            serve(config, &bind).await
        }
        Command::Watch {
            project_id,
            user,
            base_url,
            interval_secs,
            max_attempts,
        } => {
            let base_url = base_url.unwrap_or_else(|| config.poller.base_url.clone());
            let interval =
                Duration::from_secs(interval_secs.unwrap_or(config.poller.interval_secs));
            let client = ProjectsClient::new(base_url, user)?;
            let poller = Poller::new(client, interval, config.poller.completed_statuses.clone())
                .with_max_attempts(max_attempts);

            match poller.run(&project_id).await? {
                PollDecision::AnswerQuestions(questions) => {
                    println!("{} question(s) need an answer:", questions.len());
                    for q in questions {
                        let marker = if q.required() { " (required)" } else { "" };
                        println!("  [{}] {}{marker}", q.id, q.label);
                        let options = q.options();
                        if !options.is_empty() {
                            println!("      options: {}", options.join(", "));
                        }
                    }
                }
                PollDecision::Completed { download_url } => match download_url {
                    Some(url) => println!("Project complete: {url}"),
                    None => println!("Project complete"),
                },
                PollDecision::KeepPolling => {}
            }
            Ok(())
        }
        Command::Update {
            project_id,
            user,
            status,
            answers,
            base_url,
        } => {
            let review_and_refine = match answers {
                Some(path) => {
                    let contents = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    Some(
                        serde_json::from_str::<Vec<ReviewQuestion>>(&contents)
                            .with_context(|| format!("invalid answers in {}", path.display()))?,
                    )
                }
                None => None,
            };
            let base_url = base_url.unwrap_or_else(|| config.poller.base_url.clone());
            let client = ProjectsClient::new(base_url, user)?;
            let response = client
                .submit(
                    &project_id,
                    &UpdateRequest {
                        review_and_refine,
                        status,
                    },
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

async fn serve(config: DeckgateConfig, bind: &str) -> Result<()> {
    let path = &config.store_path;
    let store = JsonFileStore::open(path)
        .await
        .with_context(|| format!("failed to open store at {}", path.display()))?;
    info!(path = %path.display(), records = store.len().await, "record store opened");
    let forwarder = WebhookClient::with_timeout(Duration::from_secs(config.webhook_timeout_secs))?;
    let gate = StatusGate::new(config.gate, Arc::new(store), Arc::new(forwarder));

    server::serve(bind, Arc::new(AppState { gate })).await
}
