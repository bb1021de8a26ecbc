use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use trials_cli::api_client::{TrialService, TrialsApiClient};
use trials_cli::chat_session::ChatSession;
use trials_cli::config::Config;
use trials_cli::connection_monitor::ConnectionMonitor;
use trials_cli::logging;
use trials_cli::models::{Message, Role, Trial};
use trials_cli::search_manager::{FilterField, SearchManager, DEFAULT_PAGE_SIZE};

const HELP: &str = "\
Commands:
  :search <query>        search the trial catalog
  :more                  fetch the next page of results
  :filter <name> <value> set a filter (phase, gender, healthy_volunteers, status)
  :filters               show current and available filters
  :reset-filters         clear all filters
  :new                   start a new conversation
  :load <id>             load a stored conversation
  :health                force a connectivity check
  :help                  show this help
  :quit                  exit
Anything else is sent to the assistant as a chat message.";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init_tracing(&config.logging.level);

    let client = Arc::new(TrialsApiClient::from_config(&config)?);
    let service: Arc<dyn TrialService> = client;
    let monitor = Arc::new(ConnectionMonitor::new(service.clone()));

    let connected = monitor.check_connection(false).await;
    monitor.start(Duration::from_secs(config.service.health_poll_secs));

    let chat = ChatSession::new(service.clone(), monitor.clone());
    let search = Arc::new(SearchManager::new(service, monitor.clone()));

    if connected {
        search.load_filter_options().await;
        println!("Connected to {}", config.service.base_url);
    } else {
        println!(
            "Warning: {} is not reachable; chat and search are disabled until it is.",
            config.service.base_url
        );
    }
    println!("Type :help for commands.");

    // Filter options need a reachable service; if the first fetch never
    // happened (or failed), retry whenever connectivity is back. This is what
    // picks the options up after the periodic poll reconnects.
    let backfill = {
        let monitor = monitor.clone();
        let search = search.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                ticker.tick().await;
                if monitor.is_connected() && !search.filter_options_loaded() {
                    search.load_filter_options().await;
                }
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            [":quit"] | [":q"] => break,
            [":help"] => println!("{HELP}"),
            [":health"] => {
                let connected = monitor.check_health().await;
                let state = monitor.state();
                println!(
                    "connected: {connected}{}",
                    state
                        .last_error
                        .map(|e| format!(" (last error: {e})"))
                        .unwrap_or_default()
                );
                // First time the service comes back, pick up the filter sets
                // right away instead of waiting on the backfill task.
                if connected && !search.filter_options_loaded() {
                    search.load_filter_options().await;
                }
            }
            [":new"] => {
                chat.start_new_conversation();
                println!("Started a new conversation.");
            }
            [":load", id] => {
                chat.load_conversation(id).await;
                match chat.error() {
                    Some(error) => println!("Could not load conversation: {error}"),
                    None => print_transcript(&chat.messages()),
                }
            }
            [":more"] => {
                search.load_more().await;
                report_search(&search);
            }
            [":reset-filters"] => {
                search.reset_filters();
                println!("Filters cleared.");
            }
            [":filters"] => {
                let filters = search.filters();
                let available = search.available_filters();
                println!("phase:              '{}' of {:?}", filters.phase, available.phases);
                println!("status:             '{}' of {:?}", filters.status, available.statuses);
                println!("gender:             '{}' of {:?}", filters.gender, available.genders);
                println!(
                    "healthy_volunteers: '{}' of {:?}",
                    filters.healthy_volunteers, available.healthy_volunteers
                );
            }
            [":filter", name, value @ ..] if !value.is_empty() => {
                match FilterField::from_name(name) {
                    Some(field) => {
                        search.update_filter(field, &value.join(" "));
                        println!("Set {name}. Re-run :search to apply.");
                    }
                    None => println!("Unknown filter '{name}'."),
                }
            }
            parts if parts[0] == ":search" => {
                let query = line.strip_prefix(":search").unwrap_or_default().trim();
                if query.is_empty() {
                    println!("Missing query. Usage: :search <query>");
                } else {
                    search.search(Some(query), 1, DEFAULT_PAGE_SIZE).await;
                    report_search(&search);
                }
            }
            parts if parts[0].starts_with(':') => {
                println!("Unknown command '{}'. Type :help.", parts[0]);
            }
            _ => match chat.send_message(line).await {
                Some(reply) => print_reply(&reply),
                None => match chat.error() {
                    Some(error) => println!("The assistant could not answer: {error}"),
                    None => println!("Message not sent (empty input or not connected)."),
                },
            },
        }
    }

    backfill.abort();
    monitor.shutdown();
    Ok(())
}

fn report_search(search: &SearchManager) {
    if let Some(error) = search.error() {
        println!("Search failed: {error}");
        return;
    }
    let results = search.results();
    println!(
        "{} of {} result(s), page {}{}",
        results.len(),
        search.total_results(),
        search.page(),
        if search.has_more() {
            " (:more for the next page)"
        } else {
            ""
        }
    );
    for trial in &results {
        print_trial(trial);
    }
}

fn print_trial(trial: &Trial) {
    println!(
        "  [{}] {} ({})",
        trial.nct_id,
        trial.title,
        trial.phase.as_deref().unwrap_or("phase n/a"),
    );
    if let Some(url) = &trial.source_url {
        println!("        {url}");
    }
}

fn print_reply(reply: &Message) {
    println!("{}", reply.content);
    if let Some(evidence) = &reply.evidence {
        println!("Evidence:");
        for item in evidence {
            println!(
                "  - {} ({}){}",
                item.title,
                item.source_url,
                item.nct_id
                    .as_ref()
                    .map(|id| format!(" [{id}]"))
                    .unwrap_or_default()
            );
        }
    }
}

fn print_transcript(messages: &[Message]) {
    for message in messages {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("{speaker}: {}", message.content);
    }
}
