use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use bullpen::application::ports::{ChatTransport, KeyValueStore};
use bullpen::application::services::{
    ConnectionStatus, ConversationStore, ExchangeOutcome, RejectReason, StreamConsumer,
};
use bullpen::domain::{Message, MessageRole};
use bullpen::infrastructure::observability::{TracingConfig, init_tracing};
use bullpen::infrastructure::storage::{FileKeyValueStore, MemoryKeyValueStore};
use bullpen::infrastructure::transport::HttpChatTransport;
use bullpen::presentation::{Environment, Settings};

const HELP: &str = "Commands: /clear  /dismiss (remove error notices)  /retry (re-check connection)  /quit. Ctrl-C stops an answer, or quits at the prompt.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;
    init_tracing(
        &TracingConfig::from_settings(&settings.logging, environment.as_str()).for_terminal(),
    );

    let storage: Arc<dyn KeyValueStore> =
        match FileKeyValueStore::new(PathBuf::from(&settings.client.data_dir)) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "History directory unavailable, keeping history in memory");
                Arc::new(MemoryKeyValueStore::new())
            }
        };
    let store = ConversationStore::load(storage, settings.client.storage_key.clone());
    let transport = Arc::new(HttpChatTransport::new(&settings.client.relay_url));
    let consumer = StreamConsumer::new(
        transport,
        Arc::new(Mutex::new(store)),
        settings.client.history_window,
    );

    print_history(&lock_snapshot(&consumer));
    report_connection(consumer.check_health().await);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/retry" => report_connection(consumer.check_health().await),
            "/dismiss" => {
                let dismissed = consumer.dismiss_errors();
                println!("Dismissed {} error notice(s).", dismissed);
            }
            "/clear" => {
                if consumer.clear_history() {
                    println!("History cleared.");
                }
            }
            question => run_exchange(&consumer, question).await?,
        }
    }

    Ok(())
}

async fn run_exchange<T>(consumer: &StreamConsumer<T>, question: &str) -> anyhow::Result<()>
where
    T: ChatTransport,
{
    let mut snapshots = consumer
        .store()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .subscribe();
    let mut renderer = AnswerRenderer::default();
    let mut watching = true;

    let exchange = consumer.send(question);
    tokio::pin!(exchange);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut interrupted = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut exchange => break outcome,
            changed = snapshots.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                renderer.render(&snapshot, consumer.status())?;
            }
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                consumer.cancel();
            }
        }
    };

    let snapshot = snapshots.borrow().clone();
    renderer.render(&snapshot, None)?;
    println!();

    match outcome {
        Ok(ExchangeOutcome::Completed) | Ok(ExchangeOutcome::Closed) => {
            if let Some(message) = last_answer(&snapshot) {
                print_sources(message);
            }
        }
        Ok(ExchangeOutcome::Cancelled) => println!("[stopped]"),
        Ok(ExchangeOutcome::Rejected(RejectReason::Busy)) => {
            println!("[still answering the previous question]")
        }
        Ok(ExchangeOutcome::Rejected(RejectReason::EmptyQuestion)) => {}
        Err(e) => {
            tracing::debug!(error = %e, "Exchange failed");
            if let Some(notice) = snapshot.iter().rev().find(|m| m.is_error) {
                println!("! {}", notice.content);
            }
        }
    }

    Ok(())
}

/// Prints the growing answer as deltas; reprints it whole when the final
/// answer replaces the streamed text.
#[derive(Default)]
struct AnswerRenderer {
    printed: String,
    last_status: Option<String>,
}

impl AnswerRenderer {
    fn render(&mut self, snapshot: &[Message], status: Option<String>) -> std::io::Result<()> {
        let mut out = std::io::stdout();

        if status.is_some() && status != self.last_status && self.printed.is_empty() {
            if let Some(text) = &status {
                writeln!(out, "  ... {}", text)?;
            }
        }
        self.last_status = status;

        let Some(answer) = last_answer(snapshot) else {
            return Ok(());
        };
        if let Some(delta) = answer.content.strip_prefix(self.printed.as_str()) {
            write!(out, "{}", delta)?;
        } else {
            write!(out, "\n{}", answer.content)?;
        }
        self.printed = answer.content.clone();
        out.flush()
    }
}

fn last_answer(snapshot: &[Message]) -> Option<&Message> {
    snapshot
        .last()
        .filter(|m| m.role == MessageRole::Assistant && !m.is_error)
}

fn lock_snapshot<T>(consumer: &StreamConsumer<T>) -> Vec<Message>
where
    T: ChatTransport,
{
    consumer
        .store()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .messages()
        .to_vec()
}

fn print_history(messages: &[Message]) {
    for message in messages {
        match (message.role, message.is_error) {
            (_, true) => println!("! {}", message.content),
            (MessageRole::User, _) => println!("> {}", message.content),
            (MessageRole::Assistant, _) => println!("{}\n", message.content),
        }
    }
}

fn print_sources(message: &Message) {
    let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) else {
        return;
    };
    println!("Sources:");
    for source in sources {
        println!("  - {} ({:.0}%)", source.title, source.score * 100.0);
    }
}

fn report_connection(status: ConnectionStatus) {
    match status {
        ConnectionStatus::Connected => println!("Connected."),
        ConnectionStatus::Disconnected => {
            println!("Disconnected: the relay is not answering. Type /retry to check again.")
        }
    }
}
