//! An interactive terminal client for the conversation service.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use haven_core::{
    Role, SendCoordinator, SendError, SendOutcome, SessionStore,
    SessionStoreBuilder,
};
use haven_http_remote::{HttpBackend, HttpConfigBuilder};
use haven_remote::ChatBackend;
use haven_test_remote::TestBackend;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if env::var("HAVEN_MOCK").is_ok_and(|v| v == "1") {
        let store = SessionStoreBuilder::with_backend(TestBackend::seeded())
            .title_word_limit(4)
            .build();
        run(store).await;
        return;
    }

    let base_url = env::var("HAVEN_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_owned());
    let config = HttpConfigBuilder::new()
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(60))
        .build();
    let backend = HttpBackend::new(config);

    if let Err(err) = backend.health().await {
        eprintln!("conversation service is unreachable: {err}");
        eprintln!("set HAVEN_MOCK=1 to use the built-in demo service");
        return;
    }

    let store = SessionStoreBuilder::with_backend(backend).build();
    run(store).await;
}

async fn run<B: ChatBackend + 'static>(store: SessionStore<B>) {
    let coordinator = SendCoordinator::new(store.clone());

    if let Err(err) = store.bootstrap().await {
        warn!("failed to load conversations: {err}");
        store.create_session();
    }
    print_transcript(&store);

    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix(':') {
            if !handle_command(&store, command).await {
                break;
            }
        } else {
            send(&store, &coordinator, line).await;
        }
    }
}

/// Returns `false` when the user asked to quit.
async fn handle_command<B: ChatBackend + 'static>(
    store: &SessionStore<B>,
    command: &str,
) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("new") => {
            store.create_session();
            print_transcript(store);
        }
        Some("list") => print_sessions(store),
        Some("open") => match parse_index(store, parts.next()) {
            Some(id) => match store.select_session(&id).await {
                Ok(()) => print_transcript(store),
                Err(err) => eprintln!("{}", err.to_string().red()),
            },
            None => eprintln!("usage: :open <number from :list>"),
        },
        Some("delete") => match parse_index(store, parts.next()) {
            Some(id) => match store.delete_session(&id).await {
                Ok(()) => print_transcript(store),
                Err(err) => eprintln!("{}", err.to_string().red()),
            },
            None => eprintln!("usage: :delete <number from :list>"),
        },
        Some("help") => print_help(),
        Some("q") | Some("quit") => return false,
        _ => eprintln!("unknown command, try :help"),
    }
    true
}

async fn send<B: ChatBackend + 'static>(
    store: &SessionStore<B>,
    coordinator: &SendCoordinator<B>,
    text: &str,
) {
    let Some(session_id) = store.active_session_id() else {
        return;
    };

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(
        ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    progress_bar.set_message("assistant is typing...");

    let result = coordinator.send_message(&session_id, text).await;
    progress_bar.finish_and_clear();

    match result {
        Ok(SendOutcome::Delivered) => {
            let transcript = store.active_transcript();
            if let Some(reply) =
                transcript.iter().rev().find(|m| m.role == Role::Assistant)
            {
                println!(
                    "{}{}",
                    BAR_CHAR.bright_cyan(),
                    reply.content.bright_white()
                );
            }
        }
        Ok(SendOutcome::Ignored) => {}
        Err(SendError::Undelivered { text, reason }) => {
            eprintln!("{}", format!("message not delivered: {reason}").red());
            eprintln!("your message was kept: {text}");
        }
        Err(SendError::Store(err)) => {
            eprintln!("{}", err.to_string().red());
        }
    }
}

/// Maps a 1-based listing position to a session id.
fn parse_index<B: ChatBackend + 'static>(
    store: &SessionStore<B>,
    arg: Option<&str>,
) -> Option<String> {
    let index: usize = arg?.parse().ok()?;
    let listing = store.list_sessions();
    listing.get(index.checked_sub(1)?).map(|s| s.id.clone())
}

fn print_sessions<B: ChatBackend + 'static>(store: &SessionStore<B>) {
    let active = store.active_session_id();
    for (idx, session) in store.list_sessions().iter().enumerate() {
        let marker = if active.as_deref() == Some(session.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {} {} ({} messages)",
            format!("{}.", idx + 1).bright_black(),
            session.title.bright_white(),
            session.message_count
        );
    }
}

fn print_transcript<B: ChatBackend + 'static>(store: &SessionStore<B>) {
    let Some(session_id) = store.active_session_id() else {
        return;
    };
    println!("{}", store.title_for(&session_id).bold());
    for message in store.active_transcript() {
        let bar = match message.role {
            Role::User => BAR_CHAR.bright_green().to_string(),
            Role::Assistant => BAR_CHAR.bright_cyan().to_string(),
        };
        println!(
            "{bar}{} {}",
            message.timestamp.format("%H:%M").to_string().bright_black(),
            message.content
        );
    }
}

fn print_help() {
    println!(":new          start a fresh conversation");
    println!(":list         list conversations");
    println!(":open <n>     switch to a conversation from :list");
    println!(":delete <n>   delete a conversation from :list");
    println!(":q            quit");
    println!("any other input is sent as a chat message");
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
