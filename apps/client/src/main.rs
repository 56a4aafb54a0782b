use anyhow::Result;
use clap::Parser;
use hamlet_link::{
    ConnectionState, PollConfig, PollMode, Poller, ReconnectConfig, SessionConfig, SessionEvent,
    SessionManager,
};
use hamlet_link_common::{
    ChatBroadcast, GameAction, LinkError, NotificationKind, Push, PushKind, Reply,
    SystemNotification,
    constants::{
        CONNECT_TIMEOUT_MS, HEARTBEAT_INTERVAL_SECS, MAX_RECONNECT_ATTEMPTS, POLL_INTERVAL_MS,
        RECONNECT_BASE_DELAY_MS, REQUEST_TIMEOUT_SECS,
    },
};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments for the terminal client
#[derive(Parser, Debug)]
#[command(name = "hlink")]
#[command(about = "Terminal client for a LeafHamlet chat server", long_about = None)]
#[command(version)]
struct Args {
    /// Server address: bare host, host:port or ws(s):// URL
    #[arg(short, long, env = "HLINK_SERVER", default_value = "localhost")]
    server: String,

    /// Account name
    #[arg(short, long, env = "HLINK_USER")]
    user: String,

    /// Account password
    #[arg(short, long, env = "HLINK_PASSWORD", hide_env_values = true)]
    password: String,

    /// Create the account before logging in
    #[arg(short, long)]
    register: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Connection timeout in milliseconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_MS)]
    connect_timeout_ms: u64,

    /// Request timeout in seconds (0 waits forever)
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    request_timeout: u64,

    /// Heartbeat interval in seconds (0 disables the heartbeat)
    #[arg(long, default_value_t = HEARTBEAT_INTERVAL_SECS)]
    heartbeat: u64,

    /// Base reconnection delay in milliseconds
    #[arg(long, default_value_t = RECONNECT_BASE_DELAY_MS)]
    reconnect_delay_ms: u64,

    /// Reconnection attempts before giving up
    #[arg(long, default_value_t = MAX_RECONNECT_ATTEMPTS)]
    max_reconnect_attempts: u32,

    /// Double the reconnection delay on each attempt instead of growing it linearly
    #[arg(long)]
    exponential_backoff: bool,

    /// Poll for missed messages at this interval in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: Option<u64>,

    /// Poll over HTTP instead of the WebSocket
    #[arg(long)]
    http_poll: bool,

    /// Hide server lines addressed to other players
    #[arg(long)]
    hide_others: bool,
}

/// Configuration for the terminal client
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: String,
    pub user: String,
    pub password: String,
    pub register: bool,
    pub hide_others: bool,

    /// Session settings handed to the manager
    pub session: SessionConfig,

    /// Polling fallback, when enabled
    pub poll: Option<PollConfig>,
}

impl AppConfig {
    fn from_args(args: Args) -> Self {
        let base_delay = Duration::from_millis(args.reconnect_delay_ms);
        let reconnect = if args.exponential_backoff {
            ReconnectConfig::exponential(base_delay, args.max_reconnect_attempts)
        } else {
            ReconnectConfig {
                base_delay,
                max_attempts: args.max_reconnect_attempts,
                ..ReconnectConfig::default()
            }
        };

        let session = SessionConfig {
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            heartbeat_interval: Duration::from_secs(args.heartbeat),
            request_timeout: (args.request_timeout > 0)
                .then(|| Duration::from_secs(args.request_timeout)),
            reconnect,
            ..SessionConfig::default()
        };

        let poll = (args.poll_interval_ms.is_some() || args.http_poll).then(|| PollConfig {
            mode: if args.http_poll {
                PollMode::Http
            } else {
                PollMode::WebSocket
            },
            interval: Duration::from_millis(args.poll_interval_ms.unwrap_or(POLL_INTERVAL_MS)),
            ..PollConfig::default()
        });

        Self {
            server: args.server,
            user: args.user.trim().to_string(),
            password: args.password,
            register: args.register,
            hide_others: args.hide_others,
            session,
            poll,
        }
    }
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("usage: /action <name> [json object]")]
    MissingActionName,

    #[error("action parameters must be a JSON object")]
    ParamsNotObject,

    #[error("invalid action parameters: {0}")]
    InvalidParams(#[from] serde_json::Error),
}

/// One line typed at the prompt
#[derive(Debug, PartialEq)]
enum Command {
    Quit,
    Ping,
    Action(GameAction),
    Chat(String),
}

impl Command {
    /// Blank lines yield `None`. Unknown slash commands go to the server as
    /// chat, which handles its own commands.
    fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (head, rest) = split_word(line);
        let command = match head {
            "/quit" | "/exit" | "/logout" => Self::Quit,
            "/ping" => Self::Ping,
            "/action" => Self::Action(parse_action(rest)?),
            _ => Self::Chat(line.to_string()),
        };

        Ok(Some(command))
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    }
}

fn parse_action(rest: &str) -> Result<GameAction, CommandError> {
    let (name, params) = split_word(rest);
    if name.is_empty() {
        return Err(CommandError::MissingActionName);
    }

    let mut action = GameAction::new(name);
    if !params.is_empty() {
        match serde_json::from_str(params)? {
            Value::Object(map) => action.params = map,
            _ => return Err(CommandError::ParamsNotObject),
        }
    }

    Ok(action)
}

/// Format a chat broadcast for the terminal, or `None` to hide it
fn render_chat(chat: &ChatBroadcast, user: &str, hide_others: bool) -> Option<String> {
    if chat.is_from(user) {
        return None;
    }

    if chat.is_server {
        let addressed_elsewhere = chat.target_user.as_deref().is_some_and(|t| t != user);
        if hide_others && addressed_elsewhere {
            return None;
        }
        return Some(format!("* {}", chat.msg));
    }

    let name = chat.name.as_deref().unwrap_or("?");
    Some(format!("<{}> {}", name, chat.msg))
}

fn render_notification(notification: &SystemNotification) -> String {
    let marker = match notification.kind {
        NotificationKind::Join => "+",
        NotificationKind::Leave => "-",
        NotificationKind::Warning => "!",
        NotificationKind::Error => "x",
        NotificationKind::Success => "ok",
        NotificationKind::Info | NotificationKind::Other => "i",
    };
    format!("[{}] {}", marker, notification.text)
}

async fn install_display(session: &SessionManager, config: &AppConfig) {
    let user = config.user.clone();
    let hide_others = config.hide_others;

    session
        .on_push(PushKind::Chat, move |push| {
            if let Push::Chat(chat) = push
                && let Some(line) = render_chat(chat, &user, hide_others)
            {
                println!("{}", line);
            }
        })
        .await;

    session
        .on_push(PushKind::SystemNotification, |push| {
            if let Push::SystemNotification(notification) = push {
                println!("{}", render_notification(notification));
            }
        })
        .await;
}

fn spawn_event_logger(mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::StateChanged {
                    to: ConnectionState::Reconnecting { attempt, delay },
                    ..
                }) => {
                    warn!("Connection lost, reconnecting in {:?} (attempt {})", delay, attempt);
                }
                Ok(SessionEvent::StateChanged { from, to }) => {
                    debug!("Connection {} -> {}", from, to);
                }
                Ok(SessionEvent::ReconnectExhausted { attempts }) => {
                    error!("{}", LinkError::MaxReconnectExceeded(attempts));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Skipped {} session events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Read commands from stdin until EOF or a quit command
async fn run_prompt(session: &SessionManager) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Ping => match session.measure_latency().await {
                Ok(rtt) => println!("pong in {} ms", rtt.as_millis()),
                Err(e) => warn!("Ping failed: {}", e),
            },
            Command::Action(action) => match session.send_action(&action).await {
                Ok(reply) if reply.is_success() => println!("{}", reply.body),
                Ok(reply) => println!(
                    "{} rejected: {}",
                    action.action,
                    reply.error().or(reply.message()).unwrap_or("no reason given")
                ),
                Err(e) => warn!("{} failed: {}", action.action, e),
            },
            Command::Chat(text) => {
                if let Err(e) = session.send_chat(&text).await {
                    warn!("Message not sent: {}", e);
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides -v
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    info!("LeafHamlet client v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_args(args);
    let session = SessionManager::new(config.session.clone());
    install_display(&session, &config).await;
    let event_logger = spawn_event_logger(session.subscribe());

    session.connect(&config.server).await?;

    if config.register {
        match session
            .register(&config.user, &config.password)
            .await
            .and_then(Reply::into_result)
        {
            Ok(reply) => info!("{}", reply.message().unwrap_or("Account created")),
            Err(e) => warn!("Registration failed: {}", e),
        }
    }

    if let Err(e) = session
        .login(&config.user, &config.password)
        .await
        .and_then(Reply::into_result)
    {
        session.disconnect().await;
        return Err(e.into());
    }

    let poller = match config.poll.clone() {
        Some(poll) => Some(Poller::new(session.clone(), poll).await?.spawn()),
        None => None,
    };

    // Run until the user leaves or interrupts
    tokio::select! {
        result = run_prompt(&session) => {
            if let Err(e) = result {
                error!("Input error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down gracefully...");
        }
    }

    if let Some(poller) = poller {
        poller.abort();
    }
    session.disconnect().await;
    event_logger.abort();

    Ok(())
}
