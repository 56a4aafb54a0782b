//! Polling fallback for missed messages
//!
//! Runs on its own timer, separate from the heartbeat. Polled messages are
//! routed through the session, so they share duplicate suppression with
//! live pushes.

use hamlet_link_common::{LinkError, PollBatch, Result, http_base_url};
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{PollConfig, PollMode};
use crate::session::SessionManager;

enum Transport {
    WebSocket,
    Http { client: Client, url: String },
}

pub struct Poller {
    session: SessionManager,
    transport: Transport,
    config: PollConfig,
}

impl Poller {
    /// Build a poller for the session's current endpoint
    pub async fn new(session: SessionManager, config: PollConfig) -> Result<Self> {
        match config.mode {
            PollMode::WebSocket => Self::websocket(session, config),
            PollMode::Http => {
                let ws_url = session
                    .url()
                    .await
                    .ok_or_else(|| LinkError::InvalidUrl("session has no endpoint".to_string()))?;
                let url = poll_url(&ws_url)?;
                Self::http(session, url, config)
            }
        }
    }

    /// Poll through the session socket
    pub fn websocket(session: SessionManager, config: PollConfig) -> Result<Self> {
        check_interval(&config)?;
        Ok(Self {
            session,
            transport: Transport::WebSocket,
            config,
        })
    }

    /// Poll an explicit HTTP endpoint
    pub fn http(session: SessionManager, url: String, config: PollConfig) -> Result<Self> {
        check_interval(&config)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LinkError::HttpError(e.to_string()))?;

        Ok(Self {
            session,
            transport: Transport::Http { client, url },
            config,
        })
    }

    /// Poll once. Returns the number of messages fetched over HTTP; WebSocket
    /// polls return 0 since their results arrive asynchronously.
    pub async fn poll_once(&self) -> Result<usize> {
        match &self.transport {
            Transport::WebSocket => {
                self.session.poll().await?;
                Ok(0)
            }
            Transport::Http { client, url } => {
                let batch: PollBatch = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(|e| LinkError::HttpError(e.to_string()))?
                    .json()
                    .await
                    .map_err(|e| LinkError::HttpError(e.to_string()))?;

                let count = batch.messages.len();
                for message in batch.messages {
                    self.session.ingest(message).await;
                }
                Ok(count)
            }
        }
    }

    /// Poll on the configured interval until the task is aborted
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if !self.session.state().await.is_connected() {
                    debug!("Skipping poll while not connected");
                    continue;
                }

                match self.poll_once().await {
                    Ok(count) if count > 0 => debug!("Polled {} messages", count),
                    Ok(_) => {}
                    Err(e) => warn!("Poll failed: {}", e),
                }
            }
        })
    }
}

fn check_interval(config: &PollConfig) -> Result<()> {
    if config.interval.is_zero() {
        return Err(LinkError::InvalidConfig(
            "poll interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// HTTP poll endpoint next to a WebSocket endpoint
pub fn poll_url(ws_url: &str) -> Result<String> {
    Ok(format!("{}/poll", http_base_url(ws_url)?))
}
