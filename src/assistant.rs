use crate::api_client::ApiClient;
use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, HealthProbe, Transition};
use crate::dto::*;
use crate::error::{ApiError, ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Conversation continuity for chat: remembers the backend's session id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSession {
    session_id: Option<String>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues an existing backend session.
    pub fn resume(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Starts a new conversation on the next message.
    pub fn reset(&mut self) {
        self.session_id = None;
    }
}

/// Front door for UI code: a transport client plus the connectivity monitor
/// that gates it.
///
/// Requests are refused locally while the monitor reports offline, and a
/// transport-level failure flips the monitor offline until the next healthy
/// poll.
pub struct EmailAssistant<P = ApiClient> {
    client: ApiClient,
    monitor: ConnectivityMonitor<P>,
}

impl EmailAssistant<ApiClient> {
    /// Builds a client from `config` and a monitor that probes through it.
    pub fn from_config(config: &Config, network_reachable: bool) -> Self {
        let client = ApiClient::new(config.backend.clone());
        let monitor = ConnectivityMonitor::new(
            client.clone(),
            network_reachable,
            config.monitor.poll_interval(),
        );
        Self::new(client, monitor)
    }
}

impl<P: HealthProbe> EmailAssistant<P> {
    pub fn new(client: ApiClient, monitor: ConnectivityMonitor<P>) -> Self {
        Self { client, monitor }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn monitor(&self) -> &ConnectivityMonitor<P> {
        &self.monitor
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Runs one health check now instead of waiting for the next poll.
    pub async fn refresh_connectivity(&self) -> Option<Transition> {
        self.monitor.poll_once().await
    }

    async fn gated<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        if !self.monitor.is_online() {
            debug!("Refusing request while offline");
            return Err(ApiError::offline());
        }

        let result = operation.await;
        if let Err(err) = &result {
            if err.kind == ErrorKind::NetworkFailure {
                self.monitor.report_network_failure();
            }
        }
        result
    }

    // ========== Chat ==========

    /// Sends `message` within `session`, adopting the session id the backend
    /// assigns.
    pub async fn chat(&self, session: &mut ChatSession, message: &str) -> Result<ChatResponse> {
        let response = self
            .gated(self.client.send_message(message, session.session_id()))
            .await?;
        session.session_id = Some(response.session_id.clone());
        Ok(response)
    }

    pub async fn list_sessions(&self) -> Result<SessionsResponse> {
        self.gated(self.client.list_sessions()).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<MessageResponse> {
        self.gated(self.client.delete_session(session_id)).await
    }

    // ========== Emails ==========

    pub async fn load_emails(&self) -> Result<LoadEmailsResponse> {
        self.gated(self.client.load_emails()).await
    }

    pub async fn email_status(&self) -> Result<EmailStatusResponse> {
        self.gated(self.client.email_status()).await
    }

    pub async fn search_emails(&self, query: &str, k: u32) -> Result<SearchResponse> {
        self.gated(self.client.search_emails(query, k)).await
    }

    /// Polls the ingestion status until it is `ready` or `error`.
    ///
    /// Fails with a timeout classification once `max_wait` has elapsed. A
    /// `max_wait` too large to represent as an instant means no deadline.
    pub async fn wait_for_emails_ready(
        &self,
        poll_every: Duration,
        max_wait: Duration,
    ) -> Result<EmailStatusResponse> {
        let deadline = Instant::now().checked_add(max_wait);

        loop {
            let status = self.email_status().await?;
            if status.status.is_terminal() {
                info!("Email ingestion finished with status {:?}", status.status);
                return Ok(status);
            }
            if let Some(deadline) = deadline {
                let next_poll = Instant::now().checked_add(poll_every);
                if next_poll.map_or(true, |next| next > deadline) {
                    return Err(ApiError::timeout(max_wait));
                }
            }
            debug!("Email ingestion still {:?}", status.status);
            sleep(poll_every).await;
        }
    }

    // ========== System ==========

    pub async fn system_status(&self) -> Result<SystemStatusResponse> {
        self.gated(self.client.system_status()).await
    }

    pub async fn get_config(&self) -> Result<ConfigResponse> {
        self.gated(self.client.get_config()).await
    }

    pub async fn set_api_key(&self, api_key: &str) -> Result<MessageResponse> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ApiError::new(ErrorKind::ClientError, "API key must not be empty"));
        }
        let update = ConfigUpdate {
            groq_api_key: Some(api_key.to_string()),
        };
        self.gated(self.client.update_config(&update)).await
    }
}
