//! # inbox-assist
//!
//! Client library for a local email assistant backend: a retrying HTTP
//! transport, a connectivity monitor, and a flat error taxonomy that UI code
//! turns into notifications.
//!
//! ## Quick Start
//!
//! ```no_run
//! use inbox_assist::{ChatSession, Config, EmailAssistant};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load_or_default("config.toml")?;
//! let assistant = EmailAssistant::from_config(&config, true);
//!
//! // Keep connectivity up to date in the background
//! let monitor = assistant.monitor().start();
//!
//! let mut session = ChatSession::new();
//! let reply = assistant.chat(&mut session, "Any invoices this week?").await?;
//! println!("{}", reply.response);
//!
//! let hits = assistant.search_emails("invoice", 25).await?;
//! for email in hits.summaries() {
//!     println!("{} - {}", email.from, email.subject);
//! }
//!
//! monitor.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Behaviour
//!
//! - **Timeouts**: every attempt is bounded (30s by default) and cancelled on expiry
//! - **Retries**: timeouts, network failures, 5xx and 408 are retried up to 3
//!   attempts with linear backoff (`base_delay * attempt`); other 4xx are not
//! - **Connectivity**: health checks every 5s plus platform network events drive
//!   an online/offline flag; listeners fire only on real transitions
//!
//! ## Configuration
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:5000"
//! request_timeout_secs = 30
//! max_attempts = 3
//! retry_base_delay_ms = 1000
//!
//! [monitor]
//! poll_interval_secs = 5
//! ```

pub mod api_client;
pub mod assistant;
pub mod config;
pub mod connectivity;
pub mod dto;
pub mod error;
pub mod notify;
pub mod retry;

pub use api_client::{ApiClient, ApiRequest, Method};
pub use assistant::{ChatSession, EmailAssistant};
pub use config::Config;
pub use connectivity::{Connectivity, ConnectivityMonitor, HealthProbe, Transition};
pub use dto::*;
pub use error::{classify, ApiError, ErrorKind, Failure};
pub use notify::{Notification, Notifier, Severity, TracingNotifier, WriteNotifier};
