use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "inbox-assist")]
#[command(about = "Email assistant backend CLI", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Backend base URL (overrides config and INBOX_ASSIST_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the backend is up
    Health,
    /// Ask a question about your email
    Ask {
        /// The question
        #[arg(required = true)]
        message: Vec<String>,
        /// Continue an existing chat session
        #[arg(short, long)]
        session: Option<String>,
    },
    /// List active chat sessions
    Sessions,
    /// Delete a chat session
    DeleteSession { session_id: String },
    /// Start loading emails from Gmail
    Load {
        /// Wait until ingestion finishes
        #[arg(short, long)]
        wait: bool,
        /// Maximum time to wait in seconds
        #[arg(long, default_value = "300")]
        max_wait: u64,
    },
    /// Show email ingestion status
    Status,
    /// Search emails
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        /// Number of results
        #[arg(short, default_value = "25")]
        k: u32,
        /// Print raw result text instead of summaries
        #[arg(long)]
        raw: bool,
    },
    /// Show backend system status
    System,
    /// Show or change backend configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Watch backend connectivity and report transitions
    Monitor {
        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the backend configuration flags
    Show,
    /// Store a new LLM API key on the backend
    SetApiKey { api_key: String },
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tokio::runtime::Runtime::new()?.block_on(app::run(cli))
}

mod app {
    use super::{Cli, Commands, ConfigAction};
    use anyhow::Result;
    use inbox_assist::connectivity::ConnectivityMonitor;
    use inbox_assist::notify::{connectivity_listener, Notifier};
    use inbox_assist::{
        ApiError, ChatSession, Config, EmailAssistant, Notification, WriteNotifier,
    };
    use std::io::Stderr;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    pub async fn run(cli: Cli) -> Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();

        let mut config = Config::load_or_default(&cli.config)?.with_env_overrides();
        if let Some(url) = cli.base_url {
            config.backend.base_url = url;
        }
        config.validate()?;

        let notifier = Arc::new(WriteNotifier::stderr());
        // A CLI process gets no platform reachability events; health checks decide.
        let assistant = EmailAssistant::from_config(&config, true);

        match execute(&assistant, &notifier, cli.command).await {
            Ok(()) => Ok(()),
            Err(err) => {
                notifier.notify(Notification::from_error(&err));
                std::process::exit(1);
            }
        }
    }

    async fn execute(
        assistant: &EmailAssistant,
        notifier: &Arc<WriteNotifier<Stderr>>,
        command: Commands,
    ) -> Result<(), ApiError> {
        match command {
            Commands::Health => {
                let health = assistant.client().health_check().await?;
                println!(
                    "{} ({})",
                    health.status,
                    health.service.as_deref().unwrap_or("backend")
                );
            }
            Commands::Ask { message, session } => {
                let mut chat = session.map(ChatSession::resume).unwrap_or_default();
                let reply = assistant.chat(&mut chat, &message.join(" ")).await?;
                println!("{}", reply.response);
                println!("\nsession: {}", reply.session_id);
            }
            Commands::Sessions => {
                let sessions = assistant.list_sessions().await?.sessions;
                if sessions.is_empty() {
                    println!("No active sessions");
                }
                for s in sessions {
                    println!("{:<28} {:>4} msgs  {}", s.session_id, s.message_count, s.title);
                }
            }
            Commands::DeleteSession { session_id } => {
                let reply = assistant.delete_session(&session_id).await?;
                println!("{}", reply.message);
            }
            Commands::Load { wait, max_wait } => {
                let started = assistant.load_emails().await?;
                println!(
                    "{}",
                    started
                        .message
                        .unwrap_or_else(|| format!("Email loading: {:?}", started.status))
                );
                if wait {
                    let max_wait = Duration::from_secs(max_wait);
                    let status = assistant
                        .wait_for_emails_ready(Duration::from_secs(2), max_wait)
                        .await?;
                    println!("Ingestion finished: {:?}", status.status);
                }
            }
            Commands::Status => {
                let status = assistant.email_status().await?;
                let last = status
                    .last_checked_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!("status: {:?}\nlast checked: {}", status.status, last);
            }
            Commands::Search { query, k, raw } => {
                let results = assistant.search_emails(&query.join(" "), k).await?;
                println!("{} result(s)", results.count);
                if raw {
                    for text in &results.results {
                        println!("\n{}", text.trim());
                    }
                } else {
                    for email in results.summaries() {
                        println!("\n{}  {}", email.date, email.subject);
                        println!("  from: {}", email.from);
                        println!("  {}", email.preview);
                    }
                }
            }
            Commands::System => {
                let status = assistant.system_status().await?;
                println!("{:#?}", status.config_status);
                let missing = status.config_status.missing();
                if !missing.is_empty() {
                    println!("missing: {}", missing.join(", "));
                }
            }
            Commands::Config { action } => match action {
                ConfigAction::Show => {
                    let flags = assistant.get_config().await?.config;
                    println!("{flags:#?}");
                }
                ConfigAction::SetApiKey { api_key } => {
                    let reply = assistant.set_api_key(&api_key).await?;
                    println!("{}", reply.message);
                }
            },
            Commands::Monitor { duration } => {
                watch(assistant.monitor(), notifier.clone(), duration).await;
            }
        }
        Ok(())
    }

    async fn watch<P: inbox_assist::HealthProbe>(
        monitor: &ConnectivityMonitor<P>,
        notifier: Arc<WriteNotifier<Stderr>>,
        duration: Option<u64>,
    ) {
        monitor.add_listener(connectivity_listener(notifier));
        let handle = monitor.start();

        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                }
            }
        }

        handle.stop().await;
        info!("Final state: {}", monitor.state());
    }
}
