//! Core application

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::{SummaryCache, TopicService};
use crate::domain::live::LiveService;
use crate::domain::tree::TraceViewRegistry;
use crate::upstream::{BackendClient, HttpBackendClient};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub client: Arc<dyn BackendClient>,
    pub registry: Arc<TraceViewRegistry>,
    pub live: Arc<LiveService>,
    pub summaries: Arc<SummaryCache>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        let cli_config = cli::parse();
        Self::init_logging(cli_config.debug);

        tracing::debug!("Application starting");

        let app = Self::init(&cli_config)?;
        Self::start_server(app).await
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let client: Arc<dyn BackendClient> = Arc::new(HttpBackendClient::new(
            &config.upstream.base_url,
            config.upstream.api_key.clone(),
            Duration::from_secs(config.upstream.timeout_secs),
        )?);

        let registry = Arc::new(TraceViewRegistry::new());
        let topics = Arc::new(TopicService::new());
        let live = Arc::new(LiveService::new(
            Arc::clone(&client),
            topics,
            Arc::clone(&registry),
        ));
        let summaries = Arc::new(SummaryCache::new(
            config.cache.max_entries,
            Duration::from_secs(config.cache.ttl_secs),
        ));
        let shutdown = ShutdownService::new();

        Ok(Self {
            shutdown,
            config,
            client,
            registry,
            live,
            summaries,
        })
    }

    fn init_logging(debug: bool) {
        // --debug raises the default verbosity; an explicit filter in the
        // environment still wins.
        let default_filter = if debug {
            "debug,hyper=info,reqwest=info".to_string()
        } else {
            format!("info,{}=info", APP_NAME_LOWER)
        };

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        banner::print_banner(
            &app.config.server.host,
            app.config.server.port,
            &app.config.upstream.base_url,
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;

        // Stop live forwarders before draining registered tasks so nothing
        // publishes into torn-down topics.
        app.live.stop_all();
        app.shutdown.shutdown().await;

        Ok(())
    }
}
