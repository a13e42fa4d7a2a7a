use clap::Parser;

use std::path::PathBuf;

use super::constants::{
    ENV_CACHE_MAX_ENTRIES, ENV_CACHE_TTL_SECS, ENV_CONFIG, ENV_DEBUG, ENV_HOST,
    ENV_LIVE_MAX_EVENTS_PER_SECOND, ENV_PORT, ENV_UPSTREAM_TIMEOUT_SECS, ENV_UPSTREAM_URL,
};

#[derive(Parser)]
#[command(name = "callwarden")]
#[command(version, about = "Dashboard backend for LLM function-call security", long_about = None)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Analysis backend base URL
    #[arg(long, env = ENV_UPSTREAM_URL)]
    pub upstream_url: Option<String>,

    /// Analysis backend request timeout in seconds
    #[arg(long, env = ENV_UPSTREAM_TIMEOUT_SECS)]
    pub upstream_timeout_secs: Option<u64>,

    /// Maximum number of cached trace summaries
    #[arg(long, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Trace summary cache TTL in seconds
    #[arg(long, env = ENV_CACHE_TTL_SECS)]
    pub cache_ttl_secs: Option<u64>,

    /// Per-client live event rate cap (events per second)
    #[arg(long, env = ENV_LIVE_MAX_EVENTS_PER_SECOND)]
    pub live_max_events_per_second: Option<u32>,

    /// Enable debug mode (verbose request and stream logging)
    #[arg(long, env = ENV_DEBUG)]
    pub debug: bool,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub upstream_url: Option<String>,
    pub upstream_timeout_secs: Option<u64>,
    pub cache_max_entries: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
    pub live_max_events_per_second: Option<u32>,
    pub debug: bool,
}

/// Parse CLI arguments (with env var fallbacks via clap)
pub fn parse() -> CliConfig {
    let cli = Cli::parse();
    CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        upstream_url: cli.upstream_url,
        upstream_timeout_secs: cli.upstream_timeout_secs,
        cache_max_entries: cli.cache_max_entries,
        cache_ttl_secs: cli.cache_ttl_secs,
        live_max_events_per_second: cli.live_max_events_per_second,
        debug: cli.debug,
    }
}
