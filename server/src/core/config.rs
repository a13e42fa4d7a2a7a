use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_HOST, DEFAULT_LIVE_MAX_EVENTS_PER_SECOND, DEFAULT_PORT,
    DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_UPSTREAM_URL, ENV_UPSTREAM_API_KEY,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Analysis backend configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpstreamFileConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Summary cache configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    pub max_entries: Option<u64>,
    pub ttl_secs: Option<u64>,
}

/// Live streaming configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LiveFileConfig {
    pub max_events_per_second: Option<u32>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub upstream: Option<UpstreamFileConfig>,
    pub cache: Option<CacheFileConfig>,
    pub live: Option<LiveFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        if let Some(upstream) = other.upstream {
            let current = self.upstream.get_or_insert_with(UpstreamFileConfig::default);
            if upstream.base_url.is_some() {
                tracing::trace!(base_url = ?upstream.base_url, "Merging upstream.base_url");
                current.base_url = upstream.base_url;
            }
            if upstream.timeout_secs.is_some() {
                tracing::trace!(timeout_secs = ?upstream.timeout_secs, "Merging upstream.timeout_secs");
                current.timeout_secs = upstream.timeout_secs;
            }
        }

        if let Some(cache) = other.cache {
            let current = self.cache.get_or_insert_with(CacheFileConfig::default);
            if cache.max_entries.is_some() {
                tracing::trace!(max_entries = ?cache.max_entries, "Merging cache.max_entries");
                current.max_entries = cache.max_entries;
            }
            if cache.ttl_secs.is_some() {
                tracing::trace!(ttl_secs = ?cache.ttl_secs, "Merging cache.ttl_secs");
                current.ttl_secs = cache.ttl_secs;
            }
        }

        if let Some(live) = other.live {
            let current = self.live.get_or_insert_with(LiveFileConfig::default);
            if live.max_events_per_second.is_some() {
                tracing::trace!(
                    max_events_per_second = ?live.max_events_per_second,
                    "Merging live.max_events_per_second"
                );
                current.max_events_per_second = live.max_events_per_second;
            }
        }

        if other.debug.is_some() {
            tracing::trace!(debug = ?other.debug, "Merging debug");
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Analysis backend configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Bearer token for the analysis backend. Only read from the
    /// environment, never from config files.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Summary cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
}

/// Live streaming configuration
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub max_events_per_second: u32,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub live: LiveConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.callwarden/callwarden.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.callwarden/callwarden.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        // 3. Extract file config values with defaults
        let file_server = file_config.server.unwrap_or_default();
        let file_upstream = file_config.upstream.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();
        let file_live = file_config.live.unwrap_or_default();

        // 4. Layer configs: defaults -> file config -> CLI/env overrides
        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let upstream_base_url = cli
            .upstream_url
            .clone()
            .or(file_upstream.base_url)
            .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());

        let upstream_timeout_secs = cli
            .upstream_timeout_secs
            .or(file_upstream.timeout_secs)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);

        // API key comes from the environment only; a leaked config file must
        // never be able to expose it.
        let upstream_api_key = std::env::var(ENV_UPSTREAM_API_KEY)
            .ok()
            .filter(|k| !k.is_empty());

        let cache_max_entries = cli
            .cache_max_entries
            .or(file_cache.max_entries)
            .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);

        let cache_ttl_secs = cli
            .cache_ttl_secs
            .or(file_cache.ttl_secs)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        let live_max_events_per_second = cli
            .live_max_events_per_second
            .or(file_live.max_events_per_second)
            .unwrap_or(DEFAULT_LIVE_MAX_EVENTS_PER_SECOND);

        let debug = cli.debug || file_config.debug.unwrap_or(false);

        let config = Self {
            server: ServerConfig { host, port },
            upstream: UpstreamConfig {
                base_url: upstream_base_url,
                api_key: upstream_api_key,
                timeout_secs: upstream_timeout_secs,
            },
            cache: CacheConfig {
                max_entries: cache_max_entries,
                ttl_secs: cache_ttl_secs,
            },
            live: LiveConfig {
                max_events_per_second: live_max_events_per_second,
            },
            debug,
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            upstream_base_url = %config.upstream.base_url,
            upstream_api_key = config.upstream.api_key.is_some(),
            upstream_timeout_secs = config.upstream.timeout_secs,
            cache_max_entries = config.cache.max_entries,
            cache_ttl_secs = config.cache.ttl_secs,
            live_max_events_per_second = config.live.max_events_per_second,
            debug = config.debug,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        // Host must not be empty
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port must be non-zero (port 0 would cause bind failure)
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.upstream.base_url.is_empty() {
            anyhow::bail!("Configuration error: upstream.base_url must not be empty");
        }

        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "Configuration error: upstream.base_url must start with http:// or https://. Got: {}",
                self.upstream.base_url
            );
        }

        if self.upstream.timeout_secs == 0 {
            anyhow::bail!("Configuration error: upstream.timeout_secs must be greater than 0");
        }

        if self.cache.max_entries == 0 {
            tracing::warn!("cache.max_entries is 0, trace summaries will not be cached");
        }

        if self.live.max_events_per_second == 0 {
            tracing::warn!(
                "live.max_events_per_second is 0, live streams will be throttled to 1 event/sec"
            );
        }

        // Plain-HTTP upstream over the network is worth flagging
        if self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("http://127.0.0.1")
            && !self.upstream.base_url.starts_with("http://localhost")
            && self.upstream.api_key.is_some()
        {
            tracing::warn!(
                base_url = %self.upstream.base_url,
                "API key will be sent over unencrypted HTTP to a non-local upstream"
            );
        }

        Ok(())
    }
}

/// Get the profile config path (~/.callwarden/callwarden.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Expand a leading `~` to the user's home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            upstream: UpstreamConfig {
                base_url: DEFAULT_UPSTREAM_URL.to_string(),
                api_key: None,
                timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            },
            cache: CacheConfig {
                max_entries: DEFAULT_CACHE_MAX_ENTRIES,
                ttl_secs: DEFAULT_CACHE_TTL_SECS,
            },
            live: LiveConfig {
                max_events_per_second: DEFAULT_LIVE_MAX_EVENTS_PER_SECOND,
            },
            debug: false,
        }
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 8080 },
            "upstream": { "base_url": "https://api.example.com", "timeout_secs": 10 },
            "cache": { "max_entries": 500, "ttl_secs": 60 },
            "live": { "max_events_per_second": 5 },
            "debug": true
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("0.0.0.0".to_string())
        );
        assert_eq!(config.server.as_ref().unwrap().port, Some(8080));
        assert_eq!(
            config.upstream.as_ref().unwrap().base_url,
            Some("https://api.example.com".to_string())
        );
        assert_eq!(config.cache.as_ref().unwrap().max_entries, Some(500));
        assert_eq!(
            config.live.as_ref().unwrap().max_events_per_second,
            Some(5)
        );
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_file_config_parse_partial() {
        let json = r#"{ "server": { "port": 9000 } }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        assert!(config.server.as_ref().unwrap().host.is_none());
        assert_eq!(config.server.as_ref().unwrap().port, Some(9000));
        assert!(config.upstream.is_none());
    }

    #[test]
    fn test_file_config_merge_overlay_wins() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{ "server": { "host": "127.0.0.1", "port": 8520 }, "debug": false }"#,
        )
        .unwrap();
        let overlay: FileConfig =
            serde_json::from_str(r#"{ "server": { "port": 9000 }, "debug": true }"#).unwrap();

        base.merge(overlay);

        let server = base.server.as_ref().unwrap();
        assert_eq!(server.host, Some("127.0.0.1".to_string()));
        assert_eq!(server.port, Some(9000));
        assert_eq!(base.debug, Some(true));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("callwarden.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "upstream": {{ "base_url": "https://guard.example.com" }} }}"#
        )
        .unwrap();

        let config = FileConfig::load_from_file(&path).unwrap();
        assert_eq!(
            config.upstream.as_ref().unwrap().base_url,
            Some("https://guard.example.com".to_string())
        );
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("callwarden.json");
        fs::write(&path, "not json").unwrap();

        assert!(FileConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let mut config = base_config();
        config.server.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = base_config();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_upstream_scheme() {
        let mut config = base_config();
        config.upstream.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = base_config();
        config.upstream.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(is_all_interfaces("[::]"));
        assert!(!is_all_interfaces("127.0.0.1"));
        assert!(!is_all_interfaces("localhost"));
    }

    #[test]
    fn test_expand_path_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/config.json"), home.join("config.json"));
        }
        assert_eq!(
            expand_path("/etc/callwarden.json"),
            PathBuf::from("/etc/callwarden.json")
        );
    }
}
