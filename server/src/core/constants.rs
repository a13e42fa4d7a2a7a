// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "Callwarden";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "callwarden";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".callwarden";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "callwarden.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CALLWARDEN_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "CALLWARDEN_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "CALLWARDEN_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "CALLWARDEN_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "CALLWARDEN_LOG";

// =============================================================================
// Environment Variables - Upstream
// =============================================================================

/// Environment variable for the analysis backend base URL
pub const ENV_UPSTREAM_URL: &str = "CALLWARDEN_UPSTREAM_URL";

/// Environment variable for the analysis backend API key (env-only, never
/// read from config files)
pub const ENV_UPSTREAM_API_KEY: &str = "CALLWARDEN_UPSTREAM_API_KEY";

/// Environment variable for the analysis backend request timeout
pub const ENV_UPSTREAM_TIMEOUT_SECS: &str = "CALLWARDEN_UPSTREAM_TIMEOUT_SECS";

// =============================================================================
// Environment Variables - Cache
// =============================================================================

/// Environment variable for summary cache max entries
pub const ENV_CACHE_MAX_ENTRIES: &str = "CALLWARDEN_CACHE_MAX_ENTRIES";

/// Environment variable for summary cache TTL in seconds
pub const ENV_CACHE_TTL_SECS: &str = "CALLWARDEN_CACHE_TTL_SECS";

// =============================================================================
// Environment Variables - Live Streaming
// =============================================================================

/// Environment variable for the per-client live event rate cap
pub const ENV_LIVE_MAX_EVENTS_PER_SECOND: &str = "CALLWARDEN_LIVE_MAX_EVENTS_PER_SECOND";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8520;

// =============================================================================
// Upstream Defaults
// =============================================================================

/// Default analysis backend base URL
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8000";

/// Default analysis backend request timeout in seconds
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Summary Cache Defaults
// =============================================================================

/// Default summary cache max entries
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;

/// Default summary cache TTL in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// Live Streaming Defaults
// =============================================================================

/// Default per-client live event rate cap (events per second)
pub const DEFAULT_LIVE_MAX_EVENTS_PER_SECOND: u32 = 20;

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
