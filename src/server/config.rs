use super::RequestsLoggingLevel;
use std::time::Duration;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Public base URL the audio links in listings are built from.
    pub base_url: String,
    /// How long one source's listing entry is memoized. Zero disables
    /// memoization.
    pub listing_cache_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 55669,
            base_url: "http://localhost:55669".to_owned(),
            listing_cache_ttl: Duration::from_secs(15),
        }
    }
}
