//! Client configuration from environment variables.

use std::path::PathBuf;

const DEFAULT_PLATFORM_URL: &str = "http://localhost:54321";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the auth/data platform.
    pub platform_url: String,
    /// Publishable API key sent with every platform request.
    pub platform_key: String,
    /// WebSocket endpoint of the change-notification channel.
    pub realtime_url: String,
    /// Base URL of the generative-AI service.
    pub ai_url: String,
    /// API key for the generative-AI service.
    pub ai_key: String,
    /// Override for the local storage directory.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CAMPUSNET_PLATFORM_URL`: platform base URL (default: "http://localhost:54321")
    /// - `CAMPUSNET_PLATFORM_KEY`: publishable platform key (default: empty)
    /// - `CAMPUSNET_REALTIME_URL`: change-feed URL (default: derived from the platform URL)
    /// - `CAMPUSNET_AI_URL`: AI service base URL (default: "http://localhost:8787")
    /// - `CAMPUSNET_AI_KEY`: AI service key (default: empty)
    /// - `CAMPUSNET_DATA_DIR`: local storage directory override
    pub fn from_env() -> Self {
        let platform_url = std::env::var("CAMPUSNET_PLATFORM_URL")
            .unwrap_or_else(|_| DEFAULT_PLATFORM_URL.to_string());
        let realtime_url = std::env::var("CAMPUSNET_REALTIME_URL")
            .unwrap_or_else(|_| realtime_url_for(&platform_url));

        Self {
            platform_key: std::env::var("CAMPUSNET_PLATFORM_KEY").unwrap_or_default(),
            realtime_url,
            ai_url: std::env::var("CAMPUSNET_AI_URL")
                .unwrap_or_else(|_| "http://localhost:8787".to_string()),
            ai_key: std::env::var("CAMPUSNET_AI_KEY").unwrap_or_default(),
            data_dir: std::env::var("CAMPUSNET_DATA_DIR").ok().map(PathBuf::from),
            platform_url,
        }
    }
}

/// Derive the WS/WSS change-feed endpoint from an HTTP/HTTPS base URL.
fn realtime_url_for(platform_url: &str) -> String {
    let base = if platform_url.starts_with("https://") {
        platform_url.replacen("https://", "wss://", 1)
    } else if platform_url.starts_with("http://") {
        platform_url.replacen("http://", "ws://", 1)
    } else {
        format!("ws://{platform_url}")
    };
    format!("{}/realtime/v1", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_url_swaps_scheme_and_appends_path() {
        assert_eq!(
            realtime_url_for("https://data.example.com/"),
            "wss://data.example.com/realtime/v1"
        );
        assert_eq!(
            realtime_url_for("http://localhost:54321"),
            "ws://localhost:54321/realtime/v1"
        );
    }
}
