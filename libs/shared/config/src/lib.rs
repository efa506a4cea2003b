use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_prefix: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            api_base_url: env::var("BOOKING_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| {
                    warn!("BOOKING_API_URL not set, using empty value");
                    String::new()
                }),
            api_prefix: env::var("BOOKING_API_PREFIX")
                .unwrap_or_else(|_| {
                    warn!("BOOKING_API_PREFIX not set, using default");
                    "/api".to_string()
                }),
            port: env::var("BOOKING_WEB_PORT")
                .ok()
                .and_then(|port| match port.parse() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        warn!("BOOKING_WEB_PORT is not a valid port: {}", port);
                        None
                    }
                })
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.is_empty()
    }

    /// Base URL with the API prefix applied, without a trailing slash.
    pub fn api_root(&self) -> String {
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            self.api_base_url.clone()
        } else {
            format!("{}/{}", self.api_base_url, prefix)
        }
    }
}
