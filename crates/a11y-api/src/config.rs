//! Application configuration

use a11y_tools::ToolConfig;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Application configuration, built once at startup
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub environment: String,
    pub frontend_url: Option<String>,
    pub backend_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub recommendation_timeout_secs: u64,
    pub max_concurrent_scans: usize,
    pub tool: ToolConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://adaptivetest.db".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            environment: "development".to_string(),
            frontend_url: None,
            backend_url: None,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            recommendation_timeout_secs: 20,
            max_concurrent_scans: 4,
            tool: ToolConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut tool = defaults.tool.clone();
        if let Some(command) = env_var("PA11Y_COMMAND") {
            tool.command = command.split_whitespace().map(str::to_string).collect();
        }
        if let Some(standard) = env_var("PA11Y_STANDARD") {
            tool.standard = Some(standard);
        }
        if let Some(runners) = env_var("PA11Y_RUNNERS") {
            tool.runners = runners
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
        }
        tool.timeout_secs = env_parse("SCAN_TIMEOUT_SECS", tool.timeout_secs);

        Self {
            database_url: env_var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: env_var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            environment: env_var("APP_ENV").unwrap_or(defaults.environment),
            frontend_url: env_var("FRONTEND_URL"),
            backend_url: env_var("BACKEND_URL"),
            openai_api_key: env_var("OPENAI_API_KEY"),
            openai_base_url: env_var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: env_var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            recommendation_timeout_secs: env_parse(
                "RECOMMENDATION_TIMEOUT_SECS",
                defaults.recommendation_timeout_secs,
            ),
            max_concurrent_scans: env_parse("MAX_CONCURRENT_SCANS", defaults.max_concurrent_scans),
            tool,
        }
    }

    /// CORS origins: local frontends plus the configured deployment URLs
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect();
        for url in [&self.frontend_url, &self.backend_url].into_iter().flatten() {
            let url = url.trim_end_matches('/').to_string();
            if !url.is_empty() && !origins.contains(&url) {
                origins.push(url);
            }
        }
        origins
    }

    pub fn store_kind(&self) -> &'static str {
        if self.database_url.starts_with("sqlite:") {
            "SQLite"
        } else {
            "unknown"
        }
    }

    pub fn provider_configured(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env_var(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "Invalid value, using default {}", default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.tool.timeout_secs, 60);
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert!(!config.provider_configured());
        assert_eq!(config.store_kind(), "SQLite");
    }

    #[test]
    fn test_allowed_origins_trim_and_dedup() {
        let config = AppConfig {
            frontend_url: Some("https://frontend.example.com/".to_string()),
            backend_url: Some("http://localhost:3000".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.allowed_origins(),
            vec![
                "http://localhost:3000",
                "http://127.0.0.1:3000",
                "https://frontend.example.com",
            ]
        );
    }
}
