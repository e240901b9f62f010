use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::catalog::SnowflakeConfig;

/// Service configuration. Every flag falls back to an environment variable,
/// so secrets can come from the process environment or a `.env` file.
#[derive(Debug, Clone, Parser)]
#[command(name = "postgen", version, about)]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Log level for the postgen target
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Generation calls allowed per session before the throttle fires
    #[arg(long, env = "REQUEST_LIMIT", default_value_t = 5)]
    pub request_limit: u32,

    /// Sessions idle for longer than this many seconds are dropped
    #[arg(long = "session-ttl", env = "SESSION_TTL", default_value_t = 3600)]
    pub session_ttl_secs: u64,

    /// How often idle sessions are swept, in seconds
    #[arg(long = "cleanup-interval", env = "CLEANUP_INTERVAL", default_value_t = 300)]
    pub cleanup_interval_secs: u64,

    /// Timeout for each upstream HTTP call, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT", default_value_t = 60)]
    pub upstream_timeout_secs: u64,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    pub openai_base_url: String,

    /// Completion model used for posts and image descriptions
    #[arg(long, env = "OPENAI_COMPLETION_MODEL", default_value = "gpt-3.5-turbo-instruct")]
    pub completion_model: String,

    /// Size of generated images
    #[arg(long, env = "OPENAI_IMAGE_SIZE", default_value = "512x512")]
    pub image_size: String,

    /// Snowflake account identifier, e.g. `xy12345.eu-west-1`
    #[arg(long, env = "SNOWFLAKE_ACCOUNT")]
    pub snowflake_account: String,

    /// Snowflake OAuth or key-pair JWT token
    #[arg(long, env = "SNOWFLAKE_TOKEN", hide_env_values = true)]
    pub snowflake_token: String,

    /// Token type sent in `X-Snowflake-Authorization-Token-Type`
    #[arg(long, env = "SNOWFLAKE_TOKEN_TYPE", default_value = "OAUTH")]
    pub snowflake_token_type: String,

    /// Session context for catalog queries. Empty values count as unset.
    #[arg(long, env = "SNOWFLAKE_DATABASE")]
    pub snowflake_database: Option<String>,

    #[arg(long, env = "SNOWFLAKE_SCHEMA")]
    pub snowflake_schema: Option<String>,

    #[arg(long, env = "SNOWFLAKE_WAREHOUSE")]
    pub snowflake_warehouse: Option<String>,

    #[arg(long, env = "SNOWFLAKE_ROLE")]
    pub snowflake_role: Option<String>,

    /// Table holding the topic list
    #[arg(long, env = "TOPICS_TABLE", default_value = "snowflake_features")]
    pub topics_table: String,

    /// Table holding the style list
    #[arg(long, env = "STYLES_TABLE", default_value = "style")]
    pub styles_table: String,
}

impl Config {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    /// Snowflake connection settings. Blank context values, as left by an
    /// empty `SNOWFLAKE_DATABASE=` line in `.env`, are treated as unset.
    pub fn snowflake_config(&self) -> SnowflakeConfig {
        SnowflakeConfig {
            token_type: self.snowflake_token_type.clone(),
            database: non_empty(&self.snowflake_database),
            schema: non_empty(&self.snowflake_schema),
            warehouse: non_empty(&self.snowflake_warehouse),
            role: non_empty(&self.snowflake_role),
            timeout: self.upstream_timeout(),
            ..SnowflakeConfig::new(self.snowflake_account.clone(), self.snowflake_token.clone())
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let config = Config::try_parse_from([
            "postgen",
            "--openai-api-key",
            "sk-test",
            "--snowflake-account",
            "xy12345",
            "--snowflake-token",
            "token",
        ])
        .unwrap();

        assert_eq!(config.request_limit, 5);
        assert_eq!(config.topics_table, "snowflake_features");
        assert_eq!(config.styles_table, "style");
        assert_eq!(config.upstream_timeout(), Duration::from_secs(60));
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.session_ttl(), Duration::from_secs(3600));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_blank_snowflake_context_is_unset() {
        let config = Config::try_parse_from([
            "postgen",
            "--openai-api-key",
            "sk-test",
            "--snowflake-account",
            "xy12345",
            "--snowflake-token",
            "token",
            "--snowflake-database",
            "",
            "--snowflake-schema",
            "  ",
            "--snowflake-warehouse",
            "COMPUTE_WH",
            "--session-ttl",
            "60",
        ])
        .unwrap();

        let snowflake = config.snowflake_config();
        assert_eq!(snowflake.database, None);
        assert_eq!(snowflake.schema, None);
        assert_eq!(snowflake.warehouse.as_deref(), Some("COMPUTE_WH"));
        assert_eq!(snowflake.role, None);
        assert_eq!(snowflake.token_type, "OAUTH");
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
    }
}
