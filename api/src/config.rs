use bureau_mcp_runtime::{
    DEFAULT_PROTOCOL_VERSION, DEFAULT_SERVER_NAME, DEFAULT_SESSION_TTL_MINUTES, GatewayConfig,
};

const API_KEY_ENV: &str = "BUREAU_API_KEY";
const PROTOCOL_VERSION_ENV: &str = "BUREAU_PROTOCOL_VERSION";
const SESSION_ENABLED_ENV: &str = "BUREAU_SESSION_ENABLED";
const SESSION_TTL_MINUTES_ENV: &str = "BUREAU_SESSION_TTL_MINUTES";
const SESSION_TTL_MINUTES_MIN: i64 = 1;
const SESSION_TTL_MINUTES_MAX: i64 = 24 * 60;
const DEFAULT_PORT: u16 = 3000;

/// Everything the binary reads from the environment, read exactly once.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub gateway: GatewayConfig,
    pub database_url: Option<String>,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let env = |key: &str| std::env::var(key).ok();
        Self {
            gateway: gateway_config(
                env(API_KEY_ENV),
                env(PROTOCOL_VERSION_ENV),
                env(SESSION_ENABLED_ENV),
                env(SESSION_TTL_MINUTES_ENV),
            ),
            database_url: non_empty(env("DATABASE_URL")),
            port: env("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
        }
    }
}

fn gateway_config(
    api_key: Option<String>,
    protocol_version: Option<String>,
    session_enabled: Option<String>,
    session_ttl_minutes: Option<String>,
) -> GatewayConfig {
    let (session_ttl_minutes, ttl_overridden) = parse_env_i64_with_bounds(
        session_ttl_minutes,
        SESSION_TTL_MINUTES_MIN,
        SESSION_TTL_MINUTES_MAX,
        DEFAULT_SESSION_TTL_MINUTES,
    );
    if ttl_overridden {
        tracing::debug!(session_ttl_minutes, "session ttl overridden from environment");
    }

    GatewayConfig {
        api_key: non_empty(api_key),
        protocol_version: non_empty(protocol_version)
            .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
        session_enabled: parse_env_bool_flag(session_enabled, false),
        session_ttl_minutes,
        server_name: DEFAULT_SERVER_NAME.to_string(),
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env_bool_flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}

fn parse_env_i64_with_bounds(raw: Option<String>, min: i64, max: i64, default: i64) -> (i64, bool) {
    match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
        Some(parsed) => (parsed.clamp(min, max), true),
        None => (default, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = gateway_config(None, None, None, None);
        assert_eq!(config.api_key, None);
        assert_eq!(config.protocol_version, "2024-11-05");
        assert!(!config.session_enabled);
        assert_eq!(config.session_ttl_minutes, 60);
    }

    #[test]
    fn blank_api_key_is_treated_as_unset() {
        let config = gateway_config(s("   "), None, None, None);
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn bool_flag_accepts_common_spellings() {
        for raw in ["1", "true", "YES", " on "] {
            assert!(parse_env_bool_flag(s(raw), false), "{raw}");
        }
        assert!(!parse_env_bool_flag(s("off"), true));
        assert!(parse_env_bool_flag(None, true));
    }

    #[test]
    fn ttl_is_clamped() {
        assert_eq!(gateway_config(None, None, s("1"), s("0")).session_ttl_minutes, 1);
        assert_eq!(
            gateway_config(None, None, s("1"), s("100000")).session_ttl_minutes,
            1440
        );
        assert_eq!(
            gateway_config(None, None, s("1"), s("soon")).session_ttl_minutes,
            60
        );
    }
}
