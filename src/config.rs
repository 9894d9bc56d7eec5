//! Configuration management for Stack Mentor.
//!
//! Loads configuration from environment variables (and `.env` when present)
//! covering the HTTP server, the SQLite database, session/verification
//! lifetimes and the outgoing mail transport.

use std::env;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build verification links.
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./data/stack_mentor.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_max_age_seconds: i64,
    pub verification_token_ttl_hours: i64,
    /// Reject logins from users who have not verified their email.
    pub require_verified_login: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_max_age_seconds: 604800, // 7 days
            verification_token_ttl_hours: 24,
            require_verified_login: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub from: String,
    pub http_endpoint: Option<String>,
    pub http_api_key: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::Log,
            from: "no-reply@stackmentor.io".to_string(),
            http_endpoint: None,
            http_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    /// Write outgoing mail to the log only.
    Log,
    /// Deliver through an HTTP mail relay.
    Http,
}

impl std::str::FromStr for MailTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "http" => Ok(Self::Http),
            _ => Err(format!("Unknown mail transport: {}", s)),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let auth_defaults = AuthConfig::default();
        let mail_defaults = MailConfig::default();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "8080").parse().unwrap_or(8080),
                public_url: env_or("PUBLIC_URL", "http://localhost:8080"),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/stack_mentor.db"),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", "10")
                    .parse()
                    .unwrap_or(10),
            },
            auth: AuthConfig {
                session_max_age_seconds: env_or("SESSION_MAX_AGE", "604800")
                    .parse()
                    .unwrap_or(auth_defaults.session_max_age_seconds),
                verification_token_ttl_hours: env_or("VERIFICATION_TOKEN_TTL_HOURS", "24")
                    .parse()
                    .unwrap_or(auth_defaults.verification_token_ttl_hours),
                require_verified_login: env::var("REQUIRE_VERIFIED_LOGIN")
                    .map(|v| v.to_lowercase() != "false")
                    .unwrap_or(true),
            },
            mail: MailConfig {
                transport: env_or("MAIL_TRANSPORT", "log")
                    .parse()
                    .unwrap_or(MailTransport::Log),
                from: env_or("MAIL_FROM", &mail_defaults.from),
                http_endpoint: env::var("MAIL_HTTP_ENDPOINT").ok(),
                http_api_key: env::var("MAIL_HTTP_API_KEY").ok(),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
