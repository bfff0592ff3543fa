use std::time::Duration;

/// Immutable process configuration, read once at startup and passed into
/// each component's constructor. Request handlers never touch the
/// environment directly.
#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub broker: BrokerConfig,
    pub smtp: SmtpConfig,
    pub frontend_url: String,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Coordinates and application-identity credentials for the two remote
/// collaborator APIs.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub task_api_url: String,
    pub task_app_id: String,
    pub task_key: String,
    pub subgroup_api_url: String,
    pub subgroup_app_id: String,
    pub subgroup_key: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub exchange: String,
    pub exchange_type: String,
    pub log_routing_key: String,
    pub notif_routing_key: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub test_email: String,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let get_str = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let get_u16 = |key: &str, default: u16| -> u16 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let get_u64 = |key: &str, default: u64| -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        AppConfig {
            server: ServerConfig {
                host: get_str("SERVER_HOST", "127.0.0.1"),
                port: get_u16("SERVER_PORT", 8080),
            },
            upstream: UpstreamConfig {
                task_api_url: get_str("TASK_API_URL", "http://localhost:9001/rest/v1"),
                task_app_id: get_str("TASK_APP_ID", ""),
                task_key: get_str("TASK_KEY", ""),
                subgroup_api_url: get_str("SUBGROUP_API_URL", "http://localhost:9002/rest/v1"),
                subgroup_app_id: get_str("SUBGROUP_APP_ID", ""),
                subgroup_key: get_str("SUBGROUP_KEY", ""),
                timeout: Duration::from_secs(get_u64("UPSTREAM_TIMEOUT_SECS", 10)),
            },
            broker: BrokerConfig {
                host: get_str("RABBITMQ_HOST", "localhost"),
                port: get_u16("RABBITMQ_PORT", 5672),
                exchange: get_str("EXCHANGE_NAME", "task_exchange"),
                exchange_type: get_str("EXCHANGE_TYPE", "topic"),
                log_routing_key: get_str("LOG_ROUTING_KEY", "task.log"),
                notif_routing_key: get_str("NOTIF_ROUTING_KEY", "task.notif"),
                timeout: Duration::from_secs(get_u64("BROKER_TIMEOUT_SECS", 10)),
            },
            smtp: SmtpConfig {
                server: get_str("SMTP_SERVER", "localhost"),
                port: get_u16("SMTP_PORT", 587),
                username: get_str("SMTP_USERNAME", ""),
                password: get_str("SMTP_PASSWORD", ""),
                test_email: get_str("TEST_EMAIL", ""),
                timeout: Duration::from_secs(get_u64("SMTP_TIMEOUT_SECS", 30)),
            },
            frontend_url: get_str("FRONTEND_URL", "http://localhost:5173"),
        }
    }
}
