use crate::error::{ClearwayError, Result};
use crate::models::AgentOptions;
use serde::Deserialize;
use std::env;
use std::path::Path;
use url::Url;

/// Default location of the agent defaults file
const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Agent construction and resolution
    pub agents: AgentConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 5000)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Path every route is mounted under (default: /)
    pub web_root: String,
    /// Allowed CORS origins (comma-separated, empty = localhost only)
    pub cors_origins: Vec<String>,
}

/// What to do when a proxy call names an agent id that isn't in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentResolution {
    /// Provision a fresh agent and report its id
    #[default]
    Lenient,
    /// Fail with 404
    Strict,
}

impl AgentResolution {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Some(Self::Lenient),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Resolution policy for unknown agent ids
    pub resolution: AgentResolution,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Request timeout in seconds
    pub request_timeout: u64,
    /// Optional forward/egress proxy every agent dials through
    pub egress_proxy: Option<EgressProxyConfig>,
    /// Default option sets; one is picked at random for each new agent
    pub defaults: Vec<AgentOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgressProxyProtocol {
    Http,
    Socks5,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressProxyConfig {
    pub protocol: EgressProxyProtocol,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EgressProxyConfig {
    /// Proxy URL without credentials
    pub fn url(&self) -> String {
        let scheme = match self.protocol {
            EgressProxyProtocol::Http => "http",
            EgressProxyProtocol::Socks5 => "socks5h",
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

/// Shape of the optional YAML defaults file
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    agents: Vec<AgentOptions>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let resolution_raw = get_env_or("CLEARWAY_AGENT_RESOLUTION", "lenient");
        let resolution = AgentResolution::from_str(&resolution_raw).ok_or_else(|| {
            ClearwayError::InvalidConfig(format!(
                "CLEARWAY_AGENT_RESOLUTION must be lenient or strict, got {}",
                resolution_raw
            ))
        })?;

        let config_path = get_env_or("CLEARWAY_CONFIG_PATH", DEFAULT_CONFIG_PATH);

        Ok(Config {
            server: ServerConfig {
                port: get_env_or("CLEARWAY_PORT", "5000").parse().map_err(|_| {
                    ClearwayError::InvalidConfig(
                        "CLEARWAY_PORT must be a valid port number".into(),
                    )
                })?,
                host: get_env_or("CLEARWAY_HOST", "0.0.0.0"),
                web_root: normalize_web_root(&get_env_or("CLEARWAY_WEB_ROOT", "/"))?,
                cors_origins: get_env_or("CLEARWAY_CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            agents: AgentConfig {
                resolution,
                connect_timeout: get_env_or("CLEARWAY_CONNECT_TIMEOUT", "10")
                    .parse()
                    .unwrap_or(10),
                request_timeout: get_env_or("CLEARWAY_REQUEST_TIMEOUT", "30")
                    .parse()
                    .unwrap_or(30),
                egress_proxy: parse_egress_proxy()?,
                defaults: load_agent_defaults(Path::new(&config_path))?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "json"),
            },
        })
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Read default agent option sets from a YAML file.
///
/// A missing file means a single empty option set.
pub fn load_agent_defaults(path: &Path) -> Result<Vec<AgentOptions>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(vec![AgentOptions::default()]);
        }
        Err(e) => return Err(e.into()),
    };
    parse_agent_defaults(&raw).map_err(|e| {
        ClearwayError::InvalidConfig(format!(
            "There was an error parsing the configuration file at {}: {}",
            path.display(),
            e
        ))
    })
}

fn parse_agent_defaults(raw: &str) -> Result<Vec<AgentOptions>> {
    if raw.trim().is_empty() {
        return Ok(vec![AgentOptions::default()]);
    }

    let file: FileConfig = serde_yaml::from_str(raw)?;
    for options in &file.agents {
        options.validate()?;
    }

    if file.agents.is_empty() {
        Ok(vec![AgentOptions::default()])
    } else {
        Ok(file.agents)
    }
}

fn normalize_web_root(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }
    if !trimmed.starts_with('/') {
        return Err(ClearwayError::InvalidConfig(
            "CLEARWAY_WEB_ROOT must start with '/'".into(),
        ));
    }
    Ok(trimmed.to_string())
}

fn parse_egress_proxy() -> Result<Option<EgressProxyConfig>> {
    let raw = env::var("CLEARWAY_EGRESS_PROXY").unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let url = Url::parse(raw).map_err(|e| {
        ClearwayError::InvalidConfig(format!("CLEARWAY_EGRESS_PROXY must be a valid URL: {}", e))
    })?;

    if url.fragment().is_some() || url.query().is_some() {
        return Err(ClearwayError::InvalidConfig(
            "CLEARWAY_EGRESS_PROXY must not include query/fragment".into(),
        ));
    }
    if !(url.path().is_empty() || url.path() == "/") {
        return Err(ClearwayError::InvalidConfig(
            "CLEARWAY_EGRESS_PROXY must not include a path".into(),
        ));
    }

    let protocol = match url.scheme().to_lowercase().as_str() {
        "http" | "https" => EgressProxyProtocol::Http,
        "socks5" | "socks5h" => EgressProxyProtocol::Socks5,
        other => {
            return Err(ClearwayError::InvalidConfig(format!(
                "CLEARWAY_EGRESS_PROXY has unsupported scheme: {}",
                other
            )))
        }
    };

    let host = url.host_str().ok_or_else(|| {
        ClearwayError::InvalidConfig("CLEARWAY_EGRESS_PROXY must include a host".into())
    })?;

    let port = match url.port() {
        Some(p) => p,
        None => match protocol {
            EgressProxyProtocol::Http => 80,
            EgressProxyProtocol::Socks5 => 1080,
        },
    };

    let username = if url.username().is_empty() {
        None
    } else {
        Some(url.username().to_string())
    };

    let password = match (protocol, &username, url.password()) {
        (_, None, _) => None,
        (EgressProxyProtocol::Http, Some(_), None) => Some(String::new()),
        (EgressProxyProtocol::Http, Some(_), Some(p)) => Some(p.to_string()),
        (EgressProxyProtocol::Socks5, Some(_), Some(p)) if !p.is_empty() => Some(p.to_string()),
        (EgressProxyProtocol::Socks5, Some(_), _) => {
            return Err(ClearwayError::InvalidConfig(
                "CLEARWAY_EGRESS_PROXY socks5 auth requires a non-empty password".into(),
            ))
        }
    };

    Ok(Some(EgressProxyConfig {
        protocol,
        host: host.to_string(),
        port,
        username,
        password,
    }))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
