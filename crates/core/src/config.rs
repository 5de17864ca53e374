use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub approval: ApprovalConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Base of the customer-facing approval links, e.g. `https://shop.example`.
    pub public_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ApprovalConfig {
    /// Key for the HMAC over customer approval tokens.
    pub secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub approval_secret: Option<String>,
    pub public_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://shopfloor.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                public_base_url: "http://localhost:8080".to_string(),
            },
            approval: ApprovalConfig { secret: "dev-only-approval-secret".to_string().into() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    approval: Option<ApprovalPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    public_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalPatch {
    secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shopfloor.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(public_base_url) = server.public_base_url {
                self.server.public_base_url = public_base_url;
            }
        }

        if let Some(approval) = patch.approval {
            if let Some(secret) = approval.secret {
                self.approval.secret = secret.into();
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPFLOOR_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SHOPFLOOR_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SHOPFLOOR_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SHOPFLOOR_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SHOPFLOOR_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPFLOOR_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOPFLOOR_SERVER_PORT") {
            self.server.port = parse_u16("SHOPFLOOR_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SHOPFLOOR_SERVER_PUBLIC_BASE_URL") {
            self.server.public_base_url = value;
        }

        if let Some(value) = read_env("SHOPFLOOR_APPROVAL_SECRET") {
            self.approval.secret = value.into();
        }

        if let Some(value) = read_env("SHOPFLOOR_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SHOPFLOOR_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(approval_secret) = overrides.approval_secret {
            self.approval.secret = approval_secret.into();
        }
        if let Some(public_base_url) = overrides.public_base_url {
            self.server.public_base_url = public_base_url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.bind_address must not be empty".to_string(),
            ));
        }
        if !self.server.public_base_url.starts_with("http://")
            && !self.server.public_base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "server.public_base_url must be an http(s) URL".to_string(),
            ));
        }
        if self.approval.secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation("approval.secret must not be empty".to_string()));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level must not be empty".to_string()));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shopfloor.toml"), PathBuf::from("config/shopfloor.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[database]\nurl = \"sqlite://patched.db\"\n\n[server]\nport = 9090\npublic_base_url = \"https://shop.example\"\n\n[approval]\nsecret = \"file-secret\"\n\n[logging]\nformat = \"json\"\n"
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("load patched config");

        assert_eq!(config.database.url, "sqlite://patched.db");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.public_base_url, "https://shop.example");
        assert_eq!(config.approval.secret.expose_secret(), "file-secret");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn programmatic_overrides_win() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                approval_secret: Some("override-secret".to_string()),
                public_base_url: Some("https://portal.example".to_string()),
                log_level: Some("debug".to_string()),
            },
            ..LoadOptions::default()
        })
        .expect("load with overrides");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.approval.secret.expose_secret(), "override-secret");
        assert_eq!(config.server.public_base_url, "https://portal.example");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn interpolation_failure_names_the_variable() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[approval]\nsecret = \"${{SHOPFLOOR_TEST_UNSET_VAR_XYZ}}\"\n")
            .expect("write config");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });

        match result {
            Err(ConfigError::MissingEnvInterpolation { var }) => {
                assert_eq!(var, "SHOPFLOOR_TEST_UNSET_VAR_XYZ");
            }
            other => panic!("expected interpolation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_secret_fails_validation() {
        let mut config = AppConfig::default();
        config.approval.secret = String::new().into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
