use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSTORE_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSTORE_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSTORE";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(None, None)
    }

    /// Like [`Settings::load`], with explicit overrides for the config
    /// directory and environment name.
    pub fn load_with(
        config_dir: Option<PathBuf>,
        environment: Option<String>,
    ) -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = environment
            .or_else(|| std::env::var(ENV_VAR_NAME).ok())
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let config_dir =
            config_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        let config_dir = match config_dir {
            Some(dir) => dir,
            // Default to the `config` directory under the working directory.
            None => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load `base.toml` and `{environment}.toml` from `config_dir`, then apply
    /// `BOOKSTORE_*` environment variables (`__` separates nested keys).
    ///
    /// Variables are read as plain scalars: values such as
    /// `telemetry.filter` keep their commas. The gateway route table is
    /// therefore taken from the files only.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        Self::load_layers(config_dir, environment, env_overlay())
    }

    fn load_layers(
        config_dir: &Path,
        environment: &str,
        overlay: config::Environment,
    ) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(overlay);

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The selected environment always wins over any `environment` key in files.
        settings.environment = parsed_environment;

        Ok(settings)
    }
}

fn env_overlay() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_url")]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn default_url() -> String {
        "sqlite://bookstore.db".to_string()
    }

    fn default_max_connections() -> u32 {
        5
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            max_connections: Self::default_max_connections(),
        }
    }
}

/// Reverse-proxy listener and its static route table.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "GatewaySettings::default_host")]
    pub host: String,
    #[serde(default = "GatewaySettings::default_port")]
    pub port: u16,
    #[serde(default = "GatewaySettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub routes: Vec<RouteSettings>,
}

impl GatewaySettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_request_timeout_ms() -> u64 {
        30000
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            routes: Vec::new(),
        }
    }
}

/// One `[[gateway.routes]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteSettings {
    /// Path prefix matched against incoming requests, e.g. `/books`.
    pub upstream_path: String,
    /// Absolute URL the matched prefix is replaced with.
    pub downstream_url: String,
    /// Allowed methods; empty allows any.
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=debug".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_config_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config")
    }

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_database_is_local_sqlite_file() {
        let settings = Settings::default();
        assert_eq!(settings.database.url, "sqlite://bookstore.db");
        assert_eq!(settings.database.max_connections, 5);
    }

    #[test]
    fn default_gateway_has_no_routes() {
        let settings = Settings::default();
        assert!(settings.gateway.routes.is_empty());
        assert_eq!(settings.gateway.port, 8000);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let err = Settings::load_from(&repo_config_dir(), "qa").unwrap_err();
        assert!(err.to_string().contains("unsupported environment"));
    }

    #[test]
    fn missing_config_dir_falls_back_to_defaults() {
        let settings =
            Settings::load_from(Path::new("/nonexistent/bookstore-config"), "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn env_overlay_overrides_scalars_and_keeps_file_routes() {
        let vars = [
            ("BOOKSTORE_GATEWAY__PORT", "9100"),
            ("BOOKSTORE_DATABASE__URL", "sqlite::memory:"),
            ("BOOKSTORE_TELEMETRY__FILTER", "warn,bookstore=debug"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect::<config::Map<String, String>>();

        let settings = Settings::load_layers(
            &repo_config_dir(),
            "local",
            env_overlay().source(Some(vars)),
        )
        .unwrap();

        assert_eq!(settings.gateway.port, 9100);
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.telemetry.filter, "warn,bookstore=debug");
        assert_eq!(settings.gateway.routes.len(), 1);
        assert_eq!(settings.gateway.routes[0].methods.len(), 4);
    }

    #[test]
    fn repo_config_declares_books_route() {
        let settings = Settings::load_from(&repo_config_dir(), "local").unwrap();
        let books = settings
            .gateway
            .routes
            .iter()
            .find(|route| route.upstream_path == "/books")
            .expect("books route configured");
        assert!(books.downstream_url.ends_with("/api/books"));
        assert!(books.methods.iter().any(|method| method == "PUT"));
    }
}
