// Configuration module entry point
// Loads the service configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Port used when neither `PORT` nor the config file sets one
pub const DEFAULT_PORT: u16 = 3000;

impl Config {
    /// Load configuration from `config.toml` (optional), `SERVER_*` and `PORT`
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config", std::env::var("PORT").ok().as_deref())
    }

    /// Load configuration from specified file path (without extension).
    ///
    /// `port` has the final say over `server.port`, the way the container
    /// platform hands the listening port to the process. A blank value
    /// counts as unset.
    pub fn load_from(config_path: &str, port: Option<&str>) -> Result<Self, config::ConfigError> {
        let port = port
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                raw.trim().parse::<u16>().map_err(|e| {
                    config::ConfigError::Message(format!("Invalid PORT value '{raw}': {e}"))
                })
            })
            .transpose()?;

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.connection_timeout", 60)?
            .set_default("performance.shutdown_grace", 10)?
            .set_default("http.server_name", "fargate-demo")?
            .set_override_option("server.port", port.map(i64::from))?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_FILE: &str = "this-config-file-does-not-exist";

    #[test]
    fn test_defaults_without_port() {
        let cfg = Config::load_from(MISSING_FILE, None).unwrap();
        assert_eq!(cfg.server.port, DEFAULT_PORT);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
    }

    #[test]
    fn test_port_override() {
        let cfg = Config::load_from(MISSING_FILE, Some("8081")).unwrap();
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8081);
    }

    #[test]
    fn test_port_changes_nothing_else() {
        let base = Config::load_from(MISSING_FILE, None).unwrap();
        let moved = Config::load_from(MISSING_FILE, Some("4242")).unwrap();
        assert_eq!(base.server.host, moved.server.host);
        assert_eq!(base.server.workers, moved.server.workers);
        assert_eq!(base.logging.level, moved.logging.level);
        assert_eq!(
            base.performance.connection_timeout,
            moved.performance.connection_timeout
        );
        assert_eq!(base.http.server_name, moved.http.server_name);
    }

    #[test]
    fn test_blank_port_uses_default() {
        for blank in ["", "  "] {
            let cfg = Config::load_from(MISSING_FILE, Some(blank)).unwrap();
            assert_eq!(cfg.server.port, DEFAULT_PORT);
        }
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Config::load_from(MISSING_FILE, Some("http")).is_err());
        assert!(Config::load_from(MISSING_FILE, Some("70000")).is_err());
    }

    #[test]
    fn test_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"127.0.0.1\"\nport = 9000\n\n[logging]\naccess_log_format = \"json\"\n",
        )
        .unwrap();
        let base = path.with_extension("");
        let cfg = Config::load_from(base.to_str().unwrap(), None).unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.logging.access_log_format, "json");

        let cfg = Config::load_from(base.to_str().unwrap(), Some("9100")).unwrap();
        assert_eq!(cfg.server.port, 9100);
    }
}
