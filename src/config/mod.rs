use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origin: String,
    pub allowed_methods: Vec<String>,
    pub max_age: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeartbeatConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub server_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub heartbeat: HeartbeatConfig,
    pub client: ClientConfig,
}

/// Built-in defaults shared by every way of loading settings.
fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
    environment: &str,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("environment", environment)?
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 3001)?
        .set_default("server.workers", num_cpus::get() as i64)?
        .set_default("cors.enabled", true)?
        .set_default("cors.allowed_origin", "http://localhost:3000")?
        .set_default("cors.allowed_methods", vec!["GET", "POST", "PUT", "DELETE"])?
        .set_default("cors.max_age", 3600)?
        .set_default("heartbeat.interval_secs", 25)?
        .set_default("heartbeat.timeout_secs", 45)?
        .set_default("client.server_url", "ws://127.0.0.1:3001/ws")
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = with_defaults(Config::builder(), "development")?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))

            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_SERVER__PORT=5001` would set `Settings.server.port`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults only, no files or environment, so tests stay independent of the host.
    pub fn new_for_test() -> Result<Self, ConfigError> {
        with_defaults(Config::builder(), "test")?
            .set_override("server.port", 0)?
            .set_override("server.workers", 1)?
            .build()?
            .try_deserialize()
    }

    /// Rejects values the server cannot run with. A zero ping interval would
    /// panic the session timer, and a timeout no longer than the interval
    /// drops peers before they get a chance to answer a ping.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let heartbeat = &self.heartbeat;
        if heartbeat.interval_secs == 0 {
            return Err(ConfigError::Message(
                "heartbeat.interval_secs must be greater than zero".to_string(),
            ));
        }
        if heartbeat.timeout_secs <= heartbeat.interval_secs {
            return Err(ConfigError::Message(format!(
                "heartbeat.timeout_secs ({}) must be greater than heartbeat.interval_secs ({})",
                heartbeat.timeout_secs, heartbeat.interval_secs
            )));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::new_for_test().expect("Failed to load settings");
        assert_eq!(settings.environment, "test");
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.server.workers, 1);
        assert!(settings.cors.enabled);
        assert_eq!(settings.cors.allowed_origin, "http://localhost:3000");
        assert_eq!(settings.cors.allowed_methods, vec!["GET", "POST", "PUT", "DELETE"]);
        assert_eq!(settings.heartbeat.interval_secs, 25);
        assert_eq!(settings.heartbeat.timeout_secs, 45);
        assert_eq!(settings.client.server_url, "ws://127.0.0.1:3001/ws");
    }

    #[test]
    fn test_default_port_matches_ui_expectation() {
        let settings = with_defaults(Config::builder(), "development")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();
        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.bind_address(), "127.0.0.1:3001");
        assert_eq!(settings.server.workers as usize, num_cpus::get());
    }

    #[test]
    fn test_environment_override() {
        // A test-only prefix keeps this from racing with other tests reading `APP_*`.
        env::set_var("RELAYENVTEST_SERVER__PORT", "9000");
        env::set_var("RELAYENVTEST_CORS__ALLOWED_ORIGIN", "http://127.0.0.1:5173");
        env::set_var("RELAYENVTEST_HEARTBEAT__TIMEOUT_SECS", "90");

        let settings = with_defaults(Config::builder(), "test")
            .unwrap()
            .add_source(
                Environment::with_prefix("relayenvtest")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()
            .expect("Failed to build config")
            .try_deserialize::<Settings>()
            .expect("Failed to deserialize settings");

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.cors.allowed_origin, "http://127.0.0.1:5173");
        assert_eq!(settings.heartbeat.timeout_secs, 90);
        assert_eq!(settings.heartbeat.interval_secs, 25);

        env::remove_var("RELAYENVTEST_SERVER__PORT");
        env::remove_var("RELAYENVTEST_CORS__ALLOWED_ORIGIN");
        env::remove_var("RELAYENVTEST_HEARTBEAT__TIMEOUT_SECS");
    }

    #[test]
    fn test_invalid_port() {
        env::set_var("RELAYBADPORT_SERVER__PORT", "invalid");

        let result = with_defaults(Config::builder(), "test")
            .unwrap()
            .add_source(
                Environment::with_prefix("relaybadport")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()
            .and_then(|config| config.try_deserialize::<Settings>());

        env::remove_var("RELAYBADPORT_SERVER__PORT");

        assert!(result.is_err(), "Expected error for invalid port");
    }

    #[test]
    fn test_heartbeat_validation() {
        let mut settings = Settings::new_for_test().unwrap();
        assert!(settings.validate().is_ok());

        settings.heartbeat.interval_secs = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Message(_))));

        settings.heartbeat.interval_secs = 30;
        settings.heartbeat.timeout_secs = 30;
        assert!(matches!(settings.validate(), Err(ConfigError::Message(_))));

        settings.heartbeat.timeout_secs = 10;
        assert!(settings.validate().is_err());

        settings.heartbeat.timeout_secs = 31;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_heartbeat_from_environment_is_rejected() {
        env::set_var("RELAYZEROBEAT_HEARTBEAT__INTERVAL_SECS", "0");

        let settings = with_defaults(Config::builder(), "test")
            .unwrap()
            .add_source(
                Environment::with_prefix("relayzerobeat")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        env::remove_var("RELAYZEROBEAT_HEARTBEAT__INTERVAL_SECS");

        assert_eq!(settings.heartbeat.interval_secs, 0);
        assert!(settings.validate().is_err());
    }
}
