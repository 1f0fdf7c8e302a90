// src/config.rs - Configuration management
use serde::Deserialize;
use std::env;
use anyhow::{Context, Result};
use std::path::Path;
use std::fs;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
    pub client_shutdown: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" или "pretty"
    pub format: String,
}

/// Сто лет вперёд
pub const MAX_VIRTUAL_HORIZON_DAYS: i64 = 36_600;

/// Параметры движка расписания
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Показывать виртуальные вхождения для конфигураций без сохранённых строк
    pub materialize_virtual: bool,
    /// Насколько вперёд от текущей даты показывать виртуальные вхождения
    pub virtual_horizon_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
            client_shutdown: 5,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:maintenance.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
            idle_timeout: 600,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
            max_request_size: 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            materialize_virtual: true,
            virtual_horizon_days: 366,
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = if let Ok(config_file) = env::var("CONFIG_FILE") {
        load_from_file(Path::new(&config_file))?
    } else {
        Config::default()
    };

    apply_overrides(&mut config, |key| env::var(key).ok());

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

pub fn load_from_file(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Переопределения из окружения; `lookup` отделён от `env::var` ради тестов
fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("BIND_ADDRESS") {
        config.server.host = host;
    }
    if let Some(port_str) = lookup("MAINT_PORT") {
        if let Ok(port) = port_str.parse::<u16>() {
            config.server.port = port;
        }
    }
    if let Some(workers_str) = lookup("MAINT_WORKERS") {
        if let Ok(workers) = workers_str.parse::<usize>() {
            config.server.workers = Some(workers);
        }
    }
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(max_conn_str) = lookup("DATABASE_MAX_CONNECTIONS") {
        if let Ok(max_conn) = max_conn_str.parse::<u32>() {
            config.database.max_connections = max_conn;
        }
    }
    if let Some(origins_str) = lookup("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(level) = lookup("RUST_LOG") {
        config.logging.level = level;
    }
    if let Some(flag) = lookup("SCHEDULE_MATERIALIZE_VIRTUAL") {
        match flag.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => config.schedule.materialize_virtual = true,
            "0" | "false" | "no" | "off" => config.schedule.materialize_virtual = false,
            other => log::warn!("Ignoring SCHEDULE_MATERIALIZE_VIRTUAL={}", other),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections < self.database.min_connections {
            return Err(anyhow::anyhow!(
                "max_connections ({}) must be >= min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            ));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("max_connections must be at least 1"));
        }

        if !(0..=MAX_VIRTUAL_HORIZON_DAYS).contains(&self.schedule.virtual_horizon_days) {
            return Err(anyhow::anyhow!(
                "virtual_horizon_days must be between 0 and {} (current: {})",
                MAX_VIRTUAL_HORIZON_DAYS,
                self.schedule.virtual_horizon_days
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        env::var("MAINT_ENV").map(|v| v == "production").unwrap_or(false)
    }

    pub fn print_startup_info(&self) {
        log::info!("🛠  Maintenance scheduler starting up...");
        log::info!("🌐 Server: {}:{}", self.server.host, self.server.port);
        log::info!("💾 Database: {}", self.database.url);
        log::info!("📊 Logging: {} level", self.logging.level);
        log::info!(
            "📅 Virtual occurrences: {} (horizon {} days)",
            if self.schedule.materialize_virtual { "Enabled" } else { "Disabled" },
            self.schedule.virtual_horizon_days
        );

        if !self.is_production() {
            log::warn!("🚧 Running in development mode");
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.schedule.materialize_virtual);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Некорректные соединения БД
        config.database.max_connections = 1;
        config.database.min_connections = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schedule.virtual_horizon_days = -1;
        assert!(config.validate().is_err());

        config.schedule.virtual_horizon_days = 200_000_000;
        assert!(config.validate().is_err());

        config.schedule.virtual_horizon_days = MAX_VIRTUAL_HORIZON_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_loading() -> Result<()> {
        let toml_content = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [schedule]
        materialize_virtual = false
        "#;

        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(toml_content.as_bytes())?;
        temp_file.flush()?;

        let config = load_from_file(temp_file.path())?;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert!(!config.schedule.materialize_virtual);
        // Отсутствующие секции берутся по умолчанию
        assert_eq!(config.database.url, "sqlite:maintenance.db");
        assert_eq!(config.schedule.virtual_horizon_days, 366);

        Ok(())
    }

    #[test]
    fn test_broken_toml_is_reported() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(b"[server\nport = ")?;
        temp_file.flush()?;

        let err = load_from_file(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
        Ok(())
    }

    #[test]
    fn test_env_override() {
        let vars: HashMap<&str, &str> = [
            ("MAINT_PORT", "9090"),
            ("MAINT_WORKERS", "not-a-number"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("ALLOWED_ORIGINS", "http://a.test, ,http://b.test"),
            ("SCHEDULE_MATERIALIZE_VIRTUAL", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.workers, None);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.security.allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert!(!config.schedule.materialize_virtual);
    }
}
