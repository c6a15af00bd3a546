// Gateway Configuration
// Command-line flags with environment fallbacks (a `.env` file is loaded first by the binary)

use crate::db::error::DbError;
use crate::db::retry::RetryPolicy;
use crate::server::ServerConfig;
use clap::{ArgAction, Args, Parser};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tiberius::{AuthMethod, Config, EncryptionLevel};

#[derive(Parser, Debug, Clone)]
#[command(name = "athlete-gateway", version, about = "REST gateway over athlete stored procedures")]
pub struct Settings {
    /// Address to bind the HTTP server to
    #[arg(long, short = 'b', env = "GATEWAY_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub database: DatabaseSettings,

    /// Total attempts per stored procedure call, including the first
    #[arg(long, env = "SQL_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Fixed delay between attempts, in seconds
    #[arg(long, env = "SQL_RETRY_DELAY_SECS", default_value_t = 10)]
    pub retry_delay_secs: u64,
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind,
        }
    }
}

/// SQL Server connection settings
#[derive(Args, Clone)]
pub struct DatabaseSettings {
    /// SQL Server host name or address
    #[arg(long = "server", env = "SQL_SERVER")]
    pub host: String,

    #[arg(long, env = "SQL_PORT", default_value_t = 1433)]
    pub port: u16,

    #[arg(long, env = "SQL_DATABASE")]
    pub database: String,

    #[arg(long = "user", env = "SQL_USER")]
    pub username: String,

    #[arg(long, env = "SQL_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Require an encrypted connection
    #[arg(long, env = "SQL_ENCRYPT", default_value_t = false, action = ArgAction::Set)]
    pub encrypt: bool,

    /// Accept the server certificate without validation
    #[arg(long = "trust-cert", env = "SQL_TRUST_CERT", default_value_t = true, action = ArgAction::Set)]
    pub trust_certificate: bool,
}

impl DatabaseSettings {
    pub fn new(host: String, port: u16, database: String, username: String, password: String) -> Self {
        Self {
            host,
            port,
            database,
            username,
            password,
            encrypt: false,
            trust_certificate: true,
        }
    }

    pub fn validate(&self) -> Result<(), DbError> {
        if self.host.trim().is_empty() {
            return Err(DbError::Config("Server is required".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(DbError::Config("Database name is required".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(DbError::Config("Username is required".to_string()));
        }
        Ok(())
    }

    /// Application name reported to the server, taken from the host name
    pub fn application_name(&self) -> String {
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Create a tiberius Config from these settings
    pub fn to_tiberius_config(&self) -> Result<Config, DbError> {
        self.validate()?;

        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.application_name(self.application_name());
        config.authentication(AuthMethod::sql_server(&self.username, &self.password));

        if self.trust_certificate {
            config.trust_cert();
        }

        config.encryption(if self.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::Off
        });

        Ok(config)
    }
}

// Keeps the password out of logs
impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("encrypt", &self.encrypt)
            .field("trust_certificate", &self.trust_certificate)
            .finish()
    }
}

impl fmt::Display for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SERVER={},{};DATABASE={};UID={};APP={}",
            self.host,
            self.port,
            self.database,
            self.username,
            self.application_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DatabaseSettings {
        DatabaseSettings::new(
            "localhost".to_string(),
            1433,
            "athletes".to_string(),
            "sa".to_string(),
            "password123".to_string(),
        )
    }

    #[test]
    fn test_database_settings_defaults() {
        let config = settings();
        assert!(config.trust_certificate);
        assert!(!config.encrypt);
        assert_eq!(config.addr(), "localhost:1433");
    }

    #[test]
    fn test_validate_requires_fields() {
        assert!(settings().validate().is_ok());

        let mut missing_host = settings();
        missing_host.host = "  ".to_string();
        assert!(matches!(missing_host.validate(), Err(DbError::Config(_))));

        let mut missing_user = settings();
        missing_user.username = String::new();
        assert!(missing_user.validate().is_err());

        let mut missing_db = settings();
        missing_db.database = String::new();
        assert!(missing_db.validate().is_err());
    }

    #[test]
    fn test_tiberius_config_conversion() {
        let mut config = settings();
        config.encrypt = true;
        config.trust_certificate = false;

        assert!(config.to_tiberius_config().is_ok());
    }

    #[test]
    fn test_password_never_rendered() {
        let config = settings();
        assert!(!format!("{:?}", config).contains("password123"));
        assert!(!config.to_string().contains("password123"));
        assert!(config.to_string().contains("APP="));
    }

    #[test]
    fn test_application_name_not_empty() {
        assert!(!settings().application_name().is_empty());
    }

    #[test]
    fn test_parse_from_flags() {
        // Every env-backed option is given on the command line, so ambient
        // SQL_* and GATEWAY_* variables cannot leak into the result
        let parsed = Settings::try_parse_from([
            "athlete-gateway",
            "--bind",
            "127.0.0.1:5050",
            "--server",
            "db.internal",
            "--port",
            "14330",
            "--database",
            "athletes",
            "--user",
            "gateway",
            "--password",
            "secret",
            "--encrypt",
            "true",
            "--trust-cert",
            "false",
            "--retry-attempts",
            "5",
            "--retry-delay-secs",
            "1",
        ])
        .unwrap();

        assert_eq!(parsed.database.host, "db.internal");
        assert_eq!(parsed.database.port, 14330);
        assert_eq!(parsed.database.database, "athletes");
        assert_eq!(parsed.database.username, "gateway");
        assert_eq!(parsed.database.password, "secret");
        assert!(parsed.database.encrypt);
        assert!(!parsed.database.trust_certificate);
        assert_eq!(parsed.retry_policy(), RetryPolicy::new(5, Duration::from_secs(1)));
        assert_eq!(
            parsed.server_config().bind_addr,
            "127.0.0.1:5050".parse::<std::net::SocketAddr>().unwrap()
        );
    }
}
