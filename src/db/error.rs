// Database Errors
// Classifies driver failures into transient (retryable) and execution errors

use thiserror::Error;

/// Communication link failure: the connection is no longer usable
pub const SQLSTATE_LINK_FAILURE: &str = "08S01";
/// Client unable to establish connection
pub const SQLSTATE_CONNECT_FAILED: &str = "08001";
/// Timeout expired / service temporarily unavailable
pub const SQLSTATE_TIMEOUT: &str = "HYT00";
/// Transaction chosen as deadlock victim
pub const SQLSTATE_DEADLOCK: &str = "40001";

/// Server error numbers that indicate a transient service condition (Azure SQL
/// reconfiguration, throttling, database unavailable)
const TRANSIENT_SERVER_CODES: &[u32] = &[4221, 40197, 40501, 40613, 49918, 49919, 49920];
/// Cannot open database / login failed
const CONNECT_SERVER_CODES: &[u32] = &[4060, 18456];
const DEADLOCK_VICTIM: u32 = 1205;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// Connectivity-level failure, worth retrying
    #[error("Operational error [{state}]: {message}")]
    Operational { state: String, message: String },

    /// The statement itself failed (bad procedure, constraint violation, ...)
    #[error("Query execution error: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    pub fn operational(state: &str, message: impl Into<String>) -> Self {
        DbError::Operational {
            state: state.to_string(),
            message: message.into(),
        }
    }

    pub fn link_failure(message: impl Into<String>) -> Self {
        Self::operational(SQLSTATE_LINK_FAILURE, message)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Operational { .. })
    }

    pub fn is_link_failure(&self) -> bool {
        matches!(self, DbError::Operational { state, .. } if state == SQLSTATE_LINK_FAILURE)
    }

    /// SQLSTATE-style code, if the error carries one
    pub fn state(&self) -> Option<&str> {
        match self {
            DbError::Operational { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Human-readable message without the classification prefix
    pub fn message(&self) -> &str {
        match self {
            DbError::Operational { message, .. } => message,
            DbError::Execution(message) | DbError::Config(message) => message,
        }
    }
}

impl From<tiberius::error::Error> for DbError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as TdsError;

        match &err {
            // A desynchronized token stream leaves the session as unusable
            // as a dropped socket
            TdsError::Io { .. } | TdsError::Protocol(_) => DbError::link_failure(err.to_string()),
            TdsError::Tls(_) | TdsError::Routing { .. } => {
                DbError::operational(SQLSTATE_CONNECT_FAILED, err.to_string())
            }
            TdsError::Server(e) => {
                let code = e.code();
                if TRANSIENT_SERVER_CODES.contains(&code) {
                    DbError::operational(SQLSTATE_TIMEOUT, e.message())
                } else if CONNECT_SERVER_CODES.contains(&code) {
                    DbError::operational(SQLSTATE_CONNECT_FAILED, e.message())
                } else if code == DEADLOCK_VICTIM {
                    DbError::operational(SQLSTATE_DEADLOCK, e.message())
                } else {
                    DbError::Execution(format!("{} (error {})", e.message(), code))
                }
            }
            _ => DbError::Execution(err.to_string()),
        }
    }
}
