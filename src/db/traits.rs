// Database Driver Traits
// The seam between the connection manager and a concrete database driver

use super::error::DbError;
use super::value::RawRow;
use serde_json::Value;
use std::fmt;

/// Identity of a single live session, stable for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A stored procedure invocation: the procedure name and at most one
/// JSON-serialized parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureCall {
    pub procedure: String,
    pub payload: Option<String>,
}

impl ProcedureCall {
    pub fn new(procedure: impl Into<String>, payload: Option<&Value>) -> Result<Self, DbError> {
        let procedure = procedure.into();
        if !is_valid_procedure_name(&procedure) {
            return Err(DbError::Execution(format!(
                "Invalid stored procedure name: {:?}",
                procedure
            )));
        }

        Ok(Self {
            procedure,
            payload: payload.map(Value::to_string),
        })
    }

    /// The statement text sent to the server
    pub fn statement(&self) -> String {
        match self.payload {
            Some(_) => format!("EXEC {} @P1", self.procedure),
            None => format!("EXEC {}", self.procedure),
        }
    }
}

/// Procedure names are interpolated into the statement, so only plain
/// (optionally schema-qualified) identifiers are accepted
fn is_valid_procedure_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

/// A live database session. Owned exclusively by the connection manager.
#[async_trait::async_trait]
pub trait Session: Send + 'static {
    fn id(&self) -> SessionId;

    /// Execute the procedure and return the first row of the first result
    /// set, if any. Remaining rows are discarded.
    async fn call_procedure(&mut self, call: &ProcedureCall) -> Result<Option<RawRow>, DbError>;

    /// Commit the unit of work opened by the last call
    async fn commit(&mut self) -> Result<(), DbError>;

    /// Roll back the unit of work opened by the last call
    async fn rollback(&mut self) -> Result<(), DbError>;
}

/// Opens new sessions
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    async fn connect(&self) -> Result<Self::Session, DbError>;
}
