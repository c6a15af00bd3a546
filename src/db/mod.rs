// Database Module
// Connection management, stored procedure execution and row formatting

pub mod drivers;
pub mod error;
pub mod format;
pub mod manager;
pub mod retry;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use drivers::{MssqlConnector, MssqlSession};
pub use error::DbError;
pub use format::{format_row, FormattedRow};
pub use manager::ConnectionManager;
pub use retry::RetryPolicy;
pub use traits::{Connector, ProcedureCall, Session, SessionId};
pub use value::{Decimal, RawRow, SqlValue};
