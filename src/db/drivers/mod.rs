// Database Drivers

pub mod mssql;

pub use mssql::{MssqlConnector, MssqlSession};
