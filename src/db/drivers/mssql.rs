// MS-SQL Driver
// Connector and session over tiberius on a tokio TCP stream

use crate::config::DatabaseSettings;
use crate::db::error::{DbError, SQLSTATE_CONNECT_FAILED};
use crate::db::traits::{Connector, ProcedureCall, Session, SessionId};
use crate::db::value::{Decimal, RawRow, SqlValue};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::numeric::Numeric;
use tiberius::{Client, ColumnData, ColumnType, Row, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type MssqlClient = Client<Compat<TcpStream>>;

/// MONEY and SMALLMONEY are fixed-point with four decimal places
const MONEY_SCALE: u8 = 4;

/// Opens dedicated (non-pooled) tiberius connections
pub struct MssqlConnector {
    settings: DatabaseSettings,
}

impl MssqlConnector {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }
}

#[async_trait::async_trait]
impl Connector for MssqlConnector {
    type Session = MssqlSession;

    async fn connect(&self) -> Result<MssqlSession, DbError> {
        let config = self.settings.to_tiberius_config()?;

        let tcp = TcpStream::connect(self.settings.addr()).await.map_err(|e| {
            DbError::operational(SQLSTATE_CONNECT_FAILED, format!("TCP connection failed: {}", e))
        })?;

        tcp.set_nodelay(true).map_err(|e| {
            DbError::operational(SQLSTATE_CONNECT_FAILED, format!("Failed to set TCP_NODELAY: {}", e))
        })?;

        let mut client = Client::connect(config, tcp.compat_write()).await?;

        // Each procedure call opens a transaction that stays open until commit
        client
            .simple_query("SET IMPLICIT_TRANSACTIONS ON")
            .await?
            .into_results()
            .await?;

        let session = MssqlSession {
            id: SessionId::new(),
            client,
        };
        tracing::debug!(session = %session.id, server = %self.settings, "Connected to SQL Server");
        Ok(session)
    }
}

pub struct MssqlSession {
    id: SessionId,
    client: MssqlClient,
}

impl MssqlSession {
    async fn batch(&mut self, sql: &str) -> Result<(), DbError> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Session for MssqlSession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn call_procedure(&mut self, call: &ProcedureCall) -> Result<Option<RawRow>, DbError> {
        let statement = call.statement();

        // The stream borrows the client and is dropped with the rest of the
        // result set once the first row is read
        let stream = match &call.payload {
            Some(payload) => {
                let params: [&dyn ToSql; 1] = [payload];
                self.client.query(statement, &params).await?
            }
            None => self.client.simple_query(statement).await?,
        };

        let row = stream.into_row().await?;
        Ok(row.as_ref().map(raw_row))
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.batch("IF @@TRANCOUNT > 0 COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }
}

/// Convert a tiberius row into named raw values
fn raw_row(row: &Row) -> RawRow {
    row.cells()
        .map(|(col, data)| (col.name().to_string(), sql_value(data, col.column_type())))
        .collect()
}

/// Extract a single column value. NULLs and values of unsupported types come
/// back as `SqlValue::Null`.
fn sql_value(data: &ColumnData<'static>, col_type: ColumnType) -> SqlValue {
    let value = match col_type {
        ColumnType::Null => None,

        // Integer types
        ColumnType::Int1 => get::<u8>(data).map(|v| SqlValue::Int(i64::from(v))),
        ColumnType::Int2 => get::<i16>(data).map(|v| SqlValue::Int(i64::from(v))),
        ColumnType::Int4 => get::<i32>(data).map(|v| SqlValue::Int(i64::from(v))),
        ColumnType::Int8 => get::<i64>(data).map(SqlValue::Int),
        ColumnType::Intn => get::<i64>(data)
            .or_else(|| get::<i32>(data).map(i64::from))
            .or_else(|| get::<i16>(data).map(i64::from))
            .or_else(|| get::<u8>(data).map(i64::from))
            .map(SqlValue::Int),

        // Float types
        ColumnType::Float4 => get::<f32>(data).map(|v| SqlValue::Float(f64::from(v))),
        ColumnType::Float8 => get::<f64>(data).map(SqlValue::Float),
        ColumnType::Floatn => get::<f64>(data)
            .or_else(|| get::<f32>(data).map(f64::from))
            .map(SqlValue::Float),

        // Decimal/Numeric types keep their exact digits
        ColumnType::Decimaln | ColumnType::Numericn => get::<Numeric>(data)
            .map(|n| SqlValue::Decimal(Decimal::new(n.value(), n.scale()))),

        // tiberius decodes money as f64; it carries exactly four decimal places
        ColumnType::Money | ColumnType::Money4 => get::<f64>(data).map(|v| {
            let mantissa = (v * 10_000.0).round() as i128;
            SqlValue::Decimal(Decimal::new(mantissa, MONEY_SCALE))
        }),

        // Boolean
        ColumnType::Bit | ColumnType::Bitn => get::<bool>(data).map(SqlValue::Bool),

        // String types
        ColumnType::BigVarChar
        | ColumnType::BigChar
        | ColumnType::NVarchar
        | ColumnType::NChar
        | ColumnType::Text
        | ColumnType::NText => get::<&str>(data).map(|s| SqlValue::String(s.to_string())),

        // Date/Time types
        ColumnType::Datetime
        | ColumnType::Datetime2
        | ColumnType::Datetimen
        | ColumnType::Datetime4 => get::<NaiveDateTime>(data).map(SqlValue::DateTime),
        ColumnType::DatetimeOffsetn => get::<DateTime<FixedOffset>>(data).map(SqlValue::DateTimeOffset),
        ColumnType::Daten => get::<NaiveDate>(data).map(SqlValue::Date),
        ColumnType::Timen => get::<NaiveTime>(data).map(SqlValue::Time),

        // Binary types
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => {
            get::<&[u8]>(data).map(|b| SqlValue::Binary(b.to_vec()))
        }

        ColumnType::Guid => get::<tiberius::Uuid>(data).map(SqlValue::Guid),

        ColumnType::Xml => get::<&tiberius::xml::XmlData>(data)
            .map(|xml| SqlValue::String(xml.to_owned().into_string())),

        // Default: try as string
        _ => get::<&str>(data).map(|s| SqlValue::String(s.to_string())),
    };

    value.unwrap_or(SqlValue::Null)
}

fn get<'a, T>(data: &'a ColumnData<'static>) -> Option<T>
where
    T: tiberius::FromSql<'a>,
{
    T::from_sql(data).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_keeps_settings() {
        let settings = DatabaseSettings::new(
            "localhost".to_string(),
            1433,
            "athletes".to_string(),
            "sa".to_string(),
            "password".to_string(),
        );
        let connector = MssqlConnector::new(settings);
        assert_eq!(connector.settings().addr(), "localhost:1433");
    }

    #[tokio::test]
    async fn test_connect_refused_is_transient() {
        // Port 1 on loopback is not listening
        let settings = DatabaseSettings::new(
            "127.0.0.1".to_string(),
            1,
            "athletes".to_string(),
            "sa".to_string(),
            "password".to_string(),
        );
        let connector = MssqlConnector::new(settings);

        match connector.connect().await {
            Err(err) => {
                assert!(err.is_transient());
                assert_eq!(err.state(), Some(SQLSTATE_CONNECT_FAILED));
            }
            Ok(_) => panic!("connection to a closed port should fail"),
        }
    }

    #[tokio::test]
    async fn test_invalid_settings_fail_before_connecting() {
        let settings = DatabaseSettings::new(
            String::new(),
            1433,
            "athletes".to_string(),
            "sa".to_string(),
            "password".to_string(),
        );
        let connector = MssqlConnector::new(settings);

        assert!(matches!(connector.connect().await, Err(DbError::Config(_))));
    }

    #[test]
    fn test_datetimeoffset_keeps_stored_offset() {
        use tiberius::time::{Date, DateTime2, DateTimeOffset, Time};

        let days = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .signed_duration_since(NaiveDate::from_ymd_opt(1, 1, 1).unwrap())
            .num_days();
        // 12:00 UTC in 100ns increments, stored at +02:00
        let utc_noon = Time::new(12 * 3600 * 10_000_000, 7);
        let stored = DateTimeOffset::new(DateTime2::new(Date::new(days as u32), utc_noon), 120);

        match sql_value(&ColumnData::DateTimeOffset(Some(stored)), ColumnType::DatetimeOffsetn) {
            SqlValue::DateTimeOffset(dt) => {
                assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
                assert_eq!(dt.to_rfc3339(), "2020-01-01T14:00:00+02:00");
            }
            other => panic!("expected a datetimeoffset, got {:?}", other),
        }
    }

    #[test]
    fn test_null_cell_is_null() {
        assert_eq!(sql_value(&ColumnData::I32(None), ColumnType::Intn), SqlValue::Null);
        assert_eq!(
            sql_value(&ColumnData::I32(Some(7)), ColumnType::Intn),
            SqlValue::Int(7)
        );
    }
}
