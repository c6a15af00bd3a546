// Connection Manager
// Owns the single lazily-created database session and runs stored procedures
// against it with retry and link-failure invalidation

use super::error::DbError;
use super::format::{format_row, FormattedRow};
use super::retry::RetryPolicy;
use super::traits::{Connector, ProcedureCall, Session, SessionId};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Manages one database session on behalf of every request.
///
/// The session is created on first use and taken out of its slot for the
/// duration of each procedure call. It goes back only once the call has been
/// committed or rolled back, so a call abandoned mid-flight drops the session
/// instead of handing an open transaction to the next caller. A communication
/// link failure drops it as well.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    session: Mutex<Option<C::Session>>,
    connected: AtomicBool,
    retry: RetryPolicy,
    open_statements: AtomicUsize,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, retry: RetryPolicy) -> Self {
        Self {
            connector,
            session: Mutex::new(None),
            connected: AtomicBool::new(false),
            retry,
            open_statements: AtomicUsize::new(0),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Execute a stored procedure and return its first row, formatted.
    ///
    /// Returns an empty list when the procedure produced no rows. Transient
    /// failures are retried according to the configured [`RetryPolicy`].
    pub async fn execute_stored_procedure(
        &self,
        procedure: &str,
        payload: Option<&Value>,
    ) -> Result<Vec<FormattedRow>, DbError> {
        let call = ProcedureCall::new(procedure, payload)?;

        self.retry
            .run(DbError::is_transient, |attempt| self.attempt(&call, attempt))
            .await
    }

    /// Open a session if none is cached and return its identity
    pub async fn connection(&self) -> Result<SessionId, DbError> {
        let mut slot = self.session.lock().await;
        let session = self.checkout(&mut slot).await?;
        let id = session.id();
        *slot = Some(session);
        Ok(id)
    }

    /// Drop the cached session, if any
    pub async fn invalidate(&self) {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.take() {
            self.discard(session);
        }
    }

    /// Whether a session is open. A session checked out by an in-flight call
    /// counts as open; a connect still in progress does not.
    pub fn has_connection(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of statements currently executing
    pub fn open_statements(&self) -> usize {
        self.open_statements.load(Ordering::SeqCst)
    }

    async fn attempt(&self, call: &ProcedureCall, attempt: u32) -> Result<Vec<FormattedRow>, DbError> {
        let mut slot = self.session.lock().await;

        let mut session = match self.checkout(&mut slot).await {
            Ok(session) => session,
            Err(err) => {
                Self::log_failure(call, attempt, &err);
                return Err(err);
            }
        };

        // The session is out of the slot until the call is settled. If this
        // future is dropped first, the session is dropped with it.
        let in_flight = InFlight::start(&self.connected, session.id());
        let result = self.run_call(&mut session, call).await;

        match &result {
            Ok(_) => {
                in_flight.settle();
                *slot = Some(session);
            }
            Err(err) => {
                Self::log_failure(call, attempt, err);

                if err.is_link_failure() {
                    // The session is in an unusable state
                    in_flight.settle();
                    self.discard(session);
                } else {
                    let rollback = session.rollback().await;
                    in_flight.settle();
                    match rollback {
                        Ok(()) => *slot = Some(session),
                        Err(rollback_err) => {
                            tracing::warn!(session = %session.id(), error = %rollback_err, "Rollback failed");
                            self.discard(session);
                        }
                    }
                }
            }
        }

        result
    }

    async fn run_call(
        &self,
        session: &mut C::Session,
        call: &ProcedureCall,
    ) -> Result<Vec<FormattedRow>, DbError> {
        let _statement = StatementScope::open(&self.open_statements, session.id(), &call.procedure);

        let row = session.call_procedure(call).await?;
        let rows: Vec<FormattedRow> = row.iter().map(format_row).collect();

        session.commit().await?;
        Ok(rows)
    }

    /// Take the cached session out of the slot, connecting if there is none
    async fn checkout(&self, slot: &mut Option<C::Session>) -> Result<C::Session, DbError> {
        let session = match slot.take() {
            Some(session) => session,
            None => {
                let session = self.connector.connect().await?;
                tracing::info!(session = %session.id(), "Opened database connection");
                session
            }
        };

        self.connected.store(true, Ordering::SeqCst);
        Ok(session)
    }

    fn discard(&self, session: C::Session) {
        self.connected.store(false, Ordering::SeqCst);
        tracing::warn!(session = %session.id(), "Discarding database connection");
    }

    fn log_failure(call: &ProcedureCall, attempt: u32, err: &DbError) {
        tracing::error!(
            procedure = %call.procedure,
            attempt,
            state = err.state().unwrap_or("-"),
            "{}",
            err.message()
        );
    }
}

/// Marks a checked-out session as busy. Dropped without [`InFlight::settle`],
/// the call was abandoned and its session is gone.
struct InFlight<'a> {
    connected: &'a AtomicBool,
    session: SessionId,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn start(connected: &'a AtomicBool, session: SessionId) -> Self {
        Self {
            connected,
            session,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.connected.store(false, Ordering::SeqCst);
            tracing::warn!(session = %self.session, "Call abandoned mid-flight, dropping database connection");
        }
    }
}

/// Tracks a statement from execution until release. Dropping the scope
/// releases it on every path, including early returns through `?`.
struct StatementScope<'a> {
    counter: &'a AtomicUsize,
    session: SessionId,
}

impl<'a> StatementScope<'a> {
    fn open(counter: &'a AtomicUsize, session: SessionId, procedure: &str) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(%session, procedure, "Statement opened");
        Self { counter, session }
    }
}

impl Drop for StatementScope<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(session = %self.session, "Statement released");
    }
}
