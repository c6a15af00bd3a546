// Scripted test doubles for the driver seam

use super::error::DbError;
use super::traits::{Connector, ProcedureCall, Session, SessionId};
use super::value::RawRow;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What the next procedure call should produce
#[derive(Debug, Clone)]
pub enum Step {
    Rows(Vec<RawRow>),
    Fail(DbError),
    /// Never completes, like a server that stopped answering mid-call
    Hang,
}

impl Step {
    pub fn row(row: RawRow) -> Self {
        Step::Rows(vec![row])
    }

    pub fn empty() -> Self {
        Step::Rows(Vec::new())
    }
}

/// Everything the doubles observed
#[derive(Debug, Default)]
pub struct Journal {
    pub connects: Vec<SessionId>,
    pub calls: Vec<(SessionId, ProcedureCall)>,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug)]
enum ConnectStep {
    Fail(DbError),
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    connects: VecDeque<ConnectStep>,
    steps: VecDeque<Step>,
}

/// Connector whose sessions replay a shared script. Calls beyond the end of
/// the script return no rows.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, step: Step) -> Self {
        self.script.lock().unwrap().steps.push_back(step);
        self
    }

    pub fn then_fail_connect(self, err: DbError) -> Self {
        self.script.lock().unwrap().connects.push_back(ConnectStep::Fail(err));
        self
    }

    pub fn then_hang_connect(self) -> Self {
        self.script.lock().unwrap().connects.push_back(ConnectStep::Hang);
        self
    }

    pub fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn connect(&self) -> Result<ScriptedSession, DbError> {
        let step = self.script.lock().unwrap().connects.pop_front();
        match step {
            Some(ConnectStep::Fail(err)) => return Err(err),
            Some(ConnectStep::Hang) => std::future::pending::<()>().await,
            None => {}
        }

        let id = SessionId::new();
        self.journal.lock().unwrap().connects.push(id);
        Ok(ScriptedSession {
            id,
            script: Arc::clone(&self.script),
            journal: Arc::clone(&self.journal),
        })
    }
}

pub struct ScriptedSession {
    id: SessionId,
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait::async_trait]
impl Session for ScriptedSession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn call_procedure(&mut self, call: &ProcedureCall) -> Result<Option<RawRow>, DbError> {
        self.journal.lock().unwrap().calls.push((self.id, call.clone()));

        let step = self.script.lock().unwrap().steps.pop_front();
        match step.unwrap_or_else(Step::empty) {
            Step::Rows(rows) => Ok(rows.into_iter().next()),
            Step::Fail(err) => Err(err),
            Step::Hang => std::future::pending().await,
        }
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.journal.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.journal.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}
