// Query Dispatch
// Maps an HTTP verb and entity kind onto the `{verb}_{entity}` stored procedure

use crate::db::{ConnectionManager, Connector, DbError, FormattedRow};
use serde_json::Value;
use std::fmt;

/// Resource kinds exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Athlete,
    Athletes,
}

impl Entity {
    /// Procedure-name suffix for this entity (lowercased type name)
    pub fn name(&self) -> &'static str {
        match self {
            Entity::Athlete => "athlete",
            Entity::Athletes => "athletes",
        }
    }

    pub fn procedure(&self, verb: Verb) -> String {
        format!("{}_{}", verb.action(), self.name())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn action(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        }
    }
}

/// A resource bound to its entity kind at route registration time
#[derive(Debug, Clone, Copy)]
pub struct Queryable {
    entity: Entity,
}

impl Queryable {
    pub const fn new(entity: Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Run `{verb}_{entity}` with the given payload
    pub async fn execute<C: Connector>(
        &self,
        manager: &ConnectionManager<C>,
        verb: Verb,
        payload: Option<Value>,
    ) -> Result<Vec<FormattedRow>, DbError> {
        let procedure = self.entity.procedure(verb);
        tracing::debug!(%procedure, has_payload = payload.is_some(), "Dispatching");
        manager.execute_stored_procedure(&procedure, payload.as_ref()).await
    }
}

pub const ATHLETE: Queryable = Queryable::new(Entity::Athlete);
pub const ATHLETES: Queryable = Queryable::new(Entity::Athletes);
