use crate::{
    error::{ErrorOrigin, InternalError},
    model::{entity::EntityModel, index::IndexModel},
    sanitize::Sanitizer,
    traits::EntityKind,
    types::Amount,
};
use serde::{Deserialize, Serialize};

pub const BY_SERVICE: IndexModel = IndexModel::new("byService", &["ServiceId", "AgentId"]);
pub const BY_AGENT: IndexModel = IndexModel::new("byAgent", &["AgentId", "ServiceId"]);

const RELATION_MODEL: EntityModel = EntityModel {
    entity_name: "relation",
    primary_key: "RelationId",
    indexes: &[BY_SERVICE, BY_AGENT],
};

/// Relation identifiers are the plain concatenation `ServiceId ++ AgentId`.
///
/// The boundary between the two parts is not recoverable from the result;
/// the indexes keep both parts as separate key fields for that reason.
#[must_use]
pub fn relation_id(service_id: &str, agent_id: &str) -> String {
    let mut id = String::with_capacity(service_id.len() + agent_id.len());
    id.push_str(service_id);
    id.push_str(agent_id);
    id
}

///
/// Relation
///
/// Binding of one Service to one Agent with commercial terms and the
/// agent's aggregated reputation for that service.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Relation {
    pub relation_id: String,
    pub service_id: String,
    pub agent_id: String,
    pub cost: Amount,
    pub time: Amount,
    pub agent_reputation: f64,
}

impl Relation {
    #[must_use]
    pub fn new(
        service_id: impl Into<String>,
        agent_id: impl Into<String>,
        cost: Amount,
        time: Amount,
        agent_reputation: f64,
    ) -> Self {
        let service_id = service_id.into();
        let agent_id = agent_id.into();

        Self {
            relation_id: relation_id(&service_id, &agent_id),
            service_id,
            agent_id,
            cost,
            time,
            agent_reputation,
        }
    }

    /// Whether this relation binds exactly `(service_id, agent_id)`.
    #[must_use]
    pub fn binds(&self, service_id: &str, agent_id: &str) -> bool {
        self.service_id == service_id && self.agent_id == agent_id
    }
}

impl EntityKind for Relation {
    const MODEL: &'static EntityModel = &RELATION_MODEL;

    fn primary_key(&self) -> &str {
        &self.relation_id
    }

    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            "RelationId" => Some(&self.relation_id),
            "ServiceId" => Some(&self.service_id),
            "AgentId" => Some(&self.agent_id),
            _ => None,
        }
    }

    fn primary_key_from_index(index: &IndexModel, fields: &[String]) -> Option<String> {
        let service_id = fields.get(index.position("ServiceId")?)?;
        let agent_id = fields.get(index.position("AgentId")?)?;

        Some(relation_id(service_id, agent_id))
    }

    fn sanitize(&self, sanitizer: &Sanitizer) -> Result<(), InternalError> {
        sanitizer.key_field("ServiceId", &self.service_id)?;
        sanitizer.key_field("AgentId", &self.agent_id)?;

        if self.relation_id != relation_id(&self.service_id, &self.agent_id) {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Sanitize,
                format!(
                    "RelationId '{}' must equal ServiceId ++ AgentId ('{}{}')",
                    self.relation_id, self.service_id, self.agent_id
                ),
            ));
        }
        if !self.agent_reputation.is_finite() {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Sanitize,
                "AgentReputation must be a finite number",
            ));
        }

        Ok(())
    }
}

///
/// TESTS
///
