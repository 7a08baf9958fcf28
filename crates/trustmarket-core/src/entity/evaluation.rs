use crate::{
    entity::relation_id,
    error::{ErrorOrigin, InternalError},
    model::entity::EntityModel,
    sanitize::Sanitizer,
    traits::EntityKind,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error as ThisError;

const EVALUATION_MODEL: EntityModel = EntityModel {
    entity_name: "evaluation",
    primary_key: "RelationId",
    indexes: &[],
};

///
/// Role
/// Side of the exchange the rating was given from.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Role {
    #[display("EXECUTER")]
    #[serde(rename = "EXECUTER")]
    Executer,

    #[display("DEMANDER")]
    #[serde(rename = "DEMANDER")]
    Demander,
}

///
/// RoleParseError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
#[error("unknown role '{0}' (expected EXECUTER or DEMANDER)")]
pub struct RoleParseError(pub String);

impl From<RoleParseError> for InternalError {
    fn from(err: RoleParseError) -> Self {
        Self::invalid_argument(ErrorOrigin::Sanitize, err.to_string())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXECUTER" => Ok(Self::Executer),
            "DEMANDER" => Ok(Self::Demander),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

///
/// Evaluation
///
/// Latest rating given on one relation. Every write is a new version of the
/// same key; the version history is the relation's reputation event log.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Evaluation {
    pub relation_id: String,
    pub service_id: String,
    pub agent_id: String,
    pub role: Role,
    pub rating: f64,
}

impl EntityKind for Evaluation {
    const MODEL: &'static EntityModel = &EVALUATION_MODEL;

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
        if !self.rating.is_finite() {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Sanitize,
                "Rating must be a finite number",
            ));
        }

        Ok(())
    }
}

///
/// TESTS
///
