use crate::{
    error::InternalError,
    model::{entity::EntityModel, index::IndexModel},
    sanitize::Sanitizer,
    traits::EntityKind,
};
use serde::{Deserialize, Serialize};

pub const AGENT_BY_ADDRESS: IndexModel = IndexModel::new("agentByAddress", &["Address", "AgentId"]);

const AGENT_MODEL: EntityModel = EntityModel {
    entity_name: "agent",
    primary_key: "AgentId",
    indexes: &[AGENT_BY_ADDRESS],
};

///
/// Agent
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Agent {
    pub agent_id: String,
    pub name: String,
    pub address: String,
}

impl Agent {
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            address: address.into(),
        }
    }
}

impl EntityKind for Agent {
    const MODEL: &'static EntityModel = &AGENT_MODEL;

    fn primary_key(&self) -> &str {
        &self.agent_id
    }

    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            "AgentId" => Some(&self.agent_id),
            "Name" => Some(&self.name),
            "Address" => Some(&self.address),
            _ => None,
        }
    }

    fn sanitize(&self, sanitizer: &Sanitizer) -> Result<(), InternalError> {
        sanitizer.key_field("AgentId", &self.agent_id)?;
        sanitizer.text_field("Name", &self.name)?;
        sanitizer.key_field("Address", &self.address)?;

        Ok(())
    }
}
