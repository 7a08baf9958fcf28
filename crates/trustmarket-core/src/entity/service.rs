use crate::{
    error::InternalError,
    model::{entity::EntityModel, index::IndexModel},
    sanitize::Sanitizer,
    traits::EntityKind,
};
use serde::{Deserialize, Serialize};

pub const SERVICE_BY_NAME: IndexModel = IndexModel::new("serviceByName", &["Name", "ServiceId"]);

const SERVICE_MODEL: EntityModel = EntityModel {
    entity_name: "service",
    primary_key: "ServiceId",
    indexes: &[SERVICE_BY_NAME],
};

///
/// Service
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Service {
    pub service_id: String,
    pub name: String,
    pub description: String,
}

impl Service {
    #[must_use]
    pub fn new(
        service_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

impl EntityKind for Service {
    const MODEL: &'static EntityModel = &SERVICE_MODEL;

    fn primary_key(&self) -> &str {
        &self.service_id
    }

    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            "ServiceId" => Some(&self.service_id),
            "Name" => Some(&self.name),
            _ => None,
        }
    }

    fn sanitize(&self, sanitizer: &Sanitizer) -> Result<(), InternalError> {
        sanitizer.key_field("ServiceId", &self.service_id)?;
        sanitizer.key_field("Name", &self.name)?;
        sanitizer.text_field("Description", &self.description)?;

        Ok(())
    }
}
