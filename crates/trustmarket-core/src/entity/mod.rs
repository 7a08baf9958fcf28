//! Stored entity kinds and their static descriptors.

mod agent;
mod evaluation;
mod relation;
mod service;

pub use agent::{AGENT_BY_ADDRESS, Agent};
pub use evaluation::{Evaluation, Role, RoleParseError};
pub use relation::{BY_AGENT, BY_SERVICE, Relation, relation_id};
pub use service::{SERVICE_BY_NAME, Service};
