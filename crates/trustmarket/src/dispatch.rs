//! String dispatch: one named function plus positional string arguments in,
//! one JSON payload or one [`Error`] out.

use crate::{
    error::Error,
    market::{IndexedKind, Marketplace},
};
use serde::Serialize;
use trustmarket_core::{db::KeyValueStore, entity::Role, sanitize::Sanitizer, types::Amount};

impl<S: KeyValueStore> Marketplace<S> {
    /// Route `function` to its operation and encode the result as JSON.
    ///
    /// Arity is checked before any store access. Unknown function names are
    /// `InvalidArgument`.
    pub fn invoke(&mut self, function: &str, args: &[String]) -> Result<String, Error> {
        tracing::debug!(function, args = args.len(), "invoke");

        let result = self.route(function, args);
        if let Err(err) = &result {
            tracing::debug!(function, error = %err, "invoke failed");
        }

        result
    }

    fn route(&mut self, function: &str, args: &[String]) -> Result<String, Error> {
        match function {
            "InitAgent" => {
                let [id, name, address] = take::<3>(function, args)?;
                respond(&self.init_agent(id, name, address)?)
            }
            "InitService" => {
                let [id, name, description] = take::<3>(function, args)?;
                respond(&self.init_service(id, name, description)?)
            }
            "InitServiceAgentRelation" => {
                let args = Sanitizer::arity(function, args, 4, 5)?;
                let cost: Amount = args[2].parse()?;
                let time: Amount = args[3].parse()?;
                let reputation = args
                    .get(4)
                    .map(|raw| parse_number("reputation", raw))
                    .transpose()?;

                respond(&self.init_relation(&args[0], &args[1], cost, time, reputation)?)
            }
            "GetAgent" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.get_agent(id)?)
            }
            "GetService" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.get_service(id)?)
            }
            "GetServiceRelationAgent" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.get_relation(id)?)
            }
            "ModifyAgent" => {
                let [id, name, address] = take::<3>(function, args)?;
                respond(&self.modify_agent(id, name, address)?)
            }
            "ModifyService" => {
                let [id, name, description] = take::<3>(function, args)?;
                respond(&self.modify_service(id, name, description)?)
            }
            "DeleteService" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.delete_service(id)?)
            }
            "DeleteAgent" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.delete_agent(id)?)
            }
            "ModifyReputationValue" => {
                let [service_id, agent_id, role, rating] = take::<4>(function, args)?;
                let role: Role = role.parse()?;
                let rating = parse_number("rating", rating)?;

                respond(&self.modify_reputation(service_id, agent_id, role, rating)?)
            }
            "GetAgentsByService" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.agents_by_service(id)?)
            }
            "GetServicesByAgent" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.services_by_agent(id)?)
            }
            "GetAgentsByAddress" => {
                let [address] = take::<1>(function, args)?;
                respond(&self.agents_by_address(address)?)
            }
            "GetServicesByName" => {
                let [name] = take::<1>(function, args)?;
                respond(&self.services_by_name(name)?)
            }
            "GetHistory" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.relation_history(id)?)
            }
            "GetServiceHistory" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.service_history(id)?)
            }
            "GetAgentHistory" => {
                let [id] = take::<1>(function, args)?;
                respond(&self.agent_history(id)?)
            }
            "GetReputationHistory" => {
                let [service_id, agent_id] = take::<2>(function, args)?;
                respond(&self.reputation_history(service_id, agent_id)?)
            }
            "RebuildIndexes" => {
                let [kind] = take::<1>(function, args)?;
                respond(&self.rebuild_indexes(parse_kind(kind)?)?)
            }
            "VerifyIndexes" => {
                let [kind] = take::<1>(function, args)?;
                respond(&self.verify_indexes(parse_kind(kind)?)?)
            }
            other => Err(Error::invalid_argument(format!(
                "unknown function '{}'",
                other.escape_debug()
            ))),
        }
    }
}

// Exactly N arguments, borrowed as string slices.
fn take<'a, const N: usize>(function: &str, args: &'a [String]) -> Result<[&'a str; N], Error> {
    let args = Sanitizer::arity(function, args, N, N)?;

    Ok(std::array::from_fn(|i| args[i].as_str()))
}

fn parse_number(field: &str, raw: &str) -> Result<f64, Error> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| Error::invalid_argument(format!("{field} '{raw}' is not a finite number")))
}

fn parse_kind(raw: &str) -> Result<IndexedKind, Error> {
    raw.parse().map_err(|_| {
        Error::invalid_argument(format!(
            "'{raw}' is not an indexed entity kind (Agent, Service, Relation)"
        ))
    })
}

fn respond<T: Serialize>(payload: &T) -> Result<String, Error> {
    serde_json::to_string(payload).map_err(|err| Error::serialize(&err))
}

///
/// TESTS
///
