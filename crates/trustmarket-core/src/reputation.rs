//! Reputation aggregation over evaluation history.
//!
//! Every evaluation written for a relation is a new version of one
//! `evaluation` record. The live run of versions (those after the most
//! recent delete) is the event sequence the score is computed from.

use crate::{
    config::ReputationConfig,
    db::{
        history::{HistoryReader, Version},
        repository::EntityRepository,
        store::KeyValueStore,
        write::CompositeWrite,
    },
    entity::{Evaluation, Relation, Role},
    error::{ErrorOrigin, InternalError},
    obs::sink::{MetricsEvent, record},
    sanitize::Sanitizer,
};
use serde::Serialize;

///
/// ReputationEvent
///

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReputationEvent {
    pub ordinal: u64,
    pub role: Role,
    pub rating: f64,
}

impl ReputationEvent {
    /// Project evaluation versions into events. A delete discards every
    /// event before it.
    pub fn from_versions<I>(versions: I) -> Result<Vec<Self>, InternalError>
    where
        I: IntoIterator<Item = Result<Version<Evaluation>, InternalError>>,
    {
        let mut events = Vec::new();

        for version in versions {
            let version = version?;
            match version.value {
                Some(evaluation) => events.push(Self {
                    ordinal: version.ordinal,
                    role: evaluation.role,
                    rating: evaluation.rating,
                }),
                None => events.clear(),
            }
        }

        Ok(events)
    }
}

///
/// ReputationAggregator
///
/// Mean rating per role, blended as
/// `w * executer_mean + (1 - w) * demander_mean`. A role with no events
/// drops out and the other role's mean is used alone.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReputationAggregator {
    executer_weight: f64,
}

impl ReputationAggregator {
    #[must_use]
    pub const fn new(executer_weight: f64) -> Self {
        Self { executer_weight }
    }

    #[must_use]
    pub const fn from_config(config: &ReputationConfig) -> Self {
        Self::new(config.executer_weight)
    }

    pub fn aggregate<'a, I>(&self, key: &str, events: I) -> Result<f64, InternalError>
    where
        I: IntoIterator<Item = &'a ReputationEvent>,
    {
        let mut executer = RoleMean::default();
        let mut demander = RoleMean::default();

        for event in events {
            match event.role {
                Role::Executer => executer.push(event.rating),
                Role::Demander => demander.push(event.rating),
            }
        }

        match (executer.mean(), demander.mean()) {
            (Some(e), Some(d)) => {
                let w = self.executer_weight;
                Ok(w.mul_add(e, (1.0 - w) * d))
            }
            (Some(only), None) | (None, Some(only)) => Ok(only),
            (None, None) => Err(InternalError::no_history(key)),
        }
    }
}

impl Default for ReputationAggregator {
    fn default() -> Self {
        Self::from_config(&ReputationConfig::default())
    }
}

#[derive(Default)]
struct RoleMean {
    sum: f64,
    count: u32,
}

impl RoleMean {
    fn push(&mut self, rating: f64) {
        self.sum += rating;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

///
/// ReputationUpdate
/// Outcome of recording one evaluation.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReputationUpdate {
    pub relation: Relation,
    pub events: usize,
}

/// Record an evaluation on an existing relation and write the recomputed
/// score back into its `AgentReputation`.
///
/// The evaluation version and the score update form one write sequence: a
/// failure after the evaluation landed is `IndexConsistency`.
pub fn record_evaluation<S>(
    store: &mut S,
    sanitizer: Sanitizer,
    config: &ReputationConfig,
    evaluation: &Evaluation,
) -> Result<ReputationUpdate, InternalError>
where
    S: KeyValueStore + ?Sized,
{
    if !config.rating_in_range(evaluation.rating) {
        return Err(InternalError::invalid_argument(
            ErrorOrigin::Reputation,
            format!(
                "rating {} lies outside [{}, {}]",
                evaluation.rating, config.min_rating, config.max_rating
            ),
        ));
    }

    let relations = EntityRepository::<Relation>::new(sanitizer);
    let mut relation = relations.read(&*store, &evaluation.relation_id)?;
    if !relation.binds(&evaluation.service_id, &evaluation.agent_id) {
        return Err(InternalError::not_found(
            "relation",
            format!("{} -> {}", evaluation.service_id, evaluation.agent_id),
        ));
    }

    let key = EntityRepository::<Relation>::data_key(&relation.relation_id)?;
    let mut write = CompositeWrite::new(store, "reputation", &key);
    let result = apply_evaluation(&mut write, sanitizer, config, evaluation, &mut relation);
    let events = result.map_err(|err| write.fail(err))?;

    let score = relation.agent_reputation;
    record(MetricsEvent::ReputationUpdated { score });
    tracing::info!(
        relation = %relation.relation_id,
        role = %evaluation.role,
        rating = evaluation.rating,
        events,
        score,
        "reputation updated"
    );

    Ok(ReputationUpdate { relation, events })
}

// Evaluation version first, then the relation score derived from it.
fn apply_evaluation<S>(
    store: &mut S,
    sanitizer: Sanitizer,
    config: &ReputationConfig,
    evaluation: &Evaluation,
    relation: &mut Relation,
) -> Result<usize, InternalError>
where
    S: KeyValueStore + ?Sized,
{
    EntityRepository::<Evaluation>::new(sanitizer).save(store, evaluation)?;

    let versions = HistoryReader::read::<Evaluation, _>(&*store, &evaluation.relation_id)?;
    let events = ReputationEvent::from_versions(versions)?;

    relation.agent_reputation =
        ReputationAggregator::from_config(config).aggregate(&evaluation.relation_id, &events)?;
    EntityRepository::<Relation>::new(sanitizer).update(store, relation)?;

    Ok(events.len())
}

///
/// TESTS
///
