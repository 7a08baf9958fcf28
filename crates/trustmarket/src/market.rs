//! Typed marketplace operations over one store handle.

use crate::error::Error;
use derive_more::{Display, FromStr};
use serde::Serialize;
use trustmarket_core::{
    config::MarketConfig,
    db::{
        CompositeWrite, EntityRepository, HistoryReader, IndexManager, KeyValueStore,
        RangeQueryEngine, RebuildReport, ScanPage, Version, VerifyReport,
    },
    entity::{
        AGENT_BY_ADDRESS, Agent, BY_AGENT, BY_SERVICE, Evaluation, Relation, Role,
        SERVICE_BY_NAME, Service, relation_id,
    },
    error::InternalError,
    reputation::{ReputationUpdate, record_evaluation},
    sanitize::Sanitizer,
    traits::EntityKind,
    types::Amount,
};

///
/// IndexedKind
/// Entity kinds that carry secondary indexes.
///

#[derive(Clone, Copy, Debug, Display, Eq, FromStr, PartialEq)]
pub enum IndexedKind {
    Agent,
    Service,
    Relation,
}

///
/// DeleteReport
/// A removed record and the relations removed with it.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteReport<E> {
    pub deleted: E,
    pub relations: Vec<String>,
}

///
/// Marketplace
///
/// Agents, services and the relations between them, persisted in `S`.
///

pub struct Marketplace<S: KeyValueStore> {
    store: S,
    config: MarketConfig,
    sanitizer: Sanitizer,
}

impl<S: KeyValueStore> Marketplace<S> {
    /// Wrap a store with a validated configuration.
    pub fn new(store: S, config: MarketConfig) -> Result<Self, Error> {
        config.validate()?;
        let sanitizer = Sanitizer::new(config.limits);

        Ok(Self {
            store,
            config,
            sanitizer,
        })
    }

    pub fn with_defaults(store: S) -> Self {
        let config = MarketConfig::default();

        Self {
            store,
            sanitizer: Sanitizer::new(config.limits),
            config,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    #[must_use]
    pub const fn config(&self) -> &MarketConfig {
        &self.config
    }

    #[must_use]
    pub const fn sanitizer(&self) -> Sanitizer {
        self.sanitizer
    }

    const fn repo<E: EntityKind>(&self) -> EntityRepository<E> {
        EntityRepository::new(self.sanitizer)
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    pub fn init_agent(
        &mut self,
        agent_id: &str,
        name: &str,
        address: &str,
    ) -> Result<Agent, Error> {
        let agent = Agent::new(agent_id, name, address);
        self.repo::<Agent>().create(&mut self.store, &agent)?;

        Ok(agent)
    }

    pub fn get_agent(&self, agent_id: &str) -> Result<Agent, Error> {
        self.sanitizer.key_field("AgentId", agent_id)?;

        Ok(self.repo::<Agent>().read(&self.store, agent_id)?)
    }

    /// Overwrite name and address; returns the new record.
    pub fn modify_agent(
        &mut self,
        agent_id: &str,
        name: &str,
        address: &str,
    ) -> Result<Agent, Error> {
        let agent = Agent::new(agent_id, name, address);
        self.repo::<Agent>().update(&mut self.store, &agent)?;

        Ok(agent)
    }

    /// Delete an agent and, before it, every relation it takes part in.
    pub fn delete_agent(&mut self, agent_id: &str) -> Result<DeleteReport<Agent>, Error> {
        self.sanitizer.key_field("AgentId", agent_id)?;

        self.delete_cascading::<Agent>(BY_AGENT.name, agent_id)
    }

    pub fn agents_by_address(&self, address: &str) -> Result<ScanPage<Agent>, Error> {
        self.sanitizer.key_field("Address", address)?;

        self.scan::<Agent>(AGENT_BY_ADDRESS.name, address)
    }

    pub fn agent_history(&self, agent_id: &str) -> Result<Vec<Version<Agent>>, Error> {
        self.sanitizer.key_field("AgentId", agent_id)?;

        self.history::<Agent>(agent_id)
    }

    // ------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------

    pub fn init_service(
        &mut self,
        service_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Service, Error> {
        let service = Service::new(service_id, name, description);
        self.repo::<Service>().create(&mut self.store, &service)?;

        Ok(service)
    }

    pub fn get_service(&self, service_id: &str) -> Result<Service, Error> {
        self.sanitizer.key_field("ServiceId", service_id)?;

        Ok(self.repo::<Service>().read(&self.store, service_id)?)
    }

    pub fn modify_service(
        &mut self,
        service_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Service, Error> {
        let service = Service::new(service_id, name, description);
        self.repo::<Service>().update(&mut self.store, &service)?;

        Ok(service)
    }

    /// Delete a service and, before it, every relation bound to it.
    pub fn delete_service(&mut self, service_id: &str) -> Result<DeleteReport<Service>, Error> {
        self.sanitizer.key_field("ServiceId", service_id)?;

        self.delete_cascading::<Service>(BY_SERVICE.name, service_id)
    }

    pub fn services_by_name(&self, name: &str) -> Result<ScanPage<Service>, Error> {
        self.sanitizer.key_field("Name", name)?;

        self.scan::<Service>(SERVICE_BY_NAME.name, name)
    }

    pub fn service_history(&self, service_id: &str) -> Result<Vec<Version<Service>>, Error> {
        self.sanitizer.key_field("ServiceId", service_id)?;

        self.history::<Service>(service_id)
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    /// Bind an existing agent to an existing service.
    ///
    /// `reputation` defaults to the configured starting value.
    pub fn init_relation(
        &mut self,
        service_id: &str,
        agent_id: &str,
        cost: Amount,
        time: Amount,
        reputation: Option<f64>,
    ) -> Result<Relation, Error> {
        self.sanitizer.key_field("ServiceId", service_id)?;
        self.sanitizer.key_field("AgentId", agent_id)?;

        let reputation = reputation.unwrap_or(self.config.reputation.default_reputation);
        if !self.config.reputation.rating_in_range(reputation) {
            return Err(Error::invalid_argument(format!(
                "reputation {reputation} lies outside [{}, {}]",
                self.config.reputation.min_rating, self.config.reputation.max_rating
            )));
        }

        self.repo::<Service>().read(&self.store, service_id)?;
        self.repo::<Agent>().read(&self.store, agent_id)?;

        let relation = Relation::new(service_id, agent_id, cost, time, reputation);
        if let Some(existing) = self
            .repo::<Relation>()
            .try_read(&self.store, &relation.relation_id)?
        {
            let message = if existing.binds(service_id, agent_id) {
                relation.relation_id.clone()
            } else {
                format!(
                    "relation id '{}' of {service_id} -> {agent_id} is taken by {} -> {}",
                    relation.relation_id, existing.service_id, existing.agent_id
                )
            };

            return Err(InternalError::already_exists("relation", message).into());
        }

        self.repo::<Relation>().create(&mut self.store, &relation)?;

        Ok(relation)
    }

    pub fn get_relation(&self, relation_id: &str) -> Result<Relation, Error> {
        self.sanitizer.derived_key_field("RelationId", relation_id, 2)?;

        Ok(self.repo::<Relation>().read(&self.store, relation_id)?)
    }

    /// Relations of one service, in agent order.
    pub fn agents_by_service(&self, service_id: &str) -> Result<ScanPage<Relation>, Error> {
        self.sanitizer.key_field("ServiceId", service_id)?;

        self.scan::<Relation>(BY_SERVICE.name, service_id)
    }

    /// Relations of one agent, in service order.
    pub fn services_by_agent(&self, agent_id: &str) -> Result<ScanPage<Relation>, Error> {
        self.sanitizer.key_field("AgentId", agent_id)?;

        self.scan::<Relation>(BY_AGENT.name, agent_id)
    }

    pub fn relation_history(&self, relation_id: &str) -> Result<Vec<Version<Relation>>, Error> {
        self.sanitizer.derived_key_field("RelationId", relation_id, 2)?;

        self.history::<Relation>(relation_id)
    }

    // ------------------------------------------------------------------
    // Reputation
    // ------------------------------------------------------------------

    /// Record one evaluation and recompute the relation's reputation.
    pub fn modify_reputation(
        &mut self,
        service_id: &str,
        agent_id: &str,
        role: Role,
        rating: f64,
    ) -> Result<ReputationUpdate, Error> {
        self.sanitizer.key_field("ServiceId", service_id)?;
        self.sanitizer.key_field("AgentId", agent_id)?;

        let evaluation = Evaluation {
            relation_id: relation_id(service_id, agent_id),
            service_id: service_id.to_string(),
            agent_id: agent_id.to_string(),
            role,
            rating,
        };

        Ok(record_evaluation(
            &mut self.store,
            self.sanitizer,
            &self.config.reputation,
            &evaluation,
        )?)
    }

    /// Every evaluation recorded for one relation, deletes included.
    pub fn reputation_history(
        &self,
        service_id: &str,
        agent_id: &str,
    ) -> Result<Vec<Version<Evaluation>>, Error> {
        self.sanitizer.key_field("ServiceId", service_id)?;
        self.sanitizer.key_field("AgentId", agent_id)?;

        self.history::<Evaluation>(&relation_id(service_id, agent_id))
    }

    // ------------------------------------------------------------------
    // Index maintenance
    // ------------------------------------------------------------------

    pub fn rebuild_indexes(&mut self, kind: IndexedKind) -> Result<RebuildReport, Error> {
        let report = match kind {
            IndexedKind::Agent => IndexManager::<Agent>::rebuild(&mut self.store),
            IndexedKind::Service => IndexManager::<Service>::rebuild(&mut self.store),
            IndexedKind::Relation => IndexManager::<Relation>::rebuild(&mut self.store),
        }?;

        Ok(report)
    }

    pub fn verify_indexes(&self, kind: IndexedKind) -> Result<VerifyReport, Error> {
        let report = match kind {
            IndexedKind::Agent => IndexManager::<Agent>::verify(&self.store),
            IndexedKind::Service => IndexManager::<Service>::verify(&self.store),
            IndexedKind::Relation => IndexManager::<Relation>::verify(&self.store),
        }?;

        Ok(report)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn scan<E: EntityKind>(&self, namespace: &str, value: &str) -> Result<ScanPage<E>, Error> {
        let page = RangeQueryEngine::scan_prefix::<E, _>(&self.store, namespace, &[value])?
            .into_page()?;

        Ok(page)
    }

    fn history<E: EntityKind>(&self, id: &str) -> Result<Vec<Version<E>>, Error> {
        let versions = HistoryReader::read::<E, _>(&self.store, id)?
            .collect::<Result<Vec<_>, InternalError>>()?;

        Ok(versions)
    }

    fn relations_by(&self, namespace: &str, value: &str) -> Result<Vec<Relation>, Error> {
        Ok(self.scan::<Relation>(namespace, value)?.results)
    }

    // Once any relation is gone, a failure is reported against the whole cascade.
    fn delete_cascading<E: EntityKind>(
        &mut self,
        namespace: &str,
        id: &str,
    ) -> Result<DeleteReport<E>, Error> {
        let sanitizer = self.sanitizer;
        self.repo::<E>().read(&self.store, id)?;

        let relations = self.relations_by(namespace, id)?;
        let key = EntityRepository::<E>::data_key(id)?;

        let mut write = CompositeWrite::new(&mut self.store, "cascade delete", &key);
        let result = Self::cascade::<E, _>(&mut write, sanitizer, &relations, id);

        Ok(result.map_err(|err| write.fail(err))?)
    }

    // Per relation: evaluation, then the relation, so no evaluation outlives
    // its relation. The parent goes last.
    fn cascade<E, T>(
        store: &mut T,
        sanitizer: Sanitizer,
        relations: &[Relation],
        id: &str,
    ) -> Result<DeleteReport<E>, InternalError>
    where
        E: EntityKind,
        T: KeyValueStore + ?Sized,
    {
        let evaluations = EntityRepository::<Evaluation>::new(sanitizer);
        let repo = EntityRepository::<Relation>::new(sanitizer);
        let mut removed = Vec::with_capacity(relations.len());

        for relation in relations {
            if evaluations.exists(&*store, &relation.relation_id)? {
                evaluations.delete(store, &relation.relation_id)?;
            }
            repo.delete(store, &relation.relation_id)?;
            removed.push(relation.relation_id.clone());
        }

        let deleted = EntityRepository::<E>::new(sanitizer).delete(store, id)?;

        Ok(DeleteReport {
            deleted,
            relations: removed,
        })
    }
}
