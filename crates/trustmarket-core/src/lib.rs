//! Core runtime for trustmarket: entity kinds, the generic repository, index
//! maintenance, range queries, history replay and reputation aggregation
//! over a versioned key-value store.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod model;
pub mod obs;
pub mod reputation;
pub mod sanitize;
pub mod serialize;
pub mod traits;
pub mod types;

///
/// CONSTANTS
///

/// Upper bound on the size of one stored record.
///
/// Primary records are small flat structs; anything larger is treated as a
/// corrupt payload rather than decoded.
pub const MAX_RECORD_BYTES: usize = 64 * 1024;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, stores, serializers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        entity::{Agent, Evaluation, Relation, Role, Service},
        model::{entity::EntityModel, index::IndexModel},
        traits::EntityKind,
        types::Amount,
    };
}
