//! Declarative entity-kind descriptors.

pub mod entity;
pub mod index;
