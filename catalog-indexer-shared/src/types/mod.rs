//! This module defines the core data structures used across the catalog indexer.
//! It re-exports the entity, document and role types.

pub mod document;
pub mod entity;
pub mod role;

pub use document::IndexDocument;
pub use entity::{DenormalizedEntity, EntityKind};
pub use role::Role;
