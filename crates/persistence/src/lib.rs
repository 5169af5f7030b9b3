//! Persistence layer for the campaign engine.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Postgres repository implementations of the domain store traits
//! - In-memory store implementations for tests and embedding

pub mod db;
pub mod entities;
pub mod memory;
pub mod metrics;
pub mod repositories;
