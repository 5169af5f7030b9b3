//! Domain layer for the campaign engine.
//!
//! This crate contains:
//! - Domain models (AttributeSchema, Contact, SavedSegment, Campaign, Message)
//! - Business logic services (template rendering, segment predicate compilation)
//! - Store traits consumed by the execution engine
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
pub mod stores;
