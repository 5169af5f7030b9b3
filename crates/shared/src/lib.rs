//! Shared utilities and common types for the campaign engine.
//!
//! This crate provides common functionality used across all other crates:
//! - Cursor-based pagination for message history listings
//! - Common validation logic for campaign and contact payloads

pub mod pagination;
pub mod validation;
