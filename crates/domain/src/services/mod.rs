//! Business logic services.

pub mod segmentation;
pub mod template;
