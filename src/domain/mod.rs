//! Domain layer types and invariants.

pub mod events;
pub mod fields;
