//! Content type composition rules.
//!
//! This module provides:
//! - CompositionGraph: reachability over composition edges
//! - available_compositions: which types may be composed into a type
//! - conflicting_aliases: duplicate property aliases across composition branches

pub mod availability;
pub mod consistency;
pub mod graph;

pub use availability::{AvailableCompositions, CompositionAvailability, available_compositions};
pub use consistency::{UnlocatedAlias, conflicting_aliases, property_alias_field};
pub use graph::{CompositionGraph, PropertyOrigin};
