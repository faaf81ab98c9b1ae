//! Composable primitives for synthesizing Cypher at request time from
//! caller-supplied schema mappings. Nothing in here knows domain semantics;
//! every clause is driven by caller data.

mod builder;
mod types;

pub use builder::{
    CollectionBuilder, OptionalMatchBuilder, build_property_map, group_mappings_by_category,
    sanitize_identifier,
};
pub use types::{AttributeMapping, Direction, EntityConfig, PathSpecification};
