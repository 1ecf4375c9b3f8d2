//! Event matching
//!
//! Pure functions deciding whether an event matches a filter or a query.

mod matcher;

pub use matcher::{deep_subset, map_subset, matches_filter, matches_query, Matchable};
