//! Aggregation of trajectory recordings into plot-ready tables.
//!
//! Per-recording counts are kept as nested [`count_tree::CountTree`]s so that
//! recordings of the same map can be merged in any order, then flattened into
//! the row types in [`types`].

pub mod classify;
pub mod count_tree;
pub mod kde;
pub mod lane_change;
pub mod range;
pub mod speed;
pub mod types;
pub mod utility;
