//! Merge layer: how config sources combine.

pub mod merge_policy;
