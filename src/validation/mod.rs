//! Input validation module.
//!
//! Provides path splitting and name validation for filesystem operations.

mod path;

pub use path::{split_parent, split_rooted, validate_leaf_name};
