// src/dag/mod.rs

//! Target graph representation.
//!
//! - [`graph`] holds the ordered, multi-match [`TaskGraph`] and selector
//!   parsing. Traversal of Needs/Next happens in [`crate::engine`].

pub mod graph;

pub use graph::{TaskGraph, split_selector};
