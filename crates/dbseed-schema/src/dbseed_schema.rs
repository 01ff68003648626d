//! dbseed schema - table dependency analysis
//!
//! This crate provides:
//! - The foreign-key dependency graph between tables
//! - A deterministic, cycle-detecting import order

pub mod dependencies;

pub use dependencies::{DependencyGraph, GraphError, TableNode};
