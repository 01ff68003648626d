//! Table dependency graph
//!
//! Tables are nodes; every foreign key adds an edge from the referenced
//! (parent) table to the declaring (child) table. A topological order of
//! this graph is a safe import order.

mod graph;


pub use graph::{DependencyGraph, GraphError, TableNode};
