//! Graph construction and Kahn's topological sort

use dbseed_core::SchemaModel;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The foreign keys form at least one cycle; no partial order is produced
    #[error("cycle detected in table dependencies ({unresolved} of {total} tables could not be ordered)")]
    CycleDetected { unresolved: usize, total: usize },
}

/// A table and the tables that reference it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableNode {
    pub table_name: String,
    /// Child tables, once per foreign key column pointing here
    pub edges: Vec<String>,
    /// Foreign key columns this table declares against known tables
    pub in_degree: usize,
}

/// Dependency graph for the tables of a schema
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    nodes: IndexMap<String, TableNode>,
}

impl DependencyGraph {
    /// Create an empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a schema model.
    ///
    /// A foreign key whose parent or child is not part of the model is
    /// logged and left out.
    pub fn from_schema(schema: &SchemaModel) -> Self {
        let mut graph = Self::new();
        for name in schema.keys() {
            graph.add_table(name);
        }

        for table in schema.values() {
            for fk in &table.foreign_keys {
                if !graph.add_dependency(&fk.foreign_table_name, &fk.table_name) {
                    tracing::warn!(
                        constraint = %fk.constraint_name,
                        child = %fk.table_name,
                        parent = %fk.foreign_table_name,
                        "foreign key references a table outside the schema, ignoring"
                    );
                }
            }
        }

        graph
    }

    /// Add a table with no dependencies (no-op when already present)
    pub fn add_table(&mut self, name: &str) {
        self.nodes.entry(name.to_string()).or_insert_with(|| TableNode {
            table_name: name.to_string(),
            ..TableNode::default()
        });
    }

    /// Record that `child` references `parent`. Returns false when either
    /// table is unknown.
    pub fn add_dependency(&mut self, parent: &str, child: &str) -> bool {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return false;
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.edges.push(child.to_string());
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.in_degree += 1;
        }
        true
    }

    pub fn node(&self, name: &str) -> Option<&TableNode> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Order tables so every parent precedes its children.
    ///
    /// Ties are broken lexicographically, so the same schema always sorts
    /// the same way.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: IndexMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.in_degree))
            .collect();

        let mut roots: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        roots.sort_unstable();
        let mut queue: VecDeque<&str> = roots.into();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());

            let Some(node) = self.nodes.get(name) else {
                continue;
            };
            let mut ready = Vec::new();
            for child in &node.edges {
                if let Some(degree) = in_degree.get_mut(child.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(child.as_str());
                    }
                }
            }
            ready.sort_unstable();
            queue.extend(ready);
        }

        if order.len() != self.nodes.len() {
            return Err(GraphError::CycleDetected {
                unresolved: self.nodes.len() - order.len(),
                total: self.nodes.len(),
            });
        }

        tracing::debug!(order = ?order, "determined table import order");
        Ok(order)
    }
}
