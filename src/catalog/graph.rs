//! Table dependency graph
//!
//! Foreign keys declared in [`Table::columns`] form a directed graph with an
//! edge from each referenced table to the table that references it. Loading
//! follows a topological order of that graph; dropping follows its reverse.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::CatalogError;
use super::tables::Table;

/// Directed graph of table dependencies
pub struct TableGraph {
    graph: DiGraph<Table, ()>,
}

impl TableGraph {
    /// Build the graph for every known table
    pub fn new() -> Self {
        Self::from_tables(&Table::ALL)
    }

    /// Build the graph for a subset of tables
    ///
    /// References to tables outside the subset are ignored.
    pub fn from_tables(tables: &[Table]) -> Self {
        let mut graph = DiGraph::<Table, ()>::new();
        let nodes: Vec<NodeIndex> = tables.iter().map(|t| graph.add_node(*t)).collect();

        for (i, table) in tables.iter().enumerate() {
            for target in table.references() {
                if let Some(j) = tables.iter().position(|t| *t == target) {
                    graph.add_edge(nodes[j], nodes[i], ());
                }
            }
        }

        Self { graph }
    }

    /// Tables in dependency order: referenced tables before referencing ones
    ///
    /// Ties keep declaration order, so the result is stable across runs.
    pub fn load_order(&self) -> Result<Vec<Table>, CatalogError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(i)) = ready.pop() {
            let node = NodeIndex::new(i);
            order.push(self.graph[node]);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(Reverse(next.index()));
                }
            }
        }

        if order.len() != in_degree.len() {
            let stuck = self
                .graph
                .node_indices()
                .filter(|n| in_degree[n.index()] > 0)
                .map(|n| self.graph[n].name())
                .collect();
            return Err(CatalogError::Cycle(stuck));
        }

        Ok(order)
    }

    /// Reverse of [`load_order`](Self::load_order): dependents go first
    pub fn drop_order(&self) -> Result<Vec<Table>, CatalogError> {
        let mut order = self.load_order()?;
        order.reverse();
        Ok(order)
    }

    /// Tables that must be populated before `table`
    pub fn prerequisites(&self, table: Table) -> Vec<Table> {
        self.graph
            .node_indices()
            .find(|n| self.graph[*n] == table)
            .map(|n| {
                let mut deps: Vec<Table> = self
                    .graph
                    .neighbors_directed(n, Direction::Incoming)
                    .map(|p| self.graph[p])
                    .collect();
                deps.sort();
                deps
            })
            .unwrap_or_default()
    }
}

impl Default for TableGraph {
    fn default() -> Self {
        Self::new()
    }
}
