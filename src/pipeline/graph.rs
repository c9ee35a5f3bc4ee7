//! Branch graph structure using daggy.
//!
//! A compiled branch is a linear chain that ends in a named fan-out point
//! with several downstream sub-chains. The graph keeps that shape as a DAG of
//! typed [`Element`]s and flattens it into launch [`Chain`]s only when it is
//! rendered.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::pipeline::parser::Chain;
use daggy::{Dag, NodeIndex, Walker};

/// Unique identifier for a node in a branch graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(NodeIndex);

/// A node in the branch graph.
#[derive(Debug, Clone)]
pub struct Node {
    element: Element,
    /// Name downstream chains refer to when this node fans out.
    fan_out: Option<String>,
}

impl Node {
    /// Fan-out name, when this node is a tee.
    pub fn fan_out(&self) -> Option<&str> {
        self.fan_out.as_deref()
    }
}

/// A link between two nodes; carries the order it was made in.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    order: usize,
}

/// One compiled branch represented as a directed acyclic graph.
pub struct BranchGraph {
    graph: Dag<Node, Link>,
}

impl BranchGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self { graph: Dag::new() }
    }

    /// Add an element node.
    pub fn add(&mut self, element: Element) -> NodeId {
        NodeId(self.graph.add_node(Node {
            element,
            fan_out: None,
        }))
    }

    /// Add a named fan-out (`tee name=...`) node.
    pub fn add_fan_out(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        NodeId(self.graph.add_node(Node {
            element: Element::new("tee").with("name", name.as_str()),
            fan_out: Some(name),
        }))
    }

    /// Link two nodes.
    pub fn link(&mut self, src: NodeId, sink: NodeId) -> Result<()> {
        if self.graph.node_weight(src.0).is_none() || self.graph.node_weight(sink.0).is_none() {
            return Err(Error::Graph("node not found".into()));
        }
        let order = self.graph.edge_count();
        self.graph
            .add_edge(src.0, sink.0, Link { order })
            .map_err(|_| Error::Graph("linking would create a cycle".into()))?;
        Ok(())
    }

    /// Append elements one after another starting below `from`.
    ///
    /// Returns the last node, or `from` when `elements` is empty.
    pub fn append(
        &mut self,
        from: NodeId,
        elements: impl IntoIterator<Item = Element>,
    ) -> Result<NodeId> {
        let mut last = from;
        for element in elements {
            let next = self.add(element);
            self.link(last, next)?;
            last = next;
        }
        Ok(last)
    }

    /// Start a new chain from a head element and append the rest.
    pub fn chain(&mut self, elements: impl IntoIterator<Item = Element>) -> Result<NodeId> {
        let mut iter = elements.into_iter();
        let head = iter
            .next()
            .ok_or_else(|| Error::Graph("chain needs at least one element".into()))?;
        let first = self.add(head);
        self.append(first, iter)
    }

    /// Get a node by ID.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id.0)
    }

    /// Children of a node in the order they were linked.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: Vec<(usize, NodeId)> = self
            .graph
            .children(id.0)
            .iter(&self.graph)
            .filter_map(|(edge, node)| {
                self.graph
                    .edge_weight(edge)
                    .map(|link| (link.order, NodeId(node)))
            })
            .collect();
        children.sort_by_key(|(order, _)| *order);
        children.into_iter().map(|(_, id)| id).collect()
    }

    /// Get all source nodes (nodes with no incoming edges).
    pub fn sources(&self) -> Vec<NodeId> {
        self.graph
            .graph()
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .graph()
                    .neighbors_directed(idx, daggy::petgraph::Direction::Incoming)
                    .count()
                    == 0
            })
            .map(NodeId)
            .collect()
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of links.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Flatten the graph into launch chains.
    ///
    /// The chain from the single source comes first; every fan-out node then
    /// contributes one chain per child, prefixed with its name. A node with
    /// several children that is not a fan-out cannot be expressed and is an
    /// error, as is a graph with zero or several sources.
    pub fn chains(&self) -> Result<Vec<Chain>> {
        let sources = self.sources();
        let [source] = sources.as_slice() else {
            return Err(Error::Graph(format!(
                "branch must have exactly one source, found {}",
                sources.len()
            )));
        };

        let mut chains = Vec::new();
        let mut pending = vec![(None, *source)];
        while let Some((origin, start)) = pending.pop() {
            let mut elements = Vec::new();
            let mut forks = Vec::new();
            let mut current = start;
            loop {
                let node = self
                    .get_node(current)
                    .ok_or_else(|| Error::Graph("node not found".into()))?;
                elements.push(node.element.clone());
                let children = self.children(current);
                if let Some(name) = node.fan_out() {
                    forks.extend(children.into_iter().map(|c| (Some(name.to_string()), c)));
                    break;
                }
                match children.as_slice() {
                    [] => break,
                    [next] => current = *next,
                    _ => {
                        return Err(Error::Graph(format!(
                            "element '{}' has several outputs but is not a fan-out",
                            node.element.name
                        )));
                    }
                }
            }
            chains.push(Chain { origin, elements });
            // Stack order: first child is rendered first.
            pending.extend(forks.into_iter().rev());
        }
        Ok(chains)
    }

    /// Render the graph as launch text, chains separated by a space.
    pub fn render(&self) -> Result<String> {
        let chains = self.chains()?;
        Ok(chains
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

impl Default for BranchGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BranchGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
