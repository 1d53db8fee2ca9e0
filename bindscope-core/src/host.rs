//! Interfaces the search engine consumes from its host.
//!
//! The engine never mutates the document; it reads node headers, children
//! and property slots through [`DocumentProvider`] and resolves alias keys
//! through [`ReferenceStore`]. [`crate::Document`] implements both.

use crate::document::{NodeId, NodeIdx, NodeProperties, NodeType, ReferenceDefinition};

/// Cheap, always-readable facts about a node
#[derive(Debug, Clone, Copy)]
pub struct NodeHeader<'a> {
    pub id: &'a NodeId,
    pub name: &'a str,
    pub node_type: NodeType,
    pub visible: bool,
    pub locked: bool,
}

/// Reading part of a node failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeAccessError {
    #[error("properties of node {0} are unreadable")]
    Properties(NodeId),

    #[error("children of node {0} are unreadable")]
    Children(NodeId),
}

impl NodeAccessError {
    pub fn node(&self) -> &NodeId {
        match self {
            Self::Properties(id) | Self::Children(id) => id,
        }
    }
}

/// Resolving an alias id to its stable key failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no key known for alias {0}")]
    Missing(String),

    #[error("lookup of alias {alias_id} failed: {reason}")]
    Lookup { alias_id: String, reason: String },
}

pub trait DocumentProvider {
    /// Containers to search, in document order. `None` means every container;
    /// an unknown scope id yields an empty list.
    fn scope_containers(&self, scope: Option<&str>) -> Vec<NodeIdx>;

    /// Header of a node, or `None` if the node is no longer in the document
    fn header(&self, node: NodeIdx) -> Option<NodeHeader<'_>>;

    fn parent(&self, node: NodeIdx) -> Option<NodeIdx>;

    /// Children in sibling order
    fn children(&self, node: NodeIdx) -> Result<&[NodeIdx], NodeAccessError>;

    fn properties(&self, node: NodeIdx) -> Result<&NodeProperties, NodeAccessError>;

    fn find(&self, id: &str) -> Option<NodeIdx>;
}

pub trait ReferenceStore {
    /// Stable key of the definition an alias id points at
    fn resolve_alias_key(&self, alias_id: &str) -> Result<String, ResolveError>;

    fn container_exists(&self, id: &str) -> bool;

    fn definition(&self, id: &str) -> Option<&ReferenceDefinition>;
}
