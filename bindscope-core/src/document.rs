//! Document model: an arena of nodes loaded from a JSON snapshot

use crate::host::{
    DocumentProvider, NodeAccessError, NodeHeader, ReferenceStore, ResolveError,
};
use crate::BindscopeError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Display};
use std::path::Path;

/// Host-assigned node id (e.g. "12:34")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a node in a [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(u32);

impl NodeIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Arena position as an index; fails past `u32::MAX` nodes
    fn try_from_index(index: usize) -> crate::Result<Self> {
        u32::try_from(index)
            .map(Self)
            .map_err(|_| BindscopeError::DocumentTooLarge(index))
    }
}

/// Node type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Page,
    Frame,
    Group,
    Section,
    Component,
    ComponentSet,
    Instance,
    Rectangle,
    Ellipse,
    Vector,
    Text,
    Line,
    Polygon,
    Star,
    BooleanOperation,
    #[serde(other)]
    Other,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Frame => "frame",
            Self::Group => "group",
            Self::Section => "section",
            Self::Component => "component",
            Self::ComponentSet => "component_set",
            Self::Instance => "instance",
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Vector => "vector",
            Self::Text => "text",
            Self::Line => "line",
            Self::Polygon => "polygon",
            Self::Star => "star",
            Self::BooleanOperation => "boolean_operation",
            Self::Other => "other",
        }
    }

    /// Instances are reported as one unit in representative-only searches
    pub fn is_representative(self) -> bool {
        matches!(self, Self::Instance)
    }

    /// Types that carry nested component property bindings
    pub fn has_component_properties(self) -> bool {
        matches!(self, Self::Instance | Self::Component | Self::ComponentSet)
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The queried target: a shared value definition ("variable")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDefinition {
    pub id: String,
    pub name: String,
    /// Survives duplication and import, unlike `id`
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

/// A property's reference to a definition by local id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alias {
    #[serde(rename = "alias")]
    pub id: String,
}

impl Alias {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A typed property slot: either bound to a definition or a plain value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slot {
    Alias(Alias),
    Literal(serde_json::Value),
}

impl Slot {
    pub fn alias(&self) -> Option<&Alias> {
        match self {
            Self::Alias(alias) => Some(alias),
            Self::Literal(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paint {
    pub color: Option<Slot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Effect {
    pub color: Option<Slot>,
    pub offset_x: Option<Slot>,
    pub offset_y: Option<Slot>,
    pub radius: Option<Slot>,
    pub spread: Option<Slot>,
}

/// Every bindable property slot of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeProperties {
    pub fills: Vec<Paint>,
    pub strokes: Vec<Paint>,
    pub width: Option<Slot>,
    pub height: Option<Slot>,
    pub padding_left: Option<Slot>,
    pub padding_right: Option<Slot>,
    pub padding_top: Option<Slot>,
    pub padding_bottom: Option<Slot>,
    pub item_spacing: Option<Slot>,
    pub counter_axis_spacing: Option<Slot>,
    pub characters: Option<Slot>,
    pub effects: Vec<Effect>,
    pub component_properties: BTreeMap<String, Slot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Unreadable {
    Properties,
    Children,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    id: NodeId,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    properties: NodeProperties,
    #[serde(default)]
    children: Vec<RawNode>,
    /// Parts of the node whose reads fail, for fault-isolation fixtures
    #[serde(default)]
    unreadable: Vec<Unreadable>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    definitions: Vec<ReferenceDefinition>,
    /// Keys of aliases that are not local definitions (imported copies)
    #[serde(default)]
    alias_keys: HashMap<String, String>,
    /// Alias ids whose key lookup fails
    #[serde(default)]
    unresolvable: Vec<String>,
    pages: Vec<RawNode>,
}

#[derive(Debug)]
struct NodeEntry {
    id: NodeId,
    name: String,
    node_type: NodeType,
    visible: bool,
    locked: bool,
    parent: Option<NodeIdx>,
    children: Vec<NodeIdx>,
    properties: NodeProperties,
    properties_readable: bool,
    children_readable: bool,
}

/// A read-only document snapshot. Nodes are stored in pre-order; each entry
/// keeps its parent index so ancestor climbs are plain index walks.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<NodeEntry>,
    by_id: HashMap<NodeId, NodeIdx>,
    pages: Vec<NodeIdx>,
    definitions: Vec<ReferenceDefinition>,
    definitions_by_id: HashMap<String, usize>,
    alias_keys: HashMap<String, String>,
    unresolvable: HashSet<String>,
}

impl Document {
    /// Load a document snapshot from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(BindscopeError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> crate::Result<Self> {
        let raw: RawDocument = serde_json::from_str(content)?;
        Self::from_raw(raw)
    }

    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        let raw: RawDocument = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> crate::Result<Self> {
        let mut doc = Document {
            alias_keys: raw.alias_keys,
            unresolvable: raw.unresolvable.into_iter().collect(),
            ..Default::default()
        };

        for definition in raw.definitions {
            if doc.definitions_by_id.contains_key(&definition.id) {
                return Err(BindscopeError::DuplicateDefinition(definition.id));
            }
            doc.definitions_by_id
                .insert(definition.id.clone(), doc.definitions.len());
            doc.definitions.push(definition);
        }

        // Flatten in pre-order; siblings are pushed reversed so they pop in order
        let mut stack: Vec<(RawNode, Option<NodeIdx>)> =
            raw.pages.into_iter().rev().map(|page| (page, None)).collect();

        while let Some((raw_node, parent)) = stack.pop() {
            let idx = NodeIdx::try_from_index(doc.nodes.len())?;
            if doc.by_id.insert(raw_node.id.clone(), idx).is_some() {
                return Err(BindscopeError::DuplicateNode(raw_node.id.to_string()));
            }

            match parent {
                Some(parent) => doc.nodes[parent.index()].children.push(idx),
                None => doc.pages.push(idx),
            }

            let RawNode {
                id,
                name,
                node_type,
                visible,
                locked,
                properties,
                children,
                unreadable,
            } = raw_node;

            doc.nodes.push(NodeEntry {
                id,
                name,
                node_type,
                visible,
                locked,
                parent,
                children: Vec::with_capacity(children.len()),
                properties,
                properties_readable: !unreadable.contains(&Unreadable::Properties),
                children_readable: !unreadable.contains(&Unreadable::Children),
            });

            stack.extend(children.into_iter().rev().map(|child| (child, Some(idx))));
        }

        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn pages(&self) -> &[NodeIdx] {
        &self.pages
    }

    pub fn definitions(&self) -> &[ReferenceDefinition] {
        &self.definitions
    }

    fn entry(&self, node: NodeIdx) -> Option<&NodeEntry> {
        self.nodes.get(node.index())
    }
}

impl DocumentProvider for Document {
    fn scope_containers(&self, scope: Option<&str>) -> Vec<NodeIdx> {
        match scope {
            None => self.pages.clone(),
            Some(id) => self
                .pages
                .iter()
                .copied()
                .filter(|page| self.nodes[page.index()].id.as_str() == id)
                .collect(),
        }
    }

    fn header(&self, node: NodeIdx) -> Option<NodeHeader<'_>> {
        self.entry(node).map(|e| NodeHeader {
            id: &e.id,
            name: &e.name,
            node_type: e.node_type,
            visible: e.visible,
            locked: e.locked,
        })
    }

    fn parent(&self, node: NodeIdx) -> Option<NodeIdx> {
        self.entry(node).and_then(|e| e.parent)
    }

    fn children(&self, node: NodeIdx) -> Result<&[NodeIdx], NodeAccessError> {
        match self.entry(node) {
            Some(e) if e.children_readable => Ok(&e.children),
            Some(e) => Err(NodeAccessError::Children(e.id.clone())),
            None => Ok(&[]),
        }
    }

    fn properties(&self, node: NodeIdx) -> Result<&NodeProperties, NodeAccessError> {
        match self.entry(node) {
            Some(e) if e.properties_readable => Ok(&e.properties),
            Some(e) => Err(NodeAccessError::Properties(e.id.clone())),
            None => Err(NodeAccessError::Properties(NodeId::new(format!(
                "#{}",
                node.index()
            )))),
        }
    }

    fn find(&self, id: &str) -> Option<NodeIdx> {
        self.by_id.get(&NodeId::new(id)).copied()
    }
}

impl ReferenceStore for Document {
    fn resolve_alias_key(&self, alias_id: &str) -> Result<String, ResolveError> {
        if self.unresolvable.contains(alias_id) {
            return Err(ResolveError::Lookup {
                alias_id: alias_id.to_string(),
                reason: "definition library unavailable".to_string(),
            });
        }
        if let Some(&i) = self.definitions_by_id.get(alias_id) {
            return Ok(self.definitions[i].key.clone());
        }
        self.alias_keys
            .get(alias_id)
            .cloned()
            .ok_or_else(|| ResolveError::Missing(alias_id.to_string()))
    }

    fn container_exists(&self, id: &str) -> bool {
        self.pages
            .iter()
            .any(|page| self.nodes[page.index()].id.as_str() == id)
    }

    fn definition(&self, id: &str) -> Option<&ReferenceDefinition> {
        self.definitions_by_id
            .get(id)
            .map(|&i| &self.definitions[i])
    }
}
