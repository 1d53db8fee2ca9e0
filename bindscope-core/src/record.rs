//! Search result records and the usage summary derived from them

use crate::document::{NodeId, NodeIdx, NodeType, ReferenceDefinition};
use crate::host::DocumentProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator used in human-readable node paths
pub const PATH_SEPARATOR: &str = " / ";

/// Base category of a matched property path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyCategory {
    Fill,
    Stroke,
    Size,
    Spacing,
    Text,
    Effect,
    ComponentProperty,
}

impl PropertyCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Stroke => "stroke",
            Self::Size => "size",
            Self::Spacing => "spacing",
            Self::Text => "text",
            Self::Effect => "effect",
            Self::ComponentProperty => "component_property",
        }
    }

    /// Category of a property path such as `fills[0].color` or `paddingTop`
    pub fn from_path(path: &str) -> Option<Self> {
        let base = path.split(['[', '.']).next().unwrap_or(path);
        match base {
            "fills" => Some(Self::Fill),
            "strokes" => Some(Self::Stroke),
            "width" | "height" => Some(Self::Size),
            "paddingLeft" | "paddingRight" | "paddingTop" | "paddingBottom" | "itemSpacing"
            | "counterAxisSpacing" => Some(Self::Spacing),
            "characters" => Some(Self::Text),
            "effects" => Some(Self::Effect),
            "componentProperties" => Some(Self::ComponentProperty),
            _ => None,
        }
    }
}

/// The container a record was found under
#[derive(Debug, Clone)]
pub(crate) struct ScopeFrame {
    pub container: NodeIdx,
    pub name: String,
}

/// A node that binds the queried definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundPropertyRecord {
    #[serde(skip)]
    pub node: Option<NodeIdx>,
    pub node_id: NodeId,
    pub node_name: String,
    pub node_type: NodeType,
    pub matched_property_paths: Vec<String>,
    pub path_string: String,
    pub scope_name: String,
}

impl BoundPropertyRecord {
    /// Build a record for a node that is still in the document. Returns
    /// `None` for a node the document no longer knows.
    pub(crate) fn capture<D: DocumentProvider + ?Sized>(
        doc: &D,
        scope: &ScopeFrame,
        node: NodeIdx,
        matched_property_paths: Vec<String>,
    ) -> Option<Self> {
        let header = doc.header(node)?;
        Some(Self {
            node: Some(node),
            node_id: header.id.clone(),
            node_name: header.name.to_string(),
            node_type: header.node_type,
            matched_property_paths,
            path_string: path_string(doc, scope, node),
            scope_name: scope.name.clone(),
        })
    }
}

/// Names from the scope container down to `node`, joined with " / "
fn path_string<D: DocumentProvider + ?Sized>(doc: &D, scope: &ScopeFrame, node: NodeIdx) -> String {
    let mut names = Vec::new();
    let mut current = Some(node);
    while let Some(idx) = current {
        if idx == scope.container {
            break;
        }
        if let Some(header) = doc.header(idx) {
            names.push(header.name);
        }
        current = doc.parent(idx);
    }
    names.push(scope.name.as_str());
    names.reverse();
    names.join(PATH_SEPARATOR)
}

/// Streaming notification for a newly recorded match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub definition_id: String,
    pub definition_name: String,
    pub node: MatchedNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedNode {
    pub id: NodeId,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub scope_name: String,
}

impl MatchEvent {
    pub fn new(definition: &ReferenceDefinition, record: &BoundPropertyRecord) -> Self {
        Self {
            definition_id: definition.id.clone(),
            definition_name: definition.name.clone(),
            node: MatchedNode {
                id: record.node_id.clone(),
                name: record.node_name.clone(),
                node_type: record.node_type,
                scope_name: record.scope_name.clone(),
            },
        }
    }
}

/// Counts over a record list, grouped by node type and property category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total_records: usize,
    /// Records per node type
    pub by_node_type: BTreeMap<NodeType, usize>,
    /// Matched property paths per category
    pub by_category: BTreeMap<PropertyCategory, usize>,
}

impl UsageSummary {
    pub fn from_records(records: &[BoundPropertyRecord]) -> Self {
        let mut summary = Self {
            total_records: records.len(),
            ..Default::default()
        };
        for record in records {
            *summary.by_node_type.entry(record.node_type).or_insert(0) += 1;
            for path in &record.matched_property_paths {
                if let Some(category) = PropertyCategory::from_path(path) {
                    *summary.by_category.entry(category).or_insert(0) += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node_type: NodeType, paths: &[&str]) -> BoundPropertyRecord {
        BoundPropertyRecord {
            node: None,
            node_id: NodeId::new("1:1"),
            node_name: "Node".to_string(),
            node_type,
            matched_property_paths: paths.iter().map(|p| p.to_string()).collect(),
            path_string: "Page / Node".to_string(),
            scope_name: "Page".to_string(),
        }
    }

    #[test]
    fn test_category_from_path() {
        assert_eq!(PropertyCategory::from_path("fills[0].color"), Some(PropertyCategory::Fill));
        assert_eq!(PropertyCategory::from_path("strokes[2].color"), Some(PropertyCategory::Stroke));
        assert_eq!(PropertyCategory::from_path("height"), Some(PropertyCategory::Size));
        assert_eq!(PropertyCategory::from_path("itemSpacing"), Some(PropertyCategory::Spacing));
        assert_eq!(PropertyCategory::from_path("characters"), Some(PropertyCategory::Text));
        assert_eq!(PropertyCategory::from_path("effects[1].radius"), Some(PropertyCategory::Effect));
        assert_eq!(
            PropertyCategory::from_path("componentProperties.label"),
            Some(PropertyCategory::ComponentProperty)
        );
        assert_eq!(PropertyCategory::from_path("opacity"), None);
    }

    #[test]
    fn test_summary_groups_by_type_and_category() {
        let records = vec![
            record(NodeType::Rectangle, &["fills[0].color", "strokes[0].color"]),
            record(NodeType::Rectangle, &["fills[1].color"]),
            record(NodeType::Text, &["characters"]),
        ];
        let summary = UsageSummary::from_records(&records);
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.by_node_type[&NodeType::Rectangle], 2);
        assert_eq!(summary.by_node_type[&NodeType::Text], 1);
        assert_eq!(summary.by_category[&PropertyCategory::Fill], 2);
        assert_eq!(summary.by_category[&PropertyCategory::Stroke], 1);
        assert_eq!(summary.by_category[&PropertyCategory::Text], 1);
        assert!(!summary.by_category.contains_key(&PropertyCategory::Size));
    }

    #[test]
    fn test_record_serializes_final_shape() {
        let json = serde_json::to_value(record(NodeType::Text, &["characters"])).unwrap();
        assert_eq!(json["nodeId"], "1:1");
        assert_eq!(json["nodeType"], "text");
        assert_eq!(json["matchedPropertyPaths"][0], "characters");
        assert_eq!(json["pathString"], "Page / Node");
        assert_eq!(json["scopeName"], "Page");
        assert!(json.get("node").is_none());
    }
}
