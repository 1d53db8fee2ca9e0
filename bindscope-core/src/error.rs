//! Error types for bindscope operations

use serde::Serialize;
use std::path::PathBuf;

/// Failures that reach the caller. Nothing inside a running search produces
/// one of these; search-time failures are recorded as [`Diagnostic`]s.
#[derive(Debug, thiserror::Error)]
pub enum BindscopeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Duplicate node id in document: {0}")]
    DuplicateNode(String),

    #[error("Duplicate definition id in document: {0}")]
    DuplicateDefinition(String),

    #[error("Document has too many nodes: {0} exceeds the arena limit")]
    DocumentTooLarge(usize),

    #[error("Unknown search mode: {0} (expected \"direct\" or \"representative-only\")")]
    UnknownMode(String),

    #[error("Search task failed: {0}")]
    Task(String),
}

/// A recovered failure observed during a search.
///
/// Each one means a unit of work was skipped; the search itself carried on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Reading a node's properties or children failed
    #[error("node {node} not inspected: {reason}")]
    NodeAccess { node: String, reason: String },

    /// An alias could not be resolved to a key; cached as non-equivalent
    #[error("alias {alias_id} unresolved: {reason}")]
    Resolution { alias_id: String, reason: String },

    #[error("scope container {scope} does not exist")]
    ScopeNotFound { scope: String },

    #[error("definition {definition} does not exist")]
    DefinitionNotFound { definition: String },

    /// A matched node vanished before its record could be built
    #[error("node {node} is no longer in the document")]
    StaleNode { node: String },
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeAccess { .. } => "node_access",
            Self::Resolution { .. } => "resolution",
            Self::ScopeNotFound { .. } => "scope_not_found",
            Self::DefinitionNotFound { .. } => "definition_not_found",
            Self::StaleNode { .. } => "stale_node",
        }
    }
}
