//! Collapse matches onto their representative (instance) ancestor

use crate::document::NodeIdx;
use crate::error::Diagnostic;
use crate::host::DocumentProvider;
use crate::record::{BoundPropertyRecord, ScopeFrame};
use crate::search::SearchMode;
use std::collections::HashSet;

pub(crate) struct Deduplicator {
    mode: SearchMode,
    /// Representatives already recorded in this search
    seen: HashSet<NodeIdx>,
}

impl Deduplicator {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            seen: HashSet::new(),
        }
    }

    /// Turn a match into a record, or `None` when it is suppressed.
    ///
    /// In representative-only mode the first match under a representative
    /// wins: later matches under the same representative are dropped and do
    /// not extend its property list.
    pub fn record<D: DocumentProvider + ?Sized>(
        &mut self,
        doc: &D,
        scope: &ScopeFrame,
        node: NodeIdx,
        matched_paths: Vec<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<BoundPropertyRecord> {
        let target = match self.mode {
            SearchMode::Direct => node,
            SearchMode::RepresentativeOnly => {
                let Some(representative) = representative_of(doc, scope.container, node) else {
                    tracing::trace!(node = node.index(), "match outside any instance dropped");
                    return None;
                };
                if self.seen.contains(&representative) {
                    return None;
                }
                representative
            }
        };

        match BoundPropertyRecord::capture(doc, scope, target, matched_paths) {
            Some(record) => {
                if self.mode == SearchMode::RepresentativeOnly {
                    self.seen.insert(target);
                }
                Some(record)
            }
            None => {
                let diag = Diagnostic::StaleNode {
                    node: format!("#{}", target.index()),
                };
                tracing::warn!(%diag, "matched node vanished");
                diagnostics.push(diag);
                None
            }
        }
    }
}

/// Nearest node at or above `node` that is a representative container.
/// The climb stops at `boundary` (the scope container) and never passes it.
pub(crate) fn representative_of<D: DocumentProvider + ?Sized>(
    doc: &D,
    boundary: NodeIdx,
    node: NodeIdx,
) -> Option<NodeIdx> {
    let mut current = node;
    loop {
        if current == boundary {
            return None;
        }
        if doc.header(current)?.node_type.is_representative() {
            return Some(current);
        }
        current = doc.parent(current)?;
    }
}
