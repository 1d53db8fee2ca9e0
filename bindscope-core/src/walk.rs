//! Depth-first traversal and per-node property inspection.
//!
//! Nodes are visited in pre-order, siblings in document order. Hidden and
//! locked nodes are pruned with their whole subtree: a scope reduction for
//! speed, not a correctness filter. A node whose properties cannot be read
//! counts as a non-match, and its children are still walked when their list
//! is readable.

use crate::document::{NodeIdx, NodeProperties, NodeType, Slot};
use crate::error::Diagnostic;
use crate::host::{DocumentProvider, NodeAccessError, NodeHeader, ReferenceStore};
use crate::progress::{EventSink, Flow, ProgressReporter, Scheduler};
use crate::record::{MatchEvent, ScopeFrame};
use crate::resolve::ReferenceResolver;
use crate::search::{SearchContext, SearchMode};

/// Which nodes are pruned together with their subtrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalPolicy {
    pub skip_hidden: bool,
    pub skip_locked: bool,
}

impl Default for TraversalPolicy {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            skip_locked: true,
        }
    }
}

impl TraversalPolicy {
    pub fn prune(&self, header: &NodeHeader<'_>) -> Option<SkipReason> {
        if self.skip_hidden && !header.visible {
            Some(SkipReason::Hidden)
        } else if self.skip_locked && header.locked {
            Some(SkipReason::Locked)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    Locked,
}

/// Result of visiting one node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// At least one property category is bound to the target
    Matched(Vec<String>),
    NoMatch,
    /// Pruned by policy; the subtree is not walked
    Skipped(SkipReason),
    /// Properties could not be read
    Failed(Diagnostic),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WalkEnd {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeIdx,
    /// At or below a representative container
    inside: bool,
}

pub(crate) struct TreeWalker<'h, D: ?Sized> {
    doc: &'h D,
    policy: TraversalPolicy,
    mode: SearchMode,
}

impl<'h, D: DocumentProvider + ?Sized> TreeWalker<'h, D> {
    pub fn new(doc: &'h D, policy: TraversalPolicy, mode: SearchMode) -> Self {
        Self { doc, policy, mode }
    }

    pub fn scope_frame(&self, container: NodeIdx) -> Option<ScopeFrame> {
        self.doc.header(container).map(|header| ScopeFrame {
            container,
            name: header.name.to_string(),
        })
    }

    /// Representative-only searches count and inspect only nodes at or
    /// below an instance; everything else is walked through to reach them.
    fn counts(&self, inside: bool) -> bool {
        match self.mode {
            SearchMode::Direct => true,
            SearchMode::RepresentativeOnly => inside,
        }
    }

    fn child_frames(
        &self,
        node: NodeIdx,
        inside: bool,
    ) -> Result<impl DoubleEndedIterator<Item = Frame> + 'h, NodeAccessError> {
        let doc: &'h D = self.doc;
        let children = doc.children(node)?;
        Ok(children.iter().map(move |&child| Frame {
            node: child,
            inside,
        }))
    }

    /// Pre-pass: number of nodes the walk of `container` will count, or
    /// `None` when the search was cancelled while counting
    pub async fn count<K, Y>(
        &self,
        container: NodeIdx,
        reporter: &mut ProgressReporter<'_, K, Y>,
    ) -> Option<usize>
    where
        K: EventSink + ?Sized,
        Y: Scheduler,
    {
        let mut total = 0;
        let mut stack: Vec<Frame> = match self.child_frames(container, false) {
            Ok(frames) => frames.rev().collect(),
            Err(_) => return Some(0),
        };

        while let Some(frame) = stack.pop() {
            if reporter.tick().await == Flow::Cancelled {
                return None;
            }
            let Some(header) = self.doc.header(frame.node) else {
                continue;
            };
            if self.policy.prune(&header).is_some() {
                continue;
            }
            let inside = frame.inside || header.node_type.is_representative();
            if self.counts(inside) {
                total += 1;
            }
            if let Ok(frames) = self.child_frames(frame.node, inside) {
                stack.extend(frames.rev());
            }
        }
        Some(total)
    }

    /// Walk every node below `scope.container`, recording matches into `ctx`
    pub async fn walk<S, K, Y>(
        &self,
        scope: &ScopeFrame,
        ctx: &mut SearchContext<'h, S>,
        reporter: &mut ProgressReporter<'_, K, Y>,
    ) -> WalkEnd
    where
        S: ReferenceStore + ?Sized,
        K: EventSink + ?Sized,
        Y: Scheduler,
    {
        let mut stack: Vec<Frame> = Vec::new();
        self.push_children(scope.container, false, &mut stack, &mut ctx.diagnostics);

        while let Some(frame) = stack.pop() {
            let Some(header) = self.doc.header(frame.node) else {
                continue;
            };

            if let Some(reason) = self.policy.prune(&header) {
                tracing::trace!(node = %header.id, ?reason, "subtree pruned");
                if reporter.tick().await == Flow::Cancelled {
                    return WalkEnd::Cancelled;
                }
                continue;
            }

            let inside = frame.inside || header.node_type.is_representative();
            let counted = self.counts(inside);
            if reporter.before_visit(counted) == Flow::Cancelled {
                return WalkEnd::Cancelled;
            }
            let outcome = if counted {
                self.visit(frame.node, &header, &mut ctx.resolver, &mut ctx.diagnostics)
            } else {
                NodeOutcome::NoMatch
            };
            self.push_children(frame.node, inside, &mut stack, &mut ctx.diagnostics);

            match outcome {
                NodeOutcome::Matched(paths) => {
                    if let Some(record) =
                        ctx.dedup
                            .record(self.doc, scope, frame.node, paths, &mut ctx.diagnostics)
                    {
                        reporter.on_match(&MatchEvent::new(ctx.definition, &record));
                        ctx.records.push(record);
                    }
                }
                NodeOutcome::Failed(diag) => {
                    tracing::warn!(%diag, "node not inspected");
                    ctx.diagnostics.push(diag);
                }
                NodeOutcome::NoMatch | NodeOutcome::Skipped(_) => {}
            }

            reporter.after_visit(counted).await;
        }
        WalkEnd::Completed
    }

    fn push_children(
        &self,
        node: NodeIdx,
        inside: bool,
        stack: &mut Vec<Frame>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        match self.child_frames(node, inside) {
            Ok(frames) => stack.extend(frames.rev()),
            Err(err) => {
                let diag = Diagnostic::NodeAccess {
                    node: err.node().to_string(),
                    reason: err.to_string(),
                };
                tracing::warn!(%diag, "subtree skipped");
                diagnostics.push(diag);
            }
        }
    }

    /// Inspect one node's bindable properties
    pub fn visit<S: ReferenceStore + ?Sized>(
        &self,
        node: NodeIdx,
        header: &NodeHeader<'_>,
        resolver: &mut ReferenceResolver<'_, S>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> NodeOutcome {
        if let Some(reason) = self.policy.prune(header) {
            return NodeOutcome::Skipped(reason);
        }
        match self.doc.properties(node) {
            Ok(props) => {
                let paths = inspect(header.node_type, props, resolver, diagnostics);
                if paths.is_empty() {
                    NodeOutcome::NoMatch
                } else {
                    NodeOutcome::Matched(paths)
                }
            }
            Err(err) => NodeOutcome::Failed(Diagnostic::NodeAccess {
                node: header.id.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

/// Matched property paths, at most one per category, in category order:
/// fills, strokes, size, spacing, text, effects, component properties.
pub fn inspect<S: ReferenceStore + ?Sized>(
    node_type: NodeType,
    props: &NodeProperties,
    resolver: &mut ReferenceResolver<'_, S>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<String> {
    let mut is_bound = |slot: Option<&Slot>| -> bool {
        match slot.and_then(Slot::alias) {
            Some(alias) => resolver.is_equivalent(alias, diagnostics),
            None => false,
        }
    };
    let mut matched = Vec::new();

    if let Some(i) = props.fills.iter().position(|p| is_bound(p.color.as_ref())) {
        matched.push(format!("fills[{i}].color"));
    }
    if let Some(i) = props.strokes.iter().position(|p| is_bound(p.color.as_ref())) {
        matched.push(format!("strokes[{i}].color"));
    }

    let size = [("width", props.width.as_ref()), ("height", props.height.as_ref())];
    if let Some((name, _)) = size.into_iter().find(|&(_, slot)| is_bound(slot)) {
        matched.push(name.to_string());
    }

    let spacing = [
        ("paddingLeft", props.padding_left.as_ref()),
        ("paddingRight", props.padding_right.as_ref()),
        ("paddingTop", props.padding_top.as_ref()),
        ("paddingBottom", props.padding_bottom.as_ref()),
        ("itemSpacing", props.item_spacing.as_ref()),
        ("counterAxisSpacing", props.counter_axis_spacing.as_ref()),
    ];
    if let Some((name, _)) = spacing.into_iter().find(|&(_, slot)| is_bound(slot)) {
        matched.push(name.to_string());
    }

    if is_bound(props.characters.as_ref()) {
        matched.push("characters".to_string());
    }

    'effects: for (i, effect) in props.effects.iter().enumerate() {
        let fields = [
            ("color", effect.color.as_ref()),
            ("offsetX", effect.offset_x.as_ref()),
            ("offsetY", effect.offset_y.as_ref()),
            ("radius", effect.radius.as_ref()),
            ("spread", effect.spread.as_ref()),
        ];
        for (field, slot) in fields {
            if is_bound(slot) {
                matched.push(format!("effects[{i}].{field}"));
                break 'effects;
            }
        }
    }

    if node_type.has_component_properties() {
        if let Some((name, _)) = props
            .component_properties
            .iter()
            .find(|(_, slot)| is_bound(Some(*slot)))
        {
            matched.push(format!("componentProperties.{name}"));
        }
    }

    matched
}
