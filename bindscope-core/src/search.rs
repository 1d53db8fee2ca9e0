//! Search orchestration: pre-pass count, per-container walk, aggregation.
//!
//! Every cache a search uses (alias keys, confirmed ids, seen
//! representatives, counters) lives in a [`SearchContext`] built fresh for
//! each call and dropped when it returns.

use crate::config::SearchConfig;
use crate::dedupe::Deduplicator;
use crate::document::ReferenceDefinition;
use crate::error::{BindscopeError, Diagnostic};
use crate::host::{DocumentProvider, ReferenceStore};
use crate::progress::{
    CancelToken, CooperativeYield, EventSink, NoYield, ProgressReporter, Scheduler, SearchEvent,
    SearchPhase,
};
use crate::record::{BoundPropertyRecord, UsageSummary};
use crate::resolve::ReferenceResolver;
use crate::walk::{TraversalPolicy, TreeWalker, WalkEnd};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// How matches are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchMode {
    /// Every matching node is its own record
    #[default]
    #[serde(rename = "direct")]
    Direct,
    /// Matches collapse onto their nearest enclosing instance
    #[serde(rename = "representative-only")]
    RepresentativeOnly,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::RepresentativeOnly => "representative-only",
        }
    }
}

impl Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = BindscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "representative-only" | "representative" => Ok(Self::RepresentativeOnly),
            _ => Err(BindscopeError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub definition_id: String,
    #[serde(default)]
    pub mode: SearchMode,
    /// Restrict the search to one container; `None` searches all of them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl SearchRequest {
    pub fn new(definition_id: impl Into<String>) -> Self {
        Self {
            definition_id: definition_id.into(),
            mode: SearchMode::default(),
            scope: None,
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Final result of one search
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<ReferenceDefinition>,
    pub mode: SearchMode,
    pub records: Vec<BoundPropertyRecord>,
    pub summary: UsageSummary,
    pub cancelled: bool,
    pub visited: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl SearchOutcome {
    fn empty(mode: SearchMode, definition: Option<ReferenceDefinition>, diag: Diagnostic) -> Self {
        Self {
            definition,
            mode,
            records: Vec::new(),
            summary: UsageSummary::default(),
            cancelled: false,
            visited: 0,
            total: 0,
            diagnostics: vec![diag],
        }
    }
}

/// Mutable state owned by exactly one in-flight search
pub(crate) struct SearchContext<'h, S: ?Sized> {
    pub definition: &'h ReferenceDefinition,
    pub resolver: ReferenceResolver<'h, S>,
    pub dedup: Deduplicator,
    pub records: Vec<BoundPropertyRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'h, S: ReferenceStore + ?Sized> SearchContext<'h, S> {
    fn new(store: &'h S, definition: &'h ReferenceDefinition, mode: SearchMode) -> Self {
        Self {
            definition,
            resolver: ReferenceResolver::new(store, definition),
            dedup: Deduplicator::new(mode),
            records: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// Read-only query engine over a host document
pub struct SearchEngine<'h, D: ?Sized, S: ?Sized> {
    document: &'h D,
    store: &'h S,
    config: SearchConfig,
}

impl<'h, D, S> SearchEngine<'h, D, S>
where
    D: DocumentProvider + ?Sized,
    S: ReferenceStore + ?Sized,
{
    pub fn new(document: &'h D, store: &'h S, config: SearchConfig) -> Self {
        Self {
            document,
            store,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn policy(&self) -> TraversalPolicy {
        TraversalPolicy {
            skip_hidden: self.config.skip_hidden,
            skip_locked: self.config.skip_locked,
        }
    }

    /// Run a search without events or yielding
    pub async fn run(&self, request: &SearchRequest) -> SearchOutcome {
        self.search(request, &mut (), &mut NoYield, &CancelToken::new())
            .await
    }

    /// Run a search, streaming events to `sink` and calling `scheduler` at
    /// every progress cadence point and every `progress_every` walked nodes.
    /// Cancellation through `cancel` ends the search early with the records
    /// found so far.
    pub async fn search<K, Y>(
        &self,
        request: &SearchRequest,
        sink: &mut K,
        scheduler: &mut Y,
        cancel: &CancelToken,
    ) -> SearchOutcome
    where
        K: EventSink + ?Sized,
        Y: Scheduler,
    {
        let mut reporter =
            ProgressReporter::new(sink, scheduler, cancel, self.config.progress_every());
        let store: &'h S = self.store;

        let Some(definition) = store.definition(&request.definition_id) else {
            let diag = Diagnostic::DefinitionNotFound {
                definition: request.definition_id.clone(),
            };
            tracing::warn!(%diag, "search skipped");
            reporter.phase(SearchPhase::Completed);
            reporter.phase(SearchPhase::Idle);
            return SearchOutcome::empty(request.mode, None, diag);
        };

        if let Some(scope) = request.scope.as_deref() {
            if !store.container_exists(scope) {
                let diag = Diagnostic::ScopeNotFound {
                    scope: scope.to_string(),
                };
                tracing::warn!(%diag, "search skipped");
                reporter.phase(SearchPhase::Completed);
                reporter.phase(SearchPhase::Idle);
                return SearchOutcome::empty(request.mode, Some(definition.clone()), diag);
            }
        }

        let containers = self.document.scope_containers(request.scope.as_deref());
        let walker = TreeWalker::new(self.document, self.policy(), request.mode);

        reporter.phase(SearchPhase::Counting);
        let mut total = 0;
        let mut cancelled = false;
        for &container in &containers {
            match walker.count(container, &mut reporter).await {
                Some(count) => total += count,
                None => {
                    cancelled = true;
                    break;
                }
            }
        }
        reporter.set_total(total);
        tracing::debug!(
            definition = %definition.id,
            mode = %request.mode,
            containers = containers.len(),
            total,
            cancelled,
            "pre-pass complete"
        );

        let mut ctx = SearchContext::new(store, definition, request.mode);
        if !cancelled {
            reporter.phase(SearchPhase::Scanning);
            for container in containers {
                let Some(scope) = walker.scope_frame(container) else {
                    continue;
                };
                tracing::debug!(container = %scope.name, "scanning container");
                if walker.walk(&scope, &mut ctx, &mut reporter).await == WalkEnd::Cancelled {
                    cancelled = true;
                    break;
                }
            }
        }

        if cancelled {
            reporter.finish_cancelled();
            reporter.phase(SearchPhase::Cancelled);
        } else {
            reporter.phase(SearchPhase::Completed);
        }
        let visited = reporter.visited();
        tracing::info!(
            definition = %definition.id,
            records = ctx.records.len(),
            visited,
            total,
            cancelled,
            lookups = ctx.resolver.lookups(),
            "search finished"
        );
        reporter.phase(SearchPhase::Idle);

        let summary = UsageSummary::from_records(&ctx.records);
        SearchOutcome {
            definition: Some(definition.clone()),
            mode: request.mode,
            records: ctx.records,
            summary,
            cancelled,
            visited,
            total,
            diagnostics: ctx.diagnostics,
        }
    }
}

/// A search running on a tokio task
pub struct SearchHandle {
    pub events: mpsc::UnboundedReceiver<SearchEvent>,
    pub cancel: CancelToken,
    task: tokio::task::JoinHandle<SearchOutcome>,
}

impl SearchHandle {
    /// Request cancellation; takes effect at the next node visit
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the final outcome
    pub async fn finish(self) -> crate::Result<SearchOutcome> {
        self.task
            .await
            .map_err(|err| BindscopeError::Task(err.to_string()))
    }
}

/// Start a search on the current tokio runtime. Events stream through
/// `SearchHandle::events` until the search ends.
pub fn spawn_search<H>(host: Arc<H>, config: SearchConfig, request: SearchRequest) -> SearchHandle
where
    H: DocumentProvider + ReferenceStore + Send + Sync + 'static,
{
    let (tx, events) = mpsc::unbounded_channel();
    let cancel = CancelToken::new();
    let task_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        let engine = SearchEngine::new(host.as_ref(), host.as_ref(), config);
        let mut sink = tx;
        engine
            .search(&request, &mut sink, &mut CooperativeYield, &task_cancel)
            .await
    });

    SearchHandle {
        events,
        cancel,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;
    use serde_json::json;

    fn doc() -> Document {
        Document::from_value(json!({
            "definitions": [ { "id": "V:1", "name": "color/brand", "key": "k-1" } ],
            "pages": [
                { "id": "0:1", "name": "Page 1", "type": "page", "children": [
                    { "id": "1:1", "name": "Box", "type": "rectangle",
                      "properties": { "fills": [ { "color": { "alias": "V:1" } } ] } }
                ]},
                { "id": "0:2", "name": "Page 2", "type": "page", "children": [
                    { "id": "2:1", "name": "Other", "type": "rectangle",
                      "properties": { "strokes": [ { "color": { "alias": "V:1" } } ] } }
                ]}
            ]
        }))
        .unwrap()
    }

    fn engine(doc: &Document) -> SearchEngine<'_, Document, Document> {
        SearchEngine::new(doc, doc, SearchConfig::default())
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("direct".parse::<SearchMode>().unwrap(), SearchMode::Direct);
        assert_eq!(
            "representative-only".parse::<SearchMode>().unwrap(),
            SearchMode::RepresentativeOnly
        );
        assert!(matches!(
            "nope".parse::<SearchMode>(),
            Err(BindscopeError::UnknownMode(_))
        ));
        assert_eq!(
            serde_json::to_string(&SearchMode::RepresentativeOnly).unwrap(),
            "\"representative-only\""
        );
    }

    #[tokio::test]
    async fn test_containers_searched_in_order() {
        let doc = doc();
        let outcome = engine(&doc).run(&SearchRequest::new("V:1")).await;
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, ["1:1", "2:1"]);
        assert_eq!(outcome.records[1].scope_name, "Page 2");
        assert_eq!(outcome.visited, 2);
        assert_eq!(outcome.total, 2);
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn test_scope_limits_search() {
        let doc = doc();
        let request = SearchRequest::new("V:1").with_scope("0:2");
        let outcome = engine(&doc).run(&request).await;
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].node_id.as_str(), "2:1");
    }

    #[tokio::test]
    async fn test_missing_scope_is_empty_with_diagnostic() {
        let doc = doc();
        let request = SearchRequest::new("V:1").with_scope("9:9");
        let outcome = engine(&doc).run(&request).await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.total, 0);
        assert_eq!(
            outcome.diagnostics,
            [Diagnostic::ScopeNotFound {
                scope: "9:9".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_definition_is_empty_with_diagnostic() {
        let doc = doc();
        let outcome = engine(&doc).run(&SearchRequest::new("V:404")).await;
        assert!(outcome.records.is_empty());
        assert!(outcome.definition.is_none());
        assert_eq!(outcome.diagnostics[0].kind(), "definition_not_found");
    }

    #[tokio::test]
    async fn test_phase_sequence() {
        let doc = doc();
        let mut events: Vec<SearchEvent> = Vec::new();
        engine(&doc)
            .search(
                &SearchRequest::new("V:1"),
                &mut events,
                &mut NoYield,
                &CancelToken::new(),
            )
            .await;
        let phases: Vec<SearchPhase> = events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Phase { phase } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            [
                SearchPhase::Counting,
                SearchPhase::Scanning,
                SearchPhase::Completed,
                SearchPhase::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_spawned_search_streams_events() {
        let doc = Arc::new(doc());
        let mut handle = spawn_search(doc, SearchConfig::default(), SearchRequest::new("V:1"));
        let mut matches = 0;
        while let Some(event) = handle.events.recv().await {
            if let SearchEvent::Match(m) = event {
                assert_eq!(m.definition_name, "color/brand");
                matches += 1;
            }
        }
        let outcome = handle.finish().await.unwrap();
        assert_eq!(matches, 2);
        assert_eq!(outcome.records.len(), 2);
    }
}
