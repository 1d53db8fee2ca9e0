//! Bindscope Core - find every node bound to a design-token definition
//!
//! This library walks a read-only design document, matches bindable
//! properties against one reference definition (by id or by stable key)
//! and streams progress and matches while it runs.

pub mod config;
mod dedupe;
pub mod document;
pub mod error;
pub mod host;
pub mod progress;
pub mod record;
pub mod resolve;
pub mod search;
pub mod walk;

pub use config::{Config, SearchConfig};
pub use document::{Alias, Document, NodeId, NodeIdx, NodeProperties, NodeType, ReferenceDefinition, Slot};
pub use error::{BindscopeError, Diagnostic};
pub use host::{DocumentProvider, NodeHeader, ReferenceStore};
pub use progress::{
    CancelToken, CooperativeYield, EventSink, NoYield, Progress, Scheduler, SearchEvent,
    SearchPhase,
};
pub use record::{BoundPropertyRecord, MatchEvent, PropertyCategory, UsageSummary};
pub use search::{spawn_search, SearchEngine, SearchHandle, SearchMode, SearchOutcome, SearchRequest};
pub use walk::{NodeOutcome, SkipReason, TraversalPolicy};

/// Result type alias for bindscope operations
pub type Result<T> = std::result::Result<T, BindscopeError>;
