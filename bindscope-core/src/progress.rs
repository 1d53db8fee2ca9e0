//! Progress reporting, streaming events, cooperative yielding and cancellation

use crate::record::MatchEvent;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of one search invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    Idle,
    Counting,
    Scanning,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub visited: usize,
    pub total: usize,
    /// 0..=100
    pub percentage: u8,
    pub matches_so_far: usize,
}

impl Progress {
    pub fn new(visited: usize, total: usize, matches_so_far: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            (visited.saturating_mul(100) / total).min(100) as u8
        };
        Self {
            visited,
            total,
            percentage,
            matches_so_far,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SearchEvent {
    Phase { phase: SearchPhase },
    Progress(Progress),
    Match(MatchEvent),
}

/// Receives events while a search runs
pub trait EventSink {
    fn on_progress(&mut self, progress: &Progress);

    fn on_match(&mut self, event: &MatchEvent);

    fn on_phase(&mut self, _phase: SearchPhase) {}
}

/// Discard all events
impl EventSink for () {
    fn on_progress(&mut self, _progress: &Progress) {}

    fn on_match(&mut self, _event: &MatchEvent) {}
}

/// Collect all events in order
impl EventSink for Vec<SearchEvent> {
    fn on_progress(&mut self, progress: &Progress) {
        self.push(SearchEvent::Progress(*progress));
    }

    fn on_match(&mut self, event: &MatchEvent) {
        self.push(SearchEvent::Match(event.clone()));
    }

    fn on_phase(&mut self, phase: SearchPhase) {
        self.push(SearchEvent::Phase { phase });
    }
}

/// Async stream; a dropped receiver just means nobody is listening
impl EventSink for tokio::sync::mpsc::UnboundedSender<SearchEvent> {
    fn on_progress(&mut self, progress: &Progress) {
        let _ = self.send(SearchEvent::Progress(*progress));
    }

    fn on_match(&mut self, event: &MatchEvent) {
        let _ = self.send(SearchEvent::Match(event.clone()));
    }

    fn on_phase(&mut self, phase: SearchPhase) {
        let _ = self.send(SearchEvent::Phase { phase });
    }
}

/// Threaded hosts: publish without blocking. Events that do not fit in a
/// bounded channel are dropped; the final outcome still holds every record.
impl EventSink for crossbeam_channel::Sender<SearchEvent> {
    fn on_progress(&mut self, progress: &Progress) {
        let _ = self.try_send(SearchEvent::Progress(*progress));
    }

    fn on_match(&mut self, event: &MatchEvent) {
        if self.try_send(SearchEvent::Match(event.clone())).is_err() {
            tracing::debug!(node = %event.node.id, "match event dropped, channel full");
        }
    }

    fn on_phase(&mut self, phase: SearchPhase) {
        let _ = self.try_send(SearchEvent::Phase { phase });
    }
}

/// Invoked at every progress cadence point so the host can repaint or
/// process pending work. This is the engine's only suspension point.
pub trait Scheduler {
    fn checkpoint(&mut self) -> impl Future<Output = ()> + Send;
}

/// Hand control back to the tokio scheduler once per cadence point
#[derive(Debug, Clone, Copy, Default)]
pub struct CooperativeYield;

impl Scheduler for CooperativeYield {
    fn checkpoint(&mut self) -> impl Future<Output = ()> + Send {
        tokio::task::yield_now()
    }
}

/// Never suspend
#[derive(Debug, Clone, Copy, Default)]
pub struct NoYield;

impl Scheduler for NoYield {
    fn checkpoint(&mut self) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }
}

/// Cooperative cancellation flag, polled before every node visit.
/// Clones share the flag; cancelling twice is harmless.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Whether the walker may go on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cancelled,
}

/// Per-search visit counter and event fan-out
pub(crate) struct ProgressReporter<'r, K: ?Sized, Y> {
    sink: &'r mut K,
    scheduler: &'r mut Y,
    cancel: &'r CancelToken,
    every: usize,
    /// Nodes stepped over in any phase, counted or not; drives yielding
    steps: usize,
    visited: usize,
    total: usize,
    matches: usize,
}

impl<'r, K: EventSink + ?Sized, Y: Scheduler> ProgressReporter<'r, K, Y> {
    pub fn new(
        sink: &'r mut K,
        scheduler: &'r mut Y,
        cancel: &'r CancelToken,
        every: usize,
    ) -> Self {
        Self {
            sink,
            scheduler,
            cancel,
            every: every.max(1),
            steps: 0,
            visited: 0,
            total: 0,
            matches: 0,
        }
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    pub fn phase(&mut self, phase: SearchPhase) {
        tracing::debug!(?phase, "search phase");
        self.sink.on_phase(phase);
    }

    /// Poll cancellation, then count the visit if `counted`
    pub fn before_visit(&mut self, counted: bool) -> Flow {
        if self.cancel.is_cancelled() {
            return Flow::Cancelled;
        }
        self.steps += 1;
        if counted {
            self.visited += 1;
        }
        Flow::Continue
    }

    /// Close a visit once its match, if any, has been recorded. Emits
    /// progress on the first counted visit, every `every`th and the last
    /// one, and yields at those points and every `every` steps.
    pub async fn after_visit(&mut self, counted: bool) {
        let due = counted
            && (self.visited == 1
                || self.visited % self.every == 0
                || self.visited == self.total);
        if due {
            let progress = self.snapshot();
            self.sink.on_progress(&progress);
        }
        if due || self.steps % self.every == 0 {
            self.scheduler.checkpoint().await;
        }
    }

    /// Step over a node that is neither counted nor inspected
    pub async fn tick(&mut self) -> Flow {
        if self.cancel.is_cancelled() {
            return Flow::Cancelled;
        }
        self.steps += 1;
        if self.steps % self.every == 0 {
            self.scheduler.checkpoint().await;
        }
        Flow::Continue
    }

    pub fn on_match(&mut self, event: &MatchEvent) {
        self.matches += 1;
        self.sink.on_match(event);
    }

    /// Emit one last progress event for a search that stopped early
    pub fn finish_cancelled(&mut self) {
        let progress = self.snapshot();
        self.sink.on_progress(&progress);
    }

    pub fn snapshot(&self) -> Progress {
        Progress::new(self.visited, self.total, self.matches)
    }

    pub fn visited(&self) -> usize {
        self.visited
    }
}
