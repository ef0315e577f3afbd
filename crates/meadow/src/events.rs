//! Progress events and sinks for observing meadow operations.
//!
//! Long-running operations (sampling, patch building, baking) report what they are
//! doing by sending [`MeadowEvent`]s into an [`EventSink`] passed by the caller.
//! Sinks are fire-and-forget: sending never fails and never changes the result of the
//! operation. A sink may also request cooperative cancellation through
//! [`EventSink::is_cancelled`], which the bake checks between patches and frames.
use tracing::{debug, info, warn};

use crate::physics::controller::BakeReport;

/// Describes events emitted by meadow operations.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum MeadowEvent {
    /// Sampling began on a ground.
    SamplingStarted {
        /// Ground name.
        ground: String,
        /// Number of stratification cells.
        cells: usize,
        /// Total candidate budget over all cells.
        candidate_budget: usize,
    },

    /// Periodic sampling progress.
    SamplingProgress {
        ground: String,
        /// Candidates drawn so far.
        candidates: usize,
        /// Candidate budget.
        budget: usize,
        /// Samples accepted so far.
        accepted: usize,
    },

    /// Sampling finished.
    SamplingFinished {
        ground: String,
        /// Number of samples in the new set.
        samples: usize,
        /// Candidates drawn in total.
        candidates: usize,
    },

    /// A sample set was released.
    SamplesDeleted { ground: String, samples: usize },

    /// Stale patches of a ground were removed before a rebuild.
    PatchesRemoved { ground: String, patches: usize },

    /// Patch building finished.
    PatchesBuilt {
        ground: String,
        /// Number of patches created.
        patches: usize,
        /// Samples skipped because no tile could be placed there.
        skipped: usize,
    },

    /// A physics bake started.
    BakeStarted {
        /// Number of patches to bake.
        patches: usize,
        /// First simulated frame.
        frame_start: i32,
        /// Last simulated frame.
        frame_end: i32,
    },

    /// One patch finished baking.
    PatchBaked {
        /// Position of the patch in bake order.
        index: usize,
        patch: String,
        /// Number of stored frames.
        frames: usize,
    },

    /// One patch failed to bake; the bake continues with the next patch.
    PatchBakeFailed {
        index: usize,
        patch: String,
        frame: i32,
        message: String,
    },

    /// The physics bake finished (possibly with failures).
    BakeFinished { report: BakeReport },

    /// Stored physics state was released.
    PhysicsFreed {
        /// Number of patches whose state was released.
        patches: usize,
    },

    /// Non-fatal warning.
    Warning {
        /// Context string (e.g. ground or patch name).
        context: String,
        /// Human-readable message.
        message: String,
    },
}

/// Discriminant of a [`MeadowEvent`], used by sinks to filter what they receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeadowEventKind {
    SamplingStarted,
    SamplingProgress,
    SamplingFinished,
    SamplesDeleted,
    PatchesRemoved,
    PatchesBuilt,
    BakeStarted,
    PatchBaked,
    PatchBakeFailed,
    BakeFinished,
    PhysicsFreed,
    Warning,
}

impl MeadowEvent {
    pub fn kind(&self) -> MeadowEventKind {
        match self {
            MeadowEvent::SamplingStarted { .. } => MeadowEventKind::SamplingStarted,
            MeadowEvent::SamplingProgress { .. } => MeadowEventKind::SamplingProgress,
            MeadowEvent::SamplingFinished { .. } => MeadowEventKind::SamplingFinished,
            MeadowEvent::SamplesDeleted { .. } => MeadowEventKind::SamplesDeleted,
            MeadowEvent::PatchesRemoved { .. } => MeadowEventKind::PatchesRemoved,
            MeadowEvent::PatchesBuilt { .. } => MeadowEventKind::PatchesBuilt,
            MeadowEvent::BakeStarted { .. } => MeadowEventKind::BakeStarted,
            MeadowEvent::PatchBaked { .. } => MeadowEventKind::PatchBaked,
            MeadowEvent::PatchBakeFailed { .. } => MeadowEventKind::PatchBakeFailed,
            MeadowEvent::BakeFinished { .. } => MeadowEventKind::BakeFinished,
            MeadowEvent::PhysicsFreed { .. } => MeadowEventKind::PhysicsFreed,
            MeadowEvent::Warning { .. } => MeadowEventKind::Warning,
        }
    }
}

/// A generic event sink that accepts [`MeadowEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: MeadowEvent);

    /// Whether the sink is interested in events of `kind`. Producers skip building
    /// events nobody wants.
    fn wants(&self, _kind: MeadowEventKind) -> bool {
        true
    }

    /// Cooperative cancellation request.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: MeadowEvent) {}

    #[inline]
    fn wants(&self, _kind: MeadowEventKind) -> bool {
        false
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(MeadowEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(MeadowEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(MeadowEvent),
{
    #[inline]
    fn send(&mut self, event: MeadowEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects all events in a `Vec`.
#[derive(Default)]
pub struct VecSink {
    events: Vec<MeadowEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<MeadowEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[MeadowEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of collected events of `kind`.
    pub fn count(&self, kind: MeadowEventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: MeadowEvent) {
        self.events.push(event);
    }
}

/// Fan-out sink that forwards each event to all contained sinks.
///
/// Cancellation is requested as soon as any contained sink requests it.
pub struct MultiSink<S: EventSink> {
    pub(crate) sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }

    pub fn into_inner(self) -> Vec<S> {
        self.sinks
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn send(&mut self, event: MeadowEvent) {
        let kind = event.kind();
        let interested: Vec<usize> = (0..self.sinks.len())
            .filter(|&i| self.sinks[i].wants(kind))
            .collect();
        let Some((&last, rest)) = interested.split_last() else {
            return;
        };
        for &i in rest {
            self.sinks[i].send(event.clone());
        }
        self.sinks[last].send(event);
    }

    fn wants(&self, kind: MeadowEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }

    fn is_cancelled(&self) -> bool {
        self.sinks.iter().any(|s| s.is_cancelled())
    }
}

/// Sink that writes progress to the `tracing` log.
///
/// Per-candidate progress is logged at debug level; everything else at info, failures
/// and warnings at warn.
#[derive(Default, Debug, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn send(&mut self, event: MeadowEvent) {
        match event {
            MeadowEvent::SamplingStarted {
                ground,
                cells,
                candidate_budget,
            } => info!("Sampling '{ground}': {cells} cells, {candidate_budget} candidates."),
            MeadowEvent::SamplingProgress {
                ground,
                candidates,
                budget,
                accepted,
            } => debug!("Sampling '{ground}': {candidates}/{budget} candidates, {accepted} samples."),
            MeadowEvent::SamplingFinished {
                ground,
                samples,
                candidates,
            } => info!("Sampled '{ground}': {samples} samples from {candidates} candidates."),
            MeadowEvent::SamplesDeleted { ground, samples } => {
                info!("Deleted {samples} samples of '{ground}'.")
            }
            MeadowEvent::PatchesRemoved { ground, patches } => {
                info!("Removed {patches} patches of '{ground}'.")
            }
            MeadowEvent::PatchesBuilt {
                ground,
                patches,
                skipped,
            } => info!("Built {patches} patches on '{ground}' ({skipped} samples skipped)."),
            MeadowEvent::BakeStarted {
                patches,
                frame_start,
                frame_end,
            } => info!("Baking {patches} patches, frames {frame_start}..={frame_end}."),
            MeadowEvent::PatchBaked {
                index,
                patch,
                frames,
            } => debug!("Baked patch {index} '{patch}' ({frames} frames)."),
            MeadowEvent::PatchBakeFailed {
                index,
                patch,
                frame,
                message,
            } => warn!("Patch {index} '{patch}' failed at frame {frame}: {message}."),
            MeadowEvent::BakeFinished { report } => info!(
                "Bake finished: {} baked, {} failed.",
                report.baked.len(),
                report.failures.len()
            ),
            MeadowEvent::PhysicsFreed { patches } => {
                info!("Freed physics state of {patches} patches.")
            }
            MeadowEvent::Warning { context, message } => warn!("{context}: {message}"),
        }
    }
}

/// Wraps a sink and requests cancellation once `limit` events of `kind` have been seen.
pub struct CancelAfter<S: EventSink> {
    inner: S,
    kind: MeadowEventKind,
    limit: usize,
    seen: usize,
}

impl<S: EventSink> CancelAfter<S> {
    pub fn new(inner: S, kind: MeadowEventKind, limit: usize) -> Self {
        Self {
            inner,
            kind,
            limit,
            seen: 0,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: EventSink> EventSink for CancelAfter<S> {
    fn send(&mut self, event: MeadowEvent) {
        if event.kind() == self.kind {
            self.seen += 1;
        }
        if self.inner.wants(event.kind()) {
            self.inner.send(event);
        }
    }

    fn wants(&self, kind: MeadowEventKind) -> bool {
        kind == self.kind || self.inner.wants(kind)
    }

    fn is_cancelled(&self) -> bool {
        self.seen >= self.limit || self.inner.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(context: &str) -> MeadowEvent {
        MeadowEvent::Warning {
            context: context.into(),
            message: "msg".into(),
        }
    }

    #[test]
    fn vec_sink_collects_events() {
        let mut sink = VecSink::new();
        assert!(sink.is_empty());
        sink.send(warning("a"));
        sink.send(MeadowEvent::PhysicsFreed { patches: 2 });
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.count(MeadowEventKind::Warning), 1);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn unit_sink_wants_nothing() {
        let sink = ();
        assert!(!sink.wants(MeadowEventKind::Warning));
        assert!(!sink.is_cancelled());
    }

    #[test]
    fn multi_sink_fans_out_events() {
        let mut multi = MultiSink::with_sinks(vec![VecSink::new(), VecSink::new()]);
        multi.send(warning("ctx"));
        assert_eq!(multi.sinks.len(), 2);
        assert_eq!(multi.sinks[0].len(), 1);
        assert_eq!(multi.sinks[1].len(), 1);
        assert_eq!(multi.sinks[1].as_slice()[0], warning("ctx"));
    }

    #[test]
    fn fn_sink_invokes_callback() {
        let mut count = 0;
        let mut sink = FnSink::new(|_event| {
            count += 1;
        });
        sink.send(warning("ctx"));
        assert_eq!(count, 1);
    }

    #[test]
    fn cancel_after_trips_on_limit() {
        let mut sink = CancelAfter::new(VecSink::new(), MeadowEventKind::PatchBaked, 2);
        let baked = |index| MeadowEvent::PatchBaked {
            index,
            patch: format!("p{index}"),
            frames: 1,
        };
        sink.send(baked(0));
        assert!(!sink.is_cancelled());
        sink.send(baked(1));
        assert!(sink.is_cancelled());
        assert_eq!(sink.into_inner().len(), 2);
    }
}
