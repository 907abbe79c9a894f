#![forbid(unsafe_code)]

//! Best-effort completion inference for the opaque section engine.
//!
//! The engine reports nothing when it finishes reacting to a hash change,
//! so completion is inferred from one of three signals:
//!
//! 1. **Fixed settle delay**: a calibrated wait after the hash write.
//! 2. **Mutation watch**: the host observes section elements and reports
//!    when the expected one becomes active; a timeout bounds the wait.
//! 3. **Scroll quiescence**: after an anchor scroll starts, resolve once no
//!    scroll event has been seen for a quiet period, bounded by a cap.
//!
//! Every signal is tagged with the [`DriveOperation`] it was armed for. A
//! signal for anything but the pending operation is dropped, which is what
//! makes late callbacks from superseded operations harmless.

use core::time::Duration;

use crate::controller::DriveOperation;

/// Strategy used to decide that a section drive has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStrategy {
    FixedDelay { delay: Duration },
    MutationWatch { timeout: Duration },
}

/// What the host must observe for the pending operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Watch {
    /// Nothing to observe; a timer is enough.
    Timer,
    /// Report when the element with this id becomes the active section.
    SectionActivation { element_id: String },
    /// Report every scroll event.
    Scroll,
}

/// Why a pending operation was considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCause {
    SettleDelay,
    Activated,
    /// Mutation watch gave up waiting for the expected element.
    ActivationTimeout,
    ScrollQuiet,
    /// Scrolling never went quiet before the cap.
    ScrollCap,
}

impl CompletionCause {
    /// Whether completion was forced by a bound rather than observed.
    #[must_use]
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::ActivationTimeout | Self::ScrollCap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub op: DriveOperation,
    pub cause: CompletionCause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingKind {
    Fixed,
    Activation { element_id: String },
    Quiescence { quiet: Duration, cap_at: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    op: DriveOperation,
    kind: PendingKind,
    deadline: Duration,
}

/// Tracks at most one pending operation; arming replaces whatever was
/// pending before.
#[derive(Debug, Clone, Default)]
pub struct CompletionDetector {
    pending: Option<Pending>,
}

impl CompletionDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Arm for a section drive toward the engine element `element_id`.
    pub fn arm_section(
        &mut self,
        op: DriveOperation,
        strategy: SettleStrategy,
        element_id: &str,
        now: Duration,
    ) -> Watch {
        let (kind, deadline, watch) = match strategy {
            SettleStrategy::FixedDelay { delay } => {
                (PendingKind::Fixed, now.saturating_add(delay), Watch::Timer)
            }
            SettleStrategy::MutationWatch { timeout } => (
                PendingKind::Activation {
                    element_id: element_id.to_owned(),
                },
                now.saturating_add(timeout),
                Watch::SectionActivation {
                    element_id: element_id.to_owned(),
                },
            ),
        };
        self.pending = Some(Pending { op, kind, deadline });
        watch
    }

    /// Arm scroll quiescence. The quiet timer starts immediately so a scroll
    /// that never moves still completes.
    pub fn arm_scroll(
        &mut self,
        op: DriveOperation,
        quiet: Duration,
        max_wait: Duration,
        now: Duration,
    ) -> Watch {
        let cap_at = now.saturating_add(max_wait);
        self.pending = Some(Pending {
            op,
            kind: PendingKind::Quiescence { quiet, cap_at },
            deadline: now.saturating_add(quiet).min(cap_at),
        });
        Watch::Scroll
    }

    /// Drop the pending operation, returning it.
    pub fn disarm(&mut self) -> Option<DriveOperation> {
        self.pending.take().map(|pending| pending.op)
    }

    #[must_use]
    pub fn pending_op(&self) -> Option<DriveOperation> {
        self.pending.as_ref().map(|pending| pending.op)
    }

    /// Next instant at which [`poll`](Self::poll) can make progress.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Resolve the pending operation if its deadline has passed.
    pub fn poll(&mut self, now: Duration) -> Option<Completion> {
        let pending = self.pending.as_ref()?;
        if now < pending.deadline {
            return None;
        }
        let cause = match &pending.kind {
            PendingKind::Fixed => CompletionCause::SettleDelay,
            PendingKind::Activation { .. } => CompletionCause::ActivationTimeout,
            PendingKind::Quiescence { cap_at, .. } if now >= *cap_at => CompletionCause::ScrollCap,
            PendingKind::Quiescence { .. } => CompletionCause::ScrollQuiet,
        };
        let op = pending.op;
        self.pending = None;
        Some(Completion { op, cause })
    }

    /// Host observed `element_id` becoming active while `op` was watched.
    pub fn section_activated(
        &mut self,
        op: DriveOperation,
        element_id: &str,
    ) -> Option<Completion> {
        let pending = self.pending.as_ref()?;
        if pending.op != op {
            return None;
        }
        match &pending.kind {
            PendingKind::Activation { element_id: expected } if expected == element_id => {
                self.pending = None;
                Some(Completion {
                    op,
                    cause: CompletionCause::Activated,
                })
            }
            _ => None,
        }
    }

    /// Host observed a scroll event while `op` was watched. Pushes the quiet
    /// deadline out, never past the cap. Returns whether the event applied.
    pub fn scroll_observed(&mut self, op: DriveOperation, now: Duration) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        if pending.op != op {
            return false;
        }
        match pending.kind {
            PendingKind::Quiescence { quiet, cap_at } => {
                pending.deadline = now.saturating_add(quiet).min(cap_at);
                true
            }
            _ => false,
        }
    }
}
