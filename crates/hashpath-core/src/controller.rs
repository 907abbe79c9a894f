#![forbid(unsafe_code)]

//! Drive controller: the state machine that moves the opaque engine.
//!
//! The controller is deterministic and host-driven. Every entry point takes
//! the host's monotonic time and (where it matters) the observed location,
//! and returns a [`Dispatch`]: ordered [`HostCommand`]s for the host to
//! execute plus structured log entries describing the decision.
//!
//! # States
//!
//! - `Idle`: nothing in flight.
//! - `Driving`: a hash token was written (or adopted) and the engine is
//!   assumed to be switching sections; completes through the
//!   [`CompletionDetector`].
//! - `SettlingScroll`: an anchor scroll is running; completes on scroll
//!   quiescence and re-asserts the clean URL.
//!
//! # Ordering
//!
//! Every drive gets a fresh [`DriveOperation`]. Starting one disarms the
//! previous one, so only the newest can commit (latest wins). Hash tokens the
//! controller wrote stay recognizable as echoes until shortly after the
//! newest drive commits, which keeps our own `hashchange`/`popstate` events
//! from being routed as foreign navigation.

use core::mem;
use core::time::Duration;

use tracing::{debug, trace, warn};

use crate::classify::ScrollPrefs;
use crate::codec::PathHashCodec;
use crate::completion::{Completion, CompletionCause, CompletionDetector, SettleStrategy, Watch};
use crate::config::RouterConfig;
use crate::history::{HistoryCommand, HistoryMode, HistoryWriter, Location};
use crate::section::{NavigationState, ScrollAnchor, Section};

/// How long a written token is still treated as an echo after the newest
/// drive committed.
pub const ECHO_GRACE: Duration = Duration::from_millis(250);

/// Upper bound on remembered echo tokens.
const MAX_ECHO_TOKENS: usize = 16;

/// Token identifying one "move the engine" request. Monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriveOperation(u64);

impl DriveOperation {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// `location.hash = ...` (new entry) or `location.replace('#...')`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashWriteMode {
    Assign,
    Replace,
}

/// Side effect the host must perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    WriteHash {
        token: String,
        mode: HashWriteMode,
    },
    History(HistoryCommand),
    ArmDetector {
        op: DriveOperation,
        watch: Watch,
    },
    DisarmDetector {
        op: DriveOperation,
    },
    ScrollToAnchor {
        op: DriveOperation,
        anchor: ScrollAnchor,
        prefs: ScrollPrefs,
    },
    ScrollToTop,
}

/// Read-only view of the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveState {
    Idle,
    Driving { op: DriveOperation, token: String },
    SettlingScroll { op: DriveOperation, anchor: ScrollAnchor },
}

/// Entry point that produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrivePhase {
    Click,
    HashChange,
    PopState,
    Section,
    Anchor,
    Adopt,
    Poll,
    Activation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveIgnoredReason {
    /// Event carried a token we wrote ourselves.
    Echo,
    /// Target is already active; nothing to write.
    AlreadyActive,
    /// Location already shows the committed state.
    AlreadyCanonical,
    /// Signal for an operation that is no longer current.
    StaleOperation,
    /// Activation of an element other than the expected one.
    UnexpectedElement,
    /// Click not on a same-page fragment link.
    NotFragmentLink,
    /// Click with modifiers, non-primary button, or already handled.
    ModifiedClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Hash written (or adopted); waiting for the engine.
    Started,
    /// Engine already showed the target; history written directly.
    CommittedImmediately,
    /// Drive settled and the clean URL was committed.
    Committed(CompletionCause),
    /// Anchor scroll settled; URL had drifted and was rewritten.
    Reasserted(CompletionCause),
    /// Anchor scroll settled; URL was already canonical.
    Settled(CompletionCause),
    /// Anchor scroll started.
    Scrolling,
    Ignored(DriveIgnoredReason),
}

/// Structured record of one controller decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveLogEntry {
    pub phase: DrivePhase,
    pub op: Option<DriveOperation>,
    pub superseded: Option<DriveOperation>,
    pub outcome: DriveOutcome,
}

/// Commands and log entries produced by one entry point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub commands: Vec<HostCommand>,
    pub log: Vec<DriveLogEntry>,
}

impl Dispatch {
    pub(crate) fn ignored(phase: DrivePhase, reason: DriveIgnoredReason) -> Self {
        let mut dispatch = Self::default();
        dispatch.record(phase, None, None, DriveOutcome::Ignored(reason));
        dispatch
    }

    pub(crate) fn record(
        &mut self,
        phase: DrivePhase,
        op: Option<DriveOperation>,
        superseded: Option<DriveOperation>,
        outcome: DriveOutcome,
    ) {
        self.log.push(DriveLogEntry {
            phase,
            op,
            superseded,
            outcome,
        });
    }

    /// Append `other` after this dispatch.
    pub fn extend(&mut self, other: Self) {
        self.commands.extend(other.commands);
        self.log.extend(other.log);
    }

    /// History commands, in order.
    pub fn history(&self) -> impl Iterator<Item = &HistoryCommand> {
        self.commands.iter().filter_map(|command| match command {
            HostCommand::History(history) => Some(history),
            _ => None,
        })
    }

    /// Number of commands that create a new history entry.
    #[must_use]
    pub fn entries_created(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| {
                matches!(
                    command,
                    HostCommand::WriteHash {
                        mode: HashWriteMode::Assign,
                        ..
                    } | HostCommand::History(HistoryCommand {
                        mode: HistoryMode::Push,
                        ..
                    })
                )
            })
            .count()
    }

    /// Final outcome recorded, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<DriveOutcome> {
        self.log.last().map(|entry| entry.outcome)
    }
}

/// Request for a section drive.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionRequest {
    pub section: Section,
    /// Create a history entry (user navigation) rather than replace.
    pub push: bool,
    /// Anchor to scroll to once the section has settled.
    pub follow: Option<(ScrollAnchor, ScrollPrefs)>,
    /// Scroll to the top when committing a base section entry.
    pub restore_top: bool,
}

impl SectionRequest {
    #[must_use]
    pub fn new(section: Section, push: bool) -> Self {
        Self {
            section,
            push,
            follow: None,
            restore_top: false,
        }
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: ScrollAnchor, prefs: ScrollPrefs) -> Self {
        self.follow = Some((anchor, prefs));
        self
    }

    #[must_use]
    pub fn restoring_top(mut self, restore_top: bool) -> Self {
        self.restore_top = restore_top;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FollowUp {
    anchor: ScrollAnchor,
    prefs: ScrollPrefs,
}

#[derive(Debug, Clone, PartialEq)]
struct SectionDrive {
    op: DriveOperation,
    token: String,
    section: Section,
    follow: Option<FollowUp>,
    restore_top: bool,
    /// The drive created a history entry that has not been committed yet.
    entry_created: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct AnchorScroll {
    op: DriveOperation,
    anchor: ScrollAnchor,
    state: NavigationState,
    show_fragment: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Active {
    Idle,
    Driving(SectionDrive),
    SettlingScroll(AnchorScroll),
}

#[derive(Debug, Clone)]
struct Superseded {
    op: DriveOperation,
    entry_created: bool,
    /// Target of an uncommitted section drive.
    section: Option<Section>,
}

#[derive(Debug, Clone)]
struct EchoToken {
    token: String,
    expires_at: Option<Duration>,
}

/// Central navigation state machine. Sole producer of hash writes; history
/// writes go through its [`HistoryWriter`].
#[derive(Debug, Clone)]
pub struct DriveController {
    codec: PathHashCodec,
    history: HistoryWriter,
    detector: CompletionDetector,
    settle: SettleStrategy,
    scroll_quiet: Duration,
    scroll_max_wait: Duration,
    active: Active,
    engine_section: Option<Section>,
    current: NavigationState,
    current_shows_fragment: bool,
    echoes: Vec<EchoToken>,
    next_op: u64,
}

impl DriveController {
    #[must_use]
    pub fn new(codec: PathHashCodec, origin: &str, config: &RouterConfig) -> Self {
        Self {
            codec,
            history: HistoryWriter::new(origin),
            detector: CompletionDetector::new(),
            settle: config.settle.strategy(),
            scroll_quiet: config.scroll_quiet(),
            scroll_max_wait: config.scroll_max_wait(),
            active: Active::Idle,
            engine_section: None,
            current: NavigationState::default(),
            current_shows_fragment: true,
            echoes: Vec::new(),
            next_op: 1,
        }
    }

    #[must_use]
    pub fn codec(&self) -> &PathHashCodec {
        &self.codec
    }

    #[must_use]
    pub fn history(&self) -> &HistoryWriter {
        &self.history
    }

    /// Last committed (or currently settling) canonical state.
    #[must_use]
    pub fn current(&self) -> &NavigationState {
        &self.current
    }

    /// Section the engine is believed to show.
    #[must_use]
    pub fn engine_section(&self) -> Option<&Section> {
        self.engine_section.as_ref()
    }

    /// Record what the engine shows before the first drive (page load).
    pub fn assume_engine_section(&mut self, section: Option<Section>) {
        self.engine_section = section.map(|section| self.codec.canonical(section));
    }

    #[must_use]
    pub fn state(&self) -> DriveState {
        match &self.active {
            Active::Idle => DriveState::Idle,
            Active::Driving(drive) => DriveState::Driving {
                op: drive.op,
                token: drive.token.clone(),
            },
            Active::SettlingScroll(scroll) => DriveState::SettlingScroll {
                op: scroll.op,
                anchor: scroll.anchor.clone(),
            },
        }
    }

    /// Operation currently in flight.
    #[must_use]
    pub fn active_op(&self) -> Option<DriveOperation> {
        match &self.active {
            Active::Idle => None,
            Active::Driving(drive) => Some(drive.op),
            Active::SettlingScroll(scroll) => Some(scroll.op),
        }
    }

    /// Next instant at which [`poll`](Self::poll) can make progress.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.detector.next_deadline()
    }

    /// Whether `fragment` (with or without `#`) is a token this controller
    /// wrote and is still expecting to hear back about.
    pub fn is_echo(&mut self, fragment: &str, now: Duration) -> bool {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        if fragment.is_empty() {
            return false;
        }
        if let Active::Driving(drive) = &self.active {
            if drive.token == fragment {
                return true;
            }
        }
        self.echoes
            .retain(|echo| echo.expires_at.is_none_or(|expires_at| now < expires_at));
        self.echoes.iter().any(|echo| echo.token == fragment)
    }

    /// Drop echo tokens of drives that already committed. Called when a
    /// foreign hash arrives.
    pub fn forget_echoes(&mut self) {
        self.echoes.retain(|echo| echo.expires_at.is_none());
    }

    /// Whether the location shows the canonical URL of [`current`](Self::current).
    #[must_use]
    pub fn shows_current(&self, observed: &Location) -> bool {
        HistoryWriter::is_canonical(&self.current, self.current_shows_fragment, observed)
    }

    /// The browser traversed to another entry carrying `state`. An entry
    /// created by the in-flight drive is no longer the current one.
    pub fn note_traversal(&mut self, state: Option<NavigationState>) {
        if let Active::Driving(drive) = &mut self.active {
            drive.entry_created = false;
        }
        self.history.restored(state);
    }

    /// Activate `section` with no follow-up anchor.
    pub fn navigate_to_section(
        &mut self,
        section: Section,
        push: bool,
        now: Duration,
        observed: &Location,
    ) -> Dispatch {
        self.drive_section(SectionRequest::new(section, push), now, observed)
    }

    /// Activate a section, writing its hash token if the engine is not
    /// already showing it.
    pub fn drive_section(
        &mut self,
        request: SectionRequest,
        now: Duration,
        observed: &Location,
    ) -> Dispatch {
        let section = self.codec.canonical(request.section);
        let follow = request
            .follow
            .map(|(anchor, prefs)| FollowUp { anchor, prefs });
        let mut dispatch = Dispatch::default();

        if let Active::Driving(drive) = &mut self.active {
            if drive.section == section {
                if follow.is_some() {
                    drive.follow = follow;
                }
                drive.restore_top |= request.restore_top;
                trace!(op = drive.op.get(), %section, "section already in flight");
                dispatch.record(
                    DrivePhase::Section,
                    Some(drive.op),
                    None,
                    DriveOutcome::Ignored(DriveIgnoredReason::AlreadyActive),
                );
                return dispatch;
            }
        }

        let superseded = self.supersede(&mut dispatch);
        let inherited_entry = superseded.as_ref().is_some_and(|prev| prev.entry_created);
        let superseded_op = superseded.as_ref().map(|prev| prev.op);
        let push = request.push && !inherited_entry;
        if push {
            self.close_abandoned_entry(superseded, &mut dispatch);
        }
        let op = self.next_operation();

        if self.engine_section.as_ref() == Some(&section) {
            if let Some(follow) = follow {
                self.begin_anchor_scroll(
                    op,
                    section,
                    follow,
                    push,
                    now,
                    observed,
                    &mut dispatch,
                );
                dispatch.record(
                    DrivePhase::Section,
                    Some(op),
                    superseded_op,
                    DriveOutcome::Scrolling,
                );
                return dispatch;
            }
            let state = NavigationState::section(section);
            let command = self
                .history
                .commit_if_changed(state.clone(), true, push, observed);
            let outcome = if command.is_some() || inherited_entry {
                DriveOutcome::CommittedImmediately
            } else {
                DriveOutcome::Ignored(DriveIgnoredReason::AlreadyActive)
            };
            if let Some(command) = command {
                dispatch.commands.push(HostCommand::History(command));
            }
            if request.restore_top {
                dispatch.commands.push(HostCommand::ScrollToTop);
            }
            debug!(op = op.get(), section = %state.section, ?outcome, "engine already on section");
            self.set_current(state, true);
            dispatch.record(DrivePhase::Section, Some(op), superseded_op, outcome);
            return dispatch;
        }

        let token = self.codec.to_hash(&section);
        let already_written = observed.fragment() == token;
        let mode = if push && !already_written {
            HashWriteMode::Assign
        } else {
            HashWriteMode::Replace
        };
        if !already_written {
            dispatch.commands.push(HostCommand::WriteHash {
                token: token.clone(),
                mode,
            });
            self.remember_echo(&token);
        }
        self.history.state_cleared();
        let watch = self.detector.arm_section(op, self.settle, &token, now);
        dispatch.commands.push(HostCommand::ArmDetector { op, watch });

        debug!(
            op = op.get(),
            superseded = superseded_op.map(DriveOperation::get),
            %section,
            %token,
            ?mode,
            "drive started"
        );
        self.engine_section = Some(section.clone());
        self.active = Active::Driving(SectionDrive {
            op,
            token,
            section,
            follow,
            restore_top: request.restore_top,
            entry_created: inherited_entry || mode == HashWriteMode::Assign,
        });
        dispatch.record(DrivePhase::Section, Some(op), superseded_op, DriveOutcome::Started);
        dispatch
    }

    /// Adopt a section the engine is already switching to on its own
    /// (a foreign hash change). No hash is written; the clean URL replaces
    /// the current entry once the engine settles.
    pub fn adopt_section(&mut self, section: Section, now: Duration) -> Dispatch {
        let section = self.codec.canonical(section);
        if let Active::Driving(drive) = &self.active {
            if drive.section == section {
                let mut dispatch = Dispatch::default();
                dispatch.record(
                    DrivePhase::Adopt,
                    Some(drive.op),
                    None,
                    DriveOutcome::Ignored(DriveIgnoredReason::AlreadyActive),
                );
                return dispatch;
            }
        }

        let mut dispatch = Dispatch::default();
        let superseded_op = self.supersede(&mut dispatch).map(|prev| prev.op);
        let op = self.next_operation();
        let token = self.codec.to_hash(&section);
        self.history.state_cleared();
        let watch = self.detector.arm_section(op, self.settle, &token, now);
        dispatch.commands.push(HostCommand::ArmDetector { op, watch });

        debug!(op = op.get(), %section, "adopted foreign section hash");
        self.engine_section = Some(section.clone());
        self.active = Active::Driving(SectionDrive {
            op,
            token,
            section,
            follow: None,
            restore_top: false,
            entry_created: false,
        });
        dispatch.record(DrivePhase::Adopt, Some(op), superseded_op, DriveOutcome::Started);
        dispatch
    }

    /// Scroll to `anchor` inside the section the engine shows. The hash is
    /// never touched; the history entry is written immediately.
    pub fn navigate_to_anchor(
        &mut self,
        anchor: ScrollAnchor,
        prefs: ScrollPrefs,
        push: bool,
        now: Duration,
        observed: &Location,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let superseded = self.supersede(&mut dispatch);
        let inherited_entry = superseded.as_ref().is_some_and(|prev| prev.entry_created);
        let superseded_op = superseded.as_ref().map(|prev| prev.op);
        let push = push && !inherited_entry;
        if push {
            self.close_abandoned_entry(superseded, &mut dispatch);
        }
        let op = self.next_operation();
        let section = self
            .engine_section
            .clone()
            .unwrap_or_else(|| self.current.section.clone());
        self.begin_anchor_scroll(
            op,
            section,
            FollowUp { anchor, prefs },
            push,
            now,
            observed,
            &mut dispatch,
        );
        dispatch.record(
            DrivePhase::Anchor,
            Some(op),
            superseded_op,
            DriveOutcome::Scrolling,
        );
        dispatch
    }

    /// Advance time; commits whatever the detector resolves.
    pub fn poll(&mut self, now: Duration, observed: &Location) -> Dispatch {
        match self.detector.poll(now) {
            Some(completion) => self.complete(completion, DrivePhase::Poll, now, observed),
            None => Dispatch::default(),
        }
    }

    /// Host saw `element_id` become the active section while watching `op`.
    pub fn section_activated(
        &mut self,
        op: DriveOperation,
        element_id: &str,
        now: Duration,
        observed: &Location,
    ) -> Dispatch {
        if let Some(completion) = self.detector.section_activated(op, element_id) {
            return self.complete(completion, DrivePhase::Activation, now, observed);
        }
        let reason = if self.detector.pending_op() == Some(op) {
            DriveIgnoredReason::UnexpectedElement
        } else {
            DriveIgnoredReason::StaleOperation
        };
        trace!(op = op.get(), element_id, ?reason, "activation ignored");
        Dispatch::ignored(DrivePhase::Activation, reason)
    }

    /// Host saw a scroll event while watching `op`.
    pub fn scroll_observed(&mut self, op: DriveOperation, now: Duration) -> bool {
        self.detector.scroll_observed(op, now)
    }

    fn next_operation(&mut self) -> DriveOperation {
        let op = DriveOperation(self.next_op);
        self.next_op += 1;
        op
    }

    fn remember_echo(&mut self, token: &str) {
        if let Some(existing) = self.echoes.iter_mut().find(|echo| echo.token == token) {
            existing.expires_at = None;
            return;
        }
        if self.echoes.len() >= MAX_ECHO_TOKENS {
            self.echoes.remove(0);
        }
        self.echoes.push(EchoToken {
            token: token.to_owned(),
            expires_at: None,
        });
    }

    fn set_current(&mut self, state: NavigationState, show_fragment: bool) {
        self.current = state;
        self.current_shows_fragment = show_fragment;
    }

    fn expire_echoes(&mut self, now: Duration) {
        let expires_at = now.saturating_add(ECHO_GRACE);
        for echo in &mut self.echoes {
            echo.expires_at.get_or_insert(expires_at);
        }
    }

    /// Cancel whatever is in flight.
    fn supersede(&mut self, dispatch: &mut Dispatch) -> Option<Superseded> {
        let superseded = match mem::replace(&mut self.active, Active::Idle) {
            Active::Idle => return None,
            Active::Driving(drive) => Superseded {
                op: drive.op,
                entry_created: drive.entry_created,
                section: Some(drive.section),
            },
            Active::SettlingScroll(scroll) => Superseded {
                op: scroll.op,
                entry_created: false,
                section: None,
            },
        };
        self.detector.disarm();
        dispatch
            .commands
            .push(HostCommand::DisarmDetector { op: superseded.op });
        debug!(op = superseded.op.get(), "operation superseded");
        Some(superseded)
    }

    /// A new entry is about to be created on top of an entry whose drive was
    /// abandoned before it committed. Give that entry its clean URL so it
    /// does not keep the engine token.
    fn close_abandoned_entry(&mut self, superseded: Option<Superseded>, dispatch: &mut Dispatch) {
        let Some(Superseded {
            op,
            entry_created: false,
            section: Some(section),
        }) = superseded
        else {
            return;
        };
        let command = self
            .history
            .commit(NavigationState::section(section), true, false);
        debug!(op = op.get(), url = %command.url, "closed abandoned entry");
        dispatch.commands.push(HostCommand::History(command));
    }

    #[allow(clippy::too_many_arguments)]
    fn begin_anchor_scroll(
        &mut self,
        op: DriveOperation,
        section: Section,
        follow: FollowUp,
        push: bool,
        now: Duration,
        observed: &Location,
        dispatch: &mut Dispatch,
    ) {
        let show_fragment = follow.prefs.shows_fragment();
        let state = NavigationState::anchored(section, follow.anchor.clone());
        if let Some(command) =
            self.history
                .commit_if_changed(state.clone(), show_fragment, push, observed)
        {
            dispatch.commands.push(HostCommand::History(command));
        }
        dispatch.commands.push(HostCommand::ScrollToAnchor {
            op,
            anchor: follow.anchor.clone(),
            prefs: follow.prefs,
        });
        let watch = self
            .detector
            .arm_scroll(op, self.scroll_quiet, self.scroll_max_wait, now);
        dispatch.commands.push(HostCommand::ArmDetector { op, watch });
        debug!(
            op = op.get(),
            section = %state.section,
            anchor = ?state.scroll_anchor,
            "anchor scroll started"
        );
        self.set_current(state.clone(), show_fragment);
        self.active = Active::SettlingScroll(AnchorScroll {
            op,
            anchor: follow.anchor,
            state,
            show_fragment,
        });
    }

    fn complete(
        &mut self,
        completion: Completion,
        phase: DrivePhase,
        now: Duration,
        observed: &Location,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();
        if self.active_op() != Some(completion.op) {
            dispatch.record(
                phase,
                Some(completion.op),
                None,
                DriveOutcome::Ignored(DriveIgnoredReason::StaleOperation),
            );
            return dispatch;
        }
        if completion.cause.is_fallback() {
            warn!(
                op = completion.op.get(),
                cause = ?completion.cause,
                "engine did not confirm in time; committing anyway"
            );
        }
        dispatch
            .commands
            .push(HostCommand::DisarmDetector { op: completion.op });

        match mem::replace(&mut self.active, Active::Idle) {
            Active::Driving(drive) => {
                self.expire_echoes(now);
                match drive.follow {
                    Some(follow) => {
                        self.begin_anchor_scroll(
                            drive.op,
                            drive.section,
                            follow,
                            false,
                            now,
                            observed,
                            &mut dispatch,
                        );
                    }
                    None => {
                        let state = NavigationState::section(drive.section);
                        let command = self.history.commit(state.clone(), true, false);
                        dispatch.commands.push(HostCommand::History(command));
                        if drive.restore_top {
                            dispatch.commands.push(HostCommand::ScrollToTop);
                        }
                        self.set_current(state, true);
                    }
                }
                debug!(
                    op = drive.op.get(),
                    section = %self.current.section,
                    cause = ?completion.cause,
                    "drive committed"
                );
                dispatch.record(
                    phase,
                    Some(drive.op),
                    None,
                    DriveOutcome::Committed(completion.cause),
                );
            }
            Active::SettlingScroll(scroll) => {
                self.expire_echoes(now);
                let outcome = match self
                    .history
                    .reassert(&scroll.state, scroll.show_fragment, observed)
                {
                    Some(command) => {
                        dispatch.commands.push(HostCommand::History(command));
                        DriveOutcome::Reasserted(completion.cause)
                    }
                    None => DriveOutcome::Settled(completion.cause),
                };
                debug!(op = scroll.op.get(), ?outcome, "anchor scroll settled");
                dispatch.record(phase, Some(scroll.op), None, outcome);
            }
            Active::Idle => {}
        }
        dispatch
    }
}
