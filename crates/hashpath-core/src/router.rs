#![forbid(unsafe_code)]

//! Event router: turns browser events into controller calls.
//!
//! The host forwards `click` (capture phase), `hashchange`, `popstate` and
//! the initial load; the router classifies each target once and picks the
//! controller entry point. Anchors are handled in controlling mode: the
//! router intercepts the click and the controller scrolls, so the engine
//! never sees an anchor token.

use core::time::Duration;

use tracing::{debug, trace};

use crate::classify::{AnchorLookup, ScrollPrefs, Target, classify};
use crate::codec::PathHashCodec;
use crate::config::{ConfigError, RouterConfig};
use crate::controller::{
    Dispatch, DriveController, DriveIgnoredReason, DriveOperation, DrivePhase, DriveState,
    SectionRequest,
};
use crate::history::Location;
use crate::section::{NavigationState, ScrollAnchor, Section};

/// The parts of a click the router cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickInput {
    /// Raw `href` attribute of the closest link, if any.
    pub href: Option<String>,
    /// `event.button == 0`.
    pub primary_button: bool,
    /// Any of ctrl/meta/shift/alt held.
    pub modified: bool,
    pub default_prevented: bool,
}

impl ClickInput {
    /// Plain primary-button click on a link.
    #[must_use]
    pub fn primary(href: &str) -> Self {
        Self {
            href: Some(href.to_owned()),
            primary_button: true,
            modified: false,
            default_prevented: false,
        }
    }
}

/// What the host must do with the click event itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDisposition {
    /// Leave the event alone.
    PassThrough,
    /// `preventDefault()`; also `stopImmediatePropagation()` when asked so
    /// the engine's own listener never runs.
    Intercept { stop_propagation: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClickOutcome {
    pub disposition: ClickDisposition,
    pub dispatch: Dispatch,
}

impl ClickOutcome {
    fn pass_through(reason: DriveIgnoredReason) -> Self {
        Self {
            disposition: ClickDisposition::PassThrough,
            dispatch: Dispatch::ignored(DrivePhase::Click, reason),
        }
    }
}

/// Front door for all browser events.
#[derive(Debug, Clone)]
pub struct EventRouter {
    config: RouterConfig,
    controller: DriveController,
}

impl EventRouter {
    /// Build a router. `root_id` is the engine's first section id discovered
    /// from markup; `None` uses the configured fallback.
    pub fn new(
        config: RouterConfig,
        root_id: Option<&str>,
        origin: &str,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let root_id = root_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(config.root_fallback.as_str());
        let codec = PathHashCodec::new(Some(root_id), &config.join);
        let controller = DriveController::new(codec, origin, &config);
        Ok(Self { config, controller })
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &PathHashCodec {
        self.controller.codec()
    }

    #[must_use]
    pub fn controller(&self) -> &DriveController {
        &self.controller
    }

    #[must_use]
    pub fn state(&self) -> DriveState {
        self.controller.state()
    }

    #[must_use]
    pub fn current(&self) -> &NavigationState {
        self.controller.current()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.controller.next_deadline()
    }

    /// Classify a fragment against the page's anchors.
    pub fn classify(&self, fragment: &str, lookup: &dyn AnchorLookup) -> Target {
        classify(fragment, self.controller.codec(), lookup)
    }

    /// Resync from the starting URL.
    ///
    /// - `/a/b`: drive `a--b`, commit `/a/b`.
    /// - `/about#contact`: drive `about`, then scroll to the anchor.
    /// - `/#a--b` (engine-style link): adopt the section, commit `/a/b`.
    pub fn load(
        &mut self,
        location: &Location,
        lookup: &dyn AnchorLookup,
        now: Duration,
    ) -> Dispatch {
        let path_section = self.codec().section_from_path(&location.pathname);
        let fragment = location.fragment().to_owned();

        if fragment.is_empty() {
            // The engine shows its first section when there is no hash.
            self.controller.assume_engine_section(Some(Section::root()));
            let request = SectionRequest::new(path_section, false);
            return self.controller.drive_section(request, now, location);
        }

        match self.classify(&fragment, lookup) {
            Target::Anchor { anchor, prefs } => {
                self.controller.assume_engine_section(None);
                let request = SectionRequest::new(path_section, false).with_anchor(anchor, prefs);
                self.controller.drive_section(request, now, location)
            }
            Target::Section(section) => self.controller.adopt_section(section, now),
        }
    }

    /// Capture-phase click on the document.
    pub fn click(
        &mut self,
        input: &ClickInput,
        location: &Location,
        lookup: &dyn AnchorLookup,
        now: Duration,
    ) -> ClickOutcome {
        let Some(href) = input.href.as_deref().filter(|href| href.starts_with('#')) else {
            return ClickOutcome::pass_through(DriveIgnoredReason::NotFragmentLink);
        };
        if input.default_prevented || input.modified || !input.primary_button {
            trace!(href, "click left to the browser");
            return ClickOutcome::pass_through(DriveIgnoredReason::ModifiedClick);
        }

        match self.classify(href, lookup) {
            Target::Section(section) => ClickOutcome {
                disposition: ClickDisposition::Intercept {
                    stop_propagation: false,
                },
                dispatch: self
                    .controller
                    .navigate_to_section(section, true, now, location),
            },
            Target::Anchor { anchor, prefs } => ClickOutcome {
                disposition: ClickDisposition::Intercept {
                    stop_propagation: true,
                },
                dispatch: self
                    .controller
                    .navigate_to_anchor(anchor, prefs, true, now, location),
            },
        }
    }

    /// `hashchange` with the fragment of the event's `newURL`.
    pub fn hash_change(
        &mut self,
        new_fragment: &str,
        location: &Location,
        lookup: &dyn AnchorLookup,
        now: Duration,
    ) -> Dispatch {
        let fragment = new_fragment.strip_prefix('#').unwrap_or(new_fragment);
        if self.controller.is_echo(fragment, now) {
            trace!(fragment, "hashchange echo");
            return Dispatch::ignored(DrivePhase::HashChange, DriveIgnoredReason::Echo);
        }
        if self.controller.shows_current(location) {
            return Dispatch::ignored(DrivePhase::HashChange, DriveIgnoredReason::AlreadyCanonical);
        }
        self.controller.forget_echoes();
        self.controller.note_traversal(None);

        if fragment.is_empty() {
            return self
                .controller
                .navigate_to_section(Section::root(), false, now, location);
        }
        match self.classify(fragment, lookup) {
            Target::Anchor { anchor, prefs } => self
                .controller
                .navigate_to_anchor(anchor, prefs, false, now, location),
            Target::Section(section) => self.controller.adopt_section(section, now),
        }
    }

    /// `popstate` with the entry's parsed state (if it is one of ours).
    pub fn pop_state(
        &mut self,
        state: Option<NavigationState>,
        location: &Location,
        lookup: &dyn AnchorLookup,
        now: Duration,
    ) -> Dispatch {
        let Some(state) = state else {
            return self.pop_stateless(location, lookup, now);
        };
        self.controller.note_traversal(Some(state.clone()));
        let restore_top = self.config.scroll_top_on_section;
        let mut request = SectionRequest::new(state.section, false).restoring_top(restore_top);
        if let Some(anchor) = state.scroll_anchor {
            // A vanished anchor falls back to the section top.
            match anchor_prefs(&anchor, lookup) {
                Some(prefs) => request = request.with_anchor(anchor, prefs),
                None => debug!(%anchor, "restored anchor missing from page"),
            }
        }
        self.controller.drive_section(request, now, location)
    }

    /// `popstate` for an entry we never wrote, or a fragment navigation.
    fn pop_stateless(
        &mut self,
        location: &Location,
        lookup: &dyn AnchorLookup,
        now: Duration,
    ) -> Dispatch {
        let fragment = location.fragment().to_owned();
        if self.controller.is_echo(&fragment, now) {
            trace!(fragment, "popstate echo");
            return Dispatch::ignored(DrivePhase::PopState, DriveIgnoredReason::Echo);
        }
        if !fragment.is_empty() && self.controller.shows_current(location) {
            return Dispatch::ignored(DrivePhase::PopState, DriveIgnoredReason::AlreadyCanonical);
        }
        self.controller.note_traversal(None);
        let path_section = self.codec().section_from_path(&location.pathname);
        let restore_top = self.config.scroll_top_on_section;

        if fragment.is_empty() {
            let request = SectionRequest::new(path_section, false).restoring_top(restore_top);
            return self.controller.drive_section(request, now, location);
        }
        self.controller.forget_echoes();
        match self.classify(&fragment, lookup) {
            Target::Anchor { anchor, prefs } => {
                let request = SectionRequest::new(path_section, false).with_anchor(anchor, prefs);
                self.controller.drive_section(request, now, location)
            }
            Target::Section(section) => self.controller.adopt_section(section, now),
        }
    }

    /// Timer fired; commit whatever has settled.
    pub fn poll(&mut self, now: Duration, location: &Location) -> Dispatch {
        self.controller.poll(now, location)
    }

    /// Host's mutation observer saw `element_id` become active.
    pub fn section_activated(
        &mut self,
        op: DriveOperation,
        element_id: &str,
        now: Duration,
        location: &Location,
    ) -> Dispatch {
        self.controller.section_activated(op, element_id, now, location)
    }

    /// Host saw a scroll event.
    pub fn scroll_observed(&mut self, op: DriveOperation, now: Duration) -> bool {
        self.controller.scroll_observed(op, now)
    }
}

fn anchor_prefs(anchor: &ScrollAnchor, lookup: &dyn AnchorLookup) -> Option<ScrollPrefs> {
    lookup
        .find_anchor(anchor.as_str())
        .map(|markup| ScrollPrefs::from_markup(&markup))
}
