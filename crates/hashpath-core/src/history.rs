#![forbid(unsafe_code)]

//! Clean, deduplicated history writes.
//!
//! The writer produces [`HistoryCommand`]s; the host executes them with
//! `pushState`/`replaceState`. It also mirrors what it believes is on top of
//! the browser's history stack so it can refuse duplicate pushes.

use crate::section::NavigationState;

/// Visible location as observed by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// `location.pathname`, e.g. `/about`.
    pub pathname: String,
    /// `location.hash`, including `#`, or empty.
    pub hash: String,
}

impl Location {
    #[must_use]
    pub fn new(pathname: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            hash: hash.into(),
        }
    }

    /// Fragment without the leading `#`.
    #[must_use]
    pub fn fragment(&self) -> &str {
        self.hash.strip_prefix('#').unwrap_or(&self.hash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Push,
    Replace,
}

/// One `pushState`/`replaceState` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCommand {
    pub mode: HistoryMode,
    /// Absolute URL: origin + `/` + section (+ `#anchor`).
    pub url: String,
    pub state: NavigationState,
}

/// Sole producer of history entries and replacements.
#[derive(Debug, Clone)]
pub struct HistoryWriter {
    origin: String,
    top: Option<NavigationState>,
}

impl HistoryWriter {
    /// `origin` is `location.origin` without a trailing slash.
    #[must_use]
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_owned(),
            top: None,
        }
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// State recorded on the current entry, if it is one of ours.
    #[must_use]
    pub fn top(&self) -> Option<&NavigationState> {
        self.top.as_ref()
    }

    /// Visible fragment for `state` (`#anchor` or empty).
    #[must_use]
    pub fn fragment_for(state: &NavigationState, show_fragment: bool) -> String {
        match &state.scroll_anchor {
            Some(anchor) if show_fragment => anchor.fragment(),
            _ => String::new(),
        }
    }

    /// Canonical absolute URL for `state`.
    #[must_use]
    pub fn url_for(&self, state: &NavigationState, show_fragment: bool) -> String {
        format!(
            "{}{}{}",
            self.origin,
            state.section.pathname(),
            Self::fragment_for(state, show_fragment)
        )
    }

    /// Whether the observed location already shows `state` canonically.
    #[must_use]
    pub fn is_canonical(state: &NavigationState, show_fragment: bool, observed: &Location) -> bool {
        observed.pathname == state.section.pathname()
            && observed.hash == Self::fragment_for(state, show_fragment)
    }

    /// Write `state`. A push that would duplicate the recorded top entry is
    /// downgraded to a replace.
    pub fn commit(
        &mut self,
        state: NavigationState,
        show_fragment: bool,
        push: bool,
    ) -> HistoryCommand {
        let mode = if push && self.top.as_ref() != Some(&state) {
            HistoryMode::Push
        } else {
            HistoryMode::Replace
        };
        let url = self.url_for(&state, show_fragment);
        self.top = Some(state.clone());
        HistoryCommand { mode, url, state }
    }

    /// Like [`commit`](Self::commit), but returns nothing when the entry
    /// would not change: same recorded state and a canonical location.
    pub fn commit_if_changed(
        &mut self,
        state: NavigationState,
        show_fragment: bool,
        push: bool,
        observed: &Location,
    ) -> Option<HistoryCommand> {
        let unchanged = self.top.as_ref() == Some(&state)
            && Self::is_canonical(&state, show_fragment, observed);
        (!unchanged).then(|| self.commit(state, show_fragment, push))
    }

    /// Re-assert the canonical URL after the engine may have rewritten it.
    /// Returns a replace only when the observed location differs.
    pub fn reassert(
        &mut self,
        state: &NavigationState,
        show_fragment: bool,
        observed: &Location,
    ) -> Option<HistoryCommand> {
        if Self::is_canonical(state, show_fragment, observed) && self.top.as_ref() == Some(state) {
            return None;
        }
        Some(self.commit(state.clone(), show_fragment, false))
    }

    /// A hash write created or replaced the current entry; its state slot
    /// no longer holds one of our records.
    pub fn state_cleared(&mut self) {
        self.top = None;
    }

    /// The browser moved to another entry (back/forward).
    pub fn restored(&mut self, state: Option<NavigationState>) {
        self.top = state;
    }
}
