#![forbid(unsafe_code)]

//! Browser-independent half of the host.
//!
//! Everything here runs natively under `cargo test`: event translation,
//! operation tracking for observer callbacks, timer bookkeeping, scroll
//! animation sampling and selector building. `wasm.rs` only adds the DOM
//! calls.

use core::time::Duration;

use hashpath_core::scroll::ScrollPlan;
use hashpath_core::{
    AnchorBox, AnchorLookup, ClickDisposition, ClickInput, ConfigError, DriveOperation,
    EventRouter, HostCommand, Location, NavigationState, RouterConfig, ScrollGeometry, ScrollPrefs,
    Watch,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Host-side failures. Never fatal: the host logs them and keeps routing.
#[derive(Debug, Error)]
pub enum HostError {
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    #[error("browser global `{0}` is unavailable")]
    MissingGlobal(&'static str),
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    #[error("{op} failed: {message}")]
    Js { op: &'static str, message: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Browser event, already reduced to plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Load,
    Click(ClickInput),
    HashChange { new_url: String },
    /// `JSON.stringify(event.state)`, or `None` for `null`.
    PopState { state_json: Option<String> },
    Timer,
    Scroll,
    SectionActivated { element_id: String },
}

/// What the DOM layer has to do with the single pending timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerChange {
    Keep,
    Clear,
    Set { delay_ms: i32 },
}

/// Result of one handled event.
#[derive(Debug, Clone, PartialEq)]
pub struct Handled {
    pub commands: Vec<HostCommand>,
    pub disposition: ClickDisposition,
}

impl Handled {
    fn commands(commands: Vec<HostCommand>) -> Self {
        Self {
            commands,
            disposition: ClickDisposition::PassThrough,
        }
    }
}

/// Fragment of a full URL, without `#`.
#[must_use]
pub fn fragment_of_url(url: &str) -> &str {
    url.split_once('#').map_or("", |(_, fragment)| fragment)
}

/// Whether an `href` attribute addresses a fragment of the current page.
#[must_use]
pub fn is_fragment_href(href: &str) -> bool {
    href.trim_start().starts_with('#')
}

/// CSS attribute selector `[attr="value"]` with the value escaped.
#[must_use]
pub fn attr_selector(attr: &str, value: &str) -> String {
    let mut out = String::with_capacity(attr.len() + value.len() + 6);
    out.push('[');
    out.push_str(attr);
    out.push_str("=\"");
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push_str("\"]");
    out
}

/// Presence selector `[attr]`.
#[must_use]
pub fn presence_selector(attr: &str) -> String {
    format!("[{attr}]")
}

/// `setTimeout` delay for `deadline`, clamped to `0..=i32::MAX` ms and
/// rounded up so the timer never fires early.
#[must_use]
pub fn timer_delay_ms(deadline: Duration, now: Duration) -> i32 {
    let remaining = deadline.saturating_sub(now);
    let millis = remaining.as_micros().div_ceil(1000);
    i32::try_from(millis).unwrap_or(i32::MAX)
}

/// Previous and next entries around `index`.
#[must_use]
pub fn neighbors<T: Copy>(items: &[T], index: usize) -> (Option<T>, Option<T>) {
    let prev = index.checked_sub(1).and_then(|idx| items.get(idx)).copied();
    let next = items.get(index + 1).copied();
    (prev, next)
}

/// Whether an observed section element counts as shown by the engine.
#[must_use]
pub fn looks_active(has_active_class: bool, hidden: bool, rendered_height: f64) -> bool {
    has_active_class || (!hidden && rendered_height > 0.0)
}

/// One running eased scroll, sampled per animation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollRun {
    pub op: DriveOperation,
    plan: ScrollPlan,
    started_at: Duration,
}

impl ScrollRun {
    #[must_use]
    pub fn new(op: DriveOperation, plan: ScrollPlan, now: Duration) -> Self {
        Self {
            op,
            plan,
            started_at: now,
        }
    }

    /// Scroll offset for this frame and whether the run is over.
    #[must_use]
    pub fn sample(&self, now: Duration) -> (f64, bool) {
        let elapsed = now.saturating_sub(self.started_at);
        (self.plan.position_at(elapsed), self.plan.is_finished(elapsed))
    }
}

/// Geometry of all anchors in document order, plus the target's index.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorLayout {
    pub boxes: Vec<AnchorBox>,
    pub index: usize,
}

impl AnchorLayout {
    #[must_use]
    pub fn geometry(&self, scroll_y: f64, viewport_height: f64) -> Option<ScrollGeometry> {
        let anchor = *self.boxes.get(self.index)?;
        let (prev, next) = neighbors(&self.boxes, self.index);
        Some(ScrollGeometry {
            scroll_y,
            viewport_height,
            anchor,
            prev,
            next,
        })
    }
}

/// Router plus the host-side bookkeeping observers and timers need.
#[derive(Debug)]
pub struct HostCore {
    router: EventRouter,
    watching: Option<(DriveOperation, Watch)>,
    scheduled: Option<Duration>,
    scroll: Option<ScrollRun>,
}

impl HostCore {
    /// Parse the page's JSON config (empty means defaults) and build the
    /// router.
    pub fn new(config_json: &str, root_id: Option<&str>, origin: &str) -> Result<Self, HostError> {
        let config = if config_json.trim().is_empty() {
            RouterConfig::default()
        } else {
            RouterConfig::from_json(config_json)?
        };
        let router = EventRouter::new(config, root_id, origin)?;
        Ok(Self {
            router,
            watching: None,
            scheduled: None,
            scroll: None,
        })
    }

    #[must_use]
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Anchor marker attribute configured for this page.
    #[must_use]
    pub fn anchor_attr(&self) -> &str {
        &self.router.config().anchor_attr
    }

    /// What the DOM layer should currently observe.
    #[must_use]
    pub fn watching(&self) -> Option<&Watch> {
        self.watching.as_ref().map(|(_, watch)| watch)
    }

    /// Route one event.
    pub fn handle(
        &mut self,
        event: HostEvent,
        location: &Location,
        lookup: &dyn AnchorLookup,
        now: Duration,
    ) -> Handled {
        trace!(?event, "host event");
        let handled = match event {
            HostEvent::Load => Handled::commands(self.router.load(location, lookup, now).commands),
            HostEvent::Click(input) => {
                let outcome = self.router.click(&input, location, lookup, now);
                Handled {
                    commands: outcome.dispatch.commands,
                    disposition: outcome.disposition,
                }
            }
            HostEvent::HashChange { new_url } => Handled::commands(
                self.router
                    .hash_change(fragment_of_url(&new_url), location, lookup, now)
                    .commands,
            ),
            HostEvent::PopState { state_json } => {
                let state = state_json.as_deref().and_then(NavigationState::from_json);
                Handled::commands(self.router.pop_state(state, location, lookup, now).commands)
            }
            HostEvent::Timer => {
                self.scheduled = None;
                Handled::commands(self.router.poll(now, location).commands)
            }
            HostEvent::Scroll => {
                if let Some((op, Watch::Scroll)) = &self.watching {
                    self.router.scroll_observed(*op, now);
                }
                Handled::commands(Vec::new())
            }
            HostEvent::SectionActivated { element_id } => match &self.watching {
                Some((op, Watch::SectionActivation { .. })) => {
                    let op = *op;
                    Handled::commands(
                        self.router
                            .section_activated(op, &element_id, now, location)
                            .commands,
                    )
                }
                _ => Handled::commands(Vec::new()),
            },
        };
        self.track(&handled.commands);
        handled
    }

    fn track(&mut self, commands: &[HostCommand]) {
        for command in commands {
            match command {
                HostCommand::ArmDetector { op, watch } => {
                    self.watching = Some((*op, watch.clone()));
                }
                HostCommand::DisarmDetector { op } => {
                    if self.watching.as_ref().is_some_and(|(watched, _)| watched == op) {
                        self.watching = None;
                    }
                    if self.scroll.is_some_and(|run| run.op == *op) {
                        self.scroll = None;
                    }
                }
                _ => {}
            }
        }
    }

    /// Reconcile the pending timeout with the router's next deadline.
    pub fn reschedule(&mut self, now: Duration) -> TimerChange {
        let deadline = self.router.next_deadline();
        if deadline == self.scheduled {
            return TimerChange::Keep;
        }
        self.scheduled = deadline;
        match deadline {
            Some(deadline) => {
                let delay_ms = timer_delay_ms(deadline, now);
                debug!(delay_ms, "timer scheduled");
                TimerChange::Set { delay_ms }
            }
            None => TimerChange::Clear,
        }
    }

    /// Start an eased scroll for `op`. Returns `false` when there is nothing
    /// to animate.
    pub fn begin_scroll(
        &mut self,
        op: DriveOperation,
        geometry: &ScrollGeometry,
        prefs: &ScrollPrefs,
        now: Duration,
    ) -> bool {
        self.scroll = ScrollPlan::new(geometry, prefs).map(|plan| ScrollRun::new(op, plan, now));
        self.scroll.is_some()
    }

    /// Sample the running scroll for this animation frame. `None` once no
    /// scroll is running.
    pub fn scroll_frame(&mut self, now: Duration) -> Option<f64> {
        let run = self.scroll?;
        let (y, finished) = run.sample(now);
        if finished {
            self.scroll = None;
        }
        Some(y)
    }

    #[must_use]
    pub fn is_scrolling(&self) -> bool {
        self.scroll.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AnchorLayout, HostCore, HostError, HostEvent, TimerChange, attr_selector,
        fragment_of_url, is_fragment_href, looks_active, neighbors, presence_selector,
        timer_delay_ms,
    };
    use core::time::Duration;
    use hashpath_core::{
        AnchorBox, AnchorMarkup, ClickDisposition, ClickInput, HashWriteMode, HostCommand,
        Location, RouterConfig, Watch,
    };
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const ORIGIN: &str = "https://example.com";

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn page() -> HashMap<String, AnchorMarkup> {
        let mut page = HashMap::new();
        page.insert(String::from("faq"), AnchorMarkup::default());
        page
    }

    #[test]
    fn url_helpers() {
        assert_eq!(fragment_of_url("https://example.com/a#b--c"), "b--c");
        assert_eq!(fragment_of_url("https://example.com/a"), "");
        assert_eq!(fragment_of_url("https://example.com/#"), "");
        assert!(is_fragment_href("#about"));
        assert!(!is_fragment_href("/about#x"));
    }

    #[test]
    fn selectors_escape_values() {
        assert_eq!(attr_selector("data-scroll-id", "faq"), r#"[data-scroll-id="faq"]"#);
        assert_eq!(
            attr_selector("data-scroll-id", r#"a"b\c"#),
            r#"[data-scroll-id="a\"b\\c"]"#
        );
        assert_eq!(presence_selector("data-scroll-id"), "[data-scroll-id]");
    }

    #[test]
    fn timer_delays_round_up_and_clamp() {
        assert_eq!(timer_delay_ms(ms(450), ms(0)), 450);
        assert_eq!(timer_delay_ms(Duration::from_micros(1500), Duration::ZERO), 2);
        assert_eq!(timer_delay_ms(ms(10), ms(50)), 0);
        assert_eq!(timer_delay_ms(Duration::from_secs(u64::MAX / 2), ms(0)), i32::MAX);
    }

    #[test]
    fn neighbor_lookup() {
        let items = [1, 2, 3];
        assert_eq!(neighbors(&items, 0), (None, Some(2)));
        assert_eq!(neighbors(&items, 1), (Some(1), Some(3)));
        assert_eq!(neighbors(&items, 2), (Some(2), None));
    }

    #[test]
    fn activity_heuristic() {
        assert!(looks_active(true, true, 0.0));
        assert!(looks_active(false, false, 12.0));
        assert!(!looks_active(false, true, 12.0));
        assert!(!looks_active(false, false, 0.0));
    }

    #[test]
    fn bad_config_is_a_host_error() {
        let err = HostCore::new(r#"{"join":"/"}"#, None, ORIGIN).expect_err("bad join");
        assert!(matches!(err, HostError::Config(_)));
        assert!(HostCore::new("", None, ORIGIN).is_ok());
    }

    #[test]
    fn timer_follows_router_deadline() {
        let mut core = HostCore::new("{}", Some("home"), ORIGIN).expect("config");
        let handled = core.handle(HostEvent::Load, &Location::new("/about", ""), &page(), ms(0));
        assert!(handled.commands.contains(&HostCommand::WriteHash {
            token: String::from("about"),
            mode: HashWriteMode::Replace,
        }));
        assert_eq!(core.reschedule(ms(0)), TimerChange::Set { delay_ms: 450 });
        assert_eq!(core.reschedule(ms(100)), TimerChange::Keep);

        let handled = core.handle(
            HostEvent::Timer,
            &Location::new("/about", "#about"),
            &page(),
            ms(450),
        );
        assert!(
            handled
                .commands
                .iter()
                .any(|command| matches!(command, HostCommand::History(_)))
        );
        // The fired timeout is gone already; nothing left to clear.
        assert_eq!(core.reschedule(ms(450)), TimerChange::Keep);
        assert_eq!(core.watching(), None);
    }

    #[test]
    fn activation_clears_the_pending_timeout() {
        let config = r#"{"settle":{"strategy":"mutation","timeout_ms":800}}"#;
        let mut core = HostCore::new(config, Some("home"), ORIGIN).expect("config");
        core.handle(HostEvent::Load, &Location::new("/about", ""), &page(), ms(0));
        assert_eq!(core.reschedule(ms(0)), TimerChange::Set { delay_ms: 800 });
        assert_eq!(
            core.watching(),
            Some(&Watch::SectionActivation {
                element_id: String::from("about")
            })
        );

        let handled = core.handle(
            HostEvent::SectionActivated {
                element_id: String::from("about"),
            },
            &Location::new("/about", "#about"),
            &page(),
            ms(120),
        );
        assert!(handled.commands.iter().any(|command| matches!(command, HostCommand::History(_))));
        assert_eq!(core.reschedule(ms(120)), TimerChange::Clear);
    }

    #[test]
    fn click_and_scroll_round_trip() {
        let mut core = HostCore::new("{}", Some("home"), ORIGIN).expect("config");
        core.handle(HostEvent::Load, &Location::new("/", ""), &page(), ms(0));
        let handled = core.handle(
            HostEvent::Click(ClickInput::primary("#faq")),
            &Location::new("/", ""),
            &page(),
            ms(10),
        );
        assert_eq!(
            handled.disposition,
            ClickDisposition::Intercept {
                stop_propagation: true
            }
        );
        assert_eq!(core.watching(), Some(&Watch::Scroll));
        let Some(HostCommand::ScrollToAnchor { op, prefs, .. }) = handled
            .commands
            .iter()
            .find(|command| matches!(command, HostCommand::ScrollToAnchor { .. }))
            .cloned()
        else {
            panic!("expected a scroll command");
        };

        let layout = AnchorLayout {
            boxes: vec![AnchorBox::new(600.0, 700.0)],
            index: 0,
        };
        let geometry = layout.geometry(0.0, 800.0).expect("geometry");
        assert!(core.begin_scroll(op, &geometry, &prefs, ms(10)));
        assert_eq!(core.scroll_frame(ms(10)), Some(0.0));
        core.handle(HostEvent::Scroll, &Location::new("/", "#faq"), &page(), ms(20));
        assert_eq!(core.router().next_deadline(), Some(ms(200)));
        assert_eq!(core.scroll_frame(ms(10 + 600)), Some(600.0));
        assert!(!core.is_scrolling());
        assert_eq!(core.scroll_frame(ms(700)), None);
    }

    #[test]
    fn hashchange_echo_is_ignored_and_foreign_hash_adopted() {
        let mut core = HostCore::new("{}", Some("home"), ORIGIN).expect("config");
        assert_eq!(core.anchor_attr(), RouterConfig::default().anchor_attr);
        core.handle(HostEvent::Load, &Location::new("/", ""), &page(), ms(0));
        let click = core.handle(
            HostEvent::Click(ClickInput::primary("#about")),
            &Location::new("/", ""),
            &page(),
            ms(10),
        );
        assert!(click.commands.contains(&HostCommand::WriteHash {
            token: String::from("about"),
            mode: HashWriteMode::Assign,
        }));

        let echo = core.handle(
            HostEvent::HashChange {
                new_url: String::from("https://example.com/#about"),
            },
            &Location::new("/", "#about"),
            &page(),
            ms(12),
        );
        assert!(echo.commands.is_empty());
        assert_eq!(core.watching(), Some(&Watch::Timer));

        core.handle(HostEvent::Timer, &Location::new("/", "#about"), &page(), ms(460));
        assert_eq!(core.watching(), None);

        let foreign = core.handle(
            HostEvent::HashChange {
                new_url: String::from("https://example.com/about#pricing"),
            },
            &Location::new("/about", "#pricing"),
            &page(),
            ms(1000),
        );
        assert!(
            foreign
                .commands
                .iter()
                .all(|command| !matches!(command, HostCommand::WriteHash { .. }))
        );
        assert_eq!(core.watching(), Some(&Watch::Timer));
        assert_eq!(core.reschedule(ms(1000)), TimerChange::Set { delay_ms: 450 });
    }

    #[test]
    fn stray_observer_callbacks_are_dropped() {
        let mut core = HostCore::new("{}", None, ORIGIN).expect("config");
        let handled = core.handle(
            HostEvent::SectionActivated {
                element_id: String::from("about"),
            },
            &Location::new("/", ""),
            &page(),
            ms(0),
        );
        assert!(handled.commands.is_empty());
        let handled = core.handle(HostEvent::Scroll, &Location::new("/", ""), &page(), ms(0));
        assert!(handled.commands.is_empty());
    }

    #[test]
    fn popstate_json_is_parsed() {
        let mut core = HostCore::new("{}", Some("home"), ORIGIN).expect("config");
        core.handle(HostEvent::Load, &Location::new("/", ""), &page(), ms(0));
        let handled = core.handle(
            HostEvent::PopState {
                state_json: Some(String::from(r#"{"section":"docs"}"#)),
            },
            &Location::new("/docs", ""),
            &page(),
            ms(10),
        );
        assert!(handled.commands.contains(&HostCommand::WriteHash {
            token: String::from("docs"),
            mode: HashWriteMode::Replace,
        }));
    }
}
