//! DOM glue. Every browser call lives here; routing decisions come from
//! [`HostCore`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

use hashpath_core::classify::{BEHAVIOR_ATTR, INVISIBLE_ATTR, OFFSET_ATTR, SPEED_ATTR};
use hashpath_core::codec::ROOT_SECTION_SELECTORS;
use hashpath_core::{
    AnchorBox, AnchorLookup, AnchorMarkup, ClickDisposition, ClickInput, HashWriteMode,
    HistoryCommand, HistoryMode, HostCommand, RouterClock, ScrollAnchor, ScrollPrefs, Watch,
};
use js_sys::{Array, Function, JSON, Reflect};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, HashChangeEvent, MouseEvent, MutationObserver, MutationObserverInit,
    PopStateEvent, Window,
};
use web_time::Instant;

use crate::host_core::{
    AnchorLayout, HostCore, HostError, HostEvent, TimerChange, attr_selector, is_fragment_href,
    looks_active, presence_selector,
};

const LINK_SELECTOR: &str = "a[href]";
const ACTIVE_CLASS: &str = "active";

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "hashpath panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("hashpath panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

fn js_error(op: &'static str) -> impl FnOnce(JsValue) -> HostError {
    move |value| HostError::Js {
        op,
        message: value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}")),
    }
}

/// Monotonic clock anchored at router construction.
struct HostClock {
    started: Instant,
}

impl RouterClock for HostClock {
    fn now_mono(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Anchor markup read straight from the document.
struct DomAnchors<'a> {
    document: &'a Document,
    attr: String,
}

impl AnchorLookup for DomAnchors<'_> {
    fn find_anchor(&self, id: &str) -> Option<AnchorMarkup> {
        let element = self
            .document
            .query_selector(&attr_selector(&self.attr, id))
            .ok()
            .flatten()?;
        Some(AnchorMarkup {
            behavior: element.get_attribute(BEHAVIOR_ATTR),
            offset: element.get_attribute(OFFSET_ATTR),
            speed: element.get_attribute(SPEED_ATTR),
            invisible: element.get_attribute(INVISIBLE_ATTR),
        })
    }
}

struct Listeners {
    click: Closure<dyn Fn(Event)>,
    hash_change: Closure<dyn Fn(Event)>,
    pop_state: Closure<dyn Fn(Event)>,
    scroll: Closure<dyn Fn(Event)>,
    timer: Closure<dyn Fn()>,
    frame: Closure<dyn Fn(f64)>,
    mutation: Closure<dyn Fn(Array)>,
}

struct Shared {
    window: Window,
    document: Document,
    clock: HostClock,
    core: RefCell<HostCore>,
    // Events that arrived while the core was busy executing commands.
    pending: RefCell<VecDeque<HostEvent>>,
    last_click: Cell<Option<ClickDisposition>>,
    timer: Cell<Option<i32>>,
    frame: Cell<Option<i32>>,
    observer: RefCell<Option<MutationObserver>>,
    listeners: RefCell<Option<Listeners>>,
}

impl Shared {
    fn location(&self) -> Result<hashpath_core::Location, HostError> {
        let location = self.window.location();
        let pathname = location.pathname().map_err(js_error("location.pathname"))?;
        let hash = location.hash().map_err(js_error("location.hash"))?;
        Ok(hashpath_core::Location::new(pathname, hash))
    }

    /// Queue `event` and drain the queue unless a drain is already running
    /// further up the stack.
    fn dispatch(&self, event: HostEvent) {
        self.pending.borrow_mut().push_back(event);
        self.pump();
    }

    fn pump(&self) {
        let Ok(mut core) = self.core.try_borrow_mut() else {
            return;
        };
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            if let Err(err) = self.handle(&mut core, event) {
                warn!(%err, "browser call failed");
            }
        }
    }

    fn handle(&self, core: &mut HostCore, event: HostEvent) -> Result<(), HostError> {
        let now = self.clock.now_mono();
        let location = self.location()?;
        let lookup = DomAnchors {
            document: &self.document,
            attr: core.anchor_attr().to_owned(),
        };
        let is_click = matches!(event, HostEvent::Click(_));
        let handled = core.handle(event, &location, &lookup, now);
        if is_click {
            self.last_click.set(Some(handled.disposition));
        }
        for command in handled.commands {
            if let Err(err) = self.execute(core, command, now) {
                warn!(%err, "host command failed");
            }
        }
        self.sync_observer(core)?;
        self.sync_timer(core, now)
    }

    fn execute(
        &self,
        core: &mut HostCore,
        command: HostCommand,
        now: Duration,
    ) -> Result<(), HostError> {
        match command {
            HostCommand::WriteHash { token, mode } => {
                let location = self.window.location();
                match mode {
                    HashWriteMode::Assign => location
                        .set_hash(&token)
                        .map_err(js_error("location.hash=")),
                    HashWriteMode::Replace => location
                        .replace(&format!("#{token}"))
                        .map_err(js_error("location.replace")),
                }
            }
            HostCommand::History(command) => self.write_history(&command),
            HostCommand::ScrollToAnchor { op, anchor, prefs } => {
                let Some(layout) = self.anchor_layout(core.anchor_attr(), &anchor)? else {
                    debug!(anchor = %anchor.as_str(), "anchor vanished before scrolling");
                    return Ok(());
                };
                self.start_scroll(core, op, &layout, &prefs, now)
            }
            HostCommand::ScrollToTop => {
                self.window.scroll_to_with_x_and_y(0.0, 0.0);
                Ok(())
            }
            // Observers follow `HostCore::watching` after every event.
            HostCommand::ArmDetector { .. } | HostCommand::DisarmDetector { .. } => Ok(()),
        }
    }

    fn write_history(&self, command: &HistoryCommand) -> Result<(), HostError> {
        let history = self.window.history().map_err(js_error("window.history"))?;
        let state = JSON::parse(&command.state.to_json()).map_err(js_error("JSON.parse"))?;
        match command.mode {
            HistoryMode::Push => history
                .push_state_with_url(&state, "", Some(&command.url))
                .map_err(js_error("history.pushState")),
            HistoryMode::Replace => history
                .replace_state_with_url(&state, "", Some(&command.url))
                .map_err(js_error("history.replaceState")),
        }
    }

    fn anchor_layout(
        &self,
        attr: &str,
        anchor: &ScrollAnchor,
    ) -> Result<Option<AnchorLayout>, HostError> {
        let nodes = self
            .document
            .query_selector_all(&presence_selector(attr))
            .map_err(js_error("querySelectorAll"))?;
        let mut boxes = Vec::with_capacity(nodes.length() as usize);
        let mut index = None;
        for idx in 0..nodes.length() {
            let Some(element) = nodes
                .item(idx)
                .and_then(|node| node.dyn_into::<Element>().ok())
            else {
                continue;
            };
            if index.is_none() && element.get_attribute(attr).as_deref() == Some(anchor.as_str()) {
                index = Some(boxes.len());
            }
            let rect = element.get_bounding_client_rect();
            boxes.push(AnchorBox::new(rect.top(), rect.bottom()));
        }
        Ok(index.map(|index| AnchorLayout { boxes, index }))
    }

    fn start_scroll(
        &self,
        core: &mut HostCore,
        op: hashpath_core::DriveOperation,
        layout: &AnchorLayout,
        prefs: &ScrollPrefs,
        now: Duration,
    ) -> Result<(), HostError> {
        let scroll_y = self.window.scroll_y().map_err(js_error("window.scrollY"))?;
        let viewport_height = self
            .window
            .inner_height()
            .map_err(js_error("window.innerHeight"))?
            .as_f64()
            .unwrap_or(0.0);
        let Some(geometry) = layout.geometry(scroll_y, viewport_height) else {
            return Ok(());
        };
        if core.begin_scroll(op, &geometry, prefs, now) {
            self.request_frame()?;
        }
        Ok(())
    }

    fn request_frame(&self) -> Result<(), HostError> {
        if self.frame.get().is_some() {
            return Ok(());
        }
        let listeners = self.listeners.borrow();
        let Some(listeners) = listeners.as_ref() else {
            return Ok(());
        };
        let handle = self
            .window
            .request_animation_frame(listeners.frame.as_ref().unchecked_ref())
            .map_err(js_error("requestAnimationFrame"))?;
        self.frame.set(Some(handle));
        Ok(())
    }

    fn on_frame(&self) {
        self.frame.set(None);
        let Ok(mut core) = self.core.try_borrow_mut() else {
            // Busy routing; try again next frame.
            if let Err(err) = self.request_frame() {
                warn!(%err, "animation frame failed");
            }
            return;
        };
        let Some(y) = core.scroll_frame(self.clock.now_mono()) else {
            return;
        };
        self.window.scroll_to_with_x_and_y(0.0, y);
        let more = core.is_scrolling();
        drop(core);
        if more {
            if let Err(err) = self.request_frame() {
                warn!(%err, "animation frame failed");
            }
        }
    }

    fn sync_timer(&self, core: &mut HostCore, now: Duration) -> Result<(), HostError> {
        match core.reschedule(now) {
            TimerChange::Keep => Ok(()),
            TimerChange::Clear => {
                if let Some(handle) = self.timer.take() {
                    self.window.clear_timeout_with_handle(handle);
                }
                Ok(())
            }
            TimerChange::Set { delay_ms } => {
                if let Some(handle) = self.timer.take() {
                    self.window.clear_timeout_with_handle(handle);
                }
                let listeners = self.listeners.borrow();
                let Some(listeners) = listeners.as_ref() else {
                    return Ok(());
                };
                let handle = self
                    .window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(
                        listeners.timer.as_ref().unchecked_ref(),
                        delay_ms,
                    )
                    .map_err(js_error("setTimeout"))?;
                self.timer.set(Some(handle));
                Ok(())
            }
        }
    }

    fn sync_observer(&self, core: &HostCore) -> Result<(), HostError> {
        let wants = matches!(core.watching(), Some(Watch::SectionActivation { .. }));
        let mut observer = self.observer.borrow_mut();
        match (wants, observer.is_some()) {
            (true, false) => {
                let listeners = self.listeners.borrow();
                let Some(listeners) = listeners.as_ref() else {
                    return Ok(());
                };
                let Some(root) = self.document.document_element() else {
                    return Err(HostError::MissingGlobal("document.documentElement"));
                };
                let created = MutationObserver::new(listeners.mutation.as_ref().unchecked_ref())
                    .map_err(js_error("new MutationObserver"))?;
                let init = MutationObserverInit::new();
                init.set_attributes(true);
                init.set_child_list(true);
                init.set_subtree(true);
                created
                    .observe_with_options(&root, &init)
                    .map_err(js_error("MutationObserver.observe"))?;
                *observer = Some(created);
            }
            (false, true) => {
                if let Some(active) = observer.take() {
                    active.disconnect();
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Mutation callback: report the watched section once it looks shown.
    fn on_mutation(&self) {
        let expected = {
            let Ok(core) = self.core.try_borrow() else {
                return;
            };
            match core.watching() {
                Some(Watch::SectionActivation { element_id }) => element_id.clone(),
                _ => return,
            }
        };
        let Some(element) = self.document.get_element_by_id(&expected) else {
            return;
        };
        let height = element.get_bounding_client_rect().height();
        let active = looks_active(
            element.class_list().contains(ACTIVE_CLASS),
            element.has_attribute("hidden"),
            height,
        );
        if active {
            self.dispatch(HostEvent::SectionActivated {
                element_id: expected,
            });
        }
    }

    fn on_click(&self, event: &Event) {
        let Some(input) = click_input(event) else {
            return;
        };
        self.last_click.set(None);
        self.dispatch(HostEvent::Click(input));
        if let Some(ClickDisposition::Intercept { stop_propagation }) = self.last_click.take() {
            event.prevent_default();
            if stop_propagation {
                event.stop_immediate_propagation();
            }
        }
    }

    fn detach(&self) {
        if let Some(handle) = self.timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        if let Some(handle) = self.frame.take() {
            let _ = self.window.cancel_animation_frame(handle);
        }
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
        let Some(listeners) = self.listeners.borrow_mut().take() else {
            return;
        };
        let _ = self.document.remove_event_listener_with_callback_and_bool(
            "click",
            listeners.click.as_ref().unchecked_ref(),
            true,
        );
        let _ = self.window.remove_event_listener_with_callback(
            "hashchange",
            listeners.hash_change.as_ref().unchecked_ref(),
        );
        let _ = self.window.remove_event_listener_with_callback(
            "popstate",
            listeners.pop_state.as_ref().unchecked_ref(),
        );
        let _ = self.window.remove_event_listener_with_callback(
            "scroll",
            listeners.scroll.as_ref().unchecked_ref(),
        );
    }
}

/// Reduce a DOM click to the fields the router reads. `None` when the click
/// did not land on a fragment link.
fn click_input(event: &Event) -> Option<ClickInput> {
    let target = event.target()?.dyn_into::<Element>().ok()?;
    let link = target.closest(LINK_SELECTOR).ok().flatten()?;
    let href = link.get_attribute("href")?;
    if !is_fragment_href(&href) {
        return None;
    }
    let mouse = event.dyn_ref::<MouseEvent>();
    Some(ClickInput {
        href: Some(href),
        primary_button: mouse.is_none_or(|mouse| mouse.button() == 0),
        modified: mouse.is_some_and(|mouse| {
            mouse.ctrl_key() || mouse.meta_key() || mouse.shift_key() || mouse.alt_key()
        }),
        default_prevented: event.default_prevented(),
    })
}

fn pop_state_json(event: &Event) -> Option<String> {
    let state = event.dyn_ref::<PopStateEvent>()?.state();
    if state.is_null() || state.is_undefined() {
        return None;
    }
    JSON::stringify(&state).ok().and_then(|json| json.as_string())
}

fn discover_root_id(document: &Document) -> Option<String> {
    ROOT_SECTION_SELECTORS.iter().find_map(|selector| {
        let element = document.query_selector(selector).ok().flatten()?;
        let id = element.id();
        (!id.trim().is_empty()).then_some(id)
    })
}

fn event_listener(shared: &Weak<Shared>, on: fn(&Shared, Event)) -> Closure<dyn Fn(Event)> {
    let shared = Weak::clone(shared);
    Closure::<dyn Fn(Event)>::wrap(Box::new(move |event: Event| {
        if let Some(shared) = shared.upgrade() {
            on(&shared, event);
        }
    }))
}

/// Path-URL router for a hash-driven page.
#[wasm_bindgen]
pub struct HashPathRouter {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl HashPathRouter {
    /// Build a router from a JSON config (empty string for defaults). The
    /// root section id is discovered from markup.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<HashPathRouter, JsValue> {
        install_panic_hook();
        Self::build(config_json).map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Install listeners and resync from the current URL. Calling it twice
    /// is a no-op.
    pub fn start(&self) -> Result<(), JsValue> {
        let attached = self.attach().map_err(|err| JsValue::from_str(&err.to_string()))?;
        if attached {
            self.shared.dispatch(HostEvent::Load);
        }
        Ok(())
    }

    /// Remove every listener, timer and observer.
    pub fn stop(&self) {
        self.shared.detach();
    }

    /// History state of the current canonical location, as JSON.
    #[wasm_bindgen(js_name = currentStateJson)]
    pub fn current_state_json(&self) -> Option<String> {
        let core = self.shared.core.try_borrow().ok()?;
        Some(core.router().current().to_json())
    }
}

impl HashPathRouter {
    fn build(config_json: &str) -> Result<Self, HostError> {
        let window = web_sys::window().ok_or(HostError::MissingGlobal("window"))?;
        let document = window.document().ok_or(HostError::MissingGlobal("document"))?;
        let origin = window
            .location()
            .origin()
            .map_err(js_error("location.origin"))?;
        let root_id = discover_root_id(&document);
        let core = HostCore::new(config_json, root_id.as_deref(), &origin)?;
        debug!(root_id = ?root_id, %origin, "router created");
        Ok(Self {
            shared: Rc::new(Shared {
                window,
                document,
                clock: HostClock {
                    started: Instant::now(),
                },
                core: RefCell::new(core),
                pending: RefCell::new(VecDeque::new()),
                last_click: Cell::new(None),
                timer: Cell::new(None),
                frame: Cell::new(None),
                observer: RefCell::new(None),
                listeners: RefCell::new(None),
            }),
        })
    }

    /// Returns `false` when listeners were already installed.
    fn attach(&self) -> Result<bool, HostError> {
        if self.shared.listeners.borrow().is_some() {
            return Ok(false);
        }
        let weak = Rc::downgrade(&self.shared);
        let listeners = Listeners {
            click: event_listener(&weak, |shared, event| shared.on_click(&event)),
            hash_change: event_listener(&weak, |shared, event| {
                let new_url = event
                    .dyn_ref::<HashChangeEvent>()
                    .map(HashChangeEvent::new_url)
                    .unwrap_or_default();
                shared.dispatch(HostEvent::HashChange { new_url });
            }),
            pop_state: event_listener(&weak, |shared, event| {
                let state_json = pop_state_json(&event);
                shared.dispatch(HostEvent::PopState { state_json });
            }),
            scroll: event_listener(&weak, |shared, _| shared.dispatch(HostEvent::Scroll)),
            timer: {
                let weak = Weak::clone(&weak);
                Closure::<dyn Fn()>::wrap(Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.timer.set(None);
                        shared.dispatch(HostEvent::Timer);
                    }
                }))
            },
            frame: {
                let weak = Weak::clone(&weak);
                Closure::<dyn Fn(f64)>::wrap(Box::new(move |_timestamp: f64| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_frame();
                    }
                }))
            },
            mutation: {
                let weak = Weak::clone(&weak);
                Closure::<dyn Fn(Array)>::wrap(Box::new(move |_records: Array| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_mutation();
                    }
                }))
            },
        };

        let shared = &self.shared;
        shared
            .document
            .add_event_listener_with_callback_and_bool(
                "click",
                listeners.click.as_ref().unchecked_ref(),
                true,
            )
            .map_err(js_error("addEventListener(click)"))?;
        shared
            .window
            .add_event_listener_with_callback(
                "hashchange",
                listeners.hash_change.as_ref().unchecked_ref(),
            )
            .map_err(js_error("addEventListener(hashchange)"))?;
        shared
            .window
            .add_event_listener_with_callback(
                "popstate",
                listeners.pop_state.as_ref().unchecked_ref(),
            )
            .map_err(js_error("addEventListener(popstate)"))?;
        shared
            .window
            .add_event_listener_with_callback("scroll", listeners.scroll.as_ref().unchecked_ref())
            .map_err(js_error("addEventListener(scroll)"))?;
        *shared.listeners.borrow_mut() = Some(listeners);
        Ok(true)
    }
}

impl Drop for HashPathRouter {
    fn drop(&mut self) {
        self.shared.detach();
    }
}
