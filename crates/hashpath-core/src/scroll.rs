#![forbid(unsafe_code)]

//! Anchor scroll targeting and eased scroll animation.
//!
//! The host measures geometry (viewport-relative boxes, current scroll
//! offset) and asks for a [`ScrollPlan`]; it then samples the plan once per
//! animation frame. Nothing here touches the page, so the engine's own
//! hash-driven scrolling is never involved in anchor navigation.
//!
//! # Targets
//!
//! - [`ScrollBehavior::Default`]: top edge of the anchor.
//! - [`ScrollBehavior::Previous`]: bottom edge of the previous anchor in
//!   document order (falls back to Default for the first anchor).
//! - [`ScrollBehavior::Center`]: midpoint between this anchor and the next,
//!   centered in the viewport (falls back to Default for the last anchor).
//!
//! The offset is subtracted from the target and the result is clamped at 0.

use core::time::Duration;

use crate::classify::{ScrollBehavior, ScrollPrefs};

/// Distance below which no animation is started.
pub const MIN_SCROLL_DISTANCE_PX: f64 = 1.0;

/// Vertical extent of an element relative to the viewport
/// (`getBoundingClientRect().top/bottom`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorBox {
    pub top: f64,
    pub bottom: f64,
}

impl AnchorBox {
    #[must_use]
    pub const fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }
}

/// Geometry snapshot taken by the host right before scrolling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollGeometry {
    /// Current document scroll offset.
    pub scroll_y: f64,
    pub viewport_height: f64,
    pub anchor: AnchorBox,
    /// Previous anchor in document order.
    pub prev: Option<AnchorBox>,
    /// Next anchor in document order.
    pub next: Option<AnchorBox>,
}

impl ScrollGeometry {
    fn absolute_top(&self, node: AnchorBox) -> f64 {
        self.scroll_y + node.top
    }

    fn absolute_bottom(&self, node: AnchorBox) -> f64 {
        self.scroll_y + node.bottom
    }
}

/// Absolute document offset the anchor scroll should land on.
#[must_use]
pub fn target_y(geometry: &ScrollGeometry, prefs: &ScrollPrefs) -> f64 {
    let own_top = geometry.absolute_top(geometry.anchor);
    let target = match prefs.behavior {
        ScrollBehavior::Previous => geometry
            .prev
            .map_or(own_top, |prev| geometry.absolute_bottom(prev)),
        ScrollBehavior::Center => geometry.next.map_or(own_top, |next| {
            let mid = (own_top + geometry.absolute_top(next)) / 2.0;
            mid - geometry.viewport_height / 2.0
        }),
        ScrollBehavior::Default => own_top,
    };
    (target - prefs.offset_px()).max(0.0)
}

/// Symmetric cubic ease-in-out over `t` in `0.0..=1.0`.
#[must_use]
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// One eased scroll from `start_y` to `target_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPlan {
    pub start_y: f64,
    pub target_y: f64,
    pub duration: Duration,
}

impl ScrollPlan {
    /// Plan a scroll for the given geometry. Returns `None` when the page is
    /// already within [`MIN_SCROLL_DISTANCE_PX`] of the target.
    #[must_use]
    pub fn new(geometry: &ScrollGeometry, prefs: &ScrollPrefs) -> Option<Self> {
        let target_y = target_y(geometry, prefs);
        if (target_y - geometry.scroll_y).abs() < MIN_SCROLL_DISTANCE_PX {
            return None;
        }
        Some(Self {
            start_y: geometry.scroll_y,
            target_y,
            duration: prefs.duration(),
        })
    }

    /// Scroll offset `elapsed` after the animation started.
    #[must_use]
    pub fn position_at(&self, elapsed: Duration) -> f64 {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };
        self.start_y + (self.target_y - self.start_y) * ease_in_out_cubic(progress)
    }

    #[must_use]
    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::{AnchorBox, ScrollGeometry, ScrollPlan, ease_in_out_cubic, target_y};
    use crate::classify::{ScrollBehavior, ScrollPrefs};
    use core::time::Duration;

    fn geometry() -> ScrollGeometry {
        ScrollGeometry {
            scroll_y: 100.0,
            viewport_height: 800.0,
            anchor: AnchorBox::new(400.0, 500.0),
            prev: Some(AnchorBox::new(-300.0, -100.0)),
            next: Some(AnchorBox::new(1400.0, 1500.0)),
        }
    }

    fn prefs(behavior: ScrollBehavior, offset: f64) -> ScrollPrefs {
        ScrollPrefs {
            behavior,
            offset,
            ..ScrollPrefs::default()
        }
    }

    #[test]
    fn default_targets_anchor_top() {
        assert_eq!(target_y(&geometry(), &prefs(ScrollBehavior::Default, 0.0)), 500.0);
    }

    #[test]
    fn previous_targets_bottom_of_previous_anchor() {
        assert_eq!(target_y(&geometry(), &prefs(ScrollBehavior::Previous, 0.0)), 0.0);
        let mut g = geometry();
        g.prev = Some(AnchorBox::new(100.0, 250.0));
        assert_eq!(target_y(&g, &prefs(ScrollBehavior::Previous, 0.0)), 350.0);
        g.prev = None;
        assert_eq!(target_y(&g, &prefs(ScrollBehavior::Previous, 0.0)), 500.0);
    }

    #[test]
    fn center_targets_midpoint_between_anchors() {
        // tops at 500 and 1500 → mid 1000, minus half the viewport.
        assert_eq!(target_y(&geometry(), &prefs(ScrollBehavior::Center, 0.0)), 600.0);
        let mut g = geometry();
        g.next = None;
        assert_eq!(target_y(&g, &prefs(ScrollBehavior::Center, 0.0)), 500.0);
    }

    #[test]
    fn offset_shifts_and_clamps_at_zero() {
        assert_eq!(target_y(&geometry(), &prefs(ScrollBehavior::Default, 5.0)), 450.0);
        assert_eq!(target_y(&geometry(), &prefs(ScrollBehavior::Default, -5.0)), 550.0);
        let mut g = geometry();
        g.scroll_y = 0.0;
        g.anchor = AnchorBox::new(20.0, 40.0);
        assert_eq!(target_y(&g, &prefs(ScrollBehavior::Default, 10.0)), 0.0);
    }

    #[test]
    fn easing_is_monotone_with_fixed_endpoints() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert_eq!(ease_in_out_cubic(0.5), 0.5);
        let mut last = 0.0;
        for step in 1..=100 {
            let value = ease_in_out_cubic(f64::from(step) / 100.0);
            assert!(value >= last);
            last = value;
        }
    }

    #[test]
    fn plan_samples_from_start_to_target() {
        let plan = ScrollPlan::new(&geometry(), &ScrollPrefs::default()).expect("plan");
        assert_eq!(plan.duration, Duration::from_millis(600));
        assert_eq!(plan.position_at(Duration::ZERO), 100.0);
        assert_eq!(plan.position_at(Duration::from_millis(300)), 300.0);
        assert_eq!(plan.position_at(Duration::from_secs(5)), 500.0);
        assert!(!plan.is_finished(Duration::from_millis(599)));
        assert!(plan.is_finished(Duration::from_millis(600)));
    }

    #[test]
    fn tiny_distances_do_not_animate() {
        let mut g = geometry();
        g.anchor = AnchorBox::new(0.5, 10.0);
        assert_eq!(ScrollPlan::new(&g, &ScrollPrefs::default()), None);
    }
}
