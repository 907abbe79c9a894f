#![forbid(unsafe_code)]

//! Fragment classification: section hash or in-page scroll anchor.
//!
//! Sections and anchors can collide lexically (`#contact` may be either), so
//! the rule is presence in markup: a fragment naming an element that carries
//! the anchor marker attribute is an anchor, everything else is a section.

use core::time::Duration;
use std::collections::HashMap;

use crate::codec::PathHashCodec;
use crate::section::{ScrollAnchor, Section};

/// Marker attribute identifying scroll anchors.
pub const ANCHOR_ATTR: &str = "data-scroll-id";
pub const BEHAVIOR_ATTR: &str = "data-scroll-behavior";
pub const OFFSET_ATTR: &str = "data-scroll-offset";
pub const SPEED_ATTR: &str = "data-scroll-speed";
pub const INVISIBLE_ATTR: &str = "data-scroll-invisible";

/// Pixels per offset unit.
pub const OFFSET_STEP_PX: f64 = 10.0;

const OFFSET_RANGE: (f64, f64) = (-10.0, 10.0);
const SPEED_RANGE: (f64, f64) = (1.0, 5.0);
const DEFAULT_SPEED: f64 = 3.0;

/// Scroll duration per speed step, slowest first.
const SPEED_DURATIONS_MS: [u64; 5] = [1400, 950, 600, 330, 180];

/// Raw presentation attributes of an anchor element, as read from markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorMarkup {
    pub behavior: Option<String>,
    pub offset: Option<String>,
    pub speed: Option<String>,
    pub invisible: Option<String>,
}

/// Markup query used for classification.
pub trait AnchorLookup {
    /// Return the anchor element marked with `id`, if the page has one.
    fn find_anchor(&self, id: &str) -> Option<AnchorMarkup>;
}

impl AnchorLookup for HashMap<String, AnchorMarkup> {
    fn find_anchor(&self, id: &str) -> Option<AnchorMarkup> {
        self.get(id).cloned()
    }
}

/// Where an anchor scroll lands relative to its neighbours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Top edge of the anchor element.
    #[default]
    Default,
    /// Bottom edge of the previous anchor.
    Previous,
    /// Centered between this anchor and the next one.
    Center,
}

impl ScrollBehavior {
    /// Case-insensitive parse; unknown values use [`ScrollBehavior::Default`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "previous" => Self::Previous,
            "center" => Self::Center,
            _ => Self::Default,
        }
    }
}

/// Parse the leading number of `raw` the way a lenient attribute reader
/// does (`"3px"` → 3). Returns `None` when there is no finite number.
fn parse_leading_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let mut end = trimmed
        .char_indices()
        .find(|&(_, ch)| !(ch.is_ascii_digit() || matches!(ch, '+' | '-' | '.' | 'e' | 'E')))
        .map_or(trimmed.len(), |(idx, _)| idx);
    while end > 0 {
        if let Ok(value) = trimmed[..end].parse::<f64>() {
            return value.is_finite().then_some(value);
        }
        end -= 1;
    }
    None
}

/// Presentation metadata of one anchor. Affects scrolling only, never
/// classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPrefs {
    pub behavior: ScrollBehavior,
    /// Normalized offset in `-10.0..=10.0`.
    pub offset: f64,
    /// Normalized speed in `1.0..=5.0`.
    pub speed: f64,
    /// Recorded in history state but kept out of the visible URL.
    pub invisible: bool,
}

impl Default for ScrollPrefs {
    fn default() -> Self {
        Self {
            behavior: ScrollBehavior::Default,
            offset: 0.0,
            speed: DEFAULT_SPEED,
            invisible: false,
        }
    }
}

impl ScrollPrefs {
    /// Read and clamp prefs from raw markup attributes.
    #[must_use]
    pub fn from_markup(markup: &AnchorMarkup) -> Self {
        let behavior = markup
            .behavior
            .as_deref()
            .map(ScrollBehavior::parse)
            .unwrap_or_default();
        let offset = markup
            .offset
            .as_deref()
            .and_then(parse_leading_number)
            .unwrap_or(0.0)
            .clamp(OFFSET_RANGE.0, OFFSET_RANGE.1);
        let speed = markup
            .speed
            .as_deref()
            .and_then(parse_leading_number)
            .unwrap_or(DEFAULT_SPEED)
            .clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        let invisible = markup.invisible.as_deref().map(str::trim) == Some("1");
        Self {
            behavior,
            offset,
            speed,
            invisible,
        }
    }

    /// Offset converted to pixels.
    #[must_use]
    pub fn offset_px(&self) -> f64 {
        self.offset * OFFSET_STEP_PX
    }

    /// Animation duration for the configured speed.
    #[must_use]
    pub fn duration(&self) -> Duration {
        let step = self.speed.round().clamp(SPEED_RANGE.0, SPEED_RANGE.1) as usize;
        Duration::from_millis(SPEED_DURATIONS_MS[step - 1])
    }

    /// Whether the anchor should appear as a visible URL fragment.
    #[must_use]
    pub const fn shows_fragment(&self) -> bool {
        !self.invisible
    }
}

/// Classification result for one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Section(Section),
    Anchor {
        anchor: ScrollAnchor,
        prefs: ScrollPrefs,
    },
}

/// Classify a fragment or token with exactly one markup lookup.
///
/// `""` and `"#"` address the root section without consulting markup.
pub fn classify(token: &str, codec: &PathHashCodec, lookup: &dyn AnchorLookup) -> Target {
    let Some(anchor) = ScrollAnchor::new(token) else {
        return Target::Section(Section::root());
    };
    match lookup.find_anchor(anchor.as_str()) {
        Some(markup) => Target::Anchor {
            anchor,
            prefs: ScrollPrefs::from_markup(&markup),
        },
        None => Target::Section(codec.to_section(token)),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AnchorLookup, AnchorMarkup, ScrollBehavior, ScrollPrefs, Target, classify,
        parse_leading_number,
    };
    use crate::codec::PathHashCodec;
    use crate::section::{ScrollAnchor, Section};
    use core::cell::Cell;
    use core::time::Duration;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn markup(behavior: &str, offset: &str, speed: &str) -> AnchorMarkup {
        AnchorMarkup {
            behavior: Some(behavior.to_owned()),
            offset: Some(offset.to_owned()),
            speed: Some(speed.to_owned()),
            invisible: None,
        }
    }

    #[test]
    fn marked_elements_are_anchors() {
        let mut page = HashMap::new();
        page.insert(String::from("contact"), AnchorMarkup::default());
        let codec = PathHashCodec::default();

        assert_eq!(
            classify("#contact", &codec, &page),
            Target::Anchor {
                anchor: ScrollAnchor::new("contact").expect("anchor"),
                prefs: ScrollPrefs::default(),
            }
        );
        assert_eq!(
            classify("#about--team", &codec, &page),
            Target::Section(Section::parse("about/team"))
        );
    }

    #[test]
    fn markup_wins_over_section_shape() {
        // An anchor whose id looks like a nested section token.
        let mut page = HashMap::new();
        page.insert(String::from("about--team"), AnchorMarkup::default());
        let target = classify("about--team", &PathHashCodec::default(), &page);
        assert!(matches!(target, Target::Anchor { .. }));
    }

    #[derive(Default)]
    struct CountingLookup {
        calls: Cell<u32>,
    }

    impl AnchorLookup for CountingLookup {
        fn find_anchor(&self, _id: &str) -> Option<AnchorMarkup> {
            self.calls.set(self.calls.get() + 1);
            None
        }
    }

    #[test]
    fn empty_fragment_is_root_without_lookup() {
        let lookup = CountingLookup::default();
        let codec = PathHashCodec::default();
        assert_eq!(classify("#", &codec, &lookup), Target::Section(Section::root()));
        assert_eq!(classify("", &codec, &lookup), Target::Section(Section::root()));
        assert_eq!(lookup.calls.get(), 0);
        classify("#x", &codec, &lookup);
        assert_eq!(lookup.calls.get(), 1);
    }

    #[test]
    fn prefs_are_clamped() {
        let prefs = ScrollPrefs::from_markup(&markup("CENTER", "25", "9"));
        assert_eq!(prefs.behavior, ScrollBehavior::Center);
        assert_eq!(prefs.offset, 10.0);
        assert_eq!(prefs.offset_px(), 100.0);
        assert_eq!(prefs.speed, 5.0);
        assert_eq!(prefs.duration(), Duration::from_millis(180));

        let prefs = ScrollPrefs::from_markup(&markup("previous", "-40", "0"));
        assert_eq!(prefs.behavior, ScrollBehavior::Previous);
        assert_eq!(prefs.offset_px(), -100.0);
        assert_eq!(prefs.duration(), Duration::from_millis(1400));
    }

    #[test]
    fn bad_numbers_use_defaults() {
        let prefs = ScrollPrefs::from_markup(&markup("sideways", "abc", "fast"));
        assert_eq!(prefs, ScrollPrefs::default());
        assert_eq!(prefs.duration(), Duration::from_millis(600));
    }

    #[test]
    fn speed_rounds_to_nearest_step() {
        let prefs = ScrollPrefs::from_markup(&markup("default", "0", "3.6"));
        assert_eq!(prefs.duration(), Duration::from_millis(330));
        let prefs = ScrollPrefs::from_markup(&markup("default", "0", "1.4"));
        assert_eq!(prefs.duration(), Duration::from_millis(1400));
    }

    #[test]
    fn invisible_flag_requires_one() {
        let flagged = AnchorMarkup {
            invisible: Some(String::from("1")),
            ..AnchorMarkup::default()
        };
        assert!(ScrollPrefs::from_markup(&flagged).invisible);
        let other = AnchorMarkup {
            invisible: Some(String::from("true")),
            ..AnchorMarkup::default()
        };
        assert!(ScrollPrefs::from_markup(&other).shows_fragment());
    }

    #[test]
    fn leading_numbers_parse_leniently() {
        assert_eq!(parse_leading_number("3px"), Some(3.0));
        assert_eq!(parse_leading_number("  -2.5"), Some(-2.5));
        assert_eq!(parse_leading_number("4e"), Some(4.0));
        assert_eq!(parse_leading_number("px"), None);
        assert_eq!(parse_leading_number(""), None);
    }
}
