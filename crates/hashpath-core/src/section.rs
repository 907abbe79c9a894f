#![forbid(unsafe_code)]

//! Canonical navigation values: sections, scroll anchors, and the state
//! recorded on every history entry.
//!
//! A [`Section`] is always canonical. Arbitrary input (history state written
//! by other scripts, hand-edited paths, engine hash tokens) passes through the
//! same sanitizer, so two sections compare equal exactly when they address
//! the same engine section.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Characters allowed inside one section segment.
#[must_use]
pub const fn is_segment_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-'
}

/// Sanitize one segment: keep `[A-Za-z0-9-]`, collapse `-` runs, trim
/// leading and trailing `-`.
fn sanitize_segment(raw: &str, out: &mut String) {
    let start = out.len();
    let mut pending_dash = false;
    for ch in raw.chars().filter(|&ch| is_segment_char(ch)) {
        if ch == '-' {
            pending_dash = true;
            continue;
        }
        if pending_dash && out.len() > start {
            out.push('-');
        }
        pending_dash = false;
        out.push(ch);
    }
}

/// Canonical slash-delimited section path. `""` is the root section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Section(String);

impl Section {
    /// The root (home) section.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Canonicalize an arbitrary slash-delimited path.
    ///
    /// Never fails: input that sanitizes to nothing is the root section.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut out = String::with_capacity(raw.len());
        for segment in raw.split('/') {
            let mark = out.len();
            if mark > 0 {
                out.push('/');
            }
            let body = out.len();
            sanitize_segment(segment, &mut out);
            if out.len() == body {
                out.truncate(mark);
            }
        }
        Self(out)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segments, outermost first. Empty for the root section.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Visible pathname for this section (`/` + section).
    #[must_use]
    pub fn pathname(&self) -> String {
        format!("/{}", self.0)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Section {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Identifier of an in-page scroll target.
///
/// Anchors live in their own namespace: they are never slash-substituted and
/// are resolved by markup lookup, not by shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScrollAnchor(String);

impl ScrollAnchor {
    /// Build an anchor from a raw id or fragment (`#` prefix stripped).
    /// Returns `None` for an empty id.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let id = raw.strip_prefix('#').unwrap_or(raw).trim();
        (!id.is_empty()).then(|| Self(id.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Visible fragment for this anchor, including the leading `#`.
    #[must_use]
    pub fn fragment(&self) -> String {
        format!("#{}", self.0)
    }
}

impl fmt::Display for ScrollAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State stored in the history state slot of every entry we write.
///
/// Serialized as `{"section": "...", "scrollId": "..."}`; a missing or empty
/// `scrollId` means "no anchor".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavigationState {
    pub section: Section,
    #[serde(
        rename = "scrollId",
        default,
        skip_serializing_if = "Option::is_none",
        with = "scroll_id_field"
    )]
    pub scroll_anchor: Option<ScrollAnchor>,
}

impl NavigationState {
    /// State for a section with no anchor.
    #[must_use]
    pub fn section(section: Section) -> Self {
        Self {
            section,
            scroll_anchor: None,
        }
    }

    /// State for an anchor inside `section`.
    #[must_use]
    pub fn anchored(section: Section, anchor: ScrollAnchor) -> Self {
        Self {
            section,
            scroll_anchor: Some(anchor),
        }
    }

    /// Parse a history state payload. Anything that is not one of our
    /// records yields `None`.
    #[must_use]
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        // Two string fields; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

mod scroll_id_field {
    use super::ScrollAnchor;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        anchor: &Option<ScrollAnchor>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match anchor {
            Some(anchor) => serializer.serialize_str(anchor.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ScrollAnchor>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(ScrollAnchor::new))
    }
}
