#![forbid(unsafe_code)]

//! Bidirectional mapping between canonical sections and engine hash tokens.
//!
//! The engine addresses sections by element id, joining nested path segments
//! with a two-character sequence (`about/team` ↔ `about--team`). The root
//! section has no path, so it maps to whatever id the engine's first section
//! carries; that id is discovered once from markup at startup.

use crate::section::{Section, is_segment_char};

/// Default engine join sequence for nested sections.
pub const DEFAULT_JOIN: &str = "--";

/// Root id used when markup exposes no section element.
pub const DEFAULT_ROOT_ID: &str = "home";

/// Selectors tried, in order, to discover the engine's first section.
pub const ROOT_SECTION_SELECTORS: [&str; 3] =
    ["#main section[id]", "main section[id]", "section[id]"];

/// Whether `join` can be told apart from the inside of a canonical segment.
///
/// Canonical segments never contain `--` and only use `[A-Za-z0-9-]`, so a
/// join is unambiguous when it carries a `--` run or any other character.
#[must_use]
pub fn is_unambiguous_join(join: &str) -> bool {
    !join.is_empty()
        && !join.contains(['/', '#'])
        && (join.contains("--") || join.chars().any(|ch| !is_segment_char(ch)))
}

/// Percent-decode a URL path component. Malformed escapes are kept as-is.
fn percent_decode(raw: &str) -> String {
    fn hex(byte: u8) -> Option<u8> {
        match byte {
            b'0'..=b'9' => Some(byte - b'0'),
            b'a'..=b'f' => Some(byte - b'a' + 10),
            b'A'..=b'F' => Some(byte - b'A' + 10),
            _ => None,
        }
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' && idx + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[idx + 1]), hex(bytes[idx + 2])) {
                out.push((hi << 4) | lo);
                idx += 3;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Pure, total mapping between [`Section`] values and engine hash tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHashCodec {
    root_id: String,
    join: String,
}

impl Default for PathHashCodec {
    fn default() -> Self {
        Self::new(None, DEFAULT_JOIN)
    }
}

impl PathHashCodec {
    /// Build a codec from the discovered root id (if any) and a join
    /// sequence. An empty or missing root id falls back to
    /// [`DEFAULT_ROOT_ID`].
    #[must_use]
    pub fn new(root_id: Option<&str>, join: &str) -> Self {
        let root_id = root_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_ROOT_ID);
        Self {
            root_id: root_id.to_owned(),
            join: join.to_owned(),
        }
    }

    /// Engine id of the root section.
    #[must_use]
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    #[must_use]
    pub fn join(&self) -> &str {
        &self.join
    }

    /// Engine hash token (without `#`) for `section`.
    #[must_use]
    pub fn to_hash(&self, section: &Section) -> String {
        if section.is_root() {
            return self.root_id.clone();
        }
        section.segments().collect::<Vec<_>>().join(&self.join)
    }

    /// Engine fragment (with `#`) for `section`.
    #[must_use]
    pub fn to_fragment(&self, section: &Section) -> String {
        format!("#{}", self.to_hash(section))
    }

    /// Section addressed by an engine token or fragment.
    ///
    /// The empty token and the root id both address the root section;
    /// anything else is split on the join sequence and sanitized.
    #[must_use]
    pub fn to_section(&self, token: &str) -> Section {
        let token = token.strip_prefix('#').unwrap_or(token);
        if token.is_empty() || token == self.root_id {
            return Section::root();
        }
        let section = if self.join.is_empty() {
            Section::parse(token)
        } else {
            Section::parse(&token.replace(&self.join, "/"))
        };
        self.canonical(section)
    }

    /// Section addressed by a visible pathname (percent-decoded, leading
    /// slashes ignored).
    #[must_use]
    pub fn section_from_path(&self, pathname: &str) -> Section {
        let decoded = percent_decode(pathname);
        self.canonical(Section::parse(decoded.trim_start_matches('/')))
    }

    /// Fold the root id spelled as a path back onto the root section.
    #[must_use]
    pub fn canonical(&self, section: Section) -> Section {
        if section.as_str() == self.root_id {
            Section::root()
        } else {
            section
        }
    }
}
