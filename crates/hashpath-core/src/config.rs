#![forbid(unsafe_code)]

//! Router tunables.
//!
//! Loaded from JSON handed over by the page (every field optional) and
//! validated before the router is built.

use core::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::ANCHOR_ATTR;
use crate::codec::{DEFAULT_JOIN, DEFAULT_ROOT_ID, is_unambiguous_join};
use crate::completion::SettleStrategy;

/// Configuration rejected by [`RouterConfig::validate`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "join sequence {0:?} is ambiguous: it must be non-empty, avoid '/' and '#', \
         and contain \"--\" or a non-segment character"
    )]
    AmbiguousJoin(String),
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("scroll quiet period ({quiet_ms} ms) exceeds the scroll cap ({max_wait_ms} ms)")]
    QuietExceedsCap { quiet_ms: u64, max_wait_ms: u64 },
    #[error("anchor attribute name must not be empty")]
    EmptyAnchorAttr,
    #[error("invalid router config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// How section drives decide the engine has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SettleConfig {
    /// Wait a fixed delay after the hash write.
    Fixed { delay_ms: u64 },
    /// Watch section elements; give up after `timeout_ms`.
    Mutation { timeout_ms: u64 },
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self::Fixed { delay_ms: 450 }
    }
}

impl SettleConfig {
    #[must_use]
    pub const fn strategy(self) -> SettleStrategy {
        match self {
            Self::Fixed { delay_ms } => SettleStrategy::FixedDelay {
                delay: Duration::from_millis(delay_ms),
            },
            Self::Mutation { timeout_ms } => SettleStrategy::MutationWatch {
                timeout: Duration::from_millis(timeout_ms),
            },
        }
    }
}

/// Tuning knobs for the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Engine join sequence for nested sections.
    pub join: String,
    /// Root section id when markup has no section element.
    pub root_fallback: String,
    pub settle: SettleConfig,
    /// Quiet period ending an anchor scroll.
    pub scroll_quiet_ms: u64,
    /// Upper bound on waiting for an anchor scroll to go quiet.
    pub scroll_max_wait_ms: u64,
    /// Scroll to the top when back/forward lands on a base section entry.
    pub scroll_top_on_section: bool,
    /// Marker attribute of scroll anchors.
    pub anchor_attr: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            join: DEFAULT_JOIN.to_owned(),
            root_fallback: DEFAULT_ROOT_ID.to_owned(),
            settle: SettleConfig::default(),
            scroll_quiet_ms: 180,
            scroll_max_wait_ms: 3000,
            scroll_top_on_section: true,
            anchor_attr: ANCHOR_ATTR.to_owned(),
        }
    }
}

impl RouterConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_unambiguous_join(&self.join) {
            return Err(ConfigError::AmbiguousJoin(self.join.clone()));
        }
        if let SettleConfig::Mutation { timeout_ms: 0 } = self.settle {
            return Err(ConfigError::ZeroDuration {
                field: "settle.timeout_ms",
            });
        }
        if self.scroll_quiet_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "scroll_quiet_ms",
            });
        }
        if self.scroll_max_wait_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "scroll_max_wait_ms",
            });
        }
        if self.scroll_quiet_ms > self.scroll_max_wait_ms {
            return Err(ConfigError::QuietExceedsCap {
                quiet_ms: self.scroll_quiet_ms,
                max_wait_ms: self.scroll_max_wait_ms,
            });
        }
        if self.anchor_attr.trim().is_empty() {
            return Err(ConfigError::EmptyAnchorAttr);
        }
        Ok(())
    }

    #[must_use]
    pub const fn scroll_quiet(&self) -> Duration {
        Duration::from_millis(self.scroll_quiet_ms)
    }

    #[must_use]
    pub const fn scroll_max_wait(&self) -> Duration {
        Duration::from_millis(self.scroll_max_wait_ms)
    }
}
