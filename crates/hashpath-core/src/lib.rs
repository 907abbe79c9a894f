#![forbid(unsafe_code)]

//! `hashpath-core` keeps clean path URLs in sync with a hash-driven section
//! engine that offers no API of its own.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedding environment (JS) forwards browser
//!   events and executes the returned [`HostCommand`]s.
//! - **Deterministic time**: every entry point takes the host's monotonic
//!   clock; the host schedules a single timer from
//!   [`EventRouter::next_deadline`].
//! - **No DOM access**: markup is queried through [`AnchorLookup`] and
//!   geometry arrives as plain numbers, so the whole pipeline runs natively
//!   under `cargo test`.
//!
//! Pipeline: [`EventRouter`] classifies a target, [`DriveController`] moves
//! the engine through its hash, [`CompletionDetector`] infers when the engine
//! settled, and [`HistoryWriter`] commits `origin + "/" + section[#anchor]`.

pub mod classify;
pub mod clock;
pub mod codec;
pub mod completion;
pub mod config;
pub mod controller;
pub mod history;
pub mod router;
pub mod scroll;
pub mod section;

pub use classify::{AnchorLookup, AnchorMarkup, ScrollBehavior, ScrollPrefs, Target, classify};
pub use clock::{DeterministicClock, RouterClock};
pub use codec::PathHashCodec;
pub use completion::{CompletionCause, CompletionDetector, SettleStrategy, Watch};
pub use config::{ConfigError, RouterConfig, SettleConfig};
pub use controller::{
    Dispatch, DriveController, DriveIgnoredReason, DriveLogEntry, DriveOperation, DriveOutcome,
    DrivePhase, DriveState, HashWriteMode, HostCommand, SectionRequest,
};
pub use history::{HistoryCommand, HistoryMode, HistoryWriter, Location};
pub use router::{ClickDisposition, ClickInput, ClickOutcome, EventRouter};
pub use scroll::{AnchorBox, ScrollGeometry, ScrollPlan};
pub use section::{NavigationState, ScrollAnchor, Section};
