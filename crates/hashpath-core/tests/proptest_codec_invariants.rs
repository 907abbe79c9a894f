//! Property-based invariant tests for the codec and the drive controller.
//!
//! 1. `to_section(to_hash(s)) == s` for every non-root-id section
//! 2. Sanitization is total and idempotent
//! 3. Arbitrary tokens decode to canonical sections
//! 4. Latest wins: rapid drives commit only the final section, once

use core::time::Duration;

use hashpath_core::{
    DriveController, HashWriteMode, HistoryMode, HostCommand, Location, PathHashCodec,
    RouterConfig, Section,
};
use proptest::prelude::*;

// ── Strategies ────────────────────

fn segment_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,6}(-[a-z0-9]{1,4}){0,2}"
}

fn section_strategy() -> impl Strategy<Value = Section> {
    prop::collection::vec(segment_strategy(), 1..4)
        .prop_map(|segments| Section::parse(&segments.join("/")))
}

fn is_canonical(section: &Section) -> bool {
    let raw = section.as_str();
    raw.is_empty()
        || raw.split('/').all(|segment| {
            !segment.is_empty()
                && !segment.starts_with('-')
                && !segment.ends_with('-')
                && !segment.contains("--")
                && segment.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        })
}

proptest! {
    #[test]
    fn codec_round_trips(section in section_strategy(), root in "[a-z]{2,8}") {
        let codec = PathHashCodec::new(Some(&root), "--");
        prop_assume!(section.as_str() != codec.root_id());
        let token = codec.to_hash(&section);
        prop_assert!(!token.contains('/'));
        prop_assert_eq!(codec.to_section(&token), section);
    }

    #[test]
    fn root_round_trips_through_root_id(root in "[a-z]{2,8}") {
        let codec = PathHashCodec::new(Some(&root), "--");
        prop_assert_eq!(codec.to_hash(&Section::root()), root);
        prop_assert!(codec.to_section(&codec.to_hash(&Section::root())).is_root());
    }

    #[test]
    fn sanitizer_is_total_and_idempotent(raw in ".{0,64}") {
        let section = Section::parse(&raw);
        prop_assert!(is_canonical(&section));
        prop_assert_eq!(Section::parse(section.as_str()), section);
    }

    #[test]
    fn arbitrary_tokens_decode_canonically(token in "#?[a-zA-Z0-9/#%_.-]{0,40}") {
        let codec = PathHashCodec::default();
        let section = codec.to_section(&token);
        prop_assert!(is_canonical(&section));
        prop_assert!(section.as_str() != codec.root_id());
    }

    #[test]
    fn latest_drive_wins(
        targets in prop::collection::vec(section_strategy(), 1..8),
        gaps in prop::collection::vec(1u64..400, 8),
    ) {
        let mut targets = targets;
        targets.dedup();
        let config = RouterConfig::default();
        let codec = PathHashCodec::default();
        let mut controller = DriveController::new(codec.clone(), "https://example.com", &config);
        controller.assume_engine_section(Some(Section::root()));
        let mut location = Location::new("/", "");
        let mut now = Duration::ZERO;
        let mut entries = 0;
        let mut history_writes = Vec::new();

        for (target, gap) in targets.iter().zip(&gaps) {
            prop_assume!(target.as_str() != codec.root_id());
            now += Duration::from_millis(*gap);
            let poll = controller.poll(now, &location);
            history_writes.extend(poll.history().cloned());

            let dispatch = controller.navigate_to_section(target.clone(), true, now, &location);
            entries += dispatch.entries_created();
            history_writes.extend(dispatch.history().cloned());
            for command in &dispatch.commands {
                if let HostCommand::WriteHash { token, mode } = command {
                    if *mode == HashWriteMode::Assign {
                        prop_assert_eq!(entries, 1);
                    }
                    location.hash = format!("#{token}");
                }
            }
        }

        now += Duration::from_millis(450);
        let done = controller.poll(now, &location);
        history_writes.extend(done.history().cloned());

        let last = targets.last().cloned().unwrap_or_default();
        prop_assert_eq!(entries, 1);
        prop_assert_eq!(history_writes.len(), 1);
        prop_assert_eq!(history_writes[0].mode, HistoryMode::Replace);
        prop_assert_eq!(&history_writes[0].url, &format!("https://example.com{}", last.pathname()));
        prop_assert_eq!(controller.current().section.clone(), last);
    }
}
