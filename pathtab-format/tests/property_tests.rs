//! Property-based tests for pathtab format primitives

use pathtab_format::path_key::{join_index, join_property};
use pathtab_format::{PathKey, PathStep, SegmentIndex, DEFAULT_SEPARATOR};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Name(String),
    Index(usize),
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    let step = prop_oneof![
        3 => "[a-zA-Z0-9_. \"\\[\\]-]{0,8}".prop_map(Step::Name),
        1 => (0usize..50).prop_map(Step::Index),
    ];
    ("[a-z]{1,6}", prop::collection::vec(step, 0..6)).prop_map(|(first, rest)| {
        let mut all = vec![Step::Name(first)];
        all.extend(rest);
        all
    })
}

proptest! {
    #[test]
    fn joined_keys_parse_back_to_their_steps(path in steps()) {
        let mut key = String::new();
        for step in &path {
            key = match step {
                Step::Name(name) => join_property(&key, name, DEFAULT_SEPARATOR),
                Step::Index(index) => join_index(&key, *index, true),
            };
        }

        let parsed = PathKey::parse(&key, DEFAULT_SEPARATOR).expect("joined key parses");
        let expected: Vec<PathStep> = path
            .iter()
            .map(|step| match step {
                Step::Name(name) => PathStep::Key(name.clone()),
                Step::Index(index) => PathStep::Index(SegmentIndex::Position(*index)),
            })
            .collect();
        prop_assert_eq!(parsed.steps(), expected);
    }

    #[test]
    fn display_reparses_identically(path in steps()) {
        let mut key = String::new();
        for step in &path {
            key = match step {
                Step::Name(name) => join_property(&key, name, DEFAULT_SEPARATOR),
                Step::Index(index) => join_index(&key, *index, true),
            };
        }
        let parsed = PathKey::parse(&key, DEFAULT_SEPARATOR).expect("joined key parses");
        let reparsed = PathKey::parse(&parsed.to_string(), DEFAULT_SEPARATOR).expect("display parses");
        prop_assert_eq!(parsed, reparsed);
    }
}
