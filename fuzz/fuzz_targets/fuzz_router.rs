#![no_main]

//! Fuzz target for pattern parsing and path matching
//!
//! Checks that matching and extraction agree for arbitrary patterns and paths.

use arbitrary::Arbitrary;
use component_dispatcher::{RoutePattern, Segment};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    pattern: String,
    other: String,
    paths: Vec<String>,
}

fuzz_target!(|input: Input| {
    let pattern = RoutePattern::parse(&input.pattern);
    let other = RoutePattern::parse(&input.other);

    assert!(pattern.to_string().starts_with('/'));
    assert!(pattern.is_ambiguous_with(&pattern));

    // Ambiguity is symmetric
    assert_eq!(
        pattern.is_ambiguous_with(&other),
        other.is_ambiguous_with(&pattern)
    );

    for path in input.paths.iter().take(16) {
        if !pattern.matches(path) {
            continue;
        }

        let variables = pattern.extract(path);
        for segment in pattern.segments() {
            if let Segment::Variable(name) = segment {
                let value = variables.get(name);
                assert!(value.is_some(), "variable {} not extracted", name);
                assert!(!value.unwrap().is_empty());
            }
        }

        // A path matched by both patterns means they overlap
        if other.matches(path) {
            assert!(pattern.is_ambiguous_with(&other));
        }
    }
});
