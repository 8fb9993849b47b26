#![no_main]
//! Fuzz target for the policy version and version-pattern parsers.
//!
//! Arbitrary input must either parse or fail with a structured error;
//! matching a parsed pattern against a parsed version must never panic,
//! and a version's canonical text must re-parse to an equal version.

use libfuzzer_sys::fuzz_target;
use verdict_core::policy::{PolicyVersion, VersionPattern};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(version) = PolicyVersion::parse(text) {
        let reparsed = PolicyVersion::parse(&version.to_string()).expect("canonical form reparses");
        assert_eq!(reparsed, version);
    }

    if let Ok(pattern) = VersionPattern::parse(text) {
        // Exercise the matcher with a few fixed probes.
        for probe in ["1", "1.0", "1.2.3", "0.0.0.0", "10.20.30"] {
            let probe = PolicyVersion::parse(probe).expect("fixed probe parses");
            let _ = pattern.matches(&probe);
        }
    }
});
