use crate::harness::steps::ScrubPlan;
use crate::harness::{Assertion, Scenario};

#[test]
fn test_scrub_clean_repository() {
    Scenario::new("scrub_clean_repository")
        .with_file("d/1", b"one")
        .with_file("d/2", b"two")
        .import(&["d"], "")
        .scrub()
        .assert(Assertion::ScrubChecked(2))
        .assert(Assertion::ScrubClean)
        .assert(Assertion::ScrubLogLines(0))
        .run()
        .unwrap();
}

#[test]
fn test_scrub_detects_rewrite_with_same_mtime() {
    Scenario::new("scrub_detects_rewrite_with_same_mtime")
        .with_file("a.bin", b"original")
        .import(&["a.bin"], "")
        .corrupt_object(b"original", b"tampered")
        // Presence and size still check out
        .scrub_with(ScrubPlan {
            fast: true,
            ..ScrubPlan::default()
        })
        .assert(Assertion::ScrubClean)
        .scrub()
        .assert(Assertion::ScrubChecksumErrors(1))
        .assert(Assertion::ScrubLogLines(1))
        .run()
        .unwrap();
}

#[test]
fn test_scrub_resume_skips_earlier_digests() {
    Scenario::new("scrub_resume_skips_earlier_digests")
        .with_file("d/a", b"first")
        .with_file("d/b", b"second")
        .with_file("d/c", b"third")
        .with_file("d/e", b"fourth")
        .import(&["d"], "")
        .scrub_with(ScrubPlan {
            resume_at: Some(2),
            ..ScrubPlan::default()
        })
        .assert(Assertion::ScrubSkipped(2))
        .assert(Assertion::ScrubChecked(2))
        .assert(Assertion::ScrubClean)
        .run()
        .unwrap();
}

#[test]
fn test_missing_object_found_and_cleaned() {
    Scenario::new("missing_object_found_and_cleaned")
        .with_file("a.txt", b"stays")
        .with_file("b.txt", b"vanishes")
        .import(&["a.txt", "b.txt"], "")
        .remove_file("b.txt")
        .remove_object(b"vanishes")
        .scrub()
        .assert(Assertion::ScrubMissing(1))
        .assert(Assertion::ScrubLogLines(1))
        .clean_missing()
        .commit()
        .assert_no_name("b.txt")
        .assert_committed_name_count(1)
        .scrub()
        .assert(Assertion::ScrubClean)
        // The log is append-only
        .assert(Assertion::ScrubLogLines(1))
        .run()
        .unwrap();
}
