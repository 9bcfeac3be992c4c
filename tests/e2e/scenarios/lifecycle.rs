use crate::harness::{Assertion, Scenario};
use cairn_core::{MoveOutcome, Repo};

#[test]
fn test_deleted_content_collected_by_gc() {
    Scenario::new("deleted_content_collected_by_gc")
        .with_file("keep.txt", b"keep")
        .with_file("drop.txt", b"drop")
        .import(&["keep.txt", "drop.txt"], "")
        .remove_file("drop.txt")
        .delete_names(&["drop.txt"])
        .assert_deleted_count(1)
        .assert_object_count(2)
        .gc()
        .commit()
        .assert_object_count(1)
        .assert_deleted_count(0)
        .assert_committed_name_count(1)
        .run()
        .unwrap();
}

#[test]
fn test_gc_without_explicit_commit_survives_crash() {
    Scenario::new("gc_without_explicit_commit_survives_crash")
        .with_file("keep.txt", b"keep")
        .with_file("drop.txt", b"drop")
        .import(&["keep.txt", "drop.txt"], "")
        .delete(&["drop.txt"])
        .gc()
        .crash()
        .restart()
        .assert_no_name("drop.txt")
        .assert_name("keep.txt", b"keep")
        .assert_committed_name_count(1)
        .assert_object_count(1)
        .assert_deleted_count(0)
        .run()
        .unwrap();
}

#[test]
fn test_delete_removes_every_alias() {
    Scenario::new("delete_removes_every_alias")
        .with_file("a/song.mp3", b"tune")
        .with_file("b/copy.mp3", b"tune")
        .with_file("b/other.mp3", b"other tune")
        .import(&["a", "b"], "")
        .assert_name_count(3)
        .delete(&["a/song.mp3"])
        .assert_no_name("b/copy.mp3")
        .assert_name("b/other.mp3", b"other tune")
        .assert_deleted_count(1)
        .run()
        .unwrap();
}

#[test]
fn test_rename_directory() {
    Scenario::new("rename_directory")
        .with_file("album/01.ogg", b"first")
        .with_file("album/02.ogg", b"second")
        .import(&["album"], "")
        .rename("album", "2023/album")
        .commit()
        .assert_name("2023/album/01.ogg", b"first")
        .assert_name("2023/album/02.ogg", b"second")
        .assert_no_name("album/01.ogg")
        .assert_committed_name_count(2)
        .run()
        .unwrap();
}

#[test]
fn test_rename_onto_other_content_is_refused() {
    Scenario::new("rename_onto_other_content_is_refused")
        .with_file("x.txt", b"x")
        .with_file("y.txt", b"y")
        .import(&["x.txt", "y.txt"], "")
        .assert(Assertion::Custom(Box::new(|repo: &mut Repo| -> anyhow::Result<()> {
            assert_eq!(repo.rename("x.txt", "y.txt")?, MoveOutcome::Collision);
            Ok(())
        })))
        .assert_name("x.txt", b"x")
        .assert_name("y.txt", b"y")
        .run()
        .unwrap();
}

#[test]
fn test_dry_run_changes_nothing() {
    Scenario::new("dry_run_changes_nothing")
        .with_file("a.txt", b"a")
        .with_file("b.txt", b"b")
        .import(&["b.txt"], "")
        .options(true, false)
        .import(&["a.txt"], "")
        .assert(Assertion::ImportStored(1))
        .assert_object_count(1)
        .assert_committed_name_count(1)
        .delete_names(&["b.txt"])
        .gc()
        .commit()
        .assert_object_count(1)
        .assert_committed_name_count(1)
        .run()
        .unwrap();
}
