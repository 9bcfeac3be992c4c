use crate::harness::{Assertion, Scenario};
use cairn_core::{same_file, Repo};

#[test]
fn test_reimport_is_idempotent() {
    Scenario::new("reimport_is_idempotent")
        .with_file("docs/a.txt", b"alpha")
        .with_file("docs/b.txt", b"beta")
        .import(&["docs"], "")
        .assert(Assertion::ImportStored(2))
        .assert_name("docs/a.txt", b"alpha")
        .assert_name("docs/b.txt", b"beta")
        .import(&["docs"], "")
        .assert(Assertion::ImportStored(0))
        .assert(Assertion::ImportUnchanged(2))
        .assert_name_count(2)
        .assert_object_count(2)
        .assert(Assertion::LinkedToObject {
            path: "docs/a.txt".into(),
            name: "docs/a.txt".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_identical_content_stored_once() {
    Scenario::new("identical_content_stored_once")
        .with_file("x/one.txt", b"same bytes")
        .with_file("x/two.txt", b"same bytes")
        .import(&["x"], "")
        .assert(Assertion::ImportStored(1))
        .assert(Assertion::ImportDeduplicated(1))
        .assert_object_count(1)
        .assert_name_count(2)
        .assert(Assertion::LinkedToObject {
            path: "x/one.txt".into(),
            name: "x/one.txt".into(),
        })
        .assert(Assertion::LinkedToObject {
            path: "x/two.txt".into(),
            name: "x/two.txt".into(),
        })
        .assert(Assertion::Custom(Box::new(|repo: &mut Repo| -> anyhow::Result<()> {
            assert_eq!(repo.index().duplicates().len(), 1);
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_prefix_applies_to_names() {
    Scenario::new("prefix_applies_to_names")
        .with_file("holiday/beach.jpg", b"sand")
        .import(&["holiday"], "photos/2023")
        .assert_name("photos/2023/holiday/beach.jpg", b"sand")
        .assert_committed_name_count(1)
        .run()
        .unwrap();
}

#[test]
fn test_copy_leaves_source_alone() {
    Scenario::new("copy_leaves_source_alone")
        .with_file("elsewhere/c.txt", b"copied")
        .copy(&["elsewhere/c.txt"], "")
        .assert(Assertion::ImportStored(1))
        .assert_name("c.txt", b"copied")
        .assert(Assertion::Custom(Box::new(|repo: &mut Repo| -> anyhow::Result<()> {
            let source = repo.root().join("../elsewhere/c.txt");
            let digest = repo.index().get("c.txt").ok_or_else(|| anyhow::anyhow!("missing"))?;
            anyhow::ensure!(
                !same_file(&source, &repo.store().data_path(&digest)),
                "copy must not link the source"
            );
            Ok(())
        })))
        .copy(&["elsewhere/c.txt"], "")
        .assert(Assertion::ImportStored(0))
        .assert(Assertion::ImportDeduplicated(1))
        .assert_object_count(1)
        .run()
        .unwrap();
}

#[test]
fn test_name_conflict_keeps_existing_mapping() {
    Scenario::new("name_conflict_keeps_existing_mapping")
        .with_file("a.txt", b"version one")
        .import(&["a.txt"], "")
        .write_file("a.txt", b"version two")
        .import(&["a.txt"], "")
        .assert(Assertion::ImportConflicts(vec!["a.txt".into()]))
        .assert_name("a.txt", b"version one")
        .assert_object_count(1)
        .assert_deleted_count(0)
        .run()
        .unwrap();
}

#[test]
fn test_force_overwrites_name() {
    Scenario::new("force_overwrites_name")
        .with_file("a.txt", b"version one")
        .import(&["a.txt"], "")
        .write_file("a.txt", b"version two")
        .options(false, true)
        .import(&["a.txt"], "")
        .assert(Assertion::ImportConflicts(Vec::new()))
        .assert_name("a.txt", b"version two")
        .assert_deleted_count(1)
        .gc()
        .assert_object_count(1)
        .assert_deleted_count(0)
        .run()
        .unwrap();
}
