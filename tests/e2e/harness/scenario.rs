use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::{ScenarioStep, ScrubPlan};
use cairn_core::Config;
use std::collections::BTreeMap;
use std::time::Duration;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    config: Config,
    initial_files: BTreeMap<String, Vec<u8>>,
    steps: Vec<ScenarioStep>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: Config::default(),
            initial_files: BTreeMap::new(),
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Repository configuration used at init
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Add a single file to initial workspace
    pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.initial_files.insert(path.to_string(), content.to_vec());
        self
    }

    // ===== Working files =====

    /// Write (or replace) a working file
    pub fn write_file(mut self, path: &str, content: &[u8]) -> Self {
        self.steps.push(ScenarioStep::WriteFile {
            path: path.to_string(),
            content: content.to_vec(),
        });
        self
    }

    /// Delete a working file
    pub fn remove_file(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::RemoveFile {
            path: path.to_string(),
        });
        self
    }

    /// Set a working file's mtime
    pub fn set_mtime(mut self, path: &str, mtime: i64) -> Self {
        self.steps.push(ScenarioStep::SetMtime {
            path: path.to_string(),
            mtime,
        });
        self
    }

    // ===== Repository operations =====

    /// Switch dry-run and force for the following steps
    pub fn options(mut self, dry_run: bool, force: bool) -> Self {
        self.steps.push(ScenarioStep::SetOptions { dry_run, force });
        self
    }

    /// Import working paths by hardlink
    pub fn import(mut self, paths: &[&str], prefix: &str) -> Self {
        self.steps.push(ScenarioStep::Import {
            paths: strings(paths),
            prefix: prefix.to_string(),
        });
        self
    }

    /// Import working paths by copy
    pub fn copy(mut self, paths: &[&str], prefix: &str) -> Self {
        self.steps.push(ScenarioStep::Copy {
            paths: strings(paths),
            prefix: prefix.to_string(),
        });
        self
    }

    /// Hardlink names under `prefix` into a workspace directory
    pub fn link(mut self, dest: &str, prefix: &str) -> Self {
        self.steps.push(ScenarioStep::Link {
            dest: dest.to_string(),
            prefix: prefix.to_string(),
        });
        self
    }

    /// Copy names under `prefix` into a workspace directory
    pub fn pull(mut self, dest: &str, prefix: &str) -> Self {
        self.steps.push(ScenarioStep::Pull {
            dest: dest.to_string(),
            prefix: prefix.to_string(),
        });
        self
    }

    /// Remove names and every alias of their content
    pub fn delete(mut self, names: &[&str]) -> Self {
        self.steps.push(ScenarioStep::Delete {
            names: strings(names),
        });
        self
    }

    /// Remove just these names
    pub fn delete_names(mut self, names: &[&str]) -> Self {
        self.steps.push(ScenarioStep::DeleteNames {
            names: strings(names),
        });
        self
    }

    /// Rename a name or directory of names
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.steps.push(ScenarioStep::Rename {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    /// Collect orphaned objects
    pub fn gc(mut self) -> Self {
        self.steps.push(ScenarioStep::Gc);
        self
    }

    /// Drop entries whose object is missing
    pub fn clean_missing(mut self) -> Self {
        self.steps.push(ScenarioStep::CleanMissing);
        self
    }

    /// Full scrub
    pub fn scrub(self) -> Self {
        self.scrub_with(ScrubPlan::default())
    }

    /// Scrub with explicit switches
    pub fn scrub_with(mut self, plan: ScrubPlan) -> Self {
        self.steps.push(ScenarioStep::Scrub { plan });
        self
    }

    /// Commit the index
    pub fn commit(mut self) -> Self {
        self.steps.push(ScenarioStep::Commit);
        self
    }

    /// Commit only if the auto-commit interval has elapsed
    pub fn auto_commit(mut self) -> Self {
        self.steps.push(ScenarioStep::AutoCommit);
        self
    }

    // ===== Object tampering =====

    /// Rewrite stored content in place without touching size or mtime
    pub fn corrupt_object(mut self, content: &[u8], replacement: &[u8]) -> Self {
        self.steps.push(ScenarioStep::CorruptObject {
            content: content.to_vec(),
            replacement: replacement.to_vec(),
        });
        self
    }

    /// Delete the object stored for `content`
    pub fn remove_object(mut self, content: &[u8]) -> Self {
        self.steps.push(ScenarioStep::RemoveObject {
            content: content.to_vec(),
        });
        self
    }

    // ===== Time control =====

    /// Advance the mock clock
    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScenarioStep::Wait { duration });
        self
    }

    /// Advance the mock clock by seconds
    pub fn wait_secs(self, secs: u64) -> Self {
        self.wait(Duration::from_secs(secs))
    }

    // ===== Failure simulation =====

    /// Drop the repository handle without committing
    pub fn crash(mut self) -> Self {
        self.steps.push(ScenarioStep::Crash);
        self
    }

    /// Reopen the repository after a crash
    pub fn restart(mut self) -> Self {
        self.steps.push(ScenarioStep::Restart);
        self
    }

    /// Leave behind temporaries of an interrupted index write
    pub fn leave_stale_temporaries(mut self) -> Self {
        self.steps.push(ScenarioStep::LeaveStaleTemporaries);
        self
    }

    // ===== Assertions =====

    /// Add a custom assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Assert `name` maps to the digest of `content`
    pub fn assert_name(self, name: &str, content: &[u8]) -> Self {
        self.assert(Assertion::NameMapsTo {
            name: name.to_string(),
            content: content.to_vec(),
        })
    }

    /// Assert `name` is not in the index
    pub fn assert_no_name(self, name: &str) -> Self {
        self.assert(Assertion::NameAbsent {
            name: name.to_string(),
        })
    }

    /// Assert the number of names in memory
    pub fn assert_name_count(self, n: usize) -> Self {
        self.assert(Assertion::NameCount(n))
    }

    /// Assert the number of names on disk
    pub fn assert_committed_name_count(self, n: usize) -> Self {
        self.assert(Assertion::CommittedNameCount(n))
    }

    /// Assert the number of stored objects
    pub fn assert_object_count(self, n: usize) -> Self {
        self.assert(Assertion::ObjectCount(n))
    }

    /// Assert the number of digests no name refers to
    pub fn assert_deleted_count(self, n: usize) -> Self {
        self.assert(Assertion::DeletedCount(n))
    }

    /// Assert a working file's bytes
    pub fn assert_file(self, path: &str, content: &[u8]) -> Self {
        self.assert(Assertion::FileContent {
            path: path.to_string(),
            content: content.to_vec(),
        })
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(self.initial_files, self.config) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {:#}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: step,
                    failure_step: Some(step),
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }
}

/// Result of scenario execution
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
