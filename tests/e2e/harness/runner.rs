use super::assertions::Assertion;
use super::clock::MockClock;
use super::steps::{ScenarioStep, ScrubPlan};
use super::workspace::TestWorkspace;
use anyhow::{anyhow, bail, ensure, Context, Result};
use cairn_core::{
    same_file, Config, Digest, ImportReport, MaterializeReport, Options, Repo, ScrubOptions,
    ScrubReport, WriteAccess, INDEX_FILE, META_FILE,
};
use filetime::FileTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Executes scenarios against a real repository
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    repo: Option<Repo>,
    clock: MockClock,
    options: Options,
    crashed: bool,
    current_step: usize,
    last_import: Option<ImportReport>,
    last_materialize: Option<MaterializeReport>,
    last_scrub: Option<ScrubReport>,
}

impl ScenarioRunner {
    /// Create a new runner with initial files and a freshly initialized repository
    pub fn new(initial_files: BTreeMap<String, Vec<u8>>, config: Config) -> Result<Self> {
        let workspace = TestWorkspace::with_files(initial_files)?;
        let clock = MockClock::new();
        let repo = workspace
            .init_repo(config)?
            .with_time_provider(clock.as_provider());

        Ok(Self {
            workspace,
            repo: Some(repo),
            clock,
            options: Options::default(),
            crashed: false,
            current_step: 0,
            last_import: None,
            last_materialize: None,
            last_scrub: None,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::WriteFile { path, content } => self.workspace.write_file(path, content),
            ScenarioStep::RemoveFile { path } => {
                fs::remove_file(self.workspace.join(path)).with_context(|| format!("remove {}", path))
            }
            ScenarioStep::SetMtime { path, mtime } => {
                filetime::set_file_mtime(self.workspace.join(path), FileTime::from_unix_time(*mtime, 0))
                    .with_context(|| format!("set mtime of {}", path))
            }

            ScenarioStep::SetOptions { dry_run, force } => self.handle_set_options(*dry_run, *force),
            ScenarioStep::Import { paths, prefix } => self.handle_import(paths, prefix, false),
            ScenarioStep::Copy { paths, prefix } => self.handle_import(paths, prefix, true),
            ScenarioStep::Link { dest, prefix } => self.handle_materialize(dest, prefix, false),
            ScenarioStep::Pull { dest, prefix } => self.handle_materialize(dest, prefix, true),
            ScenarioStep::Delete { names } => {
                self.repo_mut()?.delete(names);
                Ok(())
            }
            ScenarioStep::DeleteNames { names } => {
                self.repo_mut()?.delete_names(names);
                Ok(())
            }
            ScenarioStep::Rename { from, to } => {
                self.repo_mut()?.rename(from, to)?;
                Ok(())
            }
            ScenarioStep::Gc => {
                self.repo_mut()?.gc(None)?;
                Ok(())
            }
            ScenarioStep::CleanMissing => {
                self.repo_mut()?.clean_missing()?;
                Ok(())
            }
            ScenarioStep::Scrub { plan } => self.handle_scrub(plan),
            ScenarioStep::Commit => {
                self.repo_mut()?.commit()?;
                Ok(())
            }
            ScenarioStep::AutoCommit => {
                self.repo_mut()?.index_mut().auto_commit()?;
                Ok(())
            }

            ScenarioStep::CorruptObject {
                content,
                replacement,
            } => self.handle_corrupt(content, replacement),
            ScenarioStep::RemoveObject { content } => {
                let path = self.repo()?.store().data_path(&Digest::of_bytes(content));
                fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))
            }

            ScenarioStep::Wait { duration } => self.handle_wait(*duration),

            ScenarioStep::Crash => self.handle_crash(),
            ScenarioStep::Restart => self.handle_restart(),
            ScenarioStep::LeaveStaleTemporaries => self.handle_stale_temporaries(),

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn repo(&self) -> Result<&Repo> {
        self.repo.as_ref().ok_or_else(|| anyhow!("Repository not open"))
    }

    fn repo_mut(&mut self) -> Result<&mut Repo> {
        self.repo.as_mut().ok_or_else(|| anyhow!("Repository not open"))
    }

    fn paths(&self, paths: &[String]) -> Vec<PathBuf> {
        paths.iter().map(|p| self.workspace.join(p)).collect()
    }

    // ===== Repository operations =====

    fn handle_set_options(&mut self, dry_run: bool, force: bool) -> Result<()> {
        self.options = Options { dry_run, force };
        let repo = self.repo.take().ok_or_else(|| anyhow!("Repository not open"))?;
        self.repo = Some(repo.with_options(self.options));
        Ok(())
    }

    fn handle_import(&mut self, paths: &[String], prefix: &str, copy: bool) -> Result<()> {
        let paths = self.paths(paths);
        let repo = self.repo_mut()?;
        let report = if copy {
            repo.copy(&paths, prefix, None)?
        } else {
            repo.import(&paths, prefix, None)?
        };
        ensure!(report.errors.is_empty(), "import errors: {:?}", report.errors);
        self.last_import = Some(report);
        Ok(())
    }

    fn handle_materialize(&mut self, dest: &str, prefix: &str, copy: bool) -> Result<()> {
        let dest = self.workspace.join(dest);
        let repo = self.repo()?;
        let report = if copy {
            repo.pull(&dest, prefix, None)?
        } else {
            repo.link(&dest, prefix, None)?
        };
        ensure!(report.errors.is_empty(), "materialize errors: {:?}", report.errors);
        self.last_materialize = Some(report);
        Ok(())
    }

    fn handle_scrub(&mut self, plan: &ScrubPlan) -> Result<()> {
        let repo = self.repo()?;
        let resume_from = match plan.resume_at {
            Some(n) => Some(
                *repo
                    .index()
                    .meta()
                    .keys()
                    .nth(n)
                    .ok_or_else(|| anyhow!("no digest at position {}", n))?,
            ),
            None => None,
        };
        let options = ScrubOptions {
            fast: plan.fast,
            modified_only: plan.modified_only,
            resume_from,
            ..ScrubOptions::default()
        };
        self.last_scrub = Some(repo.scrub(&options, None)?);
        Ok(())
    }

    // ===== Object tampering =====

    fn handle_corrupt(&mut self, content: &[u8], replacement: &[u8]) -> Result<()> {
        ensure!(
            content.len() == replacement.len(),
            "replacement must keep the object size"
        );
        let path = self.repo()?.store().data_path(&Digest::of_bytes(content));
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&path)?);
        {
            let _access = WriteAccess::grant(&path)?;
            fs::write(&path, replacement)?;
        }
        filetime::set_file_mtime(&path, mtime)?;
        Ok(())
    }

    // ===== Time control =====

    fn handle_wait(&mut self, duration: Duration) -> Result<()> {
        self.clock.advance(duration);
        Ok(())
    }

    // ===== Failure simulation =====

    fn handle_crash(&mut self) -> Result<()> {
        // Drop without committing
        self.repo = None;
        self.crashed = true;
        Ok(())
    }

    fn handle_restart(&mut self) -> Result<()> {
        if !self.crashed {
            bail!("Cannot restart - not crashed");
        }

        let repo = self
            .workspace
            .open_repo()?
            .with_options(self.options)
            .with_time_provider(self.clock.as_provider());

        self.repo = Some(repo);
        self.crashed = false;
        Ok(())
    }

    fn handle_stale_temporaries(&mut self) -> Result<()> {
        let root = self.workspace.repo_path();
        for file in [INDEX_FILE, META_FILE] {
            let tmp = root.join(file).with_extension("tmp");
            fs::write(&tmp, "half-written garbage without a digest\n")?;
        }
        Ok(())
    }

    // ===== Assertions =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::NameMapsTo { name, content } => {
                let expected = Digest::of_bytes(content);
                match self.repo()?.index().get(name) {
                    Some(actual) if actual == expected => Ok(()),
                    Some(actual) => bail!("{} maps to {}, expected {}", name, actual, expected),
                    None => bail!("{} is not in the index", name),
                }
            }
            Assertion::NameAbsent { name } => {
                if let Some(digest) = self.repo()?.index().get(name) {
                    bail!("{} unexpectedly maps to {}", name, digest);
                }
                Ok(())
            }
            Assertion::NameCount(n) => {
                let actual = self.repo()?.index().names().len();
                ensure!(actual == *n, "expected {} names, found {}", n, actual);
                Ok(())
            }
            Assertion::CommittedNameCount(n) => {
                let actual = self.workspace.open_repo()?.index().names().len();
                ensure!(actual == *n, "expected {} committed names, found {}", n, actual);
                Ok(())
            }
            Assertion::IndexDirty(expected) => {
                let actual = self.repo()?.index().is_dirty();
                ensure!(actual == *expected, "index dirty = {}, expected {}", actual, expected);
                Ok(())
            }
            Assertion::ObjectCount(n) => {
                let actual = self.repo()?.store().list_digests()?.len();
                ensure!(actual == *n, "expected {} objects, found {}", n, actual);
                Ok(())
            }
            Assertion::DeletedCount(n) => {
                let actual = self.repo()?.index().deleted().count();
                ensure!(actual == *n, "expected {} unnamed digests, found {}", n, actual);
                Ok(())
            }
            Assertion::LinkedToObject { path, name } => {
                let repo = self.repo()?;
                let digest = repo
                    .index()
                    .get(name)
                    .ok_or_else(|| anyhow!("{} is not in the index", name))?;
                let object = repo.store().data_path(&digest);
                ensure!(
                    same_file(&self.workspace.join(path), &object),
                    "{} is not a hardlink to the object of {}",
                    path,
                    name
                );
                Ok(())
            }
            Assertion::FileContent { path, content } => {
                let actual = self.workspace.read_file(path)?;
                ensure!(actual == *content, "unexpected content in {}", path);
                Ok(())
            }
            Assertion::FileAbsent { path } => {
                ensure!(!self.workspace.file_exists(path), "{} exists", path);
                Ok(())
            }
            Assertion::ImportStored(n) => self.check_import(*n, |r| r.stored, "stored"),
            Assertion::ImportDeduplicated(n) => {
                self.check_import(*n, |r| r.deduplicated, "deduplicated")
            }
            Assertion::ImportUnchanged(n) => self.check_import(*n, |r| r.unchanged, "unchanged"),
            Assertion::ImportConflicts(expected) => {
                let report = self.last_import.as_ref().ok_or_else(|| anyhow!("No import ran"))?;
                ensure!(
                    report.conflicts == *expected,
                    "conflicts {:?}, expected {:?}",
                    report.conflicts,
                    expected
                );
                Ok(())
            }
            Assertion::MaterializeCreated(n) => self.check_materialize(*n, |r| r.created, "created"),
            Assertion::MaterializeExisting(n) => {
                self.check_materialize(*n, |r| r.existing, "existing")
            }
            Assertion::ScrubChecked(n) => self.check_scrub(*n, |r| r.checked, "checked"),
            Assertion::ScrubSkipped(n) => self.check_scrub(*n, |r| r.skipped, "skipped"),
            Assertion::ScrubClean => {
                let report = self.last_scrub.as_ref().ok_or_else(|| anyhow!("No scrub ran"))?;
                ensure!(!report.has_issues(), "scrub found issues: {}", report.summary());
                Ok(())
            }
            Assertion::ScrubMissing(n) => self.check_scrub(*n, |r| r.missing(), "missing"),
            Assertion::ScrubChecksumErrors(n) => {
                self.check_scrub(*n, |r| r.checksum_errors(), "checksum errors")
            }
            Assertion::ScrubLogLines(n) => {
                let repo = self.repo()?;
                let log = repo.root().join(&repo.config().scrub.error_log);
                let actual = match fs::read_to_string(&log) {
                    Ok(text) => text.lines().count(),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                    Err(e) => return Err(e.into()),
                };
                ensure!(actual == *n, "expected {} scrub log lines, found {}", n, actual);
                Ok(())
            }
            Assertion::Custom(f) => f(self.repo_mut()?),
        }
    }

    fn check_import(&self, expected: usize, field: fn(&ImportReport) -> usize, what: &str) -> Result<()> {
        let report = self.last_import.as_ref().ok_or_else(|| anyhow!("No import ran"))?;
        let actual = field(report);
        ensure!(actual == expected, "import {}: {}, expected {}", what, actual, expected);
        Ok(())
    }

    fn check_materialize(
        &self,
        expected: usize,
        field: fn(&MaterializeReport) -> usize,
        what: &str,
    ) -> Result<()> {
        let report = self
            .last_materialize
            .as_ref()
            .ok_or_else(|| anyhow!("No link or pull ran"))?;
        let actual = field(report);
        ensure!(actual == expected, "materialize {}: {}, expected {}", what, actual, expected);
        Ok(())
    }

    fn check_scrub(&self, expected: usize, field: fn(&ScrubReport) -> usize, what: &str) -> Result<()> {
        let report = self.last_scrub.as_ref().ok_or_else(|| anyhow!("No scrub ran"))?;
        let actual = field(report);
        ensure!(actual == expected, "scrub {}: {}, expected {}", what, actual, expected);
        Ok(())
    }
}
