//! Go module driver: upgrades and vendors the dependencies of a `go.mod` file.

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::exec::{CommandRunner, ExecError};
use super::fs::{self, FsError};
use crate::domain::{ManifestState, UpgradeMode};

const GO_SUM: &str = "go.sum";
const VENDOR_DIR: &str = "vendor";

/// Errors that can occur when updating a Go module
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("hashing {} failed", path.display())]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("upgrading dependencies failed")]
    Upgrade(#[source] ExecError),

    #[error("downloading dependencies into the vendor directory failed")]
    Vendor(#[source] ExecError),
}

/// A dependency manifest whose dependencies can be upgraded in place.
pub trait DependencyManifest {
    /// Upgrade the dependencies and report the manifest content before and after.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or the upgrade tool fails.
    fn upgrade(&self, mode: UpgradeMode) -> Result<ManifestState, ModuleError>;

    /// Materialize a full copy of all dependencies next to the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendoring tool fails.
    fn vendor(&self) -> Result<(), ModuleError>;

    /// Files and directories owned by the dependency tool, relative to the
    /// repository root. This is exactly what gets committed.
    fn affected_files(&self) -> Vec<PathBuf>;
}

/// A Go module inside a working copy.
pub struct GoModule<R> {
    runner: R,
    /// Absolute path of the `go.mod` file.
    manifest: PathBuf,
    /// `go.mod` path relative to the repository root.
    relative_manifest: PathBuf,
    vendored: bool,
}

impl<R: CommandRunner> GoModule<R> {
    /// `relative_manifest` is the `go.mod` path inside `repo_dir`. When
    /// `vendored` is set the vendor directory belongs to the module's files.
    #[must_use]
    pub fn new(runner: R, repo_dir: &Path, relative_manifest: &Path, vendored: bool) -> Self {
        Self {
            runner,
            manifest: repo_dir.join(relative_manifest),
            relative_manifest: relative_manifest.to_path_buf(),
            vendored,
        }
    }

    fn module_dir(&self) -> &Path {
        self.manifest.parent().unwrap_or_else(|| Path::new("/"))
    }

    fn fingerprint(&self) -> Result<crate::domain::Fingerprint, ModuleError> {
        fs::fingerprint(&self.manifest).map_err(|source| ModuleError::Fingerprint {
            path: self.manifest.clone(),
            source,
        })
    }
}

/// `go get` invocation for `mode`.
#[must_use]
pub fn upgrade_command(mode: UpgradeMode) -> &'static str {
    match mode {
        UpgradeMode::Full => "go get -u",
        UpgradeMode::PatchOnly => "go get -u=patch",
    }
}

impl<R: CommandRunner> DependencyManifest for GoModule<R> {
    fn upgrade(&self, mode: UpgradeMode) -> Result<ManifestState, ModuleError> {
        let before = self.fingerprint()?;

        self.runner
            .run(Some(self.module_dir()), upgrade_command(mode))
            .map_err(ModuleError::Upgrade)?;

        let after = self.fingerprint()?;

        Ok(ManifestState {
            path: self.relative_manifest.clone(),
            before,
            after,
        })
    }

    fn vendor(&self) -> Result<(), ModuleError> {
        self.runner
            .run(Some(self.module_dir()), "go mod vendor")
            .map_err(ModuleError::Vendor)?;
        Ok(())
    }

    fn affected_files(&self) -> Vec<PathBuf> {
        let dir = self.relative_manifest.parent().unwrap_or_else(|| Path::new(""));
        let mut files = vec![self.relative_manifest.clone(), dir.join(GO_SUM)];
        if self.vendored {
            files.push(dir.join(VENDOR_DIR));
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use std::fs as stdfs;

    fn module_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("go.mod"), "module example.com/m\n").unwrap();
        dir
    }

    #[test]
    fn upgrade_reports_unchanged_manifest() {
        let repo = module_repo();
        let runner = FakeRunner::new();
        let module = GoModule::new(&runner, repo.path(), Path::new("go.mod"), false);

        let state = module.upgrade(UpgradeMode::Full).unwrap();

        assert!(!state.changed());
        assert_eq!(state.path, PathBuf::from("go.mod"));
    }

    #[test]
    fn upgrade_reports_changed_manifest() {
        let repo = module_repo();
        let runner = FakeRunner::new().on("go get", |dir| {
            stdfs::write(
                dir.join("go.mod"),
                "module example.com/m\n\nrequire example.com/dep v1.0.1\n",
            )
            .unwrap();
            Ok(String::new())
        });
        let module = GoModule::new(&runner, repo.path(), Path::new("go.mod"), false);

        assert!(module.upgrade(UpgradeMode::PatchOnly).unwrap().changed());
    }

    #[test]
    fn upgrade_mode_selects_go_get_flag() {
        let repo = module_repo();
        let runner = FakeRunner::new();
        let module = GoModule::new(&runner, repo.path(), Path::new("go.mod"), false);

        module.upgrade(UpgradeMode::Full).unwrap();
        module.upgrade(UpgradeMode::PatchOnly).unwrap();

        assert_eq!(runner.commands(), vec!["go get -u", "go get -u=patch"]);
    }

    #[test]
    fn commands_run_in_module_directory() {
        let repo = tempfile::tempdir().unwrap();
        stdfs::create_dir(repo.path().join("sub")).unwrap();
        stdfs::write(repo.path().join("sub/go.mod"), "module m\n").unwrap();
        let runner = FakeRunner::new();
        let module = GoModule::new(&runner, repo.path(), Path::new("sub/go.mod"), true);

        module.upgrade(UpgradeMode::Full).unwrap();
        module.vendor().unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.dir == repo.path().join("sub")));
        assert_eq!(calls[1].command, "go mod vendor");
    }

    #[test]
    fn upgrade_of_missing_manifest_runs_nothing() {
        let repo = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new();
        let module = GoModule::new(&runner, repo.path(), Path::new("go.mod"), false);

        let err = module.upgrade(UpgradeMode::Full).unwrap_err();

        assert!(matches!(err, ModuleError::Fingerprint { .. }));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn failing_go_get_is_an_upgrade_error() {
        let repo = module_repo();
        let runner = FakeRunner::new().fail_on("go get", 1);
        let module = GoModule::new(&runner, repo.path(), Path::new("go.mod"), false);

        let err = module.upgrade(UpgradeMode::Full).unwrap_err();
        assert!(matches!(err, ModuleError::Upgrade(ExecError::Exit { code: 1, .. })));
    }

    #[test]
    fn affected_files_include_vendor_only_when_vendored() {
        let runner = FakeRunner::new();
        let plain = GoModule::new(&runner, Path::new("/repo"), Path::new("go.mod"), false);
        let vendored = GoModule::new(&runner, Path::new("/repo"), Path::new("go.mod"), true);

        assert_eq!(
            plain.affected_files(),
            vec![PathBuf::from("go.mod"), PathBuf::from("go.sum")]
        );
        assert_eq!(
            vendored.affected_files(),
            vec![
                PathBuf::from("go.mod"),
                PathBuf::from("go.sum"),
                PathBuf::from("vendor")
            ]
        );
    }

    #[test]
    fn affected_files_are_relative_to_repository_root() {
        let runner = FakeRunner::new();
        let module = GoModule::new(&runner, Path::new("/repo"), Path::new("svc/go.mod"), true);

        assert_eq!(
            module.affected_files(),
            vec![
                PathBuf::from("svc/go.mod"),
                PathBuf::from("svc/go.sum"),
                PathBuf::from("svc/vendor")
            ]
        );
    }
}
