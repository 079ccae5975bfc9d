use std::path::{Path, PathBuf};

use super::UpgradeMode;

/// One repository the bot keeps up to date, resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub owner: String,
    pub repository: String,
    /// Branch that is updated and that pull requests are opened against.
    pub branch: String,
    /// Location of the local working copy.
    pub local_dir: PathBuf,
    /// Manifest path relative to the repository root.
    pub manifest_path: PathBuf,
    /// Download dependencies into the vendor directory after an update.
    pub vendor: bool,
    /// Allow minor version upgrades instead of patch upgrades only.
    pub minor_update: bool,
}

impl RepositoryTarget {
    /// Short name used as prefix of log lines.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub fn upgrade_mode(&self) -> UpgradeMode {
        UpgradeMode::from_minor_update_allowed(self.minor_update)
    }

    /// Absolute location of the manifest inside the working copy.
    #[must_use]
    pub fn manifest_location(&self) -> PathBuf {
        self.local_dir.join(&self.manifest_path)
    }

    /// Directory the local working copy of `owner/repository` lives in.
    #[must_use]
    pub fn local_dir_for(base_dir: &Path, owner: &str, repository: &str) -> PathBuf {
        base_dir.join(owner).join(repository)
    }
}
