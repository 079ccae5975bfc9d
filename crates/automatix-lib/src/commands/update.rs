use log::{error, info};
use std::path::PathBuf;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::{
    NewPullRequest, PullRequest, PullRequestError, PullRequestGateway, RepositoryTarget,
};
use crate::error::display_chain;
use crate::infrastructure::{
    CommandRunner, DependencyManifest, GitError, GoModule, ModuleError, WorkingCopy, fs,
};

// Literal so it can be used in `concat!`.
macro_rules! tool_name {
    () => {
        "Automatix"
    };
}

/// Name of the bot, prefix of the branches it pushes.
pub const TOOL_NAME: &str = tool_name!();

/// Title of every pull request opened by the bot, also used to find them again.
pub const PULL_REQUEST_TITLE: &str = concat!("Go Module Update by ", tool_name!());

/// Message of the dependency commit, also the body of the pull request.
pub const COMMIT_MESSAGE: &str = concat!(
    "go: update vendor libraries\nUpdate was done by ",
    tool_name!(),
    " (",
    env!("CARGO_PKG_HOMEPAGE"),
    ")"
);

/// Errors that can occur while updating one repository
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("finding open pull request failed")]
    FindPullRequest(#[source] PullRequestError),

    #[error("fetching newest ref of branch {branch:?} failed")]
    Sync {
        branch: String,
        #[source]
        source: GitError,
    },

    #[error("manifest file {} does not exist in repository", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("updating dependencies failed")]
    Upgrade(#[source] ModuleError),

    #[error("vendoring dependencies failed")]
    Vendor(#[source] ModuleError),

    #[error("creating git branch {branch:?} failed")]
    CreateBranch {
        branch: String,
        #[source]
        source: GitError,
    },

    #[error("committing dependency changes failed")]
    Commit(#[source] GitError),

    #[error("pushing git branch {branch:?} failed")]
    Push {
        branch: String,
        #[source]
        source: GitError,
    },

    #[error("creating pull request failed")]
    CreatePullRequest(#[source] PullRequestError),
}

/// How an update of a repository ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A pull request from an earlier run is still open, nothing was done.
    AlreadyPending(PullRequest),
    /// The upgrade left the manifest untouched.
    UpToDate,
    /// A branch was pushed and this pull request opened.
    Published(PullRequest),
}

/// Name of the branch a run started at `unix_ts` pushes its changes to.
#[must_use]
pub fn branch_name(unix_ts: i64) -> String {
    format!("{TOOL_NAME}-{unix_ts}")
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Runs the update workflow for single repositories.
pub struct Updater<G, R> {
    gateway: G,
    runner: R,
    token: String,
    clock: fn() -> i64,
}

impl<G: PullRequestGateway, R: CommandRunner> Updater<G, R> {
    /// `token` authenticates git operations against the remote.
    #[must_use]
    pub fn new(gateway: G, runner: R, token: String) -> Self {
        Self {
            gateway,
            runner,
            token,
            clock: unix_now,
        }
    }

    /// Replace the source of Unix timestamps used for branch names.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Update `target` and report whether it is in a good state.
    ///
    /// Returns `true` if nothing had to be done or the update was published,
    /// `false` if a step failed. Failures are logged.
    pub fn process_repository(&self, target: &RepositoryTarget) -> bool {
        match self.update(target) {
            Ok(_) => true,
            Err(err) => {
                error!("{}: {}", target.name(), display_chain(&err));
                false
            }
        }
    }

    /// Run the update workflow for `target`.
    ///
    /// Steps, each ending the run on failure: skip if a bot pull request is
    /// already open, synchronize the working copy, upgrade the manifest, stop
    /// if it did not change, vendor if requested, commit the manifest files
    /// to a new branch, push it and open a pull request.
    ///
    /// # Errors
    ///
    /// Returns the [`UpdateError`] variant of the step that failed.
    pub fn update(&self, target: &RepositoryTarget) -> Result<Outcome, UpdateError> {
        let name = target.name();

        if let Some(pr) = self
            .gateway
            .find_open(&target.owner, &target.repository, PULL_REQUEST_TITLE)
            .map_err(UpdateError::FindPullRequest)?
        {
            info!(
                "{name}: open pull request already exists ({}), skipping repository",
                pr.url
            );
            return Ok(Outcome::AlreadyPending(pr));
        }

        let repo = WorkingCopy::github(
            &self.runner,
            &target.local_dir,
            &self.token,
            &target.owner,
            &target.repository,
        );

        info!("{name}: fetching {} branch", target.branch);
        repo.ensure_synced(&target.branch)
            .map_err(|source| UpdateError::Sync {
                branch: target.branch.clone(),
                source,
            })?;

        if !fs::is_file(&target.manifest_location()) {
            return Err(UpdateError::ManifestMissing {
                path: target.manifest_path.clone(),
            });
        }

        let module = GoModule::new(
            &self.runner,
            &target.local_dir,
            &target.manifest_path,
            target.vendor,
        );
        if !Self::upgrade(target, &module)? {
            return Ok(Outcome::UpToDate);
        }

        let branch = branch_name((self.clock)());
        info!("{name}: creating and pushing new git branch {branch:?}");
        repo.create_branch(&branch)
            .map_err(|source| UpdateError::CreateBranch {
                branch: branch.clone(),
                source,
            })?;
        repo.commit(COMMIT_MESSAGE, &module.affected_files())
            .map_err(UpdateError::Commit)?;
        repo.push().map_err(|source| UpdateError::Push {
            branch: branch.clone(),
            source,
        })?;

        info!("{name}: creating Github pull request {PULL_REQUEST_TITLE:?}");
        let pr = self
            .gateway
            .create(
                &target.owner,
                &target.repository,
                &NewPullRequest {
                    title: PULL_REQUEST_TITLE.to_owned(),
                    head: branch,
                    base: target.branch.clone(),
                    body: COMMIT_MESSAGE.to_owned(),
                },
            )
            .map_err(UpdateError::CreatePullRequest)?;

        info!("{name}: pull request created ({})", pr.url);
        Ok(Outcome::Published(pr))
    }

    /// Upgrade and, if requested, vendor the dependencies of `manifest`.
    /// Returns whether there is something to publish.
    fn upgrade<M: DependencyManifest>(
        target: &RepositoryTarget,
        manifest: &M,
    ) -> Result<bool, UpdateError> {
        let name = target.name();
        let mode = target.upgrade_mode();

        info!("{name}: updating dependencies ({mode})");
        let state = manifest.upgrade(mode).map_err(UpdateError::Upgrade)?;
        if !state.changed() {
            info!("{name}: dependencies already up to date");
            return Ok(false);
        }
        info!("{name}: dependencies in {} updated", state.path.display());

        if target.vendor {
            info!("{name}: downloading dependencies into vendor directory");
            manifest.vendor().map_err(UpdateError::Vendor)?;
        }

        Ok(true)
    }
}
