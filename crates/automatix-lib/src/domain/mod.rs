pub mod manifest;
pub mod pull_request;
pub mod target;

pub use manifest::{Fingerprint, ManifestState, UpgradeMode};
pub use pull_request::{NewPullRequest, PullRequest, PullRequestError, PullRequestGateway};
pub use target::RepositoryTarget;
