use std::error::Error;
use thiserror::Error;

/// Boxed cause of a gateway failure, e.g. an HTTP or status error.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// An open pull request as reported by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub title: String,
    pub url: String,
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    /// Branch containing the changes.
    pub head: String,
    /// Branch the changes should be merged into.
    pub base: String,
    pub body: String,
}

/// Errors reported by a [`PullRequestGateway`]
#[derive(Debug, Error)]
pub enum PullRequestError {
    #[error("listing open pull requests of {owner}/{repository} failed")]
    List {
        owner: String,
        repository: String,
        #[source]
        source: BoxError,
    },

    #[error("creating pull request on {owner}/{repository} failed")]
    Create {
        owner: String,
        repository: String,
        #[source]
        source: BoxError,
    },
}

/// Access to the pull requests of a remote repository.
///
/// Results are never cached: every call reflects the remote state at the time
/// it is made.
pub trait PullRequestGateway {
    /// Find an open pull request whose title equals `title`, looking through
    /// all result pages.
    ///
    /// # Errors
    ///
    /// Returns [`PullRequestError::List`] if the pull requests cannot be listed.
    fn find_open(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
    ) -> Result<Option<PullRequest>, PullRequestError>;

    /// Open a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`PullRequestError::Create`] if the pull request cannot be created.
    fn create(
        &self,
        owner: &str,
        repository: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, PullRequestError>;
}

impl<G: PullRequestGateway + ?Sized> PullRequestGateway for &G {
    fn find_open(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
    ) -> Result<Option<PullRequest>, PullRequestError> {
        (**self).find_open(owner, repository, title)
    }

    fn create(
        &self,
        owner: &str,
        repository: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, PullRequestError> {
        (**self).create(owner, repository, request)
    }
}
