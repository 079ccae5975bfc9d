use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::{NewPullRequest, PullRequest, PullRequestError, PullRequestGateway};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "automatix";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const PAGE_SIZE: u32 = 100;

/// Errors that can occur when interacting with the Github API
#[derive(Debug, Error)]
pub enum GithubError {
    #[error(
        "a Github token is required for this operation.\n\
         Set github_token in the configuration file or the GITHUB_OAUTH_TOKEN environment variable."
    )]
    TokenRequired,

    #[error("failed to create HTTP client")]
    ClientInit(#[source] reqwest::Error),

    #[error("failed to {operation} {url}")]
    Request {
        operation: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Github API returned status {status} for {url}")]
    ApiStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("failed to parse response from {url}")]
    ParseResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Pull request fields returned by the pulls API
#[derive(Debug, Deserialize)]
struct PullRequestData {
    title: String,
    html_url: String,
}

impl From<PullRequestData> for PullRequest {
    fn from(data: PullRequestData) -> Self {
        Self {
            title: data.title,
            url: data.html_url,
        }
    }
}

/// Request body of the create pull request API
#[derive(Debug, Serialize)]
struct CreatePullRequestBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

/// Blocking client for the Github pull request API.
pub struct GithubClient {
    client: reqwest::blocking::Client,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    /// Create a new Github client for `api.github.com`.
    ///
    /// # Errors
    ///
    /// Returns `GithubError::ClientInit` if the HTTP client cannot be initialized.
    pub fn new(token: Option<String>) -> Result<Self, GithubError> {
        Self::with_api_base(GITHUB_API_BASE, token)
    }

    /// Create a new Github client talking to a custom API endpoint, e.g. a
    /// Github Enterprise installation.
    ///
    /// # Errors
    ///
    /// Returns `GithubError::ClientInit` if the HTTP client cannot be initialized.
    ///
    /// # Panics
    ///
    /// This method panics if called from within an async runtime. See docs on
    /// [`reqwest::blocking`] for details.
    pub fn with_api_base(api_base: &str, token: Option<String>) -> Result<Self, GithubError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(GithubError::ClientInit)?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn token(&self) -> Result<&str, GithubError> {
        self.token.as_deref().ok_or(GithubError::TokenRequired)
    }

    /// First page URL of the open pull requests of `owner/repository`.
    fn open_pulls_url(&self, owner: &str, repository: &str) -> String {
        format!(
            "{}/repos/{owner}/{repository}/pulls?state=open&per_page={PAGE_SIZE}",
            self.api_base
        )
    }

    /// Find the open pull request of `owner/repository` titled `title`,
    /// following the `Link` header until the last page.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is set, a request fails, or a response cannot be parsed.
    pub fn find_open_pull_request(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
    ) -> Result<Option<PullRequest>, GithubError> {
        let token = self.token()?;
        find_in_pages(
            self.open_pulls_url(owner, repository),
            |url| self.fetch_pull_request_page(token, url),
            |pr| pr.title == title,
        )
    }

    /// Fetch one page of pull requests and the URL of the next page, if any.
    fn fetch_pull_request_page(
        &self,
        token: &str,
        url: &str,
    ) -> Result<(Vec<PullRequest>, Option<String>), GithubError> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/vnd.github+json")
            .send()
            .map_err(|source| GithubError::Request {
                operation: "list pull requests from",
                url: url.to_owned(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(GithubError::ApiStatus {
                status: response.status(),
                url: url.to_owned(),
            });
        }

        let next_url = parse_next_link(response.headers());

        let page: Vec<PullRequestData> =
            response
                .json()
                .map_err(|source| GithubError::ParseResponse {
                    url: url.to_owned(),
                    source,
                })?;

        Ok((page.into_iter().map(PullRequest::from).collect(), next_url))
    }

    /// Open a pull request and return it with its web URL.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is set, the request fails, or the response cannot be parsed.
    pub fn create_pull_request(
        &self,
        owner: &str,
        repository: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, GithubError> {
        let token = self.token()?;
        let url = format!("{}/repos/{owner}/{repository}/pulls", self.api_base);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/vnd.github+json")
            .json(&CreatePullRequestBody {
                title: &request.title,
                head: &request.head,
                base: &request.base,
                body: &request.body,
            })
            .send()
            .map_err(|source| GithubError::Request {
                operation: "create pull request at",
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(GithubError::ApiStatus {
                status: response.status(),
                url,
            });
        }

        let created: PullRequestData =
            response
                .json()
                .map_err(|source| GithubError::ParseResponse {
                    url: url.clone(),
                    source,
                })?;

        Ok(created.into())
    }
}

/// Walk pages starting at `url`, stopping at the first pull request matching
/// `wanted` or after the page without a next link.
fn find_in_pages<F, P>(
    mut url: String,
    mut fetch: F,
    wanted: P,
) -> Result<Option<PullRequest>, GithubError>
where
    F: FnMut(&str) -> Result<(Vec<PullRequest>, Option<String>), GithubError>,
    P: Fn(&PullRequest) -> bool,
{
    loop {
        let (page, next_url) = fetch(&url)?;
        if let Some(found) = page.into_iter().find(&wanted) {
            return Ok(Some(found));
        }
        match next_url {
            Some(next) => url = next,
            None => return Ok(None),
        }
    }
}

/// Parse the `Link` header to find the `rel="next"` URL for pagination.
fn parse_next_link(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let link_header = headers.get("link")?.to_str().ok()?;
    next_link(link_header)
}

fn next_link(link_header: &str) -> Option<String> {
    for part in link_header.split(',') {
        let part = part.trim();
        if part.ends_with("rel=\"next\"") {
            // Extract URL between < and >
            let start = part.find('<')?.checked_add(1)?;
            let end = part.find('>')?;
            return part.get(start..end).map(str::to_owned);
        }
    }
    None
}

impl PullRequestGateway for GithubClient {
    fn find_open(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
    ) -> Result<Option<PullRequest>, PullRequestError> {
        self.find_open_pull_request(owner, repository, title)
            .map_err(|e| PullRequestError::List {
                owner: owner.to_owned(),
                repository: repository.to_owned(),
                source: Box::new(e),
            })
    }

    fn create(
        &self,
        owner: &str,
        repository: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, PullRequestError> {
        self.create_pull_request(owner, repository, request)
            .map_err(|e| PullRequestError::Create {
                owner: owner.to_owned(),
                repository: repository.to_owned(),
                source: Box::new(e),
            })
    }
}
