//! GitHub REST surface for fwport.
//!
//! Defines [`Forge`], the query/publish capability the porting engine
//! depends on, and [`Client`], its blocking REST implementation. The four
//! operations: look up the pull requests containing a commit, list a pull
//! request's commits, search for an open pull request by base and title,
//! and create a draft pull request.
//!
//! Any non-success response is an error; the engine treats the forge as
//! unreachable and stops rather than continuing with partial data.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Page size for list endpoints. Listing continues until a short page.
const PER_PAGE: usize = 100;

/// How much of an error body to keep in the error message.
const BODY_EXCERPT_LEN: usize = 300;

// ---------------------------------------------------------------------------
// GithubError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    /// Transport-level failure (connection, TLS, decode).
    #[error("github request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("github returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        /// Response body, truncated.
        body: String,
    },
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// A pull request as consumed by the porting engine.
///
/// Only the fields the engine reads are deserialized; everything else in
/// the API response is ignored.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PullRequestData {
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub user: UserData,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub base: Option<BaseData>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct UserData {
    #[serde(default)]
    pub login: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BaseData {
    pub repo: RepoData,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RepoData {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
struct PrCommitData {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPullRequest {
    html_url: String,
}

/// Payload for creating a pull request.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    /// `{owner}:{branch}`.
    pub head: String,
    /// Target branch name in the upstream repository.
    pub base: String,
    pub draft: bool,
}

// ---------------------------------------------------------------------------
// Forge
// ---------------------------------------------------------------------------

/// Query/publish capability over the upstream repository's forge.
///
/// The engine only ever talks to the forge through this trait, so tests can
/// substitute a canned implementation.
pub trait Forge {
    /// The merged pull request that brought `sha` into the upstream
    /// repository, if any.
    fn pull_for_commit(&self, sha: &str) -> Result<Option<PullRequestData>, GithubError>;

    /// All commit hashes of a pull request, oldest first.
    fn pull_request_commit_shas(&self, number: u64) -> Result<Vec<String>, GithubError>;

    /// URL of an open pull request with the given base branch and exact
    /// title, if one exists.
    fn search_open_pull_request(
        &self,
        base: &str,
        title: &str,
    ) -> Result<Option<String>, GithubError>;

    /// Create a pull request in the upstream repository; returns its URL.
    fn create_pull_request(&self, payload: &NewPullRequest) -> Result<String, GithubError>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Blocking REST client bound to one upstream repository.
pub struct Client {
    http: reqwest::blocking::Client,
    api_url: String,
    token: Option<String>,
    upstream_org: String,
    repo_name: String,
}

impl Client {
    /// `api_url` is the endpoint root without a trailing slash
    /// (e.g. `https://api.github.com`). `token` is sent as
    /// `Authorization: token …` when present; unauthenticated requests work
    /// within the API's anonymous rate limits.
    pub fn new(
        api_url: impl Into<String>,
        token: Option<String>,
        upstream_org: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Result<Self, GithubError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("fwport/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            upstream_org: upstream_org.into(),
            repo_name: repo_name.into(),
        })
    }

    /// `{upstream_org}/{repo_name}`, the base repository pull requests must
    /// target to count as upstream.
    #[must_use]
    pub fn repo_full_name(&self) -> String {
        format!("{}/{}", self.upstream_org, self.repo_name)
    }

    fn request(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, GithubError> {
        let mut req = req.header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("token {token}"));
        }
        let resp = req.send()?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let url = resp.url().to_string();
            let body = resp.text().unwrap_or_default();
            Err(GithubError::Status {
                status: status.as_u16(),
                url,
                body: excerpt(&body),
            })
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GithubError> {
        let url = format!("{}/{path}", self.api_url);
        debug!(%url, "github GET");
        let resp = self.request(self.http.get(&url).query(query))?;
        Ok(resp.json()?)
    }
}

impl Forge for Client {
    fn pull_for_commit(&self, sha: &str) -> Result<Option<PullRequestData>, GithubError> {
        let path = format!(
            "repos/{}/{}/commits/{sha}/pulls",
            self.upstream_org, self.repo_name
        );
        let prs: Vec<PullRequestData> = self.get_json(&path, &[])?;
        Ok(first_upstream_merged(prs, &self.repo_full_name()))
    }

    fn pull_request_commit_shas(&self, number: u64) -> Result<Vec<String>, GithubError> {
        let path = format!(
            "repos/{}/{}/pulls/{number}/commits",
            self.upstream_org, self.repo_name
        );
        let mut shas = Vec::new();
        for page in 1.. {
            let batch: Vec<PrCommitData> = self.get_json(
                &path,
                &[
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )?;
            let count = batch.len();
            shas.extend(batch.into_iter().map(|c| c.sha));
            if count < PER_PAGE {
                break;
            }
        }
        Ok(shas)
    }

    fn search_open_pull_request(
        &self,
        base: &str,
        title: &str,
    ) -> Result<Option<String>, GithubError> {
        let query = search_query(&self.repo_full_name(), base, title);
        let results: SearchResults = self.get_json("search/issues", &[("q", query)])?;
        Ok(results.items.into_iter().next().map(|item| item.html_url))
    }

    fn create_pull_request(&self, payload: &NewPullRequest) -> Result<String, GithubError> {
        let url = format!(
            "{}/repos/{}/{}/pulls",
            self.api_url, self.upstream_org, self.repo_name
        );
        debug!(%url, title = payload.title, "github POST");
        let resp = self.request(self.http.post(&url).json(payload))?;
        let created: CreatedPullRequest = resp.json()?;
        Ok(created.html_url)
    }
}

/// First pull request that was merged into the upstream repository itself.
///
/// The commit→pulls endpoint also returns pull requests opened against
/// forks and ones that were never merged; neither identifies the commit's
/// originating unit.
fn first_upstream_merged(
    prs: Vec<PullRequestData>,
    full_name: &str,
) -> Option<PullRequestData> {
    prs.into_iter().find(|pr| {
        pr.merged_at.is_some()
            && pr
                .base
                .as_ref()
                .is_some_and(|base| base.repo.full_name == full_name)
    })
}

fn search_query(full_name: &str, base: &str, title: &str) -> String {
    format!("is:pr repo:{full_name} base:{base} state:open \"{title}\" in:title")
}

fn excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_LEN {
        body.to_string()
    } else {
        let mut cut = BODY_EXCERPT_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &body[..cut])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
