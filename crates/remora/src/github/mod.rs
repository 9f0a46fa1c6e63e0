//! GitHub API client.
//!
//! Wraps an authenticated [`octocrab::Octocrab`] instance behind the small
//! set of operations the sync engine needs: issue listing with comment
//! draining, release/asset enumeration, asset downloads, and user/org
//! repository expansion. Result sets are converted into the engine's own
//! record types at this boundary; nothing above it sees octocrab models.

pub mod discussions;

use chrono::{DateTime, Duration, Utc};
use octocrab::models::issues::{Comment, Issue};
use octocrab::models::repos::Release as GhRelease;
use octocrab::params;
use octocrab::Octocrab;
use thiserror::Error;
use tracing::debug;

use crate::config::RepoKind;

/// Errors raised by remote API calls.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("asset download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("GraphQL error: {message}")]
    GraphQl { message: String },

    #[error("unexpected GraphQL response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// An issue together with all of its comments.
#[derive(Debug, Clone)]
pub struct IssueRecord {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<CommentRecord>,
}

/// One comment under an issue.
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A release with its uploaded assets.
#[derive(Debug, Clone)]
pub struct Release {
    pub tag: String,
    pub published_at: Option<DateTime<Utc>>,
    pub assets: Vec<ReleaseAsset>,
}

/// One release asset.
#[derive(Debug, Clone)]
pub struct ReleaseAsset {
    pub name: String,
    pub size: u64,
    pub state: String,
    /// API url the asset bytes are fetched from.
    pub url: String,
}

impl ReleaseAsset {
    /// Only assets the remote reports as fully uploaded are eligible.
    pub fn uploaded(&self) -> bool {
        self.state == "uploaded"
    }
}

/// Authenticated GitHub client.
pub struct GitHub {
    inner: Octocrab,
    http: reqwest::Client,
    token: String,
}

impl GitHub {
    pub fn new(token: &str) -> Result<Self, GitHubError> {
        let inner = Octocrab::builder()
            .personal_token(token.to_string())
            .build()?;
        let http = reqwest::Client::builder()
            .user_agent("remora")
            .build()?;
        Ok(Self {
            inner,
            http,
            token: token.to_string(),
        })
    }

    /// List issues updated strictly after `watermark`, each with all of its
    /// comments.
    ///
    /// The REST `since` parameter is inclusive, so one second is added to
    /// the watermark to get strictly-after semantics and avoid refetching
    /// the exact boundary item. Comment pages are fully drained per issue
    /// before the next issue page is requested.
    pub async fn issues_updated_after(
        &self,
        owner: &str,
        name: &str,
        watermark: DateTime<Utc>,
    ) -> Result<Vec<IssueRecord>, GitHubError> {
        let since = watermark + Duration::seconds(1);
        let mut records = Vec::new();

        let mut page = self
            .inner
            .issues(owner, name)
            .list()
            .state(params::State::All)
            .sort(params::issues::Sort::Updated)
            .direction(params::Direction::Ascending)
            .since(since)
            .per_page(100)
            .send()
            .await?;

        loop {
            let issues = std::mem::take(&mut page.items);
            debug!(count = issues.len(), "fetched issue page");
            for issue in issues {
                let comments = self.issue_comments(owner, name, issue.number).await?;
                records.push(to_issue_record(issue, comments));
            }
            match self.inner.get_page::<Issue>(&page.next).await? {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(records)
    }

    async fn issue_comments(
        &self,
        owner: &str,
        name: &str,
        number: u64,
    ) -> Result<Vec<CommentRecord>, GitHubError> {
        let mut all = Vec::new();
        let mut page = self
            .inner
            .issues(owner, name)
            .list_comments(number)
            .per_page(100)
            .send()
            .await?;
        loop {
            all.extend(std::mem::take(&mut page.items).into_iter().map(to_comment_record));
            match self.inner.get_page::<Comment>(&page.next).await? {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(all)
    }

    /// List every release of a repository, with assets.
    pub async fn releases(&self, owner: &str, name: &str) -> Result<Vec<Release>, GitHubError> {
        let mut releases = Vec::new();
        let mut page = self
            .inner
            .repos(owner, name)
            .releases()
            .list()
            .per_page(100)
            .send()
            .await?;
        loop {
            releases.extend(std::mem::take(&mut page.items).into_iter().map(to_release));
            match self.inner.get_page::<GhRelease>(&page.next).await? {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(releases)
    }

    /// Download one asset's bytes from its API url.
    pub async fn download_asset(&self, asset: &ReleaseAsset) -> Result<Vec<u8>, GitHubError> {
        let resp = self
            .http
            .get(&asset.url)
            .header("Accept", "application/octet-stream")
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Enumerate an account's repositories as `host/owner/name` URLs.
    ///
    /// Used to expand `user`/`org` descriptors into concrete repository
    /// descriptors before syncing.
    pub async fn account_repo_urls(
        &self,
        account: &str,
        kind: RepoKind,
    ) -> Result<Vec<String>, GitHubError> {
        let scope = match kind {
            RepoKind::Org => "orgs",
            _ => "users",
        };
        let mut urls = Vec::new();
        let mut page_num = 1u32;
        loop {
            let route = format!("/{scope}/{account}/repos?per_page=100&page={page_num}");
            let repos: Vec<octocrab::models::Repository> =
                self.inner.get(route, None::<&()>).await?;
            let count = repos.len();
            for repo in repos {
                if let Some(html) = repo.html_url {
                    let url = html.as_str();
                    urls.push(
                        url.strip_prefix("https://")
                            .unwrap_or(url)
                            .trim_end_matches('/')
                            .to_string(),
                    );
                }
            }
            if count < 100 {
                break;
            }
            page_num += 1;
        }
        Ok(urls)
    }

    pub(crate) fn octocrab(&self) -> &Octocrab {
        &self.inner
    }
}

fn to_issue_record(issue: Issue, comments: Vec<CommentRecord>) -> IssueRecord {
    let state = match issue.state {
        octocrab::models::IssueState::Open => "open",
        octocrab::models::IssueState::Closed => "closed",
        _ => "unknown",
    };
    IssueRecord {
        number: issue.number,
        title: issue.title,
        state: state.to_string(),
        author: issue.user.login,
        body: issue.body.unwrap_or_default(),
        created_at: issue.created_at,
        updated_at: issue.updated_at,
        comments,
    }
}

fn to_comment_record(comment: Comment) -> CommentRecord {
    CommentRecord {
        id: comment.id.into_inner(),
        author: comment.user.login,
        body: comment.body.unwrap_or_default(),
        created_at: comment.created_at,
        updated_at: comment.updated_at.unwrap_or(comment.created_at),
    }
}

fn to_release(release: GhRelease) -> Release {
    Release {
        tag: release.tag_name,
        published_at: release.published_at,
        assets: release
            .assets
            .into_iter()
            .map(|a| ReleaseAsset {
                name: a.name,
                size: a.size.max(0) as u64,
                state: a.state,
                url: a.url.to_string(),
            })
            .collect(),
    }
}
