use crate::demo::demo_contributors;
use petyard_common::{Contributor, RepoRef};

/// Public GitHub REST API root.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Errors from the contributors fetch.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("GitHub API error: {status}")]
    Status { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed contributors response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can list the contributors of a repository.
pub trait ContributorSource {
    fn fetch_contributors(&self, repo: &RepoRef) -> Result<Vec<Contributor>, NetworkError>;
}

/// Blocking client for the GitHub REST API.
#[derive(Clone)]
pub struct GithubClient {
    agent: ureq::Agent,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("petyard/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Authenticate API requests with a personal access token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn contributors_url(&self, repo: &RepoRef) -> String {
        format!("{}/repos/{}/{}/contributors", self.api_base, repo.owner, repo.repo)
    }

    pub(crate) fn agent(&self) -> &ureq::Agent {
        &self.agent
    }
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl ContributorSource for GithubClient {
    fn fetch_contributors(&self, repo: &RepoRef) -> Result<Vec<Contributor>, NetworkError> {
        let url = self.contributors_url(repo);
        tracing::debug!(%url, "fetching contributors");

        let mut request = self
            .agent
            .get(&url)
            .set("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = match request.call() {
            Ok(r) => r,
            Err(ureq::Error::Status(status, _)) => return Err(NetworkError::Status { status }),
            Err(ureq::Error::Transport(t)) => return Err(NetworkError::Transport(t.to_string())),
        };

        let contributors: Vec<Contributor> = serde_json::from_reader(response.into_reader())?;
        Ok(contributors)
    }
}

/// Where a contributor list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Remote,
    Demo,
}

impl DataOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            DataOrigin::Remote => "remote",
            DataOrigin::Demo => "demo",
        }
    }
}

/// Contributors ready for pet creation, tagged with their origin.
#[derive(Debug, Clone)]
pub struct LoadedContributors {
    pub contributors: Vec<Contributor>,
    pub origin: DataOrigin,
}

/// Fetch contributors, substituting the demo list on any failure.
///
/// The failure is logged, never returned: callers always get something to show.
pub fn load_contributors(source: &dyn ContributorSource, repo: &RepoRef) -> LoadedContributors {
    match source.fetch_contributors(repo) {
        Ok(contributors) => {
            if contributors.is_empty() {
                tracing::warn!(%repo, "repository has no contributors");
            } else {
                tracing::info!(%repo, "loaded {} contributors", contributors.len());
            }
            LoadedContributors {
                contributors,
                origin: DataOrigin::Remote,
            }
        }
        Err(e) => {
            tracing::warn!(%repo, "contributor fetch failed, using demo data: {e}");
            LoadedContributors {
                contributors: demo_contributors(),
                origin: DataOrigin::Demo,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing(u16);

    impl ContributorSource for Failing {
        fn fetch_contributors(&self, _repo: &RepoRef) -> Result<Vec<Contributor>, NetworkError> {
            Err(NetworkError::Status { status: self.0 })
        }
    }

    struct Fixed(Vec<Contributor>);

    impl ContributorSource for Fixed {
        fn fetch_contributors(&self, _repo: &RepoRef) -> Result<Vec<Contributor>, NetworkError> {
            Ok(self.0.clone())
        }
    }

    fn repo() -> RepoRef {
        RepoRef::new("anisayari", "voyonsvoir")
    }

    #[test]
    fn failure_falls_back_to_demo() {
        let loaded = load_contributors(&Failing(404), &repo());
        assert_eq!(loaded.origin, DataOrigin::Demo);
        assert_eq!(loaded.contributors.len(), 3);
        assert_eq!(loaded.contributors[0].login, "octocat");
    }

    #[test]
    fn success_passes_through() {
        let list = vec![Contributor::new("a", 7, "https://example.invalid/a.png", 3)];
        let loaded = load_contributors(&Fixed(list.clone()), &repo());
        assert_eq!(loaded.origin, DataOrigin::Remote);
        assert_eq!(loaded.contributors, list);
    }

    #[test]
    fn empty_success_is_not_a_failure() {
        let loaded = load_contributors(&Fixed(Vec::new()), &repo());
        assert_eq!(loaded.origin, DataOrigin::Remote);
        assert!(loaded.contributors.is_empty());
    }

    #[test]
    fn contributors_url_strips_trailing_slash() {
        let client = GithubClient::new("http://localhost:9000/");
        assert_eq!(
            client.contributors_url(&repo()),
            "http://localhost:9000/repos/anisayari/voyonsvoir/contributors"
        );
    }

    #[test]
    fn empty_token_is_ignored() {
        let client = GithubClient::default().with_token(Some(String::new()));
        assert!(client.token.is_none());
    }

    #[test]
    fn status_error_message() {
        let e = NetworkError::Status { status: 403 };
        assert_eq!(e.to_string(), "GitHub API error: 403");
    }

    #[test]
    fn non_array_body_is_decode_error() {
        let err = serde_json::from_str::<Vec<Contributor>>(r#"{"message":"Not Found"}"#)
            .map_err(NetworkError::from)
            .unwrap_err();
        assert!(matches!(err, NetworkError::Decode(_)));
    }
}
