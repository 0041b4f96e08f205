use serde::{Deserialize, Serialize};
use std::fmt;

/// One contributor record as returned by the contributors listing endpoint.
///
/// Immutable once fetched. Fields the API returns beyond these are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub id: u64,
    pub avatar_url: String,
    pub contributions: u64,
}

impl Contributor {
    pub fn new(login: impl Into<String>, id: u64, avatar_url: impl Into<String>, contributions: u64) -> Self {
        Self {
            login: login.into(),
            id,
            avatar_url: avatar_url.into(),
            contributions,
        }
    }
}

/// Owner/repository pair identifying a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contributor_ignores_unknown_fields() {
        let json = r#"{
            "login": "octocat",
            "id": 583231,
            "node_id": "MDQ6VXNlcjU4MzIzMQ==",
            "avatar_url": "https://avatars.githubusercontent.com/u/583231?v=4",
            "type": "User",
            "site_admin": false,
            "contributions": 42
        }"#;
        let c: Contributor = serde_json::from_str(json).unwrap();
        assert_eq!(c.login, "octocat");
        assert_eq!(c.id, 583231);
        assert_eq!(c.contributions, 42);
    }

    #[test]
    fn repo_ref_display() {
        let r = RepoRef::new("anisayari", "voyonsvoir");
        assert_eq!(r.to_string(), "anisayari/voyonsvoir");
    }
}
