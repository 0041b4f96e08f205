//! Shared types for the petyard workspace.

mod types;

pub use types::{Contributor, RepoRef};
