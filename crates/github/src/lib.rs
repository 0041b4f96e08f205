//! Network-facing side of petyard: the contributors listing and avatar images.
//!
//! # Invariants
//! - Exactly one read-only request is issued per contributor fetch; there is no retry.
//! - A failed fetch degrades to the demo list, never to an empty scene.
//! - A failed avatar load affects only the pet it belongs to.

mod avatar;
mod client;
mod demo;
mod loader;

pub use avatar::{AVATAR_SIZE, AvatarImage, ImageLoadError, compose_circular, placeholder_avatar};
pub use client::{
    ContributorSource, DEFAULT_API_BASE, DataOrigin, GithubClient, LoadedContributors,
    NetworkError, load_contributors,
};
pub use demo::demo_contributors;
pub use loader::{AvatarJob, AvatarLoader, AvatarSource, LoadedAvatar, load_avatar};
