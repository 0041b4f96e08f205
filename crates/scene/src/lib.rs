//! Scene model for petyard: contributors as hopping, bobbing pets under an orbit camera.
//!
//! Nothing here touches a GPU. Backends consume [`Drawable`]s and [`PetLabel`]s
//! through a [`FrameView`]; the camera and pets are plain data updated once per frame.
//!
//! # Invariants
//! - A pet never sits below its resting height (its own scale).
//! - Camera pitch stays within `[0.1, 1.2]` and distance within `[10, 50]`.
//! - Pet randomness comes from a per-pet seeded RNG, never from a shared global source.

mod camera;
mod debug;
mod drawable;
mod layout;
mod pet;
mod scene;

pub use camera::{Controller, InputEvent, OrbitCamera};
pub use debug::DebugTextRenderer;
pub use drawable::{DrawKind, DrawSource, Drawable, FrameView, Renderer, TextureHandle};
pub use layout::{MAX_PETS, Placement, max_contributions, spawn_pets, spiral_placements};
pub use pet::{Pet, PetLabel, ShadowState, pet_scale, shadow_for_height};
pub use scene::{
    AmbientLight, DirectionalLight, GridLine, GridSpec, GroundSpec, Lighting, SceneBackground,
    SceneDescription, ShadowConfig, hex_color,
};
