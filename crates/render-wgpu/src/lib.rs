//! wgpu render backend for petyard.
//!
//! Draws a lit ground plane, the grid, translucent shadow discs and
//! camera-facing avatar sprites from a [`petyard_scene::FrameView`].
//!
//! # Invariants
//! - Renderer never mutates pets or camera.
//! - Sprites are drawn back to front so avatar edges blend over each other.

mod context;
mod gpu;
mod shaders;

pub use context::{GpuContext, RenderInitError};
pub use gpu::WgpuRenderer;
