use crate::camera::OrbitCamera;
use crate::pet::PetLabel;
use glam::{Vec2, Vec3};

/// Backend-assigned id of an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// How a drawable is oriented in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    /// Camera-facing quad centred on `position`.
    Billboard,
    /// Flat disc lying in the XZ plane, centred on `position`.
    GroundDisc,
}

/// The minimal description a backend needs to draw one visual element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawable {
    pub kind: DrawKind,
    pub position: Vec3,
    /// World-space width and height. For discs both components are the diameter.
    pub size: Vec2,
    /// `None` draws the backend's placeholder for billboards and a flat tint for discs.
    pub texture: Option<TextureHandle>,
    pub tint: [f32; 3],
    pub opacity: f32,
}

/// Anything that contributes drawables to a frame.
pub trait DrawSource {
    fn drawables(&self, out: &mut Vec<Drawable>);
}

/// Everything a backend reads to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub camera: &'a OrbitCamera,
    pub drawables: &'a [Drawable],
    pub labels: &'a [PetLabel],
}

/// Renderer-agnostic interface for backends that need nothing beyond the frame itself.
///
/// A renderer reads the frame and produces output. It never mutates pets or camera.
pub trait Renderer {
    type Output;

    fn render(&self, frame: &FrameView<'_>) -> Self::Output;
}
