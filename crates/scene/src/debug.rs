use crate::drawable::{DrawKind, FrameView, Renderer};
use std::fmt::Write;

/// Text renderer for headless runs.
///
/// Produces a human-readable dump of the camera, every drawable and every label.
/// Useful for CLI output, logging, and testing the render interface.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, frame: &FrameView<'_>) -> String {
        let cam = frame.camera;
        let eye = cam.eye();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Frame (drawables={}, labels={}) ===",
            frame.drawables.len(),
            frame.labels.len()
        );
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) angle={:.3} pitch={:.2} distance={:.1}",
            eye.x,
            eye.y,
            eye.z,
            cam.angle,
            cam.pitch(),
            cam.distance()
        );

        for d in frame.drawables {
            let kind = match d.kind {
                DrawKind::Billboard => "sprite",
                DrawKind::GroundDisc => "shadow",
            };
            let texture = d
                .texture
                .map(|t| format!("tex#{}", t.0))
                .unwrap_or_else(|| "untextured".into());
            let _ = writeln!(
                out,
                "  {kind:<6} pos=({:.2}, {:.2}, {:.2}) size={:.2} opacity={:.2} {texture}",
                d.position.x, d.position.y, d.position.z, d.size.x, d.opacity
            );
        }

        for label in frame.labels {
            let _ = writeln!(
                out,
                "  label  \"{}\" ({}) at y={:.2}",
                label.title, label.subtitle, label.anchor.y
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OrbitCamera;
    use crate::drawable::{DrawSource, TextureHandle};
    use crate::pet::Pet;
    use petyard_common::Contributor;

    #[test]
    fn empty_frame() {
        let camera = OrbitCamera::default();
        let frame = FrameView {
            camera: &camera,
            drawables: &[],
            labels: &[],
        };
        let out = DebugTextRenderer::new().render(&frame);
        assert!(out.contains("drawables=0"));
        assert!(out.contains("distance=25.0"));
    }

    #[test]
    fn frame_with_pets() {
        let camera = OrbitCamera::default();
        let mut pet = Pet::new(
            &Contributor::new("octocat", 1, "https://github.com/octocat.png", 100),
            4.0,
            0.0,
            100,
            1,
        );
        pet.set_avatar(Some(TextureHandle(2)));
        let mut drawables = Vec::new();
        pet.drawables(&mut drawables);
        let labels = vec![pet.label()];

        let out = DebugTextRenderer::new().render(&FrameView {
            camera: &camera,
            drawables: &drawables,
            labels: &labels,
        });
        assert!(out.contains("sprite"));
        assert!(out.contains("shadow"));
        assert!(out.contains("tex#2"));
        assert!(out.contains("\"octocat\" (100 commits)"));
    }
}
