use glam::Vec2;
use petyard_common::{Contributor, RepoRef};
use petyard_github::{AvatarJob, DataOrigin, LoadedContributors};
use petyard_scene::{
    DrawSource, Drawable, FrameView, OrbitCamera, Pet, PetLabel, SceneDescription, spawn_pets,
};
use winit::event::MouseScrollDelta;

/// Upper bound on one frame's delta, in milliseconds.
pub const MAX_FRAME_MS: f32 = 100.0;

/// Pixel-equivalent of one wheel notch, matching browser line scrolling.
const LINE_DELTA_PIXELS: f32 = 100.0;

/// Everything the loop mutates: pets, camera and per-frame draw lists.
pub struct Yard {
    pub repo: RepoRef,
    pub origin: DataOrigin,
    pub contributors: Vec<Contributor>,
    pub pets: Vec<Pet>,
    pub camera: OrbitCamera,
    pub scene: SceneDescription,
    pub show_panel: bool,
    drawables: Vec<Drawable>,
    labels: Vec<PetLabel>,
}

impl Yard {
    pub fn new(repo: RepoRef, loaded: LoadedContributors, max_pets: usize, seed: u64) -> Self {
        let pets = spawn_pets(&loaded.contributors, max_pets, seed);
        Self {
            repo,
            origin: loaded.origin,
            contributors: loaded.contributors,
            pets,
            camera: OrbitCamera::default(),
            scene: SceneDescription::default(),
            show_panel: false,
            drawables: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// One avatar download per spawned pet, tagged with the pet's index.
    pub fn avatar_jobs(&self) -> Vec<AvatarJob> {
        self.pets
            .iter()
            .enumerate()
            .map(|(index, pet)| AvatarJob {
                index,
                url: pet.avatar_url().to_string(),
            })
            .collect()
    }

    /// Camera first, then every pet.
    pub fn update(&mut self, dt_ms: f32) {
        self.camera.update();
        for pet in &mut self.pets {
            pet.update(dt_ms);
        }
    }

    /// Rebuild the draw lists from current pet state.
    pub fn collect(&mut self) {
        self.drawables.clear();
        self.labels.clear();
        for pet in &self.pets {
            pet.drawables(&mut self.drawables);
            self.labels.push(pet.label());
        }
    }

    pub fn frame(&self) -> FrameView<'_> {
        FrameView {
            camera: &self.camera,
            drawables: &self.drawables,
            labels: &self.labels,
        }
    }
}

/// Clamp a measured frame delta (seconds) to milliseconds for pet physics.
pub fn frame_delta_ms(elapsed_secs: f32) -> f32 {
    (elapsed_secs * 1000.0).clamp(0.0, MAX_FRAME_MS)
}

/// Convert a winit scroll into a browser-style wheel delta (positive zooms out).
pub fn wheel_delta(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * LINE_DELTA_PIXELS,
        MouseScrollDelta::PixelDelta(p) => -p.y as f32,
    }
}

/// Screen rectangle of a label card, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelCard {
    pub center: Vec2,
    pub size: Vec2,
}

/// Project a label into the viewport. `None` when behind the camera.
pub fn label_card(camera: &OrbitCamera, label: &PetLabel) -> Option<LabelCard> {
    let center = camera.project(label.anchor)?;
    let ppu = camera.pixels_per_unit(label.anchor)?;
    Some(LabelCard {
        center,
        size: label.size * ppu,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use petyard_github::demo_contributors;
    use winit::dpi::PhysicalPosition;

    fn demo_yard() -> Yard {
        let loaded = LoadedContributors {
            contributors: demo_contributors(),
            origin: DataOrigin::Demo,
        };
        Yard::new(RepoRef::new("o", "r"), loaded, 12, 7)
    }

    #[test]
    fn demo_yard_has_three_pets_and_jobs() {
        let yard = demo_yard();
        assert_eq!(yard.pets.len(), 3);
        let jobs = yard.avatar_jobs();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].index, 0);
        assert_eq!(jobs[0].url, "https://github.com/octocat.png");
    }

    #[test]
    fn collect_emits_two_drawables_and_a_label_per_pet() {
        let mut yard = demo_yard();
        yard.update(16.0);
        yard.collect();
        let frame = yard.frame();
        assert_eq!(frame.drawables.len(), 6);
        assert_eq!(frame.labels.len(), 3);
        assert_eq!(frame.labels[0].title, "octocat");

        yard.collect();
        assert_eq!(yard.frame().drawables.len(), 6);
    }

    #[test]
    fn update_advances_camera_and_keeps_pets_grounded() {
        let mut yard = demo_yard();
        let angle = yard.camera.angle;
        for _ in 0..500 {
            yard.update(16.0);
        }
        assert!(yard.camera.angle > angle);
        for pet in &yard.pets {
            assert!(pet.position().y >= pet.rest_height());
        }
    }

    #[test]
    fn frame_delta_is_clamped() {
        assert_eq!(frame_delta_ms(0.016), 16.0);
        assert_eq!(frame_delta_ms(5.0), MAX_FRAME_MS);
        assert_eq!(frame_delta_ms(-1.0), 0.0);
    }

    #[test]
    fn wheel_up_zooms_in() {
        assert_eq!(wheel_delta(MouseScrollDelta::LineDelta(0.0, 1.0)), -100.0);
        assert_eq!(
            wheel_delta(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -30.0))),
            30.0
        );
    }

    #[test]
    fn label_card_scales_with_distance() {
        let mut camera = OrbitCamera::default();
        camera.resize(1280, 720);
        camera.update();
        let label = PetLabel {
            anchor: glam::Vec3::ZERO,
            title: "a".into(),
            subtitle: "1 commits".into(),
            size: Vec2::new(3.0, 0.75),
        };
        let near = label_card(&camera, &label).unwrap();
        assert!((near.center - Vec2::new(640.0, 360.0)).length() < 1.0);
        assert!((near.size.x / near.size.y - 4.0).abs() < 1e-3);

        camera.set_distance(50.0);
        camera.update();
        let far = label_card(&camera, &label).unwrap();
        assert!(far.size.x < near.size.x);
    }
}
