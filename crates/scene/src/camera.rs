use glam::{Mat4, Vec2, Vec3};

pub const MIN_PITCH: f32 = 0.1;
pub const MAX_PITCH: f32 = 1.2;
pub const MIN_DISTANCE: f32 = 10.0;
pub const MAX_DISTANCE: f32 = 50.0;

/// Radians of orbit per pixel of drag.
const DRAG_SENSITIVITY: f32 = 0.005;
/// Distance change per unit of wheel delta.
const WHEEL_SENSITIVITY: f32 = 0.02;
/// Orbit advance per frame while idle.
const AUTO_ROTATE_STEP: f32 = 0.001;

/// Pointer, wheel and viewport input in window pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,
    /// Positive values zoom out.
    Wheel { delta_y: f32 },
    Resize { width: u32, height: u32 },
}

/// An input consumer with an explicit subscription lifecycle.
///
/// Events only reach a controller between `attach` and `detach`; the event
/// source never holds it implicitly.
pub trait Controller {
    fn attach(&mut self);
    fn detach(&mut self);
    fn is_attached(&self) -> bool;
    /// Returns whether the event was consumed.
    fn handle(&mut self, event: &InputEvent) -> bool;
}

/// Camera orbiting the origin on a sphere of (angle, pitch, distance).
///
/// Auto-rotates while idle; dragging orbits, the wheel zooms.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub angle: f32,
    pitch: f32,
    distance: f32,
    pub target: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    eye: Vec3,
    viewport: Vec2,
    dragging: bool,
    last_pointer: Vec2,
    attached: bool,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        let mut camera = Self {
            angle: 0.0,
            pitch: 0.3,
            distance: 25.0,
            target: Vec3::ZERO,
            fov: 50.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            eye: Vec3::new(0.0, 8.0, 20.0),
            viewport: Vec2::new(1280.0, 720.0),
            dragging: false,
            last_pointer: Vec2::ZERO,
            attached: false,
        };
        camera.refresh_eye();
        camera
    }
}

impl OrbitCamera {
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Camera position as of the last [`update`](Self::update).
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn begin_drag(&mut self, x: f32, y: f32) {
        self.dragging = true;
        self.last_pointer = Vec2::new(x, y);
    }

    /// Orbit by the pointer delta since the last drag position. No-op unless dragging.
    pub fn drag_to(&mut self, x: f32, y: f32) {
        if !self.dragging {
            return;
        }
        let pointer = Vec2::new(x, y);
        let delta = pointer - self.last_pointer;
        self.angle -= delta.x * DRAG_SENSITIVITY;
        self.set_pitch(self.pitch + delta.y * DRAG_SENSITIVITY);
        self.last_pointer = pointer;
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    pub fn zoom(&mut self, delta_y: f32) {
        self.set_distance(self.distance + delta_y * WHEEL_SENSITIVITY);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        self.viewport = Vec2::new(width as f32, height as f32);
        self.aspect = width as f32 / height as f32;
    }

    /// Per-frame update: auto-rotate while idle, then re-aim at the target.
    pub fn update(&mut self) {
        if !self.dragging {
            self.angle += AUTO_ROTATE_STEP;
        }
        self.refresh_eye();
    }

    fn refresh_eye(&mut self) {
        let ground = self.distance * self.pitch.cos();
        self.eye = self.target
            + Vec3::new(
                self.angle.sin() * ground,
                self.distance * self.pitch.sin(),
                self.angle.cos() * ground,
            );
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Camera right and up axes in world space, for billboards.
    pub fn billboard_axes(&self) -> (Vec3, Vec3) {
        let view = self.view_matrix();
        let right = Vec3::new(view.x_axis.x, view.y_axis.x, view.z_axis.x);
        let up = Vec3::new(view.x_axis.y, view.y_axis.y, view.z_axis.y);
        (right, up)
    }

    /// Project a world point to viewport pixels (origin top-left). `None` if behind the camera.
    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }

    /// On-screen pixels covered by one world unit at `world`, measured along the camera's right axis.
    pub fn pixels_per_unit(&self, world: Vec3) -> Option<f32> {
        let (right, _) = self.billboard_axes();
        let a = self.project(world)?;
        let b = self.project(world + right)?;
        Some(a.distance(b))
    }
}

impl Controller for OrbitCamera {
    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.dragging = false;
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn handle(&mut self, event: &InputEvent) -> bool {
        if !self.attached {
            return false;
        }
        match *event {
            InputEvent::PointerDown { x, y } => self.begin_drag(x, y),
            InputEvent::PointerMove { x, y } => {
                if !self.dragging {
                    return false;
                }
                self.drag_to(x, y);
            }
            InputEvent::PointerUp => self.end_drag(),
            InputEvent::Wheel { delta_y } => self.zoom(delta_y),
            InputEvent::Resize { width, height } => self.resize(width, height),
        }
        true
    }
}
