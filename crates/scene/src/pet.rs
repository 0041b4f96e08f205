use crate::drawable::{DrawKind, DrawSource, Drawable, TextureHandle};
use glam::{Vec2, Vec3};
use petyard_common::Contributor;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const MIN_SCALE: f32 = 0.8;
pub const MAX_SCALE: f32 = 2.0;

/// Velocity lost per millisecond.
const GRAVITY: f32 = 0.0001;
const BOUNCE_DAMPING: f32 = 0.3;
/// Chance per grounded frame of a spontaneous hop.
const HOP_CHANCE: f32 = 0.005;
const HOP_MIN: f32 = 0.02;
const HOP_MAX: f32 = 0.04;

/// Bob angular frequency, radians per second.
const BOB_FREQUENCY: f32 = 2.0;
/// Bob amplitude as a fraction of scale.
const BOB_AMPLITUDE: f32 = 0.1;
/// Upper bound of the random initial phase, in seconds.
const PHASE_RANGE: f32 = 100.0;

const SHADOW_OPACITY: f32 = 0.2;
const SHADOW_SHRINK: f32 = 0.1;
const SHADOW_FADE: f32 = 0.15;
/// Keeps the shadow disc just above the ground so it doesn't z-fight.
const SHADOW_LIFT: f32 = 0.01;

const LABEL_MAX_CHARS: usize = 14;
const LABEL_GAP: f32 = 0.5;
const LABEL_SIZE: Vec2 = Vec2::new(3.0, 0.75);

/// Visual scale for a contribution count, relative to the batch maximum.
///
/// `0.8 + 1.2 * min(c / m, 1)` with `m` floored at 1.
pub fn pet_scale(contributions: u64, max_contributions: u64) -> f32 {
    let norm = (contributions as f64 / max_contributions.max(1) as f64).min(1.0) as f32;
    MIN_SCALE + norm * (MAX_SCALE - MIN_SCALE)
}

/// Ground shadow of a pet, relative to the pet's group origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowState {
    pub offset_y: f32,
    pub scale: f32,
    pub opacity: f32,
}

/// Shadow radius and opacity for a pet of `scale` floating `height` above rest.
///
/// Both shrink linearly with height and bottom out at zero.
pub fn shadow_for_height(scale: f32, height: f32) -> (f32, f32) {
    let height = height.max(0.0);
    let radius = scale * (1.0 - height * SHADOW_SHRINK).max(0.0);
    let opacity = SHADOW_OPACITY * (1.0 - height * SHADOW_FADE).max(0.0);
    (radius, opacity)
}

/// Text shown under a pet, anchored in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct PetLabel {
    pub anchor: Vec3,
    pub title: String,
    pub subtitle: String,
    /// Nominal world-space extent of the label card.
    pub size: Vec2,
}

/// One contributor rendered as a floating creature.
///
/// The pet's group origin sits at `position`; the avatar, shadow and label
/// hang off it with their own local offsets.
#[derive(Debug, Clone)]
pub struct Pet {
    login: String,
    contributions: u64,
    avatar_url: String,
    scale: f32,
    position: Vec3,
    velocity_y: f32,
    /// Seconds, started at a random phase so pets don't bob in lockstep.
    time: f32,
    avatar_offset_y: f32,
    shadow: ShadowState,
    avatar: Option<TextureHandle>,
    rng: ChaCha8Rng,
}

impl Pet {
    /// Create a pet resting at `(x, scale, z)`.
    pub fn new(contributor: &Contributor, x: f32, z: f32, max_contributions: u64, seed: u64) -> Self {
        let scale = pet_scale(contributor.contributions, max_contributions);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let time = rng.random::<f32>() * PHASE_RANGE;

        Self {
            login: contributor.login.clone(),
            contributions: contributor.contributions,
            avatar_url: contributor.avatar_url.clone(),
            scale,
            position: Vec3::new(x, scale, z),
            velocity_y: 0.0,
            time,
            avatar_offset_y: 0.0,
            shadow: ShadowState {
                offset_y: -scale + SHADOW_LIFT,
                scale,
                opacity: SHADOW_OPACITY,
            },
            avatar: None,
            rng,
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn contributions(&self) -> u64 {
        self.contributions
    }

    pub fn avatar_url(&self) -> &str {
        &self.avatar_url
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Resting height of the group origin.
    pub fn rest_height(&self) -> f32 {
        self.scale
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity_y(&self) -> f32 {
        self.velocity_y
    }

    /// Height of the group origin above its resting height.
    pub fn height_above_ground(&self) -> f32 {
        self.position.y - self.scale
    }

    pub fn avatar_offset_y(&self) -> f32 {
        self.avatar_offset_y
    }

    pub fn shadow(&self) -> ShadowState {
        self.shadow
    }

    pub fn avatar(&self) -> Option<TextureHandle> {
        self.avatar
    }

    pub fn set_avatar(&mut self, texture: Option<TextureHandle>) {
        self.avatar = texture;
    }

    /// Advance the pet by `dt_ms` milliseconds.
    ///
    /// Integrates gravity, clamps to the ground with a damped bounce and an
    /// occasional random hop, then refreshes the bob and the shadow.
    pub fn update(&mut self, dt_ms: f32) {
        let dt = dt_ms.max(0.0);
        let s = self.scale;
        self.time += dt * 0.001;

        self.velocity_y -= GRAVITY * dt;
        self.position.y += self.velocity_y * dt;

        if self.position.y < s {
            self.position.y = s;
            self.velocity_y = self.velocity_y.abs() * BOUNCE_DAMPING;

            if self.rng.random::<f32>() < HOP_CHANCE {
                self.velocity_y = HOP_MIN + self.rng.random::<f32>() * (HOP_MAX - HOP_MIN);
                tracing::trace!(login = %self.login, vy = self.velocity_y, "hop");
            }
        }

        self.avatar_offset_y = (self.time * BOB_FREQUENCY).sin() * BOB_AMPLITUDE * s;

        let (scale, opacity) = shadow_for_height(s, self.height_above_ground());
        self.shadow = ShadowState {
            offset_y: -self.position.y + SHADOW_LIFT,
            scale,
            opacity,
        };
    }

    /// Label card: truncated login over the contribution count.
    pub fn label(&self) -> PetLabel {
        PetLabel {
            anchor: self.position - Vec3::Y * (self.scale + LABEL_GAP),
            title: self.login.chars().take(LABEL_MAX_CHARS).collect(),
            subtitle: format!("{} commits", self.contributions),
            size: LABEL_SIZE,
        }
    }
}

impl DrawSource for Pet {
    fn drawables(&self, out: &mut Vec<Drawable>) {
        out.push(Drawable {
            kind: DrawKind::GroundDisc,
            position: self.position + Vec3::Y * self.shadow.offset_y,
            size: Vec2::splat(self.shadow.scale),
            texture: None,
            tint: [0.0, 0.0, 0.0],
            opacity: self.shadow.opacity,
        });
        out.push(Drawable {
            kind: DrawKind::Billboard,
            position: self.position + Vec3::Y * self.avatar_offset_y,
            size: Vec2::splat(self.scale * 2.0),
            texture: self.avatar,
            tint: [1.0, 1.0, 1.0],
            opacity: 1.0,
        });
    }
}
