use glam::Vec3;

/// Split a `0xRRGGBB` sRGB literal into `[r, g, b]` floats in `[0, 1]`.
pub fn hex_color(rgb: u32) -> [f32; 3] {
    [
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Shadow camera parameters for a shadow-casting directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    pub map_size: u32,
    pub near: f32,
    pub far: f32,
    /// Orthographic half-width and half-height of the shadow frustum.
    pub half_extent: f32,
}

/// Directional light shining from `position` towards the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vec3,
    pub shadow: Option<ShadowConfig>,
}

impl DirectionalLight {
    /// Unit vector from the lit surface towards the light.
    pub fn direction(&self) -> Vec3 {
        self.position.normalize_or_zero()
    }
}

/// Ambient plus a sun/fill/rim rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: AmbientLight,
    pub sun: DirectionalLight,
    pub fill: DirectionalLight,
    pub rim: DirectionalLight,
}

impl Lighting {
    pub fn directional(&self) -> [&DirectionalLight; 3] {
        [&self.sun, &self.fill, &self.rim]
    }

    /// The first directional light that casts shadows, with its shadow camera.
    pub fn shadow_caster(&self) -> Option<(&DirectionalLight, &ShadowConfig)> {
        self.directional()
            .into_iter()
            .find_map(|light| light.shadow.as_ref().map(|shadow| (light, shadow)))
    }
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: AmbientLight {
                color: hex_color(0xffffff),
                intensity: 0.5,
            },
            sun: DirectionalLight {
                color: hex_color(0xffffff),
                intensity: 1.2,
                position: Vec3::new(10.0, 20.0, 10.0),
                shadow: Some(ShadowConfig {
                    map_size: 2048,
                    near: 0.5,
                    far: 100.0,
                    half_extent: 30.0,
                }),
            },
            fill: DirectionalLight {
                color: hex_color(0x88aaff),
                intensity: 0.4,
                position: Vec3::new(-10.0, 10.0, -10.0),
                shadow: None,
            },
            rim: DirectionalLight {
                color: hex_color(0xffaa88),
                intensity: 0.3,
                position: Vec3::new(0.0, 5.0, -15.0),
                shadow: None,
            },
        }
    }
}

/// One grid line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLine {
    pub from: Vec3,
    pub to: Vec3,
    pub color: [f32; 3],
}

/// Square line grid on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub size: f32,
    pub divisions: u32,
    pub y: f32,
    pub center_color: [f32; 3],
    pub line_color: [f32; 3],
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            size: 40.0,
            divisions: 40,
            y: -2.0,
            center_color: hex_color(0x444444),
            line_color: hex_color(0x333333),
        }
    }
}

impl GridSpec {
    /// Line segments in both directions; the middle pair uses the centre colour.
    pub fn lines(&self) -> Vec<GridLine> {
        let divisions = self.divisions.max(1);
        let half = self.size / 2.0;
        let step = self.size / divisions as f32;
        let mut lines = Vec::with_capacity((divisions as usize + 1) * 2);

        for i in 0..=divisions {
            let k = -half + i as f32 * step;
            let color = if i == divisions / 2 {
                self.center_color
            } else {
                self.line_color
            };
            lines.push(GridLine {
                from: Vec3::new(-half, self.y, k),
                to: Vec3::new(half, self.y, k),
                color,
            });
            lines.push(GridLine {
                from: Vec3::new(k, self.y, -half),
                to: Vec3::new(k, self.y, half),
                color,
            });
        }
        lines
    }
}

/// Square ground plane that receives shadows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundSpec {
    pub size: f32,
    pub y: f32,
    /// Base colour before lighting.
    pub color: [f32; 3],
    pub receive_shadow: bool,
    pub shadow_opacity: f32,
}

impl Default for GroundSpec {
    fn default() -> Self {
        Self {
            size: 100.0,
            y: -2.0,
            color: hex_color(0x20203a),
            receive_shadow: true,
            shadow_opacity: 0.4,
        }
    }
}

/// Static part of the scene: background, lights, grid and ground.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneDescription {
    pub background: SceneBackground,
    pub lighting: Lighting,
    pub grid: GridSpec,
    pub ground: GroundSpec,
}

/// Clear colour behind everything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBackground(pub [f32; 3]);

impl Default for SceneBackground {
    fn default() -> Self {
        Self(hex_color(0x1a1a2e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_splits_channels() {
        assert_eq!(hex_color(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(hex_color(0x000000), [0.0, 0.0, 0.0]);
        let c = hex_color(0x1a1a2e);
        assert!((c[2] - 46.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn only_the_sun_casts_shadows() {
        let lights = Lighting::default();
        let casters: Vec<_> = lights
            .directional()
            .into_iter()
            .filter(|l| l.shadow.is_some())
            .collect();
        assert_eq!(casters.len(), 1);
        assert_eq!(casters[0].position, Vec3::new(10.0, 20.0, 10.0));

        let (sun, shadow) = lights.shadow_caster().unwrap();
        assert_eq!(sun.position, Vec3::new(10.0, 20.0, 10.0));
        assert_eq!(shadow.map_size, 2048);
    }

    #[test]
    fn no_caster_without_shadow_config() {
        let mut lights = Lighting::default();
        lights.sun.shadow = None;
        assert!(lights.shadow_caster().is_none());

        lights.rim.shadow = Some(ShadowConfig {
            map_size: 512,
            near: 1.0,
            far: 50.0,
            half_extent: 10.0,
        });
        let (light, _) = lights.shadow_caster().unwrap();
        assert_eq!(light.position, lights.rim.position);
    }

    #[test]
    fn grid_has_one_centre_pair() {
        let grid = GridSpec::default();
        let lines = grid.lines();
        assert_eq!(lines.len(), 82);
        let centre = lines.iter().filter(|l| l.color == grid.center_color).count();
        assert_eq!(centre, 2);
        assert!(lines.iter().all(|l| l.from.y == -2.0 && l.to.y == -2.0));
    }

    #[test]
    fn grid_spans_its_size() {
        let lines = GridSpec::default().lines();
        let max_x = lines
            .iter()
            .flat_map(|l| [l.from.x, l.to.x])
            .fold(f32::MIN, f32::max);
        assert_eq!(max_x, 20.0);
    }

    #[test]
    fn default_scene_matches_rig() {
        let scene = SceneDescription::default();
        assert_eq!(scene.ground.y, scene.grid.y);
        assert!(scene.ground.receive_shadow);
        assert_eq!(scene.lighting.ambient.intensity, 0.5);
    }
}
