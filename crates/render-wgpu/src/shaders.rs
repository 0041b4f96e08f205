/// Uniform and lighting declarations shared by every pipeline.
const FRAME_BINDINGS: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    camera_right: vec4<f32>,
    camera_up: vec4<f32>,
    // x: ground shadow opacity, y: shadow map texel size, z: depth bias
    shadow: vec4<f32>,
};

struct Lighting {
    ambient: vec4<f32>,
    directions: array<vec4<f32>, 3>,
    colors: array<vec4<f32>, 3>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@group(0) @binding(1)
var<uniform> lighting: Lighting;
"#;

/// Lit ground plane that receives the sun's shadow.
const GROUND_BODY: &str = r#"
@group(1) @binding(0)
var shadow_map: texture_depth_2d;

@group(1) @binding(1)
var shadow_sampler: sampler_comparison;

struct GroundVertex {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

struct GroundOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) world: vec3<f32>,
};

@vertex
fn vs_ground(vertex: GroundVertex) -> GroundOutput {
    var out: GroundOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(vertex.position, 1.0);
    out.normal = vertex.normal;
    out.color = vertex.color;
    out.world = vertex.position;
    return out;
}

// Fraction of a 3x3 neighbourhood the sun can see. Outside the map counts as lit.
fn sun_visibility(world: vec3<f32>) -> f32 {
    let clip = uniforms.light_view_proj * vec4<f32>(world, 1.0);
    let ndc = clip.xyz / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if (any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) || ndc.z > 1.0) {
        return 1.0;
    }
    let texel = uniforms.shadow.y;
    var lit = 0.0;
    for (var y = -1; y <= 1; y = y + 1) {
        for (var x = -1; x <= 1; x = x + 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            lit = lit + textureSampleCompareLevel(
                shadow_map,
                shadow_sampler,
                uv + offset,
                ndc.z - uniforms.shadow.z,
            );
        }
    }
    return lit / 9.0;
}

@fragment
fn fs_ground(in: GroundOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.normal);
    var light = lighting.ambient.rgb;
    for (var i = 0u; i < 3u; i = i + 1u) {
        let diffuse = max(dot(n, normalize(lighting.directions[i].xyz)), 0.0);
        light = light + lighting.colors[i].rgb * diffuse;
    }
    let shade = 1.0 - uniforms.shadow.x * (1.0 - sun_visibility(in.world));
    return vec4<f32>(in.color.rgb * light * shade, 1.0);
}
"#;

/// Unlit coloured grid lines.
const GRID_BODY: &str = r#"
struct GridVertex {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct GridOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_grid(vertex: GridVertex) -> GridOutput {
    var out: GridOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(vertex.position, 1.0);
    out.color = vertex.color;
    return out;
}

@fragment
fn fs_grid(in: GridOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Instanced translucent shadow discs lying on the ground.
const SHADOW_BODY: &str = r#"
struct DiscVertex {
    @location(0) position: vec3<f32>,
};

struct DiscInstance {
    @location(2) center: vec3<f32>,
    @location(3) scale: f32,
    @location(4) color: vec4<f32>,
};

struct DiscOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_shadow(vertex: DiscVertex, instance: DiscInstance) -> DiscOutput {
    let world = instance.center + vertex.position * instance.scale;
    var out: DiscOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(world, 1.0);
    out.color = instance.color;
    return out;
}

@fragment
fn fs_shadow(in: DiscOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Camera-facing textured quads.
const SPRITE_BODY: &str = r#"
@group(1) @binding(0)
var sprite_texture: texture_2d<f32>;

@group(1) @binding(1)
var sprite_sampler: sampler;

struct QuadVertex {
    @location(0) corner: vec2<f32>,
    @location(1) uv: vec2<f32>,
};

struct SpriteInstance {
    @location(2) center: vec3<f32>,
    @location(3) opacity: f32,
    @location(4) size: vec2<f32>,
};

struct SpriteOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) opacity: f32,
};

fn billboard_corner(corner: vec2<f32>, center: vec3<f32>, size: vec2<f32>) -> vec4<f32> {
    let offset = uniforms.camera_right.xyz * corner.x * size.x
        + uniforms.camera_up.xyz * corner.y * size.y;
    return vec4<f32>(center + offset, 1.0);
}

@vertex
fn vs_sprite(vertex: QuadVertex, instance: SpriteInstance) -> SpriteOutput {
    var out: SpriteOutput;
    out.clip_position = uniforms.view_proj * billboard_corner(vertex.corner, instance.center, instance.size);
    out.uv = vertex.uv;
    out.opacity = instance.opacity;
    return out;
}

// Same billboard as seen by the sun, for the shadow map.
@vertex
fn vs_sprite_shadow(vertex: QuadVertex, instance: SpriteInstance) -> SpriteOutput {
    var out: SpriteOutput;
    out.clip_position = uniforms.light_view_proj * billboard_corner(vertex.corner, instance.center, instance.size);
    out.uv = vertex.uv;
    out.opacity = instance.opacity;
    return out;
}

@fragment
fn fs_sprite(in: SpriteOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(sprite_texture, sprite_sampler, in.uv);
    let alpha = texel.a * in.opacity;
    if (alpha < 0.02) {
        discard;
    }
    return vec4<f32>(texel.rgb, alpha);
}

@fragment
fn fs_sprite_shadow(in: SpriteOutput) {
    let texel = textureSample(sprite_texture, sprite_sampler, in.uv);
    if (texel.a * in.opacity < 0.5) {
        discard;
    }
}
"#;

pub fn ground_shader() -> String {
    format!("{FRAME_BINDINGS}{GROUND_BODY}")
}

pub fn grid_shader() -> String {
    format!("{FRAME_BINDINGS}{GRID_BODY}")
}

pub fn shadow_shader() -> String {
    format!("{FRAME_BINDINGS}{SHADOW_BODY}")
}

pub fn sprite_shader() -> String {
    format!("{FRAME_BINDINGS}{SPRITE_BODY}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shader_declares_frame_bindings() {
        for src in [ground_shader(), grid_shader(), shadow_shader(), sprite_shader()] {
            assert!(src.contains("var<uniform> uniforms: Uniforms;"));
            assert!(src.contains("@vertex"));
            assert!(src.contains("@fragment"));
        }
    }

    #[test]
    fn ground_samples_the_shadow_map_and_sprites_cast_into_it() {
        let ground = ground_shader();
        assert!(ground.contains("texture_depth_2d"));
        assert!(ground.contains("textureSampleCompareLevel"));
        let sprite = sprite_shader();
        assert!(sprite.contains("fn vs_sprite_shadow"));
        assert!(sprite.contains("fn fs_sprite_shadow"));
    }
}
