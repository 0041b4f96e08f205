use crate::shaders;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use petyard_scene::{
    DirectionalLight, DrawKind, Drawable, FrameView, GridSpec, GroundSpec, Lighting,
    SceneDescription, ShadowConfig, TextureHandle,
};
use wgpu::util::DeviceExt;

/// Per-kind instance capacity. Drawables past this are dropped for the frame.
const MAX_INSTANCES: usize = 1024;
const DISC_SEGMENTS: u32 = 32;
const DISC_RADIUS: f32 = 0.5;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Depth offset applied when comparing against the sun's shadow map.
const SUN_SHADOW_BIAS: f32 = 0.002;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    camera_right: [f32; 4],
    camera_up: [f32; 4],
    shadow: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct LightingUniform {
    ambient: [f32; 4],
    directions: [[f32; 4]; 3],
    colors: [[f32; 4]; 3],
}

impl LightingUniform {
    fn from_lighting(lighting: &Lighting) -> Self {
        let ambient = scaled_linear(lighting.ambient.color, lighting.ambient.intensity);
        let mut directions = [[0.0; 4]; 3];
        let mut colors = [[0.0; 4]; 3];
        for (i, light) in lighting.directional().into_iter().enumerate() {
            directions[i] = light.direction().extend(0.0).to_array();
            colors[i] = scaled_linear(light.color, light.intensity);
        }
        Self {
            ambient,
            directions,
            colors,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct GroundVertex {
    position: [f32; 3],
    normal: [f32; 3],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct GridVertex {
    position: [f32; 3],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct DiscVertex {
    position: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct DiscInstance {
    center: [f32; 3],
    scale: f32,
    color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    corner: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct SpriteInstance {
    center: [f32; 3],
    opacity: f32,
    size: [f32; 2],
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_rgba(rgb: [f32; 3], alpha: f32) -> [f32; 4] {
    [
        srgb_to_linear(rgb[0]),
        srgb_to_linear(rgb[1]),
        srgb_to_linear(rgb[2]),
        alpha,
    ]
}

fn scaled_linear(rgb: [f32; 3], intensity: f32) -> [f32; 4] {
    let [r, g, b, _] = linear_rgba(rgb, 1.0);
    [r * intensity, g * intensity, b * intensity, 1.0]
}

/// Orthographic view-projection of a light's shadow camera, aimed at the origin.
fn light_view_projection(light: &DirectionalLight, shadow: &ShadowConfig) -> Mat4 {
    let h = shadow.half_extent;
    let up = if light.direction().cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    Mat4::orthographic_rh(-h, h, -h, h, shadow.near, shadow.far)
        * Mat4::look_at_rh(light.position, Vec3::ZERO, up)
}

/// Sun shadow state derived from the scene: the light's view-projection and
/// the ground's `[opacity, texel size, bias, 0]`. Opacity is zero when the
/// ground does not receive shadows or nothing casts them.
fn sun_shadow(scene: &SceneDescription) -> (Mat4, [f32; 4], u32) {
    match scene.lighting.shadow_caster() {
        Some((light, shadow)) => {
            let size = shadow.map_size.max(1);
            let opacity = if scene.ground.receive_shadow {
                scene.ground.shadow_opacity.clamp(0.0, 1.0)
            } else {
                0.0
            };
            (
                light_view_projection(light, shadow),
                [opacity, 1.0 / size as f32, SUN_SHADOW_BIAS, 0.0],
                size,
            )
        }
        None => (Mat4::IDENTITY, [0.0, 1.0, SUN_SHADOW_BIAS, 0.0], 1),
    }
}

/// Two triangles covering the ground square, normal pointing up.
fn ground_mesh(spec: &GroundSpec) -> Vec<GroundVertex> {
    let h = spec.size / 2.0;
    let y = spec.y;
    let color = linear_rgba(spec.color, 1.0);
    let v = |x: f32, z: f32| GroundVertex {
        position: [x, y, z],
        normal: [0.0, 1.0, 0.0],
        color,
    };
    vec![
        v(-h, h),
        v(h, h),
        v(h, -h),
        v(h, -h),
        v(-h, -h),
        v(-h, h),
    ]
}

/// Line-list vertices for the grid.
fn grid_mesh(spec: &GridSpec) -> Vec<GridVertex> {
    spec.lines()
        .into_iter()
        .flat_map(|line| {
            let color = linear_rgba(line.color, 1.0);
            [
                GridVertex {
                    position: line.from.to_array(),
                    color,
                },
                GridVertex {
                    position: line.to.to_array(),
                    color,
                },
            ]
        })
        .collect()
}

/// Unit-diameter disc in the XZ plane as a triangle fan expanded to a list.
fn disc_mesh() -> Vec<DiscVertex> {
    let mut verts = Vec::with_capacity(DISC_SEGMENTS as usize * 3);
    let point = |i: u32| {
        let a = i as f32 / DISC_SEGMENTS as f32 * std::f32::consts::TAU;
        DiscVertex {
            position: [a.cos() * DISC_RADIUS, 0.0, a.sin() * DISC_RADIUS],
        }
    };
    for i in 0..DISC_SEGMENTS {
        verts.push(DiscVertex {
            position: [0.0, 0.0, 0.0],
        });
        verts.push(point(i));
        verts.push(point(i + 1));
    }
    verts
}

/// Unit quad centred on the origin; UV origin at the top-left.
fn quad_mesh() -> Vec<QuadVertex> {
    let v = |x: f32, y: f32, u: f32, t: f32| QuadVertex {
        corner: [x, y],
        uv: [u, t],
    };
    vec![
        v(-0.5, -0.5, 0.0, 1.0),
        v(0.5, -0.5, 1.0, 1.0),
        v(0.5, 0.5, 1.0, 0.0),
        v(0.5, 0.5, 1.0, 0.0),
        v(-0.5, 0.5, 0.0, 0.0),
        v(-0.5, -0.5, 0.0, 1.0),
    ]
}

/// Split drawables into shadow-disc instances and sprites sorted far to near.
fn build_instances(
    drawables: &[Drawable],
    eye: Vec3,
) -> (Vec<DiscInstance>, Vec<(SpriteInstance, Option<TextureHandle>)>) {
    let mut discs = Vec::new();
    let mut sprites: Vec<(f32, SpriteInstance, Option<TextureHandle>)> = Vec::new();

    for d in drawables {
        match d.kind {
            DrawKind::GroundDisc => {
                if discs.len() < MAX_INSTANCES {
                    discs.push(DiscInstance {
                        center: d.position.to_array(),
                        scale: d.size.x,
                        color: linear_rgba(d.tint, d.opacity),
                    });
                }
            }
            DrawKind::Billboard => {
                if sprites.len() < MAX_INSTANCES {
                    let instance = SpriteInstance {
                        center: d.position.to_array(),
                        opacity: d.opacity,
                        size: d.size.to_array(),
                    };
                    sprites.push((d.position.distance_squared(eye), instance, d.texture));
                }
            }
        }
    }

    sprites.sort_by(|a, b| b.0.total_cmp(&a.0));
    let sprites = sprites.into_iter().map(|(_, s, t)| (s, t)).collect();
    (discs, sprites)
}

struct GpuTexture {
    bind_group: wgpu::BindGroup,
    _texture: wgpu::Texture,
}

struct PipelineSpec<'a> {
    label: &'a str,
    shader: &'a wgpu::ShaderModule,
    layout: &'a wgpu::PipelineLayout,
    vs: &'a str,
    fs: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
    /// `None` builds a depth-only pipeline.
    blend: Option<wgpu::BlendState>,
    depth_write: bool,
    depth_bias: wgpu::DepthBiasState,
}

fn create_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    spec: PipelineSpec<'_>,
) -> wgpu::RenderPipeline {
    let targets: Vec<Option<wgpu::ColorTargetState>> = spec
        .blend
        .map(|blend| wgpu::ColorTargetState {
            format,
            blend: Some(blend),
            write_mask: wgpu::ColorWrites::ALL,
        })
        .into_iter()
        .map(Some)
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(spec.layout),
        vertex: wgpu::VertexState {
            module: spec.shader,
            entry_point: Some(spec.vs),
            compilation_options: Default::default(),
            buffers: spec.buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.shader,
            entry_point: Some(spec.fs),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: spec.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: spec.depth_bias,
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

/// wgpu-based pet scene renderer.
pub struct WgpuRenderer {
    ground_pipeline: wgpu::RenderPipeline,
    grid_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    sprite_pipeline: wgpu::RenderPipeline,
    caster_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    sun_shadow_map: wgpu::TextureView,
    sun_shadow_bind_group: wgpu::BindGroup,
    light_view_proj: Mat4,
    shadow_params: [f32; 4],
    casts_shadows: bool,
    frame_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    ground_vertex_buffer: wgpu::Buffer,
    ground_vertex_count: u32,
    grid_vertex_buffer: wgpu::Buffer,
    grid_vertex_count: u32,
    disc_vertex_buffer: wgpu::Buffer,
    disc_vertex_count: u32,
    quad_vertex_buffer: wgpu::Buffer,
    disc_instance_buffer: wgpu::Buffer,
    sprite_instance_buffer: wgpu::Buffer,
    textures: Vec<GpuTexture>,
    fallback_texture: TextureHandle,
    clear_color: wgpu::Color,
    depth_texture: wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        scene: &SceneDescription,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform_buffer"),
            contents: bytemuck::bytes_of(&Uniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                light_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                camera_right: [1.0, 0.0, 0.0, 0.0],
                camera_up: [0.0, 1.0, 0.0, 0.0],
                shadow: [0.0; 4],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let lighting_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lighting_buffer"),
            contents: bytemuck::bytes_of(&LightingUniform::from_lighting(&scene.lighting)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let uniform_entry = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_buffer.as_entire_binding(),
                },
            ],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let (light_view_proj, shadow_params, shadow_map_size) = sun_shadow(scene);
        let casts_shadows = scene.lighting.shadow_caster().is_some();

        let sun_shadow_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sun_shadow_map"),
            size: wgpu::Extent3d {
                width: shadow_map_size,
                height: shadow_map_size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let sun_shadow_map = sun_shadow_texture.create_view(&Default::default());
        let sun_shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sun_shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let sun_shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sun_shadow_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let sun_shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sun_shadow_bind_group"),
            layout: &sun_shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&sun_shadow_map),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sun_shadow_sampler),
                },
            ],
        });

        let ground_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ground_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &sun_shadow_layout],
            push_constant_ranges: &[],
        });
        let world_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("world_pipeline_layout"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });
        let sprite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let shader = |label: &str, source: String| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let ground_shader = shader("ground_shader", shaders::ground_shader());
        let grid_shader = shader("grid_shader", shaders::grid_shader());
        let shadow_shader = shader("shadow_shader", shaders::shadow_shader());
        let sprite_shader = shader("sprite_shader", shaders::sprite_shader());

        // The ground is a backdrop: it never occludes anything drawn after it.
        let ground_pipeline = create_pipeline(
            device,
            surface_format,
            PipelineSpec {
                label: "ground_pipeline",
                shader: &ground_shader,
                layout: &ground_layout,
                vs: "vs_ground",
                fs: "fs_ground",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<GroundVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x3,
                        1 => Float32x3,
                        2 => Float32x4,
                    ],
                }],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: Some(wgpu::BlendState::REPLACE),
                depth_write: false,
                depth_bias: Default::default(),
            },
        );

        let grid_pipeline = create_pipeline(
            device,
            surface_format,
            PipelineSpec {
                label: "grid_pipeline",
                shader: &grid_shader,
                layout: &world_layout,
                vs: "vs_grid",
                fs: "fs_grid",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<GridVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x3,
                        1 => Float32x4,
                    ],
                }],
                topology: wgpu::PrimitiveTopology::LineList,
                blend: Some(wgpu::BlendState::REPLACE),
                depth_write: true,
                depth_bias: Default::default(),
            },
        );

        let shadow_pipeline = create_pipeline(
            device,
            surface_format,
            PipelineSpec {
                label: "shadow_pipeline",
                shader: &shadow_shader,
                layout: &world_layout,
                vs: "vs_shadow",
                fs: "fs_shadow",
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<DiscVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<DiscInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x3,
                            3 => Float32,
                            4 => Float32x4,
                        ],
                    },
                ],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                depth_write: false,
                depth_bias: Default::default(),
            },
        );

        let sprite_pipeline = create_pipeline(
            device,
            surface_format,
            PipelineSpec {
                label: "sprite_pipeline",
                shader: &sprite_shader,
                layout: &sprite_layout,
                vs: "vs_sprite",
                fs: "fs_sprite",
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x2,
                            1 => Float32x2,
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<SpriteInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x3,
                            3 => Float32,
                            4 => Float32x2,
                        ],
                    },
                ],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                depth_write: true,
                depth_bias: Default::default(),
            },
        );

        let caster_pipeline = create_pipeline(
            device,
            surface_format,
            PipelineSpec {
                label: "sun_shadow_caster_pipeline",
                shader: &sprite_shader,
                layout: &sprite_layout,
                vs: "vs_sprite_shadow",
                fs: "fs_sprite_shadow",
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x2,
                            1 => Float32x2,
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<SpriteInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x3,
                            3 => Float32,
                            4 => Float32x2,
                        ],
                    },
                ],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: None,
                depth_write: true,
                depth_bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            },
        );

        let vertex_buffer = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            })
        };

        let ground_verts = ground_mesh(&scene.ground);
        let grid_verts = grid_mesh(&scene.grid);
        let disc_verts = disc_mesh();
        let quad_verts = quad_mesh();

        let ground_vertex_buffer =
            vertex_buffer("ground_vertex_buffer", bytemuck::cast_slice(&ground_verts));
        let grid_vertex_buffer =
            vertex_buffer("grid_vertex_buffer", bytemuck::cast_slice(&grid_verts));
        let disc_vertex_buffer =
            vertex_buffer("disc_vertex_buffer", bytemuck::cast_slice(&disc_verts));
        let quad_vertex_buffer =
            vertex_buffer("quad_vertex_buffer", bytemuck::cast_slice(&quad_verts));

        let instance_buffer = |label: &str, stride: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: (MAX_INSTANCES * stride) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let disc_instance_buffer =
            instance_buffer("disc_instance_buffer", std::mem::size_of::<DiscInstance>());
        let sprite_instance_buffer =
            instance_buffer("sprite_instance_buffer", std::mem::size_of::<SpriteInstance>());

        let [r, g, b, _] = linear_rgba(scene.background.0, 1.0);
        let clear_color = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };

        let depth_texture = Self::create_depth_texture(device, width, height);

        let mut renderer = Self {
            ground_pipeline,
            grid_pipeline,
            shadow_pipeline,
            sprite_pipeline,
            caster_pipeline,
            uniform_buffer,
            sun_shadow_map,
            sun_shadow_bind_group,
            light_view_proj,
            shadow_params,
            casts_shadows,
            frame_bind_group,
            texture_layout,
            sampler,
            ground_vertex_count: ground_verts.len() as u32,
            ground_vertex_buffer,
            grid_vertex_count: grid_verts.len() as u32,
            grid_vertex_buffer,
            disc_vertex_count: disc_verts.len() as u32,
            disc_vertex_buffer,
            quad_vertex_buffer,
            disc_instance_buffer,
            sprite_instance_buffer,
            textures: Vec::new(),
            fallback_texture: TextureHandle(0),
            clear_color,
            depth_texture,
            surface_format,
        };

        // Plain white, matching an unmapped sprite material.
        renderer.fallback_texture = renderer.upload_texture(device, queue, 1, 1, &[255; 4]);
        renderer
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = Self::create_depth_texture(device, width, height);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// Upload straight-alpha sRGB RGBA8 pixels and return a handle for drawables.
    pub fn upload_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> TextureHandle {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sprite_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(GpuTexture {
            bind_group,
            _texture: texture,
        });
        tracing::debug!(handle = handle.0, width, height, "texture uploaded");
        handle
    }

    /// Texture used for billboards that have none of their own.
    pub fn set_fallback_texture(&mut self, handle: TextureHandle) {
        if (handle.0 as usize) < self.textures.len() {
            self.fallback_texture = handle;
        }
    }

    fn texture_bind_group(&self, handle: Option<TextureHandle>) -> &wgpu::BindGroup {
        let fallback = &self.textures[self.fallback_texture.0 as usize].bind_group;
        handle
            .and_then(|h| self.textures.get(h.0 as usize))
            .map(|t| &t.bind_group)
            .unwrap_or(fallback)
    }

    /// Render one frame: the sun's shadow map from the billboards, then ground,
    /// grid, contact shadows and sprites back to front.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        frame: &FrameView<'_>,
    ) {
        let camera = frame.camera;
        let (right, up) = camera.billboard_axes();
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                view_proj: camera.view_projection().to_cols_array_2d(),
                light_view_proj: self.light_view_proj.to_cols_array_2d(),
                camera_right: right.extend(0.0).to_array(),
                camera_up: up.extend(0.0).to_array(),
                shadow: self.shadow_params,
            }),
        );

        let (discs, sprites) = build_instances(frame.drawables, camera.eye());
        if !discs.is_empty() {
            queue.write_buffer(&self.disc_instance_buffer, 0, bytemuck::cast_slice(&discs));
        }
        if !sprites.is_empty() {
            let instances: Vec<SpriteInstance> = sprites.iter().map(|(s, _)| *s).collect();
            queue.write_buffer(
                &self.sprite_instance_buffer,
                0,
                bytemuck::cast_slice(&instances),
            );
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        // Cleared every frame so the ground always samples an initialised map.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sun_shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.sun_shadow_map,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            if self.casts_shadows && !sprites.is_empty() {
                pass.set_bind_group(0, &self.frame_bind_group, &[]);
                pass.set_pipeline(&self.caster_pipeline);
                pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, self.sprite_instance_buffer.slice(..));
                for (i, (_, texture)) in sprites.iter().enumerate() {
                    let i = i as u32;
                    pass.set_bind_group(1, self.texture_bind_group(*texture), &[]);
                    pass.draw(0..6, i..i + 1);
                }
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_bind_group(0, &self.frame_bind_group, &[]);

            pass.set_pipeline(&self.ground_pipeline);
            pass.set_bind_group(1, &self.sun_shadow_bind_group, &[]);
            pass.set_vertex_buffer(0, self.ground_vertex_buffer.slice(..));
            pass.draw(0..self.ground_vertex_count, 0..1);

            pass.set_pipeline(&self.grid_pipeline);
            pass.set_vertex_buffer(0, self.grid_vertex_buffer.slice(..));
            pass.draw(0..self.grid_vertex_count, 0..1);

            if !discs.is_empty() {
                pass.set_pipeline(&self.shadow_pipeline);
                pass.set_vertex_buffer(0, self.disc_vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, self.disc_instance_buffer.slice(..));
                pass.draw(0..self.disc_vertex_count, 0..discs.len() as u32);
            }

            if !sprites.is_empty() {
                pass.set_pipeline(&self.sprite_pipeline);
                pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, self.sprite_instance_buffer.slice(..));
                for (i, (_, texture)) in sprites.iter().enumerate() {
                    let i = i as u32;
                    pass.set_bind_group(1, self.texture_bind_group(*texture), &[]);
                    pass.draw(0..6, i..i + 1);
                }
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn sprite(z: f32, texture: u32) -> Drawable {
        Drawable {
            kind: DrawKind::Billboard,
            position: Vec3::new(0.0, 1.0, z),
            size: Vec2::splat(2.0),
            texture: Some(TextureHandle(texture)),
            tint: [1.0, 1.0, 1.0],
            opacity: 1.0,
        }
    }

    #[test]
    fn sprites_sort_far_to_near() {
        let eye = Vec3::new(0.0, 1.0, 20.0);
        let drawables = [sprite(10.0, 1), sprite(-10.0, 2), sprite(0.0, 3)];
        let (discs, sprites) = build_instances(&drawables, eye);
        assert!(discs.is_empty());
        let order: Vec<u32> = sprites.iter().map(|(_, t)| t.unwrap().0).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn discs_carry_opacity_and_size() {
        let disc = Drawable {
            kind: DrawKind::GroundDisc,
            position: Vec3::new(1.0, 0.01, 2.0),
            size: Vec2::splat(1.5),
            texture: None,
            tint: [0.0, 0.0, 0.0],
            opacity: 0.2,
        };
        let (discs, sprites) = build_instances(&[disc], Vec3::ZERO);
        assert!(sprites.is_empty());
        assert_eq!(
            discs,
            vec![DiscInstance {
                center: [1.0, 0.01, 2.0],
                scale: 1.5,
                color: [0.0, 0.0, 0.0, 0.2],
            }]
        );
    }

    #[test]
    fn instance_capacity_is_enforced() {
        let drawables: Vec<Drawable> = (0..MAX_INSTANCES + 10).map(|i| sprite(i as f32, 0)).collect();
        let (_, sprites) = build_instances(&drawables, Vec3::ZERO);
        assert_eq!(sprites.len(), MAX_INSTANCES);
    }

    #[test]
    fn disc_mesh_is_closed_fan() {
        let verts = disc_mesh();
        assert_eq!(verts.len(), DISC_SEGMENTS as usize * 3);
        for v in &verts {
            let r = (v.position[0].powi(2) + v.position[2].powi(2)).sqrt();
            assert!(r < 1e-6 || (r - DISC_RADIUS).abs() < 1e-5);
            assert_eq!(v.position[1], 0.0);
        }
    }

    #[test]
    fn grid_mesh_has_two_vertices_per_line() {
        let spec = GridSpec::default();
        assert_eq!(grid_mesh(&spec).len(), spec.lines().len() * 2);
    }

    #[test]
    fn ground_mesh_sits_at_ground_height() {
        let spec = GroundSpec::default();
        let verts = ground_mesh(&spec);
        assert_eq!(verts.len(), 6);
        assert!(verts.iter().all(|v| v.position[1] == spec.y));
    }

    #[test]
    fn srgb_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!(srgb_to_linear(0.5) < 0.5);
    }

    #[test]
    fn lighting_uniform_scales_by_intensity() {
        let lighting = Lighting::default();
        let u = LightingUniform::from_lighting(&lighting);
        assert!((u.ambient[0] - 0.5).abs() < 1e-6);
        assert!((u.colors[0][0] - 1.2).abs() < 1e-6);
        let sun_dir = Vec3::from_slice(&u.directions[0][..3]);
        assert!((sun_dir.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn sun_camera_sees_the_yard() {
        let lighting = Lighting::default();
        let (sun, shadow) = lighting.shadow_caster().unwrap();
        let light = light_view_projection(sun, shadow);
        for point in [Vec3::ZERO, Vec3::new(10.0, -2.0, -10.0), Vec3::new(-8.0, 3.0, 6.0)] {
            let clip = light.project_point3(point);
            assert!(clip.x.abs() <= 1.0 && clip.y.abs() <= 1.0, "{point} -> {clip}");
            assert!(clip.z > 0.0 && clip.z < 1.0, "{point} -> {clip}");
        }
        // Closer to the sun means smaller depth.
        let near = light.project_point3(Vec3::new(0.0, 4.0, 0.0));
        let far = light.project_point3(Vec3::new(0.0, -2.0, 0.0));
        assert!(near.z < far.z);
    }

    #[test]
    fn straight_down_light_still_has_a_camera() {
        let mut sun = Lighting::default().sun;
        sun.position = Vec3::new(0.0, 30.0, 0.0);
        let shadow = sun.shadow.unwrap();
        let light = light_view_projection(&sun, &shadow);
        assert!(light.is_finite());
        let origin = light.project_point3(Vec3::ZERO);
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);
    }

    #[test]
    fn ground_shadow_follows_scene_settings() {
        let scene = SceneDescription::default();
        let (_, params, size) = sun_shadow(&scene);
        assert_eq!(size, 2048);
        assert!((params[0] - 0.4).abs() < 1e-6);
        assert!((params[1] - 1.0 / 2048.0).abs() < 1e-9);
        assert_eq!(params[2], SUN_SHADOW_BIAS);

        let mut unlit = SceneDescription::default();
        unlit.ground.receive_shadow = false;
        assert_eq!(sun_shadow(&unlit).1[0], 0.0);

        let mut no_caster = SceneDescription::default();
        no_caster.lighting.sun.shadow = None;
        let (light, params, size) = sun_shadow(&no_caster);
        assert_eq!(light, Mat4::IDENTITY);
        assert_eq!(params[0], 0.0);
        assert_eq!(size, 1);
    }

    #[test]
    fn uniform_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 176);
        assert_eq!(std::mem::size_of::<LightingUniform>(), 112);
        assert_eq!(std::mem::size_of::<SpriteInstance>(), 24);
        assert_eq!(std::mem::size_of::<DiscInstance>(), 32);
    }
}
