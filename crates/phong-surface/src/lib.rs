//! Blinn-Phong surface shader with soft shadows for wgpu
//!
//! Two programs live here:
//! - the **moment pass**, which rasterizes geometry from the light and writes
//!   `(z, z²)` of light-space depth into an `Rg32Float` target;
//! - the **surface pass**, which shades with Lambert + Blinn-Phong and scales
//!   diffuse and specular by a shadow factor computed from the moment map and
//!   its summed-area table (basic, PCF, PCSS or VSSM).
//!
//! ## Usage
//!
//! ```ignore
//! use phong_surface::{create_bind_group_layouts, create_pipeline, PipelineConfig};
//!
//! let layouts = create_bind_group_layouts(&device);
//! let moments = phong_surface::create_moment_pipeline(&device, &layouts);
//! let surface = create_pipeline(&device, &layouts, &PipelineConfig::default());
//! ```

mod params;

pub use params::{
    CameraUniform, LightUniform, MaterialUniform, ModelUniform, MomentPassUniform, ShadowUniform,
    LIGHT_DIRECTIONAL, LIGHT_POINT, LIGHT_SPOT,
};

/// Format of the moment map and of both SAT textures
pub const MOMENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg32Float;

/// Face culling of the light pass. Both faces are drawn: single-sided
/// receivers such as a ground quad must reach the moment map even when they
/// face away from the light's winding.
pub const MOMENT_CULL_MODE: Option<wgpu::Face> = None;

/// Depth format used by the light pass and the camera pass
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Surface shader, with the lighting and shadow libraries prepended
pub const SHADER_SOURCE: &str = concat!(
    include_str!("shaders/lib/lighting.wgsl"),
    "\n",
    include_str!("shaders/lib/shadow.wgsl"),
    "\n",
    include_str!("shaders/surface.wgsl"),
);

/// Moment pass shader source
pub const MOMENT_SHADER_SOURCE: &str = include_str!("shaders/moments.wgsl");

/// Shader library modules (for composing custom surface shaders)
pub mod shader_lib {
    pub const LIGHTING: &str = include_str!("shaders/lib/lighting.wgsl");
    pub const SHADOW: &str = include_str!("shaders/lib/shadow.wgsl");
}

/// Vertex buffer layout for standard mesh
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    }
}

/// Mesh vertex
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: Option<std::num::NonZeroU64>,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: size,
        },
        count: None,
    }
}

// Rg32Float is not filterable without FLOAT32_FILTERABLE; shaders use textureLoad.
fn moment_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_size<T>() -> Option<std::num::NonZeroU64> {
    std::num::NonZeroU64::new(std::mem::size_of::<T>() as u64)
}

/// Create bind group layouts for the surface and moment pipelines
pub fn create_bind_group_layouts(device: &wgpu::Device) -> BindGroupLayouts {
    // Group 0: per-frame state
    let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("phong_surface_frame"),
        entries: &[
            // Camera
            uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                uniform_size::<CameraUniform>(),
            ),
            // Light
            uniform_entry(1, wgpu::ShaderStages::FRAGMENT, uniform_size::<LightUniform>()),
            // Shadow parameters
            uniform_entry(2, wgpu::ShaderStages::FRAGMENT, uniform_size::<ShadowUniform>()),
            // Moment map
            moment_texture_entry(3),
            // Summed-area table
            moment_texture_entry(4),
        ],
    });

    // Group 1: per-object transform + material
    let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("phong_surface_object"),
        entries: &[
            uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                uniform_size::<ModelUniform>(),
            ),
            uniform_entry(1, wgpu::ShaderStages::FRAGMENT, uniform_size::<MaterialUniform>()),
        ],
    });

    // Moment pass: just the light view-proj uniform
    let moment_pass = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("moment_pass_uniform"),
        entries: &[uniform_entry(
            0,
            wgpu::ShaderStages::VERTEX,
            uniform_size::<MomentPassUniform>(),
        )],
    });

    BindGroupLayouts {
        frame,
        object,
        moment_pass,
    }
}

/// Bind group layouts for the phong surface
pub struct BindGroupLayouts {
    /// Group 0: camera, light, shadow parameters, moment map, SAT
    pub frame: wgpu::BindGroupLayout,
    /// Group 1: model transform + material
    pub object: wgpu::BindGroupLayout,
    /// Moment pass group 0: light view-proj uniform
    pub moment_pass: wgpu::BindGroupLayout,
}

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Debug label for the pipeline (defaults to "phong_surface_pipeline")
    pub label: Option<&'static str>,
    /// Color target format
    pub format: wgpu::TextureFormat,
    /// Depth texture format (None to disable depth)
    pub depth_format: Option<wgpu::TextureFormat>,
    /// Cull mode
    pub cull_mode: Option<wgpu::Face>,
    /// Fragment entry point (defaults to "fs_main")
    pub fragment_entry: Option<&'static str>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: None,
            format: wgpu::TextureFormat::Rgba8Unorm,
            depth_format: Some(DEPTH_FORMAT),
            cull_mode: Some(wgpu::Face::Back),
            fragment_entry: None,
        }
    }
}

/// Create the moment pipeline (renders `(z, z²)` from the light's perspective)
///
/// Nothing is culled, so every receiver writes its depth. Self-shadowing of
/// lit surfaces is held off by the depth bias and the variance floor.
pub fn create_moment_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("moment_shader"),
        source: wgpu::ShaderSource::Wgsl(MOMENT_SHADER_SOURCE.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("moment_pipeline_layout"),
        bind_group_layouts: &[&layouts.moment_pass, &layouts.object],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("moment_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_moments"),
            compilation_options: Default::default(),
            buffers: &[vertex_buffer_layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: MOMENT_CULL_MODE,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_moments"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: MOMENT_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

/// Create the surface render pipeline
pub fn create_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    config: &PipelineConfig,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("phong_surface_shader"),
        source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("phong_surface_pipeline_layout"),
        bind_group_layouts: &[&layouts.frame, &layouts.object],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(config.label.unwrap_or("phong_surface_pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex_buffer_layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: config.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: config.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some(config.fragment_entry.unwrap_or("fs_main")),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: config.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

/// Create a uniform buffer initialised with `value`
pub fn create_uniform_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    label: &str,
    value: &T,
) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(value),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Create an object bind group (model transform + material)
pub fn create_object_bind_group(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    model: &wgpu::Buffer,
    material: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("object_bind_group"),
        layout: &layouts.object,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: model.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: material.as_entire_binding(),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    // === Size and alignment tests ===

    #[test]
    fn test_camera_uniform_size() {
        // mat4 + vec4 = 64 + 16
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
    }

    #[test]
    fn test_light_uniform_size() {
        // 6 vec4
        assert_eq!(std::mem::size_of::<LightUniform>(), 96);
    }

    #[test]
    fn test_moment_pass_draws_both_faces() {
        // A culled receiver leaves far-plane texels and shrinks the penumbra
        assert_eq!(MOMENT_CULL_MODE, None);
    }

    #[test]
    fn test_shadow_uniform_size() {
        // mat4 + 12 scalars = 64 + 48
        assert_eq!(std::mem::size_of::<ShadowUniform>(), 112);
        assert_eq!(std::mem::size_of::<ShadowUniform>() % 16, 0);
    }

    #[test]
    fn test_object_uniform_sizes() {
        assert_eq!(std::mem::size_of::<ModelUniform>(), 128);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 16);
        assert_eq!(std::mem::size_of::<MomentPassUniform>(), 64);
    }

    #[test]
    fn test_vertex_size() {
        // position(12) + normal(12) + uv(8) = 32 bytes
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    // === Default values tests ===

    #[test]
    fn test_default_light() {
        let l = LightUniform::default();
        assert_eq!(l.position_kind.w as u32, LIGHT_POINT);
        assert_eq!(l.coefficients.x, 0.1);
        assert_eq!(l.attenuation.x, 1.0);
        // inner cone is narrower than outer: larger cosine
        assert!(l.cone.x > l.cone.y);
    }

    #[test]
    fn test_default_shadow() {
        let s = ShadowUniform::default();
        assert_eq!(s.mode, 0);
        assert_eq!(s.map_size, 1024);
        assert_eq!(s.pcf_radius, 3);
        assert!(s.near < s.far);
    }

    #[test]
    fn test_model_normal_matrix() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let m = ModelUniform::new(model);
        // Non-uniform scale: normal matrix is the inverse scale
        assert!((m.normal_matrix.x_axis.x - 0.5).abs() < 1e-6);
        assert_eq!(m.normal_matrix.y_axis.y, 1.0);
    }

    // === Shader source tests ===

    #[test]
    fn test_shader_entry_points() {
        assert!(SHADER_SOURCE.contains("fn vs_main"));
        assert!(SHADER_SOURCE.contains("fn fs_main"));
        assert!(SHADER_SOURCE.contains("fn fs_emissive"));
        assert!(MOMENT_SHADER_SOURCE.contains("fn vs_moments"));
        assert!(MOMENT_SHADER_SOURCE.contains("fn fs_moments"));
    }

    #[test]
    fn test_shader_bindings() {
        assert!(SHADER_SOURCE.contains("@group(0) @binding(0)")); // camera
        assert!(SHADER_SOURCE.contains("@group(0) @binding(1)")); // light
        assert!(SHADER_SOURCE.contains("@group(0) @binding(2)")); // shadow
        assert!(SHADER_SOURCE.contains("@group(0) @binding(3)")); // moment map
        assert!(SHADER_SOURCE.contains("@group(0) @binding(4)")); // sat
        assert!(SHADER_SOURCE.contains("@group(1) @binding(0)")); // model
        assert!(SHADER_SOURCE.contains("@group(1) @binding(1)")); // material
    }

    #[test]
    fn test_shader_includes_libraries() {
        assert!(SHADER_SOURCE.starts_with(shader_lib::LIGHTING));
        assert!(SHADER_SOURCE.contains(shader_lib::SHADOW));
        for func in ["fn shadow_basic", "fn shadow_pcf", "fn shadow_pcss", "fn shadow_vssm"] {
            assert!(shader_lib::SHADOW.contains(func), "missing {func}");
        }
    }

    #[test]
    fn test_shadow_struct_matches_uniform() {
        // WGSL field order must match ShadowUniform
        let src = shader_lib::SHADOW;
        let fields = [
            "light_view_proj", "mode", "map_size", "light_width", "bias", "near", "far",
            "pcf_radius", "min_variance", "perspective", "search_steps", "moment_offset",
        ];
        let mut last = 0;
        for field in fields {
            let pos = src.find(&format!("    {field}:")).expect(field);
            assert!(pos > last, "{field} out of order");
            last = pos;
        }
    }
}
