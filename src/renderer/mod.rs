//! wgpu renderer: moment capture, SAT compute, shadowed shading, overlays.
//!
//! Each frame walks the same fixed sequence of [`FramePhase`]s:
//!
//! 1. `CaptureDepth` renders `(z, z²)` from the light into the moment map
//! 2. `ComputeSat(Rows)` then `ComputeSat(Columns)` turn it into a summed-area table
//! 3. `EvaluateAndShade` draws the scene with the selected [`ShadowMode`]
//! 4. `Present` adds the light marker and the moment-map overlay
//!
//! All phases are recorded into one command encoder; ordering between them
//! is expressed purely as pass boundaries.

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

mod gpu;
mod passes;
mod pipelines;
mod readback;
mod resources;
mod shaders;

pub use gpu::GpuContext;
pub use readback::padded_row_bytes;
pub use shaders::{SatUniform, DEBUG_SHADER, SAT_SHADER, SAT_WORKGROUP_SIZE};

use gpu::checked_resource;
use pipelines::{create_pipelines, Pipelines};
use resources::{ColorTarget, DepthTexture, ShadowTargets};

use phong_surface::{
    BindGroupLayouts, CameraUniform, LightUniform, ModelUniform, MomentPassUniform, ShadowUniform,
};

use crate::camera::CameraParams;
use crate::light::{Light, LightFrustum, LightSpace};
use crate::scene::{Material, MeshData, Scene};
use crate::shadow::{MomentMap, Moments, ShadowMode, ShadowParams, SummedAreaTable};
use crate::util::{Error, Result};

/// Edge length of the light marker cube.
const MARKER_SCALE: f32 = 0.2;

/// Fixed renderer configuration
#[derive(Debug, Clone, Copy)]
pub struct RendererConfig {
    /// Format of the color target the host renders into
    pub color_format: wgpu::TextureFormat,
    pub shadow: ShadowParams,
    pub light_frustum: LightFrustum,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            shadow: ShadowParams::default(),
            light_frustum: LightFrustum::default(),
        }
    }
}

/// Everything that varies per frame, passed in explicitly.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub camera: CameraParams,
    pub light: Light,
    /// Point the light's frustum is aimed at
    pub light_target: Vec3,
    pub mode: ShadowMode,
    pub frame_index: u64,
}

impl FrameContext {
    pub fn new(camera: CameraParams, light: Light, mode: ShadowMode) -> Self {
        Self {
            camera,
            light,
            light_target: Vec3::ZERO,
            mode,
            frame_index: 0,
        }
    }

    /// Frame for a scene's light, viewed by `camera`.
    pub fn for_scene(scene: &Scene, camera: CameraParams, mode: ShadowMode) -> Self {
        Self {
            light_target: scene.light_target,
            ..Self::new(camera, scene.light, mode)
        }
    }
}

/// Half of the SAT computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatPass {
    /// Moment map rows into `sat[0]`
    Rows,
    /// `sat[0]` rows (original columns) into `sat[1]`
    Columns,
}

impl SatPass {
    /// Index of the ping-pong texture this pass writes.
    pub fn index(self) -> usize {
        match self {
            Self::Rows => 0,
            Self::Columns => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Rows => "sat_rows",
            Self::Columns => "sat_columns",
        }
    }

    /// Compute entry point; only the row pass centres the moments.
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::Rows => "scan_moments",
            Self::Columns => "scan_sums",
        }
    }
}

/// Index of the texture holding the finished summed-area table.
pub const FINAL_SAT_INDEX: usize = 1;

/// Stage of a frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    CaptureDepth,
    ComputeSat(SatPass),
    EvaluateAndShade,
    Present,
}

impl FramePhase {
    pub const FIRST: Self = Self::CaptureDepth;

    pub fn next(self) -> Option<Self> {
        match self {
            Self::CaptureDepth => Some(Self::ComputeSat(SatPass::Rows)),
            Self::ComputeSat(SatPass::Rows) => Some(Self::ComputeSat(SatPass::Columns)),
            Self::ComputeSat(SatPass::Columns) => Some(Self::EvaluateAndShade),
            Self::EvaluateAndShade => Some(Self::Present),
            Self::Present => None,
        }
    }

    /// All phases of one frame.
    pub fn sequence() -> impl Iterator<Item = FramePhase> {
        std::iter::successors(Some(Self::FIRST), |phase| phase.next())
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CaptureDepth => "capture_depth",
            Self::ComputeSat(pass) => pass.label(),
            Self::EvaluateAndShade => "evaluate_and_shade",
            Self::Present => "present",
        }
    }
}

/// GPU mesh data
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, mesh: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("vertex_buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("index_buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Mesh with transform and material uniforms
struct GpuObject {
    mesh: GpuMesh,
    model_buffer: wgpu::Buffer,
    material_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    transform: Mat4,
    material: Material,
}

impl GpuObject {
    fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        mesh: &MeshData,
        transform: Mat4,
        material: Material,
    ) -> Self {
        let model_buffer =
            phong_surface::create_uniform_buffer(device, "model_buffer", &ModelUniform::new(transform));
        let material_buffer =
            phong_surface::create_uniform_buffer(device, "material_buffer", &material.to_uniform());
        let bind_group =
            phong_surface::create_object_bind_group(device, layouts, &model_buffer, &material_buffer);
        Self {
            mesh: GpuMesh::new(device, mesh),
            model_buffer,
            material_buffer,
            bind_group,
            transform,
            material,
        }
    }

    fn write_transform(&mut self, queue: &wgpu::Queue, transform: Mat4) {
        self.transform = transform;
        queue.write_buffer(&self.model_buffer, 0, bytemuck::bytes_of(&ModelUniform::new(transform)));
    }

    fn write_material(&mut self, queue: &wgpu::Queue, material: Material) {
        self.material = material;
        queue.write_buffer(&self.material_buffer, 0, bytemuck::bytes_of(&material.to_uniform()));
    }
}

/// Soft-shadow renderer
pub struct Renderer {
    pub device: std::sync::Arc<wgpu::Device>,
    pub queue: std::sync::Arc<wgpu::Queue>,
    config: RendererConfig,
    layouts: BindGroupLayouts,
    pipelines: Pipelines,
    targets: ShadowTargets,

    // Uniforms
    camera_buffer: wgpu::Buffer,
    light_buffer: wgpu::Buffer,
    shadow_buffer: wgpu::Buffer,
    moment_pass_buffer: wgpu::Buffer,
    sat_params_buffer: wgpu::Buffer,
    // Depth the last frame's SAT is centred on
    moment_offset: f32,

    frame_bind_group: wgpu::BindGroup,
    moment_pass_bind_group: wgpu::BindGroup,
    sat_bind_groups: [wgpu::BindGroup; 2],
    debug_bind_group: wgpu::BindGroup,

    // Scene objects (name -> object)
    objects: HashMap<String, GpuObject>,
    marker: GpuObject,

    depth_texture: Option<DepthTexture>,

    // Settings
    pub show_debug_overlay: bool,
    pub show_light_marker: bool,
    pub clear_color: [f32; 3],
}

impl Renderer {
    pub fn new(ctx: &GpuContext, config: RendererConfig) -> Result<Self> {
        let device = &ctx.device;
        let size = config.shadow.map_size;
        let max = ctx.max_texture_size();
        if size == 0 || size > max {
            return Err(Error::resource(
                "moment_map",
                format!("shadow map size {} outside 1..={}", size, max),
            ));
        }

        let layouts = phong_surface::create_bind_group_layouts(device);
        let pipelines = create_pipelines(device, &layouts, config.color_format)?;
        let targets = checked_resource(device, "shadow_targets", || ShadowTargets::new(device, size))?;

        let camera_buffer =
            phong_surface::create_uniform_buffer(device, "camera_buffer", &CameraUniform::default());
        let light_buffer = phong_surface::create_uniform_buffer(device, "light_buffer", &LightUniform::default());
        let shadow_buffer =
            phong_surface::create_uniform_buffer(device, "shadow_buffer", &ShadowUniform::default());
        let moment_pass_buffer =
            phong_surface::create_uniform_buffer(device, "moment_pass_buffer", &MomentPassUniform::default());
        let sat_params_buffer =
            phong_surface::create_uniform_buffer(device, "sat_params_buffer", &SatUniform::default());

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &layouts.frame,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: shadow_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&targets.moment_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&targets.sat_views[FINAL_SAT_INDEX]),
                },
            ],
        });

        let moment_pass_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("moment_pass_bind_group"),
            layout: &layouts.moment_pass,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: moment_pass_buffer.as_entire_binding(),
            }],
        });

        let sat_bind_group = |label: &str, src: &wgpu::TextureView, dst: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipelines.sat_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(src),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(dst),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: sat_params_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let sat_bind_groups = [
            sat_bind_group("sat_rows_bind_group", &targets.moment_view, &targets.sat_views[0]),
            sat_bind_group("sat_columns_bind_group", &targets.sat_views[0], &targets.sat_views[1]),
        ];

        let debug_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("moment_debug_bind_group"),
            layout: &pipelines.debug_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&targets.moment_view),
            }],
        });

        let marker = GpuObject::new(
            device,
            &layouts,
            &MeshData::cube(),
            Mat4::from_scale(Vec3::splat(MARKER_SCALE)),
            Material::default(),
        );

        log::info!(
            "Renderer ready: {}x{} moment map, color {:?}",
            size,
            size,
            config.color_format
        );

        Ok(Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            config,
            layouts,
            pipelines,
            targets,
            camera_buffer,
            light_buffer,
            shadow_buffer,
            moment_pass_buffer,
            sat_params_buffer,
            moment_offset: 0.0,
            frame_bind_group,
            moment_pass_bind_group,
            sat_bind_groups,
            debug_bind_group,
            objects: HashMap::new(),
            marker,
            depth_texture: None,
            show_debug_overlay: true,
            show_light_marker: true,
            clear_color: [0.1, 0.1, 0.1],
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn map_size(&self) -> u32 {
        self.targets.size
    }

    /// Moment texture, valid to sample after a frame's capture phase.
    pub fn moment_view(&self) -> &wgpu::TextureView {
        &self.targets.moment_view
    }

    /// Add or replace a named object.
    ///
    /// Objects with a non-finite transform or no triangles are skipped.
    pub fn upsert_object(&mut self, name: &str, mesh: &MeshData, transform: Mat4, material: Material) {
        if !transform.is_finite() {
            log::warn!("Skipping '{}': non-finite transform", name);
            return;
        }
        if mesh.indices.is_empty() || mesh.vertices.is_empty() {
            log::warn!("Skipping '{}': empty mesh", name);
            return;
        }
        let object = GpuObject::new(&self.device, &self.layouts, mesh, transform, material);
        if self.objects.insert(name.to_string(), object).is_some() {
            log::debug!("Replaced object '{}'", name);
        }
    }

    /// Upload every object of a scene.
    pub fn load_scene(&mut self, scene: &Scene) {
        for object in &scene.objects {
            self.upsert_object(&object.name, &object.mesh, object.transform, object.material);
        }
    }

    pub fn set_transform(&mut self, name: &str, transform: Mat4) -> bool {
        if !transform.is_finite() {
            log::warn!("Ignoring non-finite transform for '{}'", name);
            return false;
        }
        match self.objects.get_mut(name) {
            Some(object) => {
                object.write_transform(&self.queue, transform);
                true
            }
            None => false,
        }
    }

    pub fn set_material(&mut self, name: &str, material: Material) -> bool {
        match self.objects.get_mut(name) {
            Some(object) => {
                object.write_material(&self.queue, material);
                true
            }
            None => false,
        }
    }

    pub fn remove_object(&mut self, name: &str) -> bool {
        self.objects.remove(name).is_some()
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn transform(&self, name: &str) -> Option<Mat4> {
        self.objects.get(name).map(|o| o.transform)
    }

    pub fn material(&self, name: &str) -> Option<Material> {
        self.objects.get(name).map(|o| o.material)
    }

    /// Light transforms used for `frame`.
    pub fn light_space(&self, frame: &FrameContext) -> LightSpace {
        frame.light.light_space(frame.light_target, &self.config.light_frustum)
    }

    fn shadow_uniform(&self, frame: &FrameContext, light_space: &LightSpace) -> ShadowUniform {
        let params = &self.config.shadow;
        ShadowUniform {
            light_view_proj: light_space.view_proj,
            mode: frame.mode.index(),
            map_size: self.targets.size,
            light_width: frame.light.width,
            bias: params.bias,
            near: light_space.depth.near,
            far: light_space.depth.far,
            pcf_radius: params.pcf_radius,
            min_variance: params.min_variance,
            perspective: light_space.depth.perspective as u32,
            search_steps: params.search_steps,
            moment_offset: self.moment_offset,
            _pad: 0,
        }
    }

    /// Write every per-frame uniform.
    fn prepare_frame(&mut self, frame: &FrameContext) -> LightSpace {
        let light_space = self.light_space(frame);
        self.moment_offset = light_space.reference_depth(frame.light_target);

        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&frame.camera.to_uniform()));
        self.queue
            .write_buffer(&self.light_buffer, 0, bytemuck::bytes_of(&frame.light.to_uniform()));
        let shadow = self.shadow_uniform(frame, &light_space);
        self.queue
            .write_buffer(&self.shadow_buffer, 0, bytemuck::bytes_of(&shadow));
        let moment_pass = MomentPassUniform {
            light_view_proj: light_space.view_proj,
        };
        self.queue
            .write_buffer(&self.moment_pass_buffer, 0, bytemuck::bytes_of(&moment_pass));
        self.queue.write_buffer(
            &self.sat_params_buffer,
            0,
            bytemuck::bytes_of(&SatUniform::new(self.moment_offset)),
        );

        let marker_at = frame
            .light
            .marker_position(frame.light_target, &self.config.light_frustum);
        let marker_transform = Mat4::from_translation(marker_at) * Mat4::from_scale(Vec3::splat(MARKER_SCALE));
        self.marker.write_transform(&self.queue, marker_transform);
        self.marker
            .write_material(&self.queue, Material::new(frame.light.color, 1.0));

        light_space
    }

    fn ensure_depth_texture(&mut self, width: u32, height: u32) {
        let stale = self
            .depth_texture
            .as_ref()
            .map_or(true, |d| d.size != (width, height));
        if stale {
            self.depth_texture = Some(DepthTexture::new(&self.device, (width, height)));
        }
    }

    /// Record one frame into `encoder`, targeting `view`.
    ///
    /// The caller submits the encoder and presents. Returns the light
    /// transforms the frame used.
    pub fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        width: u32,
        height: u32,
        frame: &FrameContext,
    ) -> LightSpace {
        let width = width.max(1);
        let height = height.max(1);
        self.ensure_depth_texture(width, height);
        let light_space = self.prepare_frame(frame);

        for phase in FramePhase::sequence() {
            let _span = tracing::debug_span!("frame_phase", phase = phase.name(), frame = frame.frame_index)
                .entered();
            match phase {
                FramePhase::CaptureDepth => self.encode_capture_depth(encoder),
                FramePhase::ComputeSat(pass) => self.encode_sat_pass(encoder, pass),
                FramePhase::EvaluateAndShade => self.encode_shading(encoder, view),
                FramePhase::Present => self.encode_present(encoder, view),
            }
        }

        log::trace!(
            "Frame {} recorded: mode={}, {} objects",
            frame.frame_index,
            frame.mode,
            self.objects.len()
        );
        light_space
    }

    /// Render into an offscreen target and read the pixels back.
    pub fn render_offscreen(&mut self, frame: &FrameContext, width: u32, height: u32) -> Result<image::RgbaImage> {
        let _span = tracing::info_span!("render_offscreen", width, height, mode = %frame.mode).entered();

        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Error::resource(
                "offscreen_color",
                format!("{}x{} outside 1..={}", width, height, max),
            ));
        }
        let swizzle = match self.config.color_format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            other => {
                return Err(Error::Readback(format!("cannot read back {:?} as RGBA8", other)));
            }
        };

        let format = self.config.color_format;
        let target = checked_resource(&self.device, "offscreen_color", || {
            ColorTarget::new(&self.device, (width, height), format)
        })?;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("offscreen_frame"),
        });
        self.render(&mut encoder, &target.view, width, height, frame);
        self.queue.submit(Some(encoder.finish()));

        let mut pixels = readback::read_texture(&self.device, &self.queue, &target.texture, target.size, 4)?;
        if swizzle {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::Readback("pixel buffer size mismatch".into()))
    }

    /// Copy the moment map of the last submitted frame to the host.
    pub fn read_moments(&self) -> Result<MomentMap> {
        let raw = readback::read_rg32(&self.device, &self.queue, &self.targets.moment, self.targets.size)?;
        let texels = raw
            .into_iter()
            .map(|[depth, depth_sq]| Moments { depth, depth_sq })
            .collect();
        MomentMap::from_texels(self.targets.size, texels)
    }

    /// Copy one SAT ping-pong texture to the host.
    ///
    /// Index [`FINAL_SAT_INDEX`] holds the finished table; index 0 holds the
    /// transposed row sums.
    pub fn read_sat(&self, index: usize) -> Result<SummedAreaTable> {
        let texture = self
            .targets
            .sat
            .get(index)
            .ok_or_else(|| Error::Readback(format!("no SAT texture {}", index)))?;
        let sums = readback::read_rg32(&self.device, &self.queue, texture, self.targets.size)?;
        SummedAreaTable::from_raw(self.targets.size, self.moment_offset, sums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let phases: Vec<_> = FramePhase::sequence().collect();
        assert_eq!(
            phases,
            vec![
                FramePhase::CaptureDepth,
                FramePhase::ComputeSat(SatPass::Rows),
                FramePhase::ComputeSat(SatPass::Columns),
                FramePhase::EvaluateAndShade,
                FramePhase::Present,
            ]
        );
        assert_eq!(FramePhase::Present.next(), None);
    }

    #[test]
    fn test_sat_pass_targets() {
        assert_eq!(SatPass::Rows.index(), 0);
        assert_eq!(SatPass::Columns.index(), FINAL_SAT_INDEX);
        assert_ne!(SatPass::Rows.label(), SatPass::Columns.label());
        assert!(SAT_SHADER.contains(&format!("fn {}(", SatPass::Rows.entry_point())));
        assert!(SAT_SHADER.contains(&format!("fn {}(", SatPass::Columns.entry_point())));
    }

    #[test]
    fn test_frame_context_for_scene() {
        let mut scene = Scene::demo();
        scene.light_target = Vec3::new(0.0, 1.0, 0.0);
        let frame = FrameContext::for_scene(&scene, CameraParams::demo(1.0), ShadowMode::Vssm);
        assert_eq!(frame.light_target, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(frame.light, scene.light);
        assert_eq!(frame.frame_index, 0);
    }
}
