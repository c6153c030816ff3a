//! GPU-side textures used by the renderer.

use phong_surface::{DEPTH_FORMAT, MOMENT_FORMAT};

fn texture_2d(
    device: &wgpu::Device,
    label: &str,
    size: (u32, u32),
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Moment map, its depth buffer and the SAT ping-pong pair.
///
/// Allocated once for the configured map size and reused every frame.
#[derive(Debug)]
pub struct ShadowTargets {
    pub moment: wgpu::Texture,
    pub moment_view: wgpu::TextureView,
    #[allow(dead_code)]
    pub light_depth: wgpu::Texture,
    pub light_depth_view: wgpu::TextureView,
    /// `sat[0]` holds the row pass, `sat[1]` the finished table
    pub sat: [wgpu::Texture; 2],
    pub sat_views: [wgpu::TextureView; 2],
    pub size: u32,
}

impl ShadowTargets {
    pub fn new(device: &wgpu::Device, size: u32) -> Self {
        let extent = (size, size);
        let (moment, moment_view) = texture_2d(
            device,
            "moment_map",
            extent,
            MOMENT_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        );
        let (light_depth, light_depth_view) = texture_2d(
            device,
            "light_depth",
            extent,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let sat_usage = wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;
        let (sat0, sat0_view) = texture_2d(device, "sat_ping", extent, MOMENT_FORMAT, sat_usage);
        let (sat1, sat1_view) = texture_2d(device, "sat_pong", extent, MOMENT_FORMAT, sat_usage);

        Self {
            moment,
            moment_view,
            light_depth,
            light_depth_view,
            sat: [sat0, sat1],
            sat_views: [sat0_view, sat1_view],
            size,
        }
    }
}

#[derive(Debug)]
pub struct DepthTexture {
    #[allow(dead_code)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

impl DepthTexture {
    pub fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let (texture, view) = texture_2d(
            device,
            "camera_depth",
            size,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        Self { texture, view, size }
    }
}

/// Offscreen color target for headless frames.
#[derive(Debug)]
pub struct ColorTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

impl ColorTarget {
    pub fn new(device: &wgpu::Device, size: (u32, u32), format: wgpu::TextureFormat) -> Self {
        let (texture, view) = texture_2d(
            device,
            "offscreen_color",
            size,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        Self { texture, view, size }
    }
}
