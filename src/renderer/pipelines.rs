//! Pipelines for the four frame phases.

use phong_surface::{BindGroupLayouts, PipelineConfig, DEPTH_FORMAT, MOMENT_FORMAT};

use super::gpu::checked;
use super::shaders::{DEBUG_SHADER, SAT_SHADER};
use super::SatPass;
use crate::util::Result;

pub struct Pipelines {
    pub moment_pipeline: wgpu::RenderPipeline,
    pub surface_pipeline: wgpu::RenderPipeline,
    pub marker_pipeline: wgpu::RenderPipeline,
    /// Indexed by [`SatPass::index`]
    pub sat_pipelines: [wgpu::ComputePipeline; 2],
    pub sat_layout: wgpu::BindGroupLayout,
    pub debug_pipeline: wgpu::RenderPipeline,
    pub debug_layout: wgpu::BindGroupLayout,
}

pub fn create_pipelines(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    format: wgpu::TextureFormat,
) -> Result<Pipelines> {
    let moment_pipeline = checked(device, "moment_pass", || {
        phong_surface::create_moment_pipeline(device, layouts)
    })?;

    let config = PipelineConfig {
        label: Some("surface_pipeline"),
        format,
        ..Default::default()
    };
    let surface_pipeline = checked(device, "surface_pass", || {
        phong_surface::create_pipeline(device, layouts, &config)
    })?;

    let marker_config = PipelineConfig {
        label: Some("light_marker_pipeline"),
        fragment_entry: Some("fs_emissive"),
        ..config.clone()
    };
    let marker_pipeline = checked(device, "light_marker", || {
        phong_surface::create_pipeline(device, layouts, &marker_config)
    })?;

    let (sat_pipelines, sat_layout) = checked(device, "sat_compute", || create_sat_pipelines(device))?;
    let (debug_pipeline, debug_layout) =
        checked(device, "debug_overlay", || create_debug_pipeline(device, format))?;

    Ok(Pipelines {
        moment_pipeline,
        surface_pipeline,
        marker_pipeline,
        sat_pipelines,
        sat_layout,
        debug_pipeline,
        debug_layout,
    })
}

fn create_sat_pipelines(device: &wgpu::Device) -> ([wgpu::ComputePipeline; 2], wgpu::BindGroupLayout) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("sat_shader"),
        source: wgpu::ShaderSource::Wgsl(SAT_SHADER.into()),
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sat_bind_group_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: MOMENT_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("sat_pipeline_layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipelines = [SatPass::Rows, SatPass::Columns].map(|pass| {
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(pass.label()),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(pass.entry_point()),
            compilation_options: Default::default(),
            cache: None,
        })
    });

    (pipelines, layout)
}

fn create_debug_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("moment_debug_shader"),
        source: wgpu::ShaderSource::Wgsl(DEBUG_SHADER.into()),
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("moment_debug_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("moment_debug_pipeline_layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    // Shares the present pass with the marker, so it carries the depth
    // attachment without testing against it.
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("moment_debug_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_moment_debug"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    });

    (pipeline, layout)
}
