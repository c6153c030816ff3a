//! Device acquisition and validation error scopes.

use std::sync::Arc;

use phong_surface::MOMENT_FORMAT;

use crate::util::{Error, Result};

/// Usages the moment map and both SAT textures need from [`MOMENT_FORMAT`].
pub const MOMENT_USAGES: wgpu::TextureUsages =
    wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::STORAGE_BINDING);

/// Adapters to try in order: any backend, then native backends only (GL
/// drivers often cannot store to `Rg32Float`), then a software fallback.
const ADAPTER_SEARCH: [(wgpu::Backends, bool); 3] = [
    (wgpu::Backends::all(), false),
    (wgpu::Backends::PRIMARY, false),
    (wgpu::Backends::all(), true),
];

/// Whether an adapter allowing `usages` on [`MOMENT_FORMAT`] can run the pipeline.
pub fn supports_moment_targets(usages: wgpu::TextureUsages) -> bool {
    usages.contains(MOMENT_USAGES)
}

fn moment_usages(adapter: &wgpu::Adapter) -> wgpu::TextureUsages {
    adapter.get_texture_format_features(MOMENT_FORMAT).allowed_usages
}

/// Device and queue the renderer records into.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Wrap a device owned by the host (windowed applications).
    ///
    /// Fails when `adapter` cannot render to and store [`MOMENT_FORMAT`].
    pub fn from_parts(adapter: &wgpu::Adapter, device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Result<Self> {
        let info = adapter.get_info();
        let usages = moment_usages(adapter);
        if !supports_moment_targets(usages) {
            return Err(Error::resource(
                "moment_map",
                format!(
                    "{} ({:?}) allows only {:?} for {:?}, needs {:?}",
                    info.name, info.backend, usages, MOMENT_FORMAT, MOMENT_USAGES
                ),
            ));
        }
        Ok(Self {
            device,
            queue,
            adapter_info: info,
        })
    }

    /// Open a device without a surface, for offscreen rendering and tests.
    pub fn headless() -> Result<Self> {
        pollster::block_on(Self::request_headless())
    }

    async fn request_headless() -> Result<Self> {
        let mut request_error = None;
        for (backends, force_fallback_adapter) in ADAPTER_SEARCH {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends,
                ..Default::default()
            });
            let adapter = match instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter,
                })
                .await
            {
                Ok(adapter) => adapter,
                Err(e) => {
                    request_error = Some(e.to_string());
                    continue;
                }
            };

            let info = adapter.get_info();
            if !supports_moment_targets(moment_usages(&adapter)) {
                log::warn!(
                    "Skipping GPU adapter {} ({:?}): {:?} is not renderable and storable",
                    info.name,
                    info.backend,
                    MOMENT_FORMAT
                );
                request_error = None;
                continue;
            }
            log::info!("GPU adapter: {} ({:?})", info.name, info.backend);

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("vssm_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    ..Default::default()
                })
                .await
                .map_err(|e| Error::RequestDevice(e.to_string()))?;

            return Self::from_parts(&adapter, Arc::new(device), Arc::new(queue));
        }

        Err(Error::NoAdapter(request_error.unwrap_or_else(|| {
            format!(
                "no adapter supports {:?} as render target and storage texture",
                MOMENT_FORMAT
            )
        })))
    }

    pub fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// Run `create` inside a validation error scope and report failures as `stage`.
pub(crate) fn checked<T>(device: &wgpu::Device, stage: &str, create: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => {
            log::error!("{} failed validation: {}", stage, err);
            Err(Error::shader(stage, err.to_string()))
        }
        None => Ok(value),
    }
}

/// Like [`checked`], but failures are resource errors.
pub(crate) fn checked_resource<T>(device: &wgpu::Device, resource: &str, create: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let value = create();
    let oom = pollster::block_on(device.pop_error_scope());
    let invalid = pollster::block_on(device.pop_error_scope());
    match oom.or(invalid) {
        Some(err) => Err(Error::resource(resource, err.to_string())),
        None => Ok(value),
    }
}
