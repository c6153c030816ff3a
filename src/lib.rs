//! # VSSM
//!
//! Variance soft shadow mapping on wgpu.
//!
//! Every frame the scene is rendered from the light into a two-moment map
//! `(z, z²)`, the map is turned into a summed-area table by a compute scan,
//! and each fragment estimates its visibility from the moments averaged over
//! a window sized by the light's width and the occluder distance.
//!
//! ## Modules
//!
//! - [`util`] - Error type
//! - [`shadow`] - Moment map, summed-area table and the four visibility estimators (CPU)
//! - [`light`] - Point, directional and spot lights, light-space transforms
//! - [`camera`] - Viewer camera parameters
//! - [`settings`] - Persistent configuration
//! - [`scene`] - Procedural meshes and the demo scene (`gpu` feature)
//! - [`renderer`] - The wgpu frame pipeline (`gpu` feature)
//!
//! ## Example
//!
//! ```ignore
//! use vssm::renderer::{FrameContext, GpuContext, Renderer, RendererConfig};
//! use vssm::{camera::CameraParams, scene::Scene, shadow::ShadowMode};
//!
//! let ctx = GpuContext::headless()?;
//! let mut renderer = Renderer::new(&ctx, RendererConfig::default())?;
//! let scene = Scene::demo();
//! renderer.load_scene(&scene);
//!
//! let frame = FrameContext::for_scene(&scene, CameraParams::demo(4.0 / 3.0), ShadowMode::Vssm);
//! let image = renderer.render_offscreen(&frame, 1600, 1200)?;
//! ```

pub mod camera;
pub mod light;
pub mod settings;
pub mod shadow;
pub mod util;

#[cfg(feature = "gpu")]
pub mod scene;

// GPU renderer (optional, enabled with "gpu" feature)
#[cfg(feature = "gpu")]
pub mod renderer;

// Re-export commonly used types
pub use util::{Error, Result};
pub use shadow::ShadowMode;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::camera::CameraParams;
    pub use crate::light::{Light, LightFrustum, LightKind};
    pub use crate::settings::Settings;
    pub use crate::shadow::{MomentMap, ShadowMode, ShadowParams, ShadowSampler, SummedAreaTable};
    pub use crate::util::{Error, Result};

    #[cfg(feature = "gpu")]
    pub use crate::renderer::{FrameContext, GpuContext, Renderer, RendererConfig};
    #[cfg(feature = "gpu")]
    pub use crate::scene::{Material, MeshData, Scene};
}
