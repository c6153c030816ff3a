//! Uniform blocks shared by the surface and moment shaders.
//!
//! Every struct here maps 1:1 onto a WGSL struct. Scalars are packed into
//! `Vec4`s where the WGSL side does the same so no implicit padding sneaks in.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Light kind tags as stored in `LightUniform::position_kind.w`.
pub const LIGHT_POINT: u32 = 0;
pub const LIGHT_DIRECTIONAL: u32 = 1;
pub const LIGHT_SPOT: u32 = 2;

/// Camera uniform (group 0, binding 0)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: Mat4,
    /// World-space eye position (xyz), w unused
    pub position: Vec4,
}

impl CameraUniform {
    pub fn new(view_proj: Mat4, position: Vec3) -> Self {
        Self {
            view_proj,
            position: position.extend(1.0),
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Vec3::ZERO)
    }
}

/// Light uniform (group 0, binding 1)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightUniform {
    /// Position (xyz), kind tag (w)
    pub position_kind: Vec4,
    /// Direction the light points at (xyz), intensity (w)
    pub direction_intensity: Vec4,
    /// Color (rgb), light width in shadow-map texels (a)
    pub color_width: Vec4,
    /// x=ambient, y=diffuse, z=specular strength, w unused
    pub coefficients: Vec4,
    /// x=constant, y=linear, z=quadratic attenuation, w unused
    pub attenuation: Vec4,
    /// x=cos(inner cut-off), y=cos(outer cut-off), zw unused
    pub cone: Vec4,
}

impl Default for LightUniform {
    fn default() -> Self {
        Self {
            position_kind: Vec4::new(0.0, 5.0, 0.0, LIGHT_POINT as f32),
            direction_intensity: Vec4::new(0.0, -1.0, 0.0, 1.0),
            color_width: Vec4::new(1.0, 1.0, 1.0, 50.0),
            coefficients: Vec4::new(0.1, 1.0, 0.5, 0.0),
            attenuation: Vec4::new(1.0, 0.09, 0.032, 0.0),
            cone: Vec4::new(12.5_f32.to_radians().cos(), 17.5_f32.to_radians().cos(), 0.0, 0.0),
        }
    }
}

/// Shadow evaluation parameters (group 0, binding 2)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowUniform {
    pub light_view_proj: Mat4,
    /// 0=basic, 1=pcf, 2=pcss, 3=vssm
    pub mode: u32,
    pub map_size: u32,
    pub light_width: f32,
    pub bias: f32,
    pub near: f32,
    pub far: f32,
    pub pcf_radius: u32,
    pub min_variance: f32,
    /// 1 when the light projection is perspective
    pub perspective: u32,
    pub search_steps: u32,
    /// Depth the summed-area table's moments are centred on
    pub moment_offset: f32,
    pub _pad: u32,
}

impl Default for ShadowUniform {
    fn default() -> Self {
        Self {
            light_view_proj: Mat4::IDENTITY,
            mode: 0,
            map_size: 1024,
            light_width: 50.0,
            bias: 0.0005,
            near: 1.0,
            far: 100.0,
            pcf_radius: 3,
            min_variance: 1.0e-6,
            perspective: 1,
            search_steps: 4,
            moment_offset: 0.5,
            _pad: 0,
        }
    }
}

/// Per-object transform (group 1, binding 0)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: Mat4,
    /// Inverse-transpose of `model`, used for normals
    pub normal_matrix: Mat4,
}

impl ModelUniform {
    pub fn new(model: Mat4) -> Self {
        Self {
            model,
            normal_matrix: model.inverse().transpose(),
        }
    }
}

impl Default for ModelUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

/// Per-object material (group 1, binding 1)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Base color (rgb), Blinn-Phong shininess exponent (a)
    pub color_shininess: Vec4,
}

impl MaterialUniform {
    pub fn new(color: Vec3, shininess: f32) -> Self {
        Self {
            color_shininess: color.extend(shininess),
        }
    }
}

impl Default for MaterialUniform {
    fn default() -> Self {
        Self::new(Vec3::ONE, 32.0)
    }
}

/// Light-space transform for the moment pass (moment pipeline, group 0)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MomentPassUniform {
    pub light_view_proj: Mat4,
}

impl Default for MomentPassUniform {
    fn default() -> Self {
        Self {
            light_view_proj: Mat4::IDENTITY,
        }
    }
}
