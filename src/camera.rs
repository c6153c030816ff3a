//! Viewer camera parameters supplied by the host each frame.

use glam::{Mat4, Vec3};

/// View and projection of the viewing camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub view: Mat4,
    pub projection: Mat4,
    /// World-space eye position, used for specular
    pub position: Vec3,
}

impl CameraParams {
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view,
            projection,
            position,
        }
    }

    /// Perspective camera at `eye` looking at `target` with +Y up.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let forward = target - eye;
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(eye, target, up);
        let projection = Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect.max(1e-4), near, far);
        Self::new(view, projection, eye)
    }

    /// Camera at (0, 0, 5) looking down -Z, 45° field of view.
    pub fn demo(aspect: f32) -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 45.0, aspect, 0.1, 100.0)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }

    #[cfg(feature = "gpu")]
    pub fn to_uniform(&self) -> phong_surface::CameraUniform {
        phong_surface::CameraUniform::new(self.view_proj(), self.position)
    }
}

impl Default for CameraParams {
    fn default() -> Self {
        Self::demo(4.0 / 3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_camera_sees_origin() {
        let cam = CameraParams::demo(1.0);
        let clip = cam.view_proj() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_vertical_view_is_finite() {
        let cam = CameraParams::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, 60.0, 1.5, 0.1, 50.0);
        assert!(cam.view_proj().is_finite());
    }
}
