//! Filter parameters shared by the CPU model and the GPU shadow uniform.

use serde::{Deserialize, Serialize};

/// Default shadow-map edge length in texels.
pub const DEFAULT_MAP_SIZE: u32 = 1024;

/// Shadow filtering parameters.
///
/// Radii are measured in shadow-map texels. The light's width lives on
/// [`Light`](crate::light::Light) and is passed alongside these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowParams {
    /// Edge length of the square moment map
    pub map_size: u32,
    /// Depth offset (NDC units) subtracted from the receiver before comparing
    pub bias: f32,
    /// Half-size of the fixed PCF kernel
    pub pcf_radius: u32,
    /// PCSS grid half-size: blocker search and filter both take (2n+1)² taps
    pub search_steps: u32,
    /// Variances at or below this fall back to a binary depth test
    pub min_variance: f32,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            map_size: DEFAULT_MAP_SIZE,
            bias: 0.0005,
            pcf_radius: 3,
            search_steps: 4,
            min_variance: 1.0e-6,
        }
    }
}

/// Light-space depth range used to turn NDC depth into eye distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub near: f32,
    pub far: f32,
    /// Perspective projections store hyperbolic depth; orthographic is linear
    pub perspective: bool,
}

impl DepthRange {
    pub fn perspective(near: f32, far: f32) -> Self {
        Self { near, far, perspective: true }
    }

    pub fn orthographic(near: f32, far: f32) -> Self {
        Self { near, far, perspective: false }
    }

    /// NDC depth in `[0, 1]` to linear eye distance.
    pub fn linearize(&self, z: f32) -> f32 {
        if self.perspective {
            self.near * self.far / (self.far - z * (self.far - self.near))
        } else {
            self.near + z * (self.far - self.near)
        }
    }

    /// Inverse of [`linearize`](Self::linearize).
    pub fn to_ndc(&self, distance: f32) -> f32 {
        if self.perspective {
            self.far * (distance - self.near) / (distance * (self.far - self.near))
        } else {
            (distance - self.near) / (self.far - self.near)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linearize_endpoints() {
        let range = DepthRange::perspective(1.0, 100.0);
        assert!((range.linearize(0.0) - 1.0).abs() < 1e-5);
        assert!((range.linearize(1.0) - 100.0).abs() < 1e-3);

        let ortho = DepthRange::orthographic(1.0, 100.0);
        assert!((ortho.linearize(0.5) - 50.5).abs() < 1e-4);
    }

    #[test]
    fn test_to_ndc_inverts_linearize() {
        for range in [DepthRange::perspective(1.0, 100.0), DepthRange::orthographic(0.5, 20.0)] {
            for d in [1.5_f32, 4.0, 6.0, 15.0] {
                let z = range.to_ndc(d);
                assert!((range.linearize(z) - d).abs() < 1e-3 * d, "{range:?} {d}");
            }
        }
    }
}
