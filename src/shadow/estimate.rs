//! CPU shadow estimators.
//!
//! Mirrors the WGSL in `phong-surface` step for step, so the GPU path can be
//! checked against it and the filtering behaviour tested without a device.

use glam::{Mat4, Vec2, Vec3};

use super::mode::ShadowMode;
use super::moments::MomentMap;
use super::params::{DepthRange, ShadowParams};
use super::sat::{SummedAreaTable, WindowStats};

/// Unoccluded-fraction estimates at or above this count as fully lit.
pub const LIT_FRACTION: f32 = 0.999;

/// A world position projected into the shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Shadow-map coordinates, `(0, 0)` top-left
    pub uv: Vec2,
    /// NDC depth in light space
    pub depth: f32,
}

/// Project a world position with the light's view-projection.
///
/// `None` when the point lies outside the light frustum.
pub fn project(light_view_proj: &Mat4, world: Vec3) -> Option<LightSample> {
    let clip = *light_view_proj * world.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    let uv = Vec2::new(ndc.x * 0.5 + 0.5, ndc.y * -0.5 + 0.5);
    let inside = uv.cmpge(Vec2::ZERO).all() && uv.cmple(Vec2::ONE).all() && ndc.z <= 1.0;
    inside.then_some(LightSample { uv, depth: ndc.z })
}

/// Blocker search radius in texels.
pub fn search_radius(light_width: f32, near: f32, z_receiver: f32) -> f32 {
    (light_width * (z_receiver - near) / z_receiver).max(0.0)
}

/// Penumbra radius in texels, at least one texel.
pub fn penumbra_radius(light_width: f32, z_receiver: f32, z_blocker: f32) -> f32 {
    ((z_receiver - z_blocker) * light_width / z_blocker).max(1.0)
}

fn grid_offset(dx: i32, dy: i32, spacing: f32) -> (i32, i32) {
    (
        (dx as f32 * spacing + 0.5).floor() as i32,
        (dy as f32 * spacing + 0.5).floor() as i32,
    )
}

/// Evaluates shadow visibility against one frame's moment map and SAT.
pub struct ShadowSampler<'a> {
    moments: &'a MomentMap,
    sat: &'a SummedAreaTable,
    params: ShadowParams,
    depth: DepthRange,
    light_width: f32,
}

impl<'a> ShadowSampler<'a> {
    pub fn new(
        moments: &'a MomentMap,
        sat: &'a SummedAreaTable,
        params: ShadowParams,
        depth: DepthRange,
        light_width: f32,
    ) -> Self {
        Self {
            moments,
            sat,
            params,
            depth,
            light_width,
        }
    }

    fn size(&self) -> i32 {
        self.moments.size() as i32
    }

    /// Visibility in `[0, 1]` of a world position (1 = fully lit).
    pub fn visibility_world(&self, mode: ShadowMode, light_view_proj: &Mat4, world: Vec3) -> f32 {
        match project(light_view_proj, world) {
            Some(sample) => self.visibility(mode, sample.uv, sample.depth),
            None => 1.0,
        }
    }

    /// Visibility for shadow-map coordinates and receiver NDC depth.
    pub fn visibility(&self, mode: ShadowMode, uv: Vec2, depth: f32) -> f32 {
        if !(uv.cmpge(Vec2::ZERO).all() && uv.cmple(Vec2::ONE).all()) || depth > 1.0 {
            return 1.0;
        }
        let max = self.size() - 1;
        let scaled = (uv * self.size() as f32).floor();
        let texel = ((scaled.x as i32).clamp(0, max), (scaled.y as i32).clamp(0, max));
        self.visibility_at_texel(mode, texel, depth)
    }

    /// Visibility for a receiver projected onto `texel`.
    pub fn visibility_at_texel(&self, mode: ShadowMode, texel: (i32, i32), depth: f32) -> f32 {
        match mode {
            ShadowMode::Basic => self.basic(texel, depth),
            ShadowMode::Pcf => self.pcf(texel, depth),
            ShadowMode::Pcss => self.pcss(texel, depth),
            ShadowMode::Vssm => self.vssm(texel, depth),
        }
    }

    fn lit_tap(&self, texel: (i32, i32), depth: f32) -> bool {
        match self.moments.depth_at(texel.0, texel.1) {
            Some(closest) => depth - self.params.bias <= closest,
            None => true,
        }
    }

    fn basic(&self, texel: (i32, i32), depth: f32) -> f32 {
        if self.lit_tap(texel, depth) { 1.0 } else { 0.0 }
    }

    fn pcf(&self, texel: (i32, i32), depth: f32) -> f32 {
        let r = self.params.pcf_radius as i32;
        let mut lit = 0.0f32;
        let mut count = 0.0f32;
        for dy in -r..=r {
            for dx in -r..=r {
                count += 1.0;
                if self.lit_tap((texel.0 + dx, texel.1 + dy), depth) {
                    lit += 1.0;
                }
            }
        }
        lit / count
    }

    fn pcss(&self, texel: (i32, i32), depth: f32) -> f32 {
        let z_receiver = self.depth.linearize(depth);
        let steps = self.params.search_steps as i32;
        let divisor = steps.max(1) as f32;

        let search_spacing = search_radius(self.light_width, self.depth.near, z_receiver) / divisor;
        let mut blocker_sum = 0.0f32;
        let mut blockers = 0.0f32;
        for dy in -steps..=steps {
            for dx in -steps..=steps {
                let (ox, oy) = grid_offset(dx, dy, search_spacing);
                let Some(d) = self.moments.depth_at(texel.0 + ox, texel.1 + oy) else {
                    continue;
                };
                if d < depth - self.params.bias {
                    blocker_sum += d;
                    blockers += 1.0;
                }
            }
        }
        if blockers == 0.0 {
            return 1.0;
        }

        let z_blocker = self.depth.linearize(blocker_sum / blockers);
        let filter_spacing = penumbra_radius(self.light_width, z_receiver, z_blocker) / divisor;
        let mut lit = 0.0f32;
        let mut count = 0.0f32;
        for dy in -steps..=steps {
            for dx in -steps..=steps {
                let (ox, oy) = grid_offset(dx, dy, filter_spacing);
                count += 1.0;
                if self.lit_tap((texel.0 + ox, texel.1 + oy), depth) {
                    lit += 1.0;
                }
            }
        }
        lit / count
    }

    fn vssm(&self, texel: (i32, i32), depth: f32) -> f32 {
        let z_receiver = self.depth.linearize(depth);

        let Some(search) = self.window(texel, search_radius(self.light_width, self.depth.near, z_receiver))
        else {
            return 1.0;
        };
        let mu = search.mean;
        let variance = search.variance;
        let blocker_ndc = if variance <= self.params.min_variance {
            if depth - self.params.bias <= mu {
                return 1.0;
            }
            mu
        } else {
            if depth <= mu {
                return 1.0;
            }
            let dz = depth - mu;
            let unoccluded = variance / (variance + dz * dz);
            if unoccluded >= LIT_FRACTION {
                return 1.0;
            }
            (mu - unoccluded * depth) / (1.0 - unoccluded)
        };

        let z_blocker = self.depth.linearize(blocker_ndc.clamp(0.0, 1.0));
        if z_blocker >= z_receiver {
            return 1.0;
        }

        let Some(penumbra) = self.window(texel, penumbra_radius(self.light_width, z_receiver, z_blocker))
        else {
            return 1.0;
        };
        let t = depth - self.params.bias;
        if t <= penumbra.mean {
            return 1.0;
        }
        let filter_variance = penumbra.variance;
        if filter_variance <= self.params.min_variance {
            return 0.0;
        }
        let d = t - penumbra.mean;
        (filter_variance / (filter_variance + d * d)).clamp(0.0, 1.0)
    }

    fn window(&self, center: (i32, i32), radius: f32) -> Option<WindowStats> {
        self.sat.window(center, radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEAR: f32 = 1.0;
    const FAR: f32 = 100.0;

    fn half_covered(size: u32, occluder: f32) -> MomentMap {
        // left half occluded, right half empty
        MomentMap::from_fn(size, |x, _| if x < size / 2 { occluder } else { 1.0 })
    }

    #[test]
    fn test_project_center_and_outside() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::Z);
        let proj = Mat4::perspective_rh(45f32.to_radians(), 1.0, NEAR, FAR);
        let vp = proj * view;

        let s = project(&vp, Vec3::ZERO).unwrap();
        assert!((s.uv - Vec2::splat(0.5)).length() < 1e-4);
        assert!(s.depth > 0.0 && s.depth < 1.0);

        // Behind the light
        assert!(project(&vp, Vec3::new(0.0, 20.0, 0.0)).is_none());
        // Far off to the side
        assert!(project(&vp, Vec3::new(100.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_modes_agree_far_from_edge() {
        let range = DepthRange::perspective(NEAR, FAR);
        let occluder = range.to_ndc(4.0);
        let receiver = range.to_ndc(6.0);
        let map = half_covered(128, occluder);
        let sat = SummedAreaTable::build(&map);
        let sampler = ShadowSampler::new(&map, &sat, ShadowParams { map_size: 128, ..Default::default() }, range, 8.0);

        for mode in ShadowMode::ALL {
            let shadowed = sampler.visibility_at_texel(mode, (16, 64), receiver);
            let lit = sampler.visibility_at_texel(mode, (120, 64), receiver);
            assert!(shadowed < 0.05, "{mode}: {shadowed}");
            assert!(lit > 0.95, "{mode}: {lit}");
        }
    }

    #[test]
    fn test_outside_map_is_lit() {
        let range = DepthRange::perspective(NEAR, FAR);
        let map = MomentMap::from_fn(16, |_, _| 0.1);
        let sat = SummedAreaTable::build(&map);
        let sampler = ShadowSampler::new(&map, &sat, ShadowParams { map_size: 16, ..Default::default() }, range, 4.0);
        for mode in ShadowMode::ALL {
            assert_eq!(sampler.visibility(mode, Vec2::new(1.5, 0.5), 0.9), 1.0);
            assert_eq!(sampler.visibility(mode, Vec2::new(0.5, -0.1), 0.9), 1.0);
            assert_eq!(sampler.visibility(mode, Vec2::new(0.5, 0.5), 1.5), 1.0);
        }
    }

    #[test]
    fn test_degenerate_variance_falls_back_to_binary() {
        let range = DepthRange::perspective(NEAR, FAR);
        let map = MomentMap::from_fn(32, |_, _| 0.5);
        let sat = SummedAreaTable::build(&map);
        let sampler = ShadowSampler::new(&map, &sat, ShadowParams { map_size: 32, ..Default::default() }, range, 4.0);
        assert_eq!(sampler.visibility_at_texel(ShadowMode::Vssm, (16, 16), 0.4), 1.0);
        assert_eq!(sampler.visibility_at_texel(ShadowMode::Vssm, (16, 16), 0.9), 0.0);
    }

    #[test]
    fn test_penumbra_radius_grows_with_light_width() {
        assert!(penumbra_radius(10.0, 6.0, 4.0) < penumbra_radius(40.0, 6.0, 4.0));
        assert_eq!(penumbra_radius(10.0, 6.0, 6.0), 1.0);
        assert_eq!(search_radius(10.0, 1.0, 0.5), 0.0);
    }
}
