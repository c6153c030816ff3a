//! Light sources and their shadow-casting frustums.
//!
//! A [`Light`] is one of three kinds (point, directional, spot) plus the
//! Blinn-Phong coefficients and attenuation shared by all of them. Every
//! light also has a `width`: the apparent size of the emitter in shadow-map
//! texels, which drives penumbra size in the PCSS and VSSM filters.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::shadow::{project, DepthRange};

/// Emitter geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LightKind {
    Point {
        position: Vec3,
    },
    Directional {
        /// Direction the light travels
        direction: Vec3,
    },
    Spot {
        position: Vec3,
        direction: Vec3,
        /// Full-intensity half-angle, degrees
        inner_cutoff: f32,
        /// Zero-intensity half-angle, degrees
        outer_cutoff: f32,
    },
}

impl LightKind {
    /// Tag stored in the light uniform.
    pub fn tag(&self) -> u32 {
        match self {
            Self::Point { .. } => 0,
            Self::Directional { .. } => 1,
            Self::Spot { .. } => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Point { .. } => "point",
            Self::Directional { .. } => "directional",
            Self::Spot { .. } => "spot",
        }
    }
}

/// Distance falloff `1 / (constant + linear*d + quadratic*d²)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

impl Attenuation {
    pub fn factor(&self, distance: f32) -> f32 {
        let denom = self.constant + self.linear * distance + self.quadratic * distance * distance;
        1.0 / denom.max(1e-6)
    }
}

/// A light source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub attenuation: Attenuation,
    /// Emitter size in shadow-map texels
    pub width: f32,
    pub enabled: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self::point(Vec3::new(3.0, 2.5, 3.0))
    }
}

/// Ambient, diffuse and specular radiance of one light at one point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightTerms {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl Light {
    fn with_kind(kind: LightKind) -> Self {
        Self {
            kind,
            color: Vec3::ONE,
            intensity: 1.0,
            ambient: 0.1,
            diffuse: 1.0,
            specular: 0.5,
            attenuation: Attenuation::default(),
            width: 50.0,
            enabled: true,
        }
    }

    pub fn point(position: Vec3) -> Self {
        Self::with_kind(LightKind::Point { position })
    }

    pub fn directional(direction: Vec3) -> Self {
        Self::with_kind(LightKind::Directional { direction })
    }

    /// Spot light with a 12.5° inner and 17.5° outer cone.
    pub fn spot(position: Vec3, direction: Vec3) -> Self {
        Self::with_kind(LightKind::Spot {
            position,
            direction,
            inner_cutoff: 12.5,
            outer_cutoff: 17.5,
        })
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn position(&self) -> Option<Vec3> {
        match self.kind {
            LightKind::Point { position } | LightKind::Spot { position, .. } => Some(position),
            LightKind::Directional { .. } => None,
        }
    }

    pub fn set_position(&mut self, new_position: Vec3) {
        match &mut self.kind {
            LightKind::Point { position } | LightKind::Spot { position, .. } => *position = new_position,
            LightKind::Directional { .. } => {}
        }
    }

    /// Unit vector from a surface point towards the light.
    pub fn direction_to_light(&self, world_pos: Vec3) -> Vec3 {
        match self.kind {
            LightKind::Directional { direction } => safe_normalize(-direction),
            LightKind::Point { position } | LightKind::Spot { position, .. } => {
                safe_normalize(position - world_pos)
            }
        }
    }

    /// Effective intensity after the enable toggle.
    pub fn effective_intensity(&self) -> f32 {
        if self.enabled {
            self.intensity
        } else {
            0.0
        }
    }

    /// Lambert diffuse plus Blinn-Phong specular, as the fragment shader computes it.
    ///
    /// `normal` and `view_dir` must be unit length. Ambient is neither
    /// attenuated nor cone-limited.
    pub fn contribution(&self, world_pos: Vec3, normal: Vec3, view_dir: Vec3, shininess: f32) -> LightTerms {
        let mut to_light = self.direction_to_light(world_pos);
        let mut falloff = 1.0;

        match self.kind {
            LightKind::Directional { .. } => {}
            LightKind::Point { position } => {
                falloff = self.attenuation.factor((position - world_pos).length());
            }
            LightKind::Spot {
                position,
                direction,
                inner_cutoff,
                outer_cutoff,
            } => {
                to_light = safe_normalize(position - world_pos);
                falloff = self.attenuation.factor((position - world_pos).length());
                let theta = to_light.dot(safe_normalize(-direction));
                let (cos_inner, cos_outer) = cone_cosines(inner_cutoff, outer_cutoff);
                let epsilon = (cos_inner - cos_outer).max(1e-4);
                falloff *= ((theta - cos_outer) / epsilon).clamp(0.0, 1.0);
            }
        }

        let n_dot_l = normal.dot(to_light).max(0.0);
        let spec = if n_dot_l > 0.0 {
            let half_dir = safe_normalize(to_light + view_dir);
            normal.dot(half_dir).max(0.0).powf(shininess)
        } else {
            0.0
        };

        LightTerms {
            ambient: self.ambient * self.color,
            diffuse: self.diffuse * self.color * n_dot_l * falloff,
            specular: self.specular * self.color * spec * falloff,
        }
    }

    /// Final shaded color: `intensity * (base * (ambient + v*diffuse) + v*specular)`.
    pub fn shade(&self, base: Vec3, terms: &LightTerms, visibility: f32) -> Vec3 {
        self.effective_intensity() * (base * (terms.ambient + visibility * terms.diffuse) + visibility * terms.specular)
    }

    /// View and projection from the light, aimed at `target`.
    ///
    /// Point lights look at the target with the frustum's field of view, spot
    /// lights look down their axis with a cone-wide field of view and
    /// directional lights use an orthographic box centered on the target.
    pub fn light_space(&self, target: Vec3, frustum: &LightFrustum) -> LightSpace {
        let near = frustum.near;
        let far = frustum.far;

        let (eye, forward) = match self.kind {
            LightKind::Point { position } => (position, target - position),
            LightKind::Spot { position, direction, .. } => (position, direction),
            LightKind::Directional { direction } => {
                let dir = safe_normalize(direction);
                let dir = if dir == Vec3::ZERO { Vec3::NEG_Y } else { dir };
                (target - dir * (0.5 * (near + far)), dir)
            }
        };

        let forward = if forward.length_squared() < 1e-12 {
            Vec3::NEG_Y
        } else {
            forward.normalize()
        };
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_to_rh(eye, forward, up);

        let (projection, depth) = match self.kind {
            LightKind::Directional { .. } => {
                let e = frustum.ortho_half_extent;
                (
                    Mat4::orthographic_rh(-e, e, -e, e, near, far),
                    DepthRange::orthographic(near, far),
                )
            }
            LightKind::Spot { outer_cutoff, .. } => {
                let fov = (2.0 * outer_cutoff).clamp(1.0, 170.0).to_radians();
                (Mat4::perspective_rh(fov, 1.0, near, far), DepthRange::perspective(near, far))
            }
            LightKind::Point { .. } => (
                Mat4::perspective_rh(frustum.fov_y_degrees.to_radians(), 1.0, near, far),
                DepthRange::perspective(near, far),
            ),
        };

        LightSpace {
            view,
            projection,
            view_proj: projection * view,
            depth,
        }
    }

    /// Where to draw the light marker. Directional lights have no position, so
    /// the marker sits at the eye of their shadow frustum.
    pub fn marker_position(&self, target: Vec3, frustum: &LightFrustum) -> Vec3 {
        match self.position() {
            Some(p) => p,
            None => self.light_space(target, frustum).view.inverse().w_axis.truncate(),
        }
    }

    #[cfg(feature = "gpu")]
    pub fn to_uniform(&self) -> phong_surface::LightUniform {
        use glam::Vec4;

        let (position, direction) = match self.kind {
            LightKind::Point { position } => (position, Vec3::NEG_Y),
            LightKind::Directional { direction } => (Vec3::ZERO, direction),
            LightKind::Spot { position, direction, .. } => (position, direction),
        };
        let cone = match self.kind {
            LightKind::Spot {
                inner_cutoff,
                outer_cutoff,
                ..
            } => {
                let (inner, outer) = cone_cosines(inner_cutoff, outer_cutoff);
                Vec4::new(inner, outer, 0.0, 0.0)
            }
            _ => Vec4::new(-1.0, -1.0, 0.0, 0.0),
        };
        let a = self.attenuation;

        phong_surface::LightUniform {
            position_kind: position.extend(self.kind.tag() as f32),
            direction_intensity: direction.extend(self.effective_intensity()),
            color_width: self.color.extend(self.width),
            coefficients: Vec4::new(self.ambient, self.diffuse, self.specular, 0.0),
            attenuation: Vec4::new(a.constant, a.linear, a.quadratic, 0.0),
            cone,
        }
    }
}

fn cone_cosines(inner_deg: f32, outer_deg: f32) -> (f32, f32) {
    (inner_deg.to_radians().cos(), outer_deg.to_radians().cos())
}

fn safe_normalize(v: Vec3) -> Vec3 {
    let len = v.length();
    if len < 1e-6 {
        Vec3::ZERO
    } else {
        v / len
    }
}

/// Shape of the light's shadow frustum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightFrustum {
    /// Point-light field of view
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Half-size of the directional light's orthographic box
    pub ortho_half_extent: f32,
}

impl Default for LightFrustum {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            near: 1.0,
            far: 100.0,
            ortho_half_extent: 10.0,
        }
    }
}

/// Light transforms for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_proj: Mat4,
    pub depth: DepthRange,
}

impl LightSpace {
    /// NDC depth of `point`, or mid-range when it falls outside the frustum.
    /// The summed-area table is centred on this depth.
    pub fn reference_depth(&self, point: Vec3) -> f32 {
        project(&self.view_proj, point).map_or(0.5, |s| s.depth.clamp(0.0, 1.0))
    }
}
