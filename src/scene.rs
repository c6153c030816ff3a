//! Procedural meshes and the demo scene.
//!
//! The renderer takes plain vertex/index arrays; this module builds the
//! ground plane, sphere cluster and marker cube that the CLI renders.

use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use phong_surface::Vertex;

use crate::light::Light;

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn radius(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }

    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Bounds of the eight corners after `transform`.
    pub fn transformed(&self, transform: &Mat4) -> Bounds {
        let mut out = Bounds::empty();
        if !self.is_valid() {
            return out;
        }
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand(transform.transform_point3(corner));
        }
        out
    }
}

/// Indexed triangle mesh, counter-clockwise front faces.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::empty();
        for v in &self.vertices {
            b.expand(Vec3::from_array(v.position));
        }
        b
    }

    /// Append another mesh, moved by `offset` and scaled by `scale`.
    fn append(&mut self, other: &MeshData, offset: Vec3, scale: f32) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(other.vertices.iter().map(|v| Vertex {
            position: (Vec3::from_array(v.position) * scale + offset).to_array(),
            ..*v
        }));
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Square in the XZ plane facing +Y.
    pub fn plane(half_extent: f32) -> Self {
        let h = half_extent;
        let corner = |x: f32, z: f32, uv: [f32; 2]| Vertex {
            position: [x, 0.0, z],
            normal: [0.0, 1.0, 0.0],
            uv,
        };
        Self {
            vertices: vec![
                corner(-h, -h, [0.0, 0.0]),
                corner(-h, h, [0.0, 1.0]),
                corner(h, h, [1.0, 1.0]),
                corner(h, -h, [1.0, 0.0]),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Unit cube centered on the origin.
    pub fn cube() -> Self {
        // (normal, u, v) with u x v == normal so (0,1,2) winds outward
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];

        let mut mesh = MeshData::default();
        for (face, (n, u, v)) in faces.into_iter().enumerate() {
            let c = n * 0.5;
            let corners = [
                (c - u * 0.5 - v * 0.5, [0.0, 0.0]),
                (c + u * 0.5 - v * 0.5, [1.0, 0.0]),
                (c + u * 0.5 + v * 0.5, [1.0, 1.0]),
                (c - u * 0.5 + v * 0.5, [0.0, 1.0]),
            ];
            for (p, uv) in corners {
                mesh.vertices.push(Vertex {
                    position: p.to_array(),
                    normal: n.to_array(),
                    uv,
                });
            }
            let base = face as u32 * 4;
            mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Latitude/longitude sphere.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut mesh = MeshData::default();

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            for seg in 0..=segments {
                let theta = 2.0 * PI * seg as f32 / segments as f32;
                let n = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                mesh.vertices.push(Vertex {
                    position: (n * radius).to_array(),
                    normal: n.to_array(),
                    uv: [seg as f32 / segments as f32, ring as f32 / rings as f32],
                });
            }
        }

        for ring in 0..rings {
            for seg in 0..segments {
                let curr = ring * (segments + 1) + seg;
                let next = curr + segments + 1;
                mesh.indices.extend_from_slice(&[curr, curr + 1, next, next, curr + 1, next + 1]);
            }
        }
        mesh
    }

    /// A large center sphere ringed by six smaller ones at staggered heights.
    pub fn sphere_group() -> Self {
        let mut mesh = MeshData::default();
        mesh.append(&Self::uv_sphere(2.0, 48, 24), Vec3::ZERO, 1.0);

        let small = Self::uv_sphere(1.0, 32, 16);
        for i in 0..6 {
            let angle = i as f32 * PI / 3.0;
            let height = if i % 2 == 0 { 1.0 } else { -0.5 };
            let offset = Vec3::new(4.0 * angle.cos(), height, 4.0 * angle.sin());
            mesh.append(&small, offset, 1.0 + 0.1 * (i % 3) as f32);
        }
        mesh
    }
}

/// Flat Blinn-Phong material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub color: Vec3,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            shininess: 32.0,
        }
    }
}

impl Material {
    pub fn new(color: Vec3, shininess: f32) -> Self {
        Self { color, shininess }
    }

    pub fn to_uniform(&self) -> phong_surface::MaterialUniform {
        phong_surface::MaterialUniform::new(self.color, self.shininess)
    }
}

/// One drawable: mesh, placement and material.
#[derive(Clone, Debug)]
pub struct SceneObject {
    pub name: String,
    pub mesh: Arc<MeshData>,
    pub transform: Mat4,
    pub material: Material,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, mesh: MeshData, transform: Mat4, material: Material) -> Self {
        Self {
            name: name.into(),
            mesh: Arc::new(mesh),
            transform,
            material,
        }
    }

    pub fn world_bounds(&self) -> Bounds {
        self.mesh.bounds().transformed(&self.transform)
    }
}

/// Objects, the light and the point the light's frustum aims at.
#[derive(Clone, Debug)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub light: Light,
    pub light_target: Vec3,
}

impl Scene {
    /// Sphere cluster floating over a ground plane, lit from above and to the side.
    pub fn demo() -> Self {
        let plane = SceneObject::new(
            "plane",
            MeshData::plane(5.0),
            Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0)) * Mat4::from_scale(Vec3::splat(3.5)),
            Material::new(Vec3::ONE, 3.0),
        );
        let spheres = SceneObject::new(
            "spheres",
            MeshData::sphere_group(),
            Mat4::from_scale(Vec3::splat(0.2)),
            Material::new(Vec3::new(0.9, 0.9, 1.0), 32.0),
        );

        Self {
            objects: vec![plane, spheres],
            light: Light::default(),
            light_target: Vec3::ZERO,
        }
    }

    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::empty();
        for obj in &self.objects {
            let ob = obj.world_bounds();
            if ob.is_valid() {
                b.expand(ob.min);
                b.expand(ob.max);
            }
        }
        b
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward(mesh: &MeshData, center: Vec3) {
        for tri in mesh.indices.chunks(3) {
            let p = |i: u32| Vec3::from_array(mesh.vertices[i as usize].position);
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            let n = (b - a).cross(c - a);
            // Pole triangles collapse to zero area
            if n.length_squared() < 1e-10 {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(n.dot(centroid - center) > 0.0, "inward triangle {:?}", tri);
        }
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = MeshData::plane(5.0);
        assert_eq!(plane.triangle_count(), 2);
        assert_outward(&plane, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_cube_winding() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert_outward(&cube, Vec3::ZERO);
        let b = cube.bounds();
        assert_eq!(b.min, Vec3::splat(-0.5));
        assert_eq!(b.max, Vec3::splat(0.5));
    }

    #[test]
    fn test_sphere_winding_and_normals() {
        let sphere = MeshData::uv_sphere(2.0, 16, 8);
        assert_outward(&sphere, Vec3::ZERO);
        for v in &sphere.vertices {
            let p = Vec3::from_array(v.position);
            assert!((p.length() - 2.0).abs() < 1e-4);
            assert!((Vec3::from_array(v.normal) - p / 2.0).length() < 1e-4);
        }
    }

    #[test]
    fn test_sphere_group_indices_in_range() {
        let group = MeshData::sphere_group();
        let count = group.vertices.len() as u32;
        assert!(group.indices.iter().all(|&i| i < count));
        assert_eq!(group.indices.len() % 3, 0);
    }

    #[test]
    fn test_demo_scene_layout() {
        let scene = Scene::demo();
        let plane = scene.object("plane").unwrap();
        let b = plane.world_bounds();
        assert!((b.min.y + 2.0).abs() < 1e-5 && (b.max.y + 2.0).abs() < 1e-5);
        assert!((b.max.x - 17.5).abs() < 1e-4);

        // Spheres float above the plane
        let spheres = scene.object("spheres").unwrap().world_bounds();
        assert!(spheres.min.y > -2.0);
        assert!(scene.bounds().is_valid());
    }
}
