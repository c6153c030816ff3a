//! Two-moment depth map as produced by the light pass.

use bytemuck::{Pod, Zeroable};

use crate::util::{Error, Result};

/// First and second moment of light-space depth for one texel.
///
/// Layout matches an `Rg32Float` texel so GPU readbacks cast directly.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Moments {
    pub depth: f32,
    pub depth_sq: f32,
}

impl Moments {
    /// Moments of a single depth sample.
    pub fn of(depth: f32) -> Self {
        Self { depth, depth_sq: depth * depth }
    }

    /// Cleared texel: nothing between the light and the far plane.
    pub const CLEAR: Self = Self { depth: 1.0, depth_sq: 1.0 };

    pub fn as_array(self) -> [f32; 2] {
        [self.depth, self.depth_sq]
    }
}

/// Square moment map, row-major with texel `(x, y)` at `y * size + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct MomentMap {
    size: u32,
    texels: Vec<Moments>,
}

impl MomentMap {
    /// Map with every texel at the far plane.
    pub fn cleared(size: u32) -> Self {
        Self {
            size,
            texels: vec![Moments::CLEAR; (size as usize) * (size as usize)],
        }
    }

    /// Build from raw NDC depths.
    pub fn from_depths(size: u32, depths: &[f32]) -> Result<Self> {
        check_len(size, depths.len())?;
        Ok(Self {
            size,
            texels: depths.iter().copied().map(Moments::of).collect(),
        })
    }

    /// Build by evaluating `depth(x, y)` at every texel.
    pub fn from_fn(size: u32, depth: impl Fn(u32, u32) -> f32) -> Self {
        let texels = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .map(|(x, y)| Moments::of(depth(x, y)))
            .collect();
        Self { size, texels }
    }

    /// Wrap texels read back from the GPU.
    pub fn from_texels(size: u32, texels: Vec<Moments>) -> Result<Self> {
        check_len(size, texels.len())?;
        Ok(Self { size, texels })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texels(&self) -> &[Moments] {
        &self.texels
    }

    pub fn get(&self, x: u32, y: u32) -> Moments {
        self.texels[(y * self.size + x) as usize]
    }

    /// Stored depth at a signed texel coordinate, `None` outside the map.
    pub fn depth_at(&self, x: i32, y: i32) -> Option<f32> {
        let size = self.size as i32;
        if x < 0 || y < 0 || x >= size || y >= size {
            return None;
        }
        Some(self.texels[(y * size + x) as usize].depth)
    }

    /// Mean stored depth, the far plane for an empty map.
    pub fn mean_depth(&self) -> f32 {
        if self.texels.is_empty() {
            return Moments::CLEAR.depth;
        }
        let sum: f64 = self.texels.iter().map(|m| m.depth as f64).sum();
        (sum / self.texels.len() as f64) as f32
    }

    /// Depth channel quantised to 8 bits, row-major (debug visualisation).
    pub fn depth_bytes(&self) -> Vec<u8> {
        self.texels
            .iter()
            .map(|m| (m.depth.clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
            .collect()
    }
}

fn check_len(size: u32, actual: usize) -> Result<()> {
    let expected = (size as usize) * (size as usize);
    if expected != actual {
        return Err(Error::SizeMismatch { expected, actual });
    }
    Ok(())
}
