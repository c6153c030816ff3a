//! Summed-area table over a moment map.
//!
//! Built with the same two-pass scheme the compute shader uses: each pass
//! prefix-sums every row and writes the result transposed, so the second
//! pass scans the original columns and restores the original orientation.
//! Each row scan splits the row into [`SCAN_LANES`] contiguous chunks, sums
//! each chunk serially, combines the chunk totals with a Hillis-Steele scan
//! and then writes the running sums. The additions happen in the same order
//! as on the GPU, so both produce the same `f32` results up to driver
//! rounding.
//!
//! The table stores moments re-centred on a reference depth `c`: each texel
//! contributes `(z - c, (z - c)²)`. Raw sums reach 10⁶ at 1024², which leaves
//! too few bits for small windows near the bottom-right corner to resolve the
//! depth bias. Centred on the scene's depth the entries stay small and mixed
//! in sign. Window means add `c` back; the variance does not depend on it.

use rayon::prelude::*;

use super::moments::MomentMap;
use crate::util::{Error, Result};

/// Lanes per row scan (the compute shader's workgroup size).
pub const SCAN_LANES: usize = 256;

/// Inclusive rectangle of texels, `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl TexelRect {
    /// Square of half-size `half` around `center`, clipped to a `size²` map.
    ///
    /// Returns `None` when nothing of the square lies inside the map.
    pub fn around(center: (i32, i32), half: i32, size: u32) -> Option<Self> {
        let max = size as i32 - 1;
        let rect = Self {
            x0: (center.0 - half).max(0),
            y0: (center.1 - half).max(0),
            x1: (center.0 + half).min(max),
            y1: (center.1 + half).min(max),
        };
        (rect.x0 <= rect.x1 && rect.y0 <= rect.y1).then_some(rect)
    }

    pub fn area(&self) -> u32 {
        ((self.x1 - self.x0 + 1) * (self.y1 - self.y0 + 1)) as u32
    }
}

/// Texel half-size of the averaging window for a radius in texels.
pub fn window_half_size(radius: f32) -> i32 {
    ((radius + 0.5) as i32).max(0)
}

/// Depth statistics over a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f32,
    /// `E[z²] - E[z]²`, clamped to be non-negative.
    pub variance: f32,
    pub area: u32,
}

/// Moments of `depth` relative to `offset`.
pub fn centred_moments(depth: f32, offset: f32) -> [f32; 2] {
    let z = depth - offset;
    [z, z * z]
}

/// Inclusive 2D prefix sum of centred moments:
/// `at(x, y) = Σ (m(i, j) - c)` for `i <= x`, `j <= y`.
#[derive(Clone, Debug, PartialEq)]
pub struct SummedAreaTable {
    size: u32,
    offset: f32,
    sums: Vec<[f32; 2]>,
}

impl SummedAreaTable {
    /// Table centred on the map's mean depth.
    pub fn build(moments: &MomentMap) -> Self {
        Self::build_centred(moments, moments.mean_depth())
    }

    /// Table of moments centred on `offset`, as the compute pass builds it.
    pub fn build_centred(moments: &MomentMap, offset: f32) -> Self {
        let size = moments.size() as usize;
        let sums = if size == 0 {
            Vec::new()
        } else {
            let texels: Vec<[f32; 2]> = moments
                .texels()
                .iter()
                .map(|m| centred_moments(m.depth, offset))
                .collect();
            let rows = scan_rows_transposed(size, &texels);
            scan_rows_transposed(size, &rows)
        };
        Self {
            size: moments.size(),
            offset,
            sums,
        }
    }

    /// Wrap sums read back from the GPU (row-major), centred on `offset`.
    pub fn from_raw(size: u32, offset: f32, sums: Vec<[f32; 2]>) -> Result<Self> {
        let expected = (size as usize) * (size as usize);
        if sums.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: sums.len(),
            });
        }
        Ok(Self { size, offset, sums })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Reference depth the moments were centred on.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn sums(&self) -> &[[f32; 2]] {
        &self.sums
    }

    /// Centred prefix sum at `(x, y)`; coordinates below zero read as zero.
    pub fn at(&self, x: i32, y: i32) -> [f32; 2] {
        if x < 0 || y < 0 {
            return [0.0, 0.0];
        }
        self.sums[y as usize * self.size as usize + x as usize]
    }

    /// Sum of the centred moments over `rect` by inclusion-exclusion.
    pub fn centred_sum(&self, rect: TexelRect) -> [f32; 2] {
        let a = self.at(rect.x1, rect.y1);
        let b = self.at(rect.x0 - 1, rect.y1);
        let c = self.at(rect.x1, rect.y0 - 1);
        let d = self.at(rect.x0 - 1, rect.y0 - 1);
        [a[0] - b[0] - c[0] + d[0], a[1] - b[1] - c[1] + d[1]]
    }

    /// Sum of both moments `(z, z²)` over `rect`.
    pub fn rect_sum(&self, rect: TexelRect) -> [f32; 2] {
        let [s0, s1] = self.centred_sum(rect);
        let n = rect.area() as f32;
        let c = self.offset;
        [s0 + n * c, s1 + 2.0 * c * s0 + n * c * c]
    }

    /// Largest per-entry difference to `other`, relative to `max(|other|, 1)`.
    ///
    /// `None` when the tables differ in size or centring.
    pub fn max_relative_difference(&self, other: &SummedAreaTable) -> Option<f32> {
        if self.size != other.size || self.offset != other.offset {
            return None;
        }
        let worst = self
            .sums
            .par_iter()
            .zip(other.sums.par_iter())
            .map(|(a, b)| {
                let d0 = (a[0] - b[0]).abs() / b[0].abs().max(1.0);
                let d1 = (a[1] - b[1]).abs() / b[1].abs().max(1.0);
                d0.max(d1)
            })
            .reduce(|| 0.0, f32::max);
        Some(worst)
    }

    /// Depth statistics over the window of `radius` texels around `center`.
    ///
    /// `None` when the clipped window is empty.
    pub fn window(&self, center: (i32, i32), radius: f32) -> Option<WindowStats> {
        let rect = TexelRect::around(center, window_half_size(radius), self.size)?;
        let [s0, s1] = self.centred_sum(rect);
        let area = rect.area();
        let mean = s0 / area as f32;
        Some(WindowStats {
            mean: mean + self.offset,
            variance: (s1 / area as f32 - mean * mean).max(0.0),
            area,
        })
    }
}

/// Direct `f64` sum of both moments over `rect`, for checking tables.
pub fn brute_force_sum(moments: &MomentMap, rect: TexelRect) -> [f64; 2] {
    let mut sum = [0.0f64; 2];
    for y in rect.y0..=rect.y1 {
        for x in rect.x0..=rect.x1 {
            let m = moments.get(x as u32, y as u32);
            sum[0] += m.depth as f64;
            sum[1] += m.depth_sq as f64;
        }
    }
    sum
}

/// One pass: prefix-sum every row of a `size²` grid, output transposed.
fn scan_rows_transposed(size: usize, src: &[[f32; 2]]) -> Vec<[f32; 2]> {
    let rows: Vec<Vec<[f32; 2]>> = src.par_chunks(size).map(scan_row).collect();
    let mut out = vec![[0.0f32; 2]; size * size];
    for (r, row) in rows.iter().enumerate() {
        for (x, value) in row.iter().enumerate() {
            out[x * size + r] = *value;
        }
    }
    out
}

fn add(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [a[0] + b[0], a[1] + b[1]]
}

fn scan_row(row: &[[f32; 2]]) -> Vec<[f32; 2]> {
    let n = row.len();
    let chunk = n.div_ceil(SCAN_LANES);
    let bounds = |lane: usize| {
        let begin = (lane * chunk).min(n);
        (begin, (begin + chunk).min(n))
    };

    let mut totals = [[0.0f32; 2]; SCAN_LANES];
    for (lane, total) in totals.iter_mut().enumerate() {
        let (begin, end) = bounds(lane);
        *total = row[begin..end].iter().fold([0.0, 0.0], |acc, v| add(acc, *v));
    }

    // Hillis-Steele inclusive scan over lane totals
    let mut offset = 1;
    while offset < SCAN_LANES {
        let prev = totals;
        for lane in offset..SCAN_LANES {
            totals[lane] = add(prev[lane], prev[lane - offset]);
        }
        offset <<= 1;
    }

    let mut out = Vec::with_capacity(n);
    for lane in 0..SCAN_LANES {
        let (begin, end) = bounds(lane);
        let mut running = if lane > 0 { totals[lane - 1] } else { [0.0, 0.0] };
        for value in &row[begin..end] {
            running = add(running, *value);
            out.push(running);
        }
    }
    out
}
