//! Embedded compute and overlay shaders.

/// Inclusive prefix sum of every row of `src`, written transposed into `dst`.
///
/// One workgroup per row. Each lane scans a contiguous chunk serially, the
/// lane totals are scanned in workgroup memory, then each lane rescans its
/// chunk offset by the preceding total. `scan_moments` runs first on the
/// moment map and turns each depth into `(z - c, (z - c)²)` with `c` from
/// the params block. `scan_sums` then scans the rows of the transposed
/// result, which yields the summed-area table in the original orientation.
pub const SAT_SHADER: &str = r#"
const LANES: u32 = 256u;

struct SatParams {
    moment_offset: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var dst: texture_storage_2d<rg32float, write>;
@group(0) @binding(2) var<uniform> params: SatParams;

var<workgroup> totals: array<vec2<f32>, 256>;

fn load_texel(x: u32, row: u32, centre: bool) -> vec2<f32> {
    let texel = textureLoad(src, vec2<u32>(x, row), 0);
    if centre {
        let z = texel.x - params.moment_offset;
        return vec2<f32>(z, z * z);
    }
    return texel.xy;
}

fn scan_row(row: u32, lane: u32, centre: bool) {
    let dims = textureDimensions(src);
    if row >= dims.y {
        return;
    }

    let width = dims.x;
    let chunk = (width + LANES - 1u) / LANES;
    let start = min(lane * chunk, width);
    let end = min(start + chunk, width);

    var running = vec2<f32>(0.0);
    for (var x = start; x < end; x++) {
        running += load_texel(x, row, centre);
    }
    totals[lane] = running;
    workgroupBarrier();

    for (var offset = 1u; offset < LANES; offset = offset << 1u) {
        var carry = vec2<f32>(0.0);
        if lane >= offset {
            carry = totals[lane - offset];
        }
        workgroupBarrier();
        totals[lane] += carry;
        workgroupBarrier();
    }

    running = vec2<f32>(0.0);
    if lane > 0u {
        running = totals[lane - 1u];
    }
    for (var x = start; x < end; x++) {
        running += load_texel(x, row, centre);
        textureStore(dst, vec2<u32>(row, x), vec4<f32>(running, 0.0, 0.0));
    }
}

@compute @workgroup_size(256)
fn scan_moments(
    @builtin(workgroup_id) group: vec3<u32>,
    @builtin(local_invocation_index) lane: u32,
) {
    scan_row(group.x, lane, true);
}

@compute @workgroup_size(256)
fn scan_sums(
    @builtin(workgroup_id) group: vec3<u32>,
    @builtin(local_invocation_index) lane: u32,
) {
    scan_row(group.x, lane, false);
}
"#;

/// Params block of [`SAT_SHADER`] (binding 2).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SatUniform {
    pub moment_offset: f32,
    pub _pad: [f32; 3],
}

impl SatUniform {
    pub fn new(moment_offset: f32) -> Self {
        Self {
            moment_offset,
            _pad: [0.0; 3],
        }
    }
}

/// Workgroup size of [`SAT_SHADER`]; must match `LANES` in the source.
pub const SAT_WORKGROUP_SIZE: u32 = 256;

/// Moment map preview, drawn into a corner viewport.
pub const DEBUG_SHADER: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@group(0) @binding(0) var moment_map: texture_2d<f32>;

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VsOut {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0)
    );
    let pos = positions[index];
    var out: VsOut;
    out.pos = vec4<f32>(pos, 0.0, 1.0);
    out.uv = vec2<f32>(pos.x * 0.5 + 0.5, 1.0 - (pos.y * 0.5 + 0.5));
    return out;
}

// Depth channel as grayscale
@fragment
fn fs_moment_debug(in: VsOut) -> @location(0) vec4<f32> {
    let dims = vec2<i32>(textureDimensions(moment_map));
    let texel = clamp(vec2<i32>(floor(in.uv * vec2<f32>(dims))), vec2<i32>(0), dims - vec2<i32>(1));
    let depth = textureLoad(moment_map, texel, 0).x;
    return vec4<f32>(vec3<f32>(depth), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sat_shader_layout() {
        assert!(SAT_SHADER.contains("@workgroup_size(256)"));
        assert!(SAT_SHADER.contains(&format!("const LANES: u32 = {}u;", SAT_WORKGROUP_SIZE)));
        assert!(SAT_SHADER.contains("fn scan_moments"));
        assert!(SAT_SHADER.contains("fn scan_sums"));
        // Output is transposed
        assert!(SAT_SHADER.contains("textureStore(dst, vec2<u32>(row, x)"));
        assert_eq!(SAT_SHADER.matches("workgroupBarrier()").count(), 3);
    }

    #[test]
    fn test_sat_params_block() {
        assert_eq!(std::mem::size_of::<SatUniform>(), 16);
        assert!(SAT_SHADER.contains("@group(0) @binding(2) var<uniform> params: SatParams;"));
        // Only the first pass centres; the second sums what it is given
        assert!(SAT_SHADER.contains("scan_row(group.x, lane, true)"));
        assert!(SAT_SHADER.contains("scan_row(group.x, lane, false)"));
        assert_eq!(SatUniform::new(0.75).moment_offset, 0.75);
    }

    #[test]
    fn test_sat_matches_cpu_lane_count() {
        assert_eq!(SAT_WORKGROUP_SIZE as usize, crate::shadow::SCAN_LANES);
    }

    #[test]
    fn test_debug_shader_entry_points() {
        assert!(DEBUG_SHADER.contains("fn vs_fullscreen"));
        assert!(DEBUG_SHADER.contains("fn fs_moment_debug"));
    }
}
