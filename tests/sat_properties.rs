//! Summed-area table properties checked against direct summation.

use vssm::shadow::{brute_force_sum, MomentMap, SummedAreaTable, TexelRect, SCAN_LANES};

/// Deterministic depth field with structure at several scales.
fn bumpy(size: u32) -> MomentMap {
    MomentMap::from_fn(size, |x, y| {
        let coarse = if (x / 13 + y / 7) % 2 == 0 { 0.3 } else { 0.8 };
        let fine = ((x * 31 + y * 17) % 23) as f32 / 230.0;
        coarse + fine
    })
}

fn assert_rect_close(sat: &SummedAreaTable, map: &MomentMap, rect: TexelRect, tol: f64) {
    let expected = brute_force_sum(map, rect);
    let got = sat.rect_sum(rect);
    for channel in 0..2 {
        let err = (got[channel] as f64 - expected[channel]).abs();
        assert!(
            err <= tol,
            "rect {:?} channel {}: got {}, expected {}",
            rect,
            channel,
            got[channel],
            expected[channel]
        );
    }
}

#[test]
fn test_rect_sums_match_brute_force() {
    let map = bumpy(96);
    let sat = SummedAreaTable::build(&map);

    let rects = [
        TexelRect { x0: 0, y0: 0, x1: 0, y1: 0 },
        TexelRect { x0: 0, y0: 0, x1: 95, y1: 95 },
        TexelRect { x0: 10, y0: 20, x1: 30, y1: 22 },
        TexelRect { x0: 95, y0: 95, x1: 95, y1: 95 },
        TexelRect { x0: 40, y0: 0, x1: 41, y1: 95 },
        TexelRect { x0: 0, y0: 60, x1: 95, y1: 60 },
    ];
    for rect in rects {
        assert_rect_close(&sat, &map, rect, 0.02);
    }
}

#[test]
fn test_rows_wider_than_scan_lanes() {
    // More texels than lanes: each lane owns a chunk, trailing lanes idle
    let size = SCAN_LANES as u32 + 44;
    let map = bumpy(size);
    let sat = SummedAreaTable::build(&map);
    let last = size as i32 - 1;

    for rect in [
        TexelRect { x0: 0, y0: 0, x1: last, y1: 0 },
        TexelRect { x0: 0, y0: 5, x1: last, y1: 5 },
        TexelRect { x0: 250, y0: 250, x1: 260, y1: 262 },
        TexelRect { x0: last - 3, y0: 0, x1: last, y1: 3 },
    ] {
        assert_rect_close(&sat, &map, rect, 0.25);
    }

    // Whole-map total to relative precision
    let full = TexelRect { x0: 0, y0: 0, x1: last, y1: last };
    let expected = brute_force_sum(&map, full);
    let got = sat.rect_sum(full);
    assert!((got[0] as f64 - expected[0]).abs() / expected[0] < 1e-4);
    assert!((got[1] as f64 - expected[1]).abs() / expected[1] < 1e-4);
}

#[test]
fn test_prefix_sums_monotonic_for_positive_depths() {
    // Uncentred table: every prefix adds a positive depth
    let map = bumpy(64);
    let sat = SummedAreaTable::build_centred(&map, 0.0);
    for y in 0..64 {
        for x in 1..64 {
            assert!(sat.at(x, y)[0] > sat.at(x - 1, y)[0]);
            if y > 0 {
                assert!(sat.at(x, y)[0] > sat.at(x, y - 1)[0]);
            }
        }
    }
}

#[test]
fn test_build_is_deterministic() {
    let map = bumpy(200);
    let a = SummedAreaTable::build(&map);
    let b = SummedAreaTable::build(&map);
    assert_eq!(a, b);
    assert_eq!(a.max_relative_difference(&b), Some(0.0));
}

#[test]
fn test_window_variance_non_negative() {
    let map = bumpy(128);
    let sat = SummedAreaTable::build(&map);
    for &(cx, cy) in &[(0, 0), (64, 64), (127, 3), (12, 100)] {
        for radius in [0.0, 1.0, 4.5, 20.0, 300.0] {
            let stats = sat.window((cx, cy), radius).unwrap();
            assert!(stats.variance >= 0.0);
            assert!(stats.mean > 0.29 && stats.mean < 0.91, "mean {}", stats.mean);
        }
    }
}

#[test]
fn test_cleared_map_has_unit_mean() {
    let map = MomentMap::cleared(32);
    let sat = SummedAreaTable::build(&map);
    let stats = sat.window((16, 16), 5.0).unwrap();
    assert_eq!(stats.area, 121);
    assert!((stats.mean - 1.0).abs() < 1e-6);
    assert!(stats.variance < 1e-6);
}

#[test]
fn test_windows_far_from_origin_keep_precision() {
    // Sloped 1024² map: a symmetric window over a linear ramp averages to its
    // centre texel, down to the last rows and columns.
    let size = 1024;
    let map = MomentMap::from_fn(size, |x, y| 0.3 + 0.6 * (x + y) as f32 / 2046.0);
    let sat = SummedAreaTable::build(&map);
    for center in [(8, 8), (512, 700), (1000, 1000), (1016, 1019)] {
        let stats = sat.window(center, 3.0).unwrap();
        let expected = map.get(center.0 as u32, center.1 as u32).depth;
        assert!(
            (stats.mean - expected).abs() < 5e-4,
            "window at {:?}: mean {}, centre {}",
            center,
            stats.mean,
            expected
        );
        // Ramp step is 0.6 / 2046 per texel along each axis
        assert!(stats.variance < 1e-4, "variance {}", stats.variance);
    }
}
