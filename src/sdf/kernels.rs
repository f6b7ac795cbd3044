//! Host implementations of the three compute kernels.
//!
//! These mirror `gpu/shaders/*.comp` texel for texel and back the
//! [`CpuBackend`](crate::backend::CpuBackend). Each pass reads one grid and
//! writes another; nothing reads a value written earlier in the same pass.

use super::seed::{SeedTexel, Uv};

/// Euclidean distance in pixels from texel `(x, y)` to `seed`.
pub fn seed_distance(x: u32, y: u32, seed: Uv, width: u32, height: u32) -> f32 {
    let [sx, sy] = seed.to_pixel(width, height);
    let dx = x as f32 - sx;
    let dy = y as f32 - sy;
    (dx * dx + dy * dy).sqrt()
}

/// Seed every texel with its own coordinate on the side of the mask it lies on.
pub fn init(mask: &[u32], width: u32, height: u32, out: &mut [SeedTexel]) {
    for y in 0..height {
        for x in 0..width {
            let i = y as usize * width as usize + x as usize;
            let uv = Uv::from_texel(x, y, width, height);
            out[i] = if mask[i] > 0 {
                SeedTexel::inside(uv)
            } else {
                SeedTexel::outside(uv)
            };
        }
    }
}

/// One flood step for a single texel: keep the closest inside and outside
/// seed among the 3x3 neighbourhood spaced `offset` texels apart.
pub fn flood_texel(read: &[SeedTexel], width: u32, height: u32, x: u32, y: u32, offset: u32) -> SeedTexel {
    let mut best = SeedTexel::EMPTY;
    let mut best_inside = f32::INFINITY;
    let mut best_outside = f32::INFINITY;
    let offset = i64::from(offset);

    for dy in -1..=1_i64 {
        for dx in -1..=1_i64 {
            let sx = i64::from(x) + dx * offset;
            let sy = i64::from(y) + dy * offset;
            // Out-of-bounds neighbours contribute nothing.
            if sx < 0 || sy < 0 || sx >= i64::from(width) || sy >= i64::from(height) {
                continue;
            }
            let sample = read[sy as usize * width as usize + sx as usize];

            if let Some(seed) = sample.inside {
                let d = seed_distance(x, y, seed, width, height);
                if d < best_inside {
                    best_inside = d;
                    best.inside = Some(seed);
                }
            }
            if let Some(seed) = sample.outside {
                let d = seed_distance(x, y, seed, width, height);
                if d < best_outside {
                    best_outside = d;
                    best.outside = Some(seed);
                }
            }
        }
    }

    best
}

pub fn flood(read: &[SeedTexel], write: &mut [SeedTexel], width: u32, height: u32, offset: u32) {
    for y in 0..height {
        for x in 0..width {
            write[y as usize * width as usize + x as usize] = flood_texel(read, width, height, x, y, offset);
        }
    }
}

/// Signed distance of one texel. Missing seeds count as `max_distance` and
/// the result is clamped to `[-max_distance, max_distance]`.
pub fn resolve_texel(seeds: SeedTexel, x: u32, y: u32, width: u32, height: u32, max_distance: f32) -> f32 {
    let inside = seeds
        .inside
        .map_or(max_distance, |s| seed_distance(x, y, s, width, height).min(max_distance));
    let outside = seeds
        .outside
        .map_or(max_distance, |s| seed_distance(x, y, s, width, height).min(max_distance));
    (inside - outside).clamp(-max_distance, max_distance)
}

pub fn resolve(seeds: &[SeedTexel], out: &mut [f32], width: u32, height: u32, max_distance: f32) {
    for y in 0..height {
        for x in 0..width {
            let i = y as usize * width as usize + x as usize;
            out[i] = resolve_texel(seeds[i], x, y, width, height, max_distance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: f32 = 1000.0;

    #[test]
    fn test_init_seeds_own_side() {
        let mask = [0, 1, 0, 0];
        let mut out = vec![SeedTexel::EMPTY; 4];
        init(&mask, 2, 2, &mut out);

        assert_eq!(out[1].inside, Some(Uv::from_texel(1, 0, 2, 2)));
        assert_eq!(out[1].outside, None);
        assert_eq!(out[2].inside, None);
        assert_eq!(out[2].outside, Some(Uv::from_texel(0, 1, 2, 2)));
    }

    #[test]
    fn test_flood_picks_up_neighbour_at_offset() {
        // 4x1 row, inside at x = 0. Offset 2 lets x = 2 see it.
        let mut seeds = vec![SeedTexel::EMPTY; 4];
        init(&[1, 0, 0, 0], 4, 1, &mut seeds);

        let found = flood_texel(&seeds, 4, 1, 2, 0, 2);
        assert_eq!(found.inside, Some(Uv::from_texel(0, 0, 4, 1)));
        // x = 1 only reaches x = 3 and x = -1 at offset 2.
        let missed = flood_texel(&seeds, 4, 1, 1, 0, 2);
        assert_eq!(missed.inside, None);
    }

    #[test]
    fn test_flood_keeps_own_seed() {
        let mut seeds = vec![SeedTexel::EMPTY; 9];
        init(&[0, 0, 0, 0, 1, 0, 0, 0, 0], 3, 3, &mut seeds);
        let center = flood_texel(&seeds, 3, 3, 1, 1, 1);
        assert_eq!(center.inside, Some(Uv::from_texel(1, 1, 3, 3)));
    }

    #[test]
    fn test_flood_ignores_out_of_bounds() {
        // Every neighbour of a 1x1 grid is out of bounds except itself.
        let seeds = vec![SeedTexel::outside(Uv::from_texel(0, 0, 1, 1))];
        let out = flood_texel(&seeds, 1, 1, 0, 0, 1);
        assert_eq!(out, seeds[0]);
    }

    #[test]
    fn test_resolve_signs() {
        let inside_texel = SeedTexel {
            inside: Some(Uv::from_texel(0, 0, 4, 4)),
            outside: Some(Uv::from_texel(2, 0, 4, 4)),
        };
        let d = resolve_texel(inside_texel, 0, 0, 4, 4, MAX);
        assert!((d + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_resolve_saturates_missing_seeds() {
        let only_outside = SeedTexel::outside(Uv::from_texel(1, 1, 4, 4));
        assert_eq!(resolve_texel(only_outside, 1, 1, 4, 4, MAX), MAX);

        let only_inside = SeedTexel::inside(Uv::from_texel(1, 1, 4, 4));
        assert_eq!(resolve_texel(only_inside, 1, 1, 4, 4, MAX), -MAX);

        assert_eq!(resolve_texel(SeedTexel::EMPTY, 0, 0, 4, 4, MAX), 0.0);
    }

    #[test]
    fn test_resolve_clamps_far_seeds() {
        let far = SeedTexel {
            inside: Some(Uv { u: 1.0, v: 1.0 }),
            outside: Some(Uv::from_texel(0, 0, 4096, 4096)),
        };
        let d = resolve_texel(far, 0, 0, 4096, 4096, 100.0);
        assert_eq!(d, 100.0);
    }
}
