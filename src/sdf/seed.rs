/// Device encoding of "no seed found yet". UVs are always in `[0, 1]`, so
/// decoding treats any negative component as absent.
pub const NO_SEED: [f32; 2] = [-1.0, -1.0];

/// Normalized texel coordinate, `(x / width, y / height)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Uv {
    pub u: f32,
    pub v: f32,
}

impl Uv {
    pub fn from_texel(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            u: x as f32 / width as f32,
            v: y as f32 / height as f32,
        }
    }

    /// Position in pixel units of a `width x height` grid.
    pub fn to_pixel(self, width: u32, height: u32) -> [f32; 2] {
        [self.u * width as f32, self.v * height as f32]
    }

    fn decode(pair: [f32; 2]) -> Option<Self> {
        if pair[0] < 0.0 || pair[1] < 0.0 {
            None
        } else {
            Some(Self {
                u: pair[0],
                v: pair[1],
            })
        }
    }

    fn encode(seed: Option<Self>) -> [f32; 2] {
        seed.map_or(NO_SEED, |s| [s.u, s.v])
    }
}

/// Best known nearest seed for the inside set and for the outside set.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SeedTexel {
    pub inside: Option<Uv>,
    pub outside: Option<Uv>,
}

impl SeedTexel {
    pub const EMPTY: Self = Self {
        inside: None,
        outside: None,
    };

    pub fn inside(seed: Uv) -> Self {
        Self {
            inside: Some(seed),
            outside: None,
        }
    }

    pub fn outside(seed: Uv) -> Self {
        Self {
            inside: None,
            outside: Some(seed),
        }
    }

    /// Layout of one `R32G32B32A32_SFLOAT` seed texel: inside in `xy`,
    /// outside in `zw`.
    pub fn to_texel(self) -> [f32; 4] {
        let [ix, iy] = Uv::encode(self.inside);
        let [ox, oy] = Uv::encode(self.outside);
        [ix, iy, ox, oy]
    }

    pub fn from_texel(texel: [f32; 4]) -> Self {
        Self {
            inside: Uv::decode([texel[0], texel[1]]),
            outside: Uv::decode([texel[2], texel[3]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_texel_uses_sentinel() {
        assert_eq!(SeedTexel::EMPTY.to_texel(), [-1.0, -1.0, -1.0, -1.0]);
        assert_eq!(SeedTexel::from_texel([-1.0; 4]), SeedTexel::EMPTY);
    }

    #[test]
    fn test_any_negative_component_is_absent() {
        let texel = SeedTexel::from_texel([0.25, -0.5, -3.0, 0.75]);
        assert_eq!(texel.inside, None);
        assert_eq!(texel.outside, None);
    }

    #[test]
    fn test_texel_layout() {
        let seeds = SeedTexel {
            inside: Some(Uv { u: 0.25, v: 0.5 }),
            outside: None,
        };
        assert_eq!(seeds.to_texel(), [0.25, 0.5, -1.0, -1.0]);
        assert_eq!(SeedTexel::from_texel(seeds.to_texel()), seeds);
    }

    #[test]
    fn test_origin_is_a_valid_seed() {
        let uv = Uv::from_texel(0, 0, 8, 8);
        assert_eq!(SeedTexel::from_texel(SeedTexel::outside(uv).to_texel()).outside, Some(uv));
    }

    #[test]
    fn test_uv_to_pixel() {
        let uv = Uv::from_texel(3, 1, 4, 2);
        assert_eq!(uv.to_pixel(4, 2), [3.0, 1.0]);
    }
}
