//! Offsets for the flood passes.
//!
//! Plain jump flooding: the first pass looks `floor(max(w, h) / 2)` texels
//! away and every later pass halves the step until it drops below one. There
//! is no trailing pass at offset 1 or 2 (the "JFA+1" / "JFA+2" refinements),
//! so a few texels near diagonal seams may keep a seed that is slightly
//! farther than the true nearest one. That error is accepted.

/// Iterator over the flood offsets of a `width x height` grid, largest first.
#[derive(Clone, Debug)]
pub struct FloodOffsets {
    next: u32,
}

impl Iterator for FloodOffsets {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next < 1 {
            return None;
        }
        let offset = self.next;
        self.next /= 2;
        Some(offset)
    }
}

pub fn flood_offsets(width: u32, height: u32) -> FloodOffsets {
    FloodOffsets {
        next: width.max(height) / 2,
    }
}

/// Number of flood passes, `floor(log2(max(width, height)))`.
pub fn flood_pass_count(width: u32, height: u32) -> usize {
    flood_offsets(width, height).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two_schedule() {
        let offsets: Vec<u32> = flood_offsets(256, 64).collect();
        assert_eq!(offsets, vec![128, 64, 32, 16, 8, 4, 2, 1]);
        assert_eq!(flood_pass_count(256, 64), 8);
    }

    #[test]
    fn test_odd_schedule_floors() {
        let offsets: Vec<u32> = flood_offsets(5, 3).collect();
        assert_eq!(offsets, vec![2, 1]);
        let offsets: Vec<u32> = flood_offsets(7, 100).collect();
        assert_eq!(offsets, vec![50, 25, 12, 6, 3, 1]);
    }

    #[test]
    fn test_tiny_grids() {
        assert_eq!(flood_pass_count(1, 1), 0);
        assert_eq!(flood_offsets(2, 1).collect::<Vec<_>>(), vec![1]);
        assert_eq!(flood_pass_count(4, 4), 2);
    }
}
