//! Compute kernels, compiled at build time.
//!
//! Every kernel runs 8x8 workgroups over the full grid and returns early for
//! invocations outside the image.

pub const WORKGROUP_SIZE: u32 = 8;

pub mod init_cs {
    vulkano_shaders::shader! {
        ty: "compute",
        path: "src/gpu/shaders/init.comp",
    }
}

pub mod flood_cs {
    vulkano_shaders::shader! {
        ty: "compute",
        path: "src/gpu/shaders/flood.comp",
    }
}

pub mod resolve_r32f_cs {
    vulkano_shaders::shader! {
        ty: "compute",
        path: "src/gpu/shaders/resolve.comp",
        define: [("DISTANCE_FORMAT", "r32f")],
    }
}

pub mod resolve_r16f_cs {
    vulkano_shaders::shader! {
        ty: "compute",
        path: "src/gpu/shaders/resolve.comp",
        define: [("DISTANCE_FORMAT", "r16f")],
    }
}

/// Workgroup counts covering a `width x height` grid.
pub fn group_counts(extent: [u32; 2]) -> [u32; 3] {
    [
        extent[0].div_ceil(WORKGROUP_SIZE),
        extent[1].div_ceil(WORKGROUP_SIZE),
        1,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_counts_round_up() {
        assert_eq!(group_counts([8, 8]), [1, 1, 1]);
        assert_eq!(group_counts([9, 1]), [2, 1, 1]);
        assert_eq!(group_counts([640, 481]), [80, 61, 1]);
    }
}
