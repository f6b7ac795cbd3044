//! Device tests. Each returns early when no Vulkan compute device is present.

use approx::assert_abs_diff_eq;
use jfa_sdf::{
    CpuBackend, DEFAULT_MAX_DISTANCE, DevicePreference, DistanceField, DistanceFormat, Mask,
    Pipeline, SdfConfig, SdfError, VulkanBackend, VulkanContext,
};
use std::sync::Arc;

fn vulkan(config: &SdfConfig) -> Option<VulkanBackend> {
    let ctx = match VulkanContext::headless(DevicePreference::Auto) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("skipping: {e}");
            return None;
        }
    };
    match VulkanBackend::new(&ctx, config) {
        Ok(backend) => Some(backend),
        Err(SdfError::UnsupportedFormat(format)) => {
            eprintln!("skipping: {format} unsupported on {}", ctx.device_name());
            None
        }
        Err(e) => panic!("backend creation failed: {e:?}"),
    }
}

fn on_cpu(mask: &Mask) -> DistanceField {
    let mut pipeline = Pipeline::new(CpuBackend::new(), mask.width(), mask.height()).unwrap();
    pipeline.run_mask(mask).unwrap();
    pipeline.read_distance().unwrap()
}

fn single_seed(width: u32, height: u32, sx: u32, sy: u32) -> Mask {
    Mask::from_fn(width, height, |x, y| x == sx && y == sy).unwrap()
}

#[test]
fn test_vulkan_matches_host_kernels() {
    let Some(backend) = vulkan(&SdfConfig::default()) else {
        return;
    };
    let mask = single_seed(64, 64, 20, 41);
    let mut pipeline = Pipeline::new(backend, 64, 64).unwrap();
    pipeline.run_mask(&mask).unwrap();
    let gpu = pipeline.read_distance().unwrap();
    let cpu = on_cpu(&mask);

    for (g, c) in gpu.values().iter().zip(cpu.values()) {
        assert_abs_diff_eq!(*g, *c, epsilon = 1e-3);
    }
    pipeline.destroy().unwrap();
}

#[test]
fn test_vulkan_single_texel_distance_on_4x4() {
    let Some(backend) = vulkan(&SdfConfig::default()) else {
        return;
    };
    let mut pipeline = Pipeline::new(backend, 4, 4).unwrap();
    pipeline.run_mask(&single_seed(4, 4, 1, 1)).unwrap();
    let field = pipeline.read_distance().unwrap();

    assert!((field.get(3, 3) - 8.0_f32.sqrt()).abs() <= 0.5);
}

#[test]
fn test_vulkan_sign_invariant_and_degenerate_masks() {
    let Some(backend) = vulkan(&SdfConfig::default()) else {
        return;
    };
    let mask = Mask::from_fn(53, 29, |x, y| (x / 5 + y / 3) % 4 == 0).unwrap();
    let mut pipeline = Pipeline::new(backend, 53, 29).unwrap();

    pipeline.run_mask(&mask).unwrap();
    let field = pipeline.read_distance().unwrap();
    assert!(field.is_finite());
    for y in 0..29 {
        for x in 0..53 {
            assert_eq!(field.get(x, y) < 0.0, mask.is_inside(x, y), "texel ({x}, {y})");
        }
    }

    pipeline.run(&vec![0; 53 * 29]).unwrap();
    let empty = pipeline.read_distance().unwrap();
    assert!(empty.values().iter().all(|&d| d == DEFAULT_MAX_DISTANCE));

    pipeline.run(&vec![1; 53 * 29]).unwrap();
    let full = pipeline.read_distance().unwrap();
    assert!(full.values().iter().all(|&d| d == -DEFAULT_MAX_DISTANCE));
}

#[test]
fn test_vulkan_half_float_output() {
    let config = SdfConfig {
        distance_format: DistanceFormat::R16f,
        ..SdfConfig::default()
    };
    let Some(backend) = vulkan(&config) else {
        return;
    };
    let mask = single_seed(32, 32, 7, 9);
    let mut pipeline = Pipeline::with_config(backend, 32, 32, &config).unwrap();
    pipeline.run_mask(&mask).unwrap();
    let gpu = pipeline.read_distance().unwrap();
    let cpu = on_cpu(&mask);

    for (g, c) in gpu.values().iter().zip(cpu.values()) {
        assert_abs_diff_eq!(*g, *c, epsilon = 0.05);
    }
}

#[test]
fn test_vulkan_destroy_frees_images() {
    let Some(backend) = vulkan(&SdfConfig::default()) else {
        return;
    };
    let mut pipeline = Pipeline::new(backend, 16, 16).unwrap();
    pipeline.run_mask(&single_seed(16, 16, 3, 3)).unwrap();

    let distance = Arc::downgrade(pipeline.distance().unwrap().image());
    assert!(distance.upgrade().is_some());

    pipeline.destroy().unwrap();
    assert!(distance.upgrade().is_none());
}

#[test]
fn test_vulkan_sampled_write_uses_distance_view() {
    let Some(backend) = vulkan(&SdfConfig::default()) else {
        return;
    };
    let pipeline = Pipeline::new(backend, 8, 8).unwrap();
    let distance = pipeline.distance().unwrap();
    assert_eq!(distance.extent(), [8, 8]);

    let write = pipeline.backend().sampled_write(0, distance);
    assert_eq!(write.binding(), 0);
}
