use anyhow::{Context, Result};
use std::path::PathBuf;

use jfa_sdf::{
    ComputeBackend, CpuBackend, DEFAULT_COVERAGE_THRESHOLD, DistanceField, Mask, Pipeline,
    SdfConfig, SdfError, VulkanBackend, VulkanContext,
};

/// Side of the built-in disc mask used when no `--mask` is given
const DEMO_SIZE: u32 = 256;

/// CLI arguments
struct CliArgs {
    /// PNG whose luma is thresholded into the mask
    mask: Option<PathBuf>,
    /// Where to write the grey visualisation
    out: PathBuf,
    threshold: u8,
    /// Distance in pixels at which the visualisation saturates
    spread: f32,
    config: Option<PathBuf>,
    /// Skip Vulkan and run on the host backend
    cpu: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            mask: None,
            out: PathBuf::from("sdf.png"),
            threshold: DEFAULT_COVERAGE_THRESHOLD,
            spread: 16.0,
            config: None,
            cpu: false,
        }
    }
}

fn parse_args(mut iter: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut args = CliArgs::default();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--mask" => {
                args.mask = Some(iter.next().context("--mask needs a value")?.into());
            }
            "--out" => {
                args.out = iter.next().context("--out needs a value")?.into();
            }
            "--threshold" => {
                let value = iter.next().context("--threshold needs a value")?;
                args.threshold = value.parse().context("--threshold must be 0-255")?;
            }
            "--spread" => {
                let value = iter.next().context("--spread needs a value")?;
                args.spread = value.parse().context("--spread must be a number")?;
            }
            "--config" => {
                args.config = Some(iter.next().context("--config needs a value")?.into());
            }
            "--cpu" => {
                args.cpu = true;
            }
            other if !other.starts_with('-') => {
                // Positional arg = mask path
                args.mask = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("Ignoring unknown argument {other}");
            }
        }
    }

    Ok(args)
}

fn load_mask(args: &CliArgs) -> Result<Mask> {
    let Some(path) = &args.mask else {
        let r = DEMO_SIZE as f32 / 4.0;
        let c = DEMO_SIZE as f32 / 2.0;
        return Ok(Mask::from_fn(DEMO_SIZE, DEMO_SIZE, |x, y| {
            let (dx, dy) = (x as f32 + 0.5 - c, y as f32 + 0.5 - c);
            dx * dx + dy * dy < r * r
        })?);
    };

    let luma = image::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .to_luma8();
    Ok(Mask::from_coverage(
        luma.width(),
        luma.height(),
        luma.as_raw(),
        args.threshold,
    )?)
}

fn generate<B: ComputeBackend>(backend: B, mask: &Mask, config: &SdfConfig) -> Result<DistanceField> {
    let mut pipeline = Pipeline::with_config(backend, mask.width(), mask.height(), config)?;
    pipeline.run_mask(mask)?;
    let field = pipeline.read_distance()?;
    pipeline.destroy()?;
    Ok(field)
}

fn run_vulkan(mask: &Mask, config: &SdfConfig) -> Result<Option<DistanceField>> {
    let ctx = match VulkanContext::headless(config.device) {
        Ok(ctx) => ctx,
        Err(SdfError::NoDevice(e)) => {
            eprintln!("No Vulkan device ({e:#}), falling back to CPU");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    println!("Device: {}", ctx.device_name());

    let backend = VulkanBackend::new(&ctx, config)?;
    generate(backend, mask, config).map(Some)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => SdfConfig::load_from(path)?,
        None => SdfConfig::load(),
    };

    let mask = load_mask(&args)?;
    println!(
        "Mask: {}x{}, {} texels inside",
        mask.width(),
        mask.height(),
        mask.inside_count()
    );

    let gpu_field = if args.cpu { None } else { run_vulkan(&mask, &config)? };
    let field = match gpu_field {
        Some(field) => field,
        None => generate(
            CpuBackend::new().with_distance_format(config.distance_format),
            &mask,
            &config,
        )?,
    };

    println!("Distance range: {:.3} .. {:.3}", field.min(), field.max());

    field
        .to_image(args.spread)
        .save(&args.out)
        .with_context(|| format!("Failed to save {}", args.out.display()))?;
    println!("Saved {}", args.out.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<CliArgs> {
        parse_args(argv.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_flags_and_positional_mask() {
        let args = parse(&["glyph.png", "--out", "glyph_sdf.png", "--threshold", "64", "--cpu"]).unwrap();
        assert_eq!(args.mask, Some(PathBuf::from("glyph.png")));
        assert_eq!(args.out, PathBuf::from("glyph_sdf.png"));
        assert_eq!(args.threshold, 64);
        assert!(args.cpu);
    }

    #[test]
    fn test_trailing_flags_need_values() {
        for flag in ["--mask", "--out", "--config", "--threshold", "--spread"] {
            let err = parse(&["--cpu", flag]).err().unwrap();
            assert!(err.to_string().contains(flag), "{flag}: {err}");
        }
    }
}
