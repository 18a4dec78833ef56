// Check the compiled backend against the scalar path, then plot the
// reconstruction error of range-calibrated quantization
use std::path::{Path, PathBuf};
use std::time::Instant;

use affine_quantize_8bit::quantization::compat::Compat;
use affine_quantize_8bit::quantization::scalar::quantize_scalar;
use affine_quantize_8bit::samples::{mean_squared_error, min_and_max, random_samples};
use affine_quantize_8bit::{
    backend_name, dequantize_into, quantize, AffineTransform, Quantized8, VectorBackend,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use plotters::prelude::*;

#[derive(Parser, Debug)]
#[command(about = "SIMD affine quantization of f32 samples to 8-bit integers")]
struct Args {
    /// Samples used for the backend check
    #[arg(long, default_value_t = 1 << 20)]
    len: usize,

    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    slope: f32,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    intercept: f32,

    /// Check the signed variant instead of the unsigned one
    #[arg(long)]
    signed: bool,

    /// Largest sample magnitude in the error sweep
    #[arg(long, default_value_t = 10)]
    max_range: u32,

    /// Random buffers per point of the error sweep
    #[arg(long, default_value_t = 20)]
    iterations: usize,

    /// Samples per buffer in the error sweep
    #[arg(long, default_value_t = 4096)]
    sweep_len: usize,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let transform = AffineTransform::try_new(args.slope, args.intercept)?;
    info!("backend: {}", backend_name());
    if cfg!(all(target_arch = "x86_64", not(feature = "compat-backend")))
        && backend_name() == Compat::NAME
    {
        warn!("built without the fma target feature; running the portable lanes");
    }

    let mismatches = if args.signed {
        check_backend::<i8>(args.len, transform)
    } else {
        check_backend::<u8>(args.len, transform)
    };
    if mismatches > 0 {
        bail!("{mismatches} samples differ from the scalar path");
    }

    if args.max_range == 0 || args.sweep_len == 0 || args.iterations == 0 {
        bail!("--max-range, --sweep-len and --iterations must be positive");
    }
    let unsigned = mse_as_range_increases::<u8>(args.max_range, args.sweep_len, args.iterations)?;
    let signed = mse_as_range_increases::<i8>(args.max_range, args.sweep_len, args.iterations)?;

    let path = args.out_dir.join("mse-range.svg");
    plot_mse(&path, &unsigned, &signed).with_context(|| format!("plot {}", path.display()))?;
    info!("wrote {}", path.display());

    Ok(())
}

/// Runs kernel and scalar path on the same random buffer and returns the
/// number of differing samples.
fn check_backend<T: Quantized8>(len: usize, transform: AffineTransform) -> usize {
    let input = random_samples(len, -512.0..512.0);
    let mut fast = vec![T::default(); len];
    let mut slow = vec![T::default(); len];

    let start = Instant::now();
    quantize(&input, &mut fast, transform);
    let kernel = start.elapsed();

    let start = Instant::now();
    quantize_scalar(&input, &mut slow, transform);
    let scalar = start.elapsed();

    let mismatches = fast.iter().zip(&slow).filter(|(a, b)| a != b).count();
    if mismatches > 0 {
        warn!("{mismatches} of {len} samples differ from the scalar path");
    }

    let per_sec = |secs: f64| len as f64 / secs.max(f64::MIN_POSITIVE) / 1e6;
    info!(
        "{len} samples: kernel {:?} ({:.1} M/s), scalar {:?} ({:.1} M/s)",
        kernel,
        per_sec(kernel.as_secs_f64()),
        scalar,
        per_sec(scalar.as_secs_f64())
    );
    mismatches
}

fn mse_as_range_increases<T: Quantized8>(
    max_real_value: u32,
    len: usize,
    iterations: usize,
) -> Result<Vec<(f32, f32)>> {
    let mut mses = Vec::new();
    let mut q = vec![T::default(); len];
    let mut back = vec![0f32; len];

    for range_magnitude in 1..=max_real_value {
        let range_magnitude = range_magnitude as f32;
        let mut sum = 0.0;

        for _ in 0..iterations {
            let samples = random_samples(len, -range_magnitude..range_magnitude);
            let (min_val, max_val) = min_and_max(&samples).context("empty sample buffer")?;
            let transform = AffineTransform::from_range::<T>(min_val, max_val)?;

            quantize(&samples, &mut q, transform);
            dequantize_into(&q, &mut back, transform);
            sum += mean_squared_error(&samples, &back);
        }

        mses.push((range_magnitude, sum / iterations as f32));
    }

    Ok(mses)
}

fn plot_mse(path: &Path, unsigned: &[(f32, f32)], signed: &[(f32, f32)]) -> Result<()> {
    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_min = unsigned.first().map(|(x, _)| *x).unwrap_or(1.0);
    let x_max = unsigned.last().map(|(x, _)| *x).unwrap_or(10.0).max(x_min + 1.0);
    let y_max = unsigned
        .iter()
        .chain(signed)
        .map(|(_, y)| *y)
        .fold(0.0, f32::max)
        * 1.1; // Add 10% padding
    let y_max = if y_max > 0.0 { y_max } else { 1.0 };

    let mut chart = ChartBuilder::on(&root)
        .caption("MSE vs. Sample Value Range", ("sans-serif", 40).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(75)
        .build_cartesian_2d(x_min..x_max, 0f32..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Sample Value Range")
        .y_desc("Mean Squared Error (MSE)")
        .light_line_style(&WHITE.mix(0.8))
        .draw()?;

    for (series, color, label) in [(unsigned, RED, "u8"), (signed, BLUE, "i8")] {
        chart
            .draw_series(LineSeries::new(series.iter().cloned(), &color))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x - 5, y), (x + 5, y)], &color));
        chart.draw_series(
            series
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 3, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
