//! Affine quantization of `f32` samples to 8-bit integers.
//!
//! Every sample goes through `round_half_even(clamp(x * slope + intercept))`.
//! Whole blocks of [`BLOCK_SIZE`] samples run on a vector backend chosen at
//! compile time; the remainder runs on a scalar path with identical results.
//!
//! Backends: SSE2 + FMA on x86_64, Advanced SIMD on AArch64, portable lane
//! emulation elsewhere or with the `compat-backend` feature. The x86_64
//! backend needs the `fma` target feature, which `.cargo/config.toml` enables
//! for every x86_64 target. Builds that set `RUSTFLAGS` themselves must keep
//! `-C target-feature=+fma` (or `-C target-cpu=native` on an FMA machine),
//! otherwise the kernel silently uses the much slower portable lanes.

pub mod error;
pub mod quantization;
pub mod samples;

pub use error::QuantizeError;
pub use quantization::backend::{backend_name, VectorBackend};
pub use quantization::{
    dequantize_into, quantize, quantize_signed8, quantize_signed8_raw, quantize_unsigned8,
    quantize_unsigned8_raw, try_quantize, try_quantize_signed8, try_quantize_unsigned8,
    AffineTransform, Quantized8, BLOCK_SIZE,
};
