//! AArch64 Advanced SIMD backend.

use std::arch::aarch64::*;

use super::backend::VectorBackend;
use super::{AffineTransform, Quantized8, BLOCK_SIZE};

pub struct Neon;

#[inline]
#[target_feature(enable = "neon")]
unsafe fn scale_round(
    src: *const f32,
    slope: float32x4_t,
    intercept: float32x4_t,
    lo: float32x4_t,
    hi: float32x4_t,
) -> int32x4_t {
    let s = vfmaq_f32(intercept, vld1q_f32(src), slope);
    // maxnm/minnm pick the number over a NaN; plain vmaxq would propagate it
    let s = vminnmq_f32(vmaxnmq_f32(s, lo), hi);
    vcvtnq_s32_f32(s)
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn block_to_i16(
    src: *const f32,
    slope: float32x4_t,
    intercept: float32x4_t,
    lo: float32x4_t,
    hi: float32x4_t,
) -> (int16x8_t, int16x8_t) {
    let s0 = scale_round(src, slope, intercept, lo, hi);
    let s1 = scale_round(src.add(4), slope, intercept, lo, hi);
    let i01 = vcombine_s16(vqmovn_s32(s0), vqmovn_s32(s1));
    let s2 = scale_round(src.add(8), slope, intercept, lo, hi);
    let s3 = scale_round(src.add(12), slope, intercept, lo, hi);
    let i23 = vcombine_s16(vqmovn_s32(s2), vqmovn_s32(s3));
    (i01, i23)
}

#[target_feature(enable = "neon")]
unsafe fn quantize_blocks_u8_neon(
    mut input: *const f32,
    mut output: *mut u8,
    blocks: usize,
    transform: AffineTransform,
) {
    let slope = vdupq_n_f32(transform.slope);
    let intercept = vdupq_n_f32(transform.intercept);
    let lo = vdupq_n_f32(<u8 as Quantized8>::MIN);
    let hi = vdupq_n_f32(<u8 as Quantized8>::MAX);
    for _ in 0..blocks {
        let (i01, i23) = block_to_i16(input, slope, intercept, lo, hi);
        vst1q_u8(output, vcombine_u8(vqmovun_s16(i01), vqmovun_s16(i23)));
        input = input.add(BLOCK_SIZE);
        output = output.add(BLOCK_SIZE);
    }
}

#[target_feature(enable = "neon")]
unsafe fn quantize_blocks_i8_neon(
    mut input: *const f32,
    mut output: *mut i8,
    blocks: usize,
    transform: AffineTransform,
) {
    let slope = vdupq_n_f32(transform.slope);
    let intercept = vdupq_n_f32(transform.intercept);
    let lo = vdupq_n_f32(<i8 as Quantized8>::MIN);
    let hi = vdupq_n_f32(<i8 as Quantized8>::MAX);
    for _ in 0..blocks {
        let (i01, i23) = block_to_i16(input, slope, intercept, lo, hi);
        vst1q_s8(output, vcombine_s8(vqmovn_s16(i01), vqmovn_s16(i23)));
        input = input.add(BLOCK_SIZE);
        output = output.add(BLOCK_SIZE);
    }
}

impl VectorBackend for Neon {
    const NAME: &'static str = "neon";

    fn available() -> bool {
        // Advanced SIMD is mandatory on AArch64
        true
    }

    #[inline]
    unsafe fn quantize_blocks_u8(
        input: *const f32,
        output: *mut u8,
        blocks: usize,
        transform: AffineTransform,
    ) {
        quantize_blocks_u8_neon(input, output, blocks, transform)
    }

    #[inline]
    unsafe fn quantize_blocks_i8(
        input: *const f32,
        output: *mut i8,
        blocks: usize,
        transform: AffineTransform,
    ) {
        quantize_blocks_i8_neon(input, output, blocks, transform)
    }
}
