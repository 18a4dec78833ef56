//! x86_64 backend: SSE2 packs plus FMA3 for the multiply-add.
//!
//! `_mm_cvtps_epi32` rounds with the MXCSR mode, which is round-to-nearest-even
//! unless the caller changed it.

use std::arch::x86_64::*;

use super::backend::VectorBackend;
use super::{AffineTransform, Quantized8, BLOCK_SIZE};

pub struct Sse;

#[inline]
#[target_feature(enable = "sse2,fma")]
unsafe fn scale_round(src: *const f32, slope: __m128, intercept: __m128, lo: __m128, hi: __m128) -> __m128i {
    let s = _mm_fmadd_ps(_mm_loadu_ps(src), slope, intercept);
    // maxps/minps return the second operand when the first is NaN
    let s = _mm_min_ps(_mm_max_ps(s, lo), hi);
    _mm_cvtps_epi32(s)
}

/// One block of 16 samples narrowed to two 8-lane i16 vectors.
#[inline]
#[target_feature(enable = "sse2,fma")]
unsafe fn block_to_i16(
    src: *const f32,
    slope: __m128,
    intercept: __m128,
    lo: __m128,
    hi: __m128,
) -> (__m128i, __m128i) {
    let i0 = scale_round(src, slope, intercept, lo, hi);
    let i1 = scale_round(src.add(4), slope, intercept, lo, hi);
    let i01 = _mm_packs_epi32(i0, i1);
    let i2 = scale_round(src.add(8), slope, intercept, lo, hi);
    let i3 = scale_round(src.add(12), slope, intercept, lo, hi);
    let i23 = _mm_packs_epi32(i2, i3);
    (i01, i23)
}

#[target_feature(enable = "sse2,fma")]
unsafe fn quantize_blocks_u8_fma(
    mut input: *const f32,
    mut output: *mut u8,
    blocks: usize,
    transform: AffineTransform,
) {
    let slope = _mm_set1_ps(transform.slope);
    let intercept = _mm_set1_ps(transform.intercept);
    let lo = _mm_set1_ps(<u8 as Quantized8>::MIN);
    let hi = _mm_set1_ps(<u8 as Quantized8>::MAX);
    for _ in 0..blocks {
        let (i01, i23) = block_to_i16(input, slope, intercept, lo, hi);
        _mm_storeu_si128(output as *mut __m128i, _mm_packus_epi16(i01, i23));
        input = input.add(BLOCK_SIZE);
        output = output.add(BLOCK_SIZE);
    }
}

#[target_feature(enable = "sse2,fma")]
unsafe fn quantize_blocks_i8_fma(
    mut input: *const f32,
    mut output: *mut i8,
    blocks: usize,
    transform: AffineTransform,
) {
    let slope = _mm_set1_ps(transform.slope);
    let intercept = _mm_set1_ps(transform.intercept);
    let lo = _mm_set1_ps(<i8 as Quantized8>::MIN);
    let hi = _mm_set1_ps(<i8 as Quantized8>::MAX);
    for _ in 0..blocks {
        let (i01, i23) = block_to_i16(input, slope, intercept, lo, hi);
        _mm_storeu_si128(output as *mut __m128i, _mm_packs_epi16(i01, i23));
        input = input.add(BLOCK_SIZE);
        output = output.add(BLOCK_SIZE);
    }
}

impl VectorBackend for Sse {
    const NAME: &'static str = "sse2+fma";

    fn available() -> bool {
        is_x86_feature_detected!("sse2") && is_x86_feature_detected!("fma")
    }

    #[inline]
    unsafe fn quantize_blocks_u8(
        input: *const f32,
        output: *mut u8,
        blocks: usize,
        transform: AffineTransform,
    ) {
        quantize_blocks_u8_fma(input, output, blocks, transform)
    }

    #[inline]
    unsafe fn quantize_blocks_i8(
        input: *const f32,
        output: *mut i8,
        blocks: usize,
        transform: AffineTransform,
    ) {
        quantize_blocks_i8_fma(input, output, blocks, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::compat::Compat;
    use crate::quantization::quantize_with;

    fn run<B: VectorBackend, T: Quantized8>(input: &[f32], t: AffineTransform) -> Vec<T> {
        let mut out = vec![T::default(); input.len()];
        unsafe { quantize_with::<B, T>(input.as_ptr(), out.as_mut_ptr(), input.len(), t) };
        out
    }

    #[test]
    fn matches_compat_on_edge_values() {
        if !Sse::available() {
            return;
        }
        let input = [
            f32::NAN,
            f32::INFINITY,
            f32::NEG_INFINITY,
            3e9,
            -3e9,
            0.5,
            1.5,
            2.5,
            -0.5,
            -1.5,
            127.5,
            128.5,
            254.5,
            255.5,
            -128.5,
            -127.5,
        ];
        for t in [AffineTransform::IDENTITY, AffineTransform::new(0.5, -64.25)] {
            assert_eq!(run::<Sse, u8>(&input, t), run::<Compat, u8>(&input, t));
            assert_eq!(run::<Sse, i8>(&input, t), run::<Compat, i8>(&input, t));
        }
    }

    #[test]
    fn unaligned_buffers() {
        if !Sse::available() {
            return;
        }
        let backing: Vec<f32> = (0..33).map(|x| x as f32 * 9.5 - 40.0).collect();
        let input = &backing[1..];
        let mut out = vec![0u8; 33];
        let t = AffineTransform::new(1.0, 0.0);
        unsafe { quantize_with::<Sse, u8>(input.as_ptr(), out[1..].as_mut_ptr(), 32, t) };
        assert_eq!(&out[1..], &run::<Compat, u8>(input, t)[..]);
    }
}
