//! Portable emulation of the 128-bit lanes used by the native backends.
//!
//! Each helper mirrors one vector instruction (fused multiply-add, min/max,
//! convert with round-to-nearest-even, saturating pack), so a block goes
//! through exactly the same sequence of steps as on SSE or NEON.

use std::ptr;

use super::backend::VectorBackend;
use super::{AffineTransform, Quantized8, BLOCK_SIZE};

type F32x4 = [f32; 4];
type I32x4 = [i32; 4];
type I16x8 = [i16; 8];

pub struct Compat;

#[inline(always)]
unsafe fn load(src: *const f32) -> F32x4 {
    ptr::read_unaligned(src as *const F32x4)
}

#[inline(always)]
fn fmadd(v: F32x4, slope: f32, intercept: f32) -> F32x4 {
    v.map(|x| x.mul_add(slope, intercept))
}

/// `max` then `min`, each returning the bound for a NaN lane.
#[inline(always)]
fn clamp(v: F32x4, lo: f32, hi: f32) -> F32x4 {
    v.map(|x| x.max(lo).min(hi))
}

/// Inputs are pre-clamped to the 8-bit bounds, so the conversion never
/// leaves `i32`.
#[inline(always)]
fn cvt_nearest(v: F32x4) -> I32x4 {
    v.map(|x| x.round_ties_even() as i32)
}

#[inline(always)]
fn packs_i32(a: I32x4, b: I32x4) -> I16x8 {
    let mut out = [0i16; 8];
    for (o, x) in out.iter_mut().zip(a.into_iter().chain(b)) {
        *o = x.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
    out
}

#[inline(always)]
fn packus_i16(a: I16x8, b: I16x8) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (o, x) in out.iter_mut().zip(a.into_iter().chain(b)) {
        *o = x.clamp(u8::MIN as i16, u8::MAX as i16) as u8;
    }
    out
}

#[inline(always)]
fn packs_i16(a: I16x8, b: I16x8) -> [i8; 16] {
    let mut out = [0i8; 16];
    for (o, x) in out.iter_mut().zip(a.into_iter().chain(b)) {
        *o = x.clamp(i8::MIN as i16, i8::MAX as i16) as i8;
    }
    out
}

/// Scales, rounds and narrows one block to two 8-lane i16 vectors.
#[inline(always)]
unsafe fn block_to_i16<T: Quantized8>(src: *const f32, transform: AffineTransform) -> (I16x8, I16x8) {
    let AffineTransform { slope, intercept } = transform;
    let scale = |offset: usize| {
        cvt_nearest(clamp(
            fmadd(load(src.add(offset)), slope, intercept),
            T::MIN,
            T::MAX,
        ))
    };
    let i01 = packs_i32(scale(0), scale(4));
    let i23 = packs_i32(scale(8), scale(12));
    (i01, i23)
}

impl VectorBackend for Compat {
    const NAME: &'static str = "compat";

    fn available() -> bool {
        true
    }

    unsafe fn quantize_blocks_u8(
        mut input: *const f32,
        mut output: *mut u8,
        blocks: usize,
        transform: AffineTransform,
    ) {
        for _ in 0..blocks {
            let (i01, i23) = block_to_i16::<u8>(input, transform);
            ptr::write_unaligned(output as *mut [u8; 16], packus_i16(i01, i23));
            input = input.add(BLOCK_SIZE);
            output = output.add(BLOCK_SIZE);
        }
    }

    unsafe fn quantize_blocks_i8(
        mut input: *const f32,
        mut output: *mut i8,
        blocks: usize,
        transform: AffineTransform,
    ) {
        for _ in 0..blocks {
            let (i01, i23) = block_to_i16::<i8>(input, transform);
            ptr::write_unaligned(output as *mut [i8; 16], packs_i16(i01, i23));
            input = input.add(BLOCK_SIZE);
            output = output.add(BLOCK_SIZE);
        }
    }
}
