//! Scalar path: the tail of every kernel call and the reference the vector
//! backends are checked against.

use super::{AffineTransform, Quantized8};

/// Clamps `v` to `[T::MIN, T::MAX]`. NaN clamps to `T::MIN`, matching the
/// vector min/max instructions, which return the bound when the lane is NaN.
#[inline(always)]
pub fn saturate<T: Quantized8>(v: f32) -> f32 {
    v.max(T::MIN).min(T::MAX)
}

/// Clamp first, then round half to even. The bounds are integers, so this
/// equals rounding first and saturating afterwards.
#[inline(always)]
pub fn quantize_one<T: Quantized8>(x: f32, transform: AffineTransform) -> T {
    T::from_rounded(saturate::<T>(transform.apply(x)).round_ties_even())
}

pub fn quantize_scalar<T: Quantized8>(input: &[f32], output: &mut [T], transform: AffineTransform) {
    assert_eq!(
        input.len(),
        output.len(),
        "input and output must have the same length"
    );
    for (o, &x) in output.iter_mut().zip(input) {
        *o = quantize_one(x, transform);
    }
}
