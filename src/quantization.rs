pub mod backend;
pub mod compat;
#[cfg(target_arch = "aarch64")]
pub mod neon;
pub mod scalar;
#[cfg(target_arch = "x86_64")]
pub mod sse;

use std::slice;

use log::{debug, trace};

use crate::error::QuantizeError;
use backend::{Selected, VectorBackend};

/// Number of samples consumed per vectorized iteration: four 4-wide float
/// loads narrowed into one 16-wide byte store.
pub const BLOCK_SIZE: usize = 16;

mod sealed {
    pub trait Sealed {}

    impl Sealed for u8 {}
    impl Sealed for i8 {}
}

/// An 8-bit destination type. `MIN`/`MAX` are the saturation bounds shared by
/// the vector backends and the scalar tail.
///
/// Implemented for `u8` and `i8` only:
///
/// ```compile_fail
/// use affine_quantize_8bit::{AffineTransform, Quantized8, VectorBackend};
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// struct Wide(i16);
///
/// impl Quantized8 for Wide {
///     const MIN: f32 = -32768.0;
///     const MAX: f32 = 32767.0;
///     fn from_rounded(v: f32) -> Self { Wide(v as i16) }
///     fn to_f32(self) -> f32 { self.0 as f32 }
///     unsafe fn quantize_blocks<B: VectorBackend>(
///         _: *const f32,
///         _: *mut Self,
///         _: usize,
///         _: AffineTransform,
///     ) {}
/// }
/// ```
pub trait Quantized8: sealed::Sealed + Copy + Default + std::fmt::Debug + PartialEq {
    const MIN: f32;
    const MAX: f32;

    /// Converts a value that is already clamped to `[MIN, MAX]` and integral.
    fn from_rounded(v: f32) -> Self;

    fn to_f32(self) -> f32;

    /// Runs the variant of `B` that narrows to `Self`.
    ///
    /// # Safety
    /// Same contract as [`VectorBackend::quantize_blocks_u8`].
    unsafe fn quantize_blocks<B: VectorBackend>(
        input: *const f32,
        output: *mut Self,
        blocks: usize,
        transform: AffineTransform,
    );
}

impl Quantized8 for u8 {
    const MIN: f32 = u8::MIN as f32;
    const MAX: f32 = u8::MAX as f32;

    #[inline(always)]
    fn from_rounded(v: f32) -> Self {
        v as u8
    }

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    unsafe fn quantize_blocks<B: VectorBackend>(
        input: *const f32,
        output: *mut Self,
        blocks: usize,
        transform: AffineTransform,
    ) {
        B::quantize_blocks_u8(input, output, blocks, transform)
    }
}

impl Quantized8 for i8 {
    const MIN: f32 = i8::MIN as f32;
    const MAX: f32 = i8::MAX as f32;

    #[inline(always)]
    fn from_rounded(v: f32) -> Self {
        v as i8
    }

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    unsafe fn quantize_blocks<B: VectorBackend>(
        input: *const f32,
        output: *mut Self,
        blocks: usize,
        transform: AffineTransform,
    ) {
        B::quantize_blocks_i8(input, output, blocks, transform)
    }
}

/// `y = x * slope + intercept`, evaluated as a single fused multiply-add.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    pub slope: f32,
    pub intercept: f32,
}

impl AffineTransform {
    pub const IDENTITY: Self = AffineTransform {
        slope: 1.0,
        intercept: 0.0,
    };

    pub fn new(slope: f32, intercept: f32) -> Self {
        AffineTransform { slope, intercept }
    }

    pub fn try_new(slope: f32, intercept: f32) -> Result<Self, QuantizeError> {
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(QuantizeError::NonFinite { slope, intercept });
        }
        Ok(Self::new(slope, intercept))
    }

    /// Transform mapping `[min_val, max_val]` linearly onto `[T::MIN, T::MAX]`.
    pub fn from_range<T: Quantized8>(min_val: f32, max_val: f32) -> Result<Self, QuantizeError> {
        let invalid = QuantizeError::InvalidRange {
            min: min_val,
            max: max_val,
        };
        if !min_val.is_finite() || !max_val.is_finite() || min_val >= max_val {
            return Err(invalid);
        }

        let slope = (T::MAX - T::MIN) / (max_val - min_val);
        // max - min can overflow to infinity for extreme bounds
        if !slope.is_normal() {
            return Err(invalid);
        }
        let intercept = T::MIN - min_val * slope;

        debug!(
            "calibrated [{min_val}, {max_val}] -> [{}, {}]: slope {slope}, intercept {intercept}",
            T::MIN,
            T::MAX
        );
        Ok(AffineTransform { slope, intercept })
    }

    #[inline(always)]
    pub fn apply(&self, x: f32) -> f32 {
        x.mul_add(self.slope, self.intercept)
    }

    /// Inverse mapping of a quantized value back to the sample domain.
    pub fn dequantize<T: Quantized8>(&self, q: T) -> f32 {
        (q.to_f32() - self.intercept) / self.slope
    }
}

/// Splits `n` into the vectorized prefix and the scalar tail lengths.
#[inline]
pub fn split_len(n: usize) -> (usize, usize) {
    let tail = n % BLOCK_SIZE;
    (n - tail, tail)
}

/// Quantizes `input` into `output` with the compile-time selected backend.
///
/// Panics if the slices differ in length.
pub fn quantize<T: Quantized8>(input: &[f32], output: &mut [T], transform: AffineTransform) {
    assert_eq!(
        input.len(),
        output.len(),
        "input and output must have the same length"
    );
    // SAFETY: both slices are valid for `input.len()` elements and cannot alias.
    unsafe { quantize_raw(input.as_ptr(), output.as_mut_ptr(), input.len(), transform) }
}

pub fn try_quantize<T: Quantized8>(
    input: &[f32],
    output: &mut [T],
    transform: AffineTransform,
) -> Result<(), QuantizeError> {
    if input.len() != output.len() {
        return Err(QuantizeError::LengthMismatch {
            input: input.len(),
            output: output.len(),
        });
    }
    quantize(input, output, transform);
    Ok(())
}

/// # Safety
/// `input` must be valid for `n` reads, `output` for `n` writes, and the
/// output must not overlap input that is yet to be read.
#[inline]
pub unsafe fn quantize_raw<T: Quantized8>(
    input: *const f32,
    output: *mut T,
    n: usize,
    transform: AffineTransform,
) {
    quantize_with::<Selected, T>(input, output, n, transform)
}

/// Kernel body generic over the backend, so every backend compiled for this
/// target can be driven directly.
///
/// # Safety
/// Contract of [`quantize_raw`], plus the running CPU must support `B`
/// (see [`VectorBackend::available`]).
pub unsafe fn quantize_with<B: VectorBackend, T: Quantized8>(
    input: *const f32,
    output: *mut T,
    n: usize,
    transform: AffineTransform,
) {
    let (n_vec, n_tail) = split_len(n);
    trace!(
        "quantize {n} samples with {}: {n_vec} vectorized, {n_tail} scalar",
        B::NAME
    );

    if n_vec > 0 {
        T::quantize_blocks::<B>(input, output, n_vec / BLOCK_SIZE, transform);
    }
    if n_tail > 0 {
        let tail_in = slice::from_raw_parts(input.add(n_vec), n_tail);
        let tail_out = slice::from_raw_parts_mut(output.add(n_vec), n_tail);
        scalar::quantize_scalar(tail_in, tail_out, transform);
    }
}

pub fn quantize_unsigned8(input: &[f32], output: &mut [u8], slope: f32, intercept: f32) {
    quantize(input, output, AffineTransform::new(slope, intercept))
}

pub fn quantize_signed8(input: &[f32], output: &mut [i8], slope: f32, intercept: f32) {
    quantize(input, output, AffineTransform::new(slope, intercept))
}

pub fn try_quantize_unsigned8(
    input: &[f32],
    output: &mut [u8],
    slope: f32,
    intercept: f32,
) -> Result<(), QuantizeError> {
    try_quantize(input, output, AffineTransform::new(slope, intercept))
}

pub fn try_quantize_signed8(
    input: &[f32],
    output: &mut [i8],
    slope: f32,
    intercept: f32,
) -> Result<(), QuantizeError> {
    try_quantize(input, output, AffineTransform::new(slope, intercept))
}

/// # Safety
/// See [`quantize_raw`].
pub unsafe fn quantize_unsigned8_raw(
    input: *const f32,
    output: *mut u8,
    n: usize,
    slope: f32,
    intercept: f32,
) {
    quantize_raw(input, output, n, AffineTransform::new(slope, intercept))
}

/// # Safety
/// See [`quantize_raw`].
pub unsafe fn quantize_signed8_raw(
    input: *const f32,
    output: *mut i8,
    n: usize,
    slope: f32,
    intercept: f32,
) {
    quantize_raw(input, output, n, AffineTransform::new(slope, intercept))
}

/// Maps quantized values back through the inverse of `transform`.
pub fn dequantize_into<T: Quantized8>(q: &[T], output: &mut [f32], transform: AffineTransform) {
    assert_eq!(q.len(), output.len(), "input and output must have the same length");
    for (o, &v) in output.iter_mut().zip(q) {
        *o = transform.dequantize(v);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::quantization::compat::Compat;
    use crate::quantization::scalar::quantize_scalar;

    thread_local! {
        static BLOCKS_SEEN: Cell<usize> = const { Cell::new(0) };
    }

    /// Delegates to `Compat` and counts how many blocks went through the
    /// vector path.
    struct Counting;

    impl VectorBackend for Counting {
        const NAME: &'static str = "counting";

        fn available() -> bool {
            true
        }

        unsafe fn quantize_blocks_u8(
            input: *const f32,
            output: *mut u8,
            blocks: usize,
            transform: AffineTransform,
        ) {
            BLOCKS_SEEN.with(|c| c.set(c.get() + blocks));
            Compat::quantize_blocks_u8(input, output, blocks, transform)
        }

        unsafe fn quantize_blocks_i8(
            input: *const f32,
            output: *mut i8,
            blocks: usize,
            transform: AffineTransform,
        ) {
            BLOCKS_SEEN.with(|c| c.set(c.get() + blocks));
            Compat::quantize_blocks_i8(input, output, blocks, transform)
        }
    }

    fn counted<T: Quantized8>(input: &[f32], transform: AffineTransform) -> (Vec<T>, usize) {
        BLOCKS_SEEN.with(|c| c.set(0));
        let mut out = vec![T::default(); input.len()];
        unsafe { quantize_with::<Counting, T>(input.as_ptr(), out.as_mut_ptr(), input.len(), transform) };
        (out, BLOCKS_SEEN.with(|c| c.get()))
    }

    #[test]
    fn split_exact_multiple_has_no_tail() {
        assert_eq!(split_len(0), (0, 0));
        assert_eq!(split_len(16), (16, 0));
        assert_eq!(split_len(48), (48, 0));
        assert_eq!(split_len(5), (0, 5));
        assert_eq!(split_len(55), (48, 7));
    }

    #[test]
    fn exact_multiple_goes_entirely_through_vector_path() {
        let input: Vec<f32> = (0..32).map(|x| x as f32 * 3.7 - 20.0).collect();
        let t = AffineTransform::new(1.5, 0.5);
        let (out, blocks) = counted::<u8>(&input, t);
        assert_eq!(blocks, 2);

        let mut expected = vec![0u8; input.len()];
        quantize_scalar(&input, &mut expected, t);
        assert_eq!(out, expected);
    }

    #[test]
    fn tail_only_never_touches_vector_path() {
        let input = [1.0, 2.0, -3.0, 250.4, 0.5];
        let (out, blocks) = counted::<i8>(&input, AffineTransform::IDENTITY);
        assert_eq!(blocks, 0);
        assert_eq!(out, vec![1, 2, -3, 127, 0]);
    }

    #[test]
    fn mixed_length_splits_blocks_and_tail() {
        let input: Vec<f32> = (0..39).map(|x| x as f32).collect();
        let (out, blocks) = counted::<u8>(&input, AffineTransform::new(10.0, -5.0));
        assert_eq!(blocks, 2);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 5);
        assert_eq!(out[38], 255);
    }

    #[test]
    fn rounds_half_to_even() {
        let input = [1.0f32, 2.0, 3.0, 4.0, -2.0, -3.0];
        let mut out = [0i8; 6];
        quantize_signed8(&input, &mut out, 1.0, 0.5);
        assert_eq!(out, [2, 2, 4, 4, -2, -2]);
    }

    #[test]
    fn identity_keeps_in_range_integers() {
        let input = [0.0f32, 127.0, 255.0];
        let mut out = [1u8; 3];
        quantize_unsigned8(&input, &mut out, 1.0, 0.0);
        assert_eq!(out, [0, 127, 255]);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn mismatched_lengths_panic() {
        let mut out = [0u8; 3];
        quantize_unsigned8(&[1.0, 2.0], &mut out, 1.0, 0.0);
    }

    #[test]
    fn try_quantize_reports_mismatch() {
        let mut out = [0i8; 1];
        assert_eq!(
            try_quantize_signed8(&[1.0, 2.0], &mut out, 1.0, 0.0),
            Err(QuantizeError::LengthMismatch {
                input: 2,
                output: 1
            })
        );
    }

    #[test]
    fn from_range_maps_extremes_to_bounds() {
        let t = AffineTransform::from_range::<u8>(-1.0, 1.0).unwrap();
        let mut out = [0u8; 3];
        quantize(&[-1.0, 0.0, 1.0], &mut out, t);
        assert_eq!(out, [0, 128, 255]);

        let t = AffineTransform::from_range::<i8>(0.0, 255.0).unwrap();
        let mut out = [0i8; 2];
        quantize(&[0.0, 255.0], &mut out, t);
        assert_eq!(out, [-128, 127]);
    }

    #[test]
    fn from_range_rejects_degenerate_ranges() {
        assert!(AffineTransform::from_range::<u8>(1.0, 1.0).is_err());
        assert!(AffineTransform::from_range::<u8>(2.0, 1.0).is_err());
        assert!(AffineTransform::from_range::<i8>(f32::NAN, 1.0).is_err());
        assert!(AffineTransform::from_range::<i8>(-f32::MAX, f32::MAX).is_err());
    }

    #[test]
    fn try_new_rejects_non_finite() {
        assert!(AffineTransform::try_new(1.0, 0.0).is_ok());
        assert!(matches!(
            AffineTransform::try_new(f32::INFINITY, 0.0),
            Err(QuantizeError::NonFinite { .. })
        ));
    }

    #[test]
    fn dequantize_inverts_calibrated_transform() {
        let t = AffineTransform::from_range::<u8>(0.0, 25.5).unwrap();
        let mut q = [0u8; 3];
        quantize(&[0.0, 10.0, 25.5], &mut q, t);
        let mut back = [0f32; 3];
        dequantize_into(&q, &mut back, t);
        for (b, x) in back.iter().zip([0.0f32, 10.0, 25.5]) {
            assert!((b - x).abs() <= 0.05, "{b} vs {x}");
        }
    }
}
