use super::AffineTransform;

/// A block engine: converts `blocks * BLOCK_SIZE` samples per call, never a
/// partial block.
///
/// Every implementation must agree bit-for-bit with
/// [`quantize_scalar`](super::scalar::quantize_scalar): fused multiply-add,
/// clamp with NaN going to the low bound, round half to even, saturating
/// narrow.
pub trait VectorBackend {
    const NAME: &'static str;

    /// Whether the running CPU can execute this backend. Only used to pick
    /// which backends tests and diagnostics may drive; the kernel itself
    /// always runs [`Selected`].
    fn available() -> bool;

    /// # Safety
    /// `input` must be valid for `blocks * BLOCK_SIZE` reads and `output` for
    /// as many writes, and [`Self::available`] must hold.
    unsafe fn quantize_blocks_u8(
        input: *const f32,
        output: *mut u8,
        blocks: usize,
        transform: AffineTransform,
    );

    /// # Safety
    /// Same as [`Self::quantize_blocks_u8`].
    unsafe fn quantize_blocks_i8(
        input: *const f32,
        output: *mut i8,
        blocks: usize,
        transform: AffineTransform,
    );
}

#[cfg(feature = "compat-backend")]
pub type Selected = super::compat::Compat;

#[cfg(all(
    not(feature = "compat-backend"),
    target_arch = "x86_64",
    target_feature = "fma"
))]
pub type Selected = super::sse::Sse;

#[cfg(all(not(feature = "compat-backend"), target_arch = "aarch64"))]
pub type Selected = super::neon::Neon;

#[cfg(all(
    not(feature = "compat-backend"),
    not(all(target_arch = "x86_64", target_feature = "fma")),
    not(target_arch = "aarch64")
))]
pub type Selected = super::compat::Compat;

/// Name of the backend compiled into the kernel.
pub fn backend_name() -> &'static str {
    <Selected as VectorBackend>::NAME
}
