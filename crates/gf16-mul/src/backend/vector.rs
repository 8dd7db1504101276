//! Vector-width abstraction shared by the shuffle and affine kernels
//!
//! Each wrapper is one register of bytes. Methods are `#[inline(always)]` and
//! only sound when called from a function compiled with the matching
//! `#[target_feature]`, which is how every kernel entry point uses them.

pub(crate) trait Vector: Copy {
    /// Register width in bytes
    const BYTES: usize;

    /// Aligned load
    unsafe fn load(ptr: *const u8) -> Self;
    /// Aligned store
    unsafe fn store(self, ptr: *mut u8);
    unsafe fn xor(self, other: Self) -> Self;
}

pub(crate) trait ShuffleVector: Vector {
    /// Replicate a 16-byte table into every 128-bit lane
    unsafe fn table(bytes: &[u8; 16]) -> Self;
    /// Per-lane byte table lookup with `self` as the table
    unsafe fn lookup(self, idx: Self) -> Self;
    /// (low nibble, high nibble) of every byte
    unsafe fn nibbles(self) -> (Self, Self);
}

#[cfg(target_arch = "x86_64")]
pub(crate) trait AffineVector: Vector {
    /// Broadcast an 8x8 bit matrix to every qword
    unsafe fn matrix(m: u64) -> Self;
    /// `gf2p8affineqb` of every byte against `m`
    unsafe fn affine(self, m: Self) -> Self;
}

#[cfg(target_arch = "x86_64")]
pub(crate) mod x86 {
    use super::{AffineVector, ShuffleVector, Vector};
    use core::arch::x86_64::*;

    /// 128-bit register (SSSE3 / AVX encodings, GFNI)
    #[derive(Copy, Clone)]
    #[repr(transparent)]
    pub(crate) struct V128(__m128i);

    /// 256-bit register (AVX2)
    #[derive(Copy, Clone)]
    #[repr(transparent)]
    pub(crate) struct V256(__m256i);

    /// 512-bit register (AVX512BW, GFNI)
    #[derive(Copy, Clone)]
    #[repr(transparent)]
    pub(crate) struct V512(__m512i);

    impl Vector for V128 {
        const BYTES: usize = 16;

        #[inline(always)]
        unsafe fn load(ptr: *const u8) -> Self {
            V128(_mm_load_si128(ptr.cast()))
        }

        #[inline(always)]
        unsafe fn store(self, ptr: *mut u8) {
            _mm_store_si128(ptr.cast(), self.0)
        }

        #[inline(always)]
        unsafe fn xor(self, other: Self) -> Self {
            V128(_mm_xor_si128(self.0, other.0))
        }
    }

    impl ShuffleVector for V128 {
        #[inline(always)]
        unsafe fn table(bytes: &[u8; 16]) -> Self {
            V128(_mm_loadu_si128(bytes.as_ptr().cast()))
        }

        #[inline(always)]
        unsafe fn lookup(self, idx: Self) -> Self {
            V128(_mm_shuffle_epi8(self.0, idx.0))
        }

        #[inline(always)]
        unsafe fn nibbles(self) -> (Self, Self) {
            let mask = _mm_set1_epi8(0x0F);
            (
                V128(_mm_and_si128(self.0, mask)),
                V128(_mm_and_si128(_mm_srli_epi16(self.0, 4), mask)),
            )
        }
    }

    impl AffineVector for V128 {
        #[inline(always)]
        unsafe fn matrix(m: u64) -> Self {
            V128(_mm_set1_epi64x(m as i64))
        }

        #[inline(always)]
        unsafe fn affine(self, m: Self) -> Self {
            V128(_mm_gf2p8affine_epi64_epi8(self.0, m.0, 0))
        }
    }

    impl Vector for V256 {
        const BYTES: usize = 32;

        #[inline(always)]
        unsafe fn load(ptr: *const u8) -> Self {
            V256(_mm256_load_si256(ptr.cast()))
        }

        #[inline(always)]
        unsafe fn store(self, ptr: *mut u8) {
            _mm256_store_si256(ptr.cast(), self.0)
        }

        #[inline(always)]
        unsafe fn xor(self, other: Self) -> Self {
            V256(_mm256_xor_si256(self.0, other.0))
        }
    }

    impl ShuffleVector for V256 {
        #[inline(always)]
        unsafe fn table(bytes: &[u8; 16]) -> Self {
            V256(_mm256_broadcastsi128_si256(_mm_loadu_si128(bytes.as_ptr().cast())))
        }

        #[inline(always)]
        unsafe fn lookup(self, idx: Self) -> Self {
            V256(_mm256_shuffle_epi8(self.0, idx.0))
        }

        #[inline(always)]
        unsafe fn nibbles(self) -> (Self, Self) {
            let mask = _mm256_set1_epi8(0x0F);
            (
                V256(_mm256_and_si256(self.0, mask)),
                V256(_mm256_and_si256(_mm256_srli_epi16(self.0, 4), mask)),
            )
        }
    }

    impl Vector for V512 {
        const BYTES: usize = 64;

        #[inline(always)]
        unsafe fn load(ptr: *const u8) -> Self {
            V512(core::ptr::read(ptr.cast::<__m512i>()))
        }

        #[inline(always)]
        unsafe fn store(self, ptr: *mut u8) {
            core::ptr::write(ptr.cast::<__m512i>(), self.0)
        }

        #[inline(always)]
        unsafe fn xor(self, other: Self) -> Self {
            V512(_mm512_xor_si512(self.0, other.0))
        }
    }

    impl ShuffleVector for V512 {
        #[inline(always)]
        unsafe fn table(bytes: &[u8; 16]) -> Self {
            V512(_mm512_broadcast_i32x4(_mm_loadu_si128(bytes.as_ptr().cast())))
        }

        #[inline(always)]
        unsafe fn lookup(self, idx: Self) -> Self {
            V512(_mm512_shuffle_epi8(self.0, idx.0))
        }

        #[inline(always)]
        unsafe fn nibbles(self) -> (Self, Self) {
            let mask = _mm512_set1_epi8(0x0F);
            (
                V512(_mm512_and_si512(self.0, mask)),
                V512(_mm512_and_si512(_mm512_srli_epi16(self.0, 4), mask)),
            )
        }
    }

    impl AffineVector for V512 {
        #[inline(always)]
        unsafe fn matrix(m: u64) -> Self {
            V512(_mm512_set1_epi64(m as i64))
        }

        #[inline(always)]
        unsafe fn affine(self, m: Self) -> Self {
            V512(_mm512_gf2p8affine_epi64_epi8(self.0, m.0, 0))
        }
    }
}

#[cfg(target_arch = "aarch64")]
pub(crate) mod neon {
    use super::{ShuffleVector, Vector};
    use core::arch::aarch64::*;

    #[derive(Copy, Clone)]
    #[repr(transparent)]
    pub(crate) struct Neon(uint8x16_t);

    impl Vector for Neon {
        const BYTES: usize = 16;

        #[inline(always)]
        unsafe fn load(ptr: *const u8) -> Self {
            Neon(vld1q_u8(ptr))
        }

        #[inline(always)]
        unsafe fn store(self, ptr: *mut u8) {
            vst1q_u8(ptr, self.0)
        }

        #[inline(always)]
        unsafe fn xor(self, other: Self) -> Self {
            Neon(veorq_u8(self.0, other.0))
        }
    }

    impl ShuffleVector for Neon {
        #[inline(always)]
        unsafe fn table(bytes: &[u8; 16]) -> Self {
            Neon(vld1q_u8(bytes.as_ptr()))
        }

        #[inline(always)]
        unsafe fn lookup(self, idx: Self) -> Self {
            Neon(vqtbl1q_u8(self.0, idx.0))
        }

        #[inline(always)]
        unsafe fn nibbles(self) -> (Self, Self) {
            (Neon(vandq_u8(self.0, vdupq_n_u8(0x0F))), Neon(vshrq_n_u8::<4>(self.0)))
        }
    }
}
