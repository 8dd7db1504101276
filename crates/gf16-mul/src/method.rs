//! Method catalogue and descriptors

use crate::caps::Caps;
use crate::layout::Layout;
use crate::Gf16Error;
use std::fmt;
use std::str::FromStr;

/// Environment variable read by [`MethodHint::from_env`]
pub const METHOD_ENV: &str = "GF16_METHOD";

/// One concrete region-multiplication algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodId {
    Lookup,
    Lookup3,
    LookupSse2,
    ShuffleNeon,
    ShuffleSsse3,
    ShuffleAvx,
    ShuffleAvx2,
    ShuffleAvx512,
    Shuffle2xAvx2,
    XorSse2,
    XorJitSse2,
    XorJitAvx2,
    XorJitAvx512,
    AffineGfni,
    AffineAvx512,
}

impl MethodId {
    pub const ALL: [MethodId; 15] = [
        MethodId::Lookup,
        MethodId::Lookup3,
        MethodId::LookupSse2,
        MethodId::ShuffleNeon,
        MethodId::ShuffleSsse3,
        MethodId::ShuffleAvx,
        MethodId::ShuffleAvx2,
        MethodId::ShuffleAvx512,
        MethodId::Shuffle2xAvx2,
        MethodId::XorSse2,
        MethodId::XorJitSse2,
        MethodId::XorJitAvx2,
        MethodId::XorJitAvx512,
        MethodId::AffineGfni,
        MethodId::AffineAvx512,
    ];

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            MethodId::Lookup => "LH Lookup",
            MethodId::Lookup3 => "3-part Lookup",
            MethodId::LookupSse2 => "LH Lookup (SSE2)",
            MethodId::ShuffleNeon => "Shuffle (NEON)",
            MethodId::ShuffleSsse3 => "Shuffle (SSSE3)",
            MethodId::ShuffleAvx => "Shuffle (AVX)",
            MethodId::ShuffleAvx2 => "Shuffle (AVX2)",
            MethodId::ShuffleAvx512 => "Shuffle (AVX512)",
            MethodId::Shuffle2xAvx2 => "Shuffle2x (AVX2)",
            MethodId::XorSse2 => "Xor (SSE2)",
            MethodId::XorJitSse2 => "Xor-Jit (SSE2)",
            MethodId::XorJitAvx2 => "Xor-Jit (AVX2)",
            MethodId::XorJitAvx512 => "Xor-Jit (AVX512)",
            MethodId::AffineGfni => "Affine (GFNI)",
            MethodId::AffineAvx512 => "Affine (GFNI+AVX512)",
        }
    }

    /// Stable identifier accepted by `FromStr` and `GF16_METHOD`
    pub const fn slug(self) -> &'static str {
        match self {
            MethodId::Lookup => "lookup",
            MethodId::Lookup3 => "lookup3",
            MethodId::LookupSse2 => "lookup-sse2",
            MethodId::ShuffleNeon => "shuffle-neon",
            MethodId::ShuffleSsse3 => "shuffle-ssse3",
            MethodId::ShuffleAvx => "shuffle-avx",
            MethodId::ShuffleAvx2 => "shuffle-avx2",
            MethodId::ShuffleAvx512 => "shuffle-avx512",
            MethodId::Shuffle2xAvx2 => "shuffle2x-avx2",
            MethodId::XorSse2 => "xor-sse2",
            MethodId::XorJitSse2 => "xor-jit-sse2",
            MethodId::XorJitAvx2 => "xor-jit-avx2",
            MethodId::XorJitAvx512 => "xor-jit-avx512",
            MethodId::AffineGfni => "affine-gfni",
            MethodId::AffineAvx512 => "affine-avx512",
        }
    }

    /// Working data layout; `stride` is one layout block for the transformed ones
    pub(crate) const fn layout(self) -> Layout {
        match self {
            MethodId::Lookup | MethodId::Lookup3 | MethodId::LookupSse2 => Layout::Native,
            MethodId::ShuffleNeon
            | MethodId::ShuffleSsse3
            | MethodId::ShuffleAvx
            | MethodId::Shuffle2xAvx2
            | MethodId::AffineGfni => Layout::Split { width: 16 },
            MethodId::ShuffleAvx2 => Layout::Split { width: 32 },
            MethodId::ShuffleAvx512 | MethodId::AffineAvx512 => Layout::Split { width: 64 },
            MethodId::XorSse2 | MethodId::XorJitSse2 => Layout::BitPlanes { width: 16 },
            MethodId::XorJitAvx2 => Layout::BitPlanes { width: 32 },
            MethodId::XorJitAvx512 => Layout::BitPlanes { width: 64 },
        }
    }

    /// Required start address granularity in bytes
    pub const fn alignment(self) -> usize {
        match self {
            MethodId::Lookup => 2,
            MethodId::Lookup3 => 8,
            MethodId::LookupSse2
            | MethodId::ShuffleNeon
            | MethodId::ShuffleSsse3
            | MethodId::ShuffleAvx
            | MethodId::XorSse2
            | MethodId::XorJitSse2
            | MethodId::AffineGfni => 16,
            MethodId::ShuffleAvx2 | MethodId::Shuffle2xAvx2 | MethodId::XorJitAvx2 => 32,
            MethodId::ShuffleAvx512 | MethodId::XorJitAvx512 | MethodId::AffineAvx512 => 64,
        }
    }

    /// Required length granularity in bytes
    pub const fn stride(self) -> usize {
        match self.layout() {
            Layout::Native => self.alignment(),
            layout => layout.block_len(),
        }
    }

    /// Preferred processing unit for callers partitioning large regions
    pub const fn ideal_chunk_size(self) -> usize {
        match self {
            MethodId::XorJitSse2 | MethodId::XorJitAvx2 | MethodId::XorJitAvx512 => 128 * 1024,
            MethodId::Lookup | MethodId::Lookup3 | MethodId::LookupSse2 | MethodId::XorSse2 => {
                96 * 1024
            }
            _ => 48 * 1024,
        }
    }

    pub const fn is_jit(self) -> bool {
        matches!(
            self,
            MethodId::XorJitSse2 | MethodId::XorJitAvx2 | MethodId::XorJitAvx512
        )
    }

    /// Kernel exists in this build
    pub const fn is_compiled(self) -> bool {
        match self {
            MethodId::Lookup | MethodId::Lookup3 => true,
            MethodId::ShuffleNeon => cfg!(target_arch = "aarch64"),
            MethodId::XorJitSse2 | MethodId::XorJitAvx2 | MethodId::XorJitAvx512 => {
                cfg!(all(feature = "jit", target_arch = "x86_64", unix))
            }
            _ => cfg!(target_arch = "x86_64"),
        }
    }

    /// Kernel exists and the capability record satisfies its prerequisites
    pub fn is_supported(self, caps: &Caps) -> bool {
        if !self.is_compiled() {
            return false;
        }
        match self {
            MethodId::Lookup | MethodId::Lookup3 => true,
            MethodId::LookupSse2 | MethodId::XorSse2 => caps.sse2,
            MethodId::ShuffleNeon => caps.neon,
            MethodId::ShuffleSsse3 => caps.ssse3,
            MethodId::ShuffleAvx => caps.avx,
            MethodId::ShuffleAvx2 | MethodId::Shuffle2xAvx2 => caps.avx2,
            MethodId::ShuffleAvx512 => caps.avx512bw,
            MethodId::XorJitSse2 => caps.sse2 && caps.can_mem_wx,
            MethodId::XorJitAvx2 => caps.avx2 && caps.can_mem_wx,
            MethodId::XorJitAvx512 => caps.avx512bw && caps.can_mem_wx,
            MethodId::AffineGfni => caps.gfni && caps.ssse3,
            MethodId::AffineAvx512 => caps.gfni && caps.avx512bw,
        }
    }
}

impl MethodId {
    /// The running processor can execute this method's kernels.
    ///
    /// Independent of any [`Caps`] record: a synthetic record decides what is
    /// selected, this decides what may be bound.
    pub fn host_can_run(self) -> bool {
        if !self.is_compiled() {
            return false;
        }
        #[cfg(target_arch = "x86_64")]
        {
            let avx512 = || is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("avx512bw");
            match self {
                MethodId::Lookup | MethodId::Lookup3 => true,
                MethodId::LookupSse2 | MethodId::XorSse2 | MethodId::XorJitSse2 => {
                    is_x86_feature_detected!("sse2")
                }
                MethodId::ShuffleSsse3 => is_x86_feature_detected!("ssse3"),
                MethodId::ShuffleAvx => is_x86_feature_detected!("avx"),
                MethodId::ShuffleAvx2 | MethodId::Shuffle2xAvx2 | MethodId::XorJitAvx2 => {
                    is_x86_feature_detected!("avx2")
                }
                MethodId::ShuffleAvx512 | MethodId::XorJitAvx512 => avx512(),
                MethodId::AffineGfni => is_x86_feature_detected!("gfni") && is_x86_feature_detected!("ssse3"),
                MethodId::AffineAvx512 => is_x86_feature_detected!("gfni") && avx512(),
                MethodId::ShuffleNeon => false,
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            match self {
                MethodId::ShuffleNeon => std::arch::is_aarch64_feature_detected!("neon"),
                _ => true,
            }
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            true
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MethodId {
    type Err = Gf16Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MethodId::ALL
            .iter()
            .copied()
            .find(|m| m.slug().eq_ignore_ascii_case(s) || m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Gf16Error::UnknownMethod(s.to_string()))
    }
}

/// Descriptor of a bound method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MethodInfo {
    pub id: MethodId,
    pub name: &'static str,
    pub alignment: usize,
    pub stride: usize,
    pub ideal_chunk_size: usize,
}

impl MethodInfo {
    pub const fn new(id: MethodId) -> Self {
        Self {
            id,
            name: id.name(),
            alignment: id.alignment(),
            stride: id.stride(),
            ideal_chunk_size: id.ideal_chunk_size(),
        }
    }
}

impl From<MethodId> for MethodInfo {
    fn from(id: MethodId) -> Self {
        Self::new(id)
    }
}

/// Method selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodHint {
    /// Let the selector pick (default)
    #[default]
    Auto,
    /// Use this method, falling back to the selector if it is unsupported
    Method(MethodId),
}

impl MethodHint {
    /// Parse from environment variable GF16_METHOD
    pub fn from_env() -> Self {
        match std::env::var(METHOD_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|e: Gf16Error| {
                tracing::warn!(%value, error = %e, "ignoring {METHOD_ENV}");
                MethodHint::Auto
            }),
            Err(_) => MethodHint::Auto,
        }
    }
}

impl FromStr for MethodHint {
    type Err = Gf16Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(MethodHint::Auto)
        } else {
            s.parse().map(MethodHint::Method)
        }
    }
}

impl From<MethodId> for MethodHint {
    fn from(id: MethodId) -> Self {
        MethodHint::Method(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_slugs_round_trip() {
        for id in MethodId::ALL {
            assert_eq!(id.slug().parse::<MethodId>().unwrap(), id);
            assert_eq!(id.name().parse::<MethodId>().unwrap(), id);
            assert_eq!(id.to_string(), id.name());
        }
        assert_eq!("XOR-JIT-AVX2".parse::<MethodId>().unwrap(), MethodId::XorJitAvx2);
        assert!(matches!(
            "shuffle-sse9".parse::<MethodId>(),
            Err(Gf16Error::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_descriptor_table() {
        let info = MethodInfo::new(MethodId::ShuffleAvx2);
        assert_eq!((info.alignment, info.stride), (32, 64));
        assert_eq!(MethodId::Shuffle2xAvx2.stride(), 32);
        assert_eq!(MethodId::AffineAvx512.stride(), 128);
        assert_eq!((MethodId::XorJitAvx2.alignment(), MethodId::XorJitAvx2.stride()), (32, 512));
        assert_eq!(MethodId::XorSse2.stride(), 256);
        assert_eq!(MethodId::Lookup.stride(), 2);
        assert_eq!(MethodId::Lookup3.stride(), 8);
        assert_eq!(MethodId::XorJitSse2.ideal_chunk_size(), 128 * 1024);
        assert_eq!(MethodId::ShuffleSsse3.ideal_chunk_size(), 48 * 1024);
    }

    #[test]
    fn test_stride_is_aligned() {
        for id in MethodId::ALL {
            assert!(id.alignment().is_power_of_two(), "{id}");
            assert_eq!(id.stride() % id.alignment(), 0, "{id}");
            assert_eq!(id.stride() % 2, 0, "{id}");
        }
    }

    #[test]
    fn test_portable_methods_always_supported() {
        let none = Caps::none();
        let supported: Vec<_> = MethodId::ALL.into_iter().filter(|m| m.is_supported(&none)).collect();
        assert_eq!(supported, vec![MethodId::Lookup, MethodId::Lookup3]);
    }

    #[test]
    fn test_detected_methods_run_on_host() {
        let host = Caps::detect();
        for id in MethodId::ALL {
            if id.is_supported(&host) {
                assert!(id.host_can_run(), "{id}");
            }
            if id.host_can_run() {
                assert!(id.is_compiled(), "{id}");
            }
        }
        assert!(MethodId::Lookup.host_can_run());
    }

    #[test]
    fn test_hint_parse() {
        assert_eq!("auto".parse::<MethodHint>().unwrap(), MethodHint::Auto);
        assert_eq!(
            "lookup3".parse::<MethodHint>().unwrap(),
            MethodHint::Method(MethodId::Lookup3)
        );
        assert!("fastest".parse::<MethodHint>().is_err());
    }
}
