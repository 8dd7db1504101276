//! Method enumeration and the default-method heuristic
//!
//! The cascade below only affects throughput; every method computes the same
//! products. Entries are tried top to bottom and the first one whose extra
//! condition holds and whose prerequisites the capability record meets wins.

use crate::caps::Caps;
use crate::method::MethodId;

/// Optional workload description; zero means unknown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionHints {
    /// Bytes per region the caller expects to multiply
    pub region_size: usize,
    /// Output regions produced from each source
    pub outputs: usize,
    /// Worker threads sharing the core
    pub threads: usize,
}

/// Every method this build can run, ignoring the host (for exhaustive testing)
/// when `detect` is false
pub fn available_methods(detect: bool) -> Vec<MethodId> {
    let caps = if detect { Caps::detect() } else { Caps::all() };
    available_methods_for(&caps)
}

/// Methods the record supports, in catalogue order
pub fn available_methods_for(caps: &Caps) -> Vec<MethodId> {
    MethodId::ALL.into_iter().filter(|m| m.is_supported(caps)).collect()
}

/// Preferred method for a workload on the given host
pub fn default_method(caps: &Caps, hints: &SelectionHints) -> MethodId {
    // generated code has a fixed setup cost and pays off on large regions;
    // with three or fewer outputs shuffle keeps up
    let jit_worthwhile = caps.can_mem_wx
        && (hints.region_size == 0 || hints.region_size > caps.pref_shuffle_thresh)
        && (hints.outputs == 0 || hints.outputs > 3);
    // sibling threads compete for the shuffle port, the 2x kernel needs half
    let smt_contended = caps.hyper_threading && hints.threads != 1;

    let cascade = [
        (MethodId::AffineAvx512, true),
        (MethodId::ShuffleAvx512, true),
        (MethodId::Shuffle2xAvx2, smt_contended),
        (MethodId::XorJitAvx2, jit_worthwhile),
        (MethodId::ShuffleAvx, caps.avx2 && caps.avx128_eu),
        (MethodId::ShuffleAvx2, true),
        (MethodId::AffineGfni, true),
        (MethodId::XorJitSse2, jit_worthwhile),
        (MethodId::ShuffleAvx, true),
        (MethodId::ShuffleSsse3, true),
        (MethodId::XorSse2, true),
        (MethodId::ShuffleNeon, true),
    ];

    let chosen = cascade
        .into_iter()
        .find(|&(m, cond)| cond && m.is_supported(caps))
        .map_or(MethodId::Lookup, |(m, _)| m);
    tracing::debug!(method = %chosen, ?hints, "selected default method");
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_arch = "x86_64")]
    fn sse2_host() -> Caps {
        Caps { sse2: true, ssse3: true, ..Caps::none() }
    }

    #[cfg(target_arch = "x86_64")]
    fn avx2_host() -> Caps {
        Caps { avx: true, avx2: true, ..sse2_host() }
    }

    #[test]
    fn test_portable_fallback() {
        assert_eq!(default_method(&Caps::none(), &SelectionHints::default()), MethodId::Lookup);
        assert_eq!(
            available_methods_for(&Caps::none()),
            vec![MethodId::Lookup, MethodId::Lookup3]
        );
    }

    #[test]
    fn test_undetected_lists_every_compiled_method() {
        let all = available_methods(false);
        assert!(all.iter().all(|m| m.is_compiled()));
        assert_eq!(all.len(), MethodId::ALL.iter().filter(|m| m.is_compiled()).count());
    }

    #[test]
    fn test_detected_is_subset() {
        let all = available_methods(false);
        for m in available_methods(true) {
            assert!(all.contains(&m));
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_x86_cascade() {
        let hints = SelectionHints::default();
        assert_eq!(default_method(&sse2_host(), &hints), MethodId::ShuffleSsse3);
        assert_eq!(default_method(&Caps { ssse3: false, ..sse2_host() }, &hints), MethodId::XorSse2);
        assert_eq!(default_method(&avx2_host(), &hints), MethodId::ShuffleAvx2);
        assert_eq!(
            default_method(&Caps { avx128_eu: true, ..avx2_host() }, &hints),
            MethodId::ShuffleAvx
        );
        assert_eq!(
            default_method(&Caps { gfni: true, avx2: false, ..avx2_host() }, &hints),
            MethodId::AffineGfni
        );
        assert_eq!(
            default_method(&Caps { avx512bw: true, ..avx2_host() }, &hints),
            MethodId::ShuffleAvx512
        );
        assert_eq!(default_method(&Caps::all(), &hints), MethodId::AffineAvx512);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_every_feature_flag_gates_a_method() {
        let all = available_methods_for(&Caps::all());
        let without: [(&str, Caps); 6] = [
            ("sse2", Caps { sse2: false, ..Caps::all() }),
            ("ssse3", Caps { ssse3: false, ..Caps::all() }),
            ("avx", Caps { avx: false, ..Caps::all() }),
            ("avx2", Caps { avx2: false, ..Caps::all() }),
            ("avx512bw", Caps { avx512bw: false, ..Caps::all() }),
            ("gfni", Caps { gfni: false, ..Caps::all() }),
        ];
        for (flag, caps) in without {
            assert!(available_methods_for(&caps).len() < all.len(), "{flag} gates nothing");
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_hyper_threading_prefers_2x() {
        let caps = Caps { hyper_threading: true, ..avx2_host() };
        let many = SelectionHints { threads: 4, ..Default::default() };
        let single = SelectionHints { threads: 1, ..Default::default() };
        assert_eq!(default_method(&caps, &many), MethodId::Shuffle2xAvx2);
        assert_eq!(default_method(&caps, &SelectionHints::default()), MethodId::Shuffle2xAvx2);
        assert_eq!(default_method(&caps, &single), MethodId::ShuffleAvx2);
    }

    #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
    #[test]
    fn test_jit_thresholds() {
        let caps = Caps { can_mem_wx: true, ..avx2_host() };
        let big = SelectionHints { region_size: 1 << 20, ..Default::default() };
        let small = SelectionHints { region_size: 4096, ..Default::default() };
        let few_outputs = SelectionHints { region_size: 1 << 20, outputs: 2, threads: 0 };

        assert_eq!(default_method(&caps, &SelectionHints::default()), MethodId::XorJitAvx2);
        assert_eq!(default_method(&caps, &big), MethodId::XorJitAvx2);
        assert_eq!(default_method(&caps, &small), MethodId::ShuffleAvx2);
        assert_eq!(default_method(&caps, &few_outputs), MethodId::ShuffleAvx2);

        // slow shuffle units lower the bar
        let atom = Caps { pref_shuffle_thresh: 2048, avx: false, avx2: false, ..caps };
        assert_eq!(default_method(&atom, &small), MethodId::XorJitSse2);
        assert_eq!(
            default_method(&atom, &SelectionHints { region_size: 1024, ..Default::default() }),
            MethodId::ShuffleSsse3
        );
    }

    #[cfg(target_arch = "aarch64")]
    #[test]
    fn test_neon() {
        let caps = Caps { neon: true, ..Caps::none() };
        assert_eq!(default_method(&caps, &SelectionHints::default()), MethodId::ShuffleNeon);
    }
}
