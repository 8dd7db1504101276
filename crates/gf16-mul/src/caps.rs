//! Host capability detection
//!
//! A [`Caps`] record is a snapshot of what the processor and operating system
//! allow: vector extensions, shuffle-speed quirks, SMT, and whether freshly
//! written memory may be made executable. Detection never fails; anything
//! that cannot be probed is reported as absent.

/// Region size above which the XOR-JIT beats shuffle on an ordinary core
pub const DEFAULT_SHUFFLE_THRESH: usize = 131_072;

/// Threshold on cores whose `pshufb` is slow (Bonnell, Silvermont, Jaguar)
const SLOW_SHUFFLE_THRESH: usize = 2048;

/// Threshold on Conroe-class cores
const CONROE_SHUFFLE_THRESH: usize = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Caps {
    pub sse2: bool,
    pub ssse3: bool,
    /// AVX with YMM state enabled by the OS
    pub avx: bool,
    pub avx2: bool,
    /// AVX512 F + BW + VL with ZMM/opmask state enabled by the OS
    pub avx512bw: bool,
    pub gfni: bool,
    pub neon: bool,
    /// Region size beyond which XOR-JIT is preferred over shuffle
    pub pref_shuffle_thresh: usize,
    /// 256-bit operations are split over 128-bit execution units
    pub avx128_eu: bool,
    pub hyper_threading: bool,
    /// Generated code can be mapped executable
    pub can_mem_wx: bool,
}

impl Caps {
    /// Probe the running host
    pub fn detect() -> Self {
        let mut caps = Self::none();

        #[cfg(target_arch = "x86_64")]
        x86::detect(&mut caps);

        #[cfg(target_arch = "aarch64")]
        {
            caps.neon = std::arch::is_aarch64_feature_detected!("neon");
        }

        caps.can_mem_wx = probe_exec_memory();

        tracing::debug!(?caps, "detected host capabilities");
        caps
    }

    /// Portable-only record: no vector extensions, no executable memory
    pub const fn none() -> Self {
        Self {
            sse2: false,
            ssse3: false,
            avx: false,
            avx2: false,
            avx512bw: false,
            gfni: false,
            neon: false,
            pref_shuffle_thresh: DEFAULT_SHUFFLE_THRESH,
            avx128_eu: false,
            hyper_threading: false,
            can_mem_wx: false,
        }
    }

    /// Record with detection disabled: every feature reported present
    pub const fn all() -> Self {
        Self {
            sse2: true,
            ssse3: true,
            avx: true,
            avx2: true,
            avx512bw: true,
            gfni: true,
            neon: true,
            pref_shuffle_thresh: DEFAULT_SHUFFLE_THRESH,
            avx128_eu: false,
            hyper_threading: false,
            can_mem_wx: true,
        }
    }
}

#[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
fn probe_exec_memory() -> bool {
    match crate::jit::ExecMemory::new(256) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "executable mapping refused");
            false
        }
    }
}

#[cfg(not(all(feature = "jit", target_arch = "x86_64", unix)))]
fn probe_exec_memory() -> bool {
    false
}

/// Shuffle threshold and 128-bit-unit flag for a CPU signature.
///
/// `family` is base family plus extended family shifted left by four (so
/// Zen is `0x8F`), `model` is base model plus extended model shifted left by
/// four.
pub fn shuffle_quirks(family: u32, model: u32) -> (usize, bool) {
    let thresh = match (family, model) {
        // Bonnell / Silvermont / Airmont / Goldmont
        (6, 0x1C | 0x26 | 0x27 | 0x35 | 0x36 | 0x37 | 0x4A | 0x4C | 0x4D | 0x5A | 0x5D) => {
            SLOW_SHUFFLE_THRESH
        }
        // Conroe / Penryn
        (6, 0x0F | 0x16) => CONROE_SHUFFLE_THRESH,
        // Jaguar / Puma
        (0x5F, 0x00..=0x02) | (0x6F, 0x00 | 0x10 | 0x20 | 0x30) => SLOW_SHUFFLE_THRESH,
        _ => DEFAULT_SHUFFLE_THRESH,
    };

    let avx128_eu = matches!(
        (family, model),
        (0x6F, _) | (0x7F, _) | (0x8F, 0x00 | 0x01 | 0x08 | 0x11 | 0x18 | 0x50) | (6, 0x0F)
    );

    (thresh, avx128_eu)
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::{shuffle_quirks, Caps};
    use core::arch::x86_64::{__cpuid, __cpuid_count, _xgetbv};

    // XCR0: XMM + YMM state
    const XCR0_AVX_MASK: u64 = 0x6;
    // XCR0: opmask + ZMM_Hi256 + Hi16_ZMM state
    const XCR0_AVX512_MASK: u64 = 0xE0;
    // leaf 7 EBX: AVX512F (16), AVX512BW (30), AVX512VL (31)
    const AVX512_FBWVL: u32 = 0xC001_0000;

    // "GenuineIntel"
    const INTEL: (u32, u32, u32) = (0x756E_6547, 0x4965_6E69, 0x6C65_746E);

    #[allow(unused_unsafe)]
    pub(super) fn detect(caps: &mut Caps) {
        let leaf0 = unsafe { __cpuid(0) };
        let max_leaf = leaf0.eax;
        let is_intel = (leaf0.ebx, leaf0.edx, leaf0.ecx) == INTEL;

        let leaf1 = unsafe { __cpuid(1) };
        let family = ((leaf1.eax >> 8) & 0xF) + ((leaf1.eax >> 16) & 0xFF0);
        let model = ((leaf1.eax >> 4) & 0xF) + ((leaf1.eax >> 12) & 0xF0);

        caps.sse2 = leaf1.edx & (1 << 26) != 0;
        caps.ssse3 = leaf1.ecx & (1 << 9) != 0;
        (caps.pref_shuffle_thresh, caps.avx128_eu) = shuffle_quirks(family, model);

        // the instruction being present says nothing about the OS saving its state
        let osxsave = leaf1.ecx & (1 << 27) != 0;
        let xcr0 = if osxsave { unsafe { _xgetbv(0) } } else { 0 };
        let os_avx = xcr0 & XCR0_AVX_MASK == XCR0_AVX_MASK;
        let os_avx512 = os_avx && xcr0 & XCR0_AVX512_MASK == XCR0_AVX512_MASK;

        caps.avx = os_avx && leaf1.ecx & (1 << 28) != 0;

        if max_leaf >= 7 {
            let leaf7 = unsafe { __cpuid_count(7, 0) };
            caps.avx2 = caps.avx && leaf7.ebx & (1 << 5) != 0;
            caps.avx512bw = os_avx512 && leaf7.ebx & AVX512_FBWVL == AVX512_FBWVL;
            caps.gfni = leaf7.ecx & (1 << 8) != 0;
        }

        // SMT: HTT bit, then leaf 11 level 0 must be the SMT level with >1 thread
        if is_intel && max_leaf >= 11 && leaf1.edx & (1 << 28) != 0 {
            let topo = unsafe { __cpuid_count(11, 0) };
            let level_type = (topo.ecx >> 8) & 0xFF;
            caps.hyper_threading = level_type == 1 && (topo.ebx & 0xFFFF) > 1;
        }
    }
}
