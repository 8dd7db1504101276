//! Working-data layouts and the prepare/finish transforms between them

/// Largest block of any layout (`BitPlanes { width: 64 }`)
const MAX_BLOCK: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// Little-endian u16 elements, as callers hold them
    Native,
    /// Blocks of `2 * width` bytes: `width` low bytes, then the matching high bytes
    Split { width: usize },
    /// Blocks of 16 planes of `width` bytes; plane `p` holds bit `p` of `8 * width` elements
    BitPlanes { width: usize },
}

impl Layout {
    /// Bytes per transform block (one element for `Native`)
    pub(crate) const fn block_len(self) -> usize {
        match self {
            Layout::Native => 2,
            Layout::Split { width } => 2 * width,
            Layout::BitPlanes { width } => 16 * width,
        }
    }

    pub(crate) const fn is_native(self) -> bool {
        matches!(self, Layout::Native)
    }

    /// Copy raw elements from `src` into `dst` in this layout, zero-padding the tail.
    ///
    /// `dst.len()` must be a whole number of blocks and at least `src.len()`.
    pub(crate) fn prepare(self, dst: &mut [u8], src: &[u8]) {
        debug_assert!(src.len() % 2 == 0);
        debug_assert!(dst.len() >= src.len() && dst.len() % self.block_len() == 0);

        match self {
            Layout::Native => {
                dst[..src.len()].copy_from_slice(src);
                dst[src.len()..].fill(0);
            }
            Layout::Split { width } => {
                for (bi, block) in dst.chunks_exact_mut(2 * width).enumerate() {
                    let (lo, hi) = block.split_at_mut(width);
                    for k in 0..width {
                        let [l, h] = element(src, bi * width + k).to_le_bytes();
                        lo[k] = l;
                        hi[k] = h;
                    }
                }
            }
            Layout::BitPlanes { width } => {
                let per_block = 8 * width;
                for (bi, block) in dst.chunks_exact_mut(16 * width).enumerate() {
                    block.fill(0);
                    for j in 0..per_block {
                        let val = element(src, bi * per_block + j);
                        if val == 0 {
                            continue;
                        }
                        let (byte, bit) = (j / 8, j % 8);
                        for p in 0..16 {
                            if (val >> p) & 1 == 1 {
                                block[p * width + byte] |= 1 << bit;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Invert [`Layout::prepare`] in place
    pub(crate) fn finish(self, buf: &mut [u8]) {
        debug_assert!(buf.len() % self.block_len() == 0);

        let mut tmp = [0u8; MAX_BLOCK];
        match self {
            Layout::Native => {}
            Layout::Split { width } => {
                for block in buf.chunks_exact_mut(2 * width) {
                    tmp[..block.len()].copy_from_slice(block);
                    for k in 0..width {
                        block[2 * k] = tmp[k];
                        block[2 * k + 1] = tmp[width + k];
                    }
                }
            }
            Layout::BitPlanes { width } => {
                for block in buf.chunks_exact_mut(16 * width) {
                    tmp[..block.len()].copy_from_slice(block);
                    for j in 0..8 * width {
                        let (byte, bit) = (j / 8, j % 8);
                        let mut val = 0u16;
                        for p in 0..16 {
                            val |= (((tmp[p * width + byte] >> bit) & 1) as u16) << p;
                        }
                        block[2 * j..2 * j + 2].copy_from_slice(&val.to_le_bytes());
                    }
                }
            }
        }
    }
}

// element `idx` of raw data, zero past the end
#[inline]
fn element(src: &[u8], idx: usize) -> u16 {
    match src.get(2 * idx..2 * idx + 2) {
        Some(&[l, h]) => u16::from_le_bytes([l, h]),
        _ => 0,
    }
}
