//! Coefficient tables, all built by repeated doubling

use gf16_field::Gf16;

/// `coeff * x^k` for k in 0..16
#[inline]
pub(crate) fn powers_of_x(coeff: u16) -> [u16; 16] {
    let mut powers = [0u16; 16];
    let mut v = coeff;
    for p in powers.iter_mut() {
        *p = v;
        v = Gf16::mul2(v);
    }
    powers
}

/// Fill `out[n]` with the product for every value `n` of a bit span whose
/// single-bit products are `basis`
#[inline]
fn fill_span(basis: &[u16], out: &mut [u16]) {
    debug_assert_eq!(out.len(), 1 << basis.len());
    out[0] = 0;
    for n in 1..out.len() {
        let low = n & n.wrapping_neg();
        out[n] = out[n ^ low] ^ basis[low.trailing_zeros() as usize];
    }
}

/// Polynomial-derived tables shared by every coefficient of a bound method
#[derive(Debug, Clone)]
pub(crate) struct PolyTables {
    // reduction of n * x^16 for the nibble n shifted out by a multiply by x^4
    mul16: [u16; 16],
}

impl PolyTables {
    pub(crate) fn new() -> Self {
        let mut mul16 = [0u16; 16];
        for (n, r) in mul16.iter_mut().enumerate() {
            let mut v = (n as u16) << 12;
            for _ in 0..4 {
                v = Gf16::mul2(v);
            }
            *r = v;
        }
        Self { mul16 }
    }

    /// Multiply by x^4
    #[inline]
    pub(crate) fn mul16(&self, v: u16) -> u16 {
        (v << 4) ^ self.mul16[(v >> 12) as usize]
    }
}

/// Low/high byte products of `coeff` times each 16-bit element's low and high byte
pub(crate) struct ByteTables {
    lo: [u16; 256],
    hi: [u16; 256],
}

impl ByteTables {
    pub(crate) fn new(coeff: u16) -> Self {
        let powers = powers_of_x(coeff);
        let mut tables = Self { lo: [0; 256], hi: [0; 256] };
        fill_span(&powers[..8], &mut tables.lo);
        fill_span(&powers[8..], &mut tables.hi);
        tables
    }

    #[inline(always)]
    pub(crate) fn mul(&self, v: u16) -> u16 {
        self.lo[(v & 0xFF) as usize] ^ self.hi[(v >> 8) as usize]
    }
}

/// Products for a 5/5/6-bit split of each element
pub(crate) struct ThreePartTables {
    t0: [u16; 32],
    t1: [u16; 32],
    t2: [u16; 64],
}

impl ThreePartTables {
    pub(crate) fn new(coeff: u16) -> Self {
        let powers = powers_of_x(coeff);
        let mut tables = Self { t0: [0; 32], t1: [0; 32], t2: [0; 64] };
        fill_span(&powers[..5], &mut tables.t0);
        fill_span(&powers[5..10], &mut tables.t1);
        fill_span(&powers[10..], &mut tables.t2);
        tables
    }

    #[inline(always)]
    pub(crate) fn mul(&self, v: u16) -> u16 {
        self.t0[(v & 0x1F) as usize] ^ self.t1[((v >> 5) & 0x1F) as usize] ^ self.t2[(v >> 10) as usize]
    }
}

/// 16-entry byte tables for each nibble position: `lo[i][n]` / `hi[i][n]` are
/// the low / high byte of `coeff * (n << 4i)`
#[derive(Debug, Clone)]
pub(crate) struct NibbleTables {
    pub(crate) lo: [[u8; 16]; 4],
    pub(crate) hi: [[u8; 16]; 4],
}

impl NibbleTables {
    pub(crate) fn new(poly: &PolyTables, coeff: u16) -> Self {
        let mut tables = Self { lo: [[0; 16]; 4], hi: [[0; 16]; 4] };
        let mut base = coeff;
        for i in 0..4 {
            let mut basis = [0u16; 4];
            let mut v = base;
            for b in basis.iter_mut() {
                *b = v;
                v = Gf16::mul2(v);
            }

            let mut prod = [0u16; 16];
            fill_span(&basis, &mut prod);
            for (n, p) in prod.iter().enumerate() {
                let [l, h] = p.to_le_bytes();
                tables.lo[i][n] = l;
                tables.hi[i][n] = h;
            }

            base = poly.mul16(base);
        }
        tables
    }
}

/// Per output bit `p`, the input bits whose XOR produces it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DepMasks(pub(crate) [u16; 16]);

impl DepMasks {
    pub(crate) fn new(coeff: u16) -> Self {
        let mut masks = [0u16; 16];
        // column q of the matrix is coeff * x^q
        for (q, column) in powers_of_x(coeff).into_iter().enumerate() {
            for (p, mask) in masks.iter_mut().enumerate() {
                if (column >> p) & 1 == 1 {
                    *mask |= 1 << q;
                }
            }
        }
        Self(masks)
    }

    /// Input planes feeding output plane `p`, ascending
    #[inline]
    pub(crate) fn sources(&self, p: usize) -> impl Iterator<Item = usize> {
        let mask = self.0[p];
        (0..16).filter(move |q| (mask >> q) & 1 == 1)
    }

    /// 8x8 GF(2) matrix for `gf2p8affineqb` mapping source byte `s` to
    /// destination byte `d` (0 = low, 1 = high); byte `7 - i` is the row of
    /// output bit `i`
    pub(crate) fn affine_matrix(&self, d: usize, s: usize) -> u64 {
        let mut m = 0u64;
        for i in 0..8 {
            let row = (self.0[8 * d + i] >> (8 * s)) & 0xFF;
            m |= (row as u64) << (8 * (7 - i));
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf16_field::BinaryFieldElement;

    fn reference(a: u16, b: u16) -> u16 {
        Gf16::from_value(a).mul(&Gf16::from_value(b)).value()
    }

    #[test]
    fn test_mul16_matches_reference() {
        let poly = PolyTables::new();
        for v in [0u16, 1, 0x0FFF, 0x1000, 0xF000, 0xFFFF, 0xBEEF] {
            assert_eq!(poly.mul16(v), reference(v, 16), "v = {v:#06x}");
        }
    }

    #[test]
    fn test_byte_tables() {
        for coeff in [2u16, 3, 0x8000, 0xFFFF, 0x1234] {
            let t = ByteTables::new(coeff);
            let t3 = ThreePartTables::new(coeff);
            for v in [0u16, 1, 0x00FF, 0xFF00, 0xFFFF, 0xA5C3, 0x0400] {
                assert_eq!(t.mul(v), reference(v, coeff), "{coeff:#x} * {v:#x}");
                assert_eq!(t3.mul(v), reference(v, coeff), "{coeff:#x} * {v:#x}");
            }
        }
    }

    #[test]
    fn test_nibble_tables() {
        let poly = PolyTables::new();
        let coeff = 0xCAFE;
        let t = NibbleTables::new(&poly, coeff);
        for i in 0..4 {
            for n in 0..16u16 {
                let expect = reference(n << (4 * i), coeff);
                assert_eq!(u16::from_le_bytes([t.lo[i][n as usize], t.hi[i][n as usize]]), expect);
            }
        }
    }

    #[test]
    fn test_dep_masks_apply() {
        // applying the bit matrix must reproduce the product
        for coeff in [2u16, 3, 0x100B, 0xFFFF] {
            let deps = DepMasks::new(coeff);
            for v in [1u16, 0x8000, 0x1234, 0xFFFF] {
                let mut out = 0u16;
                for p in 0..16 {
                    let bit = deps.sources(p).fold(0, |acc, q| acc ^ ((v >> q) & 1));
                    out |= bit << p;
                }
                assert_eq!(out, reference(v, coeff));
            }
        }
    }

    #[test]
    fn test_identity_masks() {
        let deps = DepMasks::new(1);
        for p in 0..16 {
            assert_eq!(deps.0[p], 1 << p);
        }
        assert_eq!(deps.affine_matrix(0, 0), 0x0102_0408_1020_4080);
        assert_eq!(deps.affine_matrix(0, 1), 0);
    }
}
