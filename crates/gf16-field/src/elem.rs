use crate::{BinaryFieldElement, BinaryPolynomial};
use crate::poly::{BinaryPoly16, BinaryPoly32};

/// x^16 + x^12 + x^3 + x + 1
pub const POLYNOMIAL: u32 = 0x1100B;

/// Low 16 bits of [`POLYNOMIAL`], XORed in whenever a doubling overflows
pub const REDUCTION: u16 = (POLYNOMIAL & 0xFFFF) as u16;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gf16(BinaryPoly16);

impl Gf16 {
    pub const fn from_value(val: u16) -> Self {
        Self(BinaryPoly16::from_value(val))
    }

    pub const fn value(&self) -> u16 {
        self.0.value()
    }

    /// Multiply by x: shift left and fold the overflow bit back in
    #[inline]
    pub const fn mul2(val: u16) -> u16 {
        (val << 1) ^ (REDUCTION & 0u16.wrapping_sub(val >> 15))
    }

    fn reduce(poly: BinaryPoly32) -> Self {
        let mut v = poly.value();
        for bit in (16..32).rev() {
            if (v >> bit) & 1 == 1 {
                v ^= POLYNOMIAL << (bit - 16);
            }
        }
        Self::from_value(v as u16)
    }
}

impl BinaryFieldElement for Gf16 {
    type Poly = BinaryPoly16;

    fn zero() -> Self {
        Self(BinaryPoly16::zero())
    }

    fn one() -> Self {
        Self(BinaryPoly16::one())
    }

    fn from_poly(poly: Self::Poly) -> Self {
        Self(poly)
    }

    fn poly(&self) -> Self::Poly {
        self.0
    }

    fn add(&self, other: &Self) -> Self {
        Self(self.0.add(&other.0))
    }

    fn mul(&self, other: &Self) -> Self {
        Self::reduce(self.0.mul_full(&other.0))
    }

    fn inv(&self) -> Self {
        assert_ne!(self.value(), 0, "Cannot invert zero");
        // a^(2^16 - 2) = a^-1
        self.pow(65534)
    }

    fn pow(&self, mut exp: u64) -> Self {
        if *self == Self::zero() {
            return if exp == 0 { Self::one() } else { Self::zero() };
        }

        let mut result = Self::one();
        let mut base = *self;

        while exp > 0 {
            if exp & 1 == 1 {
                result = result.mul(&base);
            }
            base = base.mul(&base);
            exp >>= 1;
        }

        result
    }
}

impl From<u16> for Gf16 {
    fn from(val: u16) -> Self {
        Self::from_value(val)
    }
}

impl From<Gf16> for u16 {
    fn from(elem: Gf16) -> Self {
        elem.value()
    }
}

impl std::fmt::Display for Gf16 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.value())
    }
}

#[cfg(feature = "rand")]
impl rand::distributions::Distribution<Gf16> for rand::distributions::Standard {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Gf16 {
        Gf16::from_value(rng.gen())
    }
}
