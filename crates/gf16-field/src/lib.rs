// src/lib.rs
//! Scalar arithmetic in GF(2^16)
//!
//! Elements are 16-bit polynomials over GF(2) reduced modulo
//! x^16 + x^12 + x^3 + x + 1 (`0x1100B`). This is the reference the region
//! engine in `gf16-mul` is checked against, and the source of the doubling
//! step every table builder uses.

mod elem;
mod poly;

pub use elem::{Gf16, POLYNOMIAL, REDUCTION};
pub use poly::{BinaryPoly16, BinaryPoly32};

pub trait BinaryFieldElement: Send + Sync +
    Sized + Copy + Clone + Default + PartialEq + Eq + std::fmt::Debug
{
    type Poly: BinaryPolynomial;

    fn zero() -> Self;
    fn one() -> Self;
    fn from_poly(poly: Self::Poly) -> Self;
    fn poly(&self) -> Self::Poly;
    fn add(&self, other: &Self) -> Self;
    fn mul(&self, other: &Self) -> Self;
    fn inv(&self) -> Self;
    fn pow(&self, exp: u64) -> Self;
}

pub trait BinaryPolynomial:
    Sized + Copy + Clone + Default + PartialEq + Eq + std::fmt::Debug
{
    type Value: Copy + Clone + std::fmt::Debug;

    fn zero() -> Self;
    fn one() -> Self;
    fn from_value(val: u64) -> Self;
    fn value(&self) -> Self::Value;
    fn add(&self, other: &Self) -> Self;
    fn mul(&self, other: &Self) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly_operations() {
        // polynomial addition
        let a = BinaryPoly16::from_value(0x1234);
        let b = BinaryPoly16::from_value(0x5678);
        assert_eq!(a.add(&b).value(), 0x1234 ^ 0x5678);
        assert_eq!(a.add(&a), BinaryPoly16::zero());

        // polynomial multiplication stays carry-free
        let a = BinaryPoly16::from_value(0x3);
        let b = BinaryPoly16::from_value(0x3);
        assert_eq!(a.mul(&b).value(), 0x5);
        assert_eq!(a.mul(&BinaryPoly16::one()), a);
    }

    #[test]
    fn test_field_axioms() {
        let a = Gf16::from_value(0x1234);
        let b = Gf16::from_value(0x5678);
        let c = Gf16::from_value(0x9ABC);

        // associativity
        assert_eq!(a.add(&b.add(&c)), a.add(&b).add(&c));
        assert_eq!(a.mul(&b.mul(&c)), a.mul(&b).mul(&c));

        // commutativity
        assert_eq!(a.add(&b), b.add(&a));
        assert_eq!(a.mul(&b), b.mul(&a));

        // distributivity
        assert_eq!(a.mul(&b.add(&c)), a.mul(&b).add(&a.mul(&c)));

        // identities
        assert_eq!(a.add(&Gf16::zero()), a);
        assert_eq!(a.mul(&Gf16::one()), a);

        // inverses
        assert_eq!(a.add(&a), Gf16::zero());
        assert_eq!(a.mul(&a.inv()), Gf16::one());
    }

    #[test]
    fn test_fermat_little_theorem() {
        // a^(2^n - 1) = 1 for all a != 0 in GF(2^n)
        let a = Gf16::from_value(0x1234);
        assert_eq!(a.pow(65535), Gf16::one());

        // frobenius: a^(2^n) = a
        assert_eq!(a.pow(65536), a);
    }
}
