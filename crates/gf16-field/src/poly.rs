use crate::BinaryPolynomial;

// Macro to implement binary polynomials for different sizes
macro_rules! impl_binary_poly {
    ($name:ident, $value_type:ty) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name($value_type);

        impl $name {
            pub const fn from_value(val: $value_type) -> Self {
                Self(val)
            }

            pub const fn value(&self) -> $value_type {
                self.0
            }
        }

        impl BinaryPolynomial for $name {
            type Value = $value_type;

            fn zero() -> Self {
                Self(0)
            }

            fn one() -> Self {
                Self(1)
            }

            fn from_value(val: u64) -> Self {
                Self(val as $value_type)
            }

            fn value(&self) -> Self::Value {
                self.0
            }

            fn add(&self, other: &Self) -> Self {
                Self(self.0 ^ other.0)
            }

            // truncated to the type width
            fn mul(&self, other: &Self) -> Self {
                let mut result: $value_type = 0;
                let mut a = self.0;
                let mut b = other.0;
                while b != 0 {
                    if b & 1 == 1 {
                        result ^= a;
                    }
                    a <<= 1;
                    b >>= 1;
                }
                Self(result)
            }
        }
    };
}

impl_binary_poly!(BinaryPoly16, u16);
impl_binary_poly!(BinaryPoly32, u32);

impl BinaryPoly16 {
    /// Full 16x16 -> 32 bit carry-less product
    pub fn mul_full(&self, other: &Self) -> BinaryPoly32 {
        let a = self.0 as u32;
        let mut result = 0u32;
        for i in 0..16 {
            let mask = 0u32.wrapping_sub(((other.0 >> i) & 1) as u32);
            result ^= (a << i) & mask;
        }
        BinaryPoly32::from_value(result)
    }
}
