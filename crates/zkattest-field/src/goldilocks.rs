use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Field modulus p = 2^64 - 2^32 + 1
pub const MODULUS: u64 = 0xFFFF_FFFF_0000_0001;

/// 2-adicity of p - 1
pub const TWO_ADICITY: u32 = 32;

/// Generator of the full multiplicative group, also used as coset offset
pub const GENERATOR: Goldilocks = Goldilocks(7);

/// Element of the Goldilocks field, always stored in canonical form (< p)
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Goldilocks(u64);

impl Goldilocks {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);
    pub const TWO: Self = Self(2);

    /// Reduce an arbitrary u64 into the field
    pub const fn new(value: u64) -> Self {
        if value >= MODULUS {
            Self(value - MODULUS)
        } else {
            Self(value)
        }
    }

    /// Accept only canonical encodings, used on untrusted input
    pub const fn from_canonical(value: u64) -> Option<Self> {
        if value < MODULUS {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Decode 8 little-endian bytes, rejecting non-canonical values
    pub fn from_le_bytes(bytes: [u8; 8]) -> Option<Self> {
        Self::from_canonical(u64::from_le_bytes(bytes))
    }

    pub fn square(&self) -> Self {
        *self * *self
    }

    pub fn pow(&self, mut exp: u64) -> Self {
        let mut base = *self;
        let mut acc = Self::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                acc *= base;
            }
            base = base.square();
            exp >>= 1;
        }
        acc
    }

    /// Multiplicative inverse via Fermat, `None` for zero
    pub fn inverse(&self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(self.pow(MODULUS - 2))
        }
    }

    /// Primitive root of unity of order 2^log_n
    pub fn root_of_unity(log_n: u32) -> Option<Self> {
        if log_n > TWO_ADICITY {
            return None;
        }
        Some(GENERATOR.pow((MODULUS - 1) >> log_n))
    }
}

impl fmt::Debug for Goldilocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Goldilocks({})", self.0)
    }
}

impl fmt::Display for Goldilocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Goldilocks {
    fn from(value: u32) -> Self {
        Self(value as u64)
    }
}

impl Add for Goldilocks {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        let (sum, carry) = self.0.overflowing_add(rhs.0);
        if carry || sum >= MODULUS {
            Self(sum.wrapping_sub(MODULUS))
        } else {
            Self(sum)
        }
    }
}

impl Sub for Goldilocks {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        if self.0 >= rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self(self.0.wrapping_sub(rhs.0).wrapping_add(MODULUS))
        }
    }
}

impl Mul for Goldilocks {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let wide = (self.0 as u128) * (rhs.0 as u128);
        Self((wide % MODULUS as u128) as u64)
    }
}

/// Division by zero yields zero; callers that care check `inverse()` first.
impl Div for Goldilocks {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        self * rhs.inverse().unwrap_or(Self::ZERO)
    }
}

impl Neg for Goldilocks {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        if self.0 == 0 {
            self
        } else {
            Self(MODULUS - self.0)
        }
    }
}

impl AddAssign for Goldilocks {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Goldilocks {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Goldilocks {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl core::iter::Sum for Goldilocks {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}
