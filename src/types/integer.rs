use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Represents an unsigned integer of any size. Used as the magnitude of [`Int`]s that do not fit
/// in an `i64`, of Decimal coefficients, and of fractional seconds.
#[derive(Debug, Clone)]
pub enum UInt {
    U64(u64),
    BigUInt(BigUint),
}

impl UInt {
    /// Compares a [u64] integer with a [BigUint]. This method never allocates. It will always
    /// prefer to downgrade the BigUint and compare the two integers as u64 values. If this is
    /// not possible, then the BigUint is larger than the u64.
    fn cross_representation_cmp(m1: u64, m2: &BigUint) -> Ordering {
        if let Some(downgraded_m2) = m2.to_u64() {
            return m1.cmp(&downgraded_m2);
        }
        Ordering::Less
    }

    pub fn is_zero(&self) -> bool {
        match self {
            UInt::U64(value) => *value == 0,
            UInt::BigUInt(value) => value.is_zero(),
        }
    }

    /// Returns the value as a `u64` if it fits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            UInt::U64(value) => Some(*value),
            UInt::BigUInt(value) => value.to_u64(),
        }
    }

    /// Returns the big-endian bytes of the magnitude with no leading zero bytes. Zero is
    /// represented by an empty Vec.
    pub fn to_be_bytes_minimal(&self) -> Vec<u8> {
        match self {
            UInt::U64(0) => Vec::new(),
            UInt::U64(value) => {
                let bytes = value.to_be_bytes();
                let leading_zeros = (value.leading_zeros() / 8) as usize;
                bytes[leading_zeros..].to_vec()
            }
            UInt::BigUInt(value) if value.is_zero() => Vec::new(),
            UInt::BigUInt(value) => value.to_bytes_be(),
        }
    }
}

impl PartialEq for UInt {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for UInt {}

impl PartialOrd for UInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UInt {
    fn cmp(&self, other: &Self) -> Ordering {
        use UInt::*;
        match (self, other) {
            (U64(m1), U64(m2)) => m1.cmp(m2),
            (BigUInt(m1), BigUInt(m2)) => m1.cmp(m2),
            (U64(m1), BigUInt(m2)) => UInt::cross_representation_cmp(*m1, m2),
            (BigUInt(m1), U64(m2)) => UInt::cross_representation_cmp(*m2, m1).reverse(),
        }
    }
}

macro_rules! impl_uint_from_unsigned_int_types {
    ($($t:ty),*) => ($(
        impl From<$t> for UInt {
            fn from(value: $t) -> UInt {
                UInt::U64(value as u64)
            }
        }
    )*)
}

impl_uint_from_unsigned_int_types!(u8, u16, u32, u64, usize);

impl From<u128> for UInt {
    fn from(value: u128) -> UInt {
        match u64::try_from(value) {
            Ok(small) => UInt::U64(small),
            Err(_) => UInt::BigUInt(BigUint::from(value)),
        }
    }
}

impl From<BigUint> for UInt {
    fn from(value: BigUint) -> UInt {
        match value.to_u64() {
            Some(small) => UInt::U64(small),
            None => UInt::BigUInt(value),
        }
    }
}

impl From<UInt> for BigUint {
    fn from(value: UInt) -> Self {
        match value {
            UInt::U64(small) => BigUint::from(small),
            UInt::BigUInt(big) => big,
        }
    }
}

impl Display for UInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UInt::U64(value) => write!(f, "{value}"),
            UInt::BigUInt(value) => write!(f, "{value}"),
        }
    }
}

/// Container for either an integer that can fit in a 64-bit word or an arbitrarily sized
/// [`BigInt`].
#[derive(Debug, Clone)]
pub enum Int {
    I64(i64),
    BigInt(BigInt),
}

impl Int {
    /// Returns the value as an `i64` if it can be represented as such.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Int::I64(value) => Some(*value),
            Int::BigInt(big) => big.to_i64(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Int::I64(value) => *value == 0,
            Int::BigInt(big) => big.is_zero(),
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Int::I64(value) => *value < 0,
            Int::BigInt(big) => big.sign() == Sign::Minus,
        }
    }

    /// Returns the absolute value of this integer.
    pub fn unsigned_abs(&self) -> UInt {
        match self {
            Int::I64(value) => UInt::U64(value.unsigned_abs()),
            Int::BigInt(big) => UInt::from(big.magnitude().clone()),
        }
    }
}

impl PartialEq for Int {
    fn eq(&self, other: &Self) -> bool {
        use Int::*;
        match (self, other) {
            (I64(m1), I64(m2)) => m1 == m2,
            (BigInt(m1), BigInt(m2)) => m1 == m2,
            (I64(m1), BigInt(m2)) | (BigInt(m2), I64(m1)) => m2.to_i64() == Some(*m1),
        }
    }
}

impl Eq for Int {}

// Trivial conversion to Int::I64 from integers that can safely be converted to an i64
macro_rules! impl_int_i64_from {
    ($($t:ty),*) => ($(
        impl From<$t> for Int {
            fn from(value: $t) -> Int {
                let i64_value = i64::from(value);
                Int::I64(i64_value)
            }
        }
    )*)
}
impl_int_i64_from!(u8, u16, u32, i8, i16, i32, i64);

// Conversion to Int from integer types that may or may not fit in an i64
macro_rules! impl_int_from {
    ($($t:ty),*) => ($(
        impl From<$t> for Int {
            fn from(value: $t) -> Int {
                match i64::try_from(value) {
                    Ok(i64_value) => Int::I64(i64_value),
                    Err(_) => Int::BigInt(BigInt::from(value))
                }
            }
        }
    )*)
}

impl_int_from!(isize, usize, u64, i128, u128);

impl From<BigUint> for Int {
    fn from(value: BigUint) -> Self {
        Int::BigInt(BigInt::from(value))
    }
}

impl From<BigInt> for Int {
    fn from(value: BigInt) -> Self {
        Int::BigInt(value)
    }
}

impl Display for Int {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Int::I64(value) => write!(f, "{value}"),
            Int::BigInt(value) => write!(f, "{value}"),
        }
    }
}
