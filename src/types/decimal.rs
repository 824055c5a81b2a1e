//! Types related to [`Decimal`], the in-memory representation of an Ion decimal value.

use num_bigint::{BigInt, BigUint, Sign as BigSign};
use std::fmt::{Display, Formatter};

use crate::types::UInt;

/// Indicates whether the Coefficient's magnitude is less than 0 (negative) or not (positive).
/// When the magnitude is zero, the Sign can be used to distinguish between -0 and 0.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Sign {
    Negative,
    Positive,
}

/// A signed integer that can be used as the coefficient of a Decimal value. This type does not
/// consider `0` and `-0` to be equal and supports magnitudes of arbitrary size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coefficient {
    pub(crate) sign: Sign,
    pub(crate) magnitude: UInt,
}

impl Coefficient {
    pub fn new<I: Into<UInt>>(sign: Sign, magnitude: I) -> Self {
        Coefficient {
            sign,
            magnitude: magnitude.into(),
        }
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn magnitude(&self) -> &UInt {
        &self.magnitude
    }

    /// Constructs a new Coefficient that represents negative zero.
    pub fn negative_zero() -> Self {
        Coefficient {
            sign: Sign::Negative,
            magnitude: UInt::U64(0),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    pub fn is_negative_zero(&self) -> bool {
        self.sign == Sign::Negative && self.is_zero()
    }

    /// If the value can fit in an i64, return it as such. Negative zero cannot be represented
    /// as an i64 and returns `None`.
    pub(crate) fn as_i64(&self) -> Option<i64> {
        if self.is_negative_zero() {
            return None;
        }
        let magnitude = self.magnitude.as_u64()?;
        match self.sign {
            Sign::Positive => i64::try_from(magnitude).ok(),
            Sign::Negative if magnitude == i64::MIN.unsigned_abs() => Some(i64::MIN),
            Sign::Negative => i64::try_from(magnitude).ok().map(|m| -m),
        }
    }
}

macro_rules! impl_coefficient_from_unsigned_int_types {
    ($($t:ty),*) => ($(
        impl From<$t> for Coefficient {
            fn from(value: $t) -> Coefficient {
                Coefficient::new(Sign::Positive, value)
            }
        }
    )*)
}
impl_coefficient_from_unsigned_int_types!(u8, u16, u32, u64, usize, BigUint);

macro_rules! impl_coefficient_from_signed_int_types {
    ($($t:ty),*) => ($(
        impl From<$t> for Coefficient {
            fn from(value: $t) -> Coefficient {
                let sign = if value < 0 { Sign::Negative } else { Sign::Positive };
                Coefficient::new(sign, value.unsigned_abs() as u64)
            }
        }
    )*)
}
impl_coefficient_from_signed_int_types!(i8, i16, i32, i64, isize);

impl From<BigInt> for Coefficient {
    fn from(value: BigInt) -> Self {
        let (sign, magnitude) = value.into_parts();
        let sign = match sign {
            BigSign::Minus => Sign::Negative,
            BigSign::NoSign | BigSign::Plus => Sign::Positive,
        };
        Coefficient::new(sign, magnitude)
    }
}

/// An arbitrary-precision Decimal type with a distinct representation of negative zero (`-0`).
///
/// A `Decimal` can be thought of as a `(coefficient, exponent)` pair, and its value can be
/// calculated using the formula `coefficient * 10^exponent`. Two decimals are equal only if
/// both their coefficients (including the sign of zero) and their exponents are equal; `1.0`
/// and `1.00` are distinct values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decimal {
    pub(crate) coefficient: Coefficient,
    pub(crate) exponent: i64,
}

impl Decimal {
    /// Constructs a new Decimal with the provided components. The value of the decimal is:
    ///    `coefficient * 10^exponent`
    pub fn new<C: Into<Coefficient>, E: Into<i64>>(coefficient: C, exponent: E) -> Decimal {
        Decimal {
            coefficient: coefficient.into(),
            exponent: exponent.into(),
        }
    }

    /// Constructs a Decimal with the value `-0d0`. Rust ignores a unary minus applied to an
    /// integer zero literal, so negative zero needs a dedicated constructor.
    pub fn negative_zero() -> Decimal {
        Decimal::negative_zero_with_exponent(0)
    }

    pub fn negative_zero_with_exponent(exponent: i64) -> Decimal {
        Decimal {
            coefficient: Coefficient::negative_zero(),
            exponent,
        }
    }

    pub fn coefficient(&self) -> &Coefficient {
        &self.coefficient
    }

    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    /// Returns `true` if this Decimal is a zero of any sign or exponent.
    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    /// Returns `true` for `0d0` exactly: a positive zero coefficient with an exponent of zero.
    pub fn is_positive_zero_with_zero_exponent(&self) -> bool {
        self.exponent == 0 && self.is_zero() && self.coefficient.sign == Sign::Positive
    }

    /// Returns `true` if `0 <= self < 1`. Used to validate the fractional seconds of a
    /// timestamp. Negative zero is accepted.
    pub(crate) fn is_fraction(&self) -> bool {
        if self.is_zero() {
            return true;
        }
        if self.coefficient.sign == Sign::Negative || self.exponent >= 0 {
            return false;
        }
        let digits_after_point = self.exponent.unsigned_abs();
        match &self.coefficient.magnitude {
            UInt::U64(m) if digits_after_point < 20 => *m < 10u64.pow(digits_after_point as u32),
            UInt::U64(_) => true,
            UInt::BigUInt(m) => {
                let limit = num_traits::pow(BigUint::from(10u32), digits_after_point as usize);
                *m < limit
            }
        }
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.coefficient.sign == Sign::Negative {
            write!(f, "-")?;
        }
        write!(f, "{}d{}", self.coefficient.magnitude, self.exponent)
    }
}
