// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! Exact model of fixed-point, floating-point and IEEE-style number formats.
//!
//! Every format is a set of representable reals described by a radix, a
//! precision and (for the fixed and IEEE formats) exponent bounds. Rounding
//! maps an exact real onto that set under one of four [`RoundingMode`]s,
//! without ever going through a hardware float.
//!
//! ```
//! use finite_formats::{IeeeFormat, RoundToFormat, RoundingMode};
//! use num_rational::BigRational;
//!
//! let format = IeeeFormat::new(2, 3, -2, 2).unwrap();
//! let eight = BigRational::from_integer(8.into());
//! assert_eq!(format.max_finite(), BigRational::from_integer(7.into()));
//! assert_eq!(format.round(RoundingMode::ToZero, &eight), format.max_finite());
//! assert!(format.is_positive_infinity(&format.round(RoundingMode::ToNearest, &eight)));
//! ```

use bitflags::bitflags;
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::One;
use num_traits::Signed;
use num_traits::ToPrimitive;
use num_traits::Zero;
use std::cmp::Ordering;
use std::ops::Neg;
use thiserror::Error;
use tracing::debug;
use tracing::trace;

mod real;


pub use real::radix_power;
pub use real::ExactReal;

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub enum Sign {
    Positive,
    Negative,
}

impl Neg for Sign {
    type Output = Self;
    fn neg(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }
}

fn apply_sign(sign: Sign, value: BigRational) -> BigRational {
    match sign {
        Sign::Positive => value,
        Sign::Negative => -value,
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RoundingMode {
    /// ties go to the even grid index
    ToNearest,
    ToZero,
    ToPositiveInfinity,
    ToNegativeInfinity,
}

impl Default for RoundingMode {
    fn default() -> Self {
        RoundingMode::ToNearest
    }
}

bitflags! {
    pub struct StatusFlags: u32 {
        const OVERFLOW = 0b001;
        const UNDERFLOW = 0b010;
        const INEXACT = 0b100;
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::empty()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Error)]
pub enum InvalidFormatError {
    #[error("radix must be greater than 1, got {radix}")]
    RadixTooSmall { radix: u32 },
    #[error("radix must be even, got {radix}")]
    OddRadix { radix: u32 },
    #[error("precision must be greater than 1, got {precision}")]
    PrecisionTooSmall { precision: u32 },
    #[error("maximum exponent {max_exponent} is less than minimum exponent {min_exponent}")]
    EmptyExponentRange {
        min_exponent: i64,
        max_exponent: i64,
    },
    #[error("exponent {exponent} is out of range for precision {precision}")]
    ExponentOutOfRange { exponent: i64, precision: u32 },
}

fn check_radix_and_precision(radix: u32, precision: u32) -> Result<(), InvalidFormatError> {
    let error = if radix <= 1 {
        InvalidFormatError::RadixTooSmall { radix }
    } else if radix.is_odd() {
        InvalidFormatError::OddRadix { radix }
    } else if precision <= 1 {
        InvalidFormatError::PrecisionTooSmall { precision }
    } else {
        return Ok(());
    };
    debug!(radix, precision, %error, "rejected format");
    Err(error)
}

/// `exponent - precision + 1` and `exponent + 1` must both fit in an `i64`.
fn check_exponent(exponent: i64, precision: u32) -> Result<(), InvalidFormatError> {
    if exponent.checked_sub(i64::from(precision)).is_some() && exponent.checked_add(1).is_some() {
        return Ok(());
    }
    let error = InvalidFormatError::ExponentOutOfRange {
        exponent,
        precision,
    };
    debug!(exponent, precision, %error, "rejected format");
    Err(error)
}

/// Rounds exact reals onto the values of a format.
pub trait RoundToFormat {
    fn round<R: ExactReal>(&self, rounding_mode: RoundingMode, value: &R) -> R;
}

pub fn round<F: RoundToFormat, R: ExactReal>(
    format: &F,
    rounding_mode: RoundingMode,
    value: &R,
) -> R {
    format.round(rounding_mode, value)
}

/// Values `n * radix^(min_exponent - precision + 1)` with `|n| < radix^precision`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FixedFormat {
    radix: u32,
    precision: u32,
    min_exponent: i64,
}

impl FixedFormat {
    pub fn new(
        radix: u32,
        precision: u32,
        min_exponent: i64,
    ) -> Result<Self, InvalidFormatError> {
        check_radix_and_precision(radix, precision)?;
        check_exponent(min_exponent, precision)?;
        Ok(Self {
            radix,
            precision,
            min_exponent,
        })
    }
    #[inline]
    pub const fn radix(self) -> u32 {
        self.radix
    }
    #[inline]
    pub const fn precision(self) -> u32 {
        self.precision
    }
    #[inline]
    pub const fn min_exponent(self) -> i64 {
        self.min_exponent
    }
    /// spacing of the grid
    pub fn ulp(self) -> BigRational {
        radix_power(self.radix, self.min_exponent - i64::from(self.precision) + 1)
    }
    fn significand_limit(self) -> BigInt {
        num_traits::pow(
            BigInt::from(self.radix),
            self.precision
                .to_usize()
                .expect("precision doesn't fit in usize"),
        )
    }
    /// largest representable magnitude
    pub fn finite_boundary(self) -> BigRational {
        BigRational::from_integer(self.significand_limit() - 1) * self.ulp()
    }
    pub fn contains<R: ExactReal>(self, value: &R) -> bool {
        let value_in_ulps = value.mul_ratio(&self.ulp().recip());
        let index = value_in_ulps.floor_integer();
        value_in_ulps == R::from_ratio(BigRational::from_integer(index.clone()))
            && index.abs() < self.significand_limit()
    }
    /// Rounds `value` to a multiple of [`ulp`](Self::ulp). The grid is not
    /// clamped to [`finite_boundary`](Self::finite_boundary).
    pub fn round_fixed<R: ExactReal>(self, rounding_mode: RoundingMode, value: &R) -> R {
        let ulp = self.ulp();
        let value_in_ulps = value.mul_ratio(&ulp.recip());
        let lower_index = value_in_ulps.floor_integer();
        let remainder_in_ulps =
            value_in_ulps.add_ratio(&-BigRational::from_integer(lower_index.clone()));
        if remainder_in_ulps.sign().is_none() {
            return value.clone();
        }
        let upper_index = &lower_index + 1;
        let index = match rounding_mode {
            RoundingMode::ToNearest => {
                match remainder_in_ulps.cmp(&R::from_ratio(BigRational::new(
                    BigInt::one(),
                    BigInt::from(2),
                ))) {
                    Ordering::Less => lower_index,
                    Ordering::Equal => {
                        if lower_index.is_even() {
                            lower_index
                        } else {
                            upper_index
                        }
                    }
                    Ordering::Greater => upper_index,
                }
            }
            RoundingMode::ToZero => {
                if lower_index.is_negative() {
                    upper_index
                } else {
                    lower_index
                }
            }
            RoundingMode::ToPositiveInfinity => upper_index,
            RoundingMode::ToNegativeInfinity => lower_index,
        };
        R::from_ratio(BigRational::from_integer(index) * ulp)
    }
}

impl RoundToFormat for FixedFormat {
    fn round<R: ExactReal>(&self, rounding_mode: RoundingMode, value: &R) -> R {
        self.round_fixed(rounding_mode, value)
    }
}

/// `value == sign * (leading_digit * radix^exponent) + residual`
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Normalized<R> {
    pub sign: Sign,
    /// `radix^exponent <= |value| < radix^(exponent + 1)`
    pub exponent: i64,
    /// in `1..radix`
    pub leading_digit: u32,
    /// has the sign of the value, `|residual| < radix^exponent`
    pub residual: R,
}

/// Values `m * radix^(e - precision + 1)` with `0 < m < radix^precision` for any `e`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FloatFormat {
    radix: u32,
    precision: u32,
}

impl FloatFormat {
    pub fn new(radix: u32, precision: u32) -> Result<Self, InvalidFormatError> {
        check_radix_and_precision(radix, precision)?;
        Ok(Self { radix, precision })
    }
    #[inline]
    pub const fn radix(self) -> u32 {
        self.radix
    }
    #[inline]
    pub const fn precision(self) -> u32 {
        self.precision
    }
    /// half the distance from 1 to the next larger value
    pub fn epsilon(self) -> BigRational {
        radix_power(self.radix, 1 - i64::from(self.precision))
            / BigRational::from_integer(BigInt::from(2))
    }
    /// the grid of the values with normalized exponent `exponent`
    fn fixed_at(self, exponent: i64) -> FixedFormat {
        FixedFormat {
            radix: self.radix,
            precision: self.precision,
            min_exponent: exponent,
        }
    }
    /// Splits off the leading digit. Returns `None` for zero.
    pub fn normalize<R: ExactReal>(self, value: &R) -> Option<Normalized<R>> {
        let sign = value.sign()?;
        let magnitude = value.abs_value();
        let log2 = magnitude.floor_log2_abs()?;
        // radix >= 2 brackets the radix logarithm by the binary one;
        // invariant: radix^low <= magnitude < radix^(high + 1)
        let (mut low, mut high) = if log2 >= 0 { (0, log2) } else { (log2, -1) };
        while low < high {
            let middle = low + (high - low + 1) / 2;
            if R::from_ratio(radix_power(self.radix, middle)) <= magnitude {
                low = middle;
            } else {
                high = middle - 1;
            }
        }
        let exponent = low;
        let scale = radix_power(self.radix, exponent);
        let leading_digit = magnitude.mul_ratio(&scale.recip()).floor_integer();
        let leading = BigRational::from_integer(leading_digit.clone()) * scale;
        let residual = magnitude.add_ratio(&-leading);
        let residual = match sign {
            Sign::Positive => residual,
            Sign::Negative => residual.negated(),
        };
        Some(Normalized {
            sign,
            exponent,
            leading_digit: leading_digit
                .to_u32()
                .expect("leading digit is less than the radix"),
            residual,
        })
    }
    pub fn round_float<R: ExactReal>(self, rounding_mode: RoundingMode, value: &R) -> R {
        let Normalized {
            sign,
            exponent,
            leading_digit,
            residual,
        } = match self.normalize(value) {
            Some(normalized) => normalized,
            None => return R::from_ratio(BigRational::zero()),
        };
        let rounded_residual = self
            .fixed_at(exponent)
            .round_fixed(rounding_mode, &residual);
        let leading = BigRational::from_integer(BigInt::from(leading_digit))
            * radix_power(self.radix, exponent);
        rounded_residual.add_ratio(&apply_sign(sign, leading))
    }
    pub fn contains<R: ExactReal>(self, value: &R) -> bool {
        match self.normalize(value) {
            Some(normalized) => self.fixed_at(normalized.exponent).contains(value),
            None => false,
        }
    }
}

impl RoundToFormat for FloatFormat {
    fn round<R: ExactReal>(&self, rounding_mode: RoundingMode, value: &R) -> R {
        self.round_float(rounding_mode, value)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Classification {
    Fixed,
    FloatNormal,
    PositiveInfinity,
    NegativeInfinity,
}

impl Classification {
    #[inline]
    pub fn is_infinity(self) -> bool {
        match self {
            Classification::PositiveInfinity | Classification::NegativeInfinity => true,
            Classification::Fixed | Classification::FloatNormal => false,
        }
    }
    #[inline]
    pub fn is_finite(self) -> bool {
        !self.is_infinity()
    }
}

/// A fixed-point subnormal range below a floating-point normal range with
/// exponents in `min_exponent..=max_exponent`; magnitudes from
/// [`threshold`](Self::threshold) up stand for infinity.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct IeeeFormat {
    radix: u32,
    precision: u32,
    min_exponent: i64,
    max_exponent: i64,
}

impl IeeeFormat {
    pub fn new(
        radix: u32,
        precision: u32,
        min_exponent: i64,
        max_exponent: i64,
    ) -> Result<Self, InvalidFormatError> {
        check_radix_and_precision(radix, precision)?;
        check_exponent(min_exponent, precision)?;
        check_exponent(max_exponent, precision)?;
        if max_exponent < min_exponent {
            let error = InvalidFormatError::EmptyExponentRange {
                min_exponent,
                max_exponent,
            };
            debug!(min_exponent, max_exponent, %error, "rejected format");
            return Err(error);
        }
        Ok(Self {
            radix,
            precision,
            min_exponent,
            max_exponent,
        })
    }
    pub const fn binary16() -> Self {
        Self::standard_binary_unchecked(11, -14, 15)
    }
    pub const fn binary32() -> Self {
        Self::standard_binary_unchecked(24, -126, 127)
    }
    pub const fn binary64() -> Self {
        Self::standard_binary_unchecked(53, -1022, 1023)
    }
    pub const fn binary128() -> Self {
        Self::standard_binary_unchecked(113, -16382, 16383)
    }
    pub const fn decimal32() -> Self {
        Self::standard_decimal_unchecked(7, -95, 96)
    }
    pub const fn decimal64() -> Self {
        Self::standard_decimal_unchecked(16, -383, 384)
    }
    pub const fn decimal128() -> Self {
        Self::standard_decimal_unchecked(34, -6143, 6144)
    }
    const fn standard_binary_unchecked(
        precision: u32,
        min_exponent: i64,
        max_exponent: i64,
    ) -> Self {
        Self {
            radix: 2,
            precision,
            min_exponent,
            max_exponent,
        }
    }
    const fn standard_decimal_unchecked(
        precision: u32,
        min_exponent: i64,
        max_exponent: i64,
    ) -> Self {
        Self {
            radix: 10,
            precision,
            min_exponent,
            max_exponent,
        }
    }
    /// `width` is the interchange format's bit width
    pub fn standard_binary(width: usize) -> Option<Self> {
        match width {
            16 => Some(Self::binary16()),
            32 => Some(Self::binary32()),
            64 => Some(Self::binary64()),
            128 => Some(Self::binary128()),
            _ => None,
        }
    }
    #[inline]
    pub const fn radix(self) -> u32 {
        self.radix
    }
    #[inline]
    pub const fn precision(self) -> u32 {
        self.precision
    }
    #[inline]
    pub const fn min_exponent(self) -> i64 {
        self.min_exponent
    }
    #[inline]
    pub const fn max_exponent(self) -> i64 {
        self.max_exponent
    }
    #[inline]
    pub const fn fixed_view(self) -> FixedFormat {
        FixedFormat {
            radix: self.radix,
            precision: self.precision,
            min_exponent: self.min_exponent,
        }
    }
    #[inline]
    pub const fn float_view(self) -> FloatFormat {
        FloatFormat {
            radix: self.radix,
            precision: self.precision,
        }
    }
    pub fn epsilon(self) -> BigRational {
        self.float_view().epsilon()
    }
    fn max_exponent_ulp(self) -> BigRational {
        radix_power(self.radix, self.max_exponent - i64::from(self.precision) + 1)
    }
    pub fn max_finite(self) -> BigRational {
        FixedFormat {
            radix: self.radix,
            precision: self.precision,
            min_exponent: self.max_exponent,
        }
        .finite_boundary()
    }
    pub fn threshold(self) -> BigRational {
        self.max_finite() + self.max_exponent_ulp()
    }
    /// largest magnitude rounded by the subnormal grid
    pub fn finf(self) -> BigRational {
        self.fixed_view().finite_boundary()
    }
    pub fn min_positive_subnormal(self) -> BigRational {
        self.fixed_view().ulp()
    }
    pub fn min_positive_normal(self) -> BigRational {
        radix_power(self.radix, self.min_exponent)
    }
    pub fn round_ieee<R: ExactReal>(self, rounding_mode: RoundingMode, value: &R) -> R {
        let sign = match value.sign() {
            Some(sign) => sign,
            None => return R::from_ratio(BigRational::zero()),
        };
        let magnitude = value.abs_value();
        if magnitude <= R::from_ratio(self.finf()) {
            trace!(?rounding_mode, "rounding in the fixed regime");
            return self.fixed_view().round_fixed(rounding_mode, value);
        }
        if magnitude < R::from_ratio(self.threshold()) {
            trace!(?rounding_mode, "rounding in the float regime");
            return self.float_view().round_float(rounding_mode, value);
        }
        trace!(?rounding_mode, ?sign, "overflow");
        match (rounding_mode, sign) {
            (RoundingMode::ToNearest, _)
            | (RoundingMode::ToPositiveInfinity, Sign::Positive)
            | (RoundingMode::ToNegativeInfinity, Sign::Negative) => value.clone(),
            (RoundingMode::ToZero, _)
            | (RoundingMode::ToPositiveInfinity, Sign::Negative)
            | (RoundingMode::ToNegativeInfinity, Sign::Positive) => {
                R::from_ratio(apply_sign(sign, self.max_finite()))
            }
        }
    }
    /// [`round_ieee`](Self::round_ieee) along with the exceptions it raises
    pub fn round_with_status<R: ExactReal>(
        self,
        rounding_mode: RoundingMode,
        value: &R,
    ) -> (R, StatusFlags) {
        let result = self.round_ieee(rounding_mode, value);
        let mut status_flags = StatusFlags::empty();
        if self.classify(value).is_infinity() || self.classify(&result).is_infinity() {
            status_flags |= StatusFlags::OVERFLOW | StatusFlags::INEXACT;
        } else if result != *value {
            status_flags |= StatusFlags::INEXACT;
            if value.abs_value() < R::from_ratio(self.min_positive_normal()) {
                status_flags |= StatusFlags::UNDERFLOW;
            }
        }
        (result, status_flags)
    }
    /// `round(value) - value`, `None` if the result stands for an infinity
    pub fn rounding_error<R: ExactReal>(
        self,
        rounding_mode: RoundingMode,
        value: &R,
    ) -> Option<R> {
        let result = self.round_ieee(rounding_mode, value);
        if self.classify(&result).is_infinity() {
            None
        } else {
            Some(result.difference(value))
        }
    }
    pub fn is_positive_infinity<R: ExactReal>(self, value: &R) -> bool {
        R::from_ratio(self.threshold()) <= *value
    }
    pub fn is_negative_infinity<R: ExactReal>(self, value: &R) -> bool {
        *value <= R::from_ratio(-self.threshold())
    }
    pub fn classify<R: ExactReal>(self, value: &R) -> Classification {
        if self.is_positive_infinity(value) {
            Classification::PositiveInfinity
        } else if self.is_negative_infinity(value) {
            Classification::NegativeInfinity
        } else if value.abs_value() <= R::from_ratio(self.finf()) {
            Classification::Fixed
        } else {
            Classification::FloatNormal
        }
    }
    /// subnormals share `min_exponent`
    pub fn exponent_of<R: ExactReal>(self, value: &R) -> i64 {
        if value.abs_value() <= R::from_ratio(self.finf()) {
            return self.min_exponent;
        }
        self.float_view()
            .normalize(value)
            .map_or(self.min_exponent, |normalized| normalized.exponent)
    }
    pub fn ulp_of<R: ExactReal>(self, value: &R) -> BigRational {
        radix_power(
            self.radix,
            self.exponent_of(value) - i64::from(self.precision) + 1,
        )
    }
    pub fn is_representable<R: ExactReal>(self, value: &R) -> bool {
        match self.classify(value) {
            Classification::Fixed => self.fixed_view().contains(value),
            Classification::FloatNormal => {
                let float_view = self.float_view();
                let in_range = float_view.normalize(value).map_or(false, |normalized| {
                    self.min_exponent <= normalized.exponent
                        && normalized.exponent <= self.max_exponent
                });
                in_range && float_view.contains(value)
            }
            Classification::PositiveInfinity | Classification::NegativeInfinity => true,
        }
    }
}

impl RoundToFormat for IeeeFormat {
    fn round<R: ExactReal>(&self, rounding_mode: RoundingMode, value: &R) -> R {
        self.round_ieee(rounding_mode, value)
    }
}


macro_rules! doctest {
    ($x:expr) => {
        #[doc = $x]
        extern "C" {}
    };
}

doctest!(include_str!("../README.md"));
