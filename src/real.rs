// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! Exact real numbers as consumed and produced by the rounding functions.

use crate::Sign;
use algebraics::prelude::*;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::One;
use num_traits::Signed;
use num_traits::ToPrimitive;
use num_traits::Zero;
use std::cmp::Ordering;

/// An exact real number.
///
/// Rounding never goes through a hardware float: every comparison against a
/// format boundary is decided exactly. Results of rounding onto a grid are
/// always rational, so implementors only need to interoperate with
/// [`BigRational`].
pub trait ExactReal: Clone + Ord {
    fn from_ratio(value: BigRational) -> Self;
    /// `floor(log2(|self|))`, or `None` if `self` is zero.
    fn floor_log2_abs(&self) -> Option<i64>;
    fn floor_integer(&self) -> BigInt;
    fn mul_ratio(&self, factor: &BigRational) -> Self;
    fn add_ratio(&self, rhs: &BigRational) -> Self;
    fn difference(&self, rhs: &Self) -> Self;

    /// `None` for zero.
    fn sign(&self) -> Option<Sign> {
        match self.cmp(&Self::from_ratio(BigRational::zero())) {
            Ordering::Less => Some(Sign::Negative),
            Ordering::Equal => None,
            Ordering::Greater => Some(Sign::Positive),
        }
    }
    fn negated(&self) -> Self {
        self.mul_ratio(&-BigRational::one())
    }
    fn abs_value(&self) -> Self {
        match self.sign() {
            Some(Sign::Negative) => self.negated(),
            _ => self.clone(),
        }
    }
}

impl ExactReal for BigRational {
    fn from_ratio(value: BigRational) -> Self {
        value
    }
    fn floor_log2_abs(&self) -> Option<i64> {
        if Zero::is_zero(self) {
            return None;
        }
        let numer = self.numer().abs();
        let denom = self.denom();
        // 2^(n-1) <= numer < 2^n and 2^(d-1) <= denom < 2^d, so the answer is n-d or n-d-1
        let guess = numer.bits().to_i64().expect("bit length doesn't fit in i64")
            - denom.bits().to_i64().expect("bit length doesn't fit in i64");
        let at_least_guess = if guess < 0 {
            let shift = (-guess).to_usize().expect("shift doesn't fit in usize");
            numer << shift >= *denom
        } else {
            let shift = guess.to_usize().expect("shift doesn't fit in usize");
            numer >= denom << shift
        };
        if at_least_guess {
            Some(guess)
        } else {
            Some(guess - 1)
        }
    }
    fn floor_integer(&self) -> BigInt {
        self.floor().to_integer()
    }
    fn mul_ratio(&self, factor: &BigRational) -> Self {
        self * factor
    }
    fn add_ratio(&self, rhs: &BigRational) -> Self {
        self + rhs
    }
    fn difference(&self, rhs: &Self) -> Self {
        self - rhs
    }
}

impl ExactReal for RealAlgebraicNumber {
    fn from_ratio(value: BigRational) -> Self {
        RealAlgebraicNumber::from(value)
    }
    fn floor_log2_abs(&self) -> Option<i64> {
        self.abs().checked_floor_log2()
    }
    fn floor_integer(&self) -> BigInt {
        self.to_integer_floor()
    }
    fn mul_ratio(&self, factor: &BigRational) -> Self {
        self.clone() * RealAlgebraicNumber::from(factor.clone())
    }
    fn add_ratio(&self, rhs: &BigRational) -> Self {
        self.clone() + RealAlgebraicNumber::from(rhs.clone())
    }
    fn difference(&self, rhs: &Self) -> Self {
        self.clone() - rhs.clone()
    }
}

/// `radix^exponent`, exact for negative exponents too.
pub fn radix_power(radix: u32, exponent: i64) -> BigRational {
    let magnitude = num_traits::pow(
        BigInt::from(radix),
        exponent
            .unsigned_abs()
            .to_usize()
            .expect("exponent doesn't fit in usize"),
    );
    if exponent < 0 {
        BigRational::new(BigInt::one(), magnitude)
    } else {
        BigRational::from_integer(magnitude)
    }
}
