//! Scalar traits for AD-generic numeric kernels.
//!
//! The special functions and samplers are written once as
//! `fn k<T: Scalar>(a: T) -> T`. Run on plain `f64` they compute values; run
//! on [`Dual<f64>`] seeded with [`Dual::variable`] they also return the
//! derivative with respect to that parameter.

use std::fmt::{Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

use crate::dual::Dual;

/// Marker trait for the primitive float type a [`Dual`] carries.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
}

impl Float for f64 {}

/// The numeric surface the generic kernels need.
///
/// Comparisons and branch decisions are always taken on [`value`](Scalar::value),
/// so a kernel follows the same path for `f64` and for `Dual<f64>`.
pub trait Scalar:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Lift a plain float (constant, zero derivative).
    fn from_f64(val: f64) -> Self;

    /// Extract the primal value.
    fn value(&self) -> f64;

    fn exp(self) -> Self;

    fn ln(self) -> Self;

    fn sqrt(self) -> Self;

    fn powi(self, n: i32) -> Self;
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(val: f64) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }
}

impl Scalar for Dual<f64> {
    #[inline]
    fn from_f64(val: f64) -> Self {
        Dual::constant(val)
    }

    #[inline]
    fn value(&self) -> f64 {
        self.re
    }

    #[inline]
    fn exp(self) -> Self {
        Dual::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        Dual::ln(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        Dual::sqrt(self)
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        Dual::powi(self, n)
    }
}
