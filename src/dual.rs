use std::fmt::{self, Display};

use crate::scalar::Float;

/// Scalar forward-mode dual number: a value paired with one tangent.
///
/// `Dual { re, eps }` represents `re + eps·ε` where `ε² = 0`. Matrix
/// functions use [`DualMatrix`](crate::DualMatrix); this scalar form drives
/// the special-function and sampler kernels when a derivative with respect
/// to a single distribution parameter is needed.
///
/// The primal part of every operation is computed exactly as the plain
/// float operation would be, so a kernel evaluated on `Dual` reproduces its
/// `f64` values bit for bit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Dual<F: Float> {
    /// Primal (real) value.
    pub re: F,
    /// Tangent (derivative) value.
    pub eps: F,
}

impl<F: Float> Display for Dual<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl<F: Float> Dual<F> {
    /// Create a new dual number.
    #[inline]
    pub fn new(re: F, eps: F) -> Self {
        Dual { re, eps }
    }

    /// Create a constant (zero derivative).
    #[inline]
    pub fn constant(re: F) -> Self {
        Dual { re, eps: F::zero() }
    }

    /// Create a variable (unit derivative) for differentiation.
    #[inline]
    pub fn variable(re: F) -> Self {
        Dual { re, eps: F::one() }
    }

    /// Apply the chain rule: given `f(self.re)` and `f'(self.re)`, produce the dual result.
    #[inline]
    fn chain(self, f_val: F, f_deriv: F) -> Self {
        Dual {
            re: f_val,
            eps: self.eps * f_deriv,
        }
    }

    // ── Powers ──

    #[inline]
    pub fn recip(self) -> Self {
        let inv = F::one() / self.re;
        self.chain(inv, -inv * inv)
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        let two = F::one() + F::one();
        self.chain(s, F::one() / (two * s))
    }

    #[inline]
    pub fn powi(self, n: i32) -> Self {
        let val = self.re.powi(n);
        let deriv = F::from_i32(n).unwrap_or_else(F::nan) * self.re.powi(n - 1);
        self.chain(val, deriv)
    }

    #[inline]
    pub fn powf(self, n: Self) -> Self {
        // d/dx (x^y) = y * x^(y-1) * dx + x^y * ln(x) * dy
        let val = self.re.powf(n.re);
        Dual {
            re: val,
            eps: val * (n.re * self.eps / self.re + n.eps * self.re.ln()),
        }
    }

    // ── Exp/Log ──

    #[inline]
    pub fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e)
    }

    #[inline]
    pub fn ln(self) -> Self {
        self.chain(self.re.ln(), F::one() / self.re)
    }

    // ── Misc ──

    /// Absolute value; the derivative at zero is taken as zero.
    #[inline]
    pub fn abs(self) -> Self {
        let slope = if self.re == F::zero() { F::zero() } else { self.re.signum() };
        self.chain(self.re.abs(), slope)
    }
}
