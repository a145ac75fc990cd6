use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::dual::Dual;
use crate::error::Result;
use crate::numeric::Numeric;
use crate::scalar::Float;

// ──────────────────────────────────────────────
//  Dual<F> operators
// ──────────────────────────────────────────────

impl<F: Float> Add for Dual<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Dual {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl<F: Float> Sub for Dual<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Dual {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl<F: Float> Mul for Dual<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Dual {
            re: self.re * rhs.re,
            eps: self.re * rhs.eps + self.eps * rhs.re,
        }
    }
}

impl<F: Float> Div for Dual<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        // Primal is a true quotient, not a product with the reciprocal.
        let inv = F::one() / rhs.re;
        Dual {
            re: self.re / rhs.re,
            eps: (self.eps * rhs.re - self.re * rhs.eps) * inv * inv,
        }
    }
}

impl<F: Float> Neg for Dual<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Dual {
            re: -self.re,
            eps: -self.eps,
        }
    }
}

impl<F: Float> AddAssign for Dual<F> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<F: Float> SubAssign for Dual<F> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<F: Float> MulAssign for Dual<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<F: Float> DivAssign for Dual<F> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

// Mixed ops: Dual<F> with primitive floats.
macro_rules! impl_dual_scalar_ops {
    ($f:ty) => {
        impl Add<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn add(self, rhs: $f) -> Dual<$f> {
                Dual {
                    re: self.re + rhs,
                    eps: self.eps,
                }
            }
        }

        impl Add<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn add(self, rhs: Dual<$f>) -> Dual<$f> {
                Dual {
                    re: self + rhs.re,
                    eps: rhs.eps,
                }
            }
        }

        impl Sub<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn sub(self, rhs: $f) -> Dual<$f> {
                Dual {
                    re: self.re - rhs,
                    eps: self.eps,
                }
            }
        }

        impl Sub<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn sub(self, rhs: Dual<$f>) -> Dual<$f> {
                Dual {
                    re: self - rhs.re,
                    eps: -rhs.eps,
                }
            }
        }

        impl Mul<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn mul(self, rhs: $f) -> Dual<$f> {
                Dual {
                    re: self.re * rhs,
                    eps: self.eps * rhs,
                }
            }
        }

        impl Mul<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn mul(self, rhs: Dual<$f>) -> Dual<$f> {
                Dual {
                    re: self * rhs.re,
                    eps: self * rhs.eps,
                }
            }
        }

        impl Div<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn div(self, rhs: $f) -> Dual<$f> {
                Dual {
                    re: self.re / rhs,
                    eps: self.eps / rhs,
                }
            }
        }

        impl Div<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn div(self, rhs: Dual<$f>) -> Dual<$f> {
                let inv = 1.0 / rhs.re;
                Dual {
                    re: self / rhs.re,
                    eps: -self * rhs.eps * inv * inv,
                }
            }
        }
    };
}

impl_dual_scalar_ops!(f64);

// ──────────────────────────────────────────────
//  Numeric operators
// ──────────────────────────────────────────────
//
// Binary operators between operands check shapes, so they yield
// `Result<Numeric>`. `*` is the elementwise product; the matrix product is
// `Numeric::matmul`.

macro_rules! impl_numeric_binary {
    ($trait:ident, $method:ident) => {
        impl<'a> $trait<&'a Numeric> for &'a Numeric {
            type Output = Result<Numeric>;
            #[inline]
            fn $method(self, rhs: &'a Numeric) -> Result<Numeric> {
                Numeric::$method(self, rhs)
            }
        }
    };
}

impl_numeric_binary!(Add, add);
impl_numeric_binary!(Sub, sub);
impl_numeric_binary!(Mul, mul);
impl_numeric_binary!(Div, div);

impl Neg for &Numeric {
    type Output = Numeric;
    #[inline]
    fn neg(self) -> Numeric {
        Numeric::neg(self)
    }
}

impl Neg for Numeric {
    type Output = Numeric;
    #[inline]
    fn neg(self) -> Numeric {
        Numeric::neg(&self)
    }
}

impl Add<f64> for &Numeric {
    type Output = Numeric;
    #[inline]
    fn add(self, rhs: f64) -> Numeric {
        self.shift(rhs)
    }
}

impl Sub<f64> for &Numeric {
    type Output = Numeric;
    #[inline]
    fn sub(self, rhs: f64) -> Numeric {
        self.shift(-rhs)
    }
}

impl Mul<f64> for &Numeric {
    type Output = Numeric;
    #[inline]
    fn mul(self, rhs: f64) -> Numeric {
        self.scale(rhs)
    }
}

impl Mul<&Numeric> for f64 {
    type Output = Numeric;
    #[inline]
    fn mul(self, rhs: &Numeric) -> Numeric {
        rhs.scale(self)
    }
}

impl Div<f64> for &Numeric {
    type Output = Numeric;
    #[inline]
    fn div(self, rhs: f64) -> Numeric {
        self.scale(1.0 / rhs)
    }
}
