//! Elementwise maps. The Jacobian factor is `diag(f'(vec A))`, applied as a
//! row scaling so sparse derivatives stay sparse.

use super::Propagation;
use crate::numeric::Numeric;
use crate::special;

impl Numeric {
    /// Apply `f` entrywise, with derivative `df`.
    pub(crate) fn elementwise(&self, f: impl Fn(f64) -> f64, df: impl Fn(f64) -> f64) -> Numeric {
        let x = self.value();
        let value = x.map(&f);
        match self {
            Numeric::Constant(_) => Numeric::Constant(value),
            Numeric::Dual(d) => {
                let weights: Vec<f64> = x.iter().map(|&v| df(v)).collect();
                Propagation::single("elementwise", value, d.derivative().scale_rows(&weights))
                    .finish_structural()
            }
        }
    }

    pub fn exp(&self) -> Numeric {
        self.elementwise(f64::exp, f64::exp)
    }

    /// Natural logarithm.
    pub fn ln(&self) -> Numeric {
        self.elementwise(f64::ln, f64::recip)
    }

    pub fn sqrt(&self) -> Numeric {
        self.elementwise(f64::sqrt, |x| 0.5 / x.sqrt())
    }

    pub fn powi(&self, n: i32) -> Numeric {
        self.elementwise(|x| x.powi(n), |x| f64::from(n) * x.powi(n - 1))
    }

    /// Entrywise `1 / x`.
    pub fn recip(&self) -> Numeric {
        self.elementwise(f64::recip, |x| -1.0 / (x * x))
    }

    pub fn sin(&self) -> Numeric {
        self.elementwise(f64::sin, f64::cos)
    }

    pub fn cos(&self) -> Numeric {
        self.elementwise(f64::cos, |x| -x.sin())
    }

    pub fn tan(&self) -> Numeric {
        self.elementwise(f64::tan, |x| {
            let c = x.cos();
            1.0 / (c * c)
        })
    }

    pub fn sinh(&self) -> Numeric {
        self.elementwise(f64::sinh, f64::cosh)
    }

    pub fn cosh(&self) -> Numeric {
        self.elementwise(f64::cosh, f64::sinh)
    }

    pub fn tanh(&self) -> Numeric {
        self.elementwise(f64::tanh, |x| {
            let t = x.tanh();
            1.0 - t * t
        })
    }

    /// Absolute value; the derivative at zero is taken as zero.
    pub fn abs(&self) -> Numeric {
        self.elementwise(f64::abs, |x| if x == 0.0 { 0.0 } else { x.signum() })
    }

    /// Entrywise `ln Γ(x)`, derivative the digamma function.
    pub fn ln_gamma(&self) -> Numeric {
        self.elementwise(special::ln_gamma::<f64>, special::digamma)
    }

    /// Entrywise `1 / (1 + e^{-x})`.
    pub fn logistic(&self) -> Numeric {
        fn sigma(x: f64) -> f64 {
            1.0 / (1.0 + (-x).exp())
        }
        self.elementwise(sigma, |x| {
            let s = sigma(x);
            s * (1.0 - s)
        })
    }
}
