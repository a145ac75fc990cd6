//! Piecewise-constant maps. The value is transformed as usual; the
//! derivative is zero everywhere, including at the jumps, and the result
//! stays dual so its width is kept.

use crate::numeric::{DualMatrix, Numeric};
use crate::sparse::Derivative;

impl Numeric {
    fn piecewise_constant(&self, f: impl Fn(f64) -> f64) -> Numeric {
        let value = self.value().map(f);
        match self {
            Numeric::Constant(_) => Numeric::Constant(value),
            Numeric::Dual(d) => {
                let derivative = Derivative::zeros(value.len(), d.width());
                Numeric::Dual(DualMatrix::from_parts(value, derivative))
            }
        }
    }

    /// Round to `digits` decimal places, halves away from zero. Negative
    /// `digits` round to tens, hundreds and so on.
    ///
    /// Entries with no fractional part at the requested precision (including
    /// every entry once `10^digits` overflows) are returned unchanged.
    pub fn round(&self, digits: i32) -> Numeric {
        self.piecewise_constant(|x| round_to(x, digits))
    }

    pub fn floor(&self) -> Numeric {
        self.piecewise_constant(f64::floor)
    }

    pub fn ceil(&self) -> Numeric {
        self.piecewise_constant(f64::ceil)
    }

    pub fn trunc(&self) -> Numeric {
        self.piecewise_constant(f64::trunc)
    }

    /// Sign of each entry (`0` stays `0`).
    pub fn signum(&self) -> Numeric {
        self.piecewise_constant(|x| if x == 0.0 { 0.0 } else { x.signum() })
    }
}

/// Above this magnitude every `f64` is an integer.
const INTEGRAL_ABOVE: f64 = 4_503_599_627_370_496.0;

fn round_to(x: f64, digits: i32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    if digits >= 0 {
        let factor = 10f64.powi(digits);
        let scaled = x * factor;
        if !factor.is_finite() || !scaled.is_finite() || scaled.abs() >= INTEGRAL_ABOVE {
            return x;
        }
        scaled.round() / factor
    } else {
        let factor = 10f64.powi(digits.saturating_neg());
        if !factor.is_finite() {
            return 0.0;
        }
        (x / factor).round() * factor
    }
}
