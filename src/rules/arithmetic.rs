//! Sums, differences and elementwise products/quotients, with 1×1
//! broadcasting.

use super::{broadcast_shape, expand_derivative, expand_value, Propagation};
use crate::error::Result;
use crate::numeric::{Matrix, Numeric};

impl Numeric {
    /// `A + B`.
    pub fn add(&self, rhs: &Numeric) -> Result<Numeric> {
        self.add_signed("add", rhs, 1.0)
    }

    /// `A - B`.
    pub fn sub(&self, rhs: &Numeric) -> Result<Numeric> {
        self.add_signed("sub", rhs, -1.0)
    }

    fn add_signed(&self, op: &'static str, rhs: &Numeric, sign: f64) -> Result<Numeric> {
        let shape = broadcast_shape(op, self, rhs)?;
        let a = expand_value(self, shape);
        let b = expand_value(rhs, shape);
        let value = if sign > 0.0 { &*a + &*b } else { &*a - &*b };
        let len = value.len();

        let mut prop = Propagation::new(op, value);
        if let Some(da) = self.derivative() {
            prop.push(expand_derivative(da, len).into_owned())?;
        }
        if let Some(db) = rhs.derivative() {
            let db = expand_derivative(db, len);
            prop.push(if sign > 0.0 { db.into_owned() } else { db.neg() })?;
        }
        Ok(prop.finish())
    }

    /// Elementwise (Hadamard) product `A ∘ B`.
    ///
    /// `d vec(A ∘ B) = diag(vec B) dA + diag(vec A) dB`.
    pub fn mul(&self, rhs: &Numeric) -> Result<Numeric> {
        let shape = broadcast_shape("mul", self, rhs)?;
        let a = expand_value(self, shape);
        let b = expand_value(rhs, shape);
        let value = a.component_mul(&b);
        let len = value.len();

        let mut prop = Propagation::new("mul", value);
        if let Some(da) = self.derivative() {
            prop.push(expand_derivative(da, len).scale_rows(b.as_slice()))?;
        }
        if let Some(db) = rhs.derivative() {
            prop.push(expand_derivative(db, len).scale_rows(a.as_slice()))?;
        }
        Ok(prop.finish())
    }

    /// Elementwise quotient `A / B`.
    pub fn div(&self, rhs: &Numeric) -> Result<Numeric> {
        let shape = broadcast_shape("div", self, rhs)?;
        let a = expand_value(self, shape);
        let b = expand_value(rhs, shape);
        let value = a.zip_map(&b, |x, y| x / y);
        let len = value.len();

        let mut prop = Propagation::new("div", value);
        if let Some(da) = self.derivative() {
            let w: Vec<f64> = b.iter().map(|y| 1.0 / y).collect();
            prop.push(expand_derivative(da, len).scale_rows(&w))?;
        }
        if let Some(db) = rhs.derivative() {
            let w: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| -x / (y * y)).collect();
            prop.push(expand_derivative(db, len).scale_rows(&w))?;
        }
        Ok(prop.finish())
    }

    /// Elementwise power `A ^ B` with a numeric exponent.
    ///
    /// `d(A^B) = diag(B A^(B-1)) dA + diag(A^B ln A) dB`.
    pub fn pow(&self, rhs: &Numeric) -> Result<Numeric> {
        let shape = broadcast_shape("pow", self, rhs)?;
        let a = expand_value(self, shape);
        let b = expand_value(rhs, shape);
        let value = a.zip_map(&b, f64::powf);
        let len = value.len();

        let mut prop = Propagation::new("pow", value.clone());
        if let Some(da) = self.derivative() {
            let w: Vec<f64> = a.iter().zip(b.iter()).map(|(x, p)| p * x.powf(p - 1.0)).collect();
            prop.push(expand_derivative(da, len).scale_rows(&w))?;
        }
        if let Some(db) = rhs.derivative() {
            let w: Vec<f64> = value.iter().zip(a.iter()).map(|(v, x)| v * x.ln()).collect();
            prop.push(expand_derivative(db, len).scale_rows(&w))?;
        }
        Ok(prop.finish())
    }

    /// Elementwise power with a constant exponent.
    pub fn powf(&self, p: f64) -> Numeric {
        self.elementwise(|x| x.powf(p), |x| p * x.powf(p - 1.0))
    }

    /// `s · A`.
    pub fn scale(&self, s: f64) -> Numeric {
        let value = self.value() * s;
        match self {
            Numeric::Constant(_) => Numeric::Constant(value),
            Numeric::Dual(d) => {
                Propagation::single("scale", value, d.derivative().scale(s)).finish_structural()
            }
        }
    }

    /// `A + s` entrywise.
    pub fn shift(&self, s: f64) -> Numeric {
        let value = self.value().add_scalar(s);
        match self {
            Numeric::Constant(_) => Numeric::Constant(value),
            Numeric::Dual(d) => {
                Propagation::single("shift", value, d.derivative().clone()).finish_structural()
            }
        }
    }

    /// `-A`.
    pub fn neg(&self) -> Numeric {
        self.scale(-1.0)
    }

    /// A constant of the same shape filled with `x`.
    pub fn filled_like(&self, x: f64) -> Numeric {
        let (r, c) = self.shape();
        Numeric::Constant(Matrix::from_element(r, c, x))
    }
}
