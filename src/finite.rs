//! Central finite differences, with the call shape of
//! [`auto_diff`](crate::auto_diff).
//!
//! Used to check propagated Jacobians: the same user function runs here on
//! constant arguments only, once per perturbed entry.

use log::debug;

use crate::api::{Args, Differential, Inputs, Value};
use crate::error::{Error, Result};
use crate::numeric::{Matrix, Numeric};
use crate::session::{Config, Session};

/// Settings of the finite-difference checker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiniteDiffConfig {
    /// Absolute perturbation `h` applied to each entry.
    pub step: f64,
}

impl Default for FiniteDiffConfig {
    fn default() -> Self {
        FiniteDiffConfig { step: 1e-6 }
    }
}

/// Value of `f` at `at` and the central-difference Jacobian
/// `(f(x + h eₖ) - f(x - h eₖ)) / 2h` with respect to `wrt`.
pub fn finite_diff(
    f: impl Fn(&Args) -> Result<Numeric>,
    at: &Inputs,
    wrt: Option<&[&str]>,
) -> Result<Differential> {
    finite_diff_with(&FiniteDiffConfig::default(), f, at, wrt)
}

/// [`finite_diff`] with an explicit step.
pub fn finite_diff_with(
    config: &FiniteDiffConfig,
    f: impl Fn(&Args) -> Result<Numeric>,
    at: &Inputs,
    wrt: Option<&[&str]>,
) -> Result<Differential> {
    let h = config.step;
    if !(h > 0.0 && h.is_finite()) {
        return Err(Error::Configuration(format!(
            "finite difference step must be positive and finite, got {}",
            h
        )));
    }
    let session = Session::plan(at, wrt, &Config::default())?;
    let args = Args::constants(at);
    let value = f(&args)?.into_value();
    let mut derivative = Matrix::zeros(value.len(), session.width());

    let evaluate = |name: &str, point: Matrix| -> Result<Matrix> {
        let mut shifted = args.clone();
        shifted.replace_numeric(name, Numeric::Constant(point));
        let out = f(&shifted)?.into_value();
        if out.shape() != value.shape() {
            return Err(Error::dimension("finite_diff", value.shape(), out.shape()));
        }
        Ok(out)
    };

    for target in session.targets() {
        let Some(Value::Numeric(x)) = at.get(&target.name) else {
            continue;
        };
        for k in 0..target.len {
            let mut plus = x.clone();
            plus[k] += h;
            let mut minus = x.clone();
            minus[k] -= h;
            let diff = (evaluate(&target.name, plus)? - evaluate(&target.name, minus)?) / (2.0 * h);
            derivative
                .column_mut(target.offset + k)
                .copy_from_slice(diff.as_slice());
        }
    }
    debug!(
        "finite_diff output {:?}, width {}, step {}",
        value.shape(),
        session.width(),
        h
    );
    Ok(Differential { value, derivative })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadratic_jacobian() {
        let at = Inputs::new().with("x", Matrix::from_column_slice(2, 1, &[1.0, 3.0]));
        let out = finite_diff(|a| a.get("x")?.mul(a.get("x")?), &at, None).unwrap();
        assert_relative_eq!(out.derivative[(0, 0)], 2.0, epsilon = 1e-6);
        assert_relative_eq!(out.derivative[(1, 1)], 6.0, epsilon = 1e-6);
        assert_relative_eq!(out.derivative[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn bad_step_rejected() {
        let at = Inputs::new().with("x", 1.0);
        let config = FiniteDiffConfig { step: 0.0 };
        let err = finite_diff_with(&config, |a| Ok(a.get("x")?.clone()), &at, None).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
