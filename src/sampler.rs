//! Reparameterized random variates.
//!
//! Each draw is a deterministic function of the distribution parameters and
//! of randomness that does not depend on them, so a simulation run under
//! [`auto_diff`](crate::auto_diff) carries exact derivatives of its draws
//! with respect to the parameters. The gamma sampler is the primitive; the
//! chi-squared, inverse gamma, beta and Wishart samplers are built from it
//! with ordinary [`Numeric`] operations.

use std::fmt;
use std::str::FromStr;

use log::trace;
use rand::distr::Open01;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::dual::Dual;
use crate::error::{Error, Result};
use crate::numeric::{Matrix, Numeric};
use crate::rules::{common_width, expand_derivative, Propagation};
use crate::scalar::Scalar;
use crate::special;

/// How gamma variates are generated.
///
/// Both methods draw from the same distribution. `Native` is faster but its
/// draws jump when the shape crosses `1` (the small-shape boost switches
/// on), so derivatives with respect to the shape are only piecewise smooth.
/// `InverseTransform` inverts the distribution function of a single uniform
/// and is smooth in the shape everywhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GammaMethod {
    /// Marsaglia–Tsang rejection sampling.
    #[default]
    Native,
    /// `x = scale · Q(u; shape)` with `u ~ U(0, 1)`.
    InverseTransform,
}

impl fmt::Display for GammaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GammaMethod::Native => f.write_str("native"),
            GammaMethod::InverseTransform => f.write_str("inverse_transform"),
        }
    }
}

impl FromStr for GammaMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "native" => Ok(GammaMethod::Native),
            "inverse_transform" | "inv_tf" => Ok(GammaMethod::InverseTransform),
            other => Err(Error::Configuration(format!(
                "unknown gamma sampling method '{}' (expected 'native', 'inverse_transform' or 'inv_tf')",
                other
            ))),
        }
    }
}

/// One unit-scale Marsaglia–Tsang draw.
///
/// Accept/reject decisions use primal values only, so `f64` and
/// `Dual<f64>` runs consume the same randomness and return the same value.
fn marsaglia_tsang<S: Scalar, R: Rng + ?Sized>(rng: &mut R, shape: S) -> S {
    if shape.value() < 1.0 {
        // G(a) = G(a + 1) · U^{1/a}
        let boosted = marsaglia_tsang(rng, shape + S::from_f64(1.0));
        let u: f64 = rng.sample(Open01);
        return boosted * (S::from_f64(u.ln()) / shape).exp();
    }
    let d = shape - S::from_f64(1.0 / 3.0);
    let c = S::from_f64(1.0) / (S::from_f64(9.0) * d).sqrt();
    loop {
        let z: f64 = rng.sample(StandardNormal);
        let v = S::from_f64(1.0) + c * S::from_f64(z);
        if v.value() <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u: f64 = rng.sample(Open01);
        let (dv, vv) = (d.value(), v.value());
        let z2 = z * z;
        if u < 1.0 - 0.0331 * z2 * z2 || u.ln() < 0.5 * z2 + dv * (1.0 - vv + vv.ln()) {
            return d * v;
        }
    }
}

/// One unit-scale draw and its derivative with respect to the shape.
fn unit_gamma<R: Rng + ?Sized>(rng: &mut R, shape: f64, method: GammaMethod) -> (f64, f64) {
    match method {
        GammaMethod::Native => {
            let x = marsaglia_tsang(rng, Dual::variable(shape));
            (x.re, x.eps)
        }
        GammaMethod::InverseTransform => {
            let u: f64 = rng.sample(Open01);
            let x = special::gamma_quantile(u, shape);
            // Implicit differentiation of P(shape, x) = u.
            let dx = -special::gamma_p_shape_derivative(shape, x) / special::gamma_density(x, shape);
            (x, dx)
        }
    }
}

fn validate(n: usize, shape: f64, scale: f64) -> Result<()> {
    if n == 0 {
        return Err(Error::Configuration("sample size must be at least 1".to_string()));
    }
    if !(shape > 0.0 && shape.is_finite()) {
        return Err(Error::Configuration(format!(
            "gamma shape must be positive and finite, got {}",
            shape
        )));
    }
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(Error::Configuration(format!(
            "gamma scale must be positive and finite, got {}",
            scale
        )));
    }
    Ok(())
}

/// `n` draws from `Gamma(shape, scale)` (mean `shape · scale`).
pub fn sample_gamma<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    shape: f64,
    scale: f64,
    method: GammaMethod,
) -> Result<Vec<f64>> {
    validate(n, shape, scale)?;
    trace!("sampling {} gamma({}, {}) variates, {}", n, shape, scale, method);
    let draws = (0..n)
        .map(|_| match method {
            GammaMethod::Native => scale * marsaglia_tsang(rng, shape),
            GammaMethod::InverseTransform => {
                let u: f64 = rng.sample(Open01);
                scale * special::gamma_quantile(u, shape)
            }
        })
        .collect();
    Ok(draws)
}

fn scalar_param(op: &'static str, p: &Numeric) -> Result<f64> {
    match p.shape() {
        (1, 1) => Ok(p.value()[(0, 0)]),
        shape => Err(Error::dimension(op, shape, (1, 1))),
    }
}

/// `n` gamma draws as an `n × 1` column, differentiable in `shape` and
/// `scale` (both 1×1).
///
/// For the same RNG state the values equal those of [`sample_gamma`].
pub fn gamma<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    shape: &Numeric,
    scale: &Numeric,
    method: GammaMethod,
) -> Result<Numeric> {
    let a = scalar_param("gamma", shape)?;
    let s = scalar_param("gamma", scale)?;
    validate(n, a, s)?;
    common_width("gamma", &[shape, scale])?;
    trace!("sampling {} gamma({}, {}) variates, {}", n, a, s, method);

    let mut unit = Vec::with_capacity(n);
    let mut d_shape = Vec::with_capacity(n);
    for _ in 0..n {
        let (x, dx) = unit_gamma(rng, a, method);
        unit.push(x);
        d_shape.push(s * dx);
    }
    let value = Matrix::from_iterator(n, 1, unit.iter().map(|x| s * x));

    let mut prop = Propagation::new("gamma", value);
    if let Some(d) = shape.derivative() {
        prop.push(expand_derivative(d, n).scale_rows(&d_shape))?;
    }
    if let Some(d) = scale.derivative() {
        prop.push(expand_derivative(d, n).scale_rows(&unit))?;
    }
    Ok(prop.finish())
}

/// `n` draws from `χ²(df) = Gamma(df / 2, 2)`.
pub fn chi_squared<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    df: &Numeric,
    method: GammaMethod,
) -> Result<Numeric> {
    gamma(rng, n, &df.scale(0.5), &Numeric::scalar(2.0), method)
}

/// `n` draws from the inverse gamma distribution: `scale / G`, `G ~ Gamma(shape, 1)`.
pub fn inverse_gamma<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    shape: &Numeric,
    scale: &Numeric,
    method: GammaMethod,
) -> Result<Numeric> {
    scalar_param("inverse_gamma", scale)?;
    let g = gamma(rng, n, shape, &Numeric::scalar(1.0), method)?;
    g.recip().mul(scale)
}

/// `n` draws from `Beta(a, b)` as `X / (X + Y)` with independent unit-scale
/// gamma variates `X ~ Gamma(a)`, `Y ~ Gamma(b)`.
pub fn beta<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    a: &Numeric,
    b: &Numeric,
    method: GammaMethod,
) -> Result<Numeric> {
    let one = Numeric::scalar(1.0);
    let x = gamma(rng, n, a, &one, method)?;
    let y = gamma(rng, n, b, &one, method)?;
    x.div(&x.add(&y)?)
}

/// `n` draws from `N(mean, sd²)` as `mean + sd · z`.
///
/// `z` comes from the standard normal sampler (`Native`) or from the normal
/// quantile of a uniform (`InverseTransform`).
pub fn normal<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    mean: &Numeric,
    sd: &Numeric,
    method: GammaMethod,
) -> Result<Numeric> {
    scalar_param("normal", mean)?;
    let sigma = scalar_param("normal", sd)?;
    if n == 0 {
        return Err(Error::Configuration("sample size must be at least 1".to_string()));
    }
    if !(sigma > 0.0 && sigma.is_finite()) {
        return Err(Error::Configuration(format!(
            "normal standard deviation must be positive and finite, got {}",
            sigma
        )));
    }
    let z = Matrix::from_fn(n, 1, |_, _| match method {
        GammaMethod::Native => rng.sample(StandardNormal),
        GammaMethod::InverseTransform => special::normal_quantile(rng.sample(Open01)),
    });
    Numeric::Constant(z).mul(sd)?.add(mean)
}

/// One draw from `Wishart(df, scale)` by the Bartlett decomposition.
///
/// With `scale = L Lᵀ` and `A` lower triangular holding `√χ²(df - i)` on the
/// diagonal and standard normals below it, the draw is `(L A)(L A)ᵀ`.
/// Requires a `p × p` positive definite `scale` and `df > p - 1`.
pub fn wishart<R: Rng + ?Sized>(
    rng: &mut R,
    df: &Numeric,
    scale: &Numeric,
    method: GammaMethod,
) -> Result<Numeric> {
    let nu = scalar_param("wishart", df)?;
    let (p, q) = scale.shape();
    if p != q {
        return Err(Error::dimension("wishart", (p, q), (p, p)));
    }
    if !(nu > p as f64 - 1.0) {
        return Err(Error::Configuration(format!(
            "wishart degrees of freedom must exceed {}, got {}",
            p as f64 - 1.0,
            nu
        )));
    }
    let l = scale.cholesky()?;
    let (zero, one) = (Numeric::scalar(0.0), Numeric::scalar(1.0));

    let mut entries = Vec::with_capacity(p * p);
    for j in 0..p {
        for i in 0..p {
            let entry = if i == j {
                chi_squared(rng, 1, &df.shift(-(i as f64)), method)?.sqrt()
            } else if i > j {
                normal(rng, 1, &zero, &one, method)?
            } else {
                zero.clone()
            };
            entries.push(entry);
        }
    }
    let a = Numeric::from_entries(p, p, &entries)?;
    let la = l.matmul(&a)?;
    la.tcrossprod(&la)
}
