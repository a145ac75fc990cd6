use approx::assert_relative_eq;
use matdual::sampler::{self, GammaMethod};
use matdual::special::gamma_p;
use matdual::{
    auto_diff, finite_diff_with, sample_gamma, Args, FiniteDiffConfig, Inputs, Matrix, Numeric,
    Result,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const METHODS: [GammaMethod; 2] = [GammaMethod::Native, GammaMethod::InverseTransform];

/// Propagated Jacobian against central differences with step `h`.
fn check(f: impl Fn(&Args) -> Result<Numeric>, at: &Inputs, h: f64, tol: f64) {
    let ad = auto_diff(&f, at, None).unwrap();
    let fd = finite_diff_with(&FiniteDiffConfig { step: h }, &f, at, None).unwrap();
    assert_eq!(ad.value, fd.value);
    for (a, r) in ad.derivative.iter().zip(fd.derivative.iter()) {
        assert!(
            (a - r).abs() <= tol * r.abs().max(1.0),
            "ad {} vs fd {}",
            a,
            r
        );
    }
}

fn sorted(mut xs: Vec<f64>) -> Vec<f64> {
    xs.sort_by(f64::total_cmp);
    xs
}

/// Largest gap between the empirical distribution of `xs` and `cdf`.
fn ks_statistic(xs: &[f64], cdf: impl Fn(f64) -> f64) -> f64 {
    let n = xs.len() as f64;
    sorted(xs.to_vec())
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let p = cdf(x);
            (p - i as f64 / n).abs().max((p - (i + 1) as f64 / n).abs())
        })
        .fold(0.0, f64::max)
}

/// Largest gap between two empirical distributions.
fn ks_two_sample(xs: &[f64], ys: &[f64]) -> f64 {
    let (xs, ys) = (sorted(xs.to_vec()), sorted(ys.to_vec()));
    let (n, m) = (xs.len() as f64, ys.len() as f64);
    let (mut i, mut j, mut gap) = (0, 0, 0.0_f64);
    while i < xs.len() && j < ys.len() {
        if xs[i] <= ys[j] {
            i += 1;
        } else {
            j += 1;
        }
        gap = gap.max((i as f64 / n - j as f64 / m).abs());
    }
    gap
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

// ── Distribution ──

#[test]
fn gamma_draws_follow_the_distribution() {
    let n = 4000;
    let critical = 1.949 / (n as f64).sqrt();
    for method in METHODS {
        for (shape, scale) in [(0.3, 1.0), (1.0, 2.0), (4.5, 0.5)] {
            let mut rng = StdRng::seed_from_u64(11);
            let xs = sample_gamma(&mut rng, n, shape, scale, method).unwrap();
            let d = ks_statistic(&xs, |x| gamma_p(shape, x / scale));
            assert!(d < critical, "{} gamma({}, {}): D = {}", method, shape, scale, d);
        }
    }
}

#[test]
fn methods_agree_in_distribution() {
    let n = 4000;
    let critical = 1.949 * (2.0 / n as f64).sqrt();
    for shape in [0.6, 2.0, 7.0] {
        let native = sample_gamma(&mut StdRng::seed_from_u64(21), n, shape, 1.0, GammaMethod::Native).unwrap();
        let inverse =
            sample_gamma(&mut StdRng::seed_from_u64(22), n, shape, 1.0, GammaMethod::InverseTransform)
                .unwrap();
        let d = ks_two_sample(&native, &inverse);
        assert!(d < critical, "shape {}: D = {}", shape, d);
    }
}

// ── Derivatives ──

fn gamma_inputs(shape: f64, scale: f64) -> Inputs {
    Inputs::new().with("shape", shape).with("scale", scale)
}

fn seeded_gamma(method: GammaMethod) -> impl Fn(&Args) -> Result<Numeric> {
    move |a| {
        let mut rng = StdRng::seed_from_u64(5);
        sampler::gamma(&mut rng, 20, a.get("shape")?, a.get("scale")?, method)
    }
}

#[test]
fn inverse_transform_derivatives_match_finite_differences() {
    for shape in [0.3, 1.0, 2.7] {
        check(
            seeded_gamma(GammaMethod::InverseTransform),
            &gamma_inputs(shape, 1.7),
            1e-5,
            1e-4,
        );
    }
}

#[test]
fn native_derivatives_match_finite_differences() {
    for shape in [0.4, 2.5, 6.0] {
        check(seeded_gamma(GammaMethod::Native), &gamma_inputs(shape, 0.8), 1e-6, 1e-5);
    }
}

#[test]
fn scale_derivative_is_unit_draw() {
    let scale = 2.5;
    for method in METHODS {
        let out = auto_diff(seeded_gamma(method), &gamma_inputs(1.3, scale), Some(&["scale"])).unwrap();
        for (d, x) in out.derivative.iter().zip(out.value.iter()) {
            assert_relative_eq!(*d, x / scale, max_relative = 1e-12);
        }
    }
}

#[test]
fn inverse_transform_is_continuous_across_shape_one() {
    let below =
        sample_gamma(&mut StdRng::seed_from_u64(9), 50, 1.0 - 1e-9, 1.0, GammaMethod::InverseTransform)
            .unwrap();
    let above =
        sample_gamma(&mut StdRng::seed_from_u64(9), 50, 1.0 + 1e-9, 1.0, GammaMethod::InverseTransform)
            .unwrap();
    for (x, y) in below.iter().zip(&above) {
        assert!((x - y).abs() < 1e-6 * x.max(1.0), "{} vs {}", x, y);
    }
}

#[test]
fn inverse_transform_shape_derivative_is_continuous_across_one() {
    let jacobian = |shape: f64| {
        auto_diff(
            seeded_gamma(GammaMethod::InverseTransform),
            &gamma_inputs(shape, 1.0),
            Some(&["shape"]),
        )
        .unwrap()
        .derivative
    };
    let (below, above) = (jacobian(1.0 - 1e-8), jacobian(1.0 + 1e-8));
    for (x, y) in below.iter().zip(above.iter()) {
        assert!((x - y).abs() < 1e-5 * x.abs().max(1.0), "{} vs {}", x, y);
    }
}

#[test]
fn native_shape_derivative_jumps_at_one() {
    let jacobian = |shape: f64| {
        auto_diff(seeded_gamma(GammaMethod::Native), &gamma_inputs(shape, 1.0), Some(&["shape"]))
            .unwrap()
            .derivative
    };
    let (below, above) = (jacobian(1.0 - 1e-8), jacobian(1.0 + 1e-8));
    let largest_jump = below
        .iter()
        .zip(above.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max);
    assert!(largest_jump > 1e-2, "largest jump {}", largest_jump);
}

#[test]
fn constant_parameters_give_constant_draws() {
    let mut rng = StdRng::seed_from_u64(4);
    let g = sampler::gamma(
        &mut rng,
        5,
        &Numeric::scalar(2.0),
        &Numeric::scalar(1.0),
        GammaMethod::Native,
    )
    .unwrap();
    assert!(!g.is_dual());
    assert_eq!(g.shape(), (5, 1));
}

// ── Derived samplers ──

#[test]
fn chi_squared_mean_matches_df() {
    for method in METHODS {
        let mut rng = StdRng::seed_from_u64(31);
        let xs = sampler::chi_squared(&mut rng, 4000, &Numeric::scalar(3.0), method).unwrap();
        assert_relative_eq!(mean(xs.value().as_slice()), 3.0, epsilon = 0.2);
    }
}

#[test]
fn inverse_gamma_mean() {
    // E = scale / (shape - 1)
    for method in METHODS {
        let mut rng = StdRng::seed_from_u64(32);
        let xs = sampler::inverse_gamma(
            &mut rng,
            4000,
            &Numeric::scalar(4.0),
            &Numeric::scalar(3.0),
            method,
        )
        .unwrap();
        assert!(xs.value().iter().all(|&x| x > 0.0));
        assert_relative_eq!(mean(xs.value().as_slice()), 1.0, epsilon = 0.06);
    }
}

#[test]
fn beta_draws_in_unit_interval() {
    for method in METHODS {
        let mut rng = StdRng::seed_from_u64(33);
        let xs = sampler::beta(&mut rng, 4000, &Numeric::scalar(2.0), &Numeric::scalar(5.0), method)
            .unwrap();
        assert!(xs.value().iter().all(|&x| x > 0.0 && x < 1.0));
        assert_relative_eq!(mean(xs.value().as_slice()), 2.0 / 7.0, epsilon = 0.02);
    }
}

#[test]
fn normal_location_and_spread() {
    for method in METHODS {
        let mut rng = StdRng::seed_from_u64(34);
        let xs = sampler::normal(&mut rng, 4000, &Numeric::scalar(-1.0), &Numeric::scalar(2.0), method)
            .unwrap();
        let xs = xs.value().as_slice().to_vec();
        let m = mean(&xs);
        let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
        assert_relative_eq!(m, -1.0, epsilon = 0.12);
        assert_relative_eq!(var.sqrt(), 2.0, epsilon = 0.1);
    }
}

#[test]
fn derived_samplers_differentiate() {
    let at = Inputs::new().with("a", 2.2).with("b", 3.1);
    let method = GammaMethod::InverseTransform;
    check(
        |x| {
            let mut rng = StdRng::seed_from_u64(8);
            sampler::beta(&mut rng, 10, x.get("a")?, x.get("b")?, method)
        },
        &at,
        1e-5,
        1e-4,
    );
    check(
        |x| {
            let mut rng = StdRng::seed_from_u64(8);
            sampler::inverse_gamma(&mut rng, 10, x.get("a")?, x.get("b")?, method)
        },
        &at,
        1e-5,
        1e-4,
    );
    check(
        |x| {
            let mut rng = StdRng::seed_from_u64(8);
            sampler::normal(&mut rng, 10, x.get("a")?, x.get("b")?, GammaMethod::Native)
        },
        &at,
        1e-6,
        1e-6,
    );
}

#[test]
fn wishart_is_symmetric_positive_definite() {
    let mut rng = StdRng::seed_from_u64(41);
    let scale = Numeric::Constant(Matrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0]));
    let w = sampler::wishart(&mut rng, &Numeric::scalar(4.0), &scale, GammaMethod::Native).unwrap();
    let w = w.value();
    assert_eq!(w.shape(), (2, 2));
    assert_relative_eq!(w[(0, 1)], w[(1, 0)], max_relative = 1e-12);
    assert!(w.clone().cholesky().is_some());
}

#[test]
fn wishart_differentiates_in_df_and_scale() {
    let at = Inputs::new()
        .with("df", 5.5)
        .with("S", Matrix::from_row_slice(2, 2, &[1.0, 0.2, -0.3, 0.7]));
    check(
        |a| {
            let mut rng = StdRng::seed_from_u64(12);
            let s = a.get("S")?;
            let spd = s.tcrossprod(s)?.add(&Numeric::Constant(Matrix::identity(2, 2)))?;
            sampler::wishart(&mut rng, a.get("df")?, &spd, GammaMethod::InverseTransform)
        },
        &at,
        1e-5,
        1e-4,
    );
}
