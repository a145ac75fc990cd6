use matdual::{auto_diff, finite_diff, Args, Inputs, Matrix, Numeric, Result};

/// Propagated Jacobian against central differences, entry by entry,
/// relative to the larger of 1 and the reference magnitude.
fn check(f: impl Fn(&Args) -> Result<Numeric>, at: &Inputs) {
    let ad = auto_diff(&f, at, None).unwrap();
    let fd = finite_diff(&f, at, None).unwrap();
    assert_eq!(ad.value, fd.value);
    assert_eq!(ad.derivative.shape(), fd.derivative.shape());
    assert_eq!(ad.derivative.nrows(), ad.value.len());
    for (i, (a, r)) in ad.derivative.iter().zip(fd.derivative.iter()).enumerate() {
        let tol = 1e-6 * r.abs().max(1.0);
        assert!(
            (a - r).abs() <= tol,
            "entry {} (row {}, col {}): ad {} vs fd {}",
            i,
            i % ad.derivative.nrows(),
            i / ad.derivative.nrows(),
            a,
            r
        );
    }
}

fn mat(rows: usize, cols: usize, data: &[f64]) -> Matrix {
    Matrix::from_row_slice(rows, cols, data)
}

fn square() -> Matrix {
    mat(3, 3, &[2.0, 0.5, -0.3, 0.1, 1.7, 0.4, -0.6, 0.2, 2.4])
}

fn rect() -> Matrix {
    mat(3, 2, &[0.3, -1.2, 0.8, 0.5, 1.4, -0.7])
}

fn inputs() -> Inputs {
    Inputs::new()
        .with("A", square())
        .with("B", rect())
        .with("C", mat(3, 2, &[1.1, 0.2, -0.4, 0.9, 0.6, 1.3]))
        .with("s", 0.7)
}

// ── Arithmetic ──

#[test]
fn add_sub_neg() {
    check(|a| a.get("B")?.add(a.get("C")?), &inputs());
    check(|a| a.get("B")?.sub(a.get("C")?), &inputs());
    check(|a| Ok(a.get("B")?.neg()), &inputs());
}

#[test]
fn scalar_broadcast() {
    check(|a| a.get("s")?.add(a.get("B")?), &inputs());
    check(|a| a.get("B")?.sub(a.get("s")?), &inputs());
    check(|a| a.get("s")?.mul(a.get("C")?), &inputs());
    check(|a| a.get("C")?.div(a.get("s")?), &inputs());
}

#[test]
fn hadamard_product_and_quotient() {
    check(|a| a.get("B")?.mul(a.get("C")?), &inputs());
    check(|a| a.get("B")?.div(a.get("C")?), &inputs());
}

#[test]
fn powers() {
    let at = Inputs::new()
        .with("X", mat(2, 2, &[1.2, 0.4, 2.0, 0.9]))
        .with("P", mat(2, 2, &[1.5, -0.5, 2.0, 0.3]));
    check(|a| a.get("X")?.pow(a.get("P")?), &at);
    check(|a| Ok(a.get("X")?.powf(2.5)), &at);
    check(|a| Ok(a.get("X")?.powi(3)), &at);
}

#[test]
fn scale_and_shift() {
    check(|a| Ok(a.get("B")?.scale(-2.5)), &inputs());
    check(|a| Ok(a.get("B")?.shift(4.0)), &inputs());
    check(|a| Ok(&(a.get("B")? * 3.0) + 1.0), &inputs());
}

#[test]
fn operator_sugar() {
    check(|a| (a.get("B")? * a.get("C")?)?.add(a.get("s")?), &inputs());
    check(|a| a.get("B")? - a.get("C")?, &inputs());
    check(|a| Ok(-(a.get("B")? / 2.0)), &inputs());
}

// ── Products ──

#[test]
fn matmul() {
    check(|a| a.get("A")?.matmul(a.get("B")?), &inputs());
}

#[test]
fn crossprod_and_tcrossprod() {
    check(|a| a.get("B")?.crossprod(a.get("C")?), &inputs());
    check(|a| a.get("B")?.tcrossprod(a.get("C")?), &inputs());
    check(|a| a.get("A")?.crossprod(a.get("A")?), &inputs());
}

#[test]
fn kronecker() {
    let at = Inputs::new()
        .with("X", mat(2, 3, &[1.0, -2.0, 0.5, 0.0, 3.0, 1.5]))
        .with("Y", mat(2, 2, &[0.4, 1.1, -0.7, 2.2]));
    check(|a| a.get("X")?.kronecker(a.get("Y")?), &at);
    check(|a| a.get("Y")?.kronecker(a.get("X")?), &at);
}

// ── Elementwise ──

#[test]
fn elementwise_maps() {
    let at = Inputs::new().with("X", mat(2, 3, &[0.3, 1.2, 0.7, 2.1, 0.9, 1.6]));
    check(|a| Ok(a.get("X")?.exp()), &at);
    check(|a| Ok(a.get("X")?.ln()), &at);
    check(|a| Ok(a.get("X")?.sqrt()), &at);
    check(|a| Ok(a.get("X")?.recip()), &at);
    check(|a| Ok(a.get("X")?.sin()), &at);
    check(|a| Ok(a.get("X")?.cos()), &at);
    check(|a| Ok(a.get("X")?.tan()), &at);
    check(|a| Ok(a.get("X")?.sinh()), &at);
    check(|a| Ok(a.get("X")?.cosh()), &at);
    check(|a| Ok(a.get("X")?.tanh()), &at);
    check(|a| Ok(a.get("X")?.ln_gamma()), &at);
    check(|a| Ok(a.get("X")?.logistic()), &at);
}

#[test]
fn abs_away_from_zero() {
    let at = Inputs::new().with("X", mat(1, 3, &[-1.5, 0.4, -0.2]));
    check(|a| Ok(a.get("X")?.abs()), &at);
}

// ── Shape ──

#[test]
fn transpose() {
    check(|a| Ok(a.get("B")?.transpose()), &inputs());
    check(|a| a.get("B")?.transpose().matmul(a.get("A")?), &inputs());
}

#[test]
fn slicing() {
    check(|a| a.get("A")?.slice(1..3, 0..2), &inputs());
    check(|a| a.get("A")?.entry(2, 1), &inputs());
    check(|a| a.get("A")?.row(0), &inputs());
    check(|a| a.get("B")?.col(1), &inputs());
}

#[test]
fn reshape_and_vec() {
    check(|a| a.get("B")?.reshape(2, 3), &inputs());
    check(|a| Ok(a.get("A")?.vec()), &inputs());
}

#[test]
fn concatenation() {
    check(|a| Numeric::hstack(&[a.get("B")?, a.get("A")?, a.get("C")?]), &inputs());
    check(|a| Numeric::vstack(&[a.get("B")?, a.get("C")?]), &inputs());
    check(
        |a| {
            let top = a.get("A")?.slice(0..1, 0..2)?;
            Numeric::vstack(&[&top, a.get("C")?])
        },
        &inputs(),
    );
}

#[test]
fn from_entries() {
    check(
        |a| {
            let x = a.get("A")?;
            let entries = vec![
                x.entry(0, 0)?,
                x.entry(1, 1)?.mul(a.get("s")?)?,
                Numeric::scalar(2.0),
                x.entry(2, 0)?.exp(),
            ];
            Numeric::from_entries(2, 2, &entries)
        },
        &inputs(),
    );
}

#[test]
fn diag_both_ways() {
    check(|a| a.get("A")?.diag(), &inputs());
    check(|a| a.get("B")?.col(0)?.diag(), &inputs());
    check(|a| a.get("A")?.row(1)?.diag(), &inputs());
}

// ── Reductions ──

#[test]
fn reductions() {
    check(|a| Ok(a.get("B")?.sum()), &inputs());
    check(|a| Ok(a.get("B")?.row_sums()), &inputs());
    check(|a| Ok(a.get("B")?.col_sums()), &inputs());
    check(|a| Ok(a.get("B")?.mean()), &inputs());
    check(|a| a.get("A")?.trace(), &inputs());
    check(|a| a.get("B")?.dot(a.get("C")?), &inputs());
}

// ── Linear algebra ──

#[test]
fn inverse() {
    check(|a| a.get("A")?.inverse(), &inputs());
}

#[test]
fn solve() {
    check(|a| a.get("A")?.solve(a.get("B")?), &inputs());
    check(|a| a.get("A")?.solve(&a.get("B")?.col(0)?), &inputs());
}

#[test]
fn determinants() {
    check(|a| a.get("A")?.determinant(), &inputs());
    check(|a| a.get("A")?.ln_determinant(), &inputs());
    let negative = Inputs::new().with("A", mat(2, 2, &[0.0, 1.0, 2.0, 0.5]));
    check(|a| a.get("A")?.ln_determinant(), &negative);
}

#[test]
fn cholesky() {
    // A = S Sᵀ + I keeps every perturbation of S symmetric in A.
    let at = Inputs::new().with("S", mat(3, 3, &[1.0, 0.2, -0.5, 0.3, 0.8, 0.1, -0.4, 0.6, 1.2]));
    check(
        |a| {
            let s = a.get("S")?;
            let spd = s.tcrossprod(s)?.add(&Numeric::Constant(Matrix::identity(3, 3)))?;
            spd.cholesky()
        },
        &at,
    );
}

// ── Compositions ──

#[test]
fn logistic_log_likelihood() {
    let at = Inputs::new()
        .with("X", mat(4, 2, &[1.0, 0.3, 1.0, -1.2, 1.0, 0.8, 1.0, 2.1]))
        .with("beta", mat(2, 1, &[0.4, -0.7]))
        .with("y", mat(4, 1, &[1.0, 0.0, 0.0, 1.0]));
    check(
        |a| {
            let p = a.get("X")?.matmul(a.get("beta")?)?.logistic();
            let y = a.get("y")?;
            let one_minus = |v: &Numeric| v.neg().shift(1.0);
            let ll = y.mul(&p.ln())?.add(&one_minus(y).mul(&one_minus(&p).ln())?)?;
            Ok(ll.sum())
        },
        &at,
    );
}

#[test]
fn gaussian_log_density() {
    let at = Inputs::new()
        .with("x", mat(3, 1, &[0.5, -0.2, 1.1]))
        .with("mu", mat(3, 1, &[0.1, 0.0, 0.9]))
        .with("S", mat(3, 3, &[2.0, 0.3, 0.1, 0.3, 1.5, -0.2, 0.1, -0.2, 1.8]));
    check(
        |a| {
            let r = a.get("x")?.sub(a.get("mu")?)?;
            let sigma = a.get("S")?;
            let quad = r.crossprod(&sigma.solve(&r)?)?;
            Ok(quad.add(&sigma.ln_determinant()?)?.scale(-0.5))
        },
        &at,
    );
}

#[test]
fn shape_invariant_along_chain() {
    let f = |a: &Args| -> Result<Numeric> {
        let x = a.get("A")?;
        let y = x.matmul(a.get("B")?)?.exp();
        let z = y.transpose().matmul(&x.inverse()?)?;
        z.kronecker(a.get("s")?)
    };
    let out = auto_diff(f, &inputs(), None).unwrap();
    assert_eq!(out.value.shape(), (2, 3));
    assert_eq!(out.derivative.shape(), (6, 9 + 6 + 6 + 1));
}
