use log::debug;

use crate::error::{Error, Result};
use crate::numeric::{Matrix, Numeric};
use crate::session::{Config, Session};
use crate::sparse::Derivative;

/// An input value supplied to the driver.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A real matrix (scalars are 1×1). Only these can be differentiated.
    Numeric(Matrix),
    /// A count or index passed through unchanged (iteration counts, sizes).
    Index(usize),
    /// A label passed through unchanged (method names, modes).
    Text(String),
}

impl From<Matrix> for Value {
    fn from(m: Matrix) -> Self {
        Value::Numeric(m)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Numeric(Matrix::from_element(1, 1, x))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Index(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Named inputs in insertion order (the order of Jacobian column blocks).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inputs {
    entries: Vec<(String, Value)>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Inputs::insert).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add an input, replacing an existing one of the same name in place.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An argument as the user function sees it.
#[derive(Clone, Debug)]
pub enum Arg {
    Numeric(Numeric),
    Index(usize),
    Text(String),
}

/// Arguments handed to the user function, looked up by name.
#[derive(Clone, Debug, Default)]
pub struct Args {
    entries: Vec<(String, Arg)>,
}

impl Args {
    /// Every input as it is: numeric inputs become constants.
    pub fn constants(at: &Inputs) -> Args {
        let mut args = Args::default();
        for (name, value) in at.iter() {
            let arg = match value {
                Value::Numeric(m) => Arg::Numeric(Numeric::Constant(m.clone())),
                Value::Index(i) => Arg::Index(*i),
                Value::Text(s) => Arg::Text(s.clone()),
            };
            args.push(name, arg);
        }
        args
    }

    pub(crate) fn push(&mut self, name: &str, arg: Arg) {
        self.entries.push((name.to_string(), arg));
    }

    /// Replace a numeric argument's value, keeping everything else.
    pub(crate) fn replace_numeric(&mut self, name: &str, value: Numeric) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = Arg::Numeric(value);
        }
    }

    fn lookup(&self, name: &str) -> Result<&Arg> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
            .ok_or_else(|| Error::MissingArgument(name.to_string()))
    }

    /// A numeric argument.
    pub fn get(&self, name: &str) -> Result<&Numeric> {
        match self.lookup(name)? {
            Arg::Numeric(x) => Ok(x),
            _ => Err(Error::Type {
                op: "get",
                reason: format!("argument '{}' is not numeric", name),
            }),
        }
    }

    /// A count/index argument.
    pub fn index(&self, name: &str) -> Result<usize> {
        match self.lookup(name)? {
            Arg::Index(i) => Ok(*i),
            _ => Err(Error::Type {
                op: "index",
                reason: format!("argument '{}' is not an index", name),
            }),
        }
    }

    /// A text argument.
    pub fn text(&self, name: &str) -> Result<&str> {
        match self.lookup(name)? {
            Arg::Text(s) => Ok(s),
            _ => Err(Error::Type {
                op: "text",
                reason: format!("argument '{}' is not text", name),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }
}

/// Function value and Jacobian.
///
/// `derivative` has one row per entry of `vec(value)` and one column per
/// entry of the flattened differentiation targets.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Differential {
    pub value: Matrix,
    pub derivative: Matrix,
}

impl Differential {
    fn from_output(output: Numeric, width: usize) -> Result<Self> {
        match output {
            Numeric::Constant(value) => {
                let derivative = Matrix::zeros(value.len(), width);
                Ok(Differential { value, derivative })
            }
            Numeric::Dual(d) => {
                let (value, derivative) = d.into_parts();
                if derivative.ncols() != width {
                    return Err(Error::dimension(
                        "auto_diff",
                        derivative.shape(),
                        (value.len(), width),
                    ));
                }
                Ok(Differential {
                    value,
                    derivative: Derivative::into_dense(derivative),
                })
            }
        }
    }

    /// Whether value and derivative are free of NaN and infinities.
    pub fn is_finite(&self) -> bool {
        self.value.iter().chain(self.derivative.iter()).all(|v| v.is_finite())
    }
}

/// Evaluate `f` at `at` and its Jacobian with respect to `wrt` (forward mode).
///
/// Every numeric input named in `wrt` (all numeric inputs when `wrt` is
/// `None`) is seeded as a dual matrix; the remaining inputs are passed as
/// constants or unchanged. `f` runs once.
///
/// ```
/// use matdual::{auto_diff, Inputs, Matrix};
///
/// let at = Inputs::new()
///     .with("X", Matrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]))
///     .with("y", Matrix::from_column_slice(2, 1, &[5.0, 6.0]));
/// let out = auto_diff(|a| a.get("X")?.matmul(a.get("y")?), &at, None).unwrap();
/// assert_eq!(out.derivative.shape(), (2, 6));
///
/// let out = auto_diff(|a| a.get("X")?.matmul(a.get("y")?), &at, Some(&["y"])).unwrap();
/// assert_eq!(out.derivative.shape(), (2, 2));
/// ```
pub fn auto_diff(
    f: impl FnOnce(&Args) -> Result<Numeric>,
    at: &Inputs,
    wrt: Option<&[&str]>,
) -> Result<Differential> {
    auto_diff_with(&Config::default(), f, at, wrt)
}

/// [`auto_diff`] with explicit session settings.
pub fn auto_diff_with(
    config: &Config,
    f: impl FnOnce(&Args) -> Result<Numeric>,
    at: &Inputs,
    wrt: Option<&[&str]>,
) -> Result<Differential> {
    let session = Session::plan(at, wrt, config)?;
    let args = session.seed(at)?;
    let output = {
        let _guard = session.activate();
        f(&args)?
    };
    debug!(
        "auto_diff output {:?}, width {}",
        output.shape(),
        session.width()
    );
    Differential::from_output(output, session.width())
}
