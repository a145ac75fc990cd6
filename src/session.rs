//! Differentiation sessions.
//!
//! A [`Session`] fixes the layout of one driver call: which inputs are
//! differentiated, where each sits in the flattened parameter vector, and
//! the total width `d`. While the user function runs, the session's
//! context (structural cache and representation thresholds) is installed
//! as the thread's active context by a [`SessionGuard`]; propagation rules
//! read it from there.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, trace};

use crate::api::{Arg, Args, Inputs, Value};
use crate::error::{Error, Result};
use crate::numeric::{DualMatrix, Numeric};
use crate::sparse::{Derivative, SparseMatrix};
use crate::structural::{StructuralCache, Structure};

/// Settings of a differentiation session.
#[derive(Clone, Debug)]
pub struct Config {
    /// Dense derivative results with a fill ratio below this are stored sparse.
    pub sparse_below: f64,
    /// Sparse derivative results with a fill ratio above this are stored dense.
    pub dense_above: f64,
    /// Structural cache for the session; `None` uses [`StructuralCache::global`].
    pub cache: Option<Arc<StructuralCache>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sparse_below: 0.1,
            dense_above: 0.5,
            cache: None,
        }
    }
}

impl Config {
    fn validate(&self) -> Result<()> {
        let in_unit = |x: f64| (0.0..=1.0).contains(&x);
        if !in_unit(self.sparse_below) || !in_unit(self.dense_above) {
            return Err(Error::Configuration(format!(
                "fill thresholds must lie in [0, 1], got sparse_below = {}, dense_above = {}",
                self.sparse_below, self.dense_above
            )));
        }
        if self.sparse_below > self.dense_above {
            return Err(Error::Configuration(format!(
                "sparse_below ({}) exceeds dense_above ({})",
                self.sparse_below, self.dense_above
            )));
        }
        Ok(())
    }
}

/// Whether every numeric input is differentiated or only a requested subset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JacobianMode {
    Full,
    Partial,
}

/// One differentiated input and its columns in the Jacobian.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    /// First Jacobian column of this input.
    pub offset: usize,
    /// Flattened size `m·n`.
    pub len: usize,
}

/// State shared by the rules of the running session.
#[derive(Debug)]
pub(crate) struct Context {
    cache: Arc<StructuralCache>,
    sparse_below: f64,
    dense_above: f64,
}

impl Context {
    fn new(config: &Config) -> Self {
        Context {
            cache: config.cache.clone().unwrap_or_else(StructuralCache::global),
            sparse_below: config.sparse_below,
            dense_above: config.dense_above,
        }
    }

    pub(crate) fn structure(&self, key: Structure) -> Arc<SparseMatrix> {
        self.cache.get(key)
    }

    /// Switch representation when the fill ratio crosses a threshold.
    pub(crate) fn compact(&self, derivative: Derivative) -> Derivative {
        let fill = derivative.fill_ratio();
        match derivative {
            Derivative::Dense(m) if fill < self.sparse_below => {
                trace!("derivative {:?} to sparse (fill {:.3})", m.shape(), fill);
                Derivative::Sparse(SparseMatrix::from_dense(&m))
            }
            Derivative::Sparse(s) if fill > self.dense_above => {
                trace!("derivative {:?} to dense (fill {:.3})", s.shape(), fill);
                Derivative::Dense(s.to_dense())
            }
            other => other,
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<Rc<Context>>> = const { RefCell::new(None) };
}

/// Run `f` with the active context, or a default one outside any session.
pub(crate) fn with_context<R>(f: impl FnOnce(&Context) -> R) -> R {
    let active = ACTIVE.with(|cell| cell.borrow().clone());
    match active {
        Some(ctx) => f(&ctx),
        None => f(&Context::new(&Config::default())),
    }
}

/// Fetch a structural matrix from the active context's cache.
pub(crate) fn structure(key: Structure) -> Arc<SparseMatrix> {
    with_context(|ctx| ctx.structure(key))
}

/// RAII guard that installs a session context as the thread's active
/// context and restores the previous one on drop.
pub struct SessionGuard {
    prev: Option<Rc<Context>>,
}

impl SessionGuard {
    fn new(ctx: Rc<Context>) -> Self {
        let prev = ACTIVE.with(|cell| cell.replace(Some(ctx)));
        SessionGuard { prev }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        ACTIVE.with(|cell| {
            cell.replace(prev);
        });
    }
}

/// Layout and context of one differentiation call.
#[derive(Debug)]
pub struct Session {
    targets: Vec<Target>,
    width: usize,
    mode: JacobianMode,
    context: Rc<Context>,
}

impl Session {
    /// Lay out the targets of `at` restricted to `wrt`.
    ///
    /// Targets keep the insertion order of `at`, so a restricted `wrt`
    /// selects a column sub-block of the full Jacobian. With `wrt = None`
    /// every numeric input is a target.
    pub fn plan(at: &Inputs, wrt: Option<&[&str]>, config: &Config) -> Result<Session> {
        config.validate()?;
        if let Some(names) = wrt {
            for &name in names {
                match at.get(name) {
                    None => {
                        return Err(Error::Configuration(format!(
                            "'{}' is listed for differentiation but absent from the inputs",
                            name
                        )))
                    }
                    Some(Value::Numeric(_)) => {}
                    Some(_) => {
                        return Err(Error::Type {
                            op: "auto_diff",
                            reason: format!("'{}' is not numeric and cannot be differentiated", name),
                        })
                    }
                }
            }
        }

        let mut targets = Vec::new();
        let mut offset = 0;
        for (name, value) in at.iter() {
            let Value::Numeric(m) = value else { continue };
            if wrt.is_some_and(|names| !names.contains(&name)) {
                continue;
            }
            targets.push(Target {
                name: name.to_string(),
                offset,
                len: m.len(),
            });
            offset += m.len();
        }
        let mode = if wrt.is_some() {
            JacobianMode::Partial
        } else {
            JacobianMode::Full
        };
        debug!(
            "planned {:?} session: {} targets, width {}",
            mode,
            targets.len(),
            offset
        );
        Ok(Session {
            targets,
            width: offset,
            mode,
            context: Rc::new(Context::new(config)),
        })
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Differentiation width `d`.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn mode(&self) -> JacobianMode {
        self.mode
    }

    /// Wrap the inputs: targets as seeded duals, other numeric inputs as
    /// constants, non-numeric inputs unchanged.
    pub fn seed(&self, at: &Inputs) -> Result<Args> {
        let mut args = Args::default();
        for (name, value) in at.iter() {
            let arg = match value {
                Value::Numeric(m) => match self.target(name) {
                    Some(t) => Arg::Numeric(Numeric::Dual(DualMatrix::seed(
                        m.clone(),
                        t.offset,
                        self.width,
                    )?)),
                    None => Arg::Numeric(Numeric::Constant(m.clone())),
                },
                Value::Index(i) => Arg::Index(*i),
                Value::Text(s) => Arg::Text(s.clone()),
            };
            args.push(name, arg);
        }
        Ok(args)
    }

    /// Install this session's context on the current thread.
    pub fn activate(&self) -> SessionGuard {
        SessionGuard::new(Rc::clone(&self.context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Matrix;

    fn inputs() -> Inputs {
        Inputs::new()
            .with("X", Matrix::zeros(2, 2))
            .with("steps", 10usize)
            .with("y", Matrix::zeros(2, 1))
    }

    #[test]
    fn full_plan_covers_numeric_inputs_in_order() {
        let s = Session::plan(&inputs(), None, &Config::default()).unwrap();
        assert_eq!(s.mode(), JacobianMode::Full);
        assert_eq!(s.width(), 6);
        assert_eq!(s.target("X").unwrap().offset, 0);
        assert_eq!(s.target("y").unwrap().offset, 4);
        assert!(s.target("steps").is_none());
    }

    #[test]
    fn partial_plan_follows_input_order() {
        let s = Session::plan(&inputs(), Some(&["y", "X"]), &Config::default()).unwrap();
        assert_eq!(s.mode(), JacobianMode::Partial);
        let names: Vec<_> = s.targets().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["X", "y"]);
    }

    #[test]
    fn unknown_and_non_numeric_targets_rejected() {
        let err = Session::plan(&inputs(), Some(&["z"]), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        let err = Session::plan(&inputs(), Some(&["steps"]), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Type { .. }));
    }

    #[test]
    fn bad_thresholds_rejected() {
        let config = Config {
            sparse_below: 0.8,
            dense_above: 0.2,
            cache: None,
        };
        assert!(Session::plan(&inputs(), None, &config).is_err());
    }

    #[test]
    fn guard_restores_previous_context() {
        let cache = Arc::new(StructuralCache::new());
        let config = Config {
            cache: Some(Arc::clone(&cache)),
            ..Config::default()
        };
        let session = Session::plan(&inputs(), None, &config).unwrap();
        {
            let _guard = session.activate();
            structure(Structure::Identity(3));
        }
        assert!(cache.contains(Structure::Identity(3)));
        structure(Structure::Identity(9));
        assert!(!cache.contains(Structure::Identity(9)));
    }
}
