//! Forward-mode automatic differentiation of matrix functions.
//!
//! A function of named matrix inputs is written once against [`Numeric`]
//! and handed to [`auto_diff`], which seeds the chosen inputs as dual
//! matrices and returns the value together with the exact Jacobian
//! `∂vec(f)/∂vec(inputs)` (column-major `vec`). Derivative blocks switch
//! between dense and sparse storage as their fill changes; the structural
//! factors of the rules come from a shared [`StructuralCache`].
//!
//! The [`sampler`] module provides reparameterized random variates, so
//! simulations such as MCMC steps can be differentiated end to end, and
//! [`finite_diff`] checks any result against central differences.

pub mod api;
pub mod dual;
pub mod error;
pub mod finite;
pub mod numeric;
pub mod sampler;
pub mod scalar;
pub mod session;
pub mod sparse;
pub mod special;
pub mod structural;

mod rules;
mod traits;

pub use api::{auto_diff, auto_diff_with, Arg, Args, Differential, Inputs, Value};
pub use dual::Dual;
pub use error::{Error, Result};
pub use finite::{finite_diff, finite_diff_with, FiniteDiffConfig};
pub use numeric::{DualMatrix, Matrix, Numeric};
pub use sampler::{sample_gamma, GammaMethod};
pub use scalar::{Float, Scalar};
pub use session::{Config, JacobianMode, Session, SessionGuard, Target};
pub use sparse::{Derivative, SparseMatrix};
pub use structural::{StructuralCache, Structure};

/// Type alias for forward-mode dual numbers over `f64`.
pub type Dual64 = Dual<f64>;
