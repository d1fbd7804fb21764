//! Expression evaluation for equations and numeric entries
//!
//! Every user-typed expression is normalised by [`preprocess`], compiled with
//! rhai and lowered into an [`Expr`] tree. The tree is evaluated either as a scalar (numeric entry
//! fields) or against an [`Environment`] of bound arrays (generated data,
//! transforms). The [`symbolic`] module rewrites trees for equation items.
//!
//! ```
//! use graphs_core::expression::{Environment, Equation};
//!
//! let eq = Equation::parse("3sin(x)^2 + d(90)").unwrap();
//! let y = eq.evaluate_array(&Environment::new().with_x(&[0.0])).unwrap();
//! assert!((y[0] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
//! ```

pub mod ast;
pub mod eval;
pub mod parser;
pub mod preprocess;
pub mod symbolic;

pub use ast::{BinOp, Constant, Expr, Func};
pub use eval::{Environment, Value};
pub use parser::MAX_NESTING;
pub use preprocess::preprocess;

use crate::error::{GraphsError, Result};

/// Reject overly nested input, then preprocess it
fn prepare(text: &str) -> Result<String> {
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(GraphsError::InvalidEquation(format!(
                        "more than {} nested parentheses",
                        MAX_NESTING
                    )));
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(preprocess(text))
}

/// A parsed user equation
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    source: String,
    expr: Expr,
}

impl Equation {
    /// Preprocess and parse `text`
    pub fn parse(text: &str) -> Result<Self> {
        let expr = parser::parse(&prepare(text)?)?;
        Ok(Self {
            source: text.to_string(),
            expr,
        })
    }

    pub fn from_expr(expr: Expr) -> Self {
        Self {
            source: expr.to_string(),
            expr,
        }
    }

    /// The text the equation was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, env: &Environment) -> Result<Value> {
        eval::evaluate(&self.expr, env)
    }

    /// Evaluate to an array as long as the bound arrays
    ///
    /// Scalar-valued equations are broadcast so a constant still yields one
    /// value per point.
    pub fn evaluate_array(&self, env: &Environment) -> Result<Vec<f64>> {
        let len = env.len().ok_or_else(|| {
            GraphsError::InvalidEquation("no data bound for evaluation".to_string())
        })?;
        self.evaluate(env)?.into_array(len)
    }
}

impl std::fmt::Display for Equation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Parse a numeric entry such as `2pi/3` or `1e-3`
pub fn parse_number(text: &str) -> Result<f64> {
    let expr = prepare(text)
        .and_then(|prepared| parser::parse(&prepared))
        .map_err(|_| GraphsError::InvalidNumber(text.to_string()))?;
    eval::evaluate_scalar(&expr).map_err(|_| GraphsError::InvalidNumber(text.to_string()))
}

/// Evaluate `text` over `x` values
pub fn evaluate_over(text: &str, xdata: &[f64]) -> Result<Vec<f64>> {
    Equation::parse(text)?.evaluate_array(&Environment::new().with_x(xdata))
}
