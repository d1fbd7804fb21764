//! Numeric evaluation over scalars and broadcast arrays
//!
//! Expressions are rendered back into rhai scripts and run with a [`Scope`]
//! holding the bound variables. Bound arrays are fed in point by point.

use std::collections::HashMap;

use rhai::{Dynamic, Scope, AST};

use super::ast::{float_literal, BinOp, Constant, Expr};
use super::parser::{engine, XOR_FN};
use crate::error::{GraphsError, Result};

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(Vec<f64>),
}

impl Value {
    /// Number of elements, `None` for scalars
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Scalar(_) => None,
            Value::Array(a) => Some(a.len()),
        }
    }

    /// Broadcast into an array of `len` elements
    pub fn into_array(self, len: usize) -> Result<Vec<f64>> {
        match self {
            Value::Scalar(v) => Ok(vec![v; len]),
            Value::Array(a) if a.len() == len => Ok(a),
            Value::Array(a) => Err(GraphsError::InvalidEquation(format!(
                "result has {} values, expected {}",
                a.len(),
                len
            ))),
        }
    }
}

/// Variables bound for array evaluation
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

fn nan_min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() || v < acc { v } else { acc })
}

fn nan_max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() || v > acc { v } else { acc })
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `x` together with `x_min` and `x_max`
    pub fn with_x(mut self, x: &[f64]) -> Self {
        self.vars.insert("x_min".into(), Value::Scalar(nan_min(x)));
        self.vars.insert("x_max".into(), Value::Scalar(nan_max(x)));
        self.vars.insert("x".into(), Value::Array(x.to_vec()));
        self
    }

    /// Bind `y` together with `y_min` and `y_max`
    pub fn with_y(mut self, y: &[f64]) -> Self {
        self.vars.insert("y_min".into(), Value::Scalar(nan_min(y)));
        self.vars.insert("y_max".into(), Value::Scalar(nan_max(y)));
        self.vars.insert("y".into(), Value::Array(y.to_vec()));
        self
    }

    /// Bind `n` to the indices `0..len`
    pub fn with_n(mut self, len: usize) -> Self {
        self.vars
            .insert("n".into(), Value::Array((0..len).map(|i| i as f64).collect()));
        self
    }

    pub fn with_scalar(mut self, name: &str, value: f64) -> Self {
        self.vars.insert(name.to_string(), Value::Scalar(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Length shared by the bound arrays, if any are bound
    pub fn len(&self) -> Option<usize> {
        ["x", "y", "n"]
            .iter()
            .find_map(|name| self.vars.get(*name).and_then(Value::len))
            .or_else(|| self.vars.values().find_map(Value::len))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Render `expr` as a rhai script with explicit precedence
///
/// Powers and `xor` are written as function calls so rhai's own operator
/// rules never come into play.
pub(crate) fn script(expr: &Expr) -> String {
    let mut out = String::new();
    write_script(expr, &mut out);
    out
}

fn script_precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Bin(BinOp::Add | BinOp::Sub, ..) => 1,
        Expr::Bin(BinOp::Mul | BinOp::Div, ..) => 2,
        Expr::Neg(_) => 3,
        _ => 4,
    }
}

fn write_operand(expr: &Expr, out: &mut String, parens: bool) {
    if parens {
        out.push('(');
        write_script(expr, out);
        out.push(')');
    } else {
        write_script(expr, out);
    }
}

fn write_call(name: &str, args: &[&Expr], out: &mut String) {
    out.push_str(name);
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_script(arg, out);
    }
    out.push(')');
}

fn write_script(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Num(v) => out.push_str(&float_literal(*v)),
        Expr::Const(c) => out.push_str(&float_literal(c.value())),
        Expr::Var(name) => out.push_str(name),
        Expr::Neg(e) => {
            out.push('-');
            write_operand(e, out, script_precedence(e) < 4);
        }
        Expr::Call(func, e) => write_call(func.name(), &[&**e], out),
        Expr::Bin(BinOp::Pow, a, b) => write_call("pow", &[&**a, &**b], out),
        Expr::Bin(BinOp::Xor, a, b) => write_call(XOR_FN, &[&**a, &**b], out),
        Expr::Bin(op, a, b) => {
            let prec = script_precedence(expr);
            write_operand(a, out, script_precedence(a) < prec);
            out.push_str(match op {
                BinOp::Add => " + ",
                BinOp::Sub => " - ",
                BinOp::Mul => " * ",
                _ => " / ",
            });
            write_operand(b, out, script_precedence(b) <= prec);
        }
    }
}

fn compile(expr: &Expr) -> Result<AST> {
    engine()
        .compile_expression(script(expr))
        .map_err(|e| GraphsError::InvalidEquation(format!("{}: {}", expr, e)))
}

fn run(ast: &AST, scope: &mut Scope) -> Result<f64> {
    let value: Dynamic = engine()
        .eval_ast_with_scope(scope, ast)
        .map_err(|e| GraphsError::InvalidEquation(e.to_string()))?;
    value
        .as_float()
        .or_else(|_| value.as_int().map(|v| v as f64))
        .map_err(|type_name| {
            GraphsError::InvalidEquation(format!("expression evaluates to {}", type_name))
        })
}

/// Evaluate against `env`, broadcasting scalars against arrays
///
/// The result is an array when the expression references a bound array,
/// and a scalar otherwise.
pub fn evaluate(expr: &Expr, env: &Environment) -> Result<Value> {
    let mut scope = Scope::new();
    let mut arrays: Vec<(String, &[f64])> = Vec::new();
    for name in expr.variables() {
        match env.get(&name) {
            Some(Value::Scalar(v)) => {
                scope.push_constant(name.as_str(), *v);
            }
            Some(Value::Array(values)) => arrays.push((name, values.as_slice())),
            None => {
                return Err(GraphsError::InvalidEquation(format!(
                    "unknown variable '{}'",
                    name
                )))
            }
        }
    }
    let ast = compile(expr)?;

    let Some(len) = arrays.first().map(|(_, values)| values.len()) else {
        return Ok(Value::Scalar(run(&ast, &mut scope)?));
    };
    if let Some((_, values)) = arrays.iter().find(|(_, values)| values.len() != len) {
        return Err(GraphsError::InvalidEquation(format!(
            "operands have different lengths ({} and {})",
            len,
            values.len()
        )));
    }

    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        for (name, values) in &arrays {
            scope.set_value(name.as_str(), values[i]);
        }
        out.push(run(&ast, &mut scope)?);
    }
    Ok(Value::Array(out))
}

fn is_numeric_entry(expr: &Expr) -> bool {
    match expr {
        Expr::Num(_) | Expr::Const(Constant::Pi) => true,
        Expr::Neg(e) => is_numeric_entry(e),
        Expr::Bin(_, a, b) => is_numeric_entry(a) && is_numeric_entry(b),
        _ => false,
    }
}

/// Evaluate a numeric entry: literals, arithmetic and `π` only
pub fn evaluate_scalar(expr: &Expr) -> Result<f64> {
    if !is_numeric_entry(expr) {
        return Err(GraphsError::InvalidNumber(expr.to_string()));
    }
    run(&compile(expr)?, &mut Scope::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse;

    #[test]
    fn test_broadcasting() {
        let env = Environment::new().with_x(&[1.0, 2.0, 3.0]);
        let value = evaluate(&parse("2*x + 1").unwrap(), &env).unwrap();
        assert_eq!(value, Value::Array(vec![3.0, 5.0, 7.0]));

        let value = evaluate(&parse("x_max - x_min").unwrap(), &env).unwrap();
        assert_eq!(value, Value::Scalar(2.0));
        assert_eq!(value.into_array(3).unwrap(), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_length_mismatch() {
        let env = Environment::new().with_x(&[1.0, 2.0]).with_y(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            evaluate(&parse("x + y").unwrap(), &env),
            Err(GraphsError::InvalidEquation(_))
        ));
    }

    #[test]
    fn test_unknown_variable() {
        let env = Environment::new().with_x(&[1.0]);
        assert!(evaluate(&parse("z").unwrap(), &env).is_err());
    }

    #[test]
    fn test_scalar_mode() {
        assert_eq!(evaluate_scalar(&parse("-(2 + 3)*2**2").unwrap()).unwrap(), -20.0);
        assert!(matches!(
            evaluate_scalar(&parse("x + 1").unwrap()),
            Err(GraphsError::InvalidNumber(_))
        ));
        assert!(evaluate_scalar(&parse("sin(1)").unwrap()).is_err());
        assert_eq!(evaluate_scalar(&parse("5 xor 3").unwrap()).unwrap(), 6.0);
    }

    #[test]
    fn test_script_keeps_precedence() {
        let env = Environment::new().with_scalar("x", 3.0);
        for (text, expected) in [
            ("-x**2", -9.0),
            ("(-x)**2", 9.0),
            ("2 - (x - 1)", 0.0),
            ("12/(x*2)", 2.0),
            ("-(-x)", 3.0),
            ("1 - -x", 4.0),
        ] {
            let expr = parse(text).unwrap();
            assert_eq!(evaluate(&expr, &env).unwrap(), Value::Scalar(expected), "{}", text);
        }
        assert_eq!(script(&parse("-x**2").unwrap()), "-pow(x, 2.0)");
    }

    #[test]
    fn test_functions_round_half_even() {
        let env = Environment::new().with_x(&[0.5, 1.5, 2.5]);
        let value = evaluate(&parse("round(x)").unwrap(), &env).unwrap();
        assert_eq!(value, Value::Array(vec![0.0, 2.0, 2.0]));
    }

    #[test]
    fn test_environment_len() {
        let env = Environment::new().with_n(4).with_scalar("a", 1.0);
        assert_eq!(env.len(), Some(4));
        assert_eq!(Environment::new().len(), None);
    }
}
