//! Parsing preprocessed expressions with rhai
//!
//! The preprocessed text is turned into a rhai expression script and compiled
//! with a shared [`Engine`]. The compiled AST is then lowered into the [`Expr`]
//! tree used by evaluation and the symbolic rewrites.
//!
//! Two details of the script source keep the expected arithmetic intact:
//! - every number becomes a float literal, so `1/2` is `0.5`
//! - every bare parenthesis becomes a call to [`GROUP`], so explicit grouping
//!   survives into the AST and `**` can be re-associated to bind right
//!   and above unary minus (`-2**2` is `-4`, `2**3**2` is `512`)

use std::sync::OnceLock;

use regex::{Captures, Regex};
use rhai::{Engine, Expr as Node, Expression, OptimizationLevel, Stmt, FLOAT, INT};

use super::ast::{float_literal, BinOp, Constant, Expr, Func};
use crate::error::{GraphsError, Result};

/// Deepest nesting the engine will parse
pub const MAX_NESTING: usize = 64;

/// Marker for explicit parentheses, never produced by preprocessing since
/// user text is lowercased
const GROUP: &str = "GROUP";

/// Name under which `xor` is evaluated
pub(crate) const XOR_FN: &str = "bit_xor";

/// The shared engine
///
/// Optimization is disabled so constant subexpressions keep their shape in
/// the AST.
pub(crate) fn engine() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(|| {
        let mut engine = Engine::new();
        engine.set_optimization_level(OptimizationLevel::None);
        engine.set_max_expr_depths(MAX_NESTING, MAX_NESTING);
        engine.set_max_call_levels(32);

        if let Err(e) = engine.register_custom_operator("xor", 45) {
            tracing::warn!("xor operator unavailable: {}", e);
        }

        for func in Func::ALL {
            engine.register_fn(func.name(), move |x: f64| func.apply(x));
        }
        engine.register_fn("pow", |x: f64, y: f64| x.powf(y));
        engine.register_fn(XOR_FN, |a: f64, b: f64| BinOp::Xor.apply(a, b));
        engine
    })
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?P<name>[A-Za-z_][A-Za-z_0-9]*\s*\(?)|(?P<number>(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)|(?P<open>\()|(?P<pi>π)|(?P<minus>−)",
        )
        .expect("valid regex")
    })
}

/// Rewrite preprocessed text into a rhai expression script
fn script_source(input: &str) -> String {
    token_pattern()
        .replace_all(input, |caps: &Captures| {
            if let Some(number) = caps.name("number") {
                match number.as_str().parse::<f64>() {
                    Ok(v) => float_literal(v),
                    Err(_) => number.as_str().to_string(),
                }
            } else if caps.name("open").is_some() {
                format!("{}(", GROUP)
            } else if caps.name("pi").is_some() {
                "pi".to_string()
            } else if caps.name("minus").is_some() {
                "-".to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn invalid(message: impl Into<String>) -> GraphsError {
    GraphsError::InvalidEquation(message.into())
}

fn binary_op(name: &str) -> Option<BinOp> {
    match name {
        "+" => Some(BinOp::Add),
        "-" => Some(BinOp::Sub),
        "*" => Some(BinOp::Mul),
        "/" => Some(BinOp::Div),
        "xor" => Some(BinOp::Xor),
        _ => None,
    }
}

/// Lower a rhai expression node
fn lower(node: &Node) -> Result<Expr> {
    let expression = Expression::from(node);
    if let Some(v) = expression.get_literal_value::<FLOAT>() {
        return Ok(Expr::num(v));
    }
    if let Some(v) = expression.get_literal_value::<INT>() {
        return Ok(Expr::num(v as f64));
    }
    if let Some(name) = expression.get_variable_name() {
        return Ok(match name {
            "pi" => Expr::Const(Constant::Pi),
            "e" => Expr::Const(Constant::E),
            _ => Expr::var(name),
        });
    }

    let Node::FnCall(call, _) = node else {
        return Err(invalid("unsupported syntax in expression"));
    };
    match (call.name.as_str(), &call.args[..]) {
        (GROUP | "+", [inner]) => lower(inner),
        ("-", [inner]) => Ok(Expr::neg(lower(inner)?)),
        ("**", [base, exponent]) => power(base, lower(exponent)?),
        (name, args) => {
            if let (Some(op), [a, b]) = (binary_op(name), args) {
                return Ok(Expr::bin(op, lower(a)?, lower(b)?));
            }
            match (Func::from_name(name), args) {
                (Some(func), [arg]) => Ok(Expr::call(func, lower(arg)?)),
                (Some(_), _) => Err(invalid(format!("{}() takes one argument", name))),
                (None, _) => Err(invalid(format!("unknown function '{}'", name))),
            }
        }
    }
}

/// `base ** exponent`, binding tighter than a unary minus on the base
///
/// A leading minus on the base applies to the whole power, and an
/// unparenthesized power in the base is folded into the exponent.
fn power(base: &Node, exponent: Expr) -> Result<Expr> {
    if let Node::FnCall(call, _) = base {
        match (call.name.as_str(), &call.args[..]) {
            ("-", [inner]) => return Ok(Expr::neg(power(inner, exponent)?)),
            ("**", [inner_base, inner_exponent]) => {
                let exponent = power(inner_exponent, exponent)?;
                return power(inner_base, exponent);
            }
            _ => {}
        }
    }
    let literal = Expression::from(base).get_literal_value::<FLOAT>();
    if let Some(v) = literal.filter(|v| *v < 0.0) {
        return Ok(Expr::neg(Expr::pow(Expr::num(-v), exponent)));
    }
    Ok(Expr::pow(lower(base)?, exponent))
}

/// Parse an already preprocessed expression
pub fn parse(input: &str) -> Result<Expr> {
    let script = script_source(input);
    let ast = engine()
        .compile_expression(&script)
        .map_err(|e| invalid(format!("{}: {}", input.trim(), e)))?;
    match ast.statements() {
        [Stmt::Expr(node)] => lower(node),
        [] => Err(invalid("empty expression")),
        _ => Err(invalid(format!("{}: not a single expression", input.trim()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let e = parse("1 + 2*3**2").unwrap();
        assert_eq!(e.constant_value(), Some(19.0));

        // Unary minus binds looser than power on its left
        let e = parse("-2**2").unwrap();
        assert_eq!(e.constant_value(), Some(-4.0));
        assert_eq!(parse("-x**2").unwrap().to_string(), "-x^2");
        assert_eq!(parse("(-x)**2").unwrap().to_string(), "(-x)^2");

        // Power is right associative
        let e = parse("2**3**2").unwrap();
        assert_eq!(e.constant_value(), Some(512.0));
        assert_eq!(parse("(2**3)**2").unwrap().constant_value(), Some(64.0));

        let e = parse("2**-1").unwrap();
        assert_eq!(e.constant_value(), Some(0.5));
    }

    #[test]
    fn test_integer_division_stays_float() {
        assert_eq!(parse("1/2").unwrap().constant_value(), Some(0.5));
    }

    #[test]
    fn test_functions_and_names() {
        let e = parse("sin(x) + x_min").unwrap();
        assert_eq!(e.variables(), vec!["x".to_string(), "x_min".to_string()]);
        assert_eq!(parse("arcsin(x)").unwrap(), parse("asin(x)").unwrap());
        assert!(parse("foo(x)").is_err());
        assert!(parse("sin(x, 2)").is_err());
    }

    #[test]
    fn test_xor() {
        let e = parse("5 xor 3").unwrap();
        assert_eq!(e, Expr::bin(BinOp::Xor, Expr::num(5.0), Expr::num(3.0)));
        assert_eq!(e.constant_value(), Some(6.0));
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("(1 + 2").is_err());
        assert!(parse("1 + ").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("1 $ 2").is_err());
        assert!(parse("x = 2").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}x{}", "(".repeat(500), ")".repeat(500));
        assert!(matches!(parse(&deep), Err(GraphsError::InvalidEquation(_))));

        let shallow = format!("{}x{}", "(".repeat(8), ")".repeat(8));
        assert_eq!(parse(&shallow).unwrap(), Expr::var("x"));
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(parse("1.5e3").unwrap().constant_value(), Some(1500.0));
        assert_eq!(parse("2E-2").unwrap().constant_value(), Some(0.02));
    }
}
