//! Restricted term-rewriting for equation transforms
//!
//! The passes here cover what equation items need: substitution, algebraic
//! simplification, differentiation, and a table-driven integral and Fourier
//! transform. Anything outside the supported forms fails with
//! [`GraphsError::OperationUnsupported`] rather than returning a wrong answer.

use super::ast::{BinOp, Constant, Expr, Func};
use crate::error::{GraphsError, Result};

const MAX_PASSES: usize = 64;

fn as_num(e: &Expr) -> Option<f64> {
    match e {
        Expr::Num(v) => Some(*v),
        _ => None,
    }
}

fn is_num(e: &Expr, v: f64) -> bool {
    as_num(e) == Some(v)
}

fn is_integer(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn scaled(c: f64, t: Expr) -> Expr {
    if c == 1.0 {
        t
    } else {
        Expr::mul(Expr::num(c), t)
    }
}

fn unsupported(what: &str, expr: &Expr) -> GraphsError {
    GraphsError::OperationUnsupported(format!("Cannot {} {}", what, expr))
}

/// Replace every occurrence of `var` with `replacement`
pub fn substitute(expr: &Expr, var: &str, replacement: &Expr) -> Expr {
    replace(expr, &Expr::var(var), replacement)
}

/// Replace every occurrence of the subtree `target`
fn replace(expr: &Expr, target: &Expr, replacement: &Expr) -> Expr {
    if expr == target {
        return replacement.clone();
    }
    match expr {
        Expr::Num(_) | Expr::Const(_) | Expr::Var(_) => expr.clone(),
        Expr::Neg(e) => Expr::neg(replace(e, target, replacement)),
        Expr::Bin(op, a, b) => Expr::bin(
            *op,
            replace(a, target, replacement),
            replace(b, target, replacement),
        ),
        Expr::Call(f, e) => Expr::call(*f, replace(e, target, replacement)),
    }
}

/// Rewrite until a fixed point: constant folding, identities, like terms
pub fn simplify(expr: &Expr) -> Expr {
    let mut current = expr.clone();
    for _ in 0..MAX_PASSES {
        let next = simplify_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn simplify_once(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Const(_) | Expr::Var(_) => expr.clone(),
        Expr::Neg(e) => simplify_neg(simplify_once(e)),
        Expr::Bin(op, a, b) => simplify_bin(*op, simplify_once(a), simplify_once(b)),
        Expr::Call(f, e) => simplify_call(*f, simplify_once(e)),
    }
}

fn simplify_neg(e: Expr) -> Expr {
    match e {
        Expr::Num(v) => Expr::Num(-v),
        Expr::Neg(inner) => *inner,
        Expr::Bin(BinOp::Mul, a, b) => match *a {
            Expr::Num(c) => Expr::mul(Expr::num(-c), *b),
            a => Expr::neg(Expr::mul(a, *b)),
        },
        Expr::Bin(BinOp::Sub, a, b) => Expr::sub(*b, *a),
        other => Expr::neg(other),
    }
}

fn simplify_call(f: Func, arg: Expr) -> Expr {
    if !arg.contains_any_var() {
        if let Some(c) = arg.constant_value() {
            let r = f.apply(c);
            if r.is_finite() && (r - r.round()).abs() < 1e-12 {
                return Expr::num(r.round() + 0.0);
            }
        }
    }
    match (f, arg) {
        (Func::Exp, Expr::Call(Func::Log, inner)) => *inner,
        (Func::Log, Expr::Call(Func::Exp, inner)) => *inner,
        (f, arg) => Expr::call(f, arg),
    }
}

fn fold(op: BinOp, x: f64, y: f64) -> Option<Expr> {
    let r = op.apply(x, y);
    if !r.is_finite() {
        return None;
    }
    match op {
        BinOp::Xor | BinOp::Add | BinOp::Sub | BinOp::Mul => Some(Expr::num(r)),
        BinOp::Div => {
            if is_integer(r) || !is_integer(x) || !is_integer(y) {
                return Some(Expr::num(r));
            }
            // Keep exact fractions in lowest terms
            let (mut n, mut d) = (x as i64, y as i64);
            let g = gcd(n, d).max(1);
            n /= g;
            d /= g;
            if d < 0 {
                n = -n;
                d = -d;
            }
            if n as f64 == x && d as f64 == y {
                None
            } else {
                Some(Expr::div(Expr::num(n as f64), Expr::num(d as f64)))
            }
        }
        BinOp::Pow => {
            if is_integer(r) || (is_integer(y) && y >= 0.0) || !is_integer(x) {
                Some(Expr::num(r))
            } else {
                None
            }
        }
    }
}

/// Split a term into numeric coefficient and symbolic part
fn split_coeff(e: &Expr) -> Option<(f64, Expr)> {
    match e {
        Expr::Num(_) => None,
        Expr::Neg(t) => Some((-1.0, (**t).clone())),
        Expr::Bin(BinOp::Mul, a, t) => match a.as_ref() {
            Expr::Num(c) => Some((*c, (**t).clone())),
            _ => Some((1.0, e.clone())),
        },
        other => Some((1.0, other.clone())),
    }
}

/// Split into base and exponent, `x` counts as `x^1`
fn split_pow(e: &Expr) -> (Expr, Expr) {
    match e {
        Expr::Bin(BinOp::Pow, base, exp) => ((**base).clone(), (**exp).clone()),
        other => (other.clone(), Expr::num(1.0)),
    }
}

fn simplify_bin(op: BinOp, a: Expr, b: Expr) -> Expr {
    if let (Some(x), Some(y)) = (as_num(&a), as_num(&b)) {
        if let Some(folded) = fold(op, x, y) {
            return folded;
        }
    }

    match op {
        BinOp::Xor => Expr::bin(op, a, b),
        BinOp::Add => {
            if is_num(&a, 0.0) {
                return b;
            }
            if is_num(&b, 0.0) {
                return a;
            }
            if let Expr::Neg(nb) = b {
                return Expr::sub(a, *nb);
            }
            if let Some(v) = as_num(&b).filter(|v| *v < 0.0) {
                return Expr::sub(a, Expr::num(-v));
            }
            if let Expr::Neg(na) = a {
                return Expr::sub(b, *na);
            }
            if let (Some((c1, t1)), Some((c2, t2))) = (split_coeff(&a), split_coeff(&b)) {
                if t1 == t2 {
                    return Expr::mul(Expr::num(c1 + c2), t1);
                }
            }
            if as_num(&a).is_some() && as_num(&b).is_none() {
                return Expr::add(b, a);
            }
            Expr::add(a, b)
        }
        BinOp::Sub => {
            if is_num(&b, 0.0) {
                return a;
            }
            if is_num(&a, 0.0) {
                return Expr::neg(b);
            }
            if let Expr::Neg(nb) = b {
                return Expr::add(a, *nb);
            }
            if let Some(v) = as_num(&b).filter(|v| *v < 0.0) {
                return Expr::add(a, Expr::num(-v));
            }
            if let (Some((c1, t1)), Some((c2, t2))) = (split_coeff(&a), split_coeff(&b)) {
                if t1 == t2 {
                    return Expr::mul(Expr::num(c1 - c2), t1);
                }
            }
            Expr::sub(a, b)
        }
        BinOp::Mul => {
            if is_num(&a, 0.0) || is_num(&b, 0.0) {
                return Expr::num(0.0);
            }
            if is_num(&a, 1.0) {
                return b;
            }
            if is_num(&b, 1.0) {
                return a;
            }
            if is_num(&a, -1.0) {
                return Expr::neg(b);
            }
            if is_num(&b, -1.0) {
                return Expr::neg(a);
            }
            if let Expr::Neg(na) = a {
                return Expr::neg(Expr::mul(*na, b));
            }
            if let Expr::Neg(nb) = b {
                return Expr::neg(Expr::mul(a, *nb));
            }
            if as_num(&b).is_some() && as_num(&a).is_none() {
                return Expr::mul(b, a);
            }
            if let Some(c1) = as_num(&a) {
                if let Expr::Bin(inner_op, l, r) = &b {
                    match (inner_op, l.as_ref(), r.as_ref()) {
                        (BinOp::Mul, Expr::Num(c2), t) => return scaled(c1 * c2, t.clone()),
                        (BinOp::Div, Expr::Num(n), d) => {
                            return Expr::div(Expr::num(c1 * n), d.clone())
                        }
                        (BinOp::Div, t, Expr::Num(_)) => {
                            return Expr::div(Expr::mul(a.clone(), t.clone()), (**r).clone())
                        }
                        _ => {}
                    }
                }
            } else {
                if let Expr::Bin(BinOp::Mul, inner, t) = &b {
                    if let Some(c) = as_num(inner) {
                        return Expr::mul(Expr::num(c), Expr::mul(a, (**t).clone()));
                    }
                }
                if let Expr::Bin(BinOp::Mul, inner, t) = &a {
                    if let Some(c) = as_num(inner) {
                        return Expr::mul(Expr::num(c), Expr::mul((**t).clone(), b));
                    }
                }
            }
            let (base1, exp1) = split_pow(&a);
            let (base2, exp2) = split_pow(&b);
            if base1 == base2 && as_num(&base1).is_none() {
                return Expr::pow(base1, Expr::add(exp1, exp2));
            }
            Expr::mul(a, b)
        }
        BinOp::Div => {
            if is_num(&b, 1.0) {
                return a;
            }
            if is_num(&a, 0.0) && !is_num(&b, 0.0) {
                return Expr::num(0.0);
            }
            if let Expr::Neg(na) = a {
                return Expr::neg(Expr::div(*na, b));
            }
            if let Expr::Neg(nb) = b {
                return Expr::neg(Expr::div(a, *nb));
            }
            if let (Expr::Bin(BinOp::Mul, c, t), Some(d)) = (&a, as_num(&b)) {
                if let Some(c) = as_num(c).filter(|c| is_integer(*c) && is_integer(d)) {
                    let g = gcd(c as i64, d as i64) as f64;
                    if g > 1.0 {
                        let (c, d) = (c / g, d / g);
                        let t = scaled(c, (**t).clone());
                        return if d == 1.0 { t } else { Expr::div(t, Expr::num(d)) };
                    }
                }
            }
            if let Expr::Bin(BinOp::Div, n, d) = &a {
                return Expr::div((**n).clone(), Expr::mul((**d).clone(), b));
            }
            if let Expr::Bin(BinOp::Div, n, d) = &b {
                return Expr::div(Expr::mul(a, (**d).clone()), (**n).clone());
            }
            let (base1, exp1) = split_pow(&a);
            let (base2, exp2) = split_pow(&b);
            if base1 == base2 && as_num(&base1).is_none() {
                return Expr::pow(base1, Expr::sub(exp1, exp2));
            }
            Expr::div(a, b)
        }
        BinOp::Pow => {
            if is_num(&b, 0.0) {
                return Expr::num(1.0);
            }
            if is_num(&b, 1.0) {
                return a;
            }
            if is_num(&a, 1.0) {
                return Expr::num(1.0);
            }
            if a == Expr::Const(Constant::E) {
                return Expr::call(Func::Exp, b);
            }
            if let (Expr::Bin(BinOp::Pow, base, e1), Some(e2)) = (&a, as_num(&b)) {
                if let Some(e1) = as_num(e1) {
                    return Expr::pow((**base).clone(), Expr::num(e1 * e2));
                }
            }
            Expr::pow(a, b)
        }
    }
}

/// Symbolic derivative with respect to `var`, simplified
pub fn differentiate(expr: &Expr, var: &str) -> Result<Expr> {
    Ok(simplify(&derive(expr, var)?))
}

fn derive(expr: &Expr, var: &str) -> Result<Expr> {
    if !expr.contains_var(var) {
        return Ok(Expr::num(0.0));
    }
    Ok(match expr {
        Expr::Num(_) | Expr::Const(_) => Expr::num(0.0),
        Expr::Var(_) => Expr::num(1.0),
        Expr::Neg(e) => Expr::neg(derive(e, var)?),
        Expr::Bin(op, a, b) => {
            let (a, b) = (a.as_ref(), b.as_ref());
            match op {
                BinOp::Xor => return Err(unsupported("differentiate", expr)),
                BinOp::Add => Expr::add(derive(a, var)?, derive(b, var)?),
                BinOp::Sub => Expr::sub(derive(a, var)?, derive(b, var)?),
                BinOp::Mul => Expr::add(
                    Expr::mul(derive(a, var)?, b.clone()),
                    Expr::mul(a.clone(), derive(b, var)?),
                ),
                BinOp::Div => Expr::div(
                    Expr::sub(
                        Expr::mul(derive(a, var)?, b.clone()),
                        Expr::mul(a.clone(), derive(b, var)?),
                    ),
                    Expr::pow(b.clone(), Expr::num(2.0)),
                ),
                BinOp::Pow if !b.contains_var(var) => Expr::mul(
                    Expr::mul(
                        b.clone(),
                        Expr::pow(a.clone(), Expr::sub(b.clone(), Expr::num(1.0))),
                    ),
                    derive(a, var)?,
                ),
                BinOp::Pow if !a.contains_var(var) => Expr::mul(
                    Expr::mul(expr.clone(), Expr::call(Func::Log, a.clone())),
                    derive(b, var)?,
                ),
                BinOp::Pow => Expr::mul(
                    expr.clone(),
                    Expr::add(
                        Expr::mul(derive(b, var)?, Expr::call(Func::Log, a.clone())),
                        Expr::div(Expr::mul(b.clone(), derive(a, var)?), a.clone()),
                    ),
                ),
            }
        }
        Expr::Call(f, u) => Expr::mul(outer_derivative(*f, u)?, derive(u, var)?),
    })
}

fn outer_derivative(f: Func, u: &Expr) -> Result<Expr> {
    let u = u.clone();
    let one = || Expr::num(1.0);
    let square = |e: Expr| Expr::pow(e, Expr::num(2.0));
    Ok(match f {
        Func::Sin => Expr::call(Func::Cos, u),
        Func::Cos => Expr::neg(Expr::call(Func::Sin, u)),
        Func::Tan => Expr::div(one(), square(Expr::call(Func::Cos, u))),
        Func::Cot => Expr::neg(Expr::div(one(), square(Expr::call(Func::Sin, u)))),
        Func::Sec => Expr::mul(Expr::call(Func::Sec, u.clone()), Expr::call(Func::Tan, u)),
        Func::Csc => Expr::neg(Expr::mul(
            Expr::call(Func::Csc, u.clone()),
            Expr::call(Func::Cot, u),
        )),
        Func::Asin => Expr::div(one(), Expr::call(Func::Sqrt, Expr::sub(one(), square(u)))),
        Func::Acos => Expr::neg(Expr::div(
            one(),
            Expr::call(Func::Sqrt, Expr::sub(one(), square(u))),
        )),
        Func::Atan => Expr::div(one(), Expr::add(one(), square(u))),
        Func::Sinh => Expr::call(Func::Cosh, u),
        Func::Cosh => Expr::call(Func::Sinh, u),
        Func::Tanh => Expr::sub(one(), square(Expr::call(Func::Tanh, u))),
        Func::Exp => Expr::call(Func::Exp, u),
        Func::Log => Expr::div(one(), u),
        Func::Log10 => Expr::div(
            one(),
            Expr::mul(u, Expr::call(Func::Log, Expr::num(10.0))),
        ),
        Func::Log2 => Expr::div(one(), Expr::mul(u, Expr::call(Func::Log, Expr::num(2.0)))),
        Func::Sqrt => Expr::div(one(), Expr::mul(Expr::num(2.0), Expr::call(Func::Sqrt, u))),
        Func::Abs => Expr::call(Func::Sign, u),
        Func::Floor | Func::Ceil | Func::Round | Func::Sign => {
            return Err(GraphsError::OperationUnsupported(format!(
                "Cannot differentiate {}",
                f.name()
            )))
        }
    })
}

/// Slope of `u` if it is linear in `var` with a non-zero constant slope
fn linear_slope(u: &Expr, var: &str) -> Option<Expr> {
    let slope = simplify(&derive(u, var).ok()?);
    if slope.contains_var(var) || is_num(&slope, 0.0) {
        None
    } else {
        Some(slope)
    }
}

/// Antiderivative with respect to `var` from a table of standard forms
pub fn integrate(expr: &Expr, var: &str) -> Result<Expr> {
    Ok(simplify(&antiderivative(&simplify(expr), var)?))
}

fn antiderivative(expr: &Expr, var: &str) -> Result<Expr> {
    let x = Expr::var(var);
    if !expr.contains_var(var) {
        return Ok(Expr::mul(expr.clone(), x));
    }
    let fail = || unsupported("integrate", expr);

    match expr {
        Expr::Var(_) => Ok(Expr::div(Expr::pow(x, Expr::num(2.0)), Expr::num(2.0))),
        Expr::Neg(e) => Ok(Expr::neg(antiderivative(e, var)?)),
        Expr::Bin(BinOp::Add, a, b) => Ok(Expr::add(
            antiderivative(a, var)?,
            antiderivative(b, var)?,
        )),
        Expr::Bin(BinOp::Sub, a, b) => Ok(Expr::sub(
            antiderivative(a, var)?,
            antiderivative(b, var)?,
        )),
        Expr::Bin(BinOp::Mul, a, b) if !a.contains_var(var) => {
            Ok(Expr::mul((**a).clone(), antiderivative(b, var)?))
        }
        Expr::Bin(BinOp::Mul, a, b) if !b.contains_var(var) => {
            Ok(Expr::mul(antiderivative(a, var)?, (**b).clone()))
        }
        Expr::Bin(BinOp::Div, a, b) if !b.contains_var(var) => {
            Ok(Expr::div(antiderivative(a, var)?, (**b).clone()))
        }
        Expr::Bin(BinOp::Div, a, b) if !a.contains_var(var) => {
            if let Some(k) = linear_slope(b, var) {
                return Ok(Expr::mul(
                    (**a).clone(),
                    Expr::div(Expr::call(Func::Log, (**b).clone()), k),
                ));
            }
            if let Expr::Bin(BinOp::Pow, u, n) = b.as_ref() {
                return antiderivative(
                    &Expr::mul((**a).clone(), Expr::pow((**u).clone(), simplify_neg((**n).clone()))),
                    var,
                );
            }
            Err(fail())
        }
        Expr::Bin(BinOp::Pow, u, n) if !n.contains_var(var) => {
            let k = linear_slope(u, var).ok_or_else(fail)?;
            if n.constant_value() == Some(-1.0) {
                return Ok(Expr::div(Expr::call(Func::Log, (**u).clone()), k));
            }
            let n1 = Expr::add((**n).clone(), Expr::num(1.0));
            Ok(Expr::div(
                Expr::pow((**u).clone(), n1.clone()),
                Expr::mul(n1, k),
            ))
        }
        Expr::Bin(BinOp::Pow, c, u) if !c.contains_var(var) => {
            let k = linear_slope(u, var).ok_or_else(fail)?;
            if **c == Expr::Const(Constant::E) {
                return Ok(Expr::div(Expr::call(Func::Exp, (**u).clone()), k));
            }
            Ok(Expr::div(
                expr.clone(),
                Expr::mul(Expr::call(Func::Log, (**c).clone()), k),
            ))
        }
        Expr::Call(f, u) => {
            let k = linear_slope(u, var).ok_or_else(fail)?;
            let u = (**u).clone();
            let inner = match f {
                Func::Sin => Expr::neg(Expr::call(Func::Cos, u)),
                Func::Cos => Expr::call(Func::Sin, u),
                Func::Exp => Expr::call(Func::Exp, u),
                Func::Sinh => Expr::call(Func::Cosh, u),
                Func::Cosh => Expr::call(Func::Sinh, u),
                Func::Tan => Expr::neg(Expr::call(Func::Log, Expr::call(Func::Cos, u))),
                _ => return Err(fail()),
            };
            Ok(Expr::div(inner, k))
        }
        _ => Err(fail()),
    }
}

/// Fourier transform `F(k) = ∫ f(x) exp(-2πikx) dx` for Gaussian and
/// two-sided exponential terms, extended linearly
pub fn fourier(expr: &Expr, var: &str, k: &str) -> Result<Expr> {
    Ok(simplify(&fourier_term(&simplify(expr), var, k)?))
}

fn fourier_term(expr: &Expr, var: &str, k: &str) -> Result<Expr> {
    match expr {
        Expr::Neg(e) => Ok(Expr::neg(fourier_term(e, var, k)?)),
        Expr::Bin(BinOp::Add, a, b) => Ok(Expr::add(
            fourier_term(a, var, k)?,
            fourier_term(b, var, k)?,
        )),
        Expr::Bin(BinOp::Sub, a, b) => Ok(Expr::sub(
            fourier_term(a, var, k)?,
            fourier_term(b, var, k)?,
        )),
        Expr::Bin(BinOp::Mul, a, b) if !a.contains_var(var) => {
            Ok(Expr::mul((**a).clone(), fourier_term(b, var, k)?))
        }
        Expr::Bin(BinOp::Mul, a, b) if !b.contains_var(var) => {
            Ok(Expr::mul(fourier_term(a, var, k)?, (**b).clone()))
        }
        Expr::Bin(BinOp::Div, a, b) if !b.contains_var(var) => {
            Ok(Expr::div(fourier_term(a, var, k)?, (**b).clone()))
        }
        Expr::Call(Func::Exp, u) => exponential_transform(u, var, k)
            .ok_or_else(|| unsupported("compute the Fourier transform of", expr)),
        Expr::Bin(BinOp::Pow, base, u) if **base == Expr::Const(Constant::E) => {
            exponential_transform(u, var, k)
                .ok_or_else(|| unsupported("compute the Fourier transform of", expr))
        }
        _ => Err(unsupported("compute the Fourier transform of", expr)),
    }
}

/// Transform of `exp(u)` where `u` is `u0 - a*x^2` or `u0 - a*|x|`
fn exponential_transform(u: &Expr, var: &str, k: &str) -> Option<Expr> {
    let pi = || Expr::Const(Constant::Pi);
    let k = Expr::var(k);
    let k2 = || Expr::pow(k.clone(), Expr::num(2.0));
    let pi2 = || Expr::pow(pi(), Expr::num(2.0));

    if let Some((a, u0)) = gaussian_coefficients(u, var) {
        let result = Expr::mul(
            Expr::call(Func::Sqrt, Expr::div(pi(), a.clone())),
            Expr::call(Func::Exp, Expr::neg(Expr::div(Expr::mul(pi2(), k2()), a))),
        );
        return Some(Expr::mul(Expr::call(Func::Exp, u0), result));
    }

    const PLACEHOLDER: &str = "__abs";
    let abs_x = Expr::call(Func::Abs, Expr::var(var));
    let replaced = simplify(&replace(u, &abs_x, &Expr::var(PLACEHOLDER)));
    if replaced.contains_var(var) || !replaced.contains_var(PLACEHOLDER) {
        return None;
    }
    let slope = linear_slope(&replaced, PLACEHOLDER)?;
    if slope.constant_value()? >= 0.0 {
        return None;
    }
    let a = simplify(&Expr::neg(slope));
    let u0 = simplify(&substitute(&replaced, PLACEHOLDER, &Expr::num(0.0)));
    let result = Expr::div(
        Expr::mul(Expr::num(2.0), a.clone()),
        Expr::add(
            Expr::pow(a, Expr::num(2.0)),
            Expr::mul(Expr::mul(Expr::num(4.0), pi2()), k2()),
        ),
    );
    Some(Expr::mul(Expr::call(Func::Exp, u0), result))
}

/// `(a, u0)` such that `u = u0 - a*x^2` with `a > 0`
fn gaussian_coefficients(u: &Expr, var: &str) -> Option<(Expr, Expr)> {
    let d1 = simplify(&derive(u, var).ok()?);
    let d2 = simplify(&derive(&d1, var).ok()?);
    if d2.contains_any_var() || d2.constant_value()? >= 0.0 {
        return None;
    }
    let slope_at_zero = simplify(&substitute(&d1, var, &Expr::num(0.0)));
    if slope_at_zero.constant_value()? != 0.0 {
        return None;
    }
    let u0 = simplify(&substitute(u, var, &Expr::num(0.0)));
    if u0.contains_any_var() {
        return None;
    }
    let a = simplify(&Expr::div(Expr::neg(d2), Expr::num(2.0)));
    Some((a, u0))
}
