//! Expression tree shared by the evaluator and the symbolic passes

use std::fmt;

/// Named constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }
}

/// Binary operators, loosest binding first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Xor,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Xor => " xor ",
            BinOp::Add => " + ",
            BinOp::Sub => " - ",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Xor => 0,
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
            BinOp::Pow => 4,
        }
    }

    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            // Bitwise on integral operands only
            BinOp::Xor => {
                let integral = |v: f64| v.fract() == 0.0 && v.abs() < 9.0e15;
                if integral(a) && integral(b) {
                    ((a as i64) ^ (b as i64)) as f64
                } else {
                    f64::NAN
                }
            }
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

/// Built-in single-argument functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Cot,
    Sec,
    Csc,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Log10,
    Log2,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Sign,
}

impl Func {
    pub const ALL: [Func; 22] = [
        Func::Sin,
        Func::Cos,
        Func::Tan,
        Func::Cot,
        Func::Sec,
        Func::Csc,
        Func::Asin,
        Func::Acos,
        Func::Atan,
        Func::Sinh,
        Func::Cosh,
        Func::Tanh,
        Func::Exp,
        Func::Log,
        Func::Log10,
        Func::Log2,
        Func::Sqrt,
        Func::Abs,
        Func::Floor,
        Func::Ceil,
        Func::Round,
        Func::Sign,
    ];

    /// Resolve a function by the name used in expressions
    pub fn from_name(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "cot" => Func::Cot,
            "sec" => Func::Sec,
            "csc" => Func::Csc,
            "asin" | "arcsin" => Func::Asin,
            "acos" | "arccos" => Func::Acos,
            "atan" | "arctan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "log" | "ln" => Func::Log,
            "log10" => Func::Log10,
            "log2" => Func::Log2,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "round" => Func::Round,
            "sign" => Func::Sign,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Cot => "cot",
            Func::Sec => "sec",
            Func::Csc => "csc",
            Func::Asin => "arcsin",
            Func::Acos => "arccos",
            Func::Atan => "arctan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Log10 => "log10",
            Func::Log2 => "log2",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Floor => "floor",
            Func::Ceil => "ceil",
            Func::Round => "round",
            Func::Sign => "sign",
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Cot => 1.0 / x.tan(),
            Func::Sec => 1.0 / x.cos(),
            Func::Csc => 1.0 / x.sin(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Exp => x.exp(),
            Func::Log => x.ln(),
            Func::Log10 => x.log10(),
            Func::Log2 => x.log2(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
            Func::Floor => x.floor(),
            Func::Ceil => x.ceil(),
            // Half to even
            Func::Round => {
                let r = x.round();
                if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
                    r - x.signum()
                } else {
                    r
                }
            }
            Func::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    x
                }
            }
        }
    }
}

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Const(Constant),
    Var(String),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn num(v: f64) -> Expr {
        Expr::Num(v)
    }

    pub fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    pub fn neg(e: Expr) -> Expr {
        Expr::Neg(Box::new(e))
    }

    pub fn bin(op: BinOp, a: Expr, b: Expr) -> Expr {
        Expr::Bin(op, Box::new(a), Box::new(b))
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::bin(BinOp::Add, a, b)
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::bin(BinOp::Sub, a, b)
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::bin(BinOp::Mul, a, b)
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        Expr::bin(BinOp::Div, a, b)
    }

    pub fn pow(a: Expr, b: Expr) -> Expr {
        Expr::bin(BinOp::Pow, a, b)
    }

    pub fn call(f: Func, arg: Expr) -> Expr {
        Expr::Call(f, Box::new(arg))
    }

    /// Whether the variable `name` occurs anywhere in the tree
    pub fn contains_var(&self, name: &str) -> bool {
        match self {
            Expr::Num(_) | Expr::Const(_) => false,
            Expr::Var(v) => v == name,
            Expr::Neg(e) | Expr::Call(_, e) => e.contains_var(name),
            Expr::Bin(_, a, b) => a.contains_var(name) || b.contains_var(name),
        }
    }

    pub fn contains_any_var(&self) -> bool {
        match self {
            Expr::Num(_) | Expr::Const(_) => false,
            Expr::Var(_) => true,
            Expr::Neg(e) | Expr::Call(_, e) => e.contains_any_var(),
            Expr::Bin(_, a, b) => a.contains_any_var() || b.contains_any_var(),
        }
    }

    /// Collect variable names in order of first appearance
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Expr::Num(_) | Expr::Const(_) => {}
            Expr::Var(v) => {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Expr::Neg(e) | Expr::Call(_, e) => e.collect_variables(out),
            Expr::Bin(_, a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
        }
    }

    /// Numeric value if the tree has no variables
    pub fn constant_value(&self) -> Option<f64> {
        match self {
            Expr::Num(v) => Some(*v),
            Expr::Const(c) => Some(c.value()),
            Expr::Var(_) => None,
            Expr::Neg(e) => e.constant_value().map(|v| -v),
            Expr::Bin(op, a, b) => Some(op.apply(a.constant_value()?, b.constant_value()?)),
            Expr::Call(f, e) => e.constant_value().map(|v| f.apply(v)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Num(v) if *v < 0.0 => 3,
            Expr::Num(_) | Expr::Const(_) | Expr::Var(_) | Expr::Call(..) => 5,
            Expr::Neg(_) => 3,
            Expr::Bin(op, _, _) => op.precedence(),
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parens: bool) -> fmt::Result {
        if parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// `v` as a float literal that parses back to the same value
///
/// Integral values keep a `.0` so they are never read as integers, and
/// negative values are wrapped in parentheses.
pub(crate) fn float_literal(v: f64) -> String {
    if v.is_nan() {
        return "(0.0/0.0)".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "(1.0/0.0)" } else { "(-1.0/0.0)" }.to_string();
    }
    let mut digits = v.abs().to_string();
    if !digits.contains('.') {
        digits.push_str(".0");
    }
    if v < 0.0 {
        format!("(-{})", digits)
    } else {
        digits
    }
}

pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(v) => write!(f, "{}", format_number(*v)),
            Expr::Const(Constant::Pi) => write!(f, "pi"),
            Expr::Const(Constant::E) => write!(f, "e"),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Neg(e) => {
                write!(f, "-")?;
                e.fmt_child(f, e.precedence() <= 3)
            }
            Expr::Call(func, e) => write!(f, "{}({})", func.name(), e),
            Expr::Bin(op, a, b) => {
                let prec = op.precedence();
                let (left_parens, right_parens) = match op {
                    BinOp::Xor => (a.precedence() < prec, b.precedence() <= prec),
                    BinOp::Add => (false, b.precedence() < prec || matches!(**b, Expr::Neg(_))),
                    BinOp::Sub => (false, b.precedence() <= prec),
                    BinOp::Mul => (a.precedence() < prec, b.precedence() <= prec),
                    BinOp::Div => (a.precedence() < prec, b.precedence() <= prec),
                    BinOp::Pow => (a.precedence() <= prec, b.precedence() < 5),
                };
                a.fmt_child(f, left_parens)?;
                write!(f, "{}", op.symbol())?;
                b.fmt_child(f, right_parens)
            }
        }
    }
}
