//! Normalisation of user-typed expressions
//!
//! Users type equations the way they would write them on paper. Before
//! parsing, every expression goes through [`preprocess`], which applies these
//! rewrites in order:
//!
//! 1. implicit multiplication between a number and a name: `3sigma` becomes
//!    `(3*sigma)`, `3sin(x)` becomes `3*sin(x)`
//! 2. `pi` becomes the literal `(π)`
//! 3. `^` becomes `**`
//! 4. `cot(e)`, `sec(e)`, `csc(e)` become reciprocals of `tan`, `cos`, `sin`,
//!    and `d(e)` converts degrees to radians
//! 5. superscript and subscript digit runs become `**<digits>`, `90°` becomes
//!    radians
//! 6. the result is lowercased

use regex::Regex;
use std::sync::OnceLock;

fn pi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\bpi\b").expect("valid regex"))
}

fn degree_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+(?:\.\d*)?)\s*°").expect("valid regex"))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Apply all rewrites to a raw expression
pub fn preprocess(input: &str) -> String {
    let s = insert_implicit_multiplication(input);
    let s = pi_pattern().replace_all(&s, "(π)").into_owned();
    let s = s.replace('^', "**");
    let s = rewrite_calls(&s, "cot", |inner| format!("(1/(tan({})))", inner));
    let s = rewrite_calls(&s, "sec", |inner| format!("(1/(cos({})))", inner));
    let s = rewrite_calls(&s, "csc", |inner| format!("(1/(sin({})))", inner));
    let s = rewrite_calls(&s, "d", |inner| format!("(({})*π/180)", inner));
    let s = translate_scripts(&s);
    s.to_lowercase()
}

/// Insert `*` between a number literal and the name that follows it
fn insert_implicit_multiplication(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let starts_number = c.is_ascii_digit()
            && (i == 0 || !(is_ident_char(chars[i - 1]) || chars[i - 1] == '.'));
        if !starts_number {
            out.push(c);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
            i += 1;
        }
        // Scientific notation belongs to the number
        if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
            let mut j = i + 1;
            if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                j += 1;
            }
            if j < chars.len() && chars[j].is_ascii_digit() {
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                i = j;
            }
        }
        let number: String = chars[start..i].iter().collect();

        if i < chars.len() && (chars[i].is_ascii_alphabetic() || chars[i] == '_') {
            let name_start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let name: String = chars[name_start..i].iter().collect();
            if i < chars.len() && chars[i] == '(' {
                out.push_str(&format!("{}*{}", number, name));
            } else {
                out.push_str(&format!("({}*{})", number, name));
            }
        } else {
            out.push_str(&number);
        }
    }
    out
}

/// Replace every `name(inner)` call, innermost arguments first
fn rewrite_calls(input: &str, name: &str, rewrite: impl Fn(&str) -> String + Copy) -> String {
    let chars: Vec<char> = input.chars().collect();
    let pattern: Vec<char> = name.chars().chain(std::iter::once('(')).collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let matches_here = chars[i..].starts_with(&pattern)
            && (i == 0 || !(is_ident_char(chars[i - 1]) || chars[i - 1] == '.'));
        if !matches_here {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let open = i + pattern.len() - 1;
        let Some(close) = matching_paren(&chars, open) else {
            // Unbalanced input is left for the parser to report
            out.extend(&chars[i..]);
            break;
        };
        let inner: String = chars[open + 1..close].iter().collect();
        let inner = rewrite_calls(&inner, name, rewrite);
        out.push_str(&rewrite(&inner));
        i = close + 1;
    }
    out
}

fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &c) in chars[open..].iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn script_digit(c: char) -> Option<char> {
    const SUPERSCRIPTS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];
    const SUBSCRIPTS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
    SUPERSCRIPTS
        .iter()
        .position(|&s| s == c)
        .or_else(|| SUBSCRIPTS.iter().position(|&s| s == c))
        .and_then(|d| char::from_digit(d as u32, 10))
}

fn translate_scripts(input: &str) -> String {
    let s = degree_pattern()
        .replace_all(input, "(($1)*π/180)")
        .into_owned();

    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        match script_digit(c) {
            Some(d) => {
                if !in_run {
                    out.push_str("**");
                    in_run = true;
                }
                out.push(d);
            }
            None => {
                in_run = false;
                out.push(c);
            }
        }
    }
    out
}
