//! Operations on equation items
//!
//! Equations are transformed symbolically and simplified afterwards, so an
//! equation item stays an equation. Operations that only make sense for
//! sampled data fail with `OperationUnsupported`.

use super::Operation;
use crate::error::{GraphsError, Result};
use crate::expression::{symbolic, Equation, Expr};

/// The equation text resulting from applying `operation` to `equation`
pub fn apply_to_equation(operation: &Operation, equation: &str) -> Result<String> {
    let expr = Equation::parse(equation)?.expr().clone();
    let x = Expr::var("x");
    let transformed = match operation {
        Operation::TranslateX(offset) => {
            symbolic::substitute(&expr, "x", &Expr::sub(x, Expr::num(*offset)))
        }
        Operation::TranslateY(offset) => Expr::add(expr, Expr::num(*offset)),
        Operation::MultiplyX(factor) => {
            if *factor == 0.0 {
                return Err(GraphsError::OperationUnsupported(
                    "Cannot multiply the x values of an equation by zero".to_string(),
                ));
            }
            symbolic::substitute(&expr, "x", &Expr::div(x, Expr::num(*factor)))
        }
        Operation::MultiplyY(factor) => Expr::mul(Expr::num(*factor), expr),
        Operation::Derivative => symbolic::differentiate(&expr, "x")?,
        Operation::Integral => symbolic::integrate(&expr, "x")?,
        Operation::Fft => {
            let transformed = symbolic::fourier(&expr, "x", "k")?;
            symbolic::substitute(&transformed, "k", &x)
        }
        Operation::Transform {
            input_x, input_y, ..
        } => {
            let identity_x = Equation::parse(input_x)
                .map(|e| *e.expr() == Expr::var("x"))
                .unwrap_or(false);
            if !identity_x {
                return Err(GraphsError::OperationUnsupported(
                    "Equations can only be transformed when x is left unchanged".to_string(),
                ));
            }
            let target = Equation::parse(input_y)?.expr().clone();
            if target.contains_var("y_min") || target.contains_var("y_max") {
                return Err(GraphsError::OperationUnsupported(
                    "Equations have no y extrema to transform with".to_string(),
                ));
            }
            symbolic::substitute(&target, "y", &expr)
        }
        other => {
            return Err(GraphsError::OperationUnsupported(format!(
                "{} is not available for equations",
                other.name()
            )))
        }
    };
    Ok(symbolic::simplify(&transformed).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{evaluate_over, Environment};

    fn value_at(equation: &str, x: f64) -> f64 {
        evaluate_over(equation, &[x]).unwrap()[0]
    }

    #[test]
    fn test_translate_and_multiply() {
        let shifted = apply_to_equation(&Operation::TranslateX(2.0), "x^2").unwrap();
        assert!((value_at(&shifted, 3.0) - 1.0).abs() < 1e-12);

        let raised = apply_to_equation(&Operation::TranslateY(1.5), "x").unwrap();
        assert!((value_at(&raised, 1.0) - 2.5).abs() < 1e-12);

        let stretched = apply_to_equation(&Operation::MultiplyX(2.0), "sin(x)").unwrap();
        assert!((value_at(&stretched, 2.0) - 1f64.sin()).abs() < 1e-12);

        let scaled = apply_to_equation(&Operation::MultiplyY(3.0), "x + 1").unwrap();
        assert!((value_at(&scaled, 1.0) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_derivative_and_integral() {
        assert_eq!(
            apply_to_equation(&Operation::Derivative, "x^3").unwrap(),
            "3*x^2"
        );
        let integral = apply_to_equation(&Operation::Integral, "2*x").unwrap();
        assert!((value_at(&integral, 3.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_requires_identity_x() {
        let op = Operation::Transform {
            input_x: "x".into(),
            input_y: "2*y + 1".into(),
            discard: false,
        };
        let result = apply_to_equation(&op, "x^2").unwrap();
        assert!((value_at(&result, 2.0) - 9.0).abs() < 1e-12);

        let op = Operation::Transform {
            input_x: "x + 1".into(),
            input_y: "y".into(),
            discard: false,
        };
        assert!(matches!(
            apply_to_equation(&op, "x"),
            Err(GraphsError::OperationUnsupported(_))
        ));
    }

    #[test]
    fn test_data_only_operations_are_unsupported() {
        for op in [Operation::Normalize, Operation::Cut, Operation::InverseFft] {
            assert!(matches!(
                apply_to_equation(&op, "x"),
                Err(GraphsError::OperationUnsupported(_))
            ));
        }
    }

    #[test]
    fn test_fourier_of_gaussian() {
        let result = apply_to_equation(&Operation::Fft, "exp(-pi*x^2)").unwrap();
        let env = Environment::new().with_x(&[0.0]);
        let at_zero = Equation::parse(&result).unwrap().evaluate_array(&env).unwrap()[0];
        assert!((at_zero - 1.0).abs() < 1e-9);
    }
}
