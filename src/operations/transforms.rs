//! Elementwise data transforms and cross-item helpers

use crate::error::{GraphsError, Result};
use crate::expression::{Environment, Equation};
use crate::scales::Scale;

pub fn translate(values: &[f64], offset: f64) -> Vec<f64> {
    values.iter().map(|v| v + offset).collect()
}

pub fn multiply(values: &[f64], factor: f64) -> Vec<f64> {
    values.iter().map(|v| v * factor).collect()
}

fn finite_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .reduce(f64::max)
}

fn finite_min(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .reduce(f64::min)
}

/// Divide by the maximum
pub fn normalize(ydata: &[f64]) -> Result<Vec<f64>> {
    match finite_max(ydata) {
        Some(max) if max != 0.0 => Ok(ydata.iter().map(|y| y / max).collect()),
        _ => Err(GraphsError::Validation(
            "Cannot normalize data without a non-zero maximum".to_string(),
        )),
    }
}

/// Where [`center`] puts the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenterMode {
    /// At the x value of the largest y value
    AtMaximum,
    /// Halfway between the smallest and largest x value
    AtMiddle,
}

impl CenterMode {
    pub fn from_code(code: u8) -> CenterMode {
        if code == 0 {
            CenterMode::AtMaximum
        } else {
            CenterMode::AtMiddle
        }
    }
}

pub fn center(xdata: &[f64], ydata: &[f64], mode: CenterMode) -> Result<Vec<f64>> {
    let empty = || GraphsError::Validation("Cannot center empty data".to_string());
    let origin = match mode {
        CenterMode::AtMaximum => {
            let (index, _) = ydata
                .iter()
                .enumerate()
                .filter(|(_, y)| y.is_finite())
                .max_by(|a, b| a.1.total_cmp(b.1))
                .ok_or_else(empty)?;
            xdata[index]
        }
        CenterMode::AtMiddle => {
            let min = finite_min(xdata).ok_or_else(empty)?;
            let max = finite_max(xdata).ok_or_else(empty)?;
            (min + max) / 2.0
        }
    };
    Ok(translate(xdata, -origin))
}

/// Evaluate a pair of expressions over `x`, `y` and their extrema
pub fn transform(
    xdata: &[f64],
    ydata: &[f64],
    input_x: &str,
    input_y: &str,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let env = Environment::new().with_x(xdata).with_y(ydata);
    let new_x = Equation::parse(input_x)?.evaluate_array(&env)?;
    let new_y = Equation::parse(input_y)?.evaluate_array(&env)?;
    Ok((new_x, new_y))
}

/// Concatenate datasets and sort them by x
pub fn combine<'a>(datasets: impl IntoIterator<Item = (&'a [f64], &'a [f64])>) -> (Vec<f64>, Vec<f64>) {
    let mut points: Vec<(f64, f64)> = datasets
        .into_iter()
        .flat_map(|(x, y)| x.iter().copied().zip(y.iter().copied()))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points.into_iter().unzip()
}

/// Sort paired data by x
pub fn sort_by_x(xdata: Vec<f64>, ydata: Vec<f64>) -> (Vec<f64>, Vec<f64>) {
    let mut points: Vec<(f64, f64)> = xdata.into_iter().zip(ydata).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points.into_iter().unzip()
}

/// Vertical shift for each dataset stacked in list order
///
/// On a logarithmic axis the shifts are factors, otherwise offsets. Each
/// dataset moves up by the extent of the dataset before it plus a tenth of
/// the axis range `(axis_min, axis_max)`, accumulated down the list. The
/// first dataset is stepped by the last one, so even a single dataset moves
/// clear of its old position. Zeros are ignored for the extent on log axes.
pub fn shift_values(ydatas: &[&[f64]], scale: Scale, axis_min: f64, axis_max: f64) -> Vec<f64> {
    let log = scale == Scale::Log;
    let count = ydatas.len();
    let mut accumulated = 0.0;
    let mut shifts = Vec::with_capacity(count);
    for index in 0..count {
        let previous = ydatas[(index + count - 1) % count];
        let step = if log {
            let nonzero: Vec<f64> = previous.iter().copied().filter(|v| *v != 0.0).collect();
            let ymin = finite_min(&nonzero).unwrap_or(1.0);
            let ymax = finite_max(&nonzero).unwrap_or(1.0);
            (ymax / ymin).abs().log10() + 0.1 * (axis_max / axis_min).abs().log10()
        } else {
            let ymin = finite_min(previous).unwrap_or(0.0);
            let ymax = finite_max(previous).unwrap_or(0.0);
            (ymax - ymin) + 0.1 * (axis_max - axis_min)
        };
        if step.is_finite() {
            accumulated += step;
        }
        shifts.push(if log { 10f64.powf(accumulated) } else { accumulated });
    }
    shifts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[1.0, 4.0, 2.0]).unwrap(), vec![0.25, 1.0, 0.5]);
        assert!(normalize(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_center_modes() {
        let x = [0.0, 1.0, 2.0, 3.0, 10.0];
        let y = [0.0, 1.0, 5.0, 1.0, 0.0];
        assert_eq!(
            center(&x, &y, CenterMode::AtMaximum).unwrap(),
            vec![-2.0, -1.0, 0.0, 1.0, 8.0]
        );
        assert_eq!(
            center(&x, &y, CenterMode::AtMiddle).unwrap(),
            vec![-5.0, -4.0, -3.0, -2.0, 5.0]
        );
    }

    #[test]
    fn test_transform_uses_extrema() {
        let (x, y) = transform(&[1.0, 2.0], &[3.0, 5.0], "x - x_min", "y / y_max").unwrap();
        assert_eq!(x, vec![0.0, 1.0]);
        assert_eq!(y, vec![0.6, 1.0]);
        assert!(transform(&[1.0], &[1.0], "x +", "y").is_err());
    }

    #[test]
    fn test_combine_sorts() {
        let (x, y) = combine([
            (&[2.0, 4.0][..], &[20.0, 40.0][..]),
            (&[1.0, 3.0][..], &[10.0, 30.0][..]),
        ]);
        assert_eq!(x, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(y, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_shift_values_linear_and_log() {
        let a = [0.0, 1.0];
        let b = [0.0, 2.0];
        let c = [5.0, 6.0];
        // First step comes from the last dataset, [5, 6]
        let linear = shift_values(&[&a, &b, &c], Scale::Linear, 0.0, 10.0);
        assert_eq!(linear, vec![2.0, 4.0, 7.0]);

        let d = [0.0, 1.0, 10.0];
        let log = shift_values(&[&d, &d], Scale::Log, 1.0, 10.0);
        assert!((log[0] - 10f64.powf(1.1)).abs() < 1e-9);
        assert!((log[1] - 10f64.powf(2.2)).abs() < 1e-9);
    }

    #[test]
    fn test_shift_values_single_dataset_moves() {
        let a = [2.0, 4.0];
        assert_eq!(shift_values(&[&a], Scale::Linear, 0.0, 20.0), vec![4.0]);
        assert!(shift_values(&[], Scale::Linear, 0.0, 1.0).is_empty());
    }
}
