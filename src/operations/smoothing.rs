//! Smoothing filters

use crate::error::{GraphsError, Result};

/// Solve `a * x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let sum: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - sum) / a[row][row];
    }
    Some(x)
}

/// Least-squares polynomial coefficients, lowest order first
fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Option<Vec<f64>> {
    let m = degree + 1;
    let mut normal = vec![vec![0.0; m]; m];
    let mut rhs = vec![0.0; m];
    for (&x, &y) in xs.iter().zip(ys) {
        let mut powers = vec![1.0; 2 * m - 1];
        for k in 1..powers.len() {
            powers[k] = powers[k - 1] * x;
        }
        for i in 0..m {
            rhs[i] += y * powers[i];
            for j in 0..m {
                normal[i][j] += powers[i + j];
            }
        }
    }
    solve(normal, rhs)
}

fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Window length used for Savitzky-Golay smoothing of `len` points
///
/// `window_percent` of the data length, at least `polynomial + 1`, made odd
/// and capped at the data length.
pub fn savgol_window(len: usize, window_percent: f64, polynomial: usize) -> usize {
    let requested = (len as f64 * window_percent / 100.0) as usize;
    let mut window = requested.max(polynomial + 1);
    if window % 2 == 0 {
        window += 1;
    }
    if window > len {
        window = if len % 2 == 0 { len.saturating_sub(1) } else { len };
    }
    window
}

/// Savitzky-Golay filter over uniformly spaced samples
///
/// Interior points use the fitted polynomial's value at the window centre;
/// the first and last half windows are evaluated on the polynomial fitted
/// to the edge window.
pub fn savitzky_golay(ydata: &[f64], window: usize, polynomial: usize) -> Result<Vec<f64>> {
    let n = ydata.len();
    if window % 2 == 0 || window <= polynomial || window > n {
        return Err(GraphsError::Validation(format!(
            "Cannot smoothen {} points with a window of {} and polynomial order {}",
            n, window, polynomial
        )));
    }
    let half = window / 2;
    let scale = half.max(1) as f64;
    let positions: Vec<f64> = (0..window)
        .map(|i| (i as f64 - half as f64) / scale)
        .collect();
    let fit_error = || GraphsError::Validation("Smoothing fit is singular".to_string());

    // Convolution weights: the response of the fit at the centre to each sample
    let mut weights = Vec::with_capacity(window);
    for j in 0..window {
        let mut impulse = vec![0.0; window];
        impulse[j] = 1.0;
        let coefficients = polyfit(&positions, &impulse, polynomial).ok_or_else(fit_error)?;
        weights.push(polyval(&coefficients, 0.0));
    }

    let mut smoothed = vec![0.0; n];
    for i in half..n - half {
        smoothed[i] = weights
            .iter()
            .zip(&ydata[i - half..=i + half])
            .map(|(w, y)| w * y)
            .sum();
    }

    let head = polyfit(&positions, &ydata[..window], polynomial).ok_or_else(fit_error)?;
    let tail = polyfit(&positions, &ydata[n - window..], polynomial).ok_or_else(fit_error)?;
    for i in 0..half {
        smoothed[i] = polyval(&head, positions[i]);
        smoothed[n - half + i] = polyval(&tail, positions[window - half + i]);
    }
    Ok(smoothed)
}

/// Centred moving average whose box shrinks at the edges
pub fn moving_average(ydata: &[f64], box_width: usize) -> Result<Vec<f64>> {
    if box_width == 0 {
        return Err(GraphsError::Validation(
            "The moving average box must hold at least one point".to_string(),
        ));
    }
    let n = ydata.len();
    let before = box_width / 2;
    let after = box_width - before;
    Ok((0..n)
        .map(|i| {
            let window = &ydata[i.saturating_sub(before)..(i + after).min(n)];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_selection() {
        assert_eq!(savgol_window(100, 10.0, 3), 11);
        assert_eq!(savgol_window(20, 10.0, 3), 5);
        assert_eq!(savgol_window(4, 100.0, 1), 3);
    }

    #[test]
    fn test_savgol_preserves_polynomials() {
        let ydata: Vec<f64> = (0..30)
            .map(|i| {
                let x = i as f64;
                0.5 * x * x - 3.0 * x + 1.0
            })
            .collect();
        let smoothed = savitzky_golay(&ydata, 7, 2).unwrap();
        for (a, b) in smoothed.iter().zip(&ydata) {
            assert!((a - b).abs() < 1e-8, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_savgol_reduces_noise() {
        let ydata: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let smoothed = savitzky_golay(&ydata, 9, 2).unwrap();
        let interior_max = smoothed[10..40].iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(interior_max < 0.5);
    }

    #[test]
    fn test_savgol_rejects_bad_window() {
        assert!(savitzky_golay(&[1.0, 2.0, 3.0], 4, 2).is_err());
        assert!(savitzky_golay(&[1.0, 2.0, 3.0], 3, 3).is_err());
    }

    #[test]
    fn test_moving_average() {
        let smoothed = moving_average(&[0.0, 2.0, 4.0, 6.0, 8.0], 3).unwrap();
        // box of 3 -> one neighbour on each side, fewer at the edges
        assert_eq!(smoothed, vec![1.0, 2.0, 4.0, 6.0, 7.0]);
        assert!(moving_average(&[1.0], 0).is_err());
    }
}
