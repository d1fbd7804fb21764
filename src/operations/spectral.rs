//! Numerical calculus and frequency-domain transforms
//!
//! The FFT helpers keep the real part of the transform and pair it with
//! the sample frequencies of the input spacing, sorted by frequency.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{GraphsError, Result};

fn require_points(len: usize, needed: usize, what: &str) -> Result<()> {
    if len < needed {
        return Err(GraphsError::Validation(format!(
            "At least {} points are needed to compute the {}",
            needed, what
        )));
    }
    Ok(())
}

/// Gradient `dy/dx` on a possibly non-uniform grid
///
/// Second-order central differences inside, first-order one-sided
/// differences at both ends.
pub fn gradient(xdata: &[f64], ydata: &[f64]) -> Result<Vec<f64>> {
    let n = ydata.len();
    require_points(n, 2, "derivative")?;
    let mut grad = vec![0.0; n];
    grad[0] = (ydata[1] - ydata[0]) / (xdata[1] - xdata[0]);
    grad[n - 1] = (ydata[n - 1] - ydata[n - 2]) / (xdata[n - 1] - xdata[n - 2]);
    for i in 1..n - 1 {
        let hs = xdata[i] - xdata[i - 1];
        let hd = xdata[i + 1] - xdata[i];
        grad[i] = -hd / (hs * (hd + hs)) * ydata[i - 1]
            + (hd - hs) / (hs * hd) * ydata[i]
            + hs / (hd * (hd + hs)) * ydata[i + 1];
    }
    Ok(grad)
}

/// Cumulative trapezoidal integral starting at zero
pub fn cumulative_trapezoid(xdata: &[f64], ydata: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    let mut integral = Vec::with_capacity(ydata.len());
    for i in 0..ydata.len() {
        if i > 0 {
            total += (xdata[i] - xdata[i - 1]) * (ydata[i] + ydata[i - 1]) / 2.0;
        }
        integral.push(total);
    }
    integral
}

/// Sample frequencies of an `n` point transform with sample spacing `d`
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * d);
    let positive = n.div_ceil(2);
    (0..n)
        .map(|i| {
            if i < positive {
                i as f64 * scale
            } else {
                -((n - i) as f64) * scale
            }
        })
        .collect()
}

fn transform(xdata: &[f64], ydata: &[f64], inverse: bool) -> Result<(Vec<f64>, Vec<f64>)> {
    let n = ydata.len();
    require_points(n, 2, "Fourier transform")?;
    let spacing = xdata[1] - xdata[0];
    if spacing == 0.0 || !spacing.is_finite() {
        return Err(GraphsError::Validation(
            "The first two x values must differ to compute a Fourier transform".to_string(),
        ));
    }

    let mut buffer: Vec<Complex<f64>> = ydata.iter().map(|&y| Complex::new(y, 0.0)).collect();
    let mut planner = FftPlanner::<f64>::new();
    let (fft, norm) = if inverse {
        (planner.plan_fft_inverse(n), 1.0 / n as f64)
    } else {
        (planner.plan_fft_forward(n), 1.0)
    };
    fft.process(&mut buffer);

    let mut pairs: Vec<(f64, f64)> = fftfreq(n, spacing)
        .into_iter()
        .zip(buffer.iter().map(|c| c.re * norm))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(pairs.into_iter().unzip())
}

/// Forward FFT as `(frequency, real part)` sorted by frequency
pub fn fft(xdata: &[f64], ydata: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    transform(xdata, ydata, false)
}

/// Inverse FFT as `(frequency, real part)` sorted by frequency
pub fn inverse_fft(xdata: &[f64], ydata: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    transform(xdata, ydata, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_non_uniform() {
        let x = [0.0, 1.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| v * v).collect();
        let grad = gradient(&x, &y).unwrap();
        // central differences are exact for quadratics
        assert!((grad[1] - 2.0).abs() < 1e-12);
        assert!((grad[2] - 6.0).abs() < 1e-12);
        assert_eq!(grad[0], 1.0);
        assert_eq!(grad[3], 7.0);
        assert!(gradient(&[1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_cumulative_trapezoid() {
        let integral = cumulative_trapezoid(&[0.0, 1.0, 2.0], &[0.0, 2.0, 4.0]);
        assert_eq!(integral, vec![0.0, 1.0, 4.0]);
    }

    #[test]
    fn test_fftfreq() {
        assert_eq!(fftfreq(4, 0.5), vec![0.0, 0.5, -1.0, -0.5]);
        assert_eq!(fftfreq(5, 1.0), vec![0.0, 0.2, 0.4, -0.4, -0.2]);
    }

    #[test]
    fn test_fft_of_constant() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let (freq, re) = fft(&x, &[1.0; 4]).unwrap();
        assert_eq!(freq, vec![-0.5, -0.25, 0.0, 0.25]);
        assert!((re[2] - 4.0).abs() < 1e-12);
        assert!(re[0].abs() < 1e-12 && re[1].abs() < 1e-12 && re[3].abs() < 1e-12);

        let (_, back) = inverse_fft(&x, &[4.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(back.iter().all(|v| (v - 1.0).abs() < 1e-12));
    }
}
