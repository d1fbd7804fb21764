//! Data operations
//!
//! An [`Operation`] maps the x/y data of one item to new data. Applying it
//! produces an [`OperationResult`] carrying the new arrays plus two flags:
//!
//! - `sort`: the result must be re-sorted by x once spliced back
//! - `discard`: the result replaces the whole dataset instead of only the
//!   operated points
//!
//! When the highlight is active only the points inside the highlighted span
//! are operated on; [`apply_in_span`] selects them and [`splice`] merges the
//! results back into the full dataset. Equation items are handled separately
//! through [`symbolic::apply_to_equation`]. Operations spanning several items
//! (`shift`, `combine`) are orchestrated by the engine with the helpers in
//! [`transforms`].

pub mod smoothing;
pub mod spectral;
pub mod symbolic;
pub mod transforms;

pub use transforms::CenterMode;

use crate::error::Result;

/// Parameters of the smoothing filters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothenParams {
    SavitzkyGolay { window_percent: f64, polynomial: usize },
    MovingAverage { box_width: usize },
}

/// A per-item data operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    TranslateX(f64),
    TranslateY(f64),
    MultiplyX(f64),
    MultiplyY(f64),
    Normalize,
    Center(CenterMode),
    Smoothen(SmoothenParams),
    Cut,
    Derivative,
    Integral,
    Fft,
    InverseFft,
    Transform {
        input_x: String,
        input_y: String,
        discard: bool,
    },
}

/// New data produced by an operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub xdata: Vec<f64>,
    pub ydata: Vec<f64>,
    pub sort: bool,
    pub discard: bool,
}

impl OperationResult {
    fn new(xdata: Vec<f64>, ydata: Vec<f64>, sort: bool, discard: bool) -> Self {
        Self {
            xdata,
            ydata,
            sort,
            discard,
        }
    }
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::TranslateX(_) => "Translate X",
            Operation::TranslateY(_) => "Translate Y",
            Operation::MultiplyX(_) => "Multiply X",
            Operation::MultiplyY(_) => "Multiply Y",
            Operation::Normalize => "Normalize",
            Operation::Center(_) => "Center",
            Operation::Smoothen(_) => "Smoothen",
            Operation::Cut => "Cut",
            Operation::Derivative => "Derivative",
            Operation::Integral => "Integral",
            Operation::Fft => "Fourier Transform",
            Operation::InverseFft => "Inverse Fourier Transform",
            Operation::Transform { .. } => "Transform",
        }
    }

    /// Apply to a complete dataset
    pub fn apply(&self, xdata: &[f64], ydata: &[f64]) -> Result<OperationResult> {
        let (x, y) = (xdata.to_vec(), ydata.to_vec());
        Ok(match self {
            Operation::TranslateX(offset) => {
                OperationResult::new(transforms::translate(xdata, *offset), y, true, false)
            }
            Operation::TranslateY(offset) => {
                OperationResult::new(x, transforms::translate(ydata, *offset), false, false)
            }
            Operation::MultiplyX(factor) => {
                OperationResult::new(transforms::multiply(xdata, *factor), y, true, false)
            }
            Operation::MultiplyY(factor) => {
                OperationResult::new(x, transforms::multiply(ydata, *factor), false, false)
            }
            Operation::Normalize => {
                OperationResult::new(x, transforms::normalize(ydata)?, false, false)
            }
            Operation::Center(mode) => {
                OperationResult::new(transforms::center(xdata, ydata, *mode)?, y, true, false)
            }
            Operation::Smoothen(SmoothenParams::SavitzkyGolay {
                window_percent,
                polynomial,
            }) => {
                let window = smoothing::savgol_window(ydata.len(), *window_percent, *polynomial);
                let smoothed = smoothing::savitzky_golay(ydata, window, *polynomial)?;
                OperationResult::new(x, smoothed, false, false)
            }
            Operation::Smoothen(SmoothenParams::MovingAverage { box_width }) => {
                let smoothed = smoothing::moving_average(ydata, *box_width)?;
                OperationResult::new(x, smoothed, false, false)
            }
            Operation::Cut => OperationResult::new(Vec::new(), Vec::new(), false, false),
            Operation::Derivative => {
                OperationResult::new(x, spectral::gradient(xdata, ydata)?, false, true)
            }
            Operation::Integral => {
                let integral = spectral::cumulative_trapezoid(xdata, ydata);
                OperationResult::new(x, integral, false, true)
            }
            Operation::Fft => {
                let (fx, fy) = spectral::fft(xdata, ydata)?;
                OperationResult::new(fx, fy, false, true)
            }
            Operation::InverseFft => {
                let (fx, fy) = spectral::inverse_fft(xdata, ydata)?;
                OperationResult::new(fx, fy, false, true)
            }
            Operation::Transform {
                input_x,
                input_y,
                discard,
            } => {
                let (tx, ty) = transforms::transform(xdata, ydata, input_x, input_y)?;
                OperationResult::new(tx, ty, true, *discard)
            }
        })
    }
}

/// Indices of the points with `start <= x <= stop`
pub fn select_span(xdata: &[f64], start: f64, stop: f64) -> Vec<usize> {
    xdata
        .iter()
        .enumerate()
        .filter(|(_, x)| **x >= start && **x <= stop)
        .map(|(i, _)| i)
        .collect()
}

/// Merge an operation result computed on `selected` points back into the
/// full dataset
///
/// A discarding result replaces everything. A result with one value per
/// selected point overwrites those points in place; any other result (a cut
/// yields none) replaces the selected points and is appended after the
/// remaining ones.
pub fn splice(
    xdata: &[f64],
    ydata: &[f64],
    selected: &[usize],
    result: OperationResult,
) -> (Vec<f64>, Vec<f64>) {
    let OperationResult {
        xdata: new_x,
        ydata: new_y,
        sort,
        discard,
    } = result;
    let (x, y) = if discard {
        (new_x, new_y)
    } else if new_x.len() == selected.len() && new_y.len() == selected.len() {
        let mut x = xdata.to_vec();
        let mut y = ydata.to_vec();
        for (k, &index) in selected.iter().enumerate() {
            x[index] = new_x[k];
            y[index] = new_y[k];
        }
        (x, y)
    } else {
        let mut keep = vec![true; xdata.len()];
        for &index in selected {
            keep[index] = false;
        }
        let mut x: Vec<f64> = xdata
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(v, _)| *v)
            .collect();
        let mut y: Vec<f64> = ydata
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(v, _)| *v)
            .collect();
        x.extend(new_x);
        y.extend(new_y);
        (x, y)
    };
    if sort {
        transforms::sort_by_x(x, y)
    } else {
        (x, y)
    }
}

/// Apply `operation` to the points of a dataset inside `span`, or to all
/// points when `span` is `None`
///
/// Returns `None` when the span selects no point.
pub fn apply_in_span(
    operation: &Operation,
    xdata: &[f64],
    ydata: &[f64],
    span: Option<(f64, f64)>,
) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
    let Some((start, stop)) = span else {
        let result = operation.apply(xdata, ydata)?;
        let all: Vec<usize> = (0..xdata.len()).collect();
        return Ok(Some(splice(xdata, ydata, &all, result)));
    };
    let selected = select_span(xdata, start, stop);
    if selected.is_empty() {
        return Ok(None);
    }
    let sel_x: Vec<f64> = selected.iter().map(|&i| xdata[i]).collect();
    let sel_y: Vec<f64> = selected.iter().map(|&i| ydata[i]).collect();
    let result = operation.apply(&sel_x, &sel_y)?;
    Ok(Some(splice(xdata, ydata, &selected, result)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_in_span() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [5.0, 4.0, 3.0, 2.0, 1.0];
        let (nx, ny) = apply_in_span(&Operation::Cut, &x, &y, Some((1.0, 3.0)))
            .unwrap()
            .unwrap();
        assert_eq!(nx, vec![0.0, 4.0]);
        assert_eq!(ny, vec![5.0, 1.0]);
    }

    #[test]
    fn test_translate_in_span_is_spliced_in_place() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 1.0, 2.0, 3.0];
        let (nx, ny) = apply_in_span(&Operation::TranslateY(10.0), &x, &y, Some((1.0, 2.0)))
            .unwrap()
            .unwrap();
        assert_eq!(nx, x.to_vec());
        assert_eq!(ny, vec![0.0, 11.0, 12.0, 3.0]);
    }

    #[test]
    fn test_translate_x_resorts() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 2.0];
        let (nx, ny) = apply_in_span(&Operation::TranslateX(5.0), &x, &y, Some((0.0, 0.5)))
            .unwrap()
            .unwrap();
        assert_eq!(nx, vec![1.0, 2.0, 5.0]);
        assert_eq!(ny, vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_discarding_operation_replaces_data() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 1.0, 4.0, 9.0];
        let (nx, ny) = apply_in_span(&Operation::Derivative, &x, &y, Some((1.0, 3.0)))
            .unwrap()
            .unwrap();
        assert_eq!(nx, vec![1.0, 2.0, 3.0]);
        assert_eq!(ny.len(), 3);
    }

    #[test]
    fn test_empty_span_is_skipped() {
        let result = apply_in_span(&Operation::Normalize, &[0.0], &[1.0], Some((5.0, 6.0)));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_whole_dataset_without_span() {
        let (_, ny) = apply_in_span(&Operation::Normalize, &[0.0, 1.0], &[2.0, 4.0], None)
            .unwrap()
            .unwrap();
        assert_eq!(ny, vec![0.5, 1.0]);
    }
}
