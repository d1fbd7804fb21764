//! Autoscaling of axis limits
//!
//! [`autoscale`] fits every axis to the visible data drawn against it,
//! respecting the axis scale. Equations have no intrinsic extent: they are
//! sampled over the range of their x axis and only contribute to the y axes.

use tracing::warn;

use crate::figure::{Direction, Limits};
use crate::model::ProjectModel;
use crate::scales::{self, Scale};

/// Number of points equations are sampled with
pub const EQUATION_SAMPLES: usize = 1000;

const Y_PADDING: f64 = 0.05;
const X_PADDING: f64 = 0.015;
const Y_LOG_FACTOR: f64 = 2.0;
const X_LOG_FACTOR: f64 = 1.025;

/// Values an axis is fitted to, and whether only equations supplied them
struct AxisData {
    values: Vec<f64>,
    equations_only: bool,
}

fn keep_value(value: f64, scale: Scale) -> bool {
    if !value.is_finite() {
        return false;
    }
    match scale {
        Scale::Log => value > 0.0,
        Scale::Inverse => value != 0.0,
        _ => true,
    }
}

fn equation_xdata(model: &ProjectModel, direction: Direction) -> Vec<f64> {
    let axis = model.figure.axis(direction);
    let (start, stop) = axis.scale.limit_range_for_scale(axis.min, axis.max);
    scales::sample(start, stop, EQUATION_SAMPLES, axis.scale)
}

fn collect(model: &ProjectModel, direction: Direction) -> AxisData {
    let mut data = AxisData {
        values: Vec::new(),
        equations_only: true,
    };
    let candidates = model
        .items
        .iter()
        .filter(|item| model.is_visible(item))
        .filter(|item| item.is_data_like() || item.equation_item().is_some());

    for item in candidates {
        let (xaxis, yaxis) = ProjectModel::item_axes(item);
        if direction != xaxis && direction != yaxis {
            continue;
        }
        match (item.data_item(), item.equation_item()) {
            (Some(d), _) => {
                data.equations_only = false;
                let values = if direction.is_x() { &d.xdata } else { &d.ydata };
                data.values.extend_from_slice(values);
            }
            (None, Some(eq)) => {
                let xdata = equation_xdata(model, xaxis);
                if direction.is_x() {
                    data.values.extend(xdata);
                    continue;
                }
                match eq.evaluate(&xdata) {
                    Ok(ydata) => data.values.extend(ydata),
                    Err(e) => warn!("Skipping '{}' while autoscaling: {}", item.name, e),
                }
            }
            (None, None) => {}
        }
    }
    data
}

/// Padded `(min, max)` for an axis, or `None` to leave it untouched
fn fit_axis(data: &AxisData, direction: Direction, scale: Scale) -> Option<(f64, f64)> {
    let mut kept = data.values.iter().copied().filter(|v| keep_value(*v, scale));
    let first = kept.next()?;
    let (mut min, mut max) = kept.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));

    // A single value has no span to pad
    if min == max {
        match scale {
            Scale::Log | Scale::Inverse => {
                let (a, b) = (min * 0.5, min * 2.0);
                min = a.min(b);
                max = a.max(b);
            }
            _ => {
                min -= 1.0;
                max += 1.0;
            }
        }
    }

    match scale {
        Scale::Linear | Scale::Radians | Scale::SquareRoot => {
            let factor = if !direction.is_x() {
                Y_PADDING
            } else if data.equations_only {
                0.0
            } else {
                X_PADDING
            };
            let span = max - min;
            max += factor * span;
            min -= factor * span;
        }
        Scale::Inverse => min *= 0.99,
        Scale::Log => {
            let factor = if direction.is_x() {
                X_LOG_FACTOR
            } else {
                Y_LOG_FACTOR
            };
            min /= factor;
            max *= factor;
        }
    }
    Some((min, max))
}

/// Limits fitted to the visible items of `model`
///
/// Axes without usable data keep their current range. The x axes are fitted
/// first so equations are sampled over the new horizontal range.
pub fn autoscale(model: &ProjectModel) -> Limits {
    let mut working = model.clone();
    for direction in [
        Direction::Bottom,
        Direction::Top,
        Direction::Left,
        Direction::Right,
    ] {
        let scale = working.figure.scale(direction);
        let data = collect(&working, direction);
        if let Some((min, max)) = fit_axis(&data, direction, scale) {
            working.figure.set_range(direction, min, max);
        }
    }
    working.figure.limits()
}

/// Data range selected by the highlight on the given x axis
pub fn highlight_range(model: &ProjectModel, direction: Direction) -> (f64, f64) {
    let figure = &model.figure;
    let axis = figure.axis(direction);
    let start = scales::value_at_fraction(figure.min_selected, axis.min, axis.max, axis.scale);
    let stop = scales::value_at_fraction(figure.max_selected, axis.min, axis.max, axis.scale);
    (start.min(stop), start.max(stop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use crate::style::StyleParams;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn model_with(items: Vec<Item>) -> ProjectModel {
        let mut model = ProjectModel::default();
        model.items = items;
        model
    }

    #[test]
    fn test_linear_padding() {
        let style = StyleParams::default();
        let model = model_with(vec![Item::data(
            "a",
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0, 0.0],
            &style,
        )]);
        let limits = autoscale(&model);
        assert!(close(limits[0], -0.03));
        assert!(close(limits[1], 2.03));
        assert!(close(limits[4], -0.05));
        assert!(close(limits[5], 1.05));
        // top and right axes have no data
        assert_eq!(limits[2..4], model.figure.limits()[2..4]);
    }

    #[test]
    fn test_log_scale_drops_non_positive() {
        let style = StyleParams::default();
        let mut model = model_with(vec![Item::data(
            "a",
            vec![1.0, 2.0, 3.0],
            vec![-1.0, 10.0, 100.0],
            &style,
        )]);
        model.figure.set_property_raw("left-scale", &1.into()).unwrap();
        let limits = autoscale(&model);
        assert!(close(limits[4], 5.0));
        assert!(close(limits[5], 200.0));
    }

    #[test]
    fn test_hidden_items_are_ignored() {
        let style = StyleParams::default();
        let mut hidden = Item::data("b", vec![100.0], vec![100.0], &style);
        hidden.selected = false;
        let mut model = model_with(vec![
            Item::data("a", vec![0.0, 1.0], vec![0.0, 1.0], &style),
            hidden,
        ]);
        let wide = autoscale(&model);
        model.figure.hide_unselected = true;
        let narrow = autoscale(&model);
        assert!(wide[1] > 100.0);
        assert!(close(narrow[1], 1.015));
    }

    #[test]
    fn test_equation_keeps_x_range() {
        let style = StyleParams::default();
        let mut model = model_with(vec![Item::equation("2*x", &style).unwrap()]);
        model.figure.set_range(Direction::Bottom, 0.0, 5.0);
        let limits = autoscale(&model);
        assert!(close(limits[0], 0.0));
        assert!(close(limits[1], 5.0));
        assert!(close(limits[4], -0.5));
        assert!(close(limits[5], 10.5));
    }

    #[test]
    fn test_single_point_gets_a_range() {
        let style = StyleParams::default();
        let mut model = model_with(vec![Item::data("a", vec![1.0], vec![3.0], &style)]);
        let limits = autoscale(&model);
        assert!(close(limits[0], -0.03));
        assert!(close(limits[1], 2.03));
        assert!(close(limits[4], 1.9));
        assert!(close(limits[5], 4.1));
        let fraction = scales::fraction_at_value(1.0, limits[0], limits[1], Scale::Linear);
        assert!(close(fraction, 0.5));

        model.figure.set_property_raw("left-scale", &1.into()).unwrap();
        let limits = autoscale(&model);
        assert!(close(limits[4], 0.75));
        assert!(close(limits[5], 12.0));
    }

    #[test]
    fn test_highlight_range() {
        let mut model = ProjectModel::default();
        model.figure.set_range(Direction::Bottom, 0.0, 4.0);
        model.figure.min_selected = 0.25;
        model.figure.max_selected = 0.75;
        assert_eq!(highlight_range(&model, Direction::Bottom), (1.0, 3.0));
    }
}
