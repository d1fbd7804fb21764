//! Axis scales and fraction/value arithmetic
//!
//! Every axis of a figure carries one of five [`Scale`]s. A scale maps data
//! values into a transformed space in which the axis is linear. Fractions of an
//! axis (the highlighted span, for instance) are converted to data values and
//! back through that transformed space.
//!
//! # Scale codes
//!
//! Scales are stored in projects by integer code:
//!
//! | code | scale       | forward        | inverse   |
//! |------|-------------|----------------|-----------|
//! | 0    | Linear      | `x`            | `y`       |
//! | 1    | Log         | `log10(x)`     | `10^y`    |
//! | 2    | Radians     | `x`            | `y`       |
//! | 3    | SquareRoot  | `sqrt(max(0,x))` | `y^2`   |
//! | 4    | Inverse     | `1/x`          | `1/y`     |

use serde::{Deserialize, Serialize};

/// Positive stand-in for non-positive bounds on scales that cannot show them
pub const MIN_POSITIVE_BOUND: f64 = 1e-300;

/// Axis scale type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum Scale {
    /// Linear scaling
    #[default]
    Linear,
    /// Base-10 logarithmic scaling
    Log,
    /// Linear scaling with ticks in multiples of pi
    Radians,
    /// Square-root scaling
    SquareRoot,
    /// Reciprocal scaling
    Inverse,
}

impl Scale {
    /// All scales in code order
    pub fn all() -> &'static [Scale] {
        &[
            Scale::Linear,
            Scale::Log,
            Scale::Radians,
            Scale::SquareRoot,
            Scale::Inverse,
        ]
    }

    /// Integer code used in project files
    pub fn code(self) -> u8 {
        match self {
            Scale::Linear => 0,
            Scale::Log => 1,
            Scale::Radians => 2,
            Scale::SquareRoot => 3,
            Scale::Inverse => 4,
        }
    }

    /// Look up a scale by its project-file code
    pub fn from_code(code: i64) -> Option<Scale> {
        match code {
            0 => Some(Scale::Linear),
            1 => Some(Scale::Log),
            2 => Some(Scale::Radians),
            3 => Some(Scale::SquareRoot),
            4 => Some(Scale::Inverse),
            _ => None,
        }
    }

    /// Get display name
    pub fn display_name(self) -> &'static str {
        match self {
            Scale::Linear => "Linear",
            Scale::Log => "Logarithmic",
            Scale::Radians => "Radians",
            Scale::SquareRoot => "Square Root",
            Scale::Inverse => "Inverse",
        }
    }

    /// Map a data value into the scale's linear space
    pub fn forward(self, x: f64) -> f64 {
        match self {
            Scale::Linear | Scale::Radians => x,
            Scale::Log => x.log10(),
            Scale::SquareRoot => x.max(0.0).sqrt(),
            Scale::Inverse => 1.0 / x,
        }
    }

    /// Map a value from the scale's linear space back to data space
    pub fn inverse(self, y: f64) -> f64 {
        match self {
            Scale::Linear | Scale::Radians => y,
            Scale::Log => 10f64.powf(y),
            Scale::SquareRoot => y * y,
            Scale::Inverse => 1.0 / y,
        }
    }

    /// Clamp a view range to the part of the real line the scale can show
    pub fn limit_range_for_scale(self, vmin: f64, vmax: f64) -> (f64, f64) {
        match self {
            Scale::Linear | Scale::Radians => (vmin, vmax),
            Scale::SquareRoot => (vmin.max(0.0), vmax),
            Scale::Log | Scale::Inverse => {
                let positive = |v: f64| if v <= 0.0 { MIN_POSITIVE_BOUND } else { v };
                (positive(vmin), positive(vmax))
            }
        }
    }

    /// Whether zero and negative values are meaningless on this scale
    pub fn drops_non_positive(self) -> bool {
        matches!(self, Scale::Log | Scale::Inverse)
    }

    /// Resolve the effective `(start, end)` pair used for fraction arithmetic
    fn effective_limits(self, start: f64, end: f64) -> (f64, f64) {
        match self {
            Scale::Inverse => {
                let start = if start <= 0.0 { end / 10.0 } else { start };
                (end, start)
            }
            _ => (start, end),
        }
    }
}

impl From<Scale> for u8 {
    fn from(scale: Scale) -> u8 {
        scale.code()
    }
}

impl TryFrom<u8> for Scale {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Scale::from_code(code as i64).ok_or_else(|| format!("unknown scale code {}", code))
    }
}

impl std::fmt::Display for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Data value found at `fraction` of the axis `[start, end]`
pub fn value_at_fraction(fraction: f64, start: f64, end: f64, scale: Scale) -> f64 {
    let (start, end) = scale.effective_limits(start, end);
    let (a, b) = (scale.forward(start), scale.forward(end));
    scale.inverse(a + fraction * (b - a))
}

/// Fraction of the axis `[start, end]` at which `value` is found
pub fn fraction_at_value(value: f64, start: f64, end: f64, scale: Scale) -> f64 {
    let (start, end) = scale.effective_limits(start, end);
    let (a, b) = (scale.forward(start), scale.forward(end));
    (scale.forward(value) - a) / (b - a)
}

/// Sample `steps` values from `start` to `stop`, evenly spaced in scale space
pub fn sample(start: f64, stop: f64, steps: usize, scale: Scale) -> Vec<f64> {
    let (a, b) = (scale.forward(start), scale.forward(stop));
    linspace(a, b, steps)
        .into_iter()
        .map(|v| scale.inverse(v))
        .collect()
}

/// `n` evenly spaced values from `start` to `stop`, both inclusive
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rel_close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_scale_codes_roundtrip() {
        for scale in Scale::all() {
            assert_eq!(Scale::from_code(scale.code() as i64), Some(*scale));
        }
        assert_eq!(Scale::from_code(5), None);
    }

    #[test]
    fn test_scale_serializes_as_code() {
        let json = serde_json::to_string(&Scale::SquareRoot).unwrap();
        assert_eq!(json, "3");
        let parsed: Scale = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Scale::Log);
        assert!(serde_json::from_str::<Scale>("9").is_err());
    }

    #[test]
    fn test_linear_fraction() {
        assert_eq!(value_at_fraction(0.25, 0.0, 4.0, Scale::Linear), 1.0);
        assert_eq!(fraction_at_value(3.0, 0.0, 4.0, Scale::Linear), 0.75);
    }

    #[test]
    fn test_log_fraction() {
        let v = value_at_fraction(0.5, 1.0, 100.0, Scale::Log);
        assert!(rel_close(v, 10.0));
    }

    #[test]
    fn test_inverse_swaps_limits() {
        // Fraction zero lands on the end limit
        let v = value_at_fraction(0.0, 1.0, 10.0, Scale::Inverse);
        assert!(rel_close(v, 10.0));
        let v = value_at_fraction(1.0, 1.0, 10.0, Scale::Inverse);
        assert!(rel_close(v, 1.0));
    }

    #[test]
    fn test_inverse_clamps_non_positive_start() {
        let v = value_at_fraction(1.0, -3.0, 10.0, Scale::Inverse);
        assert!(rel_close(v, 1.0));
    }

    #[test]
    fn test_limit_range_for_scale() {
        assert_eq!(Scale::SquareRoot.limit_range_for_scale(-1.0, 4.0), (0.0, 4.0));
        let (lo, hi) = Scale::Inverse.limit_range_for_scale(0.0, 2.0);
        assert!(lo > 0.0);
        assert_eq!(hi, 2.0);
        assert_eq!(Scale::Linear.limit_range_for_scale(-1.0, 1.0), (-1.0, 1.0));
    }

    #[test]
    fn test_sample_log() {
        let values = sample(1.0, 1000.0, 4, Scale::Log);
        assert_eq!(values.len(), 4);
        assert!(rel_close(values[1], 10.0));
        assert!(rel_close(values[3], 1000.0));
    }

    #[test]
    fn test_linspace_endpoints() {
        let values = linspace(0.0, 1.0, 11);
        assert_eq!(values.len(), 11);
        assert_eq!(values[0], 0.0);
        assert_eq!(values[10], 1.0);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    proptest! {
        #[test]
        fn test_linear_roundtrip(a in -1e6f64..1e6, width in 1e-3f64..1e6, f in 0.0f64..1.0) {
            let b = a + width;
            for scale in [Scale::Linear, Scale::Radians] {
                let v = value_at_fraction(f, a, b, scale);
                prop_assert!(rel_close(fraction_at_value(v, a, b, scale), f));
            }
        }

        #[test]
        fn test_positive_scales_roundtrip(a in 1e-3f64..1e3, ratio in 1.01f64..1e3, f in 0.0f64..1.0) {
            let b = a * ratio;
            for scale in [Scale::Log, Scale::SquareRoot, Scale::Inverse] {
                let v = value_at_fraction(f, a, b, scale);
                let back = fraction_at_value(v, a, b, scale);
                prop_assert!((back - f).abs() < 1e-9, "{:?}: {} vs {}", scale, back, f);

                let value = a + (b - a) * f;
                let frac = fraction_at_value(value, a, b, scale);
                prop_assert!(rel_close(value_at_fraction(frac, a, b, scale), value));
            }
        }
    }
}
