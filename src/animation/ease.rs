use std::f64::consts::PI;

use crate::foundation::error::{LayercastError, LayercastResult};

/// Classic back-easing overshoot constant.
pub const DEFAULT_BACK_OVERSHOOT: f64 = 1.70158;

/// Easing functions used to map normalized animation progress.
///
/// Every variant maps `0 -> 0` and `1 -> 1` exactly. `OutBack`, `OutElastic` and a
/// `CubicBezier` with control y outside `[0, 1]` may leave `[0, 1]` in between.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    /// Linear interpolation.
    #[default]
    Linear,
    /// Quadratic ease-in.
    InQuad,
    /// Quadratic ease-out.
    OutQuad,
    /// Quadratic ease-in/out.
    InOutQuad,
    /// Cubic ease-in.
    InCubic,
    /// Cubic ease-out.
    OutCubic,
    /// Cubic ease-in/out.
    InOutCubic,
    /// Exponential ease-out.
    OutExpo,
    /// Ease-out that overshoots the target before settling.
    OutBack { overshoot: f64 },
    /// Damped spring oscillating around the target.
    OutElastic,
    /// CSS-style `cubic-bezier(x1, y1, x2, y2)`.
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl Ease {
    pub fn out_back() -> Self {
        Self::OutBack {
            overshoot: DEFAULT_BACK_OVERSHOOT,
        }
    }

    /// Resolve the conventional names (`ease-in`, `ease-out-back`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let ease = match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "linear" => Self::Linear,
            "ease-in" | "ease-in-cubic" => Self::InCubic,
            "ease-out" | "ease-out-cubic" => Self::OutCubic,
            "ease-in-out" | "ease-in-out-cubic" => Self::InOutCubic,
            "ease-in-quad" => Self::InQuad,
            "ease-out-quad" => Self::OutQuad,
            "ease-in-out-quad" => Self::InOutQuad,
            "ease-out-expo" => Self::OutExpo,
            "ease-out-back" => Self::out_back(),
            "ease-out-elastic" => Self::OutElastic,
            _ => return None,
        };
        Some(ease)
    }

    pub fn validate(self) -> LayercastResult<()> {
        match self {
            Self::OutBack { overshoot } if !overshoot.is_finite() || overshoot < 0.0 => Err(
                LayercastError::validation("ease-out-back overshoot must be finite and >= 0"),
            ),
            Self::CubicBezier { x1, y1, x2, y2 } => {
                if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
                    return Err(LayercastError::validation(
                        "cubic-bezier control points must be finite",
                    ));
                }
                if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
                    return Err(LayercastError::validation(
                        "cubic-bezier x control points must lie in [0, 1]",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// `true` when the curve can leave `[0, 1]` for `t` in `[0, 1]`.
    pub fn may_overshoot(self) -> bool {
        match self {
            Self::OutBack { .. } | Self::OutElastic => true,
            Self::CubicBezier { y1, y2, .. } => {
                !(0.0..=1.0).contains(&y1) || !(0.0..=1.0).contains(&y2)
            }
            _ => false,
        }
    }

    /// Apply this easing function to normalized progress `t` in `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::OutExpo => 1.0 - 2f64.powf(-10.0 * t),
            Self::OutBack { overshoot } => {
                let c1 = overshoot;
                let c3 = c1 + 1.0;
                let u = t - 1.0;
                1.0 + c3 * u.powi(3) + c1 * u.powi(2)
            }
            Self::OutElastic => {
                let c4 = (2.0 * PI) / 3.0;
                2f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
            }
            Self::CubicBezier { x1, y1, x2, y2 } => {
                let s = solve_bezier_param(t, x1, x2);
                bezier_component(s, y1, y2)
            }
        }
    }
}

/// One coordinate of a unit cubic Bézier with endpoints 0 and 1.
fn bezier_component(s: f64, c1: f64, c2: f64) -> f64 {
    let u = 1.0 - s;
    3.0 * u * u * s * c1 + 3.0 * u * s * s * c2 + s * s * s
}

fn bezier_component_derivative(s: f64, c1: f64, c2: f64) -> f64 {
    let u = 1.0 - s;
    3.0 * u * u * c1 + 6.0 * u * s * (c2 - c1) + 3.0 * s * s * (1.0 - c2)
}

/// Find `s` with `x(s) == x`: Newton first, bisection when it stalls.
fn solve_bezier_param(x: f64, x1: f64, x2: f64) -> f64 {
    const EPS: f64 = 1e-9;
    let mut s = x;
    for _ in 0..8 {
        let err = bezier_component(s, x1, x2) - x;
        if err.abs() < EPS {
            return s;
        }
        let d = bezier_component_derivative(s, x1, x2);
        if d.abs() < 1e-7 {
            break;
        }
        s = (s - err / d).clamp(0.0, 1.0);
    }

    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    s = x;
    for _ in 0..64 {
        let v = bezier_component(s, x1, x2);
        if (v - x).abs() < EPS {
            break;
        }
        if v < x {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) / 2.0;
    }
    s
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
