//! Crossfade curve implementations
//!
//! Three curve shapes with precise formulas for sample-accurate crossfade
//! mixing between the outgoing and incoming track of a transition.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Crossfade curve types
///
/// Each curve maps normalized progress [0, 1] to a volume multiplier:
/// - Linear: constant rate of change (precise, predictable)
/// - SCurve: smooth acceleration and deceleration (gentle, musical)
/// - Exponential: slow start, fast finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossfadeCurve {
    /// v(t) = t
    Linear,

    /// v(t) = 0.5 × (1 - cos(π × t))
    #[serde(alias = "s-curve", alias = "scurve", alias = "cosine")]
    SCurve,

    /// v(t) = t²
    Exponential,
}

impl CrossfadeCurve {
    /// Curve value at normalized position t in [0, 1].
    pub fn value(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            CrossfadeCurve::Linear => t,
            CrossfadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            CrossfadeCurve::Exponential => t * t,
        }
    }

    /// Fade-in multiplier at given position through the transition.
    ///
    /// 0.0 at the start of the fade, 1.0 at the end.
    pub fn fade_in(&self, position: f64) -> f64 {
        self.value(position)
    }

    /// Fade-out multiplier at given position through the transition.
    ///
    /// 1.0 at the start of the fade, 0.0 at the end. The fade-out is the
    /// curve evaluated at the reversed position, so the outgoing and
    /// incoming sides use the same shape.
    pub fn fade_out(&self, position: f64) -> f64 {
        self.value(1.0 - position.clamp(0.0, 1.0))
    }

    /// Parse curve from a stored or oracle-provided string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(CrossfadeCurve::Linear),
            "s_curve" | "s-curve" | "scurve" | "cosine" => Some(CrossfadeCurve::SCurve),
            "exponential" => Some(CrossfadeCurve::Exponential),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrossfadeCurve::Linear => "linear",
            CrossfadeCurve::SCurve => "s_curve",
            CrossfadeCurve::Exponential => "exponential",
        }
    }
}

impl Default for CrossfadeCurve {
    /// S-curve reads as the most musical default for blended transitions.
    fn default() -> Self {
        CrossfadeCurve::SCurve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_fade_in() {
        let curve = CrossfadeCurve::Linear;
        assert_eq!(curve.fade_in(0.0), 0.0);
        assert!((curve.fade_in(0.25) - 0.25).abs() < 1e-9);
        assert!((curve.fade_in(0.5) - 0.5).abs() < 1e-9);
        assert_eq!(curve.fade_in(1.0), 1.0);
    }

    #[test]
    fn test_linear_fade_out() {
        let curve = CrossfadeCurve::Linear;
        assert_eq!(curve.fade_out(0.0), 1.0);
        assert!((curve.fade_out(0.75) - 0.25).abs() < 1e-9);
        assert_eq!(curve.fade_out(1.0), 0.0);
    }

    #[test]
    fn test_scurve_symmetric() {
        let curve = CrossfadeCurve::SCurve;
        assert!(curve.fade_in(0.0).abs() < 1e-9);
        assert!((curve.fade_in(0.5) - 0.5).abs() < 1e-9);
        assert!((curve.fade_in(1.0) - 1.0).abs() < 1e-9);
        // Starts slower than linear, ends faster
        assert!(curve.fade_in(0.2) < 0.2);
        assert!(curve.fade_in(0.8) > 0.8);
        // fade_in + fade_out sum to unity at every point
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            assert!((curve.fade_in(t) + curve.fade_out(t) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_exponential_fade() {
        let curve = CrossfadeCurve::Exponential;
        assert!((curve.fade_in(0.5) - 0.25).abs() < 1e-9);
        // fade-out is the curve of the reversed position: (1-t)²
        assert!((curve.fade_out(0.5) - 0.25).abs() < 1e-9);
        assert!((curve.fade_out(0.25) - 0.5625).abs() < 1e-9);
    }

    #[test]
    fn test_clamping() {
        let curve = CrossfadeCurve::Linear;
        assert_eq!(curve.fade_in(-0.5), 0.0);
        assert_eq!(curve.fade_in(1.5), 1.0);
        assert_eq!(curve.fade_out(-0.5), 1.0);
        assert_eq!(curve.fade_out(1.5), 0.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!(CrossfadeCurve::parse("linear"), Some(CrossfadeCurve::Linear));
        assert_eq!(CrossfadeCurve::parse("s-curve"), Some(CrossfadeCurve::SCurve));
        assert_eq!(CrossfadeCurve::parse("cosine"), Some(CrossfadeCurve::SCurve));
        assert_eq!(
            CrossfadeCurve::parse("exponential"),
            Some(CrossfadeCurve::Exponential)
        );
        assert_eq!(CrossfadeCurve::parse("bogus"), None);
    }

    #[test]
    fn test_serde_aliases() {
        let curve: CrossfadeCurve = serde_json::from_str("\"s-curve\"").unwrap();
        assert_eq!(curve, CrossfadeCurve::SCurve);
        let curve: CrossfadeCurve = serde_json::from_str("\"s_curve\"").unwrap();
        assert_eq!(curve, CrossfadeCurve::SCurve);
        assert_eq!(serde_json::to_string(&curve).unwrap(), "\"s_curve\"");
    }
}
