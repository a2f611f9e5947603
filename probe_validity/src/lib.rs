//! Probe curve validation library.
//!
//! A measured 3-D point sequence (the probe curve) is compared against the
//! reference curve of a named mannequin profile. Each probe point is
//! classified as valid, invalid or ignored relative to an interpolated
//! reference point, and the whole comparison yields a single verdict built
//! from the per-point tolerance, the sampling density of the valid segment
//! and its total length.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod compare;

pub use compare::{
    distance, interpolate_at_axis, median_interval, polyline_length, validate_curve,
    CurveComparer, IntervalStats, Validation, ValidationDiagnostics,
};

#[derive(Error, Debug)]
pub enum ValidityError {
    #[error("profile id must not be empty")]
    EmptyProfileId,
    #[error("reference curve needs at least two points, got {0}")]
    InsufficientReference(usize),
    #[error("reference curve axis values must be strictly increasing (offending index {0})")]
    NonMonotonicReference(usize),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Classification tag of a single probe point. Written only by the
/// classifier; every run overwrites the tags of the whole curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointStatus {
    NotTested,
    Valid,
    Invalid,
    Ignored,
}

impl Default for PointStatus {
    fn default() -> Self {
        PointStatus::NotTested
    }
}

/// A 3-D point with its classification tag. The `y` coordinate is the
/// comparison axis used for ordering and interpolation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub status: PointStatus,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            status: PointStatus::NotTested,
        }
    }

    /// Coordinate equality; the classification tag is not part of a point's
    /// position.
    pub fn same_position(&self, other: &Point) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }
}

/// Ordered point sequence. The classifier assumes the sequence is
/// non-decreasing along `y` from the second element onward; the type itself
/// does not enforce this.
pub type Curve = Vec<Point>;

/// Aggregate outcome of one comparison. `NotTested` is the only
/// non-terminal state and exists only before a comparison runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    NotTested,
    Valid,
    Invalid,
    NotEnoughDataPoints,
    NotEnoughDataLength,
    ProfileUnavailable,
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::NotTested
    }
}

/// Scalar parameters of a mannequin profile, kept separate from the
/// reference curve so that loaders can deserialize them as one document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile name (ex. BOB001, BOB002, ARN001, CAT001, ...).
    pub id: String,
    /// A probe point is valid if it lies within this radius of its
    /// equivalent reference point.
    pub radius: f64,
    /// Fixed point the first probe point is validated against instead of the
    /// reference curve's own first point.
    pub anchor: Point,
    /// Probe points above this axis value are not tested.
    pub axis_upper_bound: f64,
    /// Allowed relative deviation of the valid segment length from the
    /// reference curve length (ex. 0.1 = 10%).
    pub length_tolerance: f64,
    /// Upper bound on the median distance between consecutive probe points.
    pub max_interval_median: f64,
}

/// A named reference curve plus its tolerance parameters. The curve is owned
/// by composition and validated once at construction; only `radius` can be
/// changed afterwards. Deliberately not deserializable: every profile goes
/// through `new` so the load-time checks cannot be bypassed.
#[derive(Clone, Debug)]
pub struct Profile {
    id: String,
    reference_curve: Curve,
    radius: f64,
    anchor: Point,
    axis_upper_bound: f64,
    length_tolerance: f64,
    max_interval_median: f64,
}

impl Profile {
    /// Build a profile from its scalar parameters and an axis-ascending
    /// reference curve.
    ///
    /// The curve must hold at least two points with strictly increasing `y`
    /// values; duplicate axis values would make interpolation degenerate, so
    /// they are rejected here rather than guarded per lookup.
    pub fn new(config: ProfileConfig, reference_curve: Curve) -> Result<Self, ValidityError> {
        if config.id.trim().is_empty() {
            return Err(ValidityError::EmptyProfileId);
        }
        if reference_curve.len() < 2 {
            return Err(ValidityError::InsufficientReference(reference_curve.len()));
        }
        for i in 1..reference_curve.len() {
            if reference_curve[i].y <= reference_curve[i - 1].y {
                return Err(ValidityError::NonMonotonicReference(i));
            }
        }
        if !config.radius.is_finite() || config.radius < 0.0 {
            return Err(ValidityError::InvalidParameter(
                "radius must be finite and non-negative".into(),
            ));
        }
        if !config.length_tolerance.is_finite() || !(0.0..=1.0).contains(&config.length_tolerance)
        {
            return Err(ValidityError::InvalidParameter(
                "length_tolerance must lie in [0, 1]".into(),
            ));
        }
        if !config.max_interval_median.is_finite() {
            return Err(ValidityError::InvalidParameter(
                "max_interval_median must be finite".into(),
            ));
        }
        if !config.axis_upper_bound.is_finite() {
            return Err(ValidityError::InvalidParameter(
                "axis_upper_bound must be finite".into(),
            ));
        }
        Ok(Self {
            id: config.id,
            reference_curve,
            radius: config.radius,
            anchor: config.anchor,
            axis_upper_bound: config.axis_upper_bound,
            length_tolerance: config.length_tolerance,
            max_interval_median: config.max_interval_median,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference_curve(&self) -> &[Point] {
        &self.reference_curve
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Tune the validity radius at runtime; negative values clamp to zero.
    pub fn set_radius(&mut self, value: f64) {
        self.radius = value.max(0.0);
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn axis_upper_bound(&self) -> f64 {
        self.axis_upper_bound
    }

    pub fn length_tolerance(&self) -> f64 {
        self.length_tolerance
    }

    pub fn max_interval_median(&self) -> f64 {
        self.max_interval_median
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str) -> ProfileConfig {
        ProfileConfig {
            id: id.to_string(),
            radius: 2.0,
            anchor: Point::new(2.1306, -17.9064, -2.1112),
            axis_upper_bound: 23.0,
            length_tolerance: 0.15,
            max_interval_median: 2.0,
        }
    }

    fn reference() -> Curve {
        vec![
            Point::new(0.0, -15.0, 0.0),
            Point::new(0.5, -10.0, 0.2),
            Point::new(1.0, 0.0, 0.4),
            Point::new(1.5, 10.0, 0.6),
        ]
    }

    #[test]
    fn profile_construction_succeeds_for_valid_inputs() {
        let profile = Profile::new(config("BOB001"), reference()).unwrap();
        assert_eq!(profile.id(), "BOB001");
        assert_eq!(profile.reference_curve().len(), 4);
        assert_eq!(profile.radius(), 2.0);
    }

    #[test]
    fn profile_rejects_empty_id() {
        assert!(matches!(
            Profile::new(config("  "), reference()),
            Err(ValidityError::EmptyProfileId)
        ));
    }

    #[test]
    fn profile_rejects_short_reference_curve() {
        let curve = vec![Point::new(0.0, 0.0, 0.0)];
        assert!(matches!(
            Profile::new(config("BOB001"), curve),
            Err(ValidityError::InsufficientReference(1))
        ));
    }

    #[test]
    fn profile_rejects_duplicate_axis_values() {
        let curve = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(0.5, 5.0, 0.0),
            Point::new(1.0, 5.0, 0.0),
        ];
        assert!(matches!(
            Profile::new(config("BOB001"), curve),
            Err(ValidityError::NonMonotonicReference(2))
        ));
    }

    #[test]
    fn profile_rejects_out_of_range_tolerances() {
        let mut cfg = config("BOB001");
        cfg.length_tolerance = 1.5;
        assert!(matches!(
            Profile::new(cfg, reference()),
            Err(ValidityError::InvalidParameter(_))
        ));

        let mut cfg = config("BOB001");
        cfg.radius = -1.0;
        assert!(matches!(
            Profile::new(cfg, reference()),
            Err(ValidityError::InvalidParameter(_))
        ));
    }

    #[test]
    fn set_radius_clamps_negative_values() {
        let mut profile = Profile::new(config("BOB001"), reference()).unwrap();
        profile.set_radius(3.5);
        assert_eq!(profile.radius(), 3.5);
        profile.set_radius(-1.0);
        assert_eq!(profile.radius(), 0.0);
    }

    #[test]
    fn point_status_defaults_to_not_tested_when_absent_from_json() {
        let point: Point = serde_json::from_str(r#"{"x":1.0,"y":2.0,"z":3.0}"#).unwrap();
        assert_eq!(point.status, PointStatus::NotTested);
        assert!(point.same_position(&Point::new(1.0, 2.0, 3.0)));
    }
}
