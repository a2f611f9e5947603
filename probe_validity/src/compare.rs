//! Masking, point-wise classification and the aggregate decision, composed
//! into the validation pipeline, plus the profile registry facade.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Curve, Point, PointStatus, Profile, Verdict};

/// Euclidean distance between two points in 3-D space. The classification
/// tags play no part in the comparison.
pub fn distance(p1: &Point, p2: &Point) -> f64 {
    let dx = p1.x - p2.x;
    let dy = p1.y - p2.y;
    let dz = p1.z - p2.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Find the reference point at `target` on the comparison axis.
///
/// The search runs from the second point onward: an exact axis match returns
/// the curve's own point, otherwise the first bracketing pair is linearly
/// interpolated. A zero-length bracket falls back to its lower point and a
/// target beyond the curve's range falls back to the last point, so the
/// result is deterministic even off the happy path. Returns `None` only for
/// an empty curve.
pub fn interpolate_at_axis(curve: &[Point], target: f64) -> Option<Point> {
    for i in 1..curve.len() {
        if curve[i].y == target {
            return Some(curve[i]);
        }
        if curve[i].y > target {
            let before = curve[i - 1];
            let after = curve[i];
            let span = after.y - before.y;
            if span <= 0.0 {
                return Some(before);
            }
            let t = (target - before.y) / span;
            return Some(Point::new(
                before.x + (after.x - before.x) * t,
                target,
                before.z + (after.z - before.z) * t,
            ));
        }
    }
    curve.last().copied()
}

/// Total length of the polyline through `points`, in order.
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}

/// Median of a list of interval lengths using the historical parity rule:
/// with the list sorted ascending and `index = n / 2`, an odd count averages
/// the elements at `index` and `index - 1` while an even count takes the
/// element at `index`. A single-element list yields that element, since the
/// odd rule has no element before the midpoint there.
pub fn median_interval(intervals: &[f64]) -> Option<f64> {
    if intervals.is_empty() {
        return None;
    }
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|d| OrderedFloat(*d));
    let index = sorted.len() / 2;
    if sorted.len() == 1 {
        Some(sorted[0])
    } else if sorted.len() % 2 != 0 {
        Some((sorted[index] + sorted[index - 1]) / 2.0)
    } else {
        Some(sorted[index])
    }
}

/// Spread statistics of the consecutive-point intervals inside the valid
/// segment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IntervalStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// Per-run counters and measurements. Interval and length fields are filled
/// only when the corresponding pipeline stage actually ran; an invalid point
/// short-circuits the comparison and leaves them `None`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationDiagnostics {
    pub valid_points: usize,
    pub invalid_points: usize,
    pub ignored_points: usize,
    pub first_valid_index: Option<usize>,
    pub last_valid_index: Option<usize>,
    pub intervals: Option<IntervalStats>,
    pub reference_length: Option<f64>,
    pub probe_valid_length: Option<f64>,
}

/// Outcome of one comparison: the verdict, the probe curve with every
/// point's tag rewritten, and the run's diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Validation {
    pub verdict: Verdict,
    pub curve: Curve,
    pub diagnostics: ValidationDiagnostics,
}

#[derive(Debug, Default)]
struct PointScan {
    first_valid: Option<usize>,
    last_valid: Option<usize>,
    any_invalid: bool,
    valid: usize,
    invalid: usize,
    ignored: usize,
}

/// Single forward pass marking the untestable regions of the probe curve.
///
/// Every point after the first whose axis value lies below the reference
/// curve's start is ignored (the first point is exempt because it is tested
/// against the anchor, not the reference curve). The first point above the
/// axis upper bound and everything after it is ignored as well, giving a
/// contiguous ignored tail.
fn mask_ignored_points(curve: &mut [Point], profile: &Profile) {
    let floor = profile.reference_curve()[0].y;
    let upper = profile.axis_upper_bound();
    let mut cutoff = None;
    for (i, point) in curve.iter_mut().enumerate() {
        if i > 0 && point.y < floor {
            point.status = PointStatus::Ignored;
        }
        if point.y > upper {
            point.status = PointStatus::Ignored;
            cutoff = Some(i);
            break;
        }
    }
    if let Some(start) = cutoff {
        for point in curve.iter_mut().skip(start + 1) {
            point.status = PointStatus::Ignored;
        }
    }
}

/// Classify every non-ignored point against its equivalent reference point
/// and track the valid index range.
fn classify_points(curve: &mut [Point], profile: &Profile) -> PointScan {
    let mut scan = PointScan::default();
    let anchor = profile.anchor();
    for i in 0..curve.len() {
        if curve[i].status == PointStatus::Ignored {
            scan.ignored += 1;
            continue;
        }
        let equivalent = if i == 0 {
            anchor
        } else {
            // The reference curve of a constructed profile is never empty.
            interpolate_at_axis(profile.reference_curve(), curve[i].y).unwrap_or(anchor)
        };
        let dist = distance(&equivalent, &curve[i]);
        if dist <= profile.radius() {
            curve[i].status = PointStatus::Valid;
            // An anchor-matched point never opens the valid segment: the
            // stretch between the anchor and the reference curve's start is
            // not part of the measured length.
            if scan.first_valid.is_none() && !equivalent.same_position(&anchor) {
                scan.first_valid = Some(i);
            } else {
                scan.last_valid = Some(i);
            }
            scan.valid += 1;
        } else {
            curve[i].status = PointStatus::Invalid;
            scan.invalid += 1;
            scan.any_invalid = true;
        }
    }
    scan
}

/// Density and length checks over the valid segment. Runs only when no
/// point was out of tolerance.
fn decide(
    curve: &[Point],
    profile: &Profile,
    scan: &PointScan,
    diagnostics: &mut ValidationDiagnostics,
) -> Verdict {
    let (first, last) = match (scan.first_valid, scan.last_valid) {
        (Some(first), Some(last)) if last > first => (first, last),
        _ => return Verdict::NotEnoughDataPoints,
    };

    let segment = &curve[first..=last];
    let intervals: Vec<f64> = segment.windows(2).map(|w| distance(&w[0], &w[1])).collect();
    let median = match median_interval(&intervals) {
        Some(median) => median,
        None => return Verdict::NotEnoughDataPoints,
    };
    let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
    let max = intervals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    diagnostics.intervals = Some(IntervalStats {
        min,
        max,
        mean,
        median,
    });
    // A high median means large gaps between the sampled points.
    if median > profile.max_interval_median() {
        return Verdict::NotEnoughDataPoints;
    }

    let reference_length = polyline_length(profile.reference_curve());
    let probe_valid_length = polyline_length(segment);
    diagnostics.reference_length = Some(reference_length);
    diagnostics.probe_valid_length = Some(probe_valid_length);
    if (reference_length - probe_valid_length).abs()
        > profile.length_tolerance() * reference_length
    {
        return Verdict::NotEnoughDataLength;
    }

    Verdict::Valid
}

/// Run the full masking / classification / decision pipeline for one probe
/// curve against one profile.
///
/// The curve is taken by value and returned annotated, so concurrent
/// comparisons against different profiles never share mutable state. Every
/// point's tag is rewritten on each run; repeating the call with unchanged
/// inputs reproduces the same annotations and verdict.
pub fn validate_curve(profile: &Profile, mut curve: Curve) -> Validation {
    for point in curve.iter_mut() {
        point.status = PointStatus::NotTested;
    }

    mask_ignored_points(&mut curve, profile);
    let scan = classify_points(&mut curve, profile);
    let mut diagnostics = ValidationDiagnostics {
        valid_points: scan.valid,
        invalid_points: scan.invalid,
        ignored_points: scan.ignored,
        first_valid_index: scan.first_valid,
        last_valid_index: scan.last_valid,
        ..ValidationDiagnostics::default()
    };

    let verdict = if scan.any_invalid {
        // Any out-of-tolerance point fails the whole comparison; the density
        // and length checks are skipped.
        Verdict::Invalid
    } else {
        decide(&curve, profile, &scan, &mut diagnostics)
    };

    debug!(
        profile = profile.id(),
        ?verdict,
        valid = scan.valid,
        invalid = scan.invalid,
        ignored = scan.ignored,
        "probe curve classified"
    );

    Validation {
        verdict,
        curve,
        diagnostics,
    }
}

/// Registry of mannequin profiles plus the outcome of the most recent
/// comparison, kept for inspection and interactive radius re-tuning.
#[derive(Debug, Default)]
pub struct CurveComparer {
    profiles: HashMap<String, Profile>,
    current_id: Option<String>,
    probe: Option<Curve>,
    diagnostics: Option<ValidationDiagnostics>,
    verdict: Verdict,
}

impl CurveComparer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile under its id.
    pub fn register_profile(&mut self, profile: Profile) {
        self.profiles.insert(profile.id().to_string(), profile);
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    /// Classify `curve` against the named profile and keep the annotated
    /// result for inspection. An unknown id yields `ProfileUnavailable` and
    /// keeps the curve untouched, so `probe_curve` hands it back unannotated.
    pub fn classify(&mut self, profile_id: &str, curve: Curve) -> Verdict {
        self.verdict = Verdict::NotTested;
        let Some(profile) = self.profiles.get(profile_id) else {
            self.current_id = None;
            self.probe = Some(curve);
            self.diagnostics = None;
            self.verdict = Verdict::ProfileUnavailable;
            return self.verdict;
        };
        let outcome = validate_curve(profile, curve);
        self.current_id = Some(profile_id.to_string());
        self.probe = Some(outcome.curve);
        self.diagnostics = Some(outcome.diagnostics);
        self.verdict = outcome.verdict;
        self.verdict
    }

    /// Re-run the last comparison without resubmitting the probe curve,
    /// typically after `set_radius`. Without a stored comparison this is a
    /// no-op returning the current verdict.
    pub fn revalidate(&mut self) -> Verdict {
        let Some(id) = self.current_id.clone() else {
            return self.verdict;
        };
        let Some(probe) = self.probe.take() else {
            return self.verdict;
        };
        self.classify(&id, probe)
    }

    /// Tune a profile's radius (clamped at zero). Returns false when the
    /// profile is unknown.
    pub fn set_radius(&mut self, profile_id: &str, value: f64) -> bool {
        match self.profiles.get_mut(profile_id) {
            Some(profile) => {
                profile.set_radius(value);
                true
            }
            None => false,
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn current_profile(&self) -> Option<&Profile> {
        self.current_id.as_deref().and_then(|id| self.profiles.get(id))
    }

    pub fn probe_curve(&self) -> Option<&Curve> {
        self.probe.as_ref()
    }

    pub fn last_diagnostics(&self) -> Option<&ValidationDiagnostics> {
        self.diagnostics.as_ref()
    }
}
