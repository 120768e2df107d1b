/////////////////////////////////////////////////////////////////////////////////////////////
//
// Converts collar and downhole survey records into 3D hole traces and locates depths on them.
//
// Created on: 02 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # desurvey
//!
//! Turns a collar position and an ordered list of survey stations into a 3D
//! polyline, by default with the minimum curvature method, and maps depths along
//! the hole back to positions.
//!
//! ## Conventions
//!
//! - Frame: X = East, Y = North, Z = Up (right-handed). Elevation decreases
//!   down a typical hole.
//! - `azimuth`: degrees clockwise from North, normalised into `[0, 360)`.
//! - `dip`: degrees from horizontal, negative downward, so `-90` is vertical down.
//! - Unit direction for `(azimuth a, dip p)` is `(cos p sin a, cos p cos a, sin p)`.
//!
//! ## Degenerate holes
//!
//! - No stations: the trace is the collar alone.
//! - When the first station is deeper than the collar, its orientation is
//!   assumed to hold from the collar down to it, so a single station at depth
//!   `d > 0` yields a straight two-point segment.
//! - A station at depth `0` coincides with the collar and is not duplicated,
//!   so a single station at depth `0` also yields the collar alone.
//! - A collar `total_depth` below the last station extends the trace along the
//!   last direction.
//!
//! ## Minimum curvature
//!
//! For consecutive unit directions `u1`, `u2` separated by `Δd` along the hole,
//! with dogleg `β = acos(u1 · u2)` and ratio factor `RF = 2/β · tan(β/2)`
//! (`RF = 1` when `β < 1e-9`), the displacement is `Δd/2 · (u1 + u2) · RF`.
//!
//! Two consecutive stations pointing in opposite directions (`β` within `1e-9`
//! of `π`) have no defined arc plane. Minimum curvature rejects such a pair with
//! [`DesurveyError::InvalidSurveyStation`], even though each station's angles
//! are in range.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DesurveyError;

/// Doglegs below this angle (radians) are treated as straight.
const STRAIGHT_DOGLEG: f64 = 1e-9;

/// Most points [`Desurveyor::trace`] will produce for a single hole.
pub const MAX_TRACE_POINTS: usize = 1_000_000;

/// One downhole orientation measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurveyStation {
    /// Distance along the hole from the collar.
    pub depth: f64,

    /// Degrees clockwise from North.
    pub azimuth: f64,

    /// Degrees from horizontal, negative downward.
    pub dip: f64,
}

impl SurveyStation {
    pub fn new(depth: f64, azimuth: f64, dip: f64) -> Self {
        Self { depth, azimuth, dip }
    }
}

/// The top of a hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collar {
    pub hole_id: String,

    /// Collar position as `[x, y, z]`.
    pub position: [f64; 3],

    /// Final depth of the hole, if known.
    #[serde(default)]
    pub total_depth: Option<f64>,
}

impl Collar {
    pub fn new(hole_id: impl Into<String>, position: [f64; 3]) -> Self {
        Self { hole_id: hole_id.into(), position, total_depth: None }
    }

    /// Sets the final depth of the hole.
    pub fn with_total_depth(mut self, total_depth: f64) -> Self {
        self.total_depth = Some(total_depth);
        self
    }
}

/// A position on a desurveyed hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesurveyedPoint {
    pub hole_id: String,

    /// Distance along the hole from the collar.
    pub depth: f64,

    /// Position as `[x, y, z]`.
    pub position: [f64; 3],
}

/// World positions of an assay interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalPosition {
    pub hole_id: String,
    pub depth_from: f64,
    pub depth_to: f64,
    pub from: [f64; 3],
    pub to: [f64; 3],

    /// Position at the mid depth, on the trace rather than on the chord.
    pub mid: [f64; 3],
}

/// Method used to integrate the hole path between stations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesurveyMethod {
    /// Circular arc between stations.
    #[default]
    MinimumCurvature,

    /// Straight segment along the lower station's direction.
    Tangential,

    /// Straight segment along the mean of the two stations' angles.
    AverageAngle,
}

/// Unit direction for an azimuth and dip in degrees.
#[inline]
pub fn direction_vector(azimuth: f64, dip: f64) -> [f64; 3] {
    let (az, dip) = (azimuth.to_radians(), dip.to_radians());
    [dip.cos() * az.sin(), dip.cos() * az.cos(), dip.sin()]
}

/// Desurveys a hole with the minimum curvature method.
///
/// # Errors
///
/// Besides out-of-order or out-of-range stations, a pair of consecutive
/// stations whose directions reverse (dogleg of `π`) is reported as
/// [`DesurveyError::InvalidSurveyStation`].
pub fn desurvey(
    collar: &Collar,
    stations: &[SurveyStation],
) -> Result<Vec<DesurveyedPoint>, DesurveyError> {
    desurvey_with_method(collar, stations, DesurveyMethod::MinimumCurvature)
}

/// Desurveys a hole with the given method.
///
/// Returns one point for the collar at depth `0` followed by one point per
/// station (and one for an extended total depth), ordered by depth.
pub fn desurvey_with_method(
    collar: &Collar,
    stations: &[SurveyStation],
    method: DesurveyMethod,
) -> Result<Vec<DesurveyedPoint>, DesurveyError> {
    let hole_id = &collar.hole_id;

    if let Some(c) = collar.position.iter().find(|c| !c.is_finite()) {
        return Err(DesurveyError::InvalidSurveyStation {
            hole_id: hole_id.clone(),
            index: 0,
            reason: format!("collar coordinate {c} is not finite"),
        });
    }

    let mut nodes = validate_stations(hole_id, stations)?;

    let mut points = vec![DesurveyedPoint {
        hole_id: hole_id.clone(),
        depth: 0.0,
        position: collar.position,
    }];

    let Some(first) = nodes.first().copied() else {
        if collar.total_depth.is_some_and(|td| td > 0.0) {
            tracing::debug!(hole_id = %hole_id, "no survey stations, total depth ignored");
        }
        return Ok(points);
    };

    if first.depth > 0.0 {
        nodes.insert(0, SurveyStation { depth: 0.0, ..first });
    }

    if let Some(total_depth) = collar.total_depth {
        let last = nodes[nodes.len() - 1];
        if !(total_depth.is_finite() && total_depth >= last.depth) {
            return Err(DesurveyError::InvalidTotalDepth {
                hole_id: hole_id.clone(),
                total_depth,
                last_station_depth: last.depth,
            });
        }
        if total_depth > last.depth {
            nodes.push(SurveyStation { depth: total_depth, ..last });
        }
    }

    let mut position = collar.position;
    for (i, pair) in nodes.windows(2).enumerate() {
        let (upper, lower) = (pair[0], pair[1]);
        let step = displacement(hole_id, i + 1, &upper, &lower, method)?;
        position = [position[0] + step[0], position[1] + step[1], position[2] + step[2]];
        points.push(DesurveyedPoint {
            hole_id: hole_id.clone(),
            depth: lower.depth,
            position,
        });
    }

    Ok(points)
}

/// Checks station values and ordering, returning the stations with azimuths
/// normalised into `[0, 360)`.
fn validate_stations(
    hole_id: &str,
    stations: &[SurveyStation],
) -> Result<Vec<SurveyStation>, DesurveyError> {
    let invalid = |index: usize, reason: String| DesurveyError::InvalidSurveyStation {
        hole_id: hole_id.to_string(),
        index,
        reason,
    };

    let mut out: Vec<SurveyStation> = Vec::with_capacity(stations.len() + 2);
    for (index, station) in stations.iter().enumerate() {
        if !(station.depth.is_finite() && station.depth >= 0.0) {
            return Err(invalid(index, format!("depth {} must be finite and non-negative", station.depth)));
        }
        if !station.azimuth.is_finite() {
            return Err(invalid(index, format!("azimuth {} is not finite", station.azimuth)));
        }
        if !(station.dip.is_finite() && (-90.0..=90.0).contains(&station.dip)) {
            return Err(invalid(index, format!("dip {} is outside [-90, 90]", station.dip)));
        }
        if let Some(previous) = out.last() {
            if station.depth <= previous.depth {
                return Err(DesurveyError::InvalidSurveyOrder {
                    hole_id: hole_id.to_string(),
                    index,
                    previous_depth: previous.depth,
                    depth: station.depth,
                });
            }
        }
        out.push(SurveyStation {
            depth: station.depth,
            azimuth: station.azimuth.rem_euclid(360.0),
            dip: station.dip,
        });
    }
    Ok(out)
}

/// Displacement between two stations.
fn displacement(
    hole_id: &str,
    index: usize,
    upper: &SurveyStation,
    lower: &SurveyStation,
    method: DesurveyMethod,
) -> Result<[f64; 3], DesurveyError> {
    let length = lower.depth - upper.depth;
    let u1 = direction_vector(upper.azimuth, upper.dip);
    let u2 = direction_vector(lower.azimuth, lower.dip);

    let step = match method {
        DesurveyMethod::MinimumCurvature => {
            let dot = (u1[0] * u2[0] + u1[1] * u2[1] + u1[2] * u2[2]).clamp(-1.0, 1.0);
            let dogleg = dot.acos();
            if std::f64::consts::PI - dogleg < STRAIGHT_DOGLEG {
                return Err(DesurveyError::InvalidSurveyStation {
                    hole_id: hole_id.to_string(),
                    index,
                    reason: "hole reverses direction between stations".to_string(),
                });
            }
            let ratio_factor = match dogleg < STRAIGHT_DOGLEG {
                true => 1.0,
                false => 2.0 / dogleg * (dogleg / 2.0).tan(),
            };
            let scale = length / 2.0 * ratio_factor;
            [
                scale * (u1[0] + u2[0]),
                scale * (u1[1] + u2[1]),
                scale * (u1[2] + u2[2]),
            ]
        }
        DesurveyMethod::Tangential => [length * u2[0], length * u2[1], length * u2[2]],
        DesurveyMethod::AverageAngle => {
            // Shortest signed turn, so 350° and 10° average to 0°.
            let turn = (lower.azimuth - upper.azimuth + 540.0).rem_euclid(360.0) - 180.0;
            let azimuth = upper.azimuth + turn / 2.0;
            let dip = (upper.dip + lower.dip) / 2.0;
            let u = direction_vector(azimuth, dip);
            [length * u[0], length * u[1], length * u[2]]
        }
    };

    Ok(step)
}

/// Position at `depth` on an ordered trace, by linear interpolation between the
/// bracketing points.
pub fn locate_on_trace(
    hole_id: &str,
    trace: &[DesurveyedPoint],
    depth: f64,
) -> Result<[f64; 3], DesurveyError> {
    let max_depth = trace.last().map_or(0.0, |p| p.depth);
    let out_of_range = || DesurveyError::DepthOutOfRange {
        hole_id: hole_id.to_string(),
        depth,
        max_depth,
    };

    if trace.is_empty() || !depth.is_finite() || depth < 0.0 || depth > max_depth {
        return Err(out_of_range());
    }

    let upper = trace.partition_point(|p| p.depth < depth);
    let Some(below) = trace.get(upper) else {
        return Err(out_of_range());
    };
    if below.depth == depth || upper == 0 {
        return Ok(below.position);
    }

    let above = &trace[upper - 1];
    let t = (depth - above.depth) / (below.depth - above.depth);
    Ok([
        above.position[0] + t * (below.position[0] - above.position[0]),
        above.position[1] + t * (below.position[1] - above.position[1]),
        above.position[2] + t * (below.position[2] - above.position[2]),
    ])
}

#[derive(Debug, Clone)]
struct HoleRecord {
    collar: Collar,
    stations: Vec<SurveyStation>,
    points: Vec<DesurveyedPoint>,
}

/// Outcome of a batch desurvey.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesurveySummary {
    /// Holes desurveyed and cached, in input order.
    pub desurveyed: Vec<String>,

    /// Holes that failed validation, with the reason.
    pub failed: Vec<(String, DesurveyError)>,
}

/// Per-hole cache of desurveyed traces.
///
/// Traces are computed when a hole is inserted and recomputed whenever its
/// stations change. Queries hand out copies, never references into the cache.
#[derive(Debug, Clone, Default)]
pub struct Desurveyor {
    method: DesurveyMethod,
    holes: HashMap<String, HoleRecord>,
}

impl Desurveyor {
    /// Creates an empty cache using `method` for every hole.
    pub fn new(method: DesurveyMethod) -> Self {
        Self { method, holes: HashMap::new() }
    }

    /// The desurvey method in use.
    pub fn method(&self) -> DesurveyMethod {
        self.method
    }

    /// Desurveys a hole and caches its trace, replacing any previous entry with
    /// the same id.
    pub fn insert_hole(
        &mut self,
        collar: Collar,
        stations: Vec<SurveyStation>,
    ) -> Result<Vec<DesurveyedPoint>, DesurveyError> {
        // A failed re-insert must not leave the stale trace behind.
        self.holes.remove(&collar.hole_id);

        let points = desurvey_with_method(&collar, &stations, self.method)?;
        let copy = points.clone();
        self.holes.insert(
            collar.hole_id.clone(),
            HoleRecord { collar, stations, points },
        );
        Ok(copy)
    }

    /// Replaces a hole's survey stations, invalidating and recomputing its trace.
    ///
    /// If the new stations are invalid the hole is removed from the cache.
    pub fn update_stations(
        &mut self,
        hole_id: &str,
        stations: Vec<SurveyStation>,
    ) -> Result<Vec<DesurveyedPoint>, DesurveyError> {
        let record = self.holes.remove(hole_id).ok_or_else(|| DesurveyError::UnknownHole {
            hole_id: hole_id.to_string(),
        })?;
        self.insert_hole(record.collar, stations)
    }

    /// Drops a hole from the cache. Returns `true` if it was present.
    pub fn remove_hole(&mut self, hole_id: &str) -> bool {
        self.holes.remove(hole_id).is_some()
    }

    /// Drops every cached hole.
    pub fn clear(&mut self) {
        self.holes.clear();
    }

    /// Whether a trace is cached for `hole_id`.
    pub fn contains(&self, hole_id: &str) -> bool {
        self.holes.contains_key(hole_id)
    }

    /// Number of cached holes.
    pub fn len(&self) -> usize {
        self.holes.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }

    /// Identifiers of the cached holes, sorted.
    pub fn hole_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.holes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The survey stations a hole was desurveyed from.
    pub fn stations(&self, hole_id: &str) -> Result<Vec<SurveyStation>, DesurveyError> {
        Ok(self.record(hole_id)?.stations.clone())
    }

    /// A copy of the cached trace.
    pub fn points(&self, hole_id: &str) -> Result<Vec<DesurveyedPoint>, DesurveyError> {
        Ok(self.record(hole_id)?.points.clone())
    }

    /// Deepest desurveyed depth of a hole.
    pub fn max_depth(&self, hole_id: &str) -> Result<f64, DesurveyError> {
        Ok(self.record(hole_id)?.points.last().map_or(0.0, |p| p.depth))
    }

    /// Position at `depth` along a hole.
    pub fn locate(&self, hole_id: &str, depth: f64) -> Result<[f64; 3], DesurveyError> {
        locate_on_trace(hole_id, &self.record(hole_id)?.points, depth)
    }

    /// Positions of an interval's ends and mid depth.
    ///
    /// Ends are clamped into the desurveyed range and swapped if given in reverse.
    pub fn locate_interval(
        &self,
        hole_id: &str,
        depth_from: f64,
        depth_to: f64,
    ) -> Result<IntervalPosition, DesurveyError> {
        let record = self.record(hole_id)?;
        let max_depth = record.points.last().map_or(0.0, |p| p.depth);

        for depth in [depth_from, depth_to] {
            if !depth.is_finite() {
                return Err(DesurveyError::DepthOutOfRange {
                    hole_id: hole_id.to_string(),
                    depth,
                    max_depth,
                });
            }
        }

        let (lo, hi) = match depth_from <= depth_to {
            true => (depth_from, depth_to),
            false => (depth_to, depth_from),
        };
        let lo = lo.clamp(0.0, max_depth);
        let hi = hi.clamp(0.0, max_depth);

        Ok(IntervalPosition {
            hole_id: hole_id.to_string(),
            depth_from: lo,
            depth_to: hi,
            from: locate_on_trace(hole_id, &record.points, lo)?,
            to: locate_on_trace(hole_id, &record.points, hi)?,
            mid: locate_on_trace(hole_id, &record.points, (lo + hi) / 2.0)?,
        })
    }

    /// Resamples a hole at a regular depth spacing, always including the collar
    /// and the deepest point.
    ///
    /// A spacing that would produce more than [`MAX_TRACE_POINTS`] points is
    /// rejected with [`DesurveyError::InvalidResolution`].
    pub fn trace(&self, hole_id: &str, resolution: f64) -> Result<Vec<DesurveyedPoint>, DesurveyError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(DesurveyError::InvalidResolution { resolution });
        }

        let record = self.record(hole_id)?;
        let max_depth = record.points.last().map_or(0.0, |p| p.depth);
        let intervals = (max_depth / resolution).floor();
        if !(intervals < (MAX_TRACE_POINTS - 1) as f64) {
            return Err(DesurveyError::InvalidResolution { resolution });
        }
        let steps = intervals as usize;

        let mut depths: Vec<f64> = (0..=steps).map(|i| i as f64 * resolution).collect();
        if depths.last().is_some_and(|d| max_depth - d > resolution * 1e-9) {
            depths.push(max_depth);
        }

        depths
            .into_iter()
            .map(|depth| {
                let depth = depth.min(max_depth);
                Ok(DesurveyedPoint {
                    hole_id: hole_id.to_string(),
                    depth,
                    position: locate_on_trace(hole_id, &record.points, depth)?,
                })
            })
            .collect()
    }

    /// Desurveys many holes. Holes that fail are skipped, logged, and reported in
    /// the summary; the rest are cached.
    pub fn desurvey_all<I>(&mut self, holes: I) -> DesurveySummary
    where
        I: IntoIterator<Item = (Collar, Vec<SurveyStation>)>,
    {
        let mut summary = DesurveySummary::default();

        for (collar, stations) in holes {
            let hole_id = collar.hole_id.clone();
            match self.insert_hole(collar, stations) {
                Ok(_) => summary.desurveyed.push(hole_id),
                Err(err) => {
                    tracing::warn!(hole_id = %hole_id, error = %err, "skipping hole");
                    summary.failed.push((hole_id, err));
                }
            }
        }

        tracing::info!(
            desurveyed = summary.desurveyed.len(),
            failed = summary.failed.len(),
            "desurveyed holes"
        );
        summary
    }

    fn record(&self, hole_id: &str) -> Result<&HoleRecord, DesurveyError> {
        self.holes.get(hole_id).ok_or_else(|| DesurveyError::UnknownHole {
            hole_id: hole_id.to_string(),
        })
    }
}
