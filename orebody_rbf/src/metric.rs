/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines oriented search ellipsoids and the anisotropic distance transform derived from them.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # metric
//!
//! An [`Ellipsoid`] describes directional continuity: samples are "closer" along
//! the major axis than across the minor axis. [`AnisotropicMetric`] turns an
//! ellipsoid into a linear transform `T = S · R`, where `R` rotates world
//! coordinates into the ellipsoid's local axes and `S` divides each local axis by
//! its radius. The anisotropic distance between `p` and `q` is the Euclidean norm
//! of `T (q - p)`, so a distance of `1.0` lies exactly on the ellipsoid surface.
//!
//! Because the metric is linear, points can be transformed once and every
//! downstream structure (kernel matrices, the neighbour index) works with plain
//! Euclidean distances in the transformed space.
//!
//! ## Orientation convention
//!
//! The frame is the same one used for desurveying: X = East, Y = North, Z = Up.
//!
//! - `azimuth`: bearing of the major axis, clockwise from North, in degrees.
//! - `dip`: inclination of the major axis, negative downward, in degrees. The
//!   major axis therefore points exactly where a drill hole with the same
//!   azimuth and dip would point.
//! - `plunge`: rotation of the semi-major and minor axes about the major axis,
//!   in degrees. With zero plunge the semi-major axis is horizontal and points
//!   90° clockwise of the major azimuth.
//!
//! The world-to-local rotation is `Ry(-plunge) · Rx(-dip) · Rz(azimuth)`, with the
//! local X axis being semi-major, Y major and Z minor.

use faer::{mat, Mat};
use serde::{Deserialize, Serialize};

/// An oriented search ellipsoid.
///
/// **Note:** All angles are specified in **degrees**.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Radius along the major axis.
    pub radius_major: f64,

    /// Radius along the semi-major axis.
    pub radius_semi_major: f64,

    /// Radius along the minor axis.
    pub radius_minor: f64,

    /// Bearing of the major axis, clockwise from North.
    pub azimuth: f64,

    /// Inclination of the major axis, negative downward.
    pub dip: f64,

    /// Rotation about the major axis.
    pub plunge: f64,
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self {
            radius_major: 50.0,
            radius_semi_major: 30.0,
            radius_minor: 10.0,
            azimuth: 0.0,
            dip: 0.0,
            plunge: 0.0,
        }
    }
}

impl Ellipsoid {
    /// Creates an ellipsoid from its radii and orientation.
    pub fn new(
        radius_major: f64,
        radius_semi_major: f64,
        radius_minor: f64,
        azimuth: f64,
        dip: f64,
        plunge: f64,
    ) -> Self {
        Self { radius_major, radius_semi_major, radius_minor, azimuth, dip, plunge }
    }

    /// A sphere of the given radius.
    pub fn isotropic(radius: f64) -> Self {
        Self::new(radius, radius, radius, 0.0, 0.0, 0.0)
    }

    /// Returns a copy whose radii are usable by the metric, and whether anything
    /// had to change.
    ///
    /// Non-finite or non-positive radii are replaced by the largest valid radius
    /// (`1.0` if none is valid). The radii are then sorted so that
    /// `major >= semi_major >= minor`. Orientation angles that are not finite are
    /// replaced by zero.
    pub fn normalized(&self) -> (Ellipsoid, bool) {
        let valid = |r: f64| r.is_finite() && r > 0.0;
        let mut radii = [self.radius_major, self.radius_semi_major, self.radius_minor];

        let fallback = radii
            .iter()
            .copied()
            .filter(|r| valid(*r))
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))
            .unwrap_or(1.0);

        radii.iter_mut().for_each(|r| {
            if !valid(*r) {
                *r = fallback;
            }
        });
        radii.sort_by(|a, b| b.total_cmp(a));

        let angle = |a: f64| if a.is_finite() { a } else { 0.0 };
        let normalized = Ellipsoid {
            radius_major: radii[0],
            radius_semi_major: radii[1],
            radius_minor: radii[2],
            azimuth: angle(self.azimuth),
            dip: angle(self.dip),
            plunge: angle(self.plunge),
        };

        let changed = normalized != *self;
        (normalized, changed)
    }

    /// World-to-local rotation as a 3x3 matrix.
    pub fn rotation(&self) -> Mat<f64> {
        let az = self.azimuth.to_radians();
        let dip = self.dip.to_radians();
        let plunge = self.plunge.to_radians();

        // Bring the major azimuth onto +Y.
        let rz = mat![
            [az.cos(), -az.sin(), 0.0],
            [az.sin(), az.cos(), 0.0],
            [0.0, 0.0, 1.0],
        ];

        // Lift the dipping major axis onto the horizontal.
        let rx = mat![
            [1.0, 0.0, 0.0],
            [0.0, dip.cos(), dip.sin()],
            [0.0, -dip.sin(), dip.cos()],
        ];

        // Unwind the plunge about the major (Y) axis.
        let ry = mat![
            [plunge.cos(), 0.0, -plunge.sin()],
            [0.0, 1.0, 0.0],
            [plunge.sin(), 0.0, plunge.cos()],
        ];

        ry * rx * rz
    }
}

/// Linear distance transform derived from a (normalised) [`Ellipsoid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Ellipsoid", into = "Ellipsoid")]
pub struct AnisotropicMetric {
    ellipsoid: Ellipsoid,
    transform: [[f64; 3]; 3],
}

impl Default for AnisotropicMetric {
    fn default() -> Self {
        Self::euclidean()
    }
}

impl From<Ellipsoid> for AnisotropicMetric {
    fn from(ellipsoid: Ellipsoid) -> Self {
        Self::new(&ellipsoid)
    }
}

impl From<AnisotropicMetric> for Ellipsoid {
    fn from(metric: AnisotropicMetric) -> Self {
        metric.ellipsoid
    }
}

impl AnisotropicMetric {
    /// Builds the metric for an ellipsoid, normalising malformed radii first.
    pub fn new(ellipsoid: &Ellipsoid) -> Self {
        let (ellipsoid, changed) = ellipsoid.normalized();
        if changed {
            tracing::warn!(
                radius_major = ellipsoid.radius_major,
                radius_semi_major = ellipsoid.radius_semi_major,
                radius_minor = ellipsoid.radius_minor,
                "ellipsoid radii or angles were normalised"
            );
        }

        let scale = mat![
            [1.0 / ellipsoid.radius_semi_major, 0.0, 0.0],
            [0.0, 1.0 / ellipsoid.radius_major, 0.0],
            [0.0, 0.0, 1.0 / ellipsoid.radius_minor],
        ];

        let t = scale * ellipsoid.rotation();

        let mut transform = [[0.0; 3]; 3];
        for (i, row) in transform.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                *entry = t[(i, j)];
            }
        }

        Self { ellipsoid, transform }
    }

    /// Ordinary Euclidean distance (a unit sphere).
    pub fn euclidean() -> Self {
        Self::isotropic(1.0)
    }

    /// A sphere of the given radius: distances are Euclidean distances divided by
    /// `radius`.
    pub fn isotropic(radius: f64) -> Self {
        Self::new(&Ellipsoid::isotropic(radius))
    }

    /// The normalised ellipsoid defining this metric.
    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Maps a world position into ellipsoid-normalised space.
    #[inline]
    pub fn transform_point(&self, p: &[f64; 3]) -> [f64; 3] {
        let t = &self.transform;
        [
            t[0][0] * p[0] + t[0][1] * p[1] + t[0][2] * p[2],
            t[1][0] * p[0] + t[1][1] * p[1] + t[1][2] * p[2],
            t[2][0] * p[0] + t[2][1] * p[1] + t[2][2] * p[2],
        ]
    }

    /// Maps every row of an `(n, 3)` matrix into ellipsoid-normalised space.
    pub fn transform_points(&self, points: &Mat<f64>) -> Mat<f64> {
        let t = &self.transform;
        Mat::from_fn(points.nrows(), 3, |i, j| {
            t[j][0] * points[(i, 0)] + t[j][1] * points[(i, 1)] + t[j][2] * points[(i, 2)]
        })
    }

    /// Anisotropic distance between `p` and `q`.
    #[inline]
    pub fn distance(&self, p: &[f64; 3], q: &[f64; 3]) -> f64 {
        let local = self.transform_point(&[q[0] - p[0], q[1] - p[1], q[2] - p[2]]);
        (local[0] * local[0] + local[1] * local[1] + local[2] * local[2]).sqrt()
    }

    /// Distance scaled so that `1.0` lies on the ellipsoid boundary.
    ///
    /// The per-axis weights are already `1 / radius`, so this is the same value as
    /// [`distance`](Self::distance).
    #[inline]
    pub fn normalized_distance(&self, p: &[f64; 3], q: &[f64; 3]) -> f64 {
        self.distance(p, q)
    }

    /// Whether `q` lies inside or on the ellipsoid centred at `p`.
    #[inline]
    pub fn contains(&self, p: &[f64; 3], q: &[f64; 3]) -> bool {
        self.normalized_distance(p, q) <= 1.0
    }
}

/// Anisotropic distance between `p` and `q` under `ellipsoid`.
pub fn distance(p: &[f64; 3], q: &[f64; 3], ellipsoid: &Ellipsoid) -> f64 {
    AnisotropicMetric::new(ellipsoid).distance(p, q)
}

/// Distance between `p` and `q` scaled so that `1.0` is the boundary of `ellipsoid`.
pub fn normalized_distance(p: &[f64; 3], q: &[f64; 3], ellipsoid: &Ellipsoid) -> f64 {
    AnisotropicMetric::new(ellipsoid).normalized_distance(p, q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desurvey::direction_vector;
    use equator::assert;

    const TOL: f64 = 1e-12;

    fn scaled(v: [f64; 3], s: f64) -> [f64; 3] {
        [v[0] * s, v[1] * s, v[2] * s]
    }

    #[test]
    fn isotropic_distance_is_euclidean_over_radius() {
        let radius = 25.0;
        let p = [10.0, -4.0, 3.0];
        let q = [13.0, 0.0, 15.0];
        let euclid = ((3.0f64).powi(2) + (4.0f64).powi(2) + (12.0f64).powi(2)).sqrt();

        // Orientation must not matter for a sphere.
        let rotated = Ellipsoid::new(radius, radius, radius, 37.0, -61.0, 12.0);
        assert!((distance(&p, &q, &Ellipsoid::isotropic(radius)) - euclid / radius).abs() < TOL);
        assert!((distance(&p, &q, &rotated) - euclid / radius).abs() < TOL);
    }

    #[test]
    fn axes_end_points_lie_on_the_boundary() {
        let e = Ellipsoid::new(100.0, 40.0, 5.0, 30.0, -20.0, 0.0);
        let metric = AnisotropicMetric::new(&e);
        let origin = [500.0, 200.0, -50.0];

        let major = direction_vector(30.0, -20.0);
        let semi = direction_vector(120.0, 0.0);

        let at = |v: [f64; 3], r: f64| {
            let d = scaled(v, r);
            [origin[0] + d[0], origin[1] + d[1], origin[2] + d[2]]
        };

        assert!((metric.normalized_distance(&origin, &at(major, 100.0)) - 1.0).abs() < TOL);
        assert!((metric.normalized_distance(&origin, &at(semi, 40.0)) - 1.0).abs() < TOL);

        // Minor axis is perpendicular to both.
        let minor = [
            major[1] * semi[2] - major[2] * semi[1],
            major[2] * semi[0] - major[0] * semi[2],
            major[0] * semi[1] - major[1] * semi[0],
        ];
        assert!((metric.normalized_distance(&origin, &at(minor, 5.0)) - 1.0).abs() < TOL);
    }

    #[test]
    fn plunge_rotates_semi_major_about_major_axis() {
        let e = Ellipsoid::new(50.0, 20.0, 2.0, 0.0, 0.0, 90.0);
        let metric = AnisotropicMetric::new(&e);

        // Major axis still points North.
        assert!((metric.distance(&[0.0; 3], &[0.0, 50.0, 0.0]) - 1.0).abs() < TOL);
        // A quarter turn swaps the horizontal semi-major axis with the vertical minor axis.
        assert!((metric.distance(&[0.0; 3], &[0.0, 0.0, 20.0]) - 1.0).abs() < TOL);
        assert!((metric.distance(&[0.0; 3], &[2.0, 0.0, 0.0]) - 1.0).abs() < TOL);
    }

    #[test]
    fn distance_is_symmetric_and_translation_invariant() {
        let metric = AnisotropicMetric::new(&Ellipsoid::new(80.0, 30.0, 8.0, 145.0, -35.0, 20.0));
        let p = [1.0, 2.0, 3.0];
        let q = [-7.0, 11.0, 0.5];
        let shift = [1000.0, -500.0, 250.0];
        let ps = [p[0] + shift[0], p[1] + shift[1], p[2] + shift[2]];
        let qs = [q[0] + shift[0], q[1] + shift[1], q[2] + shift[2]];

        assert!((metric.distance(&p, &q) - metric.distance(&q, &p)).abs() < TOL);
        assert!((metric.distance(&p, &q) - metric.distance(&ps, &qs)).abs() < 1e-9);
    }

    #[test]
    fn malformed_radii_are_normalised() {
        let (e, changed) = Ellipsoid::new(10.0, 30.0, -1.0, 0.0, 0.0, 0.0).normalized();
        assert!(changed);
        assert!(e.radius_major == 30.0);
        assert!(e.radius_semi_major == 30.0);
        assert!(e.radius_minor == 10.0);

        let (e, _) = Ellipsoid::new(f64::NAN, 0.0, -2.0, 0.0, 0.0, 0.0).normalized();
        assert!(e.radius_major == 1.0 && e.radius_minor == 1.0);

        let (_, changed) = Ellipsoid::default().normalized();
        assert!(!changed);
    }

    #[test]
    fn metric_serialises_as_its_ellipsoid() {
        let metric = AnisotropicMetric::new(&Ellipsoid::new(60.0, 30.0, 10.0, 45.0, -10.0, 5.0));
        let text = serde_json::to_string(&metric).unwrap();
        let back: AnisotropicMetric = serde_json::from_str(&text).unwrap();
        assert!(back == metric);
    }
}
