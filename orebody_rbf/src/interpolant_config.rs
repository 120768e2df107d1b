/////////////////////////////////////////////////////////////////////////////////////////////
//
// Specifies kernel, shape, smoothing, and drift options for configuring RBF interpolants.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Specifies kernel, shape, smoothing, and drift options for configuring RBF interpolants.
use orebody_rbf_utils::{KernelParams, KernelType};
use serde::{Deserialize, Serialize};

use crate::error::RbfError;

/// Optional polynomial drift added to the interpolation system.
///
/// A drift augments the kernel matrix with polynomial columns so the interpolant
/// can reproduce a constant or linear trend exactly and extrapolates towards that
/// trend rather than towards zero. Drift coordinates are scaled to `[-1, 1]` over
/// the sample extents before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Drift {
    #[default]
    None,
    Constant,
    Linear,
}

impl Drift {
    /// Number of polynomial basis columns in three dimensions.
    pub fn basis_size(&self) -> usize {
        match self {
            Drift::None => 0,
            Drift::Constant => 1,
            Drift::Linear => 4,
        }
    }
}

/// The fixed set of radial kernels, where `r` is the distance under the active
/// metric and `ε` is the shape parameter.
///
/// | Kernel | `phi(r)` | uses `ε` |
/// |---|---|---|
/// | `ThinPlateSpline` | `r² ln r`, `0` at `r = 0` | no |
/// | `Linear` | `r` | no |
/// | `Cubic` | `r³` | no |
/// | `Quintic` | `-r⁵` | no |
/// | `Gaussian` | `exp(-(εr)²)` | yes |
/// | `Multiquadric` | `sqrt(1 + (εr)²)` | yes |
/// | `InverseMultiquadric` | `1 / sqrt(1 + (εr)²)` | yes |
/// | `InverseQuadratic` | `1 / (1 + (εr)²)` | yes |
#[derive(Clone, Debug, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RBFKernelType {
    #[default]
    ThinPlateSpline,
    Linear,
    Cubic,
    Quintic,
    Gaussian,
    Multiquadric,
    InverseMultiquadric,
    InverseQuadratic,
}

impl RBFKernelType {
    /// Whether the kernel is scaled by `epsilon`.
    pub fn requires_epsilon(&self) -> bool {
        KernelType::from(*self).requires_epsilon()
    }

    /// Smallest drift for which the augmented system is guaranteed solvable on
    /// distinct, unisolvent points.
    ///
    /// Quintic is conditionally positive definite of order 3 and would need a
    /// quadratic drift; linear is the highest drift available.
    pub fn minimum_drift(&self) -> Drift {
        match self {
            RBFKernelType::Linear => Drift::Constant,
            RBFKernelType::ThinPlateSpline | RBFKernelType::Cubic | RBFKernelType::Quintic => Drift::Linear,
            RBFKernelType::Gaussian
            | RBFKernelType::Multiquadric
            | RBFKernelType::InverseMultiquadric
            | RBFKernelType::InverseQuadratic => Drift::None,
        }
    }
}

impl From<RBFKernelType> for KernelType {
    fn from(v: RBFKernelType) -> Self {
        match v {
            RBFKernelType::ThinPlateSpline => KernelType::ThinPlateSplineRbf,
            RBFKernelType::Linear => KernelType::LinearRbf,
            RBFKernelType::Cubic => KernelType::CubicRbf,
            RBFKernelType::Quintic => KernelType::QuinticRbf,
            RBFKernelType::Gaussian => KernelType::GaussianRbf,
            RBFKernelType::Multiquadric => KernelType::MultiquadricRbf,
            RBFKernelType::InverseMultiquadric => KernelType::InverseMultiquadricRbf,
            RBFKernelType::InverseQuadratic => KernelType::InverseQuadraticRbf,
        }
    }
}

/// A convenience builder for constructing a [`InterpolantSettings`] instance.
///
/// The builder should be called via the [`InterpolantSettings::builder`] method.
///
/// See [`InterpolantSettings`] for details on each field.
#[derive(Debug, Clone, Copy)]
pub struct InterpolantSettingsBuilder {
    kernel_type: RBFKernelType,
    epsilon: f64,
    smoothing: f64,
    drift: Drift,
}

impl InterpolantSettingsBuilder {
    fn new(kernel_type: RBFKernelType) -> Self {
        Self {
            kernel_type,
            epsilon: 1.0,
            smoothing: 0.0,
            drift: Drift::None,
        }
    }

    /// Sets the shape parameter.
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the smoothing value added to the matrix diagonal.
    pub fn smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Sets the drift term.
    pub fn drift(mut self, drift: Drift) -> Self {
        self.drift = drift;
        self
    }

    /// Builds and returns an instance of [`InterpolantSettings`] from the values
    /// defined in the builder. Values are checked when the model is fitted.
    pub fn build(self) -> InterpolantSettings {
        InterpolantSettings {
            kernel_type: self.kernel_type,
            epsilon: self.epsilon,
            smoothing: self.smoothing,
            drift: self.drift,
        }
    }
}

/// Kernel and regularisation settings for an RBF interpolant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpolantSettings {
    /// The RBF kernel to use for interpolation.
    pub kernel_type: RBFKernelType,

    /// Shape parameter. Must be finite and positive for kernels that use it,
    /// ignored otherwise.
    pub epsilon: f64,

    /// Smoothing added to the matrix diagonal. A value of `0.0` (default) enforces
    /// an exact fit to all input data. Larger values soften the fit, which reduces
    /// sensitivity to noisy or densely clustered samples.
    pub smoothing: f64,

    /// The polynomial drift term added to the RBF system.
    pub drift: Drift,
}

impl Default for InterpolantSettings {
    fn default() -> Self {
        InterpolantSettings::builder(RBFKernelType::default()).build()
    }
}

impl InterpolantSettings {
    /// Returns a new [`InterpolantSettingsBuilder`] for the given kernel type.
    pub fn builder(kernel_type: RBFKernelType) -> InterpolantSettingsBuilder {
        InterpolantSettingsBuilder::new(kernel_type)
    }

    /// Checks `epsilon` and `smoothing` against the selected kernel.
    pub fn validate(&self) -> Result<(), RbfError> {
        let params: KernelParams = (*self).into();
        if !params.has_valid_epsilon() {
            return Err(RbfError::InvalidParameter {
                name: "epsilon",
                value: self.epsilon,
                reason: "must be finite and greater than zero for this kernel",
            });
        }
        if !(self.smoothing.is_finite() && self.smoothing >= 0.0) {
            return Err(RbfError::InvalidParameter {
                name: "smoothing",
                value: self.smoothing,
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}

impl From<InterpolantSettings> for KernelParams {
    /// Converts a [`InterpolantSettings`] instance into a
    /// [`orebody_rbf_utils::KernelParams`].
    fn from(v: InterpolantSettings) -> Self {
        KernelParams::builder(v.kernel_type.into())
            .epsilon(v.epsilon)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    #[test]
    fn rejects_non_positive_epsilon_only_where_used() {
        let gaussian = InterpolantSettings::builder(RBFKernelType::Gaussian)
            .epsilon(0.0)
            .build();
        assert!(matches!(
            gaussian.validate(),
            Err(RbfError::InvalidParameter { name: "epsilon", .. })
        ));

        let tps = InterpolantSettings::builder(RBFKernelType::ThinPlateSpline)
            .epsilon(-3.0)
            .build();
        assert!(tps.validate().is_ok());
    }

    #[test]
    fn minimum_drift_follows_kernel_order() {
        assert!(RBFKernelType::Gaussian.minimum_drift() == Drift::None);
        assert!(RBFKernelType::Linear.minimum_drift() == Drift::Constant);
        assert!(RBFKernelType::ThinPlateSpline.minimum_drift() == Drift::Linear);
        assert!(Drift::None < Drift::Constant);
    }

    #[test]
    fn rejects_negative_smoothing() {
        let settings = InterpolantSettings::builder(RBFKernelType::Linear)
            .smoothing(-0.1)
            .build();
        assert!(matches!(
            settings.validate(),
            Err(RbfError::InvalidParameter { name: "smoothing", .. })
        ));
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = InterpolantSettings::builder(RBFKernelType::Multiquadric)
            .epsilon(0.25)
            .smoothing(0.1)
            .drift(Drift::Linear)
            .build();
        let text = serde_json::to_string(&settings).unwrap();
        let back: InterpolantSettings = serde_json::from_str(&text).unwrap();
        assert!(back == settings);
    }
}
