/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the concrete RBF kernel functions and their faer-compatible evaluations.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{KernelFromParams, KernelFunction, KernelParams};

/// Linear RBF kernel with `phi(r) = r`.
#[derive(Clone, Debug, Copy)]
pub struct LinearRbfKernel;

impl KernelFunction for LinearRbfKernel {
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        r
    }
}

impl KernelFromParams for LinearRbfKernel {
    #[inline(always)]
    fn from_params(_: &KernelParams) -> Self {
        LinearRbfKernel
    }
}

/// Thin plate spline RBF kernel with `phi(r) = r^2 log r`, and `phi(0) = 0`.
#[derive(Clone, Debug, Copy)]
pub struct ThinPlateSplineRbfKernel;

impl KernelFunction for ThinPlateSplineRbfKernel {
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        match r.abs() < f64::EPSILON {
            true => 0.0,
            false => r.powi(2) * r.ln(),
        }
    }
}

impl KernelFromParams for ThinPlateSplineRbfKernel {
    #[inline(always)]
    fn from_params(_: &KernelParams) -> Self {
        ThinPlateSplineRbfKernel
    }
}

/// Cubic RBF kernel with `phi(r) = r^3`.
#[derive(Clone, Debug, Copy)]
pub struct CubicRbfKernel;

impl KernelFunction for CubicRbfKernel {
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        r.powi(3)
    }
}

impl KernelFromParams for CubicRbfKernel {
    #[inline(always)]
    fn from_params(_: &KernelParams) -> Self {
        CubicRbfKernel
    }
}

/// Quintic RBF kernel with `phi(r) = -r^5`.
#[derive(Clone, Debug, Copy)]
pub struct QuinticRbfKernel;

impl KernelFunction for QuinticRbfKernel {
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        -r.powi(5)
    }
}

impl KernelFromParams for QuinticRbfKernel {
    #[inline(always)]
    fn from_params(_: &KernelParams) -> Self {
        QuinticRbfKernel
    }
}

/// Gaussian RBF kernel with `phi(r) = exp(-(εr)^2)`.
#[derive(Clone, Debug, Copy)]
pub struct GaussianRbfKernel {
    pub epsilon: f64,
}

impl KernelFunction for GaussianRbfKernel {
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        let er = self.epsilon * r;
        (-(er * er)).exp()
    }
}

impl KernelFromParams for GaussianRbfKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        GaussianRbfKernel { epsilon: p.epsilon }
    }
}

/// Multiquadric RBF kernel with `phi(r) = sqrt(1 + (εr)^2)`.
#[derive(Clone, Debug, Copy)]
pub struct MultiquadricRbfKernel {
    pub epsilon: f64,
}

impl KernelFunction for MultiquadricRbfKernel {
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        let er = self.epsilon * r;
        (1.0 + er * er).sqrt()
    }
}

impl KernelFromParams for MultiquadricRbfKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        MultiquadricRbfKernel { epsilon: p.epsilon }
    }
}

/// Inverse multiquadric RBF kernel with `phi(r) = 1 / sqrt(1 + (εr)^2)`.
#[derive(Clone, Debug, Copy)]
pub struct InverseMultiquadricRbfKernel {
    pub epsilon: f64,
}

impl KernelFunction for InverseMultiquadricRbfKernel {
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        let er = self.epsilon * r;
        1.0 / (1.0 + er * er).sqrt()
    }
}

impl KernelFromParams for InverseMultiquadricRbfKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        InverseMultiquadricRbfKernel { epsilon: p.epsilon }
    }
}

/// Inverse quadratic RBF kernel with `phi(r) = 1 / (1 + (εr)^2)`.
#[derive(Clone, Debug, Copy)]
pub struct InverseQuadraticRbfKernel {
    pub epsilon: f64,
}

impl KernelFunction for InverseQuadraticRbfKernel {
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        let er = self.epsilon * r;
        1.0 / (1.0 + er * er)
    }
}

impl KernelFromParams for InverseQuadraticRbfKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        InverseQuadraticRbfKernel { epsilon: p.epsilon }
    }
}
