/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides parameter and builder types for configuring RBF kernels.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};
use crate::utils::KernelType;

/// Defines the [`KernelType`] to use, along with the shape parameter for the
/// kernels that take one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    /// KernelType enum variant to use.
    pub kernel_type: KernelType,

    /// Shape parameter `ε`. Larger values make the kernel fall off faster with
    /// distance, so each sample influences a smaller neighbourhood.
    ///
    /// Only used by kernels where [`KernelType::requires_epsilon`] is true.
    pub epsilon: f64,
}

impl KernelParams {
    /// Begins building a [`KernelParams`] instance for the given kernel type.
    pub fn builder(kernel_type: KernelType) -> KernelParamsBuilder {
        KernelParamsBuilder {
            kernel_type,
            epsilon: 1.0,
        }
    }

    /// Returns `true` when `epsilon` is usable by the selected kernel.
    ///
    /// Kernels that ignore the shape parameter accept any value.
    pub fn has_valid_epsilon(&self) -> bool {
        !self.kernel_type.requires_epsilon() || (self.epsilon.is_finite() && self.epsilon > 0.0)
    }
}

/// Builder for [`KernelParams`] that provides sensible defaults.
#[derive(Debug, Clone, Copy)]
pub struct KernelParamsBuilder {
    kernel_type: KernelType,
    epsilon: f64,
}

impl KernelParamsBuilder {
    /// Sets the `epsilon` parameter on the builder.
    pub fn epsilon(mut self, v: f64) -> Self {
        self.epsilon = v;
        self
    }

    /// Finalises the builder into a [`KernelParams`] value.
    pub fn build(self) -> KernelParams {
        KernelParams {
            kernel_type: self.kernel_type,
            epsilon: self.epsilon,
        }
    }
}
