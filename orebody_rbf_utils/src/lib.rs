/////////////////////////////////////////////////////////////////////////////////////////////
//
// Re-exports the kernel registry and dense matrix helpers used by the orebody_rbf crate.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Utilities for the `orebody_rbf` crate
//!
//! Holds the fixed, table-driven set of radial kernels and the dense matrix helpers
//! used to assemble interpolation systems. Kernels operate on distances measured in
//! an already-transformed coordinate space, so anisotropy is handled entirely by
//! the caller rescaling points before they reach this crate.
mod rbf_kernels;
mod traits;
mod utils;
mod kernel_helpers;

/// Implemented kernels for use in the `orebody_rbf` crate.
pub mod kernels {
    pub use super::rbf_kernels::*;
}

pub use {
    kernel_helpers::{KernelParams, KernelParamsBuilder},
    utils::{
        KernelType, get_a_matrix, get_a_matrix_symmetric_solver, get_distance,
        get_distance_sq, get_pointarray_extents, select_mat_rows, kernel_phi,
    },
    traits::{KernelFromParams, KernelFunction},
};
