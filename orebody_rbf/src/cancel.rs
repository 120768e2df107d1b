/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides a shared flag for cooperatively cancelling long-running fits and evaluations.
//
// Created on: 02 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is cloned into the worker performing a fit or a batch
//! evaluation. The worker polls it between coarse-grained steps (matrix rows,
//! evaluation chunks) and abandons its partial work with
//! [`RbfError::Cancelled`](crate::RbfError::Cancelled) once it is raised.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::RbfError;

/// Shared, clonable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Every clone of this token observes the request.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns `Err(RbfError::Cancelled)` once cancellation has been requested.
    #[inline]
    pub fn check(&self) -> Result<(), RbfError> {
        match self.is_cancelled() {
            true => Err(RbfError::Cancelled),
            false => Ok(()),
        }
    }
}

/// Polls an optional token.
#[inline]
pub(crate) fn check(token: Option<&CancellationToken>) -> Result<(), RbfError> {
    match token {
        Some(t) => t.check(),
        None => Ok(()),
    }
}
