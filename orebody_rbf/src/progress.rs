/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines progress reporting messages, sinks, and helper functions for long-running processes.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Progress reporting primitives for long-running computations.

use std::sync::{Arc, mpsc};
use std::thread;
use std::fmt::Debug;

/// Progress events emitted during long-running computations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMsg {
    /// Event indicating that samples sharing a position were merged.
    DuplicatesMerged { num_duplicates: usize },

    /// Event indicating how many rows of the interpolation matrix have been built.
    MatrixAssembly { rows_done: usize, total_rows: usize, progress: f64 },

    /// Event indicating how many query points have been evaluated.
    Evaluation { points_done: usize, total_points: usize, progress: f64 },

    /// Arbitrary informational message.
    Message { message: String },
}

/// Sink that consumes progress messages.
pub trait ProgressSink: Send + Sync + Debug {
    fn emit(&self, msg: ProgressMsg);
}

/// Progress sink that forwards messages over a channel.
#[derive(Debug)]
pub struct ClosureSink {
    tx: mpsc::SyncSender<ProgressMsg>,
}

impl ProgressSink for ClosureSink {
    #[inline]
    fn emit(&self, msg: ProgressMsg) {
        let _ = self.tx.try_send(msg);
    }
}

/// Spawns a listener thread that runs a handler closure for each progress message.
///
/// The thread exits once every clone of the returned sink has been dropped.
pub fn closure_sink<F>(
    buffer: usize,
    mut handler: F,
) -> (Arc<dyn ProgressSink>, thread::JoinHandle<()>)
where
    F: FnMut(ProgressMsg) + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<ProgressMsg>(buffer.max(1));
    let sink: Arc<dyn ProgressSink> = Arc::new(ClosureSink { tx });

    let handle = thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            handler(msg);
        }
    });

    (sink, handle)
}

/// Fraction of `total` completed, in `[0, 1]`.
#[inline]
pub(crate) fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 { 1.0 } else { done as f64 / total as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use std::sync::Mutex;

    #[test]
    fn closure_sink_delivers_messages_in_order() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let store = received.clone();
        let (sink, handle) = closure_sink(16, move |msg| {
            if let Ok(mut guard) = store.lock() {
                guard.push(msg);
            }
        });

        sink.emit(ProgressMsg::DuplicatesMerged { num_duplicates: 3 });
        sink.emit(ProgressMsg::Message { message: "done".to_string() });
        drop(sink);
        handle.join().unwrap();

        let received = received.lock().unwrap();
        assert!(received.len() == 2);
        assert!(received[0] == ProgressMsg::DuplicatesMerged { num_duplicates: 3 });
    }

    #[test]
    fn fraction_handles_empty_totals() {
        assert!(fraction(0, 0) == 1.0);
        assert!(fraction(5, 10) == 0.5);
    }
}
