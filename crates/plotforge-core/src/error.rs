// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Plotforge.

use thiserror::Error;

/// Top-level error type for all Plotforge operations.
#[derive(Debug, Error)]
pub enum PlotforgeError {
    // -- Job execution errors --
    #[error("source file missing: {0}")]
    FileMissing(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("protocol generation failed: {0}")]
    Generation(String),

    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("spooler rejected job: {0}")]
    SpoolerRejected(String),

    /// Cooperative cancellation observed mid-execution.
    #[error("job cancelled")]
    Cancelled,

    #[error("queue is full ({0} jobs)")]
    QueueFull(usize),

    // -- Directory / discovery errors --
    #[error("probe timed out: {0}")]
    ProbeTimeout(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("printer discovery failed: {0}")]
    Discovery(String),

    // -- Protocol errors --
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("IPP request failed: {0}")]
    IppRequest(String),

    // -- Ambient --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PlotforgeError>;
