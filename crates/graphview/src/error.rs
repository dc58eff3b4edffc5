//! Error types for graphview operations.
//!
//! This module provides the top-level error type [`GraphViewError`] and the
//! per-concern errors it wraps. Every variant here is a contract violation by
//! the caller or by configuration; engine-side failures are avoided with
//! liveness checks instead of being reported.

use thiserror::Error;

use graphview_core::identifier::ElementId;

use crate::snapshot::Group;

/// The main error type for graphview operations.
#[derive(Debug, Error)]
pub enum GraphViewError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Decoration(#[from] DecorationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors that abort a reconciliation pass.
///
/// When a pass fails the reconciler keeps its previously applied snapshot, so
/// the next snapshot is diffed against the last state that was fully applied.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Change not handled: `{field}` on element `{id}`")]
    UnhandledChange { id: ElementId, field: String },

    #[error("Decoration `{id}`: {source}")]
    Decoration {
        id: ElementId,
        #[source]
        source: DecorationError,
    },
}

/// Violations of the snapshot invariants, detected before any mutation.
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("duplicate id `{id}` in {group}")]
    DuplicateId { group: Group, id: ElementId },

    #[error("edge `{id}` is missing its `{endpoint}` endpoint")]
    MissingEndpoint { id: ElementId, endpoint: &'static str },

    #[error("edge `{id}` references unknown node `{node}`")]
    DanglingEdge { id: ElementId, node: ElementId },
}

/// Errors raised while positioning a decoration.
#[derive(Debug, Error, PartialEq)]
pub enum DecorationError {
    #[error("Alignment required")]
    MissingAlignment,

    #[error("invalid `{key}` attribute: {reason}")]
    InvalidAttribute { key: &'static str, reason: String },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {0}")]
    Validation(String),
}

/// Returned by an engine for a named option it has no setter for.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown configuration key `{0}`")]
pub struct UnknownOption(pub String);
