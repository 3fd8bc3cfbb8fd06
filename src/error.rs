//! Error and warning types.
//!
//! Two conditions abort the requested operation entirely: a structural
//! conflict found by the geometry pass and a malformed score document.
//! Everything else is recoverable and accumulates as [`Warning`] values on
//! the operation's result, in addition to being emitted through `log::warn!`.

use serde::Serialize;
use thiserror::Error;

/// Fatal errors. Operations that return one leave no partial results behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    /// Geometry inference found contradictory part ordering, such as
    /// crossing staves. No coordinates are assigned.
    #[error("conflicting part ordering between islands (crossing staves)")]
    StructuralConflict,

    /// The input text is not a valid score document.
    #[error("malformed score document: {0}")]
    MalformedDocument(String),
}

/// Graph editing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The node already has an outgoing edge of this single-successor kind.
    #[error("node {from} already has an outgoing {kind} edge")]
    DuplicateSuccessor { from: u32, kind: &'static str },

    /// The node already has an incoming edge of this single-predecessor kind.
    #[error("node {to} already has an incoming {kind} edge")]
    DuplicatePredecessor { to: u32, kind: &'static str },

    /// A node handle does not refer to a live node.
    #[error("stale node handle {0}")]
    StaleHandle(u32),
}

/// Recoverable conditions collected while reading a document or mapping a
/// chord to tablature. The operation that produced them still succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Warning {
    /// A textual identifier in the document did not resolve; the relation
    /// that referenced it was dropped.
    #[error("{context} refers to unknown id '{id}'; relation dropped")]
    UnresolvedReference { context: String, id: String },

    /// A record of an unrecognized type was skipped.
    #[error("unrecognized record '{name}' skipped")]
    UnknownRecord { name: String },

    /// Tablature mapping found no legal string for a note; layout continues
    /// without a fret for it.
    #[error("no playable string for note with MIDI pitch {midi}")]
    UnplaceableNote { midi: i32 },
}
