//! scoregraph — music notation graph, geometry inference and tablature
//! mapping library.
//!
//! A score is held as a graph of islands (simultaneity points) wired by
//! part-wise and instant-wise links, with clefs, keys, meters, barlines and
//! chords attached as tokens. The geometry pass recovers each island's
//! (part, instant) coordinates from that local adjacency, detecting
//! contradictory part ordering; the codec reads and writes the XML score
//! document losslessly up to canonical renumbering; the tablature mapper
//! assigns chord notes to strings and frets of the active instrument.
//!
//! # Example
//! ```no_run
//! use scoregraph::{read_score, Geometry};
//!
//! let xml = std::fs::read_to_string("score.xml").unwrap();
//! let mut read = read_score(&xml).unwrap();
//! let geometry = Geometry::parse(&mut read.graph).unwrap();
//! println!("{} parts over {} instants", geometry.parts(), geometry.instants());
//! ```

pub mod error;
pub mod geometry;
pub mod graph;
pub mod instrument;
pub mod parser;
pub mod pitch;
pub mod stamp;
pub mod tab;
pub mod writer;

pub use error::{GraphError, ScoreError, Warning};
pub use geometry::{Geometry, GeometrySummary, TransitiveMapping};
pub use graph::{Direction, EdgeKind, Link, MusicGraph, NodeData, NodeId, NodeKind, Typesetting};
pub use instrument::{
    DisplayMode, InstrumentKind, InstrumentString, ScanOrder, StringedInstrument, DEFAULT_FRETS,
};
pub use parser::{read_score, ReadScore};
pub use pitch::Pitch;
pub use stamp::{Affine, Graphic, Stamp};
pub use tab::{active_instrument, engrave, map_chord, Tab, TabNote};
pub use writer::write_score;

/// Serializes a geometry summary, tab result, or warning list to JSON.
/// Useful for passing results across process or language boundaries.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization error: {e}"))
}
