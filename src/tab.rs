//! Tablature mapper — assigns the notes of a chord to strings and frets of
//! the instrument active at that point in the score.
//!
//! Mapping is two passes over the chord's notes, in note order. The primary
//! pass honors a requested string when it is free and the pitch is playable
//! there; everything else falls through to a scan over the strings that can
//! physically sound the pitch, in a fixed order. Each string carries at most
//! one note per chord; notes left over after both passes are reported as
//! warnings, not errors. Given the same chord, instrument, and scan order
//! the assignment is fully reproducible.

use serde::Serialize;

use crate::error::Warning;
use crate::graph::{Direction, EdgeKind, MusicGraph, NodeData, NodeId, NodeKind};
use crate::instrument::{ScanOrder, StringedInstrument};
use crate::stamp::{Affine, Graphic, Stamp};

/// One placed note: which string and fret it sounds on, and the tablature
/// row it is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TabNote {
    pub midi: i32,
    pub string: usize,
    pub fret: usize,
    /// Vertical position in line-space units (0 = staff center, positive up).
    pub line_space: i32,
    pub note: NodeId,
}

/// The mapped form of one chord.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tab {
    pub chord: NodeId,
    /// String count of the instrument the mapping was made against.
    pub strings: usize,
    /// True when the chord is a rest; `notes` is empty in that case.
    pub is_rest: bool,
    pub notes: Vec<TabNote>,
    /// Notes no legal string was found for.
    pub unplaced: Vec<NodeId>,
    pub warnings: Vec<Warning>,
}

impl Tab {
    /// The tablature row the rest placeholder occupies on this instrument.
    pub fn rest_line_space(&self) -> i32 {
        if self.strings % 2 == 1 { 0 } else { 1 }
    }
}

/// Vertical position of a string's tablature row, in line-space units.
/// Strings are centered on the staff, string 0 topmost.
pub fn line_space_for_string(string_count: usize, string: usize) -> i32 {
    let n = string_count as i32;
    let s = string as i32;
    if n % 2 == 1 {
        ((n + 1) / 2 - (s + 1)) * 2
    } else {
        (n / 2 - (s + 1)) * 2 + 1
    }
}

/// The instrument governing an island: the most recent declaration at or
/// before it in its part, found by walking part-wise backward over token
/// links (island → part token → instrument token).
pub fn active_instrument(graph: &MusicGraph, island: NodeId) -> Option<NodeId> {
    let mut current = Some(island);
    while let Some(here) = current {
        for token in graph.find_all(here, EdgeKind::Token, Direction::Forward) {
            if graph.kind(token) != Some(NodeKind::Part) {
                continue;
            }
            for inner in graph.find_all(token, EdgeKind::Token, Direction::Forward) {
                if graph.kind(inner) == Some(NodeKind::Instrument) {
                    return Some(inner);
                }
            }
        }
        current = graph.find(here, EdgeKind::PartWise, Direction::Backward);
    }
    None
}

/// Maps one chord onto an instrument.
pub fn map_chord(
    graph: &MusicGraph,
    chord: NodeId,
    instrument: &StringedInstrument,
    order: ScanOrder,
) -> Tab {
    let string_count = instrument.string_count();
    let mut tab = Tab {
        chord,
        strings: string_count,
        is_rest: false,
        notes: Vec::new(),
        unplaced: Vec::new(),
        warnings: Vec::new(),
    };

    let notes = graph.find_all(chord, EdgeKind::Note, Direction::Forward);

    // A rest chord bypasses mapping and renders as a single placeholder.
    let is_rest = notes.iter().any(|&n| {
        matches!(graph.node(n).map(|node| &node.data), Some(NodeData::Note { rest: true, .. }))
    });
    if is_rest {
        tab.is_rest = true;
        return tab;
    }

    let mut used = vec![false; string_count];
    let mut deferred: Vec<(NodeId, i32)> = Vec::new();

    // Primary pass: honor requested strings where they hold up.
    for &id in &notes {
        let Some(NodeData::Note { pitch: Some(pitch), string, .. }) =
            graph.node(id).map(|n| &n.data)
        else {
            continue;
        };
        let midi = pitch.to_midi();
        let requested = *string;
        let placed = requested
            .filter(|&s| s < string_count && !used[s])
            .and_then(|s| instrument.fret_for(s, midi).map(|fret| (s, fret)));
        match placed {
            Some((s, fret)) => {
                used[s] = true;
                tab.notes.push(TabNote {
                    midi,
                    string: s,
                    fret,
                    line_space: line_space_for_string(string_count, s),
                    note: id,
                });
            }
            None => deferred.push((id, midi)),
        }
    }

    // Fallback pass: first unused string that can sound the pitch, in scan
    // order.
    for (id, midi) in deferred {
        let slot = instrument
            .strings_for(midi, order)
            .into_iter()
            .find(|&s| !used[s]);
        match slot {
            Some(s) => {
                used[s] = true;
                // strings_for only returns playable strings.
                let fret = instrument.fret_for(s, midi).unwrap_or_default();
                tab.notes.push(TabNote {
                    midi,
                    string: s,
                    fret,
                    line_space: line_space_for_string(string_count, s),
                    note: id,
                });
            }
            None => {
                log::warn!("no free string can sound MIDI pitch {midi}; note left unmapped");
                tab.unplaced.push(id);
                tab.warnings.push(Warning::UnplaceableNote { midi });
            }
        }
    }

    tab
}

/// Produces the stamp list for one mapped chord: one fret digit per placed
/// note, or the rest placeholder on its row. Line-space units are halved
/// into staff-space y coordinates.
pub fn engrave(tab: &Tab) -> Vec<Stamp> {
    if tab.is_rest {
        return vec![Stamp {
            graphic: Graphic::RestPlaceholder,
            transform: Affine::translate(0.0, f64::from(tab.rest_line_space()) / 2.0),
            source: tab.chord,
        }];
    }
    tab.notes
        .iter()
        .map(|n| Stamp {
            graphic: Graphic::FretDigit(n.fret),
            transform: Affine::translate(0.0, f64::from(n.line_space) / 2.0),
            source: n.note,
        })
        .collect()
}
