//! Score document writer — serializes a [`MusicGraph`] back to the XML
//! record stream.
//!
//! Writing runs the geometry pass first so islands can be emitted in
//! part-major, instant-minor order under canonical identifiers
//! (`island:part,instant`). Every other node gets a dense numeric
//! identifier held in a map local to the call; nothing is stored on the
//! nodes themselves, so node identity is untouched by a write.

use std::collections::HashMap;

use crate::error::ScoreError;
use crate::geometry::Geometry;
use crate::graph::{Direction, EdgeKind, MusicGraph, NodeData, NodeId, NodeKind};
use crate::pitch::Pitch;

/// Serializes the graph. Fails with `StructuralConflict` when the island
/// adjacency cannot be resolved into coordinates.
pub fn write_score(graph: &mut MusicGraph) -> Result<String, ScoreError> {
    let geometry = Geometry::parse(graph)?;

    // Dense canonical ids for the duration of this write.
    let (nodes, _) = graph.gather();
    let canonical: HashMap<NodeId, usize> =
        nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let writer = Writer { graph, canonical };

    let mut out = String::from("<score>\n");
    for part in 0..geometry.parts() {
        for instant in 0..geometry.instants() {
            let Some(island) = geometry.lookup(part, instant) else {
                continue;
            };
            writer.write_island(&mut out, island);
        }
    }
    out.push_str("</score>\n");
    Ok(out)
}

struct Writer<'a> {
    graph: &'a MusicGraph,
    canonical: HashMap<NodeId, usize>,
}

impl Writer<'_> {
    /// Canonical identifier for a node: islands use their coordinates, all
    /// other nodes a short kind name plus their dense index.
    fn uid(&self, id: NodeId) -> String {
        let index = self.canonical.get(&id).copied().unwrap_or_default();
        let Some(node) = self.graph.node(id) else {
            return format!("node:{index}");
        };
        if let Some(t) = node.typesetting {
            if node.kind() == NodeKind::Island {
                return format!("island:{},{}", t.part, t.instant);
            }
        }
        let short = match node.kind() {
            NodeKind::Island => "island",
            NodeKind::Part => "part",
            NodeKind::Clef => "clef",
            NodeKind::KeySignature => "key",
            NodeKind::Meter => "meter",
            NodeKind::Barline => "barline",
            NodeKind::Chord => "chord",
            NodeKind::Note => "note",
            NodeKind::Instrument => "instr",
            NodeKind::TieSpan => "tie",
            NodeKind::Property => "property",
        };
        format!("{short}:{index}")
    }

    fn write_island(&self, out: &mut String, island: NodeId) {
        out.push_str(&format!("  <island id='{}'", self.uid(island)));
        if let Some(across) = self.graph.find(island, EdgeKind::PartWise, Direction::Forward) {
            out.push_str(&format!(" across='{}'", self.uid(across)));
        }
        if let Some(down) = self.graph.find(island, EdgeKind::InstantWise, Direction::Forward) {
            out.push_str(&format!(" down='{}'", self.uid(down)));
        }
        out.push_str(">\n");

        for token in self.graph.find_all(island, EdgeKind::Token, Direction::Forward) {
            self.write_token(out, token);
        }
        out.push_str("  </island>\n");
    }

    fn write_token(&self, out: &mut String, token: NodeId) {
        let Some(node) = self.graph.node(token) else {
            return;
        };
        match &node.data {
            NodeData::Part => self.write_part(out, token),
            NodeData::Clef { value } => {
                out.push_str(&format!(
                    "    <clef id='{}' value='{}'/>\n",
                    self.uid(token),
                    escape(value)
                ));
            }
            NodeData::Barline { value } => {
                out.push_str(&format!(
                    "    <barline id='{}' value='{}'/>\n",
                    self.uid(token),
                    escape(value)
                ));
            }
            NodeData::Meter { value } => {
                out.push_str(&format!(
                    "    <meter id='{}' value='{}'/>\n",
                    self.uid(token),
                    escape(value)
                ));
            }
            NodeData::KeySignature { key, signature } => {
                out.push_str(&format!("    <key id='{}'", self.uid(token)));
                if let Some(key) = key {
                    out.push_str(&format!(" key='{}'", escape(key)));
                } else if let Some(signature) = signature {
                    out.push_str(&format!(" key-signature='{}'", escape(signature)));
                }
                out.push_str("/>\n");
            }
            NodeData::Chord { duration, beat, instant } => {
                self.write_chord(out, token, duration, beat, instant);
            }
            // Instruments are written under their part token; anything else
            // has no record form.
            _ => {}
        }
    }

    fn write_part(&self, out: &mut String, part: NodeId) {
        let instrument = self
            .graph
            .find_all(part, EdgeKind::Token, Direction::Forward)
            .into_iter()
            .find(|&t| self.graph.kind(t) == Some(NodeKind::Instrument));

        match instrument {
            Some(node) => {
                out.push_str(&format!("    <part id='{}'>\n", self.uid(part)));
                self.write_instrument(out, node);
                out.push_str("    </part>\n");
            }
            None => {
                out.push_str(&format!("    <part id='{}'/>\n", self.uid(part)));
            }
        }
    }

    fn write_instrument(&self, out: &mut String, node: NodeId) {
        let Some(NodeData::Instrument(instrument)) = self.graph.node(node).map(|n| &n.data) else {
            return;
        };
        out.push_str(&format!(
            "      <instrument id='{}' type='{}' strings='{}' frets='{}' display='{}'>\n",
            self.uid(node),
            instrument.kind.name(),
            instrument.string_count(),
            instrument.frets,
            instrument.display.name()
        ));
        for s in &instrument.strings {
            out.push_str(&format!(
                "        <string note='{}' frets='{}'/>\n",
                midi_name(s.open_midi),
                s.frets
            ));
        }
        out.push_str("      </instrument>\n");
    }

    fn write_chord(&self, out: &mut String, chord: NodeId, duration: &str, beat: &str, instant: &str) {
        out.push_str(&format!("    <chord id='{}'", self.uid(chord)));
        if let Some(next) = self.graph.find(chord, EdgeKind::Continuity, Direction::Forward) {
            out.push_str(&format!(" next='{}'", self.uid(next)));
        } else if let Some(next) = self.graph.find(chord, EdgeKind::Voice, Direction::Forward) {
            out.push_str(&format!(" next-in-voice='{}'", self.uid(next)));
        }
        out.push_str(&format!(
            " duration='{}' beat='{}' instant='{}'>\n",
            escape(duration),
            escape(beat),
            escape(instant)
        ));

        for note in self.graph.find_all(chord, EdgeKind::Note, Direction::Forward) {
            self.write_note(out, note);
        }
        out.push_str("    </chord>\n");
    }

    fn write_note(&self, out: &mut String, note: NodeId) {
        let Some(NodeData::Note { pitch, rest, string }) =
            self.graph.node(note).map(|n| &n.data)
        else {
            return;
        };
        out.push_str(&format!("      <note id='{}'", self.uid(note)));
        if let Some(pitch) = pitch {
            out.push_str(&format!(" pitch='{pitch}'"));
        }
        if let Some(string) = string {
            out.push_str(&format!(" string='{string}'"));
        }
        if *rest {
            out.push_str(" rest='yes'");
        }
        if let Some(partner) = self.tie_partner(note) {
            // Each tie is written once, from the note with the smaller
            // canonical id, so reading recreates exactly one span.
            if self.canonical.get(&note) < self.canonical.get(&partner) {
                out.push_str(&format!(" tied-to='{}'", self.uid(partner)));
            }
        }
        out.push_str("/>\n");
    }

    /// The other note sharing a tie-span with this one, if any.
    fn tie_partner(&self, note: NodeId) -> Option<NodeId> {
        for span in self.graph.find_all(note, EdgeKind::Tie, Direction::Forward) {
            for other in self.graph.find_all(span, EdgeKind::Tie, Direction::Backward) {
                if other != note {
                    return Some(other);
                }
            }
        }
        None
    }
}

/// Spells a MIDI number as a pitch name, preferring sharps.
fn midi_name(midi: i32) -> String {
    let octave = midi.div_euclid(12) - 1;
    let (step, alter) = match midi.rem_euclid(12) {
        0 => ('C', 0),
        1 => ('C', 1),
        2 => ('D', 0),
        3 => ('D', 1),
        4 => ('E', 0),
        5 => ('F', 0),
        6 => ('F', 1),
        7 => ('G', 0),
        8 => ('G', 1),
        9 => ('A', 0),
        10 => ('A', 1),
        _ => ('B', 0),
    };
    Pitch::new(step, alter, octave).to_string()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midi_names_cover_accidentals_and_octaves() {
        assert_eq!(midi_name(60), "C4");
        assert_eq!(midi_name(45), "A2");
        assert_eq!(midi_name(54), "F#3");
        assert_eq!(midi_name(30), "F#1");
        assert_eq!(midi_name(9), "A-1");
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(escape("a<b>&'c"), "a&lt;b&gt;&amp;&apos;c");
    }
}
