//! Score document reader — converts the XML record stream into a
//! [`MusicGraph`].
//!
//! Reading is two passes over the document. The first pass creates one
//! graph node per record (islands and their token subtrees); the second
//! resolves cross-references (island adjacency, chord continuity and voice
//! chains, note tie pairs) by identifier lookup. A reference to an unknown
//! identifier drops just that relation and collects a warning; the parse as
//! a whole only fails for unparsable syntax or a record that requires an
//! identifier but has none.

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::error::{ScoreError, Warning};
use crate::graph::{EdgeKind, MusicGraph, NodeData, NodeId};
use crate::instrument::{DisplayMode, InstrumentKind, StringedInstrument, DEFAULT_FRETS};
use crate::pitch::Pitch;

/// A successfully read document: the graph plus any recoverable warnings
/// collected along the way.
#[derive(Debug)]
pub struct ReadScore {
    pub graph: MusicGraph,
    pub warnings: Vec<Warning>,
}

/// Parse a score document into a music graph.
pub fn read_score(xml: &str) -> Result<ReadScore, ScoreError> {
    let doc = Document::parse(xml)
        .map_err(|e| ScoreError::MalformedDocument(format!("XML parse error: {e}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != "score" {
        return Err(ScoreError::MalformedDocument(format!(
            "unsupported root element '{}'",
            root.tag_name().name()
        )));
    }

    let mut reader = Reader {
        graph: MusicGraph::new(),
        warnings: Vec::new(),
        by_id: HashMap::new(),
        refs: Vec::new(),
        synthetic: 0,
    };

    // First pass: one node per record.
    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "island" => reader.read_island(&child)?,
            other => reader.warn_unknown(other),
        }
    }

    // Second pass: resolve cross-references.
    reader.resolve();

    let Reader { graph, warnings, .. } = reader;
    Ok(ReadScore { graph, warnings })
}

/// A cross-reference noticed during the first pass, resolved in the second.
struct PendingRef {
    from: NodeId,
    kind: EdgeKind,
    target: String,
    context: &'static str,
}

struct Reader {
    graph: MusicGraph,
    warnings: Vec<Warning>,
    by_id: HashMap<String, NodeId>,
    refs: Vec<PendingRef>,
    synthetic: u32,
}

impl Reader {
    fn warn_unknown(&mut self, name: &str) {
        log::warn!("unrecognized record '{name}' skipped");
        self.warnings.push(Warning::UnknownRecord { name: name.to_string() });
    }

    /// Registers a node under its document identifier, inventing one when a
    /// record may legally omit it.
    fn register(&mut self, id: Option<&str>, node: NodeId) {
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                self.synthetic += 1;
                format!("#synthetic-{}", self.synthetic)
            }
        };
        self.by_id.insert(id, node);
    }

    fn defer(&mut self, from: NodeId, kind: EdgeKind, target: &str, context: &'static str) {
        self.refs.push(PendingRef {
            from,
            kind,
            target: target.to_string(),
            context,
        });
    }

    // ─── First pass ──────────────────────────────────────────────────

    fn read_island(&mut self, e: &Node) -> Result<(), ScoreError> {
        let id = e.attribute("id").ok_or_else(|| {
            ScoreError::MalformedDocument("island record with no id attribute".into())
        })?;

        let island = self.graph.add(NodeData::Island);
        self.register(Some(id), island);
        if let Some(across) = e.attribute("across") {
            self.defer(island, EdgeKind::PartWise, across, "island 'across'");
        }
        if let Some(down) = e.attribute("down") {
            self.defer(island, EdgeKind::InstantWise, down, "island 'down'");
        }

        // The first island read becomes the top of the graph.
        if self.graph.top().is_none() {
            self.graph.set_top(Some(island));
        }

        for child in e.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "part" => self.read_part(&child, island),
                "clef" => {
                    let value = child.attribute("value").unwrap_or_default().to_string();
                    self.add_token(&child, island, NodeData::Clef { value });
                }
                "barline" => {
                    let value = child.attribute("value").unwrap_or_default().to_string();
                    self.add_token(&child, island, NodeData::Barline { value });
                }
                "meter" => {
                    let value = child.attribute("value").unwrap_or_default().to_string();
                    self.add_token(&child, island, NodeData::Meter { value });
                }
                "key" => {
                    let data = NodeData::KeySignature {
                        key: child.attribute("key").map(String::from),
                        signature: child.attribute("key-signature").map(String::from),
                    };
                    self.add_token(&child, island, data);
                }
                "chord" => self.read_chord(&child, island)?,
                other => self.warn_unknown(other),
            }
        }
        Ok(())
    }

    fn add_token(&mut self, e: &Node, island: NodeId, data: NodeData) -> NodeId {
        let token = self.graph.add(data);
        // Token links are multi-edges in insertion order; this cannot fail.
        let _ = self.graph.link(island, token, EdgeKind::Token);
        self.register(e.attribute("id"), token);
        token
    }

    fn read_part(&mut self, e: &Node, island: NodeId) {
        let part = self.add_token(e, island, NodeData::Part);
        for child in e.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "instrument" {
                let instrument = self.read_instrument(&child);
                let node = self.graph.add(NodeData::Instrument(instrument));
                let _ = self.graph.link(part, node, EdgeKind::Token);
                self.register(child.attribute("id"), node);
            } else {
                self.warn_unknown(child.tag_name().name());
            }
        }
    }

    fn read_instrument(&mut self, e: &Node) -> StringedInstrument {
        let kind = e
            .attribute("type")
            .and_then(InstrumentKind::from_name)
            .unwrap_or(InstrumentKind::Guitar);
        let strings = e
            .attribute("strings")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or_else(|| kind.default_string_count());
        let frets = e
            .attribute("frets")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_FRETS);
        let display = e
            .attribute("display")
            .and_then(DisplayMode::from_name)
            .unwrap_or(DisplayMode::Standard);

        let mut instrument = StringedInstrument::new(kind, strings, frets, display);

        // Explicit string children replace the default tuning entirely.
        let mut replaced = false;
        for child in e.children().filter(|n| n.is_element()) {
            if child.tag_name().name() != "string" {
                self.warn_unknown(child.tag_name().name());
                continue;
            }
            let note = child
                .attribute("note")
                .and_then(|n| n.parse::<Pitch>().ok());
            let string_frets = child
                .attribute("frets")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(frets);
            if let Some(note) = note {
                if !replaced {
                    instrument.clear_strings();
                    replaced = true;
                }
                instrument.add_string(note.to_midi(), string_frets);
            }
        }
        instrument
    }

    fn read_chord(&mut self, e: &Node, island: NodeId) -> Result<(), ScoreError> {
        if e.attribute("id").is_none() {
            return Err(ScoreError::MalformedDocument(
                "chord record with no id attribute".into(),
            ));
        }

        let data = NodeData::Chord {
            duration: e.attribute("duration").unwrap_or_default().to_string(),
            beat: e.attribute("beat").unwrap_or_default().to_string(),
            instant: e.attribute("instant").unwrap_or_default().to_string(),
        };
        let chord = self.add_token(e, island, data);

        // `next` sets both the continuity and the voice chain; a chord that
        // only continues a voice uses `next-in-voice`.
        if let Some(next) = e.attribute("next") {
            self.defer(chord, EdgeKind::Continuity, next, "chord 'next'");
            self.defer(chord, EdgeKind::Voice, next, "chord 'next'");
        } else if let Some(next) = e.attribute("next-in-voice") {
            self.defer(chord, EdgeKind::Voice, next, "chord 'next-in-voice'");
        }

        for child in e.children().filter(|n| n.is_element()) {
            if child.tag_name().name() != "note" {
                self.warn_unknown(child.tag_name().name());
                continue;
            }
            let rest = child.attribute("rest") == Some("yes");
            let pitch = child
                .attribute("pitch")
                .and_then(|p| p.parse::<Pitch>().ok());
            let string = child
                .attribute("string")
                .and_then(|s| s.parse::<usize>().ok());
            let note = self.graph.add(NodeData::Note { pitch, rest, string });
            let _ = self.graph.link(chord, note, EdgeKind::Note);
            self.register(child.attribute("id"), note);
            if let Some(tied) = child.attribute("tied-to") {
                self.defer(note, EdgeKind::Tie, tied, "note 'tied-to'");
            }
        }
        Ok(())
    }

    // ─── Second pass ─────────────────────────────────────────────────

    fn resolve(&mut self) {
        let refs = std::mem::take(&mut self.refs);
        for r in refs {
            let Some(&target) = self.by_id.get(&r.target) else {
                log::warn!(
                    "{} refers to unknown id '{}'; relation dropped",
                    r.context,
                    r.target
                );
                self.warnings.push(Warning::UnresolvedReference {
                    context: r.context.to_string(),
                    id: r.target,
                });
                continue;
            };

            match r.kind {
                // A tie reference creates a shared tie-span node that both
                // notes point at.
                EdgeKind::Tie => {
                    let span = self.graph.add(NodeData::TieSpan);
                    let _ = self.graph.link(r.from, span, EdgeKind::Tie);
                    let _ = self.graph.link(target, span, EdgeKind::Tie);
                }
                kind => {
                    if let Err(e) = self.graph.link(r.from, target, kind) {
                        log::warn!("{}: {e}; relation dropped", r.context);
                        self.warnings.push(Warning::UnresolvedReference {
                            context: r.context.to_string(),
                            id: format!("{}", target.0),
                        });
                    }
                }
            }
        }
    }
}
