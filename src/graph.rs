//! The music graph: an arena of typed nodes connected by typed, directed
//! links.
//!
//! A score is a mesh of islands (simultaneity points, one per part) wired
//! together by part-wise links (next island in the same part) and
//! instant-wise links (same simultaneity, next part down). Tokens (clefs,
//! keys, meters, barlines, chords) hang off islands through token links;
//! notes hang off chords; ties join two notes through a shared tie-span
//! node.
//!
//! Nodes are owned by the arena and addressed by stable [`NodeId`] handles.
//! Links are non-owning relation records. Part-wise, instant-wise,
//! continuity and voice links allow at most one successor per node, and the
//! two directional kinds also allow at most one predecessor; this is what
//! makes the island subgraph a (possibly irregular) rectangular mesh.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::GraphError;
use crate::instrument::StringedInstrument;
use crate::pitch::Pitch;

/// Stable handle to a node in a [`MusicGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Island,
    Part,
    Clef,
    KeySignature,
    Meter,
    Barline,
    Chord,
    Note,
    Instrument,
    TieSpan,
    Property,
}

/// Typed payload carried by a node, one variant per [`NodeKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Island,
    /// Part declaration. The instrument, if any, attaches via a token link.
    Part,
    /// Clef value, e.g. `treble` or `bass`.
    Clef { value: String },
    /// Either a named key (`d-minor`) or a raw signature (`2-sharps`).
    KeySignature {
        key: Option<String>,
        signature: Option<String>,
    },
    /// Meter value, e.g. `4/4`.
    Meter { value: String },
    /// Barline value, e.g. `standard` or `final`.
    Barline { value: String },
    /// Chord rhythm, kept in document form.
    Chord {
        duration: String,
        beat: String,
        instant: String,
    },
    /// One note of a chord. `string` is the string index requested by the
    /// score, if any.
    Note {
        pitch: Option<Pitch>,
        rest: bool,
        string: Option<usize>,
    },
    Instrument(StringedInstrument),
    TieSpan,
    Property { value: String },
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Island => NodeKind::Island,
            NodeData::Part => NodeKind::Part,
            NodeData::Clef { .. } => NodeKind::Clef,
            NodeData::KeySignature { .. } => NodeKind::KeySignature,
            NodeData::Meter { .. } => NodeKind::Meter,
            NodeData::Barline { .. } => NodeKind::Barline,
            NodeData::Chord { .. } => NodeKind::Chord,
            NodeData::Note { .. } => NodeKind::Note,
            NodeData::Instrument(_) => NodeKind::Instrument,
            NodeData::TieSpan => NodeKind::TieSpan,
            NodeData::Property { .. } => NodeKind::Property,
        }
    }
}

/// The kinds of directed links between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Island → next island in the same part.
    PartWise,
    /// Island → corresponding island in the same instant, next part down.
    InstantWise,
    /// Island → attached token (part, clef, key, meter, barline, chord).
    Token,
    /// Chord → one of its notes.
    Note,
    /// Chord → next chord (primary continuation).
    Continuity,
    /// Chord → next chord in the same voice.
    Voice,
    /// Note → shared tie-span node.
    Tie,
}

impl EdgeKind {
    /// Whether a node may have at most one outgoing edge of this kind.
    fn single_successor(self) -> bool {
        matches!(
            self,
            EdgeKind::PartWise | EdgeKind::InstantWise | EdgeKind::Continuity | EdgeKind::Voice
        )
    }

    /// Whether a node may have at most one incoming edge of this kind.
    fn single_predecessor(self) -> bool {
        matches!(self, EdgeKind::PartWise | EdgeKind::InstantWise)
    }

    fn name(self) -> &'static str {
        match self {
            EdgeKind::PartWise => "part-wise",
            EdgeKind::InstantWise => "instant-wise",
            EdgeKind::Token => "token",
            EdgeKind::Note => "note",
            EdgeKind::Continuity => "continuity",
            EdgeKind::Voice => "voice",
            EdgeKind::Tie => "tie",
        }
    }
}

/// Traversal direction along links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A directed, typed relation record between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// Coordinates assigned to an island by a geometry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Typesetting {
    pub part: usize,
    pub instant: usize,
}

/// One node of the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    /// Musical-concept attributes (keys unique).
    pub attributes: BTreeMap<String, String>,
    /// Free-form string properties.
    pub properties: BTreeMap<String, String>,
    /// Populated only after a geometry pass.
    pub typesetting: Option<Typesetting>,
    out: Vec<(EdgeKind, NodeId)>,
    inc: Vec<(EdgeKind, NodeId)>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            attributes: BTreeMap::new(),
            properties: BTreeMap::new(),
            typesetting: None,
            out: Vec::new(),
            inc: Vec::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }
}

/// The arena graph.
#[derive(Debug, Clone, Default)]
pub struct MusicGraph {
    nodes: Vec<Option<Node>>,
    top: Option<NodeId>,
}

impl MusicGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Nodes ───────────────────────────────────────────────────────

    /// Adds a node and returns its handle.
    pub fn add(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node::new(data)));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|n| n.as_mut())
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(Node::kind)
    }

    /// Deletes a node and every link touching it.
    pub fn remove(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        for (kind, to) in node.out {
            if let Some(n) = self.node_mut(to) {
                n.inc.retain(|&(k, f)| !(k == kind && f == id));
            }
        }
        for (kind, from) in node.inc {
            if let Some(n) = self.node_mut(from) {
                n.out.retain(|&(k, t)| !(k == kind && t == id));
            }
        }
        if self.top == Some(id) {
            self.top = None;
        }
    }

    /// Releases every node and resets the top reference.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.top = None;
    }

    /// The designated top island (first part, first instant), if any.
    pub fn top(&self) -> Option<NodeId> {
        self.top
    }

    pub fn set_top(&mut self, top: Option<NodeId>) {
        self.top = top;
    }

    // ─── Links ───────────────────────────────────────────────────────

    /// Adds a directed link. Single-successor kinds reject a second
    /// outgoing edge from `from`; part-wise and instant-wise links also
    /// reject a second incoming edge at `to`.
    pub fn link(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> Result<(), GraphError> {
        if self.node(from).is_none() {
            return Err(GraphError::StaleHandle(from.0));
        }
        if self.node(to).is_none() {
            return Err(GraphError::StaleHandle(to.0));
        }
        if kind.single_successor() && self.find(from, kind, Direction::Forward).is_some() {
            return Err(GraphError::DuplicateSuccessor {
                from: from.0,
                kind: kind.name(),
            });
        }
        if kind.single_predecessor() && self.find(to, kind, Direction::Backward).is_some() {
            return Err(GraphError::DuplicatePredecessor {
                to: to.0,
                kind: kind.name(),
            });
        }
        if let Some(n) = self.node_mut(from) {
            n.out.push((kind, to));
        }
        if let Some(n) = self.node_mut(to) {
            n.inc.push((kind, from));
        }
        Ok(())
    }

    /// Removes a link if present.
    pub fn unlink(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        if let Some(n) = self.node_mut(from) {
            n.out.retain(|&(k, t)| !(k == kind && t == to));
        }
        if let Some(n) = self.node_mut(to) {
            n.inc.retain(|&(k, f)| !(k == kind && f == from));
        }
    }

    /// First neighbor over a link of the given kind and direction. Missing
    /// edges are not an error; the result is simply `None`.
    pub fn find(&self, id: NodeId, kind: EdgeKind, dir: Direction) -> Option<NodeId> {
        let node = self.node(id)?;
        let list = match dir {
            Direction::Forward => &node.out,
            Direction::Backward => &node.inc,
        };
        list.iter().find(|&&(k, _)| k == kind).map(|&(_, n)| n)
    }

    /// All neighbors over links of the given kind and direction, in
    /// insertion order.
    pub fn find_all(&self, id: NodeId, kind: EdgeKind, dir: Direction) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let list = match dir {
            Direction::Forward => &node.out,
            Direction::Backward => &node.inc,
        };
        list.iter()
            .filter(|&&(k, _)| k == kind)
            .map(|&(_, n)| n)
            .collect()
    }

    /// All live nodes and all links, in handle order.
    pub fn gather(&self) -> (Vec<NodeId>, Vec<Link>) {
        let mut ids = Vec::new();
        let mut links = Vec::new();
        for (i, slot) in self.nodes.iter().enumerate() {
            let Some(node) = slot else { continue };
            let from = NodeId(i as u32);
            ids.push(from);
            for &(kind, to) in &node.out {
                links.push(Link { from, to, kind });
            }
        }
        (ids, links)
    }

    /// All live island nodes, in handle order.
    pub fn islands(&self) -> Vec<NodeId> {
        self.gather()
            .0
            .into_iter()
            .filter(|&id| self.kind(id) == Some(NodeKind::Island))
            .collect()
    }

    // ─── Traversal helpers ───────────────────────────────────────────

    /// Whether the node is an island that participates in the mesh: it must
    /// carry at least one part-wise, instant-wise or token link. An island
    /// with no links at all is an orphan and is not typesettable.
    pub fn is_real_island(&self, id: NodeId) -> bool {
        if self.kind(id) != Some(NodeKind::Island) {
            return false;
        }
        for kind in [EdgeKind::PartWise, EdgeKind::InstantWise] {
            if self.find(id, kind, Direction::Forward).is_some()
                || self.find(id, kind, Direction::Backward).is_some()
            {
                return true;
            }
        }
        self.find(id, EdgeKind::Token, Direction::Forward).is_some()
    }

    /// Follows instant-wise links backward to the island that starts this
    /// instant's simultaneity group. Returns `None` for non-islands.
    pub fn raise_to_top_part(&self, id: NodeId) -> Option<NodeId> {
        if self.kind(id) != Some(NodeKind::Island) {
            return None;
        }
        let mut current = id;
        while let Some(up) = self.find(current, EdgeKind::InstantWise, Direction::Backward) {
            current = up;
        }
        Some(current)
    }

    // ─── Mesh construction ───────────────────────────────────────────

    /// Clears the graph and builds a full `parts` × `instants` island mesh,
    /// setting the top to the first island.
    pub fn create_islands(&mut self, parts: usize, instants: usize) -> Result<(), GraphError> {
        self.clear();
        if parts == 0 || instants == 0 {
            return Ok(());
        }

        // First part strand.
        let mut first_row = Vec::with_capacity(instants);
        let mut x = self.add(NodeData::Island);
        self.set_top(Some(x));
        first_row.push(x);
        for _ in 1..instants {
            let y = self.add(NodeData::Island);
            self.link(x, y, EdgeKind::PartWise)?;
            first_row.push(y);
            x = y;
        }

        // Remaining parts, linked down from the row above.
        let mut previous_row = first_row;
        for _ in 1..parts {
            let mut row = Vec::with_capacity(instants);
            for (j, &above) in previous_row.iter().enumerate() {
                let island = self.add(NodeData::Island);
                self.link(above, island, EdgeKind::InstantWise)?;
                if j > 0 {
                    self.link(row[j - 1], island, EdgeKind::PartWise)?;
                }
                row.push(island);
            }
            previous_row = row;
        }
        Ok(())
    }

    /// Appends one instant of islands after the instant whose top island is
    /// given, returning the top island of the new instant.
    pub fn append_instant(&mut self, top_of_last: NodeId) -> Result<NodeId, GraphError> {
        let mut previous = top_of_last;
        let first = self.add(NodeData::Island);
        self.link(previous, first, EdgeKind::PartWise)?;
        let mut current = first;
        while let Some(below) = self.find(previous, EdgeKind::InstantWise, Direction::Forward) {
            let island = self.add(NodeData::Island);
            self.link(below, island, EdgeKind::PartWise)?;
            self.link(current, island, EdgeKind::InstantWise)?;
            previous = below;
            current = island;
        }
        Ok(first)
    }
}
