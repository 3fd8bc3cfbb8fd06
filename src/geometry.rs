//! Geometry inference: recovering (part, instant) coordinates for every
//! island from nothing but the part-wise/instant-wise adjacency.
//!
//! Two independent passes, combined at the end:
//!
//! 1. **Part assignment** — mark each part strand with a provisional index,
//!    observe "A's part precedes B's part" facts from the instant-wise
//!    links, close the precedence relation transitively, detect conflicts
//!    (crossing staves), and remap the provisional indexes into a total
//!    order consistent with the closure.
//! 2. **Instant assignment** — the leading-edge sweep: a frontier of the
//!    most recently finalized island per part advances one whole instant
//!    group at a time, which keeps the numbering monotonic even when parts
//!    begin or end mid-score.
//!
//! Coordinates are computed on local maps and committed to the graph only
//! when both passes succeed; a detected conflict leaves the graph untouched.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ScoreError;
use crate::graph::{Direction, EdgeKind, MusicGraph, NodeId, Typesetting};

// ═══════════════════════════════════════════════════════════════════════
// Transitive part ordering
// ═══════════════════════════════════════════════════════════════════════

/// Precedence solver over a fixed set of part indexes. Facts are pairwise
/// "a precedes b" observations; `solve` closes them transitively and
/// derives a total order.
#[derive(Debug, Clone)]
pub struct TransitiveMapping {
    n: usize,
    /// Row-major `precedes[a * n + b]`.
    precedes: Vec<bool>,
    mapping: Vec<usize>,
}

impl TransitiveMapping {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            precedes: vec![false; n * n],
            mapping: (0..n).collect(),
        }
    }

    /// Records the fact that part `a` lies above part `b`.
    pub fn set_precedes(&mut self, a: usize, b: usize) {
        if a < self.n && b < self.n && a != b {
            self.precedes[a * self.n + b] = true;
        }
    }

    fn precedes(&self, a: usize, b: usize) -> bool {
        self.precedes[a * self.n + b]
    }

    /// Computes the transitive closure and the total order.
    pub fn solve(&mut self) {
        // Warshall closure over the boolean relation.
        for k in 0..self.n {
            for i in 0..self.n {
                if !self.precedes(i, k) {
                    continue;
                }
                for j in 0..self.n {
                    if self.precedes(k, j) {
                        self.precedes[i * self.n + j] = true;
                    }
                }
            }
        }

        // After closure, every predecessor of a part also precedes all of
        // that part's successors, so ranking by predecessor count is a
        // valid linearization. Provisional index breaks ties, which keeps
        // the order deterministic for a given input.
        let mut order: Vec<usize> = (0..self.n).collect();
        let counts: Vec<usize> = (0..self.n)
            .map(|p| (0..self.n).filter(|&q| self.precedes(q, p)).count())
            .collect();
        order.sort_by_key(|&p| (counts[p], p));

        self.mapping = vec![0; self.n];
        for (rank, &part) in order.iter().enumerate() {
            self.mapping[part] = rank;
        }
    }

    /// Whether the closed relation contains a contradiction (some part both
    /// precedes and follows another). Only meaningful after `solve`.
    pub fn is_conflicted(&self) -> bool {
        for a in 0..self.n {
            if self.precedes(a, a) {
                return true;
            }
            for b in (a + 1)..self.n {
                if self.precedes(a, b) && self.precedes(b, a) {
                    return true;
                }
            }
        }
        false
    }

    /// Final position of provisional part `i` in the total order.
    pub fn mapping(&self, i: usize) -> usize {
        self.mapping[i]
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════════════════

/// Aggregate geometry facts exported for data exchange.
#[derive(Debug, Clone, Serialize)]
pub struct GeometrySummary {
    pub parts: usize,
    pub instants: usize,
    /// Per part, the first and last instant it spans.
    pub part_ranges: Vec<(usize, usize)>,
    /// Per instant, the number of parts present.
    pub parts_in_instant: Vec<usize>,
}

/// Result of a geometry pass over one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    parts: usize,
    instants: usize,
    part_ranges: Vec<(usize, usize)>,
    parts_in_instant: Vec<usize>,
    /// Part-major island lookup; `None` where a part does not span an
    /// instant.
    matrix: Vec<Option<NodeId>>,
}

impl Geometry {
    /// Runs both passes and commits `Typesetting` to every island on
    /// success. On conflict no coordinates are assigned anywhere.
    pub fn parse(graph: &mut MusicGraph) -> Result<Geometry, ScoreError> {
        let islands: Vec<NodeId> = graph
            .islands()
            .into_iter()
            .filter(|&id| graph.is_real_island(id))
            .collect();

        let (part_of, parts) = assign_parts(graph, &islands)?;
        let (instant_of, parts_in_instant, instants) = assign_instants(graph, &islands)?;

        // Commit the coordinates.
        for &island in &islands {
            let (Some(&part), Some(&instant)) = (part_of.get(&island), instant_of.get(&island))
            else {
                // Unreachable islands would indicate a disconnected mesh;
                // they stay untypeset rather than poisoning the lookup.
                continue;
            };
            if let Some(node) = graph.node_mut(island) {
                node.typesetting = Some(Typesetting { part, instant });
            }
        }

        // Part ranges from each strand's first and last island.
        let mut part_ranges = vec![(usize::MAX, 0); parts];
        for &island in &islands {
            let (Some(&part), Some(&instant)) = (part_of.get(&island), instant_of.get(&island))
            else {
                continue;
            };
            let range = &mut part_ranges[part];
            range.0 = range.0.min(instant);
            range.1 = range.1.max(instant);
        }

        // Reverse lookup matrix, part-major.
        let mut matrix = vec![None; parts * instants];
        for &island in &islands {
            let (Some(&part), Some(&instant)) = (part_of.get(&island), instant_of.get(&island))
            else {
                continue;
            };
            matrix[part * instants + instant] = Some(island);
        }

        Ok(Geometry {
            parts,
            instants,
            part_ranges,
            parts_in_instant,
            matrix,
        })
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    pub fn instants(&self) -> usize {
        self.instants
    }

    /// First and last instant spanned by a part.
    pub fn part_range(&self, part: usize) -> Option<(usize, usize)> {
        self.part_ranges.get(part).copied()
    }

    /// Number of parts present in an instant.
    pub fn parts_in_instant(&self, instant: usize) -> usize {
        self.parts_in_instant.get(instant).copied().unwrap_or(0)
    }

    /// Parts whose span covers the given instant.
    pub fn part_list_for_instant(&self, instant: usize) -> Vec<usize> {
        (0..self.parts)
            .filter(|&p| {
                let (first, last) = self.part_ranges[p];
                first <= instant && instant <= last
            })
            .collect()
    }

    /// Whether every part that spans this instant is present in it.
    pub fn is_instant_complete(&self, instant: usize) -> bool {
        self.part_list_for_instant(instant).len() == self.parts_in_instant(instant)
    }

    /// Island at (part, instant), if the part spans that instant.
    pub fn lookup(&self, part: usize, instant: usize) -> Option<NodeId> {
        if part < self.parts && instant < self.instants {
            self.matrix[part * self.instants + instant]
        } else {
            None
        }
    }

    /// Topmost island present in an instant.
    pub fn top_island_in_instant(&self, instant: usize) -> Option<NodeId> {
        (0..self.parts).find_map(|p| self.lookup(p, instant))
    }

    pub fn summary(&self) -> GeometrySummary {
        GeometrySummary {
            parts: self.parts,
            instants: self.instants,
            part_ranges: self.part_ranges.clone(),
            parts_in_instant: self.parts_in_instant.clone(),
        }
    }
}

// ─── Part assignment ─────────────────────────────────────────────────

/// Marks part strands, observes precedence from instant-wise links, solves
/// the transitive ordering and returns the final part index per island.
fn assign_parts(
    graph: &MusicGraph,
    islands: &[NodeId],
) -> Result<(HashMap<NodeId, usize>, usize), ScoreError> {
    // Trace each strand from its origin island.
    let mut provisional: HashMap<NodeId, usize> = HashMap::new();
    let mut part_index = 0;
    for &island in islands {
        if graph.find(island, EdgeKind::PartWise, Direction::Backward).is_some() {
            continue;
        }
        let mut current = Some(island);
        while let Some(c) = current {
            provisional.insert(c, part_index);
            current = graph.find(c, EdgeKind::PartWise, Direction::Forward);
        }
        part_index += 1;
    }
    let parts = part_index;

    // Every instant-wise link says "my part lies above yours".
    let mut ordering = TransitiveMapping::new(parts);
    for &island in islands {
        if let Some(below) = graph.find(island, EdgeKind::InstantWise, Direction::Forward) {
            if let (Some(&a), Some(&b)) = (provisional.get(&island), provisional.get(&below)) {
                ordering.set_precedes(a, b);
            }
        }
    }

    ordering.solve();
    if ordering.is_conflicted() {
        return Err(ScoreError::StructuralConflict);
    }

    let part_of = provisional
        .into_iter()
        .map(|(island, p)| (island, ordering.mapping(p)))
        .collect();
    Ok((part_of, parts))
}

// ─── Instant assignment ──────────────────────────────────────────────

/// Full instant-wise group containing `island`: raised to the top of its
/// simultaneity chain, then walked down.
fn instant_group(graph: &MusicGraph, island: NodeId) -> Vec<NodeId> {
    let mut top = island;
    while let Some(up) = graph.find(top, EdgeKind::InstantWise, Direction::Backward) {
        top = up;
    }
    let mut group = vec![top];
    let mut current = top;
    while let Some(down) = graph.find(current, EdgeKind::InstantWise, Direction::Forward) {
        group.push(down);
        current = down;
    }
    group
}

/// The leading-edge sweep. Returns the instant index per island, the part
/// count per instant, and the total instant count.
#[allow(clippy::type_complexity)]
fn assign_instants(
    graph: &MusicGraph,
    islands: &[NodeId],
) -> Result<(HashMap<NodeId, usize>, Vec<usize>, usize), ScoreError> {
    let mut instant_of: HashMap<NodeId, usize> = HashMap::new();
    let mut parts_in_instant: Vec<usize> = Vec::new();

    if islands.is_empty() {
        return Ok((instant_of, parts_in_instant, 0));
    }

    // The first simultaneity group hangs off the top island.
    let top = match graph.top() {
        Some(t) if islands.contains(&t) => t,
        _ => islands[0],
    };
    let mut edge: Vec<NodeId> = instant_group(graph, top);
    for &island in &edge {
        instant_of.insert(island, 0);
    }
    parts_in_instant.push(edge.len());
    let mut next_instant = 1;

    while !edge.is_empty() {
        let mut progressed = false;
        let mut i = 0;
        while i < edge.len() {
            // A part with no further islands retires from the edge.
            let Some(next) = graph.find(edge[i], EdgeKind::PartWise, Direction::Forward) else {
                edge.remove(i);
                progressed = true;
                continue;
            };

            // The candidate instant may only be finalized once every part
            // it touches has caught up: each member's part-wise
            // predecessor, if it has one, must sit on the edge right now.
            let group = instant_group(graph, next);
            let predecessors: Vec<Option<NodeId>> = group
                .iter()
                .map(|&m| graph.find(m, EdgeKind::PartWise, Direction::Backward))
                .collect();
            let may_advance = predecessors
                .iter()
                .flatten()
                .all(|p| edge.contains(p));
            if !may_advance {
                i += 1;
                continue;
            }

            // Advance the whole group. Members of known parts replace their
            // predecessor's edge entry; newly-introduced parts append at
            // the end (their relative order does not affect correctness).
            for (&member, pred) in group.iter().zip(&predecessors) {
                match pred {
                    Some(p) => {
                        if let Some(slot) = edge.iter_mut().find(|e| **e == *p) {
                            *slot = member;
                        }
                    }
                    None => edge.push(member),
                }
                instant_of.insert(member, next_instant);
            }
            parts_in_instant.push(group.len());
            next_instant += 1;
            progressed = true;
            // The group advanced; keep pushing along the same part.
        }

        // A sweep that neither advanced nor retired anything means the
        // remaining adjacency is contradictory and would spin forever.
        if !progressed {
            return Err(ScoreError::StructuralConflict);
        }
    }

    Ok((instant_of, parts_in_instant, next_instant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeData;
    use pretty_assertions::assert_eq;

    fn typesetting(g: &MusicGraph, id: NodeId) -> (usize, usize) {
        let t = g.node(id).unwrap().typesetting.unwrap();
        (t.part, t.instant)
    }

    #[test]
    fn rectangular_mesh_recovers_row_and_column_indexes() {
        let mut g = MusicGraph::new();
        g.create_islands(2, 3).unwrap();
        let geo = Geometry::parse(&mut g).unwrap();

        assert_eq!(geo.parts(), 2);
        assert_eq!(geo.instants(), 3);
        assert_eq!(geo.part_range(0), Some((0, 2)));
        assert_eq!(geo.part_range(1), Some((0, 2)));

        // Walk the mesh and compare against the lookup matrix.
        let mut row = Some(g.top().unwrap());
        for part in 0..2 {
            let mut current = row.unwrap();
            for instant in 0..3 {
                assert_eq!(typesetting(&g, current), (part, instant));
                assert_eq!(geo.lookup(part, instant), Some(current));
                if instant < 2 {
                    current = g.find(current, EdgeKind::PartWise, Direction::Forward).unwrap();
                }
            }
            row = g.find(row.unwrap(), EdgeKind::InstantWise, Direction::Forward);
        }

        for instant in 0..3 {
            assert_eq!(geo.parts_in_instant(instant), 2);
            assert!(geo.is_instant_complete(instant));
        }
    }

    #[test]
    fn instants_increase_along_part_wise_links() {
        let mut g = MusicGraph::new();
        g.create_islands(3, 4).unwrap();
        Geometry::parse(&mut g).unwrap();

        let (nodes, links) = g.gather();
        assert_eq!(nodes.len(), 12);
        for link in links.iter().filter(|l| l.kind == EdgeKind::PartWise) {
            let (pa, ia) = typesetting(&g, link.from);
            let (pb, ib) = typesetting(&g, link.to);
            assert_eq!(pa, pb);
            assert!(ib > ia, "instant must advance along part-wise links");
        }
        for link in links.iter().filter(|l| l.kind == EdgeKind::InstantWise) {
            let (pa, ia) = typesetting(&g, link.from);
            let (pb, ib) = typesetting(&g, link.to);
            assert_eq!(ia, ib);
            assert!(pb > pa, "part must descend along instant-wise links");
        }
    }

    #[test]
    fn part_starting_mid_score_is_spanned_correctly() {
        // Part 0 spans instants 0..=2; part 1 joins at instant 1.
        //
        //   a0 ── a1 ── a2
        //          │     │
        //         b1 ── b2
        let mut g = MusicGraph::new();
        let a0 = g.add(NodeData::Island);
        let a1 = g.add(NodeData::Island);
        let a2 = g.add(NodeData::Island);
        let b1 = g.add(NodeData::Island);
        let b2 = g.add(NodeData::Island);
        g.link(a0, a1, EdgeKind::PartWise).unwrap();
        g.link(a1, a2, EdgeKind::PartWise).unwrap();
        g.link(b1, b2, EdgeKind::PartWise).unwrap();
        g.link(a1, b1, EdgeKind::InstantWise).unwrap();
        g.link(a2, b2, EdgeKind::InstantWise).unwrap();
        g.set_top(Some(a0));

        let geo = Geometry::parse(&mut g).unwrap();
        assert_eq!(geo.parts(), 2);
        assert_eq!(geo.instants(), 3);
        assert_eq!(typesetting(&g, a0), (0, 0));
        assert_eq!(typesetting(&g, b1), (1, 1));
        assert_eq!(typesetting(&g, b2), (1, 2));
        assert_eq!(geo.part_range(1), Some((1, 2)));
        assert_eq!(geo.parts_in_instant(0), 1);
        assert_eq!(geo.parts_in_instant(1), 2);
        assert!(geo.is_instant_complete(0));
        assert!(geo.is_instant_complete(1));
        assert_eq!(geo.lookup(1, 0), None);
    }

    #[test]
    fn part_ending_early_retires_from_the_edge() {
        //   a0 ── a1 ── a2
        //    │     │
        //   b0 ── b1
        let mut g = MusicGraph::new();
        let a0 = g.add(NodeData::Island);
        let a1 = g.add(NodeData::Island);
        let a2 = g.add(NodeData::Island);
        let b0 = g.add(NodeData::Island);
        let b1 = g.add(NodeData::Island);
        g.link(a0, a1, EdgeKind::PartWise).unwrap();
        g.link(a1, a2, EdgeKind::PartWise).unwrap();
        g.link(b0, b1, EdgeKind::PartWise).unwrap();
        g.link(a0, b0, EdgeKind::InstantWise).unwrap();
        g.link(a1, b1, EdgeKind::InstantWise).unwrap();
        g.set_top(Some(a0));

        let geo = Geometry::parse(&mut g).unwrap();
        assert_eq!(geo.instants(), 3);
        assert_eq!(typesetting(&g, a2), (0, 2));
        assert_eq!(geo.part_range(1), Some((0, 1)));
        assert_eq!(geo.parts_in_instant(2), 1);
        assert!(geo.is_instant_complete(2));
    }

    #[test]
    fn three_part_precedence_cycle_is_a_conflict() {
        // Three instants, each carrying one instant-wise link, arranged so
        // the part order facts form the cycle A≺B, B≺C, C≺A.
        let mut g = MusicGraph::new();
        let a0 = g.add(NodeData::Island);
        let a1 = g.add(NodeData::Island);
        let a2 = g.add(NodeData::Island);
        let b0 = g.add(NodeData::Island);
        let b1 = g.add(NodeData::Island);
        let b2 = g.add(NodeData::Island);
        let c0 = g.add(NodeData::Island);
        let c1 = g.add(NodeData::Island);
        let c2 = g.add(NodeData::Island);
        for (x, y, z) in [(a0, a1, a2), (b0, b1, b2), (c0, c1, c2)] {
            g.link(x, y, EdgeKind::PartWise).unwrap();
            g.link(y, z, EdgeKind::PartWise).unwrap();
        }
        g.link(a0, b0, EdgeKind::InstantWise).unwrap(); // A above B
        g.link(b1, c1, EdgeKind::InstantWise).unwrap(); // B above C
        g.link(c2, a2, EdgeKind::InstantWise).unwrap(); // C above A, closing the cycle
        g.set_top(Some(a0));

        assert_eq!(Geometry::parse(&mut g), Err(ScoreError::StructuralConflict));
        // No partial geometry is left behind.
        for id in g.islands() {
            assert!(g.node(id).unwrap().typesetting.is_none());
        }
    }

    #[test]
    fn transitive_mapping_orders_and_detects_cycles() {
        let mut t = TransitiveMapping::new(3);
        t.set_precedes(2, 0);
        t.set_precedes(0, 1);
        t.solve();
        assert!(!t.is_conflicted());
        assert_eq!(t.mapping(2), 0);
        assert_eq!(t.mapping(0), 1);
        assert_eq!(t.mapping(1), 2);

        let mut c = TransitiveMapping::new(3);
        c.set_precedes(0, 1);
        c.set_precedes(1, 2);
        c.set_precedes(2, 0);
        c.solve();
        assert!(c.is_conflicted());
    }

    #[test]
    fn unrelated_parts_keep_a_deterministic_order() {
        let mut t = TransitiveMapping::new(4);
        t.set_precedes(3, 1);
        t.solve();
        assert!(!t.is_conflicted());
        // 3 precedes 1; 0 and 2 are unconstrained and fall back to
        // provisional order among equals.
        let ranks: Vec<usize> = (0..4).map(|i| t.mapping(i)).collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        assert!(t.mapping(3) < t.mapping(1));
    }

    #[test]
    fn single_island_with_token_is_typeset() {
        let mut g = MusicGraph::new();
        let island = g.add(NodeData::Island);
        let clef = g.add(NodeData::Clef { value: "treble".into() });
        g.link(island, clef, EdgeKind::Token).unwrap();
        g.set_top(Some(island));

        let geo = Geometry::parse(&mut g).unwrap();
        assert_eq!(geo.parts(), 1);
        assert_eq!(geo.instants(), 1);
        assert_eq!(typesetting(&g, island), (0, 0));
    }
}
