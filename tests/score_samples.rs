//! Integration tests — read full score documents and check the graph,
//! geometry, and tablature that come out of them.

use pretty_assertions::assert_eq;
use scoregraph::{
    active_instrument, map_chord, read_score, Direction, EdgeKind, Geometry, InstrumentKind,
    MusicGraph, NodeData, NodeId, NodeKind, ScanOrder, ScoreError, Warning,
};

/// Two parts (guitar and bass) over four instants: declarations, clefs,
/// chords, and a closing barline, with one tie across the guitar chords.
const DUET: &str = r#"<score>
  <island id='i00' across='i01' down='i10'>
    <part id='p0'>
      <instrument id='in0' type='guitar' strings='6' frets='19' display='tab'/>
    </part>
  </island>
  <island id='i01' across='i02' down='i11'>
    <clef id='c0' value='treble'/>
    <key id='k0' key='e-minor'/>
    <meter id='m0' value='4/4'/>
  </island>
  <island id='i02' across='i03' down='i12'>
    <chord id='ch0' next='ch1' duration='1/4' beat='1' instant='0'>
      <note id='n0' pitch='E4' string='0' tied-to='n2'/>
      <note id='n1' pitch='B3' string='1'/>
    </chord>
  </island>
  <island id='i03' down='i13'>
    <chord id='ch1' duration='1/4' beat='2' instant='1/4'>
      <note id='n2' pitch='E4' string='0'/>
    </chord>
    <barline id='b0' value='standard'/>
  </island>
  <island id='i10' across='i11'>
    <part id='p1'>
      <instrument id='in1' type='bass' strings='4' frets='19' display='both'/>
    </part>
  </island>
  <island id='i11' across='i12'>
    <clef id='c1' value='bass'/>
  </island>
  <island id='i12' across='i13'>
    <chord id='ch2' next='ch3' duration='1/2' beat='1' instant='0'>
      <note id='n3' pitch='E1'/>
    </chord>
  </island>
  <island id='i13'>
    <chord id='ch3' duration='1/2' beat='2' instant='1/2'>
      <note id='n4' rest='yes'/>
    </chord>
    <barline id='b1' value='final'/>
  </island>
</score>"#;

fn count_kind(graph: &MusicGraph, kind: NodeKind) -> usize {
    let (nodes, _) = graph.gather();
    nodes.iter().filter(|&&n| graph.kind(n) == Some(kind)).count()
}

fn chord_at(graph: &MusicGraph, geometry: &Geometry, part: usize, instant: usize) -> NodeId {
    let island = geometry.lookup(part, instant).expect("island at coordinates");
    graph
        .find_all(island, EdgeKind::Token, Direction::Forward)
        .into_iter()
        .find(|&t| graph.kind(t) == Some(NodeKind::Chord))
        .expect("chord token")
}

// ─── Reading ────────────────────────────────────────────────────────

#[test]
fn duet_reads_without_warnings() {
    let read = read_score(DUET).expect("duet should parse");
    assert_eq!(read.warnings, vec![]);

    assert_eq!(count_kind(&read.graph, NodeKind::Island), 8);
    assert_eq!(count_kind(&read.graph, NodeKind::Part), 2);
    assert_eq!(count_kind(&read.graph, NodeKind::Instrument), 2);
    assert_eq!(count_kind(&read.graph, NodeKind::Clef), 2);
    assert_eq!(count_kind(&read.graph, NodeKind::KeySignature), 1);
    assert_eq!(count_kind(&read.graph, NodeKind::Meter), 1);
    assert_eq!(count_kind(&read.graph, NodeKind::Barline), 2);
    assert_eq!(count_kind(&read.graph, NodeKind::Chord), 4);
    assert_eq!(count_kind(&read.graph, NodeKind::Note), 5);
    // One tie, realized as a single shared tie-span.
    assert_eq!(count_kind(&read.graph, NodeKind::TieSpan), 1);
}

#[test]
fn duet_geometry_is_a_two_by_four_mesh() {
    let mut read = read_score(DUET).expect("duet should parse");
    let geometry = Geometry::parse(&mut read.graph).expect("geometry should resolve");

    assert_eq!(geometry.parts(), 2);
    assert_eq!(geometry.instants(), 4);
    for instant in 0..4 {
        assert!(geometry.is_instant_complete(instant));
    }

    // The first island read is the top and sits at the origin.
    assert_eq!(geometry.lookup(0, 0), read.graph.top());

    // Coordinates are committed onto the islands themselves.
    let island = geometry.lookup(1, 2).expect("island (1,2)");
    let typesetting = read.graph.node(island).unwrap().typesetting.expect("typesetting");
    assert_eq!((typesetting.part, typesetting.instant), (1, 2));
}

#[test]
fn duet_chords_chain_and_tie() {
    let mut read = read_score(DUET).expect("duet should parse");
    let geometry = Geometry::parse(&mut read.graph).expect("geometry should resolve");
    let graph = &read.graph;

    let first = chord_at(graph, &geometry, 0, 2);
    let second = chord_at(graph, &geometry, 0, 3);
    // `next` sets both the continuity and the voice chain.
    assert_eq!(graph.find(first, EdgeKind::Continuity, Direction::Forward), Some(second));
    assert_eq!(graph.find(first, EdgeKind::Voice, Direction::Forward), Some(second));

    // The tied notes share one tie-span.
    let tied_note = graph
        .find_all(first, EdgeKind::Note, Direction::Forward)
        .into_iter()
        .find(|&n| !graph.find_all(n, EdgeKind::Tie, Direction::Forward).is_empty())
        .expect("tied note");
    let span = graph.find(tied_note, EdgeKind::Tie, Direction::Forward).expect("tie-span");
    let ends = graph.find_all(span, EdgeKind::Tie, Direction::Backward);
    assert_eq!(ends.len(), 2);
    let partner = ends.into_iter().find(|&n| n != tied_note).expect("partner");
    let partner_chord = graph.find(partner, EdgeKind::Note, Direction::Backward);
    assert_eq!(partner_chord, Some(second));
}

// ─── Tablature over a read document ─────────────────────────────────

#[test]
fn duet_guitar_chord_maps_to_requested_strings() {
    let mut read = read_score(DUET).expect("duet should parse");
    let geometry = Geometry::parse(&mut read.graph).expect("geometry should resolve");
    let graph = &read.graph;

    let island = geometry.lookup(0, 2).expect("island (0,2)");
    let instrument_node = active_instrument(graph, island).expect("active instrument");
    let Some(NodeData::Instrument(instrument)) = graph.node(instrument_node).map(|n| &n.data)
    else {
        panic!("instrument payload");
    };
    assert_eq!(instrument.kind, InstrumentKind::Guitar);

    let chord = chord_at(graph, &geometry, 0, 2);
    let tab = map_chord(graph, chord, instrument, ScanOrder::HighestFirst);
    assert!(tab.unplaced.is_empty());
    let mut placed: Vec<(usize, usize)> = tab.notes.iter().map(|n| (n.string, n.fret)).collect();
    placed.sort_unstable();
    assert_eq!(placed, vec![(0, 0), (1, 0)]); // open E4 and B3
}

#[test]
fn duet_bass_part_sees_its_own_instrument() {
    let mut read = read_score(DUET).expect("duet should parse");
    let geometry = Geometry::parse(&mut read.graph).expect("geometry should resolve");
    let graph = &read.graph;

    let island = geometry.lookup(1, 3).expect("island (1,3)");
    let instrument_node = active_instrument(graph, island).expect("active instrument");
    let Some(NodeData::Instrument(instrument)) = graph.node(instrument_node).map(|n| &n.data)
    else {
        panic!("instrument payload");
    };
    assert_eq!(instrument.kind, InstrumentKind::Bass);
    assert_eq!(instrument.string_count(), 4);

    // The closing bass chord is a rest and bypasses mapping.
    let chord = chord_at(graph, &geometry, 1, 3);
    let tab = map_chord(graph, chord, instrument, ScanOrder::HighestFirst);
    assert!(tab.is_rest);
    assert_eq!(tab.rest_line_space(), 1);
}

// ─── Recoverable warnings ───────────────────────────────────────────

#[test]
fn unknown_records_are_skipped_with_a_warning() {
    let xml = r#"<score>
      <island id='a'>
        <clef id='c' value='treble'/>
        <ornament id='x' value='trill'/>
      </island>
      <metadata title='test'/>
    </score>"#;
    let read = read_score(xml).expect("parse should survive unknown records");
    assert_eq!(
        read.warnings,
        vec![
            Warning::UnknownRecord { name: "ornament".into() },
            Warning::UnknownRecord { name: "metadata".into() },
        ]
    );
    assert_eq!(count_kind(&read.graph, NodeKind::Clef), 1);
}

#[test]
fn dangling_references_drop_the_relation_only() {
    let xml = r#"<score>
      <island id='a' across='nowhere'>
        <chord id='ch' next='gone' duration='1/4' beat='1' instant='0'>
          <note id='n' pitch='C4' tied-to='missing'/>
        </chord>
      </island>
    </score>"#;
    let read = read_score(xml).expect("parse should survive dangling references");
    assert_eq!(read.warnings.len(), 4); // across + next (twice: continuity and voice) + tied-to
    assert!(read
        .warnings
        .iter()
        .all(|w| matches!(w, Warning::UnresolvedReference { .. })));

    // The nodes themselves survive; only the relations were dropped.
    assert_eq!(count_kind(&read.graph, NodeKind::Chord), 1);
    assert_eq!(count_kind(&read.graph, NodeKind::Note), 1);
    assert_eq!(count_kind(&read.graph, NodeKind::TieSpan), 0);
}

// ─── Fatal errors ───────────────────────────────────────────────────

#[test]
fn island_without_id_aborts_the_parse() {
    let xml = "<score><island><clef id='c' value='treble'/></island></score>";
    let err = read_score(xml).unwrap_err();
    assert!(matches!(err, ScoreError::MalformedDocument(_)));
}

#[test]
fn chord_without_id_aborts_the_parse() {
    let xml = r#"<score>
      <island id='a'>
        <chord duration='1/4' beat='1' instant='0'><note id='n' pitch='C4'/></chord>
      </island>
    </score>"#;
    let err = read_score(xml).unwrap_err();
    assert!(matches!(err, ScoreError::MalformedDocument(_)));
}

#[test]
fn unparsable_text_aborts_the_parse() {
    assert!(matches!(
        read_score("not xml at all"),
        Err(ScoreError::MalformedDocument(_))
    ));
    assert!(matches!(
        read_score("<score><island id='a'></score>"),
        Err(ScoreError::MalformedDocument(_))
    ));
}

#[test]
fn wrong_root_element_aborts_the_parse() {
    let err = read_score("<partbook/>").unwrap_err();
    assert!(matches!(err, ScoreError::MalformedDocument(_)));
}

#[test]
fn crossing_staves_fail_geometry_not_parsing() {
    // Two instants whose parts disagree about which comes first.
    let xml = r#"<score>
      <island id='a' across='b' down='c'/>
      <island id='b'/>
      <island id='c' across='d'/>
      <island id='d' down='b'/>
    </score>"#;
    let mut read = read_score(xml).expect("adjacency is well-formed text");
    let err = Geometry::parse(&mut read.graph).unwrap_err();
    assert_eq!(err, ScoreError::StructuralConflict);

    // A failed pass leaves no partial coordinates behind.
    let (nodes, _) = read.graph.gather();
    assert!(nodes
        .iter()
        .all(|&n| read.graph.node(n).unwrap().typesetting.is_none()));
}
