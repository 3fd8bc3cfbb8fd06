//! Engraving output primitives.
//!
//! A [`Stamp`] is one positioned graphic tied back to the graph node it was
//! derived from. Positions are expressed through a 2D affine transform so
//! callers can compose stamps into a page at whatever scale they render.

use serde::Serialize;

use crate::graph::NodeId;

/// A 2D affine transform in column-major form:
///
/// ```text
/// | a c e |
/// | b d f |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(x: f64, y: f64) -> Self {
        Affine { e: x, f: y, ..Self::IDENTITY }
    }

    pub fn scale(s: f64) -> Self {
        Affine { a: s, d: s, ..Self::IDENTITY }
    }

    /// `self` applied after `other`.
    pub fn then(&self, other: &Affine) -> Affine {
        Affine {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }
}

/// What a stamp draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "value")]
pub enum Graphic {
    /// A fret number on a tablature line.
    FretDigit(usize),
    /// The rest marker occupying a whole tablature column.
    RestPlaceholder,
}

/// A positioned graphic with a handle back to the node that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stamp {
    pub graphic: Graphic,
    pub transform: Affine,
    pub source: NodeId,
}
