//! Cube-Coordinate Hex Geometry
//!
//! Pure value-type math for the hexagonal map. Every other module addresses
//! tiles through [`Hex`], which doubles as the canonical map key.
//!
//! Coordinates follow the cube convention: three axes `(q, r, s)` with the
//! invariant `q + r + s = 0`. Distance is cube Manhattan distance halved.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A hex cell in cube coordinates.
///
/// Invariant: `q + r + s == 0`. Constructors enforce it; arithmetic
/// preserves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hex {
    /// Column axis.
    pub q: i32,
    /// Row axis.
    pub r: i32,
    /// Third cube axis, always `-q - r`.
    pub s: i32,
}

/// The six neighbor offsets, counter-clockwise starting east.
const DIRECTIONS: [Hex; 6] = [
    Hex { q: 1, r: 0, s: -1 },
    Hex { q: 1, r: -1, s: 0 },
    Hex { q: 0, r: -1, s: 1 },
    Hex { q: -1, r: 0, s: 1 },
    Hex { q: -1, r: 1, s: 0 },
    Hex { q: 0, r: 1, s: -1 },
];

impl Hex {
    /// The origin hex.
    pub const ZERO: Hex = Hex { q: 0, r: 0, s: 0 };

    /// Create from cube coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `q + r + s != 0`. Use [`Hex::axial`] when only two axes
    /// are known.
    pub fn new(q: i32, r: i32, s: i32) -> Self {
        assert_eq!(q + r + s, 0, "cube coordinates must sum to zero");
        Self { q, r, s }
    }

    /// Create from axial coordinates, deriving `s`.
    pub const fn axial(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// Component-wise addition.
    pub const fn add(self, other: Hex) -> Hex {
        Hex {
            q: self.q + other.q,
            r: self.r + other.r,
            s: self.s + other.s,
        }
    }

    /// Component-wise subtraction.
    pub const fn sub(self, other: Hex) -> Hex {
        Hex {
            q: self.q - other.q,
            r: self.r - other.r,
            s: self.s - other.s,
        }
    }

    /// Scale by an integer factor.
    pub const fn scale(self, k: i32) -> Hex {
        Hex {
            q: self.q * k,
            r: self.r * k,
            s: self.s * k,
        }
    }

    /// Rotate 60 degrees counter-clockwise around the origin.
    pub const fn rotate_left(self) -> Hex {
        Hex {
            q: -self.s,
            r: -self.q,
            s: -self.r,
        }
    }

    /// Rotate 60 degrees clockwise around the origin.
    pub const fn rotate_right(self) -> Hex {
        Hex {
            q: -self.r,
            r: -self.s,
            s: -self.q,
        }
    }

    /// Hex-grid distance: half the cube Manhattan distance.
    pub fn distance(self, other: Hex) -> i32 {
        let d = self.sub(other);
        (d.q.abs() + d.r.abs() + d.s.abs()) / 2
    }

    /// Neighbor in direction `dir` (0..6, counter-clockwise from east).
    pub fn neighbor(self, dir: usize) -> Hex {
        self.add(DIRECTIONS[dir % 6])
    }

    /// All six immediate neighbors.
    pub fn neighbors(self) -> [Hex; 6] {
        let mut out = [Hex::ZERO; 6];
        for (i, d) in DIRECTIONS.iter().enumerate() {
            out[i] = self.add(*d);
        }
        out
    }

    /// The ring of hexes at exactly `radius` from `self`.
    ///
    /// Radius 0 yields just `self`.
    pub fn ring(self, radius: i32) -> Vec<Hex> {
        if radius <= 0 {
            return vec![self];
        }
        let mut out = Vec::with_capacity(6 * radius as usize);
        let mut cursor = self.add(DIRECTIONS[4].scale(radius));
        for dir in 0..6 {
            for _ in 0..radius {
                out.push(cursor);
                cursor = cursor.neighbor(dir);
            }
        }
        out
    }

    /// All hexes within `radius` of `self` inclusive, by iterative ring
    /// expansion. `1 + 3r(r+1)` hexes for radius `r`.
    pub fn range(self, radius: i32) -> Vec<Hex> {
        let mut out = Vec::with_capacity((1 + 3 * radius * (radius + 1)).max(1) as usize);
        for r in 0..=radius.max(0) {
            out.extend(self.ring(r));
        }
        out
    }

    /// Round fractional cube coordinates to the nearest hex.
    ///
    /// The axis with the largest rounding error is recomputed from the
    /// other two, preserving `q + r + s = 0`.
    pub fn round(fq: f64, fr: f64, fs: f64) -> Hex {
        let mut q = fq.round();
        let mut r = fr.round();
        let mut s = fs.round();

        let dq = (q - fq).abs();
        let dr = (r - fr).abs();
        let ds = (s - fs).abs();

        if dq > dr && dq > ds {
            q = -r - s;
        } else if dr > ds {
            r = -q - s;
        } else {
            s = -q - r;
        }

        Hex {
            q: q as i32,
            r: r as i32,
            s: s as i32,
        }
    }

    /// Canonical string key, used wherever the wire format needs a map key.
    pub fn key(self) -> String {
        format!("{},{},{}", self.q, self.r, self.s)
    }

    /// Parse a key produced by [`Hex::key`].
    pub fn from_key(key: &str) -> Option<Hex> {
        let mut parts = key.split(',');
        let q: i32 = parts.next()?.trim().parse().ok()?;
        let r: i32 = parts.next()?.trim().parse().ok()?;
        let s: i32 = parts.next()?.trim().parse().ok()?;
        if parts.next().is_some() || q + r + s != 0 {
            return None;
        }
        Some(Hex { q, r, s })
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.q, self.r, self.s)
    }
}

// Serialized as the canonical key so hex-keyed JSON maps stay readable.
impl Serialize for Hex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for Hex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = Hex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a hex key of the form \"q,r,s\" with q+r+s=0")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Hex, E> {
                Hex::from_key(v).ok_or_else(|| E::custom(format!("invalid hex key: {v}")))
            }
        }

        deserializer.deserialize_str(KeyVisitor)
    }
}

// =============================================================================
// PIXEL PROJECTION
// =============================================================================

/// Hex grid orientation for pixel projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Pointy-top hexes (vertex up).
    Pointy,
    /// Flat-top hexes (edge up).
    Flat,
}

/// Projection parameters between hex space and pixel space.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Layout {
    /// Grid orientation.
    pub orientation: Orientation,
    /// Hex size (center to corner) in pixels, per axis.
    pub size: (f64, f64),
    /// Pixel position of the origin hex center.
    pub origin: (f64, f64),
}

const SQRT3: f64 = 1.732_050_807_568_877_2;

impl Layout {
    /// Pointy-top layout centered on the pixel origin.
    pub fn pointy(size: f64) -> Self {
        Self {
            orientation: Orientation::Pointy,
            size: (size, size),
            origin: (0.0, 0.0),
        }
    }

    /// Flat-top layout centered on the pixel origin.
    pub fn flat(size: f64) -> Self {
        Self {
            orientation: Orientation::Flat,
            size: (size, size),
            origin: (0.0, 0.0),
        }
    }

    /// Center of `hex` in pixel space.
    pub fn hex_to_pixel(&self, hex: Hex) -> (f64, f64) {
        let q = hex.q as f64;
        let r = hex.r as f64;
        let (x, y) = match self.orientation {
            Orientation::Pointy => (SQRT3 * q + SQRT3 / 2.0 * r, 1.5 * r),
            Orientation::Flat => (1.5 * q, SQRT3 / 2.0 * q + SQRT3 * r),
        };
        (x * self.size.0 + self.origin.0, y * self.size.1 + self.origin.1)
    }

    /// Hex containing the pixel `(x, y)`.
    pub fn pixel_to_hex(&self, x: f64, y: f64) -> Hex {
        let px = (x - self.origin.0) / self.size.0;
        let py = (y - self.origin.1) / self.size.1;
        let (fq, fr) = match self.orientation {
            Orientation::Pointy => (SQRT3 / 3.0 * px - py / 3.0, 2.0 / 3.0 * py),
            Orientation::Flat => (2.0 / 3.0 * px, -px / 3.0 + SQRT3 / 3.0 * py),
        };
        Hex::round(fq, fr, -fq - fr)
    }

    /// The six polygon corners of `hex` in pixel space, for rendering
    /// handoff to clients.
    pub fn corners(&self, hex: Hex) -> [(f64, f64); 6] {
        let center = self.hex_to_pixel(hex);
        let start = match self.orientation {
            Orientation::Pointy => 0.5,
            Orientation::Flat => 0.0,
        };
        let mut out = [(0.0, 0.0); 6];
        for (i, corner) in out.iter_mut().enumerate() {
            let angle = std::f64::consts::PI / 3.0 * (i as f64 + start);
            *corner = (
                center.0 + self.size.0 * angle.cos(),
                center.1 + self.size.1 * angle.sin(),
            );
        }
        out
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_axial_invariant() {
        let h = Hex::axial(3, -5);
        assert_eq!(h.q + h.r + h.s, 0);
        assert_eq!(h.s, 2);
    }

    #[test]
    #[should_panic]
    fn test_new_rejects_bad_sum() {
        Hex::new(1, 1, 1);
    }

    #[test]
    fn test_distance() {
        assert_eq!(Hex::ZERO.distance(Hex::ZERO), 0);
        assert_eq!(Hex::ZERO.distance(Hex::axial(3, 0)), 3);
        assert_eq!(Hex::ZERO.distance(Hex::axial(2, -2)), 2);
        assert_eq!(Hex::axial(-1, -1).distance(Hex::axial(1, 1)), 4);
    }

    #[test]
    fn test_neighbors_are_adjacent() {
        let h = Hex::axial(4, -2);
        for dir in 0..6 {
            assert_eq!(h.distance(h.neighbor(dir)), 1);
        }
    }

    #[test]
    fn test_rotate_round_trip() {
        let h = Hex::axial(2, -1);
        let mut cur = h;
        for _ in 0..6 {
            cur = cur.rotate_left();
        }
        assert_eq!(cur, h);
        assert_eq!(h.rotate_left().rotate_right(), h);
    }

    #[test]
    fn test_ring_sizes() {
        assert_eq!(Hex::ZERO.ring(0), vec![Hex::ZERO]);
        assert_eq!(Hex::ZERO.ring(1).len(), 6);
        assert_eq!(Hex::ZERO.ring(3).len(), 18);
    }

    #[test]
    fn test_range_count() {
        // 1 + 3r(r+1)
        assert_eq!(Hex::ZERO.range(0).len(), 1);
        assert_eq!(Hex::ZERO.range(1).len(), 7);
        assert_eq!(Hex::ZERO.range(2).len(), 19);
        for h in Hex::ZERO.range(2) {
            assert!(Hex::ZERO.distance(h) <= 2);
        }
    }

    #[test]
    fn test_round_integral_identity() {
        for h in Hex::ZERO.range(3) {
            let rounded = Hex::round(h.q as f64, h.r as f64, h.s as f64);
            assert_eq!(rounded, h);
        }
    }

    #[test]
    fn test_key_round_trip() {
        let h = Hex::axial(-7, 3);
        assert_eq!(Hex::from_key(&h.key()), Some(h));
        assert_eq!(Hex::from_key("1,1,1"), None);
        assert_eq!(Hex::from_key("nonsense"), None);
    }

    #[test]
    fn test_serde_as_key() {
        let h = Hex::axial(2, -5);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, "\"2,-5,3\"");
        let back: Hex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_pixel_round_trip() {
        for layout in [Layout::pointy(12.0), Layout::flat(9.5)] {
            for h in Hex::ZERO.range(4) {
                let (x, y) = layout.hex_to_pixel(h);
                assert_eq!(layout.pixel_to_hex(x, y), h);
            }
        }
    }

    #[test]
    fn test_corners_surround_center() {
        let layout = Layout::pointy(10.0);
        let h = Hex::axial(1, 1);
        let (cx, cy) = layout.hex_to_pixel(h);
        for (x, y) in layout.corners(h) {
            let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
            assert!((d - 10.0).abs() < 1e-9);
        }
    }

    proptest! {
        #[test]
        fn prop_arithmetic_preserves_invariant(
            q1 in -100i32..100, r1 in -100i32..100,
            q2 in -100i32..100, r2 in -100i32..100,
            k in -5i32..5,
        ) {
            let a = Hex::axial(q1, r1);
            let b = Hex::axial(q2, r2);
            for h in [a.add(b), a.sub(b), a.scale(k), a.rotate_left(), a.rotate_right()] {
                prop_assert_eq!(h.q + h.r + h.s, 0);
            }
        }

        #[test]
        fn prop_round_preserves_invariant(
            fq in -50.0f64..50.0, fr in -50.0f64..50.0,
        ) {
            let h = Hex::round(fq, fr, -fq - fr);
            prop_assert_eq!(h.q + h.r + h.s, 0);
        }

        #[test]
        fn prop_distance_symmetric(
            q1 in -50i32..50, r1 in -50i32..50,
            q2 in -50i32..50, r2 in -50i32..50,
        ) {
            let a = Hex::axial(q1, r1);
            let b = Hex::axial(q2, r2);
            prop_assert_eq!(a.distance(b), b.distance(a));
        }
    }
}
